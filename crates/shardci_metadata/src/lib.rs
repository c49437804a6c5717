use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;

mod options;
mod settings;

pub use options::{
    BaselineOptions, DatabaseOptions, FeatureOptions, MigrationOptions, Options, PrepareOptions,
    RuntimeOptions, ServiceOptions, TemplateOptions,
};
pub use settings::{
    BaselineSettings, DatabaseSettings, FeatureSettings, MigrationSettings, PartitionStrategy,
    PrepareSettings, Readiness, RuntimeSettings, ServiceSettings, Settings, Template,
};

/// Name of the project configuration file looked up in the execution path.
pub const CONFIG_FILE_NAME: &str = "shardci.toml";

#[derive(Debug, Error)]
pub enum OptionsError {
    #[error("Failed to read `{path}`")]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse `{path}`")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The resolved configuration of the project being built.
#[derive(Debug, Clone)]
pub struct ProjectMetadata {
    config_file: Option<Utf8PathBuf>,
    options: Options,
}

impl ProjectMetadata {
    /// Loads `shardci.toml` from `root`, falling back to built-in defaults when absent.
    pub fn discover(root: &Utf8Path) -> Result<Self, OptionsError> {
        let candidate = root.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Self::from_config_file(candidate);
        }

        tracing::debug!(root = %root, "No `{CONFIG_FILE_NAME}` found, using defaults");
        Ok(Self {
            config_file: None,
            options: Options::default(),
        })
    }

    pub fn from_config_file(path: Utf8PathBuf) -> Result<Self, OptionsError> {
        let source = std::fs::read_to_string(&path).map_err(|source| OptionsError::Read {
            path: path.clone(),
            source,
        })?;
        let options = Options::from_toml_str(&source).map_err(|source| OptionsError::Parse {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(config_file = %path, "Loaded configuration");

        Ok(Self {
            config_file: Some(path),
            options,
        })
    }

    pub fn config_file(&self) -> Option<&Utf8Path> {
        self.config_file.as_deref()
    }

    pub fn to_settings(&self) -> Result<Settings, OptionsError> {
        self.options.to_settings()
    }
}
