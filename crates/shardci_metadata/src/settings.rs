use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;

/// How feature files are spread over shards.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PartitionStrategy {
    /// Shuffle, then fill each shard up to the average weight.
    #[default]
    Weighted,

    /// Round-robin by discovery order, ignoring weights.
    Positional,
}

/// How long to wait for a freshly started container before using it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    /// Fixed sleep, or the polling budget when `ready_command` is set.
    pub warmup: Duration,

    /// Command `exec`'d inside the container until it exits successfully.
    pub ready_command: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub program: String,
    pub workdir: String,
    pub env: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    pub image: String,
    pub env: Vec<String>,
    pub alias: String,
    pub name_env: String,
    pub readiness: Readiness,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSettings {
    pub name: String,
    pub image: String,
    pub alias: String,
    pub env: Vec<String>,
    pub readiness: Readiness,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationSettings {
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSettings {
    pub root: Utf8PathBuf,
    pub suffix: String,
    pub command: Vec<String>,
    pub tag_flag: String,
    pub report_dir: String,
    pub strategy: PartitionStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaselineSettings {
    pub name: String,
    pub command: Vec<String>,
    pub report_dir: String,
    pub report_dest: Utf8PathBuf,
}

/// A config template renamed into place before the image is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub from: Utf8PathBuf,
    pub to: Utf8PathBuf,
}

impl Template {
    pub fn new(from: impl AsRef<Utf8Path>, to: impl AsRef<Utf8Path>) -> Self {
        Self {
            from: from.as_ref().to_path_buf(),
            to: to.as_ref().to_path_buf(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrepareSettings {
    pub templates: Vec<Template>,
    pub clean: Vec<Utf8PathBuf>,
}

/// Fully resolved configuration, see [`crate::Options::to_settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub(crate) runtime: RuntimeSettings,
    pub(crate) database: DatabaseSettings,
    pub(crate) services: Vec<ServiceSettings>,
    pub(crate) migration: MigrationSettings,
    pub(crate) features: FeatureSettings,
    pub(crate) baseline: Option<BaselineSettings>,
    pub(crate) prepare: PrepareSettings,
}

impl Settings {
    pub const fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub const fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub fn services(&self) -> &[ServiceSettings] {
        &self.services
    }

    pub const fn migration(&self) -> &MigrationSettings {
        &self.migration
    }

    pub const fn features(&self) -> &FeatureSettings {
        &self.features
    }

    pub const fn baseline(&self) -> Option<&BaselineSettings> {
        self.baseline.as_ref()
    }

    pub const fn prepare(&self) -> &PrepareSettings {
        &self.prepare
    }

    pub const fn set_strategy(&mut self, strategy: PartitionStrategy) {
        self.features.strategy = strategy;
    }
}
