use std::collections::HashSet;
use std::time::Duration;

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::OptionsError;
use crate::settings::{
    BaselineSettings, DatabaseSettings, FeatureSettings, MigrationSettings, PartitionStrategy,
    PrepareSettings, Readiness, RuntimeSettings, ServiceSettings, Settings, Template,
};

/// The contents of a `shardci.toml` file. Every field is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Options {
    pub runtime: Option<RuntimeOptions>,
    pub database: Option<DatabaseOptions>,
    pub services: Option<Vec<ServiceOptions>>,
    pub migration: Option<MigrationOptions>,
    pub features: Option<FeatureOptions>,
    pub baseline: Option<BaselineOptions>,
    pub prepare: Option<PrepareOptions>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RuntimeOptions {
    /// Container runtime executable, resolved on `PATH`.
    pub program: Option<String>,

    /// Application directory inside the built image.
    pub workdir: Option<String>,

    /// `KEY=VALUE` pairs passed to every sandbox.
    pub env: Option<Vec<String>>,
}

/// The relational store shared by every run; each shard gets its own database in it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DatabaseOptions {
    pub image: Option<String>,
    pub env: Option<Vec<String>>,
    pub alias: Option<String>,

    /// Variable carrying the per-shard database name into the sandbox.
    pub name_env: Option<String>,
    pub warmup_secs: Option<u64>,
    pub ready_command: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ServiceOptions {
    pub name: String,
    pub image: String,
    pub alias: Option<String>,
    pub env: Option<Vec<String>>,
    pub warmup_secs: Option<u64>,
    pub ready_command: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct MigrationOptions {
    /// Shell command run with `sh -c` in a throwaway sandbox.
    pub command: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct FeatureOptions {
    pub root: Option<Utf8PathBuf>,
    pub suffix: Option<String>,
    pub command: Option<Vec<String>>,
    pub tag_flag: Option<String>,
    pub report_dir: Option<String>,
    pub strategy: Option<PartitionStrategy>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BaselineOptions {
    pub enabled: Option<bool>,
    pub name: Option<String>,
    pub command: Option<Vec<String>>,
    pub report_dir: Option<String>,
    pub report_dest: Option<Utf8PathBuf>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PrepareOptions {
    pub templates: Option<Vec<TemplateOptions>>,
    pub clean: Option<Vec<Utf8PathBuf>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct TemplateOptions {
    pub from: Utf8PathBuf,
    pub to: Utf8PathBuf,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

impl Options {
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Resolves the options against the built-in defaults.
    pub fn to_settings(&self) -> Result<Settings, OptionsError> {
        let runtime = self.runtime.clone().unwrap_or_default();
        let runtime = RuntimeSettings {
            program: runtime.program.unwrap_or_else(|| "docker".to_string()),
            workdir: runtime.workdir.unwrap_or_else(|| "/app".to_string()),
            env: runtime.env.unwrap_or_else(|| strings(&["RAILS_ENV=test"])),
        };

        let database = self.database.clone().unwrap_or_default();
        let database = DatabaseSettings {
            image: database
                .image
                .unwrap_or_else(|| "mariadb:latest".to_string()),
            env: database
                .env
                .unwrap_or_else(|| strings(&["MYSQL_ROOT_PASSWORD=jenkins"])),
            alias: database.alias.unwrap_or_else(|| "db".to_string()),
            name_env: database.name_env.unwrap_or_else(|| "DBNAME".to_string()),
            readiness: Readiness {
                warmup: Duration::from_secs(database.warmup_secs.unwrap_or(10)),
                ready_command: database.ready_command,
            },
        };

        let services = match &self.services {
            Some(services) => services
                .iter()
                .map(|service| ServiceSettings {
                    name: service.name.clone(),
                    image: service.image.clone(),
                    alias: service.alias.clone().unwrap_or_else(|| service.name.clone()),
                    env: service.env.clone().unwrap_or_default(),
                    readiness: Readiness {
                        warmup: Duration::from_secs(service.warmup_secs.unwrap_or(2)),
                        ready_command: service.ready_command.clone(),
                    },
                })
                .collect(),
            None => vec![ServiceSettings {
                name: "redis".to_string(),
                image: "redis".to_string(),
                alias: "redis".to_string(),
                env: Vec::new(),
                readiness: Readiness {
                    warmup: Duration::from_secs(2),
                    ready_command: None,
                },
            }],
        };

        let migration = MigrationSettings {
            command: self
                .migration
                .as_ref()
                .and_then(|migration| migration.command.clone())
                .unwrap_or_else(|| {
                    "bundle exec rake db:create db:schema:load db:migrate".to_string()
                }),
        };

        let features = self.features.clone().unwrap_or_default();
        let features = FeatureSettings {
            root: features.root.unwrap_or_else(|| Utf8PathBuf::from("features")),
            suffix: features.suffix.unwrap_or_else(|| ".feature".to_string()),
            command: features.command.unwrap_or_else(|| {
                strings(&[
                    "bundle",
                    "exec",
                    "cucumber",
                    "-r",
                    "features",
                    "--format",
                    "progress",
                    "--format",
                    "junit",
                    "--out",
                    "features/reports",
                    "--color",
                    "--no-drb",
                ])
            }),
            tag_flag: features.tag_flag.unwrap_or_else(|| "--tags".to_string()),
            report_dir: features
                .report_dir
                .unwrap_or_else(|| "features/reports".to_string()),
            strategy: features.strategy.unwrap_or_default(),
        };

        let baseline = self.baseline.clone().unwrap_or_default();
        let baseline = baseline.enabled.unwrap_or(true).then(|| BaselineSettings {
            name: baseline.name.unwrap_or_else(|| "rspec".to_string()),
            command: baseline.command.unwrap_or_else(|| {
                strings(&[
                    "bundle",
                    "exec",
                    "rspec",
                    "--format",
                    "progress",
                    "--format",
                    "RspecJunitFormatter",
                    "--out",
                    "spec/reports/rspec.xml",
                    "--color",
                    "--no-drb",
                ])
            }),
            report_dir: baseline
                .report_dir
                .unwrap_or_else(|| "spec/reports".to_string()),
            report_dest: baseline
                .report_dest
                .unwrap_or_else(|| Utf8PathBuf::from("spec")),
        });

        let prepare = self.prepare.clone().unwrap_or_default();
        let prepare = PrepareSettings {
            templates: prepare.templates.map_or_else(
                || {
                    vec![
                        Template::new("config/database.ci.yml", "config/database.yml"),
                        Template::new("config/redis.ci.yml", "config/redis.yml"),
                    ]
                },
                |templates| {
                    templates
                        .into_iter()
                        .map(|template| Template {
                            from: template.from,
                            to: template.to,
                        })
                        .collect()
                },
            ),
            clean: prepare.clean.unwrap_or_else(|| {
                vec![
                    Utf8PathBuf::from("spec/reports"),
                    Utf8PathBuf::from("features/reports"),
                ]
            }),
        };

        let settings = Settings {
            runtime,
            database,
            services,
            migration,
            features,
            baseline,
            prepare,
        };
        validate(&settings)?;
        Ok(settings)
    }
}

fn validate(settings: &Settings) -> Result<(), OptionsError> {
    if settings.runtime.program.trim().is_empty() {
        return Err(OptionsError::Invalid(
            "`runtime.program` must not be empty".to_string(),
        ));
    }

    if settings.features.command.is_empty() {
        return Err(OptionsError::Invalid(
            "`features.command` must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for service in &settings.services {
        if service.name.is_empty() || !service.name.chars().all(is_name_char) {
            return Err(OptionsError::Invalid(format!(
                "service name `{}` may only contain ASCII letters, digits, `-` and `_`",
                service.name
            )));
        }
        if !seen.insert(service.name.as_str()) {
            return Err(OptionsError::Invalid(format!(
                "service `{}` is declared more than once",
                service.name
            )));
        }
    }

    if let Some(baseline) = &settings.baseline {
        if baseline.command.is_empty() {
            return Err(OptionsError::Invalid(
                "`baseline.command` must not be empty".to_string(),
            ));
        }
        // Numeric names would collide with feature shard ordinals.
        if baseline.name.is_empty()
            || baseline.name.chars().all(|c| c.is_ascii_digit())
            || !baseline.name.chars().all(is_name_char)
        {
            return Err(OptionsError::Invalid(format!(
                "baseline name `{}` must be a non-numeric container-safe name",
                baseline.name
            )));
        }
    }

    Ok(())
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
