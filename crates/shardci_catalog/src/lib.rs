//! Discovers scenario files, weighs them and applies tag filters.

use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use ignore::WalkBuilder;
use thiserror::Error;

mod parser;
mod tags;
mod weight;

pub use parser::{FeatureDefinition, FeatureParser, GherkinParser, ParseError, ScenarioDefinition};
pub use tags::{REJECT_MARKER, TagRuleSet, normalize_tag};
pub use weight::{SLOW_MULTIPLIER, feature_weight};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to discover scenario files under `{root}`")]
    Discovery {
        root: Utf8PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("Scenario file path `{}` contains non-Unicode characters", path.display())]
    NonUnicodePath { path: std::path::PathBuf },

    #[error("Failed to parse `{path}`")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: ParseError,
    },
}

/// A scenario file selected for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioFile {
    pub path: Utf8PathBuf,
    pub tags: BTreeSet<String>,
    pub weight: u64,
}

/// The scenario files under a directory.
#[derive(Debug, Clone)]
pub struct FeatureCatalog {
    root: Utf8PathBuf,
    suffix: String,
}

impl FeatureCatalog {
    pub fn new(root: impl Into<Utf8PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
        }
    }

    /// Recursively lists every file under the root whose path ends with the suffix.
    ///
    /// Ignore files are not honoured. Results are sorted by path.
    pub fn discover(&self) -> Result<Vec<Utf8PathBuf>, CatalogError> {
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|source| CatalogError::Discovery {
                root: self.root.clone(),
                source,
            })?;

            if !entry.file_type().is_some_and(|file_type| file_type.is_file()) {
                continue;
            }

            let path = Utf8PathBuf::from_path_buf(entry.into_path())
                .map_err(|path| CatalogError::NonUnicodePath { path })?;

            if path.as_str().ends_with(&self.suffix) {
                files.push(path);
            }
        }

        tracing::debug!(root = %self.root, count = files.len(), "Discovered scenario files");

        Ok(files)
    }

    /// Discovers, parses, filters and weighs every scenario file.
    ///
    /// The first discovery or parse error aborts the whole selection.
    pub fn select(
        &self,
        rules: &TagRuleSet,
        parser: &dyn FeatureParser,
    ) -> Result<Vec<ScenarioFile>, CatalogError> {
        let mut selected = Vec::new();

        for path in self.discover()? {
            let definition = parser
                .parse(&path)
                .map_err(|source| CatalogError::Parse {
                    path: path.clone(),
                    source,
                })?;

            if !rules.include(&definition.tags) {
                tracing::debug!(path = %path, "Excluded by tag filter");
                continue;
            }

            let weight = feature_weight(&definition, rules);
            let tags = definition
                .tags
                .iter()
                .map(|tag| normalize_tag(tag).to_string())
                .collect();

            selected.push(ScenarioFile { path, tags, weight });
        }

        Ok(selected)
    }
}
