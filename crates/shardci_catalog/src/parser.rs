use camino::Utf8Path;
use thiserror::Error;

/// The parts of a feature file that matter for scheduling.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FeatureDefinition {
    /// Feature-level tags, without the `@` sigil.
    pub tags: Vec<String>,
    pub scenarios: Vec<ScenarioDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioDefinition {
    Scenario { steps: usize },

    /// A scenario outline runs its steps once per example row.
    Outline { steps: usize, example_rows: usize },
}

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

/// Turns a scenario file into a [`FeatureDefinition`].
pub trait FeatureParser: Sync {
    fn parse(&self, path: &Utf8Path) -> Result<FeatureDefinition, ParseError>;
}

/// Parses `.feature` files with the `gherkin` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct GherkinParser;

impl FeatureParser for GherkinParser {
    fn parse(&self, path: &Utf8Path) -> Result<FeatureDefinition, ParseError> {
        let feature =
            gherkin::Feature::parse_path(path.as_std_path(), gherkin::GherkinEnv::default())
                .map_err(ParseError::new)?;

        Ok(FeatureDefinition::from(&feature))
    }
}

impl From<&gherkin::Feature> for FeatureDefinition {
    fn from(feature: &gherkin::Feature) -> Self {
        let scenarios = feature
            .scenarios
            .iter()
            .chain(feature.rules.iter().flat_map(|rule| rule.scenarios.iter()))
            .map(ScenarioDefinition::from)
            .collect();

        Self {
            tags: feature.tags.clone(),
            scenarios,
        }
    }
}

impl From<&gherkin::Scenario> for ScenarioDefinition {
    fn from(scenario: &gherkin::Scenario) -> Self {
        let steps = scenario.steps.len();

        if scenario.examples.is_empty() && !is_outline_keyword(&scenario.keyword) {
            return Self::Scenario { steps };
        }

        // The first table row is the header.
        let example_rows = scenario
            .examples
            .iter()
            .filter_map(|examples| examples.table.as_ref())
            .map(|table| table.rows.len().saturating_sub(1))
            .sum();

        Self::Outline {
            steps,
            example_rows,
        }
    }
}

/// `Scenario Outline` and `Scenario Template` expand per example row, even with no rows.
fn is_outline_keyword(keyword: &str) -> bool {
    let keyword = keyword.trim().trim_end_matches(':');
    keyword.ends_with("Outline") || keyword.ends_with("Template")
}
