use crate::parser::{FeatureDefinition, ScenarioDefinition};
use crate::tags::TagRuleSet;

/// Multiplier applied once to files carrying at least one slow tag.
pub const SLOW_MULTIPLIER: u64 = 2;

impl ScenarioDefinition {
    /// Number of steps this scenario executes, outlines expanded per example row.
    pub const fn weight(&self) -> u64 {
        match *self {
            Self::Scenario { steps } => steps as u64,
            Self::Outline {
                steps,
                example_rows,
            } => steps as u64 * example_rows as u64,
        }
    }
}

impl FeatureDefinition {
    /// Sum of the scenario weights, before any slow-tag adjustment.
    pub fn base_weight(&self) -> u64 {
        self.scenarios.iter().map(ScenarioDefinition::weight).sum()
    }
}

/// The estimated cost of running `definition`.
///
/// Slow files count [`SLOW_MULTIPLIER`] times their base weight, no matter how
/// many slow tags they carry.
pub fn feature_weight(definition: &FeatureDefinition, rules: &TagRuleSet) -> u64 {
    let weight = definition.base_weight();
    if rules.is_slow(&definition.tags) {
        weight * SLOW_MULTIPLIER
    } else {
        weight
    }
}
