//! Column-to-strategy mapping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Feature space used to measure distance between rows for KNN filling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum KnnFeatures {
    /// Only the target column itself.
    Isolated,
    /// The listed columns (the target column should be among them).
    Columns(Vec<String>),
}

/// How the missing cells of one column are filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputationStrategy {
    /// Median of the present values at call time.
    Median,
    /// A fixed out-of-domain code, to be read as an "unknown" category
    /// rather than a quantity.
    Sentinel(f64),
    /// Uniform mean of the `k` nearest donor rows.
    Knn { k: usize, features: KnnFeatures },
}

impl ImputationStrategy {
    /// Short label used in logs and reports.
    pub fn label(&self) -> String {
        match self {
            Self::Median => "median".to_string(),
            Self::Sentinel(value) => format!("sentinel({})", value),
            Self::Knn {
                k,
                features: KnnFeatures::Isolated,
            } => format!("knn(k={})", k),
            Self::Knn {
                k,
                features: KnnFeatures::Columns(columns),
            } => format!("knn(k={}, features={})", k, columns.len()),
        }
    }
}

impl fmt::Display for ImputationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// One column under policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    pub column: String,
    pub strategy: ImputationStrategy,
}

/// Ordered mapping from column name to fill strategy.
///
/// Adding a rule for a column already under policy replaces its strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImputationPolicy {
    rules: Vec<ColumnRule>,
}

impl ImputationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `column` under `strategy`.
    pub fn with(mut self, column: impl Into<String>, strategy: ImputationStrategy) -> Self {
        let column = column.into();
        match self.rules.iter_mut().find(|r| r.column == column) {
            Some(rule) => rule.strategy = strategy,
            None => self.rules.push(ColumnRule { column, strategy }),
        }
        self
    }

    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }

    pub fn columns(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.column.as_str()).collect()
    }

    pub fn strategy_for(&self, column: &str) -> Option<&ImputationStrategy> {
        self.rules
            .iter()
            .find(|r| r.column == column)
            .map(|r| &r.strategy)
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_replaces_existing_rule() {
        let policy = ImputationPolicy::new()
            .with("BMI", ImputationStrategy::Median)
            .with("TOTCHOL", ImputationStrategy::Median)
            .with("BMI", ImputationStrategy::Sentinel(-1.0));

        assert_eq!(policy.columns(), vec!["BMI", "TOTCHOL"]);
        assert_eq!(
            policy.strategy_for("BMI"),
            Some(&ImputationStrategy::Sentinel(-1.0))
        );
    }

    #[test]
    fn test_strategy_labels() {
        assert_eq!(ImputationStrategy::Median.label(), "median");
        assert_eq!(ImputationStrategy::Sentinel(-1.0).label(), "sentinel(-1)");
        assert_eq!(
            ImputationStrategy::Knn {
                k: 5,
                features: KnnFeatures::Isolated
            }
            .to_string(),
            "knn(k=5)"
        );
    }

    #[test]
    fn test_policy_serialization() {
        let policy = ImputationPolicy::new().with(
            "GLUCOSE",
            ImputationStrategy::Knn {
                k: 3,
                features: KnnFeatures::Columns(vec!["GLUCOSE".into(), "BMI".into()]),
            },
        );
        let json = serde_json::to_string(&policy).unwrap();
        let back: ImputationPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(policy, back);
    }
}
