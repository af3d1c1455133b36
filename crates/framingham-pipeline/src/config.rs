//! Configuration types for the imputation pipeline.
//!
//! The defaults are the fixed constants of the analysis; the builder exists
//! so tests and the CLI can vary them without touching the pipeline.

use crate::imputers::{ImputationPolicy, ImputationStrategy, KnnFeatures};
use crate::schema::{BMI, BPMEDS, CONTINUOUS_COLUMNS, GLUCOSE, HEARTRTE, TOTCHOL};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_LOWER_QUANTILE: f64 = 0.2;
const DEFAULT_UPPER_QUANTILE: f64 = 0.8;
const DEFAULT_IQR_MULTIPLIER: f64 = 1.5;
const DEFAULT_BASELINE_KNN_NEIGHBORS: usize = 5;
const DEFAULT_OUTLIER_KNN_NEIGHBORS: usize = 3;
const DEFAULT_SENTINEL_VALUE: f64 = -1.0;
const DEFAULT_CORRELATION_THRESHOLD: f64 = 0.5;

/// Configuration for the imputation pipeline.
///
/// Use [`PipelineConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use framingham_pipeline::config::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .quantile_cut(0.25, 0.75)
///     .outlier_knn_neighbors(5)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Lower quantile of the outlier window.
    /// Default: 0.2 (wider than the textbook 0.25)
    pub lower_quantile: f64,

    /// Upper quantile of the outlier window.
    /// Default: 0.8
    pub upper_quantile: f64,

    /// Multiple of the inter-quantile range added beyond each quantile.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Neighbours for the GLUCOSE fill in the baseline pass.
    /// Default: 5
    pub baseline_knn_neighbors: usize,

    /// Neighbours for the outlier-aware re-imputation pass.
    /// Default: 3
    pub outlier_knn_neighbors: usize,

    /// Out-of-domain code meaning "unknown" for BPMEDS.
    /// Default: -1.0
    pub sentinel_value: f64,

    /// Columns checked for outliers and re-imputed jointly.
    /// Default: BMI, AGE, TOTCHOL, SYSBP, DIABP, HEARTRTE, GLUCOSE
    pub outlier_columns: Vec<String>,

    /// Minimum |r| for a correlation to be reported as strong.
    /// Default: 0.5
    pub correlation_threshold: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            lower_quantile: DEFAULT_LOWER_QUANTILE,
            upper_quantile: DEFAULT_UPPER_QUANTILE,
            iqr_multiplier: DEFAULT_IQR_MULTIPLIER,
            baseline_knn_neighbors: DEFAULT_BASELINE_KNN_NEIGHBORS,
            outlier_knn_neighbors: DEFAULT_OUTLIER_KNN_NEIGHBORS,
            sentinel_value: DEFAULT_SENTINEL_VALUE,
            outlier_columns: CONTINUOUS_COLUMNS.iter().map(|c| c.to_string()).collect(),
            correlation_threshold: DEFAULT_CORRELATION_THRESHOLD,
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder::default()
    }

    /// Read a configuration from a JSON file. Absent fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config
            .validate()
            .map_err(|e| crate::error::PipelineError::InvalidConfig(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [
            ("lower_quantile", self.lower_quantile),
            ("upper_quantile", self.upper_quantile),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidQuantile {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if self.lower_quantile >= self.upper_quantile {
            return Err(ConfigValidationError::InvertedQuantiles {
                lower: self.lower_quantile,
                upper: self.upper_quantile,
            });
        }

        if !self.iqr_multiplier.is_finite() || self.iqr_multiplier < 0.0 {
            return Err(ConfigValidationError::InvalidMultiplier(self.iqr_multiplier));
        }

        for k in [self.baseline_knn_neighbors, self.outlier_knn_neighbors] {
            if k == 0 {
                return Err(ConfigValidationError::InvalidKnnNeighbors(k));
            }
        }

        if !self.sentinel_value.is_finite() {
            return Err(ConfigValidationError::InvalidSentinel(self.sentinel_value));
        }

        if self.outlier_columns.is_empty() {
            return Err(ConfigValidationError::NoOutlierColumns);
        }

        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err(ConfigValidationError::InvalidQuantile {
                field: "correlation_threshold".to_string(),
                value: self.correlation_threshold,
            });
        }

        Ok(())
    }

    /// Policy for cells missing in the source.
    pub fn baseline_policy(&self) -> ImputationPolicy {
        ImputationPolicy::new()
            .with(
                GLUCOSE,
                ImputationStrategy::Knn {
                    k: self.baseline_knn_neighbors,
                    features: KnnFeatures::Isolated,
                },
            )
            .with(TOTCHOL, ImputationStrategy::Median)
            .with(BMI, ImputationStrategy::Median)
            .with(BPMEDS, ImputationStrategy::Sentinel(self.sentinel_value))
            .with(HEARTRTE, ImputationStrategy::Median)
    }

    /// Policy for cells flagged as outliers, re-imputed jointly over the
    /// outlier columns.
    pub fn outlier_policy(&self) -> ImputationPolicy {
        let features = KnnFeatures::Columns(self.outlier_columns.clone());
        self.outlier_columns
            .iter()
            .fold(ImputationPolicy::new(), |policy, column| {
                policy.with(
                    column,
                    ImputationStrategy::Knn {
                        k: self.outlier_knn_neighbors,
                        features: features.clone(),
                    },
                )
            })
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidQuantile { field: String, value: f64 },

    #[error("Lower quantile {lower} must be below upper quantile {upper}")]
    InvertedQuantiles { lower: f64, upper: f64 },

    #[error("Invalid IQR multiplier: {0} (must be finite and non-negative)")]
    InvalidMultiplier(f64),

    #[error("Invalid KNN neighbors: {0} (must be at least 1)")]
    InvalidKnnNeighbors(usize),

    #[error("Invalid sentinel value: {0} (must be finite)")]
    InvalidSentinel(f64),

    #[error("At least one outlier column is required")]
    NoOutlierColumns,
}

/// Builder for [`PipelineConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PipelineConfigBuilder {
    lower_quantile: Option<f64>,
    upper_quantile: Option<f64>,
    iqr_multiplier: Option<f64>,
    baseline_knn_neighbors: Option<usize>,
    outlier_knn_neighbors: Option<usize>,
    sentinel_value: Option<f64>,
    outlier_columns: Option<Vec<String>>,
    correlation_threshold: Option<f64>,
}

impl PipelineConfigBuilder {
    /// Set both quantiles of the outlier window.
    pub fn quantile_cut(mut self, lower: f64, upper: f64) -> Self {
        self.lower_quantile = Some(lower);
        self.upper_quantile = Some(upper);
        self
    }

    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    pub fn baseline_knn_neighbors(mut self, k: usize) -> Self {
        self.baseline_knn_neighbors = Some(k);
        self
    }

    pub fn outlier_knn_neighbors(mut self, k: usize) -> Self {
        self.outlier_knn_neighbors = Some(k);
        self
    }

    /// Set the code written into missing BPMEDS cells.
    ///
    /// Must not collide with any observed value; the imputer rejects a
    /// sentinel that does.
    pub fn sentinel_value(mut self, value: f64) -> Self {
        self.sentinel_value = Some(value);
        self
    }

    pub fn outlier_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.outlier_columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PipelineConfig` or an error if validation fails.
    pub fn build(self) -> Result<PipelineConfig, ConfigValidationError> {
        let defaults = PipelineConfig::default();
        let config = PipelineConfig {
            lower_quantile: self.lower_quantile.unwrap_or(defaults.lower_quantile),
            upper_quantile: self.upper_quantile.unwrap_or(defaults.upper_quantile),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            baseline_knn_neighbors: self
                .baseline_knn_neighbors
                .unwrap_or(defaults.baseline_knn_neighbors),
            outlier_knn_neighbors: self
                .outlier_knn_neighbors
                .unwrap_or(defaults.outlier_knn_neighbors),
            sentinel_value: self.sentinel_value.unwrap_or(defaults.sentinel_value),
            outlier_columns: self.outlier_columns.unwrap_or(defaults.outlier_columns),
            correlation_threshold: self
                .correlation_threshold
                .unwrap_or(defaults.correlation_threshold),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.lower_quantile, 0.2);
        assert_eq!(config.upper_quantile, 0.8);
        assert_eq!(config.iqr_multiplier, 1.5);
        assert_eq!(config.baseline_knn_neighbors, 5);
        assert_eq!(config.outlier_knn_neighbors, 3);
        assert_eq!(config.sentinel_value, -1.0);
        assert_eq!(config.outlier_columns.len(), 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PipelineConfig::builder()
            .quantile_cut(0.25, 0.75)
            .iqr_multiplier(3.0)
            .outlier_knn_neighbors(7)
            .outlier_columns(["BMI", "AGE"])
            .build()
            .unwrap();

        assert_eq!(config.lower_quantile, 0.25);
        assert_eq!(config.upper_quantile, 0.75);
        assert_eq!(config.iqr_multiplier, 3.0);
        assert_eq!(config.outlier_knn_neighbors, 7);
        assert_eq!(config.outlier_columns, vec!["BMI", "AGE"]);
    }

    #[test]
    fn test_validation_inverted_quantiles() {
        let result = PipelineConfig::builder().quantile_cut(0.8, 0.2).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvertedQuantiles { .. }
        ));
    }

    #[test]
    fn test_validation_quantile_out_of_range() {
        let result = PipelineConfig::builder().quantile_cut(-0.1, 0.8).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidQuantile { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_knn_neighbors() {
        let result = PipelineConfig::builder().baseline_knn_neighbors(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidKnnNeighbors(0)
        ));
    }

    #[test]
    fn test_validation_empty_outlier_columns() {
        let result = PipelineConfig::builder()
            .outlier_columns(Vec::<String>::new())
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::NoOutlierColumns
        ));
    }

    #[test]
    fn test_baseline_policy_matches_column_plan() {
        let policy = PipelineConfig::default().baseline_policy();
        assert_eq!(policy.columns(), vec!["GLUCOSE", "TOTCHOL", "BMI", "BPMEDS", "HEARTRTE"]);
        assert_eq!(
            policy.strategy_for("GLUCOSE"),
            Some(&ImputationStrategy::Knn {
                k: 5,
                features: KnnFeatures::Isolated
            })
        );
        assert_eq!(
            policy.strategy_for("BPMEDS"),
            Some(&ImputationStrategy::Sentinel(-1.0))
        );
    }

    #[test]
    fn test_outlier_policy_is_joint_knn() {
        let config = PipelineConfig::default();
        let policy = config.outlier_policy();
        assert_eq!(policy.columns().len(), 7);
        for column in &config.outlier_columns {
            match policy.strategy_for(column) {
                Some(ImputationStrategy::Knn { k, features }) => {
                    assert_eq!(*k, 3);
                    assert_eq!(features, &KnnFeatures::Columns(config.outlier_columns.clone()));
                }
                other => panic!("unexpected strategy for {}: {:?}", column, other),
            }
        }
    }

    #[test]
    fn test_config_from_partial_json() {
        let json = r#"{ "outlier_knn_neighbors": 4, "sentinel_value": -9.0 }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.outlier_knn_neighbors, 4);
        assert_eq!(config.sentinel_value, -9.0);
        assert_eq!(config.lower_quantile, 0.2);
    }
}
