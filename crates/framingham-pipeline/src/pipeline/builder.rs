//! Main imputation pipeline module.
//!
//! This module provides the core `Pipeline` struct and builder for
//! orchestrating load, selection, imputation and reporting.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result, ResultExt};
use crate::loader::DataSource;
use crate::pipeline::executor::Imputer;
use crate::pipeline::outliers::OutlierDetector;
use crate::reporting::{
    category_proportions, chd_prevalence_by_bmi, describe, missingness, period_means,
    strong_correlations,
};
use crate::schema::{CONTINUOUS_COLUMNS, RecordSchema};
use crate::types::PipelineOutput;
use polars::prelude::*;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The end-to-end imputation pipeline.
///
/// Use [`Pipeline::builder()`] to create a new pipeline with custom configuration.
///
/// # Example
///
/// ```rust,ignore
/// use framingham_pipeline::{DataSource, Pipeline, PipelineConfig};
///
/// let output = Pipeline::builder()
///     .config(PipelineConfig::default())
///     .build()?
///     .run(&DataSource::from_env())?;
///
/// println!("{} outliers re-imputed", output.outliers.total());
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    schema: RecordSchema,
    detector: OutlierDetector,
    imputer: Imputer,
}

// Runs are moved onto worker threads by presentation layers
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Pipeline {
    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the table from `source` and process it.
    pub fn run(&self, source: &DataSource) -> Result<PipelineOutput> {
        let raw = source.load()?;
        self.process(&raw)
    }

    /// Process an already loaded raw table.
    ///
    /// The same input always yields the same cleaned table.
    pub fn process(&self, raw: &DataFrame) -> Result<PipelineOutput> {
        self.process_internal(raw).inspect_err(|e| {
            error!("Pipeline error: {}", e);
        })
    }

    fn process_internal(&self, raw: &DataFrame) -> Result<PipelineOutput> {
        let start_time = Instant::now();
        info!("Starting imputation pipeline on {} rows...", raw.height());

        // Step 1: Column selection
        info!("Step 1: Selecting analysis columns...");
        let selected = self.schema.select(raw)?;
        debug!("Selected shape: {:?}", selected.shape());

        // Step 2: Baseline fill
        info!("Step 2: Baseline imputation...");
        let baseline = self
            .imputer
            .impute(&selected, &self.config.baseline_policy())
            .context("Baseline imputation")?;

        // Step 3: Outlier detection, bounded on the selected table
        info!("Step 3: Detecting outliers...");
        let outliers = self
            .detector
            .detect_all(&selected, self.config.outlier_columns.as_slice())?;
        for mask in outliers.masks.values() {
            if mask.bounds.is_none() {
                warn!("Column '{}' has no values to bound", mask.column);
            }
        }

        // Step 4: Outlier re-imputation
        info!("Step 4: Re-imputing {} outlier cells...", outliers.total());
        let cleaned = self
            .imputer
            .impute_flagged(&baseline.table, &self.config.outlier_policy(), &outliers)
            .context("Outlier imputation")?;

        // Step 5: Reporting
        info!("Step 5: Computing statistics...");
        let stats = describe(&cleaned.table)?;
        let strong = stats
            .correlation()
            .map(|m| strong_correlations(m, self.config.correlation_threshold))
            .unwrap_or_default();
        let missing = missingness(&selected)?;
        let categories = category_proportions(&cleaned.table)?;
        let chd_by_bmi = chd_prevalence_by_bmi(&cleaned.table)?;
        let means = period_means(&cleaned.table, &CONTINUOUS_COLUMNS)?;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        info!(
            "Pipeline complete in {}ms: {} missing cells in source, {} outliers",
            duration_ms,
            missing.total_missing,
            outliers.total()
        );

        Ok(PipelineOutput {
            selected,
            baseline: baseline.table,
            cleaned: cleaned.table,
            outliers,
            baseline_fills: baseline.fills,
            outlier_fills: cleaned.fills,
            stats,
            strong_correlations: strong,
            missingness: missing,
            categories,
            chd_by_bmi,
            period_means: means,
            duration_ms,
        })
    }
}

/// Builder for creating a configured [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    config: Option<PipelineConfig>,
}

impl PipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Build the pipeline.
    ///
    /// Fails when the configuration does not validate.
    pub fn build(self) -> Result<Pipeline> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| PipelineError::InvalidConfig(e.to_string()))?;

        Ok(Pipeline {
            detector: OutlierDetector::from_config(&config),
            schema: RecordSchema::framingham(),
            imputer: Imputer,
            config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::column_values;
    use pretty_assertions::assert_eq;

    fn raw() -> DataFrame {
        df![
            "RANDID" => [1i64, 2, 3, 4, 5, 6, 7, 8],
            "SEX" => [1i64, 2, 2, 1, 2, 1, 1, 2],
            "TOTCHOL" => [Some(195.0), Some(250.0), Some(245.0), None, Some(285.0), Some(228.0), Some(205.0), Some(600.0)],
            "AGE" => [39i64, 46, 48, 61, 46, 43, 63, 45],
            "SYSBP" => [106.0, 121.0, 127.5, 150.0, 130.0, 180.0, 138.0, 141.0],
            "DIABP" => [70.0, 81.0, 80.0, 95.0, 84.0, 110.0, 71.0, 89.0],
            "CURSMOKE" => [0i64, 0, 1, 1, 1, 0, 0, 1],
            "BMI" => [Some(26.97), Some(28.73), Some(25.34), Some(28.58), Some(23.1), Some(30.3), None, Some(21.7)],
            "DIABETES" => [0i64, 0, 0, 0, 0, 0, 0, 0],
            "BPMEDS" => [Some(0.0), Some(0.0), None, Some(0.0), Some(0.0), Some(0.0), None, Some(1.0)],
            "HEARTRTE" => [Some(80.0), Some(95.0), Some(75.0), Some(65.0), None, Some(77.0), Some(60.0), Some(79.0)],
            "GLUCOSE" => [Some(77.0), Some(76.0), Some(70.0), Some(103.0), Some(85.0), Some(99.0), None, Some(78.0)],
            "ANYCHD" => [1i64, 0, 0, 1, 0, 1, 0, 0],
            "PERIOD" => [1i64, 1, 1, 1, 2, 2, 3, 3],
        ]
        .unwrap()
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let config = PipelineConfig {
            lower_quantile: 0.9,
            ..PipelineConfig::default()
        };
        let err = Pipeline::builder().config(config).build().unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_process_leaves_no_missing_policy_cells() {
        let pipeline = Pipeline::builder().build().unwrap();
        let output = pipeline.process(&raw()).unwrap();

        for column in ["GLUCOSE", "TOTCHOL", "BMI", "BPMEDS", "HEARTRTE", "AGE", "SYSBP", "DIABP"] {
            assert_eq!(output.cleaned.column(column).unwrap().null_count(), 0, "{column}");
        }
        assert_eq!(output.cleaned.width(), 13);
    }

    #[test]
    fn test_process_sentinel_count_matches_source_missing() {
        let output = Pipeline::builder().build().unwrap().process(&raw()).unwrap();
        let bpmeds = column_values(&output.cleaned, "BPMEDS").unwrap();
        assert_eq!(bpmeds.iter().filter(|v| **v == Some(-1.0)).count(), 2);
    }

    #[test]
    fn test_process_flags_and_replaces_outlier() {
        let output = Pipeline::builder().build().unwrap().process(&raw()).unwrap();

        let totchol = output.outliers.get("TOTCHOL").unwrap();
        assert!(totchol.rows.contains(&7));

        let cleaned = column_values(&output.cleaned, "TOTCHOL").unwrap();
        let cleaned_value = cleaned[7].unwrap();
        assert!(cleaned_value < 600.0 && cleaned_value >= 195.0);
    }

    #[test]
    fn test_process_is_deterministic() {
        let pipeline = Pipeline::builder().build().unwrap();
        let first = pipeline.process(&raw()).unwrap();
        let second = pipeline.process(&raw()).unwrap();
        assert!(first.cleaned.equals_missing(&second.cleaned));
        assert_eq!(first.stats, second.stats);
    }

    #[test]
    fn test_process_reports_source_missingness() {
        let output = Pipeline::builder().build().unwrap().process(&raw()).unwrap();
        assert_eq!(output.missingness.missing("BPMEDS"), Some(2));
        assert_eq!(output.missingness.missing("AGE"), Some(0));
        assert_eq!(output.missingness.by_period.len(), 3);
    }

    #[test]
    fn test_process_missing_column_is_data_load_error() {
        let df = raw().drop("GLUCOSE").unwrap();
        let err = Pipeline::builder().build().unwrap().process(&df).unwrap_err();
        assert!(err.is_data_load());
    }
}
