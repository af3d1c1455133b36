use crate::pipeline::outliers::{OutlierBounds, OutlierMasks};
use crate::pipeline::FillRecord;
use crate::reporting::{
    BmiCategoryStats, CategoryProportions, MissingnessReport, PeriodMeans, StatsReport,
    StrongCorrelation,
};
use chrono::{DateTime, Utc};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

// ============================================================================
// Pipeline Output
// ============================================================================

/// Everything a pipeline run produces.
///
/// The tables are kept so a caller can export or re-analyse them; the rest
/// is summarised by [`RunReport`].
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Selected columns of the source, before any imputation.
    pub selected: DataFrame,
    /// After the baseline fill of the policy columns.
    pub baseline: DataFrame,
    /// After outlier masking and re-imputation.
    pub cleaned: DataFrame,
    pub outliers: OutlierMasks,
    pub baseline_fills: Vec<FillRecord>,
    pub outlier_fills: Vec<FillRecord>,
    pub stats: StatsReport,
    pub strong_correlations: Vec<StrongCorrelation>,
    /// Missing values of the selected table.
    pub missingness: MissingnessReport,
    pub categories: Vec<CategoryProportions>,
    pub chd_by_bmi: Vec<BmiCategoryStats>,
    /// Continuous measurements averaged per examination period.
    pub period_means: PeriodMeans,
    pub duration_ms: u64,
}

impl PipelineOutput {
    /// Serializable summary of this run.
    pub fn report(&self, source: impl Into<String>) -> RunReport {
        let outliers = self
            .outliers
            .masks
            .values()
            .map(|mask| OutlierSummary {
                column: mask.column.clone(),
                flagged: mask.len(),
                bounds: mask.bounds,
            })
            .collect();

        let mut warnings = Vec::new();
        for mask in self.outliers.masks.values() {
            if mask.bounds.is_none() {
                warnings.push(format!(
                    "Column '{}' has no values; outlier detection skipped",
                    mask.column
                ));
            }
        }

        RunReport {
            generated_at: Utc::now(),
            source: source.into(),
            duration_ms: self.duration_ms,
            rows: self.cleaned.height(),
            columns: self.cleaned.width(),
            data_quality_before: completeness(&self.selected),
            data_quality_after: completeness(&self.cleaned),
            baseline_fills: self.baseline_fills.clone(),
            outlier_fills: self.outlier_fills.clone(),
            outliers,
            stats: self.stats.clone(),
            strong_correlations: self.strong_correlations.clone(),
            missingness: self.missingness.clone(),
            categories: self.categories.clone(),
            chd_by_bmi: self.chd_by_bmi.clone(),
            period_means: self.period_means.clone(),
            warnings,
        }
    }
}

/// Share of non-null cells (0.0 - 1.0).
pub fn completeness(df: &DataFrame) -> f32 {
    if df.height() == 0 || df.width() == 0 {
        return 0.0;
    }

    let total_cells = df.height() * df.width();
    let null_count: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
    total_cells.saturating_sub(null_count) as f32 / total_cells as f32
}

// ============================================================================
// Run Report
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub column: String,
    pub flagged: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<OutlierBounds>,
}

/// Summary of a pipeline run, suitable for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    /// URL or path the table was read from.
    pub source: String,
    pub duration_ms: u64,
    pub rows: usize,
    pub columns: usize,
    /// Share of non-null cells in the selected table.
    pub data_quality_before: f32,
    /// Share of non-null cells in the cleaned table.
    pub data_quality_after: f32,
    pub baseline_fills: Vec<FillRecord>,
    pub outlier_fills: Vec<FillRecord>,
    pub outliers: Vec<OutlierSummary>,
    pub stats: StatsReport,
    pub strong_correlations: Vec<StrongCorrelation>,
    pub missingness: MissingnessReport,
    pub categories: Vec<CategoryProportions>,
    pub chd_by_bmi: Vec<BmiCategoryStats>,
    pub period_means: PeriodMeans,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn total_outliers(&self) -> usize {
        self.outliers.iter().map(|o| o.flagged).sum()
    }

    pub fn cells_imputed(&self) -> usize {
        self.baseline_fills
            .iter()
            .chain(&self.outlier_fills)
            .map(|f| f.cells_filled)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[test]
    fn test_completeness() {
        let df = df![
            "a" => [Some(1.0), None],
            "b" => [Some(1.0), Some(2.0)],
        ]
        .unwrap();
        assert!((completeness(&df) - 0.75).abs() < 1e-6);
        assert_eq!(completeness(&DataFrame::empty()), 0.0);
    }
}
