//! Statistics reporting module.
//!
//! Everything a presentation layer displays is computed here: descriptive
//! statistics, correlations, missing-value counts and category breakdowns.
//! Nothing in this module modifies a table.

pub mod categories;
pub mod missingness;
pub mod statistics;

pub use categories::{
    BmiCategory, BmiCategoryStats, CategoryProportions, CategoryShare, DEFAULT_HISTOGRAM_BINS,
    Histogram, PeriodMeans, category_proportions, chd_prevalence_by_bmi, histogram, period_means,
    value_proportions,
};
pub use missingness::{ColumnMissing, MissingnessReport, PeriodMissing, missingness};
pub use statistics::{
    ColumnSummary, CorrelationMatrix, StatsReport, StrongCorrelation, describe, strong_correlations,
};
