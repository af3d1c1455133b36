//! Framingham Imputation Pipeline Library
//!
//! Missing-value and outlier handling for the public Framingham Heart Study
//! teaching extract, built with Rust and Polars.
//!
//! # Overview
//!
//! - **Column Selection**: projects the source onto a fixed, typed feature set
//! - **Outlier Detection**: widened inter-quantile-range rule (0.2 / 0.8 cut)
//! - **Imputation**: per-column policy of median, sentinel category or KNN fill
//! - **Reporting**: descriptive statistics, correlations, missing-value counts,
//!   category proportions and BMI-category CHD prevalence
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use framingham_pipeline::{DataSource, Pipeline};
//!
//! let output = Pipeline::builder()
//!     .build()?
//!     .run(&DataSource::default())?;
//!
//! println!("{} outliers re-imputed", output.outliers.total());
//! println!("{:?}", output.stats.column("BMI"));
//! ```
//!
//! The stages are usable on their own:
//!
//! ```rust,ignore
//! use framingham_pipeline::*;
//!
//! let table = select_columns(&DataSource::default().load()?)?;
//! let mask = detect_outliers(&table, "TOTCHOL")?;
//! let cleaned = impute(&table, &PipelineConfig::default().baseline_policy())?;
//! let report = describe(&cleaned)?;
//! ```
//!
//! # Configuration
//!
//! Use [`PipelineConfig`] to vary the outlier window or neighbour counts:
//!
//! ```rust,ignore
//! let config = PipelineConfig::builder()
//!     .quantile_cut(0.25, 0.75)
//!     .iqr_multiplier(3.0)
//!     .build()?;
//! ```

pub mod config;
pub mod error;
pub mod imputers;
pub mod loader;
pub mod pipeline;
pub mod reporting;
pub mod schema;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use config::{ConfigValidationError, PipelineConfig, PipelineConfigBuilder};
pub use error::{PipelineError, Result as PipelineResult, ResultExt};
pub use imputers::{
    ImputationPolicy, ImputationStrategy, KNNImputer, KnnFeatures, StatisticalImputer,
};
pub use loader::{DataSource, parse_csv};
pub use pipeline::{
    FillRecord, Imputed, Imputer, OutlierDetector, OutlierMask, OutlierMasks, Pipeline,
    PipelineBuilder, detect_outliers, impute, mask_outliers,
};
pub use reporting::{StatsReport, describe, strong_correlations};
pub use schema::{RecordSchema, select_columns};
pub use types::{PipelineOutput, RunReport};
