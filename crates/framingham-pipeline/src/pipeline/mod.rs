//! Pipeline module.
//!
//! This module provides the end-to-end pipeline and its stages: outlier
//! detection and policy-driven imputation.

mod builder;
mod executor;
pub mod outliers;

pub use builder::{Pipeline, PipelineBuilder};
pub use executor::{FillRecord, Imputed, Imputer, impute};
pub use outliers::{
    OutlierBounds, OutlierDetector, OutlierMask, OutlierMasks, detect_outliers, mask_outliers,
};
