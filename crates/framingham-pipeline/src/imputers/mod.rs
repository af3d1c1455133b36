//! Imputation module for handling missing values.
//!
//! This module provides the fill strategies:
//! - KNN imputation
//! - Statistical imputation (median, sentinel category)
//!
//! and the policy type mapping columns to them.

mod knn;
mod policy;
mod statistical;

pub use knn::KNNImputer;
pub use policy::{ColumnRule, ImputationPolicy, ImputationStrategy, KnnFeatures};
pub use statistical::{ColumnFill, StatisticalImputer};
