//! Statistical imputation methods.
//!
//! Provides median and sentinel filling. Both work on a single column's
//! cells and return a new vector; the input is never modified.

use crate::error::{PipelineError, Result};
use crate::utils::{median, present};

/// Filled cells of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFill {
    pub values: Vec<Option<f64>>,
    /// Number of cells that were missing and now hold a value.
    pub filled: usize,
    /// The constant written into every filled cell, when there is one.
    pub fill_value: Option<f64>,
}

/// Statistical imputation methods for filling missing values.
pub struct StatisticalImputer;

impl StatisticalImputer {
    /// Fill missing cells with the median of the present ones.
    pub fn fill_median(column: &str, values: &[Option<f64>]) -> Result<ColumnFill> {
        let median_val = median(&present(values)).ok_or_else(|| {
            PipelineError::imputation(column, "no present values to compute a median from")
        })?;
        Ok(Self::fill_with_value(values, median_val))
    }

    /// Fill missing cells with an out-of-domain category code.
    ///
    /// Fails if any present value already equals `sentinel`, because the
    /// code would then no longer identify the filled cells.
    pub fn fill_sentinel(
        column: &str,
        values: &[Option<f64>],
        sentinel: f64,
    ) -> Result<ColumnFill> {
        if let Some(row) = values.iter().position(|v| *v == Some(sentinel)) {
            return Err(PipelineError::imputation(
                column,
                format!(
                    "sentinel {} collides with an observed value (row {})",
                    sentinel, row
                ),
            ));
        }

        Ok(Self::fill_with_value(values, sentinel))
    }

    fn fill_with_value(values: &[Option<f64>], fill_value: f64) -> ColumnFill {
        let filled = values.iter().filter(|v| v.is_none()).count();
        let values = values
            .iter()
            .map(|v| Some(v.unwrap_or(fill_value)))
            .collect();

        ColumnFill {
            values,
            filled,
            fill_value: Some(fill_value),
        }
    }
}
