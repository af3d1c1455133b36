//! Shared utilities for the pipeline.
//!
//! Column extraction and the small amount of order statistics every stage
//! needs. Missing cells are `None` throughout; a NaN read from the source is
//! treated as missing.

use crate::error::{PipelineError, Result};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Names of all numeric columns, in table order.
pub fn numeric_column_names(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

// =============================================================================
// Column Access
// =============================================================================

/// Extract a column as `f64` cells, with nulls and NaN as `None`.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let column = df
        .column(name)
        .map_err(|_| PipelineError::ColumnNotFound(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    let values = series
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

/// Present values of a column, dropping missing cells.
pub fn present(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

// =============================================================================
// Order Statistics
// =============================================================================

/// Sort values ascending. Inputs never contain NaN.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Quantile of already sorted values with linear interpolation between the
/// two closest order statistics (`pos = q * (n - 1)`).
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let fraction = pos - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Quantile of unsorted values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), q)
}

/// Median of unsorted values.
pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator). Undefined below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_column_values_nulls_and_integers() {
        let df = df![
            "a" => [Some(1i64), None, Some(3)],
        ]
        .unwrap();
        assert_eq!(column_values(&df, "a").unwrap(), vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_column_values_nan_is_missing() {
        let df = df![
            "a" => [1.0, f64::NAN, 3.0],
        ]
        .unwrap();
        assert_eq!(column_values(&df, "a").unwrap(), vec![Some(1.0), None, Some(3.0)]);
    }

    #[test]
    fn test_column_values_unknown_column() {
        let df = df!["a" => [1.0]].unwrap();
        let err = column_values(&df, "b").unwrap_err();
        assert!(matches!(err, PipelineError::ColumnNotFound(name) if name == "b"));
    }

    #[test]
    fn test_quantile_linear_interpolation() {
        // pos = 0.2 * 4 = 0.8 -> 1 + 0.8 * (2 - 1)
        let values = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert!((quantile(&values, 0.2).unwrap() - 1.8).abs() < 1e-12);
        assert!((quantile(&values, 0.8).unwrap() - 4.2).abs() < 1e-12);
        assert_eq!(quantile(&values, 0.0), Some(1.0));
        assert_eq!(quantile(&values, 1.0), Some(5.0));
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn test_sample_std() {
        // Mean = 3, variance = 10 / 4 = 2.5
        let std = sample_std(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert!((std - 2.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(sample_std(&[1.0]), None);
    }
}
