//! Outlier detection module.
//!
//! Flags values outside `[Q_lo - m * IQR, Q_hi + m * IQR]`, where the
//! quantiles default to the 0.2 / 0.8 cut rather than the textbook quartiles.
//! Missing cells are never flagged. A column whose quantiles coincide has an
//! IQR of zero, so every value different from that quantile is flagged.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::schema::RecordSchema;
use crate::utils::{column_values, is_numeric_dtype, present, quantile_sorted, sorted};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Bounds computed for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Rows of one column whose value lies outside the column's bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierMask {
    pub column: String,
    /// `None` when the column has no present values.
    pub bounds: Option<OutlierBounds>,
    pub rows: BTreeSet<usize>,
}

impl OutlierMask {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Masks for several columns, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutlierMasks {
    pub masks: BTreeMap<String, OutlierMask>,
}

impl OutlierMasks {
    pub fn get(&self, column: &str) -> Option<&OutlierMask> {
        self.masks.get(column)
    }

    /// Total flagged cells across all columns.
    pub fn total(&self) -> usize {
        self.masks.values().map(OutlierMask::len).sum()
    }
}

/// Detects outliers with an inter-quantile-range rule.
#[derive(Debug, Clone)]
pub struct OutlierDetector {
    lower_quantile: f64,
    upper_quantile: f64,
    multiplier: f64,
    schema: RecordSchema,
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

impl OutlierDetector {
    pub fn new(lower_quantile: f64, upper_quantile: f64, multiplier: f64) -> Self {
        Self {
            lower_quantile,
            upper_quantile,
            multiplier,
            schema: RecordSchema::framingham(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.lower_quantile,
            config.upper_quantile,
            config.iqr_multiplier,
        )
    }

    /// Compute bounds from the present values of a column.
    pub fn bounds(&self, values: &[Option<f64>]) -> Option<OutlierBounds> {
        let sorted = sorted(&present(values));
        let q1 = quantile_sorted(&sorted, self.lower_quantile)?;
        let q3 = quantile_sorted(&sorted, self.upper_quantile)?;
        let iqr = q3 - q1;

        Some(OutlierBounds {
            q1,
            q3,
            iqr,
            lower: q1 - self.multiplier * iqr,
            upper: q3 + self.multiplier * iqr,
        })
    }

    /// Flag the rows of `column` lying outside its bounds.
    ///
    /// The column must exist, be numeric, and not be a coded category.
    pub fn detect(&self, df: &DataFrame, column: &str) -> Result<OutlierMask> {
        let dtype = df
            .column(column)
            .map_err(|_| PipelineError::ColumnNotFound(column.to_string()))?
            .dtype()
            .clone();

        if !is_numeric_dtype(&dtype) {
            return Err(PipelineError::precondition(
                column,
                format!("outlier detection needs a numeric column, found {}", dtype),
            ));
        }
        if self.schema.is_categorical(column) {
            return Err(PipelineError::precondition(
                column,
                "outlier detection is undefined for a categorical field",
            ));
        }

        let values = column_values(df, column)?;
        let bounds = self.bounds(&values);

        let rows = match bounds {
            Some(b) => values
                .iter()
                .enumerate()
                .filter_map(|(row, v)| v.filter(|x| !b.contains(*x)).map(|_| row))
                .collect(),
            None => BTreeSet::new(),
        };

        debug!(
            "Column '{}': {} outliers (bounds {:?})",
            column,
            rows.len(),
            bounds.map(|b| (b.lower, b.upper))
        );

        Ok(OutlierMask {
            column: column.to_string(),
            bounds,
            rows,
        })
    }

    /// Detect outliers for each of `columns`.
    pub fn detect_all<S: AsRef<str>>(&self, df: &DataFrame, columns: &[S]) -> Result<OutlierMasks> {
        let mut masks = BTreeMap::new();
        for column in columns {
            let mask = self.detect(df, column.as_ref())?;
            masks.insert(mask.column.clone(), mask);
        }

        let masks = OutlierMasks { masks };
        info!(
            "Detected {} outliers across {} columns",
            masks.total(),
            masks.masks.len()
        );
        Ok(masks)
    }
}

/// Flag outliers of `column` with the default 0.2 / 0.8 cut.
pub fn detect_outliers(df: &DataFrame, column: &str) -> Result<OutlierMask> {
    OutlierDetector::default().detect(df, column)
}

/// Return a copy of `df` with every flagged cell set to missing.
pub fn mask_outliers(df: &DataFrame, masks: &OutlierMasks) -> Result<DataFrame> {
    let mut result = df.clone();

    for mask in masks.masks.values().filter(|m| !m.is_empty()) {
        let values: Vec<Option<f64>> = column_values(df, &mask.column)?
            .into_iter()
            .enumerate()
            .map(|(row, v)| if mask.rows.contains(&row) { None } else { v })
            .collect();
        result.replace(&mask.column, Series::new(mask.column.as_str().into(), values))?;
    }

    Ok(result)
}
