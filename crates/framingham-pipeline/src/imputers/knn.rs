//! K-nearest-neighbour imputation.
//!
//! Distances are NaN-aware Euclidean over the feature columns: only the
//! coordinates present in both rows contribute, and the sum is scaled up by
//! `features / shared` so rows with fewer shared coordinates are not made to
//! look artificially close. Neighbours are averaged with uniform weights, so
//! every imputed value lies within the observed range of the column.

use crate::error::{PipelineError, Result};
use crate::imputers::statistical::ColumnFill;
use crate::utils::{column_values, mean};
use polars::prelude::*;
use std::cmp::Ordering;
use tracing::debug;

pub struct KNNImputer {
    n_neighbors: usize,
}

impl KNNImputer {
    /// Create a new KNN imputer with specified number of neighbors
    pub fn new(n_neighbors: usize) -> Self {
        Self {
            n_neighbors: n_neighbors.max(1), // Ensure at least 1 neighbor
        }
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Impute column `target` of `df` using `features` as the distance space.
    ///
    /// `target` is added to the feature space if absent.
    pub fn fit_transform(
        &self,
        df: &DataFrame,
        target: &str,
        features: &[String],
    ) -> Result<ColumnFill> {
        let mut columns: Vec<String> = features.to_vec();
        if !columns.iter().any(|c| c == target) {
            columns.push(target.to_string());
        }
        let target_col = columns
            .iter()
            .position(|c| c == target)
            .ok_or_else(|| PipelineError::ColumnNotFound(target.to_string()))?;

        let data_matrix = self.create_data_matrix(df, &columns)?;
        self.impute_column(target, &data_matrix, target_col)
    }

    /// Create a row-major data matrix from the dataframe for distance calculations
    fn create_data_matrix(
        &self,
        df: &DataFrame,
        columns: &[String],
    ) -> Result<Vec<Vec<Option<f64>>>> {
        let n_rows = df.height();
        let mut matrix = vec![vec![None; columns.len()]; n_rows];

        for (col_idx, col_name) in columns.iter().enumerate() {
            let values = column_values(df, col_name)?;
            for (row, value) in matrix.iter_mut().zip(values) {
                row[col_idx] = value;
            }
        }

        Ok(matrix)
    }

    /// Fill every missing cell of `target_col` in `data_matrix`.
    fn impute_column(
        &self,
        column: &str,
        data_matrix: &[Vec<Option<f64>>],
        target_col: usize,
    ) -> Result<ColumnFill> {
        let donors: Vec<usize> = (0..data_matrix.len())
            .filter(|&row| data_matrix[row][target_col].is_some())
            .collect();

        let donor_values: Vec<f64> = donors
            .iter()
            .filter_map(|&row| data_matrix[row][target_col])
            .collect();

        let receivers = data_matrix.len() - donors.len();
        if receivers == 0 {
            return Ok(ColumnFill {
                values: data_matrix.iter().map(|row| row[target_col]).collect(),
                filled: 0,
                fill_value: None,
            });
        }

        let fallback = mean(&donor_values).ok_or_else(|| {
            PipelineError::imputation(column, "no rows with a present value to use as neighbours")
        })?;

        debug!(
            "KNN imputing {} cells of '{}' from {} donors (k={})",
            receivers,
            column,
            donors.len(),
            self.n_neighbors
        );

        let mut fallbacks = 0;
        let values = data_matrix
            .iter()
            .enumerate()
            .map(|(row_idx, row)| match row[target_col] {
                Some(value) => Some(value),
                None => {
                    let imputed = self.impute_value(data_matrix, row_idx, target_col, &donors);
                    if imputed.is_none() {
                        fallbacks += 1;
                    }
                    Some(imputed.unwrap_or(fallback))
                }
            })
            .collect();

        if fallbacks > 0 {
            debug!(
                "{} cells of '{}' shared no features with any donor; used donor mean {:.2}",
                fallbacks, column, fallback
            );
        }

        Ok(ColumnFill {
            values,
            filled: receivers,
            fill_value: None,
        })
    }

    /// Mean target value of the k nearest donors, or `None` when the row
    /// shares no present coordinate with any donor.
    fn impute_value(
        &self,
        data_matrix: &[Vec<Option<f64>>],
        target_row: usize,
        target_col: usize,
        donors: &[usize],
    ) -> Option<f64> {
        let receiver = &data_matrix[target_row];
        if receiver.iter().all(Option::is_none) {
            return None;
        }

        let mut distances: Vec<(usize, f64)> = donors
            .iter()
            .filter_map(|&donor| {
                self.calculate_distance(receiver, &data_matrix[donor])
                    .map(|d| (donor, d))
            })
            .collect();

        if distances.is_empty() {
            return None;
        }

        // Sort by distance, then row index, so ties resolve deterministically
        distances.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });

        let k = self.n_neighbors.min(distances.len());
        let neighbour_values: Vec<f64> = distances
            .iter()
            .take(k)
            .filter_map(|(row, _)| data_matrix[*row][target_col])
            .collect();

        mean(&neighbour_values)
    }

    /// NaN-aware Euclidean distance; `None` when no coordinate is present in
    /// both rows.
    fn calculate_distance(&self, row1: &[Option<f64>], row2: &[Option<f64>]) -> Option<f64> {
        let mut sum_squared_diff = 0.0;
        let mut shared = 0;

        for (a, b) in row1.iter().zip(row2) {
            if let (Some(a), Some(b)) = (a, b) {
                sum_squared_diff += (a - b).powi(2);
                shared += 1;
            }
        }

        if shared == 0 {
            return None;
        }

        let weight = row1.len() as f64 / shared as f64;
        Some((weight * sum_squared_diff).sqrt())
    }
}
