//! Imputation executor.
//!
//! Applies an [`ImputationPolicy`] to a table. Every fill is computed from
//! the input table as given, so the outcome does not depend on the order of
//! the rules, and the input is never modified.

use crate::error::{PipelineError, Result, ResultExt};
use crate::imputers::{
    ColumnFill, ImputationPolicy, ImputationStrategy, KNNImputer, KnnFeatures, StatisticalImputer,
};
use crate::pipeline::outliers::{OutlierMasks, mask_outliers};
use crate::utils::column_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What was done to one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillRecord {
    pub column: String,
    pub strategy: String,
    pub cells_filled: usize,
    /// The constant written, for median and sentinel fills.
    pub fill_value: Option<f64>,
}

impl FillRecord {
    /// One-line human-readable description.
    pub fn describe(&self) -> String {
        match self.fill_value {
            Some(value) => format!(
                "Filled {} cells of '{}' with {}: {:.2}",
                self.cells_filled, self.column, self.strategy, value
            ),
            None => format!(
                "Filled {} cells of '{}' with {}",
                self.cells_filled, self.column, self.strategy
            ),
        }
    }
}

/// Result of applying a policy.
#[derive(Debug, Clone)]
pub struct Imputed {
    pub table: DataFrame,
    pub fills: Vec<FillRecord>,
}

impl Imputed {
    pub fn cells_filled(&self) -> usize {
        self.fills.iter().map(|f| f.cells_filled).sum()
    }
}

/// Applies imputation policies to tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct Imputer;

impl Imputer {
    /// Fill the missing cells of every column under `policy`.
    ///
    /// Afterwards those columns contain no missing values.
    pub fn impute(&self, df: &DataFrame, policy: &ImputationPolicy) -> Result<Imputed> {
        let mut table = df.clone();
        let mut fills = Vec::with_capacity(policy.rules().len());

        for rule in policy.rules() {
            let fill = self
                .fill_column(df, &rule.column, &rule.strategy)
                .context(format!("Imputing '{}'", rule.column))?;

            let record = FillRecord {
                column: rule.column.clone(),
                strategy: rule.strategy.label(),
                cells_filled: fill.filled,
                fill_value: fill.fill_value,
            };
            debug!("{}", record.describe());

            table
                .replace(&rule.column, Series::new(rule.column.as_str().into(), fill.values))
                .context(format!("Replacing '{}'", rule.column))?;
            fills.push(record);
        }

        let imputed = Imputed { table, fills };
        info!(
            "Imputed {} cells across {} columns",
            imputed.cells_filled(),
            imputed.fills.len()
        );
        Ok(imputed)
    }

    /// Null out the flagged cells, then fill them along with any cells that
    /// were already missing.
    pub fn impute_flagged(
        &self,
        df: &DataFrame,
        policy: &ImputationPolicy,
        masks: &OutlierMasks,
    ) -> Result<Imputed> {
        let masked = mask_outliers(df, masks)?;
        debug!("Masked {} flagged cells before imputation", masks.total());
        self.impute(&masked, policy)
    }

    fn fill_column(
        &self,
        df: &DataFrame,
        column: &str,
        strategy: &ImputationStrategy,
    ) -> Result<ColumnFill> {
        let fill = match strategy {
            ImputationStrategy::Median => {
                StatisticalImputer::fill_median(column, &column_values(df, column)?)?
            }
            ImputationStrategy::Sentinel(value) => {
                StatisticalImputer::fill_sentinel(column, &column_values(df, column)?, *value)?
            }
            ImputationStrategy::Knn { k, features } => {
                let features: &[String] = match features {
                    KnnFeatures::Isolated => &[],
                    KnnFeatures::Columns(columns) => columns,
                };
                KNNImputer::new(*k).fit_transform(df, column, features)?
            }
        };

        if fill.values.iter().any(Option::is_none) {
            return Err(PipelineError::imputation(column, "cells left unfilled"));
        }
        Ok(fill)
    }
}

/// Fill the missing cells of `df` according to `policy`.
pub fn impute(df: &DataFrame, policy: &ImputationPolicy) -> Result<DataFrame> {
    Imputer.impute(df, policy).map(|imputed| imputed.table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::outliers::OutlierDetector;
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df![
            "BMI" => [Some(22.0), None, Some(30.0), Some(26.0)],
            "BPMEDS" => [Some(0.0), None, None, Some(1.0)],
            "GLUCOSE" => [Some(80.0), Some(100.0), None, Some(90.0)],
            "AGE" => [40.0, 50.0, 60.0, 70.0],
        ]
        .unwrap()
    }

    fn policy() -> ImputationPolicy {
        ImputationPolicy::new()
            .with(
                "GLUCOSE",
                ImputationStrategy::Knn {
                    k: 5,
                    features: KnnFeatures::Isolated,
                },
            )
            .with("BMI", ImputationStrategy::Median)
            .with("BPMEDS", ImputationStrategy::Sentinel(-1.0))
    }

    #[test]
    fn test_impute_fills_every_policy_column() {
        let imputed = Imputer.impute(&sample(), &policy()).unwrap();

        for column in policy().columns() {
            assert_eq!(imputed.table.column(column).unwrap().null_count(), 0);
        }
        assert_eq!(column_values(&imputed.table, "BMI").unwrap()[1], Some(26.0));
        assert_eq!(column_values(&imputed.table, "GLUCOSE").unwrap()[2], Some(90.0));
        assert_eq!(
            column_values(&imputed.table, "BPMEDS").unwrap(),
            vec![Some(0.0), Some(-1.0), Some(-1.0), Some(1.0)]
        );
        assert_eq!(imputed.cells_filled(), 4);
    }

    #[test]
    fn test_impute_does_not_mutate_input() {
        let df = sample();
        let _ = Imputer.impute(&df, &policy()).unwrap();
        assert_eq!(df.column("BMI").unwrap().null_count(), 1);
        assert_eq!(df.column("BPMEDS").unwrap().null_count(), 2);
    }

    #[test]
    fn test_impute_is_order_independent() {
        let reversed = policy()
            .rules()
            .iter()
            .rev()
            .fold(ImputationPolicy::new(), |p, r| p.with(&r.column, r.strategy.clone()));

        let a = impute(&sample(), &policy()).unwrap();
        let b = impute(&sample(), &reversed).unwrap();
        for column in ["BMI", "BPMEDS", "GLUCOSE"] {
            assert_eq!(column_values(&a, column).unwrap(), column_values(&b, column).unwrap());
        }
    }

    #[test]
    fn test_impute_reports_fill_records() {
        let imputed = Imputer.impute(&sample(), &policy()).unwrap();
        let bmi = imputed.fills.iter().find(|f| f.column == "BMI").unwrap();
        assert_eq!(bmi.strategy, "median");
        assert_eq!(bmi.cells_filled, 1);
        assert_eq!(bmi.fill_value, Some(26.0));
        assert!(bmi.describe().contains("median"));
    }

    #[test]
    fn test_impute_entirely_missing_column_fails() {
        let df = df![
            "BMI" => [Option::<f64>::None, None],
        ]
        .unwrap();
        let policy = ImputationPolicy::new().with("BMI", ImputationStrategy::Median);
        let err = Imputer.impute(&df, &policy).unwrap_err();
        assert_eq!(err.error_code(), "IMPUTATION_ERROR");
        assert!(err.to_string().contains("Imputing 'BMI'"));
    }

    #[test]
    fn test_impute_unknown_column_fails() {
        let policy = ImputationPolicy::new().with("CHOL", ImputationStrategy::Median);
        let err = Imputer.impute(&sample(), &policy).unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_impute_flagged_uses_non_flagged_median() {
        let df = df![
            "TOTCHOL" => [Some(200.0), Some(200.0), Some(210.0), None, Some(200.0), Some(190.0), Some(900.0)],
        ]
        .unwrap();
        let masks = OutlierDetector::default().detect_all(&df, &["TOTCHOL"]).unwrap();
        assert_eq!(masks.total(), 1);

        let policy = ImputationPolicy::new().with("TOTCHOL", ImputationStrategy::Median);
        let imputed = Imputer.impute_flagged(&df, &policy, &masks).unwrap();

        let values = column_values(&imputed.table, "TOTCHOL").unwrap();
        // Median of [200, 200, 210, 200, 190] = 200
        assert_eq!(values[3], Some(200.0));
        assert_eq!(values[6], Some(200.0));
        assert_eq!(imputed.fills[0].cells_filled, 2);
    }
}
