//! Descriptive statistics and correlations.

use crate::error::Result;
use crate::utils::{
    column_values, mean, numeric_column_names, present, quantile_sorted, sample_std, sorted,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Summary of one numeric column over its present values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub count: usize,
    pub mean: Option<f64>,
    /// Sample standard deviation; undefined below two values.
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub q25: Option<f64>,
    pub q50: Option<f64>,
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

impl ColumnSummary {
    fn from_values(name: &str, values: &[Option<f64>]) -> Self {
        let present = present(values);
        let sorted = sorted(&present);

        Self {
            name: name.to_string(),
            count: sorted.len(),
            mean: mean(&sorted),
            std: sample_std(&sorted),
            min: sorted.first().copied(),
            q25: quantile_sorted(&sorted, 0.25),
            q50: quantile_sorted(&sorted, 0.5),
            q75: quantile_sorted(&sorted, 0.75),
            max: sorted.last().copied(),
        }
    }
}

/// Square Pearson correlation matrix over pairwise-complete observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major; `None` where the coefficient is undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.values[i][j]
    }
}

/// A pair of distinct columns whose correlation passed a threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrongCorrelation {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
}

/// Output of [`describe`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatsReport {
    Summary {
        row_count: usize,
        columns: Vec<ColumnSummary>,
        correlation: CorrelationMatrix,
    },
    /// The table has no numeric column to summarise.
    NoNumericColumns,
}

impl StatsReport {
    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        match self {
            Self::Summary { columns, .. } => columns.iter().find(|c| c.name == name),
            Self::NoNumericColumns => None,
        }
    }

    pub fn correlation(&self) -> Option<&CorrelationMatrix> {
        match self {
            Self::Summary { correlation, .. } => Some(correlation),
            Self::NoNumericColumns => None,
        }
    }
}

/// Summarise every numeric column of `df` and correlate them pairwise.
pub fn describe(df: &DataFrame) -> Result<StatsReport> {
    let names = numeric_column_names(df);
    if names.is_empty() {
        warn!("No numeric columns to describe");
        return Ok(StatsReport::NoNumericColumns);
    }

    let data: Vec<Vec<Option<f64>>> = names
        .iter()
        .map(|name| column_values(df, name))
        .collect::<Result<_>>()?;

    let columns = names
        .iter()
        .zip(&data)
        .map(|(name, values)| ColumnSummary::from_values(name, values))
        .collect();

    let correlation = correlation_matrix(&names, &data);
    debug!("Described {} numeric columns over {} rows", names.len(), df.height());

    Ok(StatsReport::Summary {
        row_count: df.height(),
        columns,
        correlation,
    })
}

fn correlation_matrix(names: &[String], data: &[Vec<Option<f64>>]) -> CorrelationMatrix {
    let n = names.len();
    let mut values = vec![vec![None; n]; n];

    for i in 0..n {
        for j in i..n {
            let r = pearson(&data[i], &data[j]);
            // Only a defined self-correlation is exactly one
            let r = if i == j { r.map(|_| 1.0) } else { r };
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    CorrelationMatrix {
        columns: names.to_vec(),
        values,
    }
}

/// Pearson coefficient over the rows where both cells are present.
fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }
    Some((sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0))
}

/// Off-diagonal pairs with `|r| >= threshold`, each pair reported once.
pub fn strong_correlations(matrix: &CorrelationMatrix, threshold: f64) -> Vec<StrongCorrelation> {
    let mut strong = Vec::new();
    for (i, row) in matrix.values.iter().enumerate() {
        for (j, value) in row.iter().enumerate().skip(i + 1) {
            if let Some(r) = value
                && r.abs() >= threshold
            {
                strong.push(StrongCorrelation {
                    first: matrix.columns[i].clone(),
                    second: matrix.columns[j].clone(),
                    coefficient: *r,
                });
            }
        }
    }
    strong
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    #[test]
    fn test_describe_summary_values() {
        let df = df![
            "AGE" => [Some(40.0), Some(50.0), None, Some(60.0), Some(70.0)],
            "name" => ["a", "b", "c", "d", "e"],
        ]
        .unwrap();

        let report = describe(&df).unwrap();
        let age = report.column("AGE").unwrap();

        assert_eq!(age.count, 4);
        assert_eq!(age.mean, Some(55.0));
        assert_eq!(age.min, Some(40.0));
        assert_eq!(age.max, Some(70.0));
        assert_eq!(age.q50, Some(55.0));
        assert!(close(age.q25, 47.5));
        assert!(close(age.q75, 62.5));
        // Sample variance = 500 / 3
        assert!(close(age.std, (500.0f64 / 3.0).sqrt()));
        assert!(report.column("name").is_none());
    }

    #[test]
    fn test_describe_no_numeric_columns() {
        let df = df!["name" => ["a", "b"]].unwrap();
        assert_eq!(describe(&df).unwrap(), StatsReport::NoNumericColumns);
    }

    #[test]
    fn test_describe_all_missing_column() {
        let df = df!["GLUCOSE" => [Option::<f64>::None, None]].unwrap();
        let report = describe(&df).unwrap();
        let glucose = report.column("GLUCOSE").unwrap();
        assert_eq!(glucose.count, 0);
        assert_eq!(glucose.mean, None);
        assert_eq!(glucose.std, None);
    }

    #[test]
    fn test_correlation_perfect_and_inverse() {
        let df = df![
            "SYSBP" => [110.0, 120.0, 130.0, 140.0],
            "DIABP" => [70.0, 75.0, 80.0, 85.0],
            "HEARTRTE" => [90.0, 80.0, 70.0, 60.0],
        ]
        .unwrap();

        let report = describe(&df).unwrap();
        let corr = report.correlation().unwrap();

        assert!(close(corr.get("SYSBP", "DIABP"), 1.0));
        assert!(close(corr.get("SYSBP", "HEARTRTE"), -1.0));
        assert_eq!(corr.get("DIABP", "DIABP"), Some(1.0));
    }

    #[test]
    fn test_correlation_is_symmetric_and_bounded() {
        let df = df![
            "a" => [Some(1.0), Some(4.0), None, Some(2.0), Some(8.0)],
            "b" => [Some(3.0), Some(1.0), Some(5.0), Some(9.0), Some(2.0)],
            "c" => [Some(2.0), None, Some(7.0), Some(1.0), Some(6.0)],
        ]
        .unwrap();
        let report = describe(&df).unwrap();
        let corr = report.correlation().unwrap();

        for (i, row) in corr.values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                assert_eq!(*value, corr.values[j][i]);
                if let Some(r) = value {
                    assert!((-1.0..=1.0).contains(r));
                }
            }
        }
    }

    #[test]
    fn test_correlation_zero_variance_is_undefined() {
        let df = df![
            "a" => [1.0, 1.0, 1.0],
            "b" => [1.0, 2.0, 3.0],
        ]
        .unwrap();
        let report = describe(&df).unwrap();
        let corr = report.correlation().unwrap();
        assert_eq!(corr.get("a", "b"), None);
        assert_eq!(corr.get("a", "a"), None);
    }

    #[test]
    fn test_strong_correlations_upper_triangle_only() {
        let df = df![
            "SYSBP" => [110.0, 120.0, 130.0, 140.0],
            "DIABP" => [70.0, 76.0, 79.0, 85.0],
            "AGE" => [50.0, 40.0, 52.0, 45.0],
        ]
        .unwrap();
        let report = describe(&df).unwrap();
        let strong = strong_correlations(report.correlation().unwrap(), 0.5);

        assert_eq!(strong.len(), 1);
        assert_eq!(strong[0].first, "SYSBP");
        assert_eq!(strong[0].second, "DIABP");
        assert!(strong[0].coefficient > 0.9);
    }

    #[test]
    fn test_report_serializes_with_kind_tag() {
        let json = serde_json::to_value(StatsReport::NoNumericColumns).unwrap();
        assert_eq!(json["kind"], "no_numeric_columns");
    }
}
