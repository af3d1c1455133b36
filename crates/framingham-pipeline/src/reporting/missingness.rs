//! Missing-value counts, overall and per examination period.

use crate::error::{Result, ResultExt};
use crate::schema::PERIOD;
use crate::utils::column_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMissing {
    pub name: String,
    pub missing: usize,
    pub percent: f64,
}

/// Null counts of every column for one examination period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMissing {
    pub period: f64,
    pub counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingnessReport {
    pub row_count: usize,
    pub columns: Vec<ColumnMissing>,
    pub total_missing: usize,
    /// Empty when the table has no PERIOD column.
    pub by_period: Vec<PeriodMissing>,
}

impl MissingnessReport {
    pub fn missing(&self, column: &str) -> Option<usize> {
        self.columns.iter().find(|c| c.name == column).map(|c| c.missing)
    }
}

/// Count missing cells per column, and per PERIOD when the table has one.
pub fn missingness(df: &DataFrame) -> Result<MissingnessReport> {
    let row_count = df.height();
    let columns: Vec<ColumnMissing> = df
        .get_columns()
        .iter()
        .map(|col| {
            let missing = col.null_count();
            ColumnMissing {
                name: col.name().to_string(),
                missing,
                percent: if row_count == 0 {
                    0.0
                } else {
                    missing as f64 / row_count as f64 * 100.0
                },
            }
        })
        .collect();
    let total_missing = columns.iter().map(|c| c.missing).sum();

    let by_period = if df.column(PERIOD).is_ok() {
        missing_by_period(df)?
    } else {
        Vec::new()
    };

    Ok(MissingnessReport {
        row_count,
        columns,
        total_missing,
        by_period,
    })
}

fn missing_by_period(df: &DataFrame) -> Result<Vec<PeriodMissing>> {
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .filter(|n| n != PERIOD)
        .collect();

    let grouped = df
        .clone()
        .lazy()
        .filter(col(PERIOD).is_not_null())
        .group_by([col(PERIOD)])
        .agg(
            names
                .iter()
                .map(|n| col(n.as_str()).null_count())
                .collect::<Vec<_>>(),
        )
        .sort([PERIOD], SortMultipleOptions::default())
        .collect()
        .context("Counting missing values per period")?;

    let periods = column_values(&grouped, PERIOD)?;
    let mut counts: Vec<BTreeMap<String, usize>> = vec![BTreeMap::new(); periods.len()];
    for name in &names {
        for (row, count) in column_values(&grouped, name)?.into_iter().enumerate() {
            counts[row].insert(name.clone(), count.unwrap_or(0.0) as usize);
        }
    }

    Ok(periods
        .into_iter()
        .zip(counts)
        .filter_map(|(period, counts)| period.map(|period| PeriodMissing { period, counts }))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> DataFrame {
        df![
            "GLUCOSE" => [None, Some(80.0), None, Some(95.0), None],
            "BMI" => [Some(22.0), None, Some(25.0), Some(30.0), Some(28.0)],
            "PERIOD" => [1.0, 1.0, 2.0, 3.0, 3.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_missingness_counts() {
        let report = missingness(&sample()).unwrap();
        assert_eq!(report.row_count, 5);
        assert_eq!(report.missing("GLUCOSE"), Some(3));
        assert_eq!(report.missing("BMI"), Some(1));
        assert_eq!(report.missing("PERIOD"), Some(0));
        assert_eq!(report.total_missing, 4);
        assert!((report.columns[0].percent - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_missingness_by_period() {
        let report = missingness(&sample()).unwrap();
        let periods: Vec<f64> = report.by_period.iter().map(|p| p.period).collect();
        assert_eq!(periods, vec![1.0, 2.0, 3.0]);

        assert_eq!(report.by_period[0].counts["GLUCOSE"], 1);
        assert_eq!(report.by_period[0].counts["BMI"], 1);
        assert_eq!(report.by_period[1].counts["GLUCOSE"], 1);
        assert_eq!(report.by_period[2].counts["GLUCOSE"], 1);
        assert_eq!(report.by_period[2].counts["BMI"], 0);
    }

    #[test]
    fn test_missingness_without_period() {
        let df = df!["BMI" => [Some(1.0), None]].unwrap();
        let report = missingness(&df).unwrap();
        assert!(report.by_period.is_empty());
        assert_eq!(report.total_missing, 1);
    }
}
