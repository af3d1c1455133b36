//! Category breakdowns: value proportions, per-period means, BMI categories
//! with coronary heart disease prevalence, and histograms.

use crate::error::{PipelineError, Result, ResultExt};
use crate::schema::{ANYCHD, BMI, CATEGORICAL_COLUMNS, PERIOD};
use crate::utils::{column_values, mean, present};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_HISTOGRAM_BINS: usize = 30;
pub const MAX_HISTOGRAM_BINS: usize = 50;

/// One observed value of a categorical column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub value: f64,
    pub count: usize,
    /// Share of present cells, in percent.
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryProportions {
    pub column: String,
    /// Most frequent first.
    pub shares: Vec<CategoryShare>,
}

/// Proportion of each value of `column` among its present cells.
pub fn value_proportions(df: &DataFrame, column: &str) -> Result<CategoryProportions> {
    let values = present(&column_values(df, column)?);

    // f64 has no Ord; key on the bit pattern of normalised values
    let mut counts: BTreeMap<u64, (f64, usize)> = BTreeMap::new();
    for value in &values {
        let value = if *value == 0.0 { 0.0 } else { *value };
        counts.entry(value.to_bits()).or_insert((value, 0)).1 += 1;
    }

    let total = values.len() as f64;
    let mut shares: Vec<CategoryShare> = counts
        .into_values()
        .map(|(value, count)| CategoryShare {
            value,
            count,
            percent: count as f64 / total * 100.0,
        })
        .collect();
    shares.sort_by(|a, b| b.count.cmp(&a.count).then(a.value.total_cmp(&b.value)));

    Ok(CategoryProportions {
        column: column.to_string(),
        shares,
    })
}

/// Value proportions for every categorical schema column present in `df`.
pub fn category_proportions(df: &DataFrame) -> Result<Vec<CategoryProportions>> {
    CATEGORICAL_COLUMNS
        .iter()
        .filter(|c| df.column(c).is_ok())
        .map(|c| value_proportions(df, c))
        .collect()
}

/// Means of each column per examination period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodMeans {
    pub periods: Vec<f64>,
    /// Column name to one mean per entry of `periods`.
    pub means: BTreeMap<String, Vec<Option<f64>>>,
}

/// Average `columns` within each PERIOD, ordered by period.
pub fn period_means<S: AsRef<str>>(df: &DataFrame, columns: &[S]) -> Result<PeriodMeans> {
    df.column(PERIOD)
        .map_err(|_| PipelineError::ColumnNotFound(PERIOD.to_string()))?;

    let aggs: Vec<Expr> = columns
        .iter()
        .map(|c| col(c.as_ref()).cast(DataType::Float64).mean())
        .collect();

    let grouped = df
        .clone()
        .lazy()
        .filter(col(PERIOD).is_not_null())
        .group_by([col(PERIOD)])
        .agg(aggs)
        .sort([PERIOD], SortMultipleOptions::default())
        .collect()
        .context("Averaging per period")?;

    let periods = column_values(&grouped, PERIOD)?.into_iter().flatten().collect();
    let mut means = BTreeMap::new();
    for column in columns {
        let column = column.as_ref();
        means.insert(column.to_string(), column_values(&grouped, column)?);
    }

    Ok(PeriodMeans { periods, means })
}

/// Body-mass-index category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiCategory {
    pub const ALL: [BmiCategory; 4] = [
        BmiCategory::Underweight,
        BmiCategory::Normal,
        BmiCategory::Overweight,
        BmiCategory::Obese,
    ];

    /// Right-closed bins (0, 18.5], (18.5, 25], (25, 30], (30, 60].
    pub fn from_bmi(bmi: f64) -> Option<Self> {
        match bmi {
            b if b <= 0.0 || b > 60.0 || b.is_nan() => None,
            b if b <= 18.5 => Some(Self::Underweight),
            b if b <= 25.0 => Some(Self::Normal),
            b if b <= 30.0 => Some(Self::Overweight),
            _ => Some(Self::Obese),
        }
    }
}

impl fmt::Display for BmiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Underweight => "Underweight",
            Self::Normal => "Normal",
            Self::Overweight => "Overweight",
            Self::Obese => "Obese",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmiCategoryStats {
    pub category: BmiCategory,
    pub count: usize,
    /// Mean of ANYCHD over the category's rows; `None` for an empty category.
    pub chd_prevalence: Option<f64>,
}

/// CHD prevalence for each BMI category, empty categories included.
pub fn chd_prevalence_by_bmi(df: &DataFrame) -> Result<Vec<BmiCategoryStats>> {
    let bmi = column_values(df, BMI)?;
    let chd = column_values(df, ANYCHD)?;

    let mut groups: BTreeMap<BmiCategory, (usize, Vec<f64>)> = BmiCategory::ALL
        .iter()
        .map(|c| (*c, (0, Vec::new())))
        .collect();

    for (bmi, chd) in bmi.iter().zip(&chd) {
        if let Some(category) = bmi.and_then(BmiCategory::from_bmi)
            && let Some(entry) = groups.get_mut(&category)
        {
            entry.0 += 1;
            if let Some(chd) = chd {
                entry.1.push(*chd);
            }
        }
    }

    Ok(groups
        .into_iter()
        .map(|(category, (count, outcomes))| BmiCategoryStats {
            category,
            count,
            chd_prevalence: mean(&outcomes),
        })
        .collect())
}

/// Fixed-width histogram of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub column: String,
    /// `counts.len() + 1` ascending bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

/// Bin the present values of `column` into `bins` equal-width bins spanning
/// its range. The last bin is closed on the right.
pub fn histogram(df: &DataFrame, column: &str, bins: usize) -> Result<Histogram> {
    if !(1..=MAX_HISTOGRAM_BINS).contains(&bins) {
        return Err(PipelineError::precondition(
            column,
            format!("histogram bins must be in 1..={}, got {}", MAX_HISTOGRAM_BINS, bins),
        ));
    }

    let values = present(&column_values(df, column)?);
    let (min, max) = values
        .iter()
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            Some((lo, hi)) => Some((lo.min(*v), hi.max(*v))),
            None => Some((*v, *v)),
        })
        .ok_or_else(|| PipelineError::precondition(column, "no present values to bin"))?;

    let (lo, hi) = if min == max { (min - 0.5, max + 0.5) } else { (min, max) };
    let width = (hi - lo) / bins as f64;
    let edges: Vec<f64> = (0..=bins).map(|i| lo + width * i as f64).collect();

    let mut counts = vec![0; bins];
    for value in values {
        let idx = (((value - lo) / width).floor() as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(Histogram {
        column: column.to_string(),
        edges,
        counts,
    })
}
