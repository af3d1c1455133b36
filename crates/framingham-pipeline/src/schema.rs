//! Record schema and column selection.
//!
//! The raw source carries many more fields than the analysis uses. The
//! schema fixes the projected feature set, its order, and whether each field
//! is a continuous measurement or a coded category. Every schema column is
//! stored as `Float64` with polars nulls for missing cells.

use crate::error::{PipelineError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const BMI: &str = "BMI";
pub const AGE: &str = "AGE";
pub const SEX: &str = "SEX";
pub const TOTCHOL: &str = "TOTCHOL";
pub const SYSBP: &str = "SYSBP";
pub const DIABP: &str = "DIABP";
pub const CURSMOKE: &str = "CURSMOKE";
pub const DIABETES: &str = "DIABETES";
pub const BPMEDS: &str = "BPMEDS";
pub const HEARTRTE: &str = "HEARTRTE";
pub const GLUCOSE: &str = "GLUCOSE";
pub const ANYCHD: &str = "ANYCHD";
pub const PERIOD: &str = "PERIOD";

/// Continuous measurements checked for outliers.
pub const CONTINUOUS_COLUMNS: [&str; 7] = [BMI, AGE, TOTCHOL, SYSBP, DIABP, HEARTRTE, GLUCOSE];

/// Coded categorical fields.
pub const CATEGORICAL_COLUMNS: [&str; 6] = [SEX, CURSMOKE, DIABETES, BPMEDS, ANYCHD, PERIOD];

/// How a field's values are to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// A measured quantity (quantiles and means are meaningful).
    Continuous,
    /// A coded category (only counts are meaningful).
    Categorical,
}

/// One column of the record schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldSpec {
    fn new(name: &str, kind: FieldKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            nullable: true,
        }
    }
}

/// Fixed, ordered list of fields making up a Record Table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSchema {
    fields: Vec<FieldSpec>,
}

impl Default for RecordSchema {
    fn default() -> Self {
        Self::framingham()
    }
}

impl RecordSchema {
    /// The feature set used for the body-mass-index / coronary heart disease
    /// analysis of the Framingham teaching extract.
    pub fn framingham() -> Self {
        use FieldKind::{Categorical, Continuous};

        let fields = [
            (BMI, Continuous),
            (AGE, Continuous),
            (SEX, Categorical),
            (TOTCHOL, Continuous),
            (SYSBP, Continuous),
            (DIABP, Continuous),
            (CURSMOKE, Categorical),
            (DIABETES, Categorical),
            (BPMEDS, Categorical),
            (HEARTRTE, Continuous),
            (GLUCOSE, Continuous),
            (ANYCHD, Categorical),
            (PERIOD, Categorical),
        ]
        .into_iter()
        .map(|(name, kind)| FieldSpec::new(name, kind))
        .collect();

        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` is a schema field coded as a category.
    pub fn is_categorical(&self, name: &str) -> bool {
        self.field(name)
            .is_some_and(|f| f.kind == FieldKind::Categorical)
    }

    /// Project `df` to the schema fields, in schema order, casting each to
    /// `Float64`.
    ///
    /// A missing field, a value that does not parse as a number, or a null
    /// in a non-nullable field is reported as a data-load failure: the
    /// source does not have the expected shape.
    pub fn select(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.fields.len());

        for field in &self.fields {
            let column = df.column(&field.name).map_err(|_| {
                PipelineError::data_load("table", format!("missing column '{}'", field.name))
            })?;

            let series = column
                .as_materialized_series()
                .strict_cast(&DataType::Float64)
                .map_err(|e| {
                    PipelineError::data_load(
                        "table",
                        format!("column '{}' is not numeric: {}", field.name, e),
                    )
                })?;
            let series = nan_to_null(&series)?;

            if !field.nullable && series.null_count() > 0 {
                return Err(PipelineError::data_load(
                    "table",
                    format!("column '{}' must not contain missing values", field.name),
                ));
            }

            columns.push(series.into());
        }

        let selected = DataFrame::new(columns)?;
        debug!(
            "Selected {} of {} columns ({} rows)",
            selected.width(),
            df.width(),
            selected.height()
        );
        Ok(selected)
    }
}

/// Missing cells are nulls; a NaN that survived parsing becomes one.
fn nan_to_null(series: &Series) -> Result<Series> {
    let values: Float64Chunked = series
        .f64()?
        .iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values.with_name(series.name().clone()).into_series())
}

/// Project the raw table to the Framingham feature set.
pub fn select_columns(df: &DataFrame) -> Result<DataFrame> {
    RecordSchema::framingham().select(df)
}
