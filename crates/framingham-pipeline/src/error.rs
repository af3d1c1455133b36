//! Custom error types for the imputation pipeline.
//!
//! This module provides the error hierarchy using `thiserror`. Every failure
//! is reported synchronously to the immediate caller; nothing is retried,
//! because a run is cheap to trigger again.
//!
//! Errors are serializable so a presentation layer can display them as a
//! `{ code, message }` pair.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The data source could not be fetched or is malformed.
    #[error("Failed to load data from {source_name}: {reason}")]
    DataLoad { source_name: String, reason: String },

    /// A targeted column has no valid values to compute a fill statistic from,
    /// or the fill itself would be ambiguous.
    #[error("Failed to impute column '{column}': {reason}")]
    ImputationFailed { column: String, reason: String },

    /// An operation was called with an argument it does not accept.
    #[error("Precondition violated for column '{column}': {reason}")]
    Precondition { column: String, reason: String },

    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error while fetching the source.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PipelineError {
    /// Shorthand for a [`PipelineError::DataLoad`].
    pub fn data_load(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataLoad {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PipelineError::ImputationFailed`].
    pub fn imputation(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ImputationFailed {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`PipelineError::Precondition`].
    pub fn precondition(column: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Precondition {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for the presentation layer.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::DataLoad { .. } => "DATA_LOAD_ERROR",
            Self::ImputationFailed { .. } => "IMPUTATION_ERROR",
            Self::Precondition { .. } => "PRECONDITION_ERROR",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Http(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check whether the failure happened while acquiring the source table.
    pub fn is_data_load(&self) -> bool {
        match self {
            Self::DataLoad { .. } | Self::Http(_) => true,
            Self::WithContext { source, .. } => source.is_data_load(),
            _ => false,
        }
    }
}

impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PipelineError::data_load("file.csv", "truncated").error_code(),
            "DATA_LOAD_ERROR"
        );
        assert_eq!(
            PipelineError::imputation("GLUCOSE", "no values").error_code(),
            "IMPUTATION_ERROR"
        );
        assert_eq!(
            PipelineError::precondition("SEX", "categorical").error_code(),
            "PRECONDITION_ERROR"
        );
    }

    #[test]
    fn test_is_data_load() {
        assert!(PipelineError::data_load("url", "404").is_data_load());
        assert!(
            PipelineError::data_load("url", "404")
                .with_context("Loading source")
                .is_data_load()
        );
        assert!(!PipelineError::ColumnNotFound("BMI".to_string()).is_data_load());
    }

    #[test]
    fn test_error_serialization() {
        let error = PipelineError::ColumnNotFound("TOTCHOL".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("TOTCHOL"));
    }

    #[test]
    fn test_with_context() {
        let error = PipelineError::imputation("BMI", "entirely missing")
            .with_context("During baseline pass");
        assert!(error.to_string().contains("During baseline pass"));
        assert_eq!(error.error_code(), "IMPUTATION_ERROR");
    }
}
