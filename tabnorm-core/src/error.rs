//! Error types for the normalization pipeline.
//!
//! Validation and strategy problems stop a run at the stage that found them.
//! Constraint violations are never errors; they are collected into a
//! [`ValidationReport`](crate::validator::ValidationReport) and the caller
//! decides whether to proceed.

use thiserror::Error;

use crate::models::DataType;

/// A column whose observed type disagrees with the expected type.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TypeMismatch {
    /// Column name
    pub column: String,
    /// Type requested by the caller
    pub expected: DataType,
    /// Type inferred from the data, `None` when the column is absent
    pub observed: Option<DataType>,
}

impl std::fmt::Display for TypeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.observed {
            Some(observed) => write!(
                f,
                "column '{}': expected type '{}', got '{}'",
                self.column, self.expected, observed
            ),
            None => write!(f, "expected column '{}' not found in data", self.column),
        }
    }
}

/// Main error type for normalization operations.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// Observed column types disagree with the expected types
    #[error("Type validation failed with {} mismatches: {}", .mismatches.len(), join_mismatches(.mismatches))]
    Validation { mismatches: Vec<TypeMismatch> },

    /// NULL strategy incompatible with the column's type
    #[error("Strategy '{strategy}' cannot be applied to column '{column}' of type '{data_type}'")]
    Strategy {
        column: String,
        strategy: String,
        data_type: DataType,
    },

    /// A derived table still violates 3NF after decomposition
    #[error(
        "Derived table '{table}' still violates 3NF: {determinant:?} determines non-key column '{dependent}'"
    )]
    DependencyAmbiguity {
        table: String,
        determinant: Vec<String>,
        dependent: String,
    },

    /// A proposed foreign key does not hold in the decomposed data
    #[error("Referential integrity check failed: {child_table}{child_columns:?} -> {parent_table}")]
    ReferentialIntegrity {
        child_table: String,
        child_columns: Vec<String>,
        parent_table: String,
    },

    /// The loader cannot read the given input
    #[error("Unsupported input format: {format}")]
    UnsupportedFormat { format: String },

    /// The table violates the raw table invariants
    #[error("Invalid table '{table}': {reason}")]
    InvalidTable { table: String, reason: String },

    /// Configuration or validation error
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// I/O operation failed
    #[error("I/O operation failed: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// Serialization or deserialization failed
    #[error("Serialization failed: {context}")]
    Serialization {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Delimited text could not be read or written
    #[error("CSV operation failed: {context}")]
    Csv {
        context: String,
        #[source]
        source: csv::Error,
    },

    /// A spreadsheet workbook could not be opened or read
    #[error("Spreadsheet operation failed: {context}")]
    Spreadsheet {
        context: String,
        #[source]
        source: calamine::Error,
    },
}

/// Convenience type alias for Results with NormalizeError
pub type Result<T> = std::result::Result<T, NormalizeError>;

fn join_mismatches(mismatches: &[TypeMismatch]) -> String {
    mismatches
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl NormalizeError {
    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an invalid table error
    pub fn invalid_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Creates an unsupported format error
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates an I/O error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a CSV error with context
    pub fn csv(context: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            context: context.into(),
            source,
        }
    }

    /// Creates a spreadsheet error with context
    pub fn spreadsheet(context: impl Into<String>, source: calamine::Error) -> Self {
        Self::Spreadsheet {
            context: context.into(),
            source,
        }
    }

    /// Creates a serialization error with context
    pub fn serialization(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Serialization {
            context: context.into(),
            source,
        }
    }

    /// Returns true when the error stops the pipeline because of the input
    /// rather than an internal invariant breach.
    pub fn is_input_error(&self) -> bool {
        !matches!(
            self,
            Self::DependencyAmbiguity { .. } | Self::ReferentialIntegrity { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_lists_mismatches() {
        let error = NormalizeError::Validation {
            mismatches: vec![
                TypeMismatch {
                    column: "age".to_string(),
                    expected: DataType::Integer,
                    observed: Some(DataType::Text),
                },
                TypeMismatch {
                    column: "email".to_string(),
                    expected: DataType::Text,
                    observed: None,
                },
            ],
        };

        let message = error.to_string();
        assert!(message.contains("2 mismatches"));
        assert!(message.contains("column 'age': expected type 'integer', got 'text'"));
        assert!(message.contains("expected column 'email' not found"));
    }

    #[test]
    fn test_error_creation() {
        let error = NormalizeError::configuration("max_determinant_size must be positive");
        assert!(error.to_string().contains("max_determinant_size"));

        let error = NormalizeError::unsupported_format("xlsx");
        assert!(error.to_string().contains("xlsx"));
    }

    #[test]
    fn test_input_error_classification() {
        assert!(NormalizeError::configuration("bad").is_input_error());
        assert!(
            !NormalizeError::DependencyAmbiguity {
                table: "t".to_string(),
                determinant: vec!["a".to_string()],
                dependent: "b".to_string(),
            }
            .is_input_error()
        );
    }
}
