//! Type and constraint validation.
//!
//! This module checks a raw table against the caller's expectations:
//! - **Types**: observed column types against an expected schema
//! - **Constraints**: uniqueness, non-null, ranges, patterns and allowed values
//!
//! Type mismatches stop the pipeline. Constraint violations are collected
//! into a [`ValidationReport`] and never raised.

mod constraints;
mod models;
mod type_check;

use crate::config::PipelineConfig;
use crate::models::RawTable;
use crate::{NormalizeError, Result};

pub use constraints::CompiledConstraint;
pub use models::{ConstraintRule, ConstraintViolation, TypeCheck, ValidationReport};
pub use type_check::{check_types, mismatches};

/// Validator for one pipeline configuration.
///
/// Patterns are compiled once when the validator is built, so the same
/// validator can check many tables.
///
/// # Example
///
/// ```rust,ignore
/// use tabnorm_core::validator::TableValidator;
///
/// let validator = TableValidator::new(&config)?;
/// let report = validator.validate(&table)?;
/// for violation in &report.violations {
///     println!("{}: {}", violation.column, violation.message);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TableValidator {
    expected_types: indexmap::IndexMap<String, crate::models::DataType>,
    constraints: Vec<CompiledConstraint>,
}

impl TableValidator {
    /// Creates a validator from the configuration's expected types and
    /// constraints.
    ///
    /// # Errors
    /// Returns a configuration error if a constraint pattern does not compile.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        let constraints = config
            .constraints
            .iter()
            .map(|(column, spec)| CompiledConstraint::compile(column.clone(), spec))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            expected_types: config.expected_types.clone(),
            constraints,
        })
    }

    /// Validates a table without modifying it.
    ///
    /// # Errors
    /// Returns `NormalizeError::Validation` when any expected type disagrees
    /// with the data. Constraint violations are returned in the report.
    pub fn validate(&self, table: &RawTable) -> Result<ValidationReport> {
        let type_checks = check_types(table, &self.expected_types);
        let failed = mismatches(&type_checks);
        if !failed.is_empty() {
            return Err(NormalizeError::Validation { mismatches: failed });
        }

        let violations = self.check_constraints(table);
        if violations.is_empty() {
            tracing::debug!("Table '{}' satisfies all constraints", table.name());
        } else {
            tracing::info!(
                "Table '{}' has {} constraint violations",
                table.name(),
                violations.len()
            );
        }

        Ok(ValidationReport {
            type_checks,
            violations,
        })
    }

    /// Runs only the constraint checks, in configuration order.
    pub fn check_constraints(&self, table: &RawTable) -> Vec<ConstraintViolation> {
        self.constraints
            .iter()
            .flat_map(|constraint| constraint.check(table))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConstraintSpec;
    use crate::models::{DataType, Value};

    fn create_sample_table() -> RawTable {
        RawTable::from_rows(
            "customers",
            &["id", "email", "age"],
            vec![
                vec![Value::Integer(1), Value::from("a@x.com"), Value::Integer(34)],
                vec![Value::Integer(2), Value::from("a@x.com"), Value::Integer(140)],
                vec![Value::Integer(3), Value::Null, Value::Integer(27)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_validate_collects_all_violations() {
        let config = PipelineConfig::new()
            .with_constraint(
                "email",
                ConstraintSpec::new().with_not_null(true).with_unique(true),
            )
            .with_constraint("age", ConstraintSpec::new().with_range(0.0, 120.0));
        let validator = TableValidator::new(&config).unwrap();

        let report = validator.validate(&create_sample_table()).unwrap();
        assert_eq!(report.violations.len(), 3);
        assert_eq!(report.violations_for("email").count(), 2);
        assert_eq!(report.violations_for("age").next().unwrap().row_indices, vec![1]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_type_mismatch_raises() {
        let config = PipelineConfig::new().with_expected_type("email", DataType::Integer);
        let validator = TableValidator::new(&config).unwrap();

        let error = validator.validate(&create_sample_table()).unwrap_err();
        match error {
            NormalizeError::Validation { mismatches } => {
                assert_eq!(mismatches.len(), 1);
                assert_eq!(mismatches[0].column, "email");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_does_not_mutate_table() {
        let table = create_sample_table();
        let before = table.clone();
        let config =
            PipelineConfig::new().with_constraint("email", ConstraintSpec::new().with_unique(true));
        TableValidator::new(&config).unwrap().validate(&table).unwrap();
        assert_eq!(table, before);
    }
}
