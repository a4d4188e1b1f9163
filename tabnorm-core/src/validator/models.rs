//! Validation result models.
//!
//! Violations carry the offending value so the caller can inspect it; the
//! validator never mutates the table it reports on.

use serde::{Deserialize, Serialize};

use crate::models::{DataType, Value};

/// Rule that a constraint violation broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintRule {
    /// A constrained column is absent from the table
    ColumnPresent,
    NotNull,
    Unique,
    Range,
    Pattern,
    AllowedValues,
}

impl std::fmt::Display for ConstraintRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConstraintRule::ColumnPresent => "column_present",
            ConstraintRule::NotNull => "not_null",
            ConstraintRule::Unique => "unique",
            ConstraintRule::Range => "range",
            ConstraintRule::Pattern => "pattern",
            ConstraintRule::AllowedValues => "allowed_values",
        };
        write!(f, "{}", name)
    }
}

/// A single broken constraint.
///
/// Most rules produce one violation per offending row. A `unique`
/// violation lists every row sharing the duplicated value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintViolation {
    /// Column name
    pub column: String,
    /// Rule that failed
    pub rule: ConstraintRule,
    /// Zero-based row positions involved
    pub row_indices: Vec<usize>,
    /// The offending value, `None` for a missing column
    pub value: Option<Value>,
    /// Human-readable description
    pub message: String,
}

/// Outcome of comparing one column against its expected type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCheck {
    /// Column name
    pub column: String,
    /// Type requested by the caller
    pub expected: DataType,
    /// Type inferred from the data, `None` when the column is absent
    pub observed: Option<DataType>,
    /// Whether the observed type satisfies the expectation
    pub compatible: bool,
}

/// Everything the validator found in one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Per-column type comparisons, in expected-type order
    pub type_checks: Vec<TypeCheck>,
    /// Constraint violations, grouped by column in constraint order
    pub violations: Vec<ConstraintViolation>,
}

impl ValidationReport {
    /// Returns true when no constraint was violated.
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Violations reported for one column.
    pub fn violations_for<'a>(
        &'a self,
        column: &'a str,
    ) -> impl Iterator<Item = &'a ConstraintViolation> + 'a {
        self.violations.iter().filter(move |v| v.column == column)
    }
}
