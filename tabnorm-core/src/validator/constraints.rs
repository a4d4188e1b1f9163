//! Declared constraint checks.
//!
//! Rules run per column in a fixed order: not_null, unique, range, pattern,
//! allowed_values. Every violation is collected; nothing short-circuits.

use std::collections::HashMap;

use regex::Regex;

use crate::config::ConstraintSpec;
use crate::models::{RawTable, Value};
use crate::{NormalizeError, Result};

use super::models::{ConstraintRule, ConstraintViolation};

/// A constraint spec with its pattern compiled once per validator.
#[derive(Debug, Clone)]
pub struct CompiledConstraint {
    pub(crate) column: String,
    pub(crate) spec: ConstraintSpec,
    pattern: Option<Regex>,
}

impl CompiledConstraint {
    /// Compiles the spec's pattern, anchored at the start of the value.
    ///
    /// # Errors
    /// Returns a configuration error if the pattern is not a valid regex.
    pub fn compile(column: impl Into<String>, spec: &ConstraintSpec) -> Result<Self> {
        let column = column.into();
        let pattern = spec
            .pattern
            .as_deref()
            .map(|pattern| {
                Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    NormalizeError::configuration(format!(
                        "Invalid pattern for column '{}': {}",
                        column, e
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            column,
            spec: spec.clone(),
            pattern,
        })
    }

    /// Checks every rule of this constraint against the table.
    pub fn check(&self, table: &RawTable) -> Vec<ConstraintViolation> {
        let Some(index) = table.column_index(&self.column) else {
            return vec![ConstraintViolation {
                column: self.column.clone(),
                rule: ConstraintRule::ColumnPresent,
                row_indices: Vec::new(),
                value: None,
                message: format!("constrained column '{}' not found in data", self.column),
            }];
        };

        let mut violations = Vec::new();
        if self.spec.not_null {
            self.check_not_null(table, index, &mut violations);
        }
        if self.spec.unique {
            self.check_unique(table, index, &mut violations);
        }
        if let Some((min, max)) = self.spec.range {
            self.check_range(table, index, min, max, &mut violations);
        }
        if let Some(pattern) = &self.pattern {
            self.check_pattern(table, index, pattern, &mut violations);
        }
        if let Some(allowed) = &self.spec.allowed_values {
            self.check_allowed(table, index, allowed, &mut violations);
        }
        violations
    }

    fn violation(
        &self,
        rule: ConstraintRule,
        row_indices: Vec<usize>,
        value: &Value,
        message: String,
    ) -> ConstraintViolation {
        ConstraintViolation {
            column: self.column.clone(),
            rule,
            row_indices,
            value: Some(value.clone()),
            message,
        }
    }

    fn check_not_null(&self, table: &RawTable, index: usize, out: &mut Vec<ConstraintViolation>) {
        for (row, value) in table.column_values(index).enumerate() {
            if value.is_null() {
                out.push(self.violation(
                    ConstraintRule::NotNull,
                    vec![row],
                    value,
                    format!("row {}: missing value", row),
                ));
            }
        }
    }

    fn check_unique(&self, table: &RawTable, index: usize, out: &mut Vec<ConstraintViolation>) {
        let mut positions: HashMap<&Value, usize> = HashMap::new();
        let mut groups: Vec<(&Value, Vec<usize>)> = Vec::new();
        for (row, value) in table.column_values(index).enumerate() {
            if value.is_null() {
                continue;
            }
            match positions.get(value) {
                Some(&group) => groups[group].1.push(row),
                None => {
                    positions.insert(value, groups.len());
                    groups.push((value, vec![row]));
                }
            }
        }

        for (value, rows) in groups.into_iter().filter(|(_, rows)| rows.len() > 1) {
            let message = format!("value '{}' appears in rows {:?}", value, rows);
            out.push(self.violation(ConstraintRule::Unique, rows, value, message));
        }
    }

    fn check_range(
        &self,
        table: &RawTable,
        index: usize,
        min: f64,
        max: f64,
        out: &mut Vec<ConstraintViolation>,
    ) {
        for (row, value) in table.column_values(index).enumerate() {
            if value.is_null() {
                continue;
            }
            let message = match value.as_f64() {
                Some(number) if (min..=max).contains(&number) => continue,
                Some(number) => format!("row {}: {} outside [{}, {}]", row, number, min, max),
                None => format!("row {}: '{}' is not numeric", row, value),
            };
            out.push(self.violation(ConstraintRule::Range, vec![row], value, message));
        }
    }

    fn check_pattern(
        &self,
        table: &RawTable,
        index: usize,
        pattern: &Regex,
        out: &mut Vec<ConstraintViolation>,
    ) {
        for (row, value) in table.column_values(index).enumerate() {
            if value.is_null() || pattern.is_match(&value.to_string()) {
                continue;
            }
            let message = format!("row {}: '{}' does not match pattern", row, value);
            out.push(self.violation(ConstraintRule::Pattern, vec![row], value, message));
        }
    }

    fn check_allowed(
        &self,
        table: &RawTable,
        index: usize,
        allowed: &[Value],
        out: &mut Vec<ConstraintViolation>,
    ) {
        for (row, value) in table.column_values(index).enumerate() {
            if value.is_null() || allowed.iter().any(|a| a.loosely_equals(value)) {
                continue;
            }
            let message = format!("row {}: '{}' not in allowed values", row, value);
            out.push(self.violation(ConstraintRule::AllowedValues, vec![row], value, message));
        }
    }
}
