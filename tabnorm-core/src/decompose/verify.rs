//! Third normal form check on decomposed tables.
//!
//! Discovery is run again on every table. Any dependency whose determinant
//! is not a superkey and whose dependent is not part of a key means the
//! decomposition left a partial or transitive dependency behind.

use crate::dependency::{ColumnSet, DependencySet, DiscoveryOptions, FunctionalDependency, discover};
use crate::models::RawTable;
use crate::{NormalizeError, Result};

use super::NormalizedTable;

/// A dependency that keeps a table out of third normal form.
#[derive(Debug, Clone)]
pub(crate) struct Violation {
    /// Dependencies discovered on the table
    pub(crate) found: DependencySet,
    /// Declared keys followed by the discovered candidate keys
    pub(crate) keys: Vec<ColumnSet>,
    /// First dependency whose determinant is not a superkey and whose
    /// dependent is not part of a key
    pub(crate) dependency: FunctionalDependency,
}

/// Runs discovery on `table` and returns the first violating dependency.
///
/// `declared` holds the table's own keys as positions within `table`.
/// Dependencies on the empty set (constant columns) are not reported; they
/// are carried by the root table.
pub(crate) fn find_violation(
    table: &RawTable,
    declared: &[ColumnSet],
    options: &DiscoveryOptions,
) -> Option<Violation> {
    let found = discover(table, options);

    let mut keys: Vec<ColumnSet> = declared.to_vec();
    keys.extend(found.candidate_keys.iter().cloned());

    let dependency = found
        .dependencies
        .iter()
        .find(|fd| {
            if fd.determinant.is_empty() {
                return false;
            }
            let superkey = keys.iter().any(|key| key.is_subset(&fd.determinant))
                || found.is_superkey(&fd.determinant);
            let prime = keys.iter().any(|key| key.contains(fd.dependent));
            !superkey && !prime
        })?
        .clone();

    Some(Violation {
        found,
        keys,
        dependency,
    })
}

/// Confirms that every table is in third normal form.
///
/// # Errors
/// Returns `NormalizeError::DependencyAmbiguity` for the first violating
/// dependency found.
pub fn verify_third_normal_form(
    tables: &[NormalizedTable],
    options: &DiscoveryOptions,
) -> Result<()> {
    for table in tables {
        let raw = table.to_raw_table()?;
        if let Some(violation) = find_violation(&raw, &table.key_sets(), options) {
            let named = violation.found.name(&violation.dependency);
            return Err(NormalizeError::DependencyAmbiguity {
                table: table.name.clone(),
                determinant: named.determinant,
                dependent: named.dependent,
            });
        }
        tracing::debug!("Table '{}' verified in 3NF", table.name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDef, DataType, Value};

    fn table(rows: Vec<Vec<Value>>) -> NormalizedTable {
        NormalizedTable {
            name: "data_order".to_string(),
            columns: vec![
                ColumnDef::new("order", DataType::Integer),
                ColumnDef::new("cust", DataType::Text),
                ColumnDef::new("email", DataType::Text),
            ],
            primary_key: vec!["order".to_string()],
            alternate_keys: Vec::new(),
            is_root: true,
            rows,
        }
    }

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    #[test]
    fn test_transitive_dependency_is_reported() {
        let denormalized = table(vec![
            vec![Value::Integer(1), text("Alice"), text("a@x.com")],
            vec![Value::Integer(2), text("Bob"), text("b@x.com")],
            vec![Value::Integer(3), text("Alice"), text("a@x.com")],
        ]);

        let error = verify_third_normal_form(&[denormalized], &DiscoveryOptions::default())
            .unwrap_err();
        match error {
            NormalizeError::DependencyAmbiguity {
                table, dependent, ..
            } => {
                assert_eq!(table, "data_order");
                assert!(dependent == "cust" || dependent == "email");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_declared_alternate_key_is_prime() {
        let mut normalized = table(vec![
            vec![Value::Integer(1), text("Alice"), text("a@x.com")],
            vec![Value::Integer(2), text("Bob"), text("b@x.com")],
        ]);
        normalized.alternate_keys = vec![vec!["cust".to_string()], vec!["email".to_string()]];
        assert!(verify_third_normal_form(&[normalized], &DiscoveryOptions::default()).is_ok());
    }
}
