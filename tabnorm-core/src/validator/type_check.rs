//! Column type checks against an expected schema.

use indexmap::IndexMap;

use crate::error::TypeMismatch;
use crate::models::{DataType, RawTable, Value};

use super::models::TypeCheck;

/// Compares each expected column type with the type observed in the data.
///
/// A column absent from the table is reported as incompatible with no
/// observed type. A column holding only missing values has no observed
/// type either but is compatible with any expectation, since missing values
/// are left to remediation. Types are never coerced.
pub fn check_types(table: &RawTable, expected: &IndexMap<String, DataType>) -> Vec<TypeCheck> {
    expected
        .iter()
        .map(|(column, expected_type)| {
            let (observed, compatible) = match table.column_index(column) {
                None => (None, false),
                Some(index) if table.column_values(index).all(Value::is_null) => (None, true),
                Some(index) => {
                    let observed = table.columns()[index].data_type;
                    (Some(observed), expected_type.accepts(observed))
                }
            };
            if !compatible {
                tracing::debug!(
                    "Column '{}' expected {} but observed {:?}",
                    column,
                    expected_type,
                    observed
                );
            }
            TypeCheck {
                column: column.clone(),
                expected: *expected_type,
                observed,
                compatible,
            }
        })
        .collect()
}

/// Extracts the failed checks as error payloads.
pub fn mismatches(checks: &[TypeCheck]) -> Vec<TypeMismatch> {
    checks
        .iter()
        .filter(|check| !check.compatible)
        .map(|check| TypeMismatch {
            column: check.column.clone(),
            expected: check.expected,
            observed: check.observed,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_sample_table() -> RawTable {
        RawTable::from_rows(
            "people",
            &["id", "age", "name"],
            vec![
                vec![Value::Integer(1), Value::Integer(30), Value::from("Ann")],
                vec![Value::Integer(2), Value::Null, Value::from("Ben")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_matching_types_pass() {
        let table = create_sample_table();
        let mut expected = IndexMap::new();
        expected.insert("id".to_string(), DataType::Integer);
        expected.insert("age".to_string(), DataType::Float);
        expected.insert("name".to_string(), DataType::Text);

        let checks = check_types(&table, &expected);
        assert_eq!(checks.len(), 3);
        assert!(checks.iter().all(|c| c.compatible));
        assert!(mismatches(&checks).is_empty());
    }

    #[test]
    fn test_mismatch_and_missing_column_reported() {
        let table = create_sample_table();
        let mut expected = IndexMap::new();
        expected.insert("name".to_string(), DataType::Integer);
        expected.insert("email".to_string(), DataType::Text);

        let failed = mismatches(&check_types(&table, &expected));
        assert_eq!(failed.len(), 2);
        assert_eq!(failed[0].observed, Some(DataType::Text));
        assert_eq!(failed[1].column, "email");
        assert_eq!(failed[1].observed, None);
    }

    #[test]
    fn test_all_missing_column_is_compatible() {
        let table = RawTable::from_rows(
            "people",
            &["id", "age"],
            vec![
                vec![Value::Integer(1), Value::Null],
                vec![Value::Integer(2), Value::Null],
            ],
        )
        .unwrap();
        let mut expected = IndexMap::new();
        expected.insert("age".to_string(), DataType::Integer);

        let checks = check_types(&table, &expected);
        assert!(checks[0].compatible);
        assert_eq!(checks[0].observed, None);
        assert!(mismatches(&checks).is_empty());
    }
}
