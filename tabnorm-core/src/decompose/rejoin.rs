//! Natural join of decomposed tables back into one relation.

use std::collections::HashMap;

use crate::models::Value;
use crate::{NormalizeError, Result};

use super::NormalizedTable;

/// Rows produced by joining every table back together.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRows {
    /// Column names in join order
    pub columns: Vec<String>,
    /// Joined rows
    pub rows: Vec<Vec<Value>>,
}

impl JoinedRows {
    /// Reorders the columns to match `order`, returning `None` if a column
    /// is missing.
    pub fn reordered(&self, order: &[&str]) -> Option<Vec<Vec<Value>>> {
        let positions: Vec<usize> = order
            .iter()
            .map(|name| self.columns.iter().position(|c| c == name))
            .collect::<Option<_>>()?;
        Some(
            self.rows
                .iter()
                .map(|row| positions.iter().map(|&p| row[p].clone()).collect())
                .collect(),
        )
    }
}

/// Joins all tables starting from the root.
///
/// A table is joined once one of its keys lies entirely within the columns
/// joined so far; its key then matches at most one row per joined row.
///
/// # Errors
/// Returns an invalid table error when there is no root table or a table
/// can never be reached through its keys.
pub fn rejoin(tables: &[NormalizedTable]) -> Result<JoinedRows> {
    let root = tables
        .iter()
        .find(|t| t.is_root)
        .ok_or_else(|| NormalizeError::invalid_table("decomposition", "no root table"))?;

    let mut joined = JoinedRows {
        columns: root.column_names(),
        rows: root.rows.clone(),
    };
    let mut pending: Vec<&NormalizedTable> = tables.iter().filter(|t| !t.is_root).collect();

    while !pending.is_empty() {
        let position = pending.iter().position(|table| {
            table
                .keys()
                .any(|key| key.iter().all(|column| joined.columns.contains(column)))
        });
        let Some(position) = position else {
            return Err(NormalizeError::invalid_table(
                pending[0].name.clone(),
                "no key of this table is reachable from the root",
            ));
        };
        let table = pending.remove(position);
        joined = join(&joined, table);
    }

    Ok(joined)
}

fn join(left: &JoinedRows, right: &NormalizedTable) -> JoinedRows {
    let right_names = right.column_names();
    let shared: Vec<(usize, usize)> = left
        .columns
        .iter()
        .enumerate()
        .filter_map(|(l, name)| right_names.iter().position(|r| r == name).map(|r| (l, r)))
        .collect();
    let added: Vec<usize> = (0..right_names.len())
        .filter(|r| !shared.iter().any(|(_, s)| s == r))
        .collect();

    let mut index: HashMap<Vec<&Value>, Vec<&Vec<Value>>> = HashMap::new();
    for row in &right.rows {
        let key = shared.iter().map(|&(_, r)| &row[r]).collect();
        index.entry(key).or_default().push(row);
    }

    let mut rows = Vec::with_capacity(left.rows.len());
    for row in &left.rows {
        let key: Vec<&Value> = shared.iter().map(|&(l, _)| &row[l]).collect();
        for matched in index.get(&key).into_iter().flatten() {
            let mut combined = row.clone();
            combined.extend(added.iter().map(|&r| matched[r].clone()));
            rows.push(combined);
        }
    }

    let mut columns = left.columns.clone();
    columns.extend(added.iter().map(|&r| right_names[r].clone()));
    JoinedRows { columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ColumnDef, DataType};

    fn text(s: &str) -> Value {
        Value::from(s)
    }

    fn create_tables() -> Vec<NormalizedTable> {
        vec![
            NormalizedTable {
                name: "data_cust".to_string(),
                columns: vec![
                    ColumnDef::new("cust", DataType::Text),
                    ColumnDef::new("email", DataType::Text),
                ],
                primary_key: vec!["cust".to_string()],
                alternate_keys: vec![vec!["email".to_string()]],
                is_root: false,
                rows: vec![
                    vec![text("Alice"), text("a@x.com")],
                    vec![text("Bob"), text("b@x.com")],
                ],
            },
            NormalizedTable {
                name: "data_order".to_string(),
                columns: vec![
                    ColumnDef::new("order", DataType::Integer),
                    ColumnDef::new("cust", DataType::Text),
                ],
                primary_key: vec!["order".to_string()],
                alternate_keys: Vec::new(),
                is_root: true,
                rows: vec![
                    vec![Value::Integer(1), text("Alice")],
                    vec![Value::Integer(2), text("Bob")],
                    vec![Value::Integer(3), text("Alice")],
                ],
            },
        ]
    }

    #[test]
    fn test_rejoin_reproduces_original_rows() {
        let joined = rejoin(&create_tables()).unwrap();
        assert_eq!(joined.columns, vec!["order", "cust", "email"]);
        assert_eq!(joined.rows.len(), 3);
        assert_eq!(
            joined.rows[2],
            vec![Value::Integer(3), text("Alice"), text("a@x.com")]
        );

        let reordered = joined.reordered(&["email", "order"]).unwrap();
        assert_eq!(reordered[0], vec![text("a@x.com"), Value::Integer(1)]);
        assert!(joined.reordered(&["missing"]).is_none());
    }

    #[test]
    fn test_unreachable_table_is_an_error() {
        let mut tables = create_tables();
        tables[0].primary_key = vec!["nickname".to_string()];
        tables[0].alternate_keys.clear();
        assert!(rejoin(&tables).is_err());
    }
}
