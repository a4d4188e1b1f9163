//! NULL value remediation.
//!
//! Missing values are replaced or removed per column before dependency
//! discovery, since sparse columns make dependency tests unreliable.
//! Strategies run in the order of the strategy map. All `drop` entries are
//! applied together, once, at the position of the first of them: a row is
//! removed if any drop-designated column is missing.

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::NullStrategy;
use crate::models::{DataType, RawTable, Value};
use crate::{NormalizeError, Result};

/// What remediation did to one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRemediation {
    /// Column name
    pub column: String,
    /// Strategy name
    pub strategy: String,
    /// Missing cells replaced with a value
    pub filled: usize,
    /// Missing cells left in place (edge gaps of fills, empty columns)
    pub remaining: usize,
}

/// The cleaned table plus counts of what changed.
#[derive(Debug, Clone)]
pub struct RemediationOutcome {
    /// Table with the covered columns remediated
    pub table: RawTable,
    /// Missing cells replaced with a value
    pub cells_filled: usize,
    /// Rows removed by `drop` strategies
    pub rows_dropped: usize,
    /// Missing cells in drop-designated columns that left with their rows
    pub drop_null_cells: usize,
    /// Per-column detail, in strategy order
    pub per_column: Vec<ColumnRemediation>,
}

impl RemediationOutcome {
    /// Total missing cells handled by filling or dropping.
    pub fn nulls_handled(&self) -> usize {
        self.cells_filled + self.drop_null_cells
    }
}

/// Applies per-column NULL strategies and returns a new table.
///
/// Columns not named in `strategies` are left untouched.
///
/// # Errors
/// Returns `NormalizeError::Strategy` when mean or median is requested on a
/// non-numeric column, and a configuration error when a strategy names a
/// column the table does not have.
pub fn remediate(
    table: &RawTable,
    strategies: &IndexMap<String, NullStrategy>,
) -> Result<RemediationOutcome> {
    let mut plan = Vec::with_capacity(strategies.len());
    for (column, strategy) in strategies {
        let index = table.column_index(column).ok_or_else(|| {
            NormalizeError::configuration(format!(
                "NULL strategy given for unknown column '{}'",
                column
            ))
        })?;
        let data_type = table.columns()[index].data_type;
        let has_values = table.column_values(index).any(|v| !v.is_null());
        if strategy.requires_numeric() && has_values && !data_type.is_numeric() {
            return Err(NormalizeError::Strategy {
                column: column.clone(),
                strategy: strategy.name().to_string(),
                data_type,
            });
        }
        plan.push((column.as_str(), index, data_type, strategy));
    }

    let drop_columns: Vec<usize> = plan
        .iter()
        .filter(|(_, _, _, strategy)| **strategy == NullStrategy::Drop)
        .map(|(_, index, _, _)| *index)
        .collect();

    let mut rows: Vec<Vec<Value>> = table.rows().to_vec();
    let mut per_column = Vec::with_capacity(plan.len());
    let mut cells_filled = 0;
    let mut rows_dropped = 0;
    let mut drop_null_cells = 0;
    let mut drop_applied = false;

    for (column, index, data_type, strategy) in plan {
        if *strategy == NullStrategy::Drop {
            if !drop_applied {
                drop_applied = true;
                let before = rows.len();
                drop_null_cells = rows
                    .iter()
                    .flat_map(|row| drop_columns.iter().map(move |&i| &row[i]))
                    .filter(|v| v.is_null())
                    .count();
                rows.retain(|row| drop_columns.iter().all(|&i| !row[i].is_null()));
                rows_dropped = before - rows.len();
                tracing::debug!(
                    "Dropped {} rows with missing values in {} columns",
                    rows_dropped,
                    drop_columns.len()
                );
            }
            per_column.push(ColumnRemediation {
                column: column.to_string(),
                strategy: strategy.name().to_string(),
                filled: 0,
                remaining: 0,
            });
            continue;
        }

        let filled = fill_column(&mut rows, index, data_type, strategy, column);
        let remaining = rows.iter().filter(|row| row[index].is_null()).count();
        tracing::debug!(
            "Column '{}': {} filled {} cells, {} remain missing",
            column,
            strategy,
            filled,
            remaining
        );
        cells_filled += filled;
        per_column.push(ColumnRemediation {
            column: column.to_string(),
            strategy: strategy.name().to_string(),
            filled,
            remaining,
        });
    }

    Ok(RemediationOutcome {
        table: table.with_rows(rows)?,
        cells_filled,
        rows_dropped,
        drop_null_cells,
        per_column,
    })
}

fn fill_column(
    rows: &mut [Vec<Value>],
    index: usize,
    data_type: DataType,
    strategy: &NullStrategy,
    column: &str,
) -> usize {
    if rows.iter().all(|row| !row[index].is_null()) {
        return 0;
    }

    match strategy {
        NullStrategy::ForwardFill => return forward_fill(rows, index),
        NullStrategy::BackwardFill => {
            rows.reverse();
            let filled = forward_fill(rows, index);
            rows.reverse();
            return filled;
        }
        _ => {}
    }

    let present: Vec<&Value> = rows
        .iter()
        .map(|row| &row[index])
        .filter(|v| !v.is_null())
        .collect();
    let replacement = match strategy {
        NullStrategy::Mean => mean(&present).map(|m| Value::numeric_for(data_type, m)),
        NullStrategy::Median => median(&present).map(|m| Value::numeric_for(data_type, m)),
        NullStrategy::Mode => mode(&present),
        NullStrategy::Default => Some(default_for(data_type)),
        NullStrategy::Literal(value) => Some(value.clone()),
        NullStrategy::Drop | NullStrategy::ForwardFill | NullStrategy::BackwardFill => None,
    };

    let Some(replacement) = replacement else {
        tracing::warn!(
            "Column '{}' has no present values, {} left it unchanged",
            column,
            strategy
        );
        return 0;
    };

    let mut filled = 0;
    for row in rows.iter_mut().filter(|row| row[index].is_null()) {
        row[index] = replacement.clone();
        filled += 1;
    }
    filled
}

fn forward_fill(rows: &mut [Vec<Value>], index: usize) -> usize {
    let mut last: Option<Value> = None;
    let mut filled = 0;
    for row in rows.iter_mut() {
        if row[index].is_null() {
            if let Some(value) = &last {
                row[index] = value.clone();
                filled += 1;
            }
        } else {
            last = Some(row[index].clone());
        }
    }
    filled
}

fn mean(present: &[&Value]) -> Option<f64> {
    let numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
    if numbers.is_empty() {
        return None;
    }
    Some(numbers.iter().sum::<f64>() / numbers.len() as f64)
}

fn median(present: &[&Value]) -> Option<f64> {
    let mut numbers: Vec<f64> = present.iter().filter_map(|v| v.as_f64()).collect();
    if numbers.is_empty() {
        return None;
    }
    numbers.sort_by(f64::total_cmp);
    let mid = numbers.len() / 2;
    if numbers.len() % 2 == 0 {
        Some((numbers[mid - 1] + numbers[mid]) / 2.0)
    } else {
        Some(numbers[mid])
    }
}

/// Most frequent value; the first value seen wins a tie.
fn mode(present: &[&Value]) -> Option<Value> {
    let mut counts: Vec<(&Value, usize)> = Vec::new();
    for value in present {
        match counts.iter_mut().find(|(seen, _)| seen == value) {
            Some((_, count)) => *count += 1,
            None => counts.push((*value, 1)),
        }
    }

    let mut best: Option<(&Value, usize)> = None;
    for (value, count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((value, count));
        }
    }
    best.map(|(value, _)| value.clone())
}

fn default_for(data_type: DataType) -> Value {
    match data_type {
        DataType::Integer => Value::Integer(0),
        DataType::Float => Value::Float(0.0),
        DataType::Text => Value::Text("Unknown".to_string()),
        DataType::Boolean => Value::Boolean(false),
        DataType::DateTime => NaiveDate::from_ymd_opt(1900, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map_or(Value::Null, Value::DateTime),
        DataType::Binary => Value::Binary(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_table(values: Vec<Value>) -> RawTable {
        RawTable::from_rows("t", &["c"], values.into_iter().map(|v| vec![v]).collect()).unwrap()
    }

    fn strategy(column: &str, strategy: NullStrategy) -> IndexMap<String, NullStrategy> {
        let mut map = IndexMap::new();
        map.insert(column.to_string(), strategy);
        map
    }

    fn column(outcome: &RemediationOutcome) -> Vec<Value> {
        outcome.table.column_values(0).cloned().collect()
    }

    #[test]
    fn test_mean_keeps_integer_column_integral() {
        let table = column_table(vec![
            Value::Integer(10),
            Value::Null,
            Value::Integer(20),
            Value::Null,
            Value::Integer(30),
        ]);
        let outcome = remediate(&table, &strategy("c", NullStrategy::Mean)).unwrap();
        assert_eq!(
            column(&outcome),
            vec![
                Value::Integer(10),
                Value::Integer(20),
                Value::Integer(20),
                Value::Integer(20),
                Value::Integer(30)
            ]
        );
        assert_eq!(outcome.cells_filled, 2);
        assert_eq!(outcome.table.columns()[0].data_type, DataType::Integer);
    }

    #[test]
    fn test_median_even_count_averages_middle_values() {
        let table = column_table(vec![
            Value::Integer(1),
            Value::Integer(4),
            Value::Null,
            Value::Integer(3),
            Value::Integer(10),
        ]);
        let outcome = remediate(&table, &strategy("c", NullStrategy::Median)).unwrap();
        assert_eq!(column(&outcome)[2], Value::Float(3.5));
        assert_eq!(outcome.table.columns()[0].data_type, DataType::Float);
    }

    #[test]
    fn test_mean_on_text_is_strategy_error() {
        let table = column_table(vec![Value::from("a"), Value::Null]);
        let error = remediate(&table, &strategy("c", NullStrategy::Mean)).unwrap_err();
        assert!(matches!(error, NormalizeError::Strategy { .. }));
    }

    #[test]
    fn test_mode_tie_goes_to_first_seen() {
        let table = column_table(vec![
            Value::from("b"),
            Value::from("a"),
            Value::Null,
            Value::from("a"),
            Value::from("b"),
        ]);
        let outcome = remediate(&table, &strategy("c", NullStrategy::Mode)).unwrap();
        assert_eq!(column(&outcome)[2], Value::from("b"));
    }

    #[test]
    fn test_fills_leave_edge_gaps() {
        let values = vec![Value::Null, Value::Integer(1), Value::Null, Value::Integer(3), Value::Null];

        let outcome = remediate(&column_table(values.clone()), &strategy("c", NullStrategy::ForwardFill))
            .unwrap();
        assert_eq!(
            column(&outcome),
            vec![Value::Null, Value::Integer(1), Value::Integer(1), Value::Integer(3), Value::Integer(3)]
        );
        assert_eq!(outcome.per_column[0].remaining, 1);

        let outcome =
            remediate(&column_table(values), &strategy("c", NullStrategy::BackwardFill)).unwrap();
        assert_eq!(
            column(&outcome),
            vec![Value::Integer(1), Value::Integer(1), Value::Integer(3), Value::Integer(3), Value::Null]
        );
    }

    #[test]
    fn test_default_and_literal() {
        let table = column_table(vec![Value::from("x"), Value::Null]);
        let outcome = remediate(&table, &strategy("c", NullStrategy::Default)).unwrap();
        assert_eq!(column(&outcome)[1], Value::from("Unknown"));

        let outcome = remediate(
            &table,
            &strategy("c", NullStrategy::Literal(Value::from("n/a"))),
        )
        .unwrap();
        assert_eq!(column(&outcome)[1], Value::from("n/a"));
    }

    #[test]
    fn test_drop_removes_union_once() {
        let table = RawTable::from_rows(
            "t",
            &["a", "b", "c"],
            vec![
                vec![Value::Null, Value::Null, Value::Integer(1)],
                vec![Value::Integer(1), Value::Null, Value::Integer(2)],
                vec![Value::Integer(2), Value::Integer(5), Value::Null],
                vec![Value::Integer(3), Value::Integer(6), Value::Integer(4)],
            ],
        )
        .unwrap();

        let mut strategies = IndexMap::new();
        strategies.insert("a".to_string(), NullStrategy::Drop);
        strategies.insert("b".to_string(), NullStrategy::Drop);
        strategies.insert("c".to_string(), NullStrategy::Default);

        let outcome = remediate(&table, &strategies).unwrap();
        assert_eq!(outcome.rows_dropped, 2);
        assert_eq!(outcome.drop_null_cells, 3);
        assert_eq!(outcome.table.row_count(), 2);
        assert_eq!(outcome.table.rows()[0][2], Value::Integer(0));
        assert_eq!(outcome.nulls_handled(), 4);
    }

    #[test]
    fn test_unknown_column_is_configuration_error() {
        let table = column_table(vec![Value::Integer(1)]);
        let error = remediate(&table, &strategy("missing", NullStrategy::Drop)).unwrap_err();
        assert!(matches!(error, NormalizeError::Configuration { .. }));
    }

    #[test]
    fn test_untouched_columns_keep_nulls() {
        let table = RawTable::from_rows(
            "t",
            &["a", "b"],
            vec![vec![Value::Null, Value::Null], vec![Value::Integer(1), Value::Integer(2)]],
        )
        .unwrap();
        let outcome = remediate(&table, &strategy("a", NullStrategy::BackwardFill)).unwrap();
        assert_eq!(outcome.table.rows()[0], vec![Value::Integer(1), Value::Null]);
    }
}
