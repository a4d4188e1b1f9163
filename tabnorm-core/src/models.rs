//! Core tabular data model.
//!
//! A [`RawTable`] is an ordered list of typed columns plus positional rows.
//! Every row has exactly one cell per column and column names are unique;
//! both invariants are checked on construction so later stages can index
//! cells without re-validating.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use base64::Engine;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::{NormalizeError, Result};

/// Scalar column types recognized by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "int", alias = "int64", alias = "int32", alias = "bigint")]
    Integer,
    #[serde(alias = "float64", alias = "float32", alias = "double", alias = "numeric")]
    Float,
    #[serde(alias = "string", alias = "object", alias = "str", alias = "varchar")]
    Text,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "datetime64", alias = "timestamp", alias = "date")]
    DateTime,
    #[serde(alias = "bytes", alias = "blob")]
    Binary,
}

impl DataType {
    /// Returns true for integer and float columns.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Integer | DataType::Float)
    }

    /// Returns true when data observed as `observed` satisfies an
    /// expectation of `self`. A float expectation accepts integer data.
    pub fn accepts(&self, observed: DataType) -> bool {
        *self == observed || (*self == DataType::Float && observed == DataType::Integer)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Integer => write!(f, "integer"),
            DataType::Float => write!(f, "float"),
            DataType::Text => write!(f, "text"),
            DataType::Boolean => write!(f, "boolean"),
            DataType::DateTime => write!(f, "datetime"),
            DataType::Binary => write!(f, "binary"),
        }
    }
}

/// A nullable scalar cell value.
///
/// Equality and hashing treat floats by their canonical bit pattern so that
/// values can be grouped; `Null` equals `Null`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Binary(Vec<u8>),
}

/// Output format for date/time cells in text exports.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn canonical_float_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => canonical_float_bits(*a) == canonical_float_bits(*b),
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Binary(a), Value::Binary(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Boolean(b) => b.hash(state),
            Value::Integer(i) => i.hash(state),
            Value::Float(f) => canonical_float_bits(*f).hash(state),
            Value::Text(s) => s.hash(state),
            Value::DateTime(dt) => dt.hash(state),
            Value::Binary(bytes) => bytes.hash(state),
        }
    }
}

impl Value {
    /// Returns true for a missing value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of integer and float cells.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// The scalar type of this value, `None` for `Null`.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(DataType::Boolean),
            Value::Integer(_) => Some(DataType::Integer),
            Value::Float(_) => Some(DataType::Float),
            Value::Text(_) => Some(DataType::Text),
            Value::DateTime(_) => Some(DataType::DateTime),
            Value::Binary(_) => Some(DataType::Binary),
        }
    }

    /// Equality that also matches integers against equal floats.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        if self == other {
            return true;
        }
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Builds a numeric cell for a column of `data_type`, keeping integer
    /// columns integral whenever the value allows it.
    pub fn numeric_for(data_type: DataType, value: f64) -> Value {
        if data_type == DataType::Integer
            && value.fract() == 0.0
            && value >= i64::MIN as f64
            && value <= i64::MAX as f64
        {
            Value::Integer(value as i64)
        } else {
            Value::Float(value)
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => write!(f, "{}", s),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Binary(bytes) => write!(
                f,
                "{}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Infers the column type from its non-null values.
///
/// Integers mixed with floats widen to float; any other mixture, and a
/// column with no values at all, is reported as text.
pub fn infer_type<'a>(values: impl IntoIterator<Item = &'a Value>) -> DataType {
    let mut observed: Option<DataType> = None;
    for data_type in values.into_iter().filter_map(Value::data_type) {
        observed = match (observed, data_type) {
            (None, t) => Some(t),
            (Some(a), b) if a == b => Some(a),
            (Some(DataType::Integer), DataType::Float) | (Some(DataType::Float), DataType::Integer) => {
                Some(DataType::Float)
            }
            _ => return DataType::Text,
        };
    }
    observed.unwrap_or(DataType::Text)
}

/// Column definition: a name plus its observed type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnDef {
    /// Creates a new column definition.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An in-memory table of unknown structure handed to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    name: String,
    columns: Vec<ColumnDef>,
    rows: Vec<Vec<Value>>,
}

impl RawTable {
    /// Creates a table, inferring each column's type from the data.
    ///
    /// # Errors
    /// Returns `InvalidTable` when column names repeat or a row's width does
    /// not match the column count.
    pub fn new(
        name: impl Into<String>,
        column_names: Vec<String>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let name = name.into();

        let mut seen = HashSet::with_capacity(column_names.len());
        for column in &column_names {
            if !seen.insert(column.as_str()) {
                return Err(NormalizeError::invalid_table(
                    &name,
                    format!("duplicate column name '{}'", column),
                ));
            }
        }

        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != column_names.len())
        {
            return Err(NormalizeError::invalid_table(
                &name,
                format!(
                    "row {} has {} cells, expected {}",
                    index,
                    row.len(),
                    column_names.len()
                ),
            ));
        }

        let columns = column_names
            .into_iter()
            .enumerate()
            .map(|(index, column)| {
                let data_type = infer_type(rows.iter().map(|row| &row[index]));
                ColumnDef::new(column, data_type)
            })
            .collect();

        Ok(Self {
            name,
            columns,
            rows,
        })
    }

    /// Convenience constructor taking string slices for column names.
    pub fn from_rows(name: impl Into<String>, columns: &[&str], rows: Vec<Vec<Value>>) -> Result<Self> {
        Self::new(
            name,
            columns.iter().map(|c| (*c).to_string()).collect(),
            rows,
        )
    }

    /// Returns a table with the same name and columns over new rows.
    ///
    /// Column types are re-inferred; a column whose cells are all missing
    /// keeps its previous type.
    pub fn with_rows(&self, rows: Vec<Vec<Value>>) -> Result<Self> {
        let mut table = Self::new(self.name.clone(), self.column_names_owned(), rows)?;
        for (index, previous) in self.columns.iter().enumerate() {
            if table.rows.iter().all(|row| row[index].is_null()) {
                table.columns[index].data_type = previous.data_type;
            }
        }
        Ok(table)
    }

    /// Table name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ordered column definitions
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Ordered column names
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    fn column_names_owned(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Rows in their original order
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Iterates over one column's cells in row order.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |row| &row[index])
    }

    /// Number of missing cells in a column.
    pub fn null_count(&self, index: usize) -> usize {
        self.column_values(index).filter(|v| v.is_null()).count()
    }

    /// Returns the first `limit` rows as a new table with the same schema.
    pub fn head(&self, limit: usize) -> RawTable {
        RawTable {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows: self.rows.iter().take(limit).cloned().collect(),
        }
    }

    /// Distinct projections onto `indices`, in order of first appearance.
    pub fn project_distinct(&self, indices: &[usize]) -> Vec<Vec<Value>> {
        let mut seen: HashSet<Vec<&Value>> = HashSet::new();
        let mut projected = Vec::new();
        for row in &self.rows {
            let key: Vec<&Value> = indices.iter().map(|&i| &row[i]).collect();
            if seen.insert(key) {
                projected.push(indices.iter().map(|&i| row[i].clone()).collect());
            }
        }
        projected
    }

    /// Number of distinct rows.
    pub fn distinct_row_count(&self) -> usize {
        self.rows.iter().collect::<HashSet<_>>().len()
    }

    /// Frequency of each distinct non-null value in a column, in order of
    /// first appearance.
    pub fn value_frequencies(&self, index: usize) -> Vec<(&Value, usize)> {
        let mut positions: HashMap<&Value, usize> = HashMap::new();
        let mut counts: Vec<(&Value, usize)> = Vec::new();
        for value in self.column_values(index).filter(|v| !v.is_null()) {
            match positions.get(value) {
                Some(&position) => counts[position].1 += 1,
                None => {
                    positions.insert(value, counts.len());
                    counts.push((value, 1));
                }
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn test_type_inference() {
        assert_eq!(
            infer_type(&[Value::Integer(1), Value::Null, Value::Integer(3)]),
            DataType::Integer
        );
        assert_eq!(
            infer_type(&[Value::Integer(1), Value::Float(2.5)]),
            DataType::Float
        );
        assert_eq!(infer_type(&[Value::Integer(1), text("a")]), DataType::Text);
        assert_eq!(infer_type(&[Value::Null, Value::Null]), DataType::Text);
        assert_eq!(infer_type(&[Value::Boolean(true)]), DataType::Boolean);
    }

    #[test]
    fn test_type_compatibility() {
        assert!(DataType::Float.accepts(DataType::Integer));
        assert!(DataType::Integer.accepts(DataType::Integer));
        assert!(!DataType::Integer.accepts(DataType::Float));
        assert!(!DataType::Text.accepts(DataType::Integer));
    }

    #[test]
    fn test_data_type_aliases() {
        let parsed: DataType = serde_json::from_str("\"int64\"").unwrap();
        assert_eq!(parsed, DataType::Integer);
        let parsed: DataType = serde_json::from_str("\"object\"").unwrap();
        assert_eq!(parsed, DataType::Text);
        let parsed: DataType = serde_json::from_str("\"datetime\"").unwrap();
        assert_eq!(parsed, DataType::DateTime);
    }

    #[test]
    fn test_value_equality_and_hashing() {
        assert_eq!(Value::Null, Value::Null);
        assert_eq!(Value::Float(0.0), Value::Float(-0.0));
        assert_ne!(Value::Integer(1), Value::Float(1.0));
        assert!(Value::Integer(1).loosely_equals(&Value::Float(1.0)));

        let mut set = HashSet::new();
        set.insert(Value::Float(1.5));
        set.insert(Value::Float(1.5));
        set.insert(Value::Null);
        set.insert(Value::Null);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_value_untagged_serde() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 3, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Boolean(true),
                Value::Integer(3),
                Value::Float(2.5),
                text("x")
            ]
        );
        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
    }

    #[test]
    fn test_numeric_for_keeps_integers_integral() {
        assert_eq!(Value::numeric_for(DataType::Integer, 20.0), Value::Integer(20));
        assert_eq!(Value::numeric_for(DataType::Integer, 12.5), Value::Float(12.5));
        assert_eq!(Value::numeric_for(DataType::Float, 20.0), Value::Float(20.0));
    }

    #[test]
    fn test_raw_table_rejects_duplicate_columns() {
        let result = RawTable::from_rows("t", &["a", "a"], vec![]);
        assert!(matches!(result, Err(NormalizeError::InvalidTable { .. })));
    }

    #[test]
    fn test_raw_table_rejects_ragged_rows() {
        let result = RawTable::from_rows(
            "t",
            &["a", "b"],
            vec![vec![Value::Integer(1), Value::Integer(2)], vec![Value::Integer(3)]],
        );
        let error = result.unwrap_err();
        assert!(error.to_string().contains("row 1 has 1 cells"));
    }

    #[test]
    fn test_project_distinct_preserves_first_appearance() {
        let table = RawTable::from_rows(
            "orders",
            &["order", "cust"],
            vec![
                vec![Value::Integer(1), text("Alice")],
                vec![Value::Integer(2), text("Bob")],
                vec![Value::Integer(3), text("Alice")],
            ],
        )
        .unwrap();

        assert_eq!(
            table.project_distinct(&[1]),
            vec![vec![text("Alice")], vec![text("Bob")]]
        );
        assert_eq!(table.distinct_row_count(), 3);
        assert_eq!(table.columns()[0].data_type, DataType::Integer);
    }

    #[test]
    fn test_value_frequencies_in_first_seen_order() {
        let table = RawTable::from_rows(
            "t",
            &["c"],
            vec![
                vec![text("b")],
                vec![text("a")],
                vec![Value::Null],
                vec![text("a")],
            ],
        )
        .unwrap();

        let frequencies = table.value_frequencies(0);
        assert_eq!(frequencies, vec![(&text("b"), 1), (&text("a"), 2)]);
    }

    #[test]
    fn test_with_rows_keeps_type_of_all_null_column() {
        let table = RawTable::from_rows(
            "t",
            &["n"],
            vec![vec![Value::Integer(1)], vec![Value::Null]],
        )
        .unwrap();
        let emptied = table.with_rows(vec![vec![Value::Null]]).unwrap();
        assert_eq!(emptied.columns()[0].data_type, DataType::Integer);
    }
}
