//! Tabular loader for delimited text, JSON record files and spreadsheets.
//!
//! Supported inputs:
//! - **CSV / TSV**: first record is the header, empty cells are missing
//! - **JSON**: a top-level array of objects, columns unioned in first-seen
//!   order, absent keys are missing
//! - **Spreadsheets** (`xlsx`, `xlsm`, `xlsb`, `xls`, `ods`): the first
//!   worksheet, its first row as the header, empty cells are missing
//!
//! Cells are parsed to the narrowest scalar that fits. A column always ends
//! up holding one scalar kind: integers mixed with floats widen to floats,
//! and any other mixture reverts the whole column to its text form.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use calamine::{Data, Range, Reader};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;

use crate::models::{DataType, RawTable, Value};
use crate::{NormalizeError, Result};

/// Loads a table from `path`, choosing the reader by file extension.
///
/// # Errors
/// Returns `UnsupportedFormat` for an unknown extension, and I/O or parse
/// errors for unreadable input.
pub fn load_path(path: &Path, table_name: &str) -> Result<RawTable> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" => read_delimited(open(path)?, b',', table_name)?,
        "tsv" => read_delimited(open(path)?, b'\t', table_name)?,
        "json" => read_json(open(path)?, table_name)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_spreadsheet(path, table_name)?,
        other => {
            let format = if other.is_empty() {
                path.display().to_string()
            } else {
                other.to_string()
            };
            return Err(NormalizeError::unsupported_format(format));
        }
    };
    tracing::info!(
        "Loaded {} ({} rows x {} columns)",
        path.display(),
        table.row_count(),
        table.column_count()
    );
    Ok(table)
}

fn open(path: &Path) -> Result<BufReader<File>> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|e| NormalizeError::io(format!("Failed to open {}", path.display()), e))
}

/// Reads delimited text with a header record.
///
/// # Errors
/// Returns a CSV error for malformed records, or `InvalidTable` for
/// duplicate headers.
pub fn read_delimited<R: Read>(reader: R, delimiter: u8, table_name: &str) -> Result<RawTable> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| NormalizeError::csv("Failed to read header", e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut raw_columns: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for (index, record) in csv_reader.records().enumerate() {
        let record =
            record.map_err(|e| NormalizeError::csv(format!("Failed to read record {}", index), e))?;
        for (column, cell) in raw_columns.iter_mut().zip(record.iter()) {
            column.push(cell.to_string());
        }
    }

    let columns: Vec<Vec<Value>> = raw_columns
        .iter()
        .zip(&headers)
        .map(|(cells, name)| {
            let parsed: Vec<Value> = cells.iter().map(|c| parse_cell(c)).collect();
            unify_column(name, parsed, |i| Value::Text(cells[i].trim().to_string()))
        })
        .collect();

    RawTable::new(table_name, headers, transpose(columns))
}

/// Reads a JSON array of records.
///
/// # Errors
/// Returns a serialization error for invalid JSON and `UnsupportedFormat`
/// when the document is not an array of objects.
pub fn read_json<R: Read>(reader: R, table_name: &str) -> Result<RawTable> {
    let document: serde_json::Value = serde_json::from_reader(reader)
        .map_err(|e| NormalizeError::serialization("Failed to parse JSON input", e))?;

    let serde_json::Value::Array(records) = document else {
        return Err(NormalizeError::unsupported_format(
            "JSON document that is not an array of records",
        ));
    };

    let mut columns: IndexMap<String, Vec<Value>> = IndexMap::new();
    for (index, record) in records.iter().enumerate() {
        let serde_json::Value::Object(fields) = record else {
            return Err(NormalizeError::unsupported_format(format!(
                "JSON record {} is not an object",
                index
            )));
        };
        for (key, value) in fields {
            let column = columns
                .entry(key.clone())
                .or_insert_with(|| vec![Value::Null; index]);
            column.push(json_cell(key, value));
        }
        for column in columns.values_mut() {
            if column.len() <= index {
                column.push(Value::Null);
            }
        }
    }

    let names: Vec<String> = columns.keys().cloned().collect();
    let unified: Vec<Vec<Value>> = columns
        .into_iter()
        .map(|(name, values)| {
            let text_form: Vec<Value> = values
                .iter()
                .map(|v| Value::Text(v.to_string()))
                .collect();
            unify_column(&name, values, |i| text_form[i].clone())
        })
        .collect();

    RawTable::new(table_name, names, transpose(unified))
}

/// Reads the first worksheet of a workbook.
///
/// # Errors
/// Returns a spreadsheet error when the workbook cannot be opened or read,
/// and `InvalidTable` when it has no worksheet.
pub fn read_spreadsheet(path: &Path, table_name: &str) -> Result<RawTable> {
    let mut workbook = calamine::open_workbook_auto(path).map_err(|e| {
        NormalizeError::spreadsheet(format!("Failed to open {}", path.display()), e)
    })?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| {
            NormalizeError::invalid_table(table_name, format!("{} has no worksheet", path.display()))
        })?
        .map_err(|e| {
            NormalizeError::spreadsheet(format!("Failed to read {}", path.display()), e)
        })?;
    read_range(&range, table_name)
}

/// Builds a table from a worksheet range whose first row is the header.
///
/// # Errors
/// Returns `InvalidTable` for duplicate headers.
pub fn read_range(range: &Range<Data>, table_name: &str) -> Result<RawTable> {
    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| {
            header
                .iter()
                .enumerate()
                .map(|(i, cell)| match cell.to_string().trim() {
                    "" => format!("column_{}", i + 1),
                    name => name.to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    let mut raw_columns: Vec<Vec<&Data>> = vec![Vec::new(); headers.len()];
    for row in rows {
        for (column, cell) in raw_columns.iter_mut().zip(row) {
            column.push(cell);
        }
    }

    let columns: Vec<Vec<Value>> = raw_columns
        .iter()
        .zip(&headers)
        .map(|(cells, name)| {
            let parsed: Vec<Value> = cells.iter().map(|c| sheet_cell(name, c)).collect();
            unify_column(name, parsed, |i| {
                Value::Text(cells[i].to_string().trim().to_string())
            })
        })
        .collect();

    RawTable::new(table_name, headers, transpose(columns))
}

fn sheet_cell(column: &str, cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::Int(i) => Value::Integer(*i),
        // Workbooks store every number as a float.
        Data::Float(f) => Value::numeric_for(DataType::Integer, *f),
        Data::Bool(b) => Value::Boolean(*b),
        Data::String(s) => parse_cell(s),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map_or_else(|| Value::Float(dt.as_f64()), Value::DateTime),
        Data::DateTimeIso(s) => parse_datetime(s)
            .or_else(|| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok())
            .map_or_else(|| Value::Text(s.clone()), Value::DateTime),
        Data::DurationIso(s) => Value::Text(s.clone()),
        Data::Error(e) => {
            tracing::warn!("Cell error {:?} in column '{}' treated as missing", e, column);
            Value::Null
        }
    }
}

/// Parses one delimited cell to the narrowest scalar that fits.
pub fn parse_cell(raw: &str) -> Value {
    let cell = raw.trim();
    if cell.is_empty() {
        return Value::Null;
    }
    match cell.to_ascii_lowercase().as_str() {
        "true" => return Value::Boolean(true),
        "false" => return Value::Boolean(false),
        _ => {}
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::Integer(i);
    }
    if let Ok(f) = cell.parse::<f64>() {
        if f.is_finite() {
            return Value::Float(f);
        }
    }
    parse_datetime(cell).map_or_else(|| Value::Text(cell.to_string()), Value::DateTime)
}

/// Parses `%Y-%m-%d`, `%Y-%m-%d %H:%M:%S` or RFC 3339 timestamps.
pub fn parse_datetime(cell: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(cell, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    DateTime::parse_from_rfc3339(cell)
        .ok()
        .map(|dt| dt.naive_utc())
}

fn json_cell(key: &str, value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Value::Integer(i),
            None => n.as_f64().map_or(Value::Null, Value::Float),
        },
        serde_json::Value::String(s) => {
            parse_datetime(s).map_or_else(|| Value::Text(s.clone()), Value::DateTime)
        }
        nested @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
            tracing::warn!("Non-atomic value in column '{}' stored as text", key);
            Value::Text(nested.to_string())
        }
    }
}

/// Brings a parsed column down to a single scalar kind.
fn unify_column(name: &str, values: Vec<Value>, text_of: impl Fn(usize) -> Value) -> Vec<Value> {
    let mut kinds: Vec<DataType> = values.iter().filter_map(Value::data_type).collect();
    kinds.sort_by_key(|k| *k as u8);
    kinds.dedup();

    match kinds.as_slice() {
        [] | [_] => values,
        [DataType::Integer, DataType::Float] => values
            .into_iter()
            .map(|v| match v {
                Value::Integer(i) => Value::Float(i as f64),
                other => other,
            })
            .collect(),
        _ => {
            tracing::debug!("Column '{}' mixes {:?}, keeping it as text", name, kinds);
            values
                .iter()
                .enumerate()
                .map(|(i, v)| if v.is_null() { Value::Null } else { text_of(i) })
                .collect()
        }
    }
}

fn transpose(columns: Vec<Vec<Value>>) -> Vec<Vec<Value>> {
    let row_count = columns.first().map_or(0, Vec::len);
    let mut rows: Vec<Vec<Value>> = (0..row_count)
        .map(|_| Vec::with_capacity(columns.len()))
        .collect();
    for column in columns {
        for (row, value) in rows.iter_mut().zip(column) {
            row.push(value);
        }
    }
    rows
}
