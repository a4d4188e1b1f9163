//! Export of normalized tables and plans.
//!
//! - **CSV**: one file per normalized table
//! - **DDL**: portable SQL with keys, foreign keys and index statements
//! - **Report**: JSON document describing the run, without row data

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decompose::NormalizedTable;
use crate::dependency::NamedDependency;
use crate::metrics::NormalizationMetrics;
use crate::models::{ColumnDef, DataType};
use crate::pipeline::NormalizationResult;
use crate::planner::{ForeignKeyLink, IndexReason, IndexSpec, IntegrityPlan};
use crate::remediation::ColumnRemediation;
use crate::validator::ConstraintViolation;
use crate::{NormalizeError, Result};

/// Writes each normalized table to `<dir>/<table>.csv`.
///
/// Missing cells are written as empty fields. Returns the written paths in
/// table order.
///
/// # Errors
/// Returns I/O or CSV errors when a file cannot be created or written.
pub fn write_csv_tables(dir: &Path, tables: &[NormalizedTable]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .map_err(|e| NormalizeError::io(format!("Failed to create {}", dir.display()), e))?;

    let mut written = Vec::with_capacity(tables.len());
    for table in tables {
        let path = dir.join(format!("{}.csv", table.name));
        let mut writer = csv::Writer::from_path(&path)
            .map_err(|e| NormalizeError::csv(format!("Failed to create {}", path.display()), e))?;

        writer
            .write_record(table.columns.iter().map(|c| c.name.as_str()))
            .map_err(|e| NormalizeError::csv(format!("Failed to write header of {}", table.name), e))?;
        for row in &table.rows {
            writer
                .write_record(row.iter().map(ToString::to_string))
                .map_err(|e| NormalizeError::csv(format!("Failed to write row of {}", table.name), e))?;
        }
        writer
            .flush()
            .map_err(|e| NormalizeError::io(format!("Failed to flush {}", path.display()), e))?;

        tracing::debug!("Wrote {} rows to {}", table.row_count(), path.display());
        written.push(path);
    }
    Ok(written)
}

fn sql_type(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Integer => "BIGINT",
        DataType::Float => "DOUBLE PRECISION",
        DataType::Text => "TEXT",
        DataType::Boolean => "BOOLEAN",
        DataType::DateTime => "TIMESTAMP",
        DataType::Binary => "BLOB",
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn quote_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Renders SQL DDL for the tables and their plan.
///
/// Primary and alternate keys become table constraints, links become
/// `FOREIGN KEY` clauses, and every other proposed index becomes a
/// `CREATE INDEX` statement. Key indexes are implied by their constraints
/// and are not repeated.
pub fn render_ddl(tables: &[NormalizedTable], plan: &IntegrityPlan) -> String {
    let mut ddl = String::new();

    for table in tables {
        let mut clauses: Vec<String> = table
            .columns
            .iter()
            .map(|column| {
                let not_null = if table.primary_key.contains(&column.name) {
                    " NOT NULL"
                } else {
                    ""
                };
                format!("    {} {}{}", quote(&column.name), sql_type(column.data_type), not_null)
            })
            .collect();

        if !table.primary_key.is_empty() {
            clauses.push(format!("    PRIMARY KEY ({})", quote_list(&table.primary_key)));
        }
        for key in &table.alternate_keys {
            clauses.push(format!("    UNIQUE ({})", quote_list(key)));
        }
        for link in plan.links.iter().filter(|l| l.child_table == table.name) {
            clauses.push(format!(
                "    CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
                quote(&link.name),
                quote_list(&link.child_columns),
                quote(&link.parent_table),
                quote_list(&link.parent_columns)
            ));
        }

        ddl.push_str(&format!(
            "CREATE TABLE {} (\n{}\n);\n\n",
            quote(&table.name),
            clauses.join(",\n")
        ));
    }

    for index in plan
        .indexes
        .iter()
        .filter(|i| !matches!(i.reason, IndexReason::PrimaryKey | IndexReason::AlternateKey))
    {
        let unique = if index.unique { "UNIQUE " } else { "" };
        ddl.push_str(&format!(
            "CREATE {}INDEX {} ON {} ({});\n",
            unique,
            quote(&index.name),
            quote(&index.table),
            quote_list(&index.columns)
        ));
    }

    ddl
}

/// Shape of one normalized table, without its rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub alternate_keys: Vec<Vec<String>>,
    pub is_root: bool,
    pub row_count: usize,
}

impl From<&NormalizedTable> for TableSummary {
    fn from(table: &NormalizedTable) -> Self {
        Self {
            name: table.name.clone(),
            columns: table.columns.clone(),
            primary_key: table.primary_key.clone(),
            alternate_keys: table.alternate_keys.clone(),
            is_root: table.is_root,
            row_count: table.row_count(),
        }
    }
}

/// Serializable description of a normalization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationReport {
    /// Crate version that produced the report
    pub generator_version: String,
    /// When the report was built
    pub generated_at: DateTime<Utc>,
    /// Primary key chosen for the source table
    pub primary_key: Vec<String>,
    pub tables: Vec<TableSummary>,
    pub functional_dependencies: Vec<NamedDependency>,
    pub candidate_keys: Vec<Vec<String>>,
    /// Canonical cover used for synthesis
    pub cover: Vec<NamedDependency>,
    pub foreign_keys: Vec<ForeignKeyLink>,
    pub indexes: Vec<IndexSpec>,
    pub constraint_violations: Vec<ConstraintViolation>,
    pub remediation: Vec<ColumnRemediation>,
    pub metrics: NormalizationMetrics,
}

impl NormalizationReport {
    /// Builds the report for a finished run.
    pub fn from_result(result: &NormalizationResult) -> Self {
        Self {
            generator_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
            primary_key: result.decomposition.primary_key.clone(),
            tables: result.tables().iter().map(TableSummary::from).collect(),
            functional_dependencies: result.dependencies.named(),
            candidate_keys: result.dependencies.named_keys(),
            cover: result.decomposition.cover.clone(),
            foreign_keys: result.plan.links.clone(),
            indexes: result.plan.indexes.clone(),
            constraint_violations: result.validation.violations.clone(),
            remediation: result.remediation.clone(),
            metrics: result.metrics.clone(),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    /// Returns a serialization error if the report cannot be encoded.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| NormalizeError::serialization("Failed to serialize report", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Value;

    fn create_sample_tables() -> (Vec<NormalizedTable>, IntegrityPlan) {
        let tables = vec![
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
                    vec![Value::Integer(1), Value::from("Alice")],
                    vec![Value::Integer(2), Value::from("Bob")],
                ],
            },
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
                    vec![Value::from("Alice"), Value::from("a@x.com")],
                    vec![Value::from("Bob"), Value::Null],
                ],
            },
        ];
        let plan = IntegrityPlan {
            links: vec![ForeignKeyLink {
                name: "fk_data_order_data_cust".to_string(),
                child_table: "data_order".to_string(),
                child_columns: vec!["cust".to_string()],
                parent_table: "data_cust".to_string(),
                parent_columns: vec!["cust".to_string()],
            }],
            indexes: vec![
                IndexSpec {
                    name: "pk_data_order".to_string(),
                    table: "data_order".to_string(),
                    columns: vec!["order".to_string()],
                    unique: true,
                    reason: IndexReason::PrimaryKey,
                },
                IndexSpec {
                    name: "idx_data_order_cust".to_string(),
                    table: "data_order".to_string(),
                    columns: vec!["cust".to_string()],
                    unique: false,
                    reason: IndexReason::ForeignKey,
                },
            ],
            integrity_checks: 1,
        };
        (tables, plan)
    }

    #[test]
    fn test_render_ddl() {
        let (tables, plan) = create_sample_tables();
        let ddl = render_ddl(&tables, &plan);

        assert!(ddl.contains("CREATE TABLE \"data_order\" ("));
        assert!(ddl.contains("\"order\" BIGINT NOT NULL"));
        assert!(ddl.contains("PRIMARY KEY (\"order\")"));
        assert!(ddl.contains("UNIQUE (\"email\")"));
        assert!(ddl.contains(
            "CONSTRAINT \"fk_data_order_data_cust\" FOREIGN KEY (\"cust\") REFERENCES \"data_cust\" (\"cust\")"
        ));
        assert!(ddl.contains("CREATE INDEX \"idx_data_order_cust\" ON \"data_order\" (\"cust\");"));
        assert!(!ddl.contains("INDEX \"pk_data_order\""));
        assert!(ddl.contains("\n);\n\nCREATE TABLE \"data_cust\" (\n"));
        assert!(ddl.ends_with(";\n"));
    }

    #[test]
    fn test_quote_escapes_embedded_quotes() {
        assert_eq!(quote("a\"b"), "\"a\"\"b\"");
    }

    #[test]
    fn test_write_csv_tables() {
        let (tables, _) = create_sample_tables();
        let dir = tempfile::tempdir().unwrap();
        let paths = write_csv_tables(dir.path(), &tables).unwrap();

        assert_eq!(paths.len(), 2);
        let contents = std::fs::read_to_string(&paths[1]).unwrap();
        assert_eq!(contents, "cust,email\nAlice,a@x.com\nBob,\n");
    }
}
