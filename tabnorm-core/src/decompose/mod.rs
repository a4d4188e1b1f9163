//! Schema decomposition into third normal form.
//!
//! This module turns a cleaned table and its discovered dependencies into a
//! set of normalized tables:
//! - **Cover**: choose the primary key and reduce the dependencies to a
//!   canonical cover
//! - **Synthesis**: one table per class of equivalent determinants, plus a
//!   root table keyed on the primary key
//! - **Refinement**: split out any dependent left hanging off part of a key
//!   or off another non-key column
//! - **Verification**: re-run discovery on each table to confirm 3NF
//! - **Rejoin**: join the tables back to check nothing was lost
//!
//! Each table's rows are the distinct projections of its columns, which is
//! where duplicated value tuples collapse.

mod cover;
mod refine;
mod rejoin;
mod synthesis;
mod verify;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::dependency::{ColumnSet, DependencySet, DiscoveryOptions, NamedDependency};
use crate::models::{ColumnDef, RawTable, Value};
use crate::{NormalizeError, Result};

pub use cover::{canonical_cover, select_primary_key};
pub use refine::refine;
pub use rejoin::{JoinedRows, rejoin};
pub use synthesis::{Relation, synthesize};
pub use verify::verify_third_normal_form;

/// A table produced by decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTable {
    /// Unique table name within the run
    pub name: String,
    /// Columns, key columns first
    pub columns: Vec<ColumnDef>,
    /// Primary key column names
    pub primary_key: Vec<String>,
    /// Other keys of this table
    pub alternate_keys: Vec<Vec<String>>,
    /// True for the table keyed on the source table's primary key
    pub is_root: bool,
    /// Distinct rows in order of first appearance
    pub rows: Vec<Vec<Value>>,
}

impl NormalizedTable {
    /// Ordered column names
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Number of rows
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Primary key followed by the alternate keys.
    pub fn keys(&self) -> impl Iterator<Item = &Vec<String>> + '_ {
        std::iter::once(&self.primary_key).chain(&self.alternate_keys)
    }

    /// All keys as positions within this table.
    pub fn key_sets(&self) -> Vec<ColumnSet> {
        self.keys()
            .map(|key| ColumnSet::new(key.iter().filter_map(|c| self.column_index(c))))
            .collect()
    }

    /// Distinct value tuples of the given columns, skipping tuples with a
    /// missing value.
    pub fn distinct_tuples(&self, columns: &[String]) -> Option<HashSet<Vec<&Value>>> {
        let positions: Vec<usize> = columns
            .iter()
            .map(|c| self.column_index(c))
            .collect::<Option<_>>()?;
        Some(
            self.rows
                .iter()
                .map(|row| positions.iter().map(|&p| &row[p]).collect::<Vec<_>>())
                .filter(|tuple| tuple.iter().all(|v| !v.is_null()))
                .collect(),
        )
    }

    /// This table as a raw table, for re-running discovery or export.
    pub fn to_raw_table(&self) -> Result<RawTable> {
        RawTable::new(self.name.clone(), self.column_names(), self.rows.clone())
    }
}

/// Output of decomposition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    /// Tables, root first
    pub tables: Vec<NormalizedTable>,
    /// Primary key of the source table
    pub primary_key: Vec<String>,
    /// Canonical cover the tables were synthesized from
    pub cover: Vec<NamedDependency>,
}

impl Decomposition {
    /// The root table.
    pub fn root(&self) -> Option<&NormalizedTable> {
        self.tables.iter().find(|t| t.is_root)
    }

    /// Tables other than the root.
    pub fn derived(&self) -> impl Iterator<Item = &NormalizedTable> + '_ {
        self.tables.iter().filter(|t| !t.is_root)
    }
}

/// Decomposes a cleaned table into third normal form.
///
/// Table names are `<table_name>_<key columns>`, lowercased with every
/// character other than letters, digits and `_` replaced by `_`, and made
/// unique with a numeric suffix. With no dependencies the result is the
/// identity table.
///
/// `options` bound the searches run on each relation while refining; pass
/// the options `dependencies` was discovered with.
///
/// # Errors
/// Returns an invalid table error for a table without columns.
pub fn decompose(
    table: &RawTable,
    dependencies: &DependencySet,
    table_name: &str,
    options: &DiscoveryOptions,
) -> Result<Decomposition> {
    if table.column_count() == 0 {
        return Err(NormalizeError::invalid_table(
            table.name(),
            "table has no columns",
        ));
    }

    let primary_key = select_primary_key(dependencies);
    let cover = canonical_cover(dependencies, &primary_key);
    let relations = synthesize(dependencies, &cover, &primary_key);
    let relations = refine(table, relations, options)?;

    let mut used_names = HashSet::new();
    let tables: Vec<NormalizedTable> = relations
        .iter()
        .map(|relation| build_table(table, dependencies, relation, table_name, &mut used_names))
        .collect();

    tracing::info!(
        "Decomposed '{}' into {} tables keyed on {:?}",
        table.name(),
        tables.len(),
        primary_key.names(&dependencies.columns)
    );
    for normalized in &tables {
        tracing::debug!(
            "  {} ({} columns, {} rows)",
            normalized.name,
            normalized.columns.len(),
            normalized.rows.len()
        );
    }

    Ok(Decomposition {
        tables,
        primary_key: names(&primary_key, &dependencies.columns),
        cover: cover.iter().map(|fd| dependencies.name(fd)).collect(),
    })
}

fn names(set: &ColumnSet, columns: &[String]) -> Vec<String> {
    set.names(columns).into_iter().map(str::to_string).collect()
}

fn build_table(
    table: &RawTable,
    dependencies: &DependencySet,
    relation: &Relation,
    table_name: &str,
    used_names: &mut HashSet<String>,
) -> NormalizedTable {
    let positions = relation.positions();

    let key_names = names(&relation.key, &dependencies.columns);
    let name = unique_name(
        &table_name_for(table_name, &key_names),
        used_names,
    );

    NormalizedTable {
        name,
        columns: positions
            .iter()
            .map(|&p| table.columns()[p].clone())
            .collect(),
        primary_key: key_names,
        alternate_keys: relation
            .alternate_keys
            .iter()
            .map(|key| names(key, &dependencies.columns))
            .collect(),
        is_root: relation.is_root,
        rows: table.project_distinct(&positions),
    }
}

/// `<prefix>_<key columns>`, sanitized for use as an identifier.
pub fn table_name_for(prefix: &str, key_columns: &[String]) -> String {
    let raw = if key_columns.is_empty() {
        prefix.to_string()
    } else {
        format!("{}_{}", prefix, key_columns.join("_"))
    };
    sanitize_identifier(&raw)
}

/// Lowercases and replaces every character outside `[a-z0-9_]` with `_`.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

fn unique_name(base: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = base.to_string();
    let mut suffix = 2;
    while used.contains(&candidate) {
        candidate = format!("{}_{}", base, suffix);
        suffix += 1;
    }
    used.insert(candidate.clone());
    candidate
}
