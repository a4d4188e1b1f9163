//! Foreign key and index planning.
//!
//! The planner only emits specifications. Creating constraints and indexes
//! is left to whatever consumes the plan.

use serde::{Deserialize, Serialize};

use crate::decompose::{NormalizedTable, sanitize_identifier};
use crate::dependency::DependencySet;
use crate::{NormalizeError, Result};

/// A foreign key from a child table's columns to a key of the parent table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyLink {
    /// Constraint name
    pub name: String,
    /// Referencing table
    pub child_table: String,
    /// Referencing columns
    pub child_columns: Vec<String>,
    /// Referenced table
    pub parent_table: String,
    /// Referenced key columns, the primary key or an alternate key
    pub parent_columns: Vec<String>,
}

/// Why an index was proposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexReason {
    /// Enforces the primary key
    PrimaryKey,
    /// Enforces an alternate key
    AlternateKey,
    /// Speeds joins over a foreign key
    ForeignKey,
    /// Column is a frequent determinant
    Determinant,
}

/// A proposed index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name
    pub name: String,
    /// Indexed table
    pub table: String,
    /// Indexed columns in order
    pub columns: Vec<String>,
    /// Whether the index enforces uniqueness
    pub unique: bool,
    /// Reason for proposing it
    pub reason: IndexReason,
}

/// Links and indexes for one decomposition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityPlan {
    /// Foreign key links
    pub links: Vec<ForeignKeyLink>,
    /// Proposed indexes
    pub indexes: Vec<IndexSpec>,
    /// Links checked against the data
    pub integrity_checks: usize,
}

/// Builds the link and index plan.
///
/// A table whose columns include every column of another table's primary
/// key, or failing that one of its alternate keys, references that table.
/// Indexes are proposed for every primary and alternate key, every foreign
/// key, and every column that appears in at least `determinant_threshold`
/// discovered determinants.
pub fn plan_integrity(
    tables: &[NormalizedTable],
    dependencies: &DependencySet,
    determinant_threshold: usize,
) -> IntegrityPlan {
    let links = derive_links(tables);
    let mut indexes: Vec<IndexSpec> = Vec::new();

    for table in tables {
        push_index(
            &mut indexes,
            format!("pk_{}", table.name),
            table,
            &table.primary_key,
            true,
            IndexReason::PrimaryKey,
        );
        for key in &table.alternate_keys {
            push_index(
                &mut indexes,
                index_name("uq", &table.name, key),
                table,
                key,
                true,
                IndexReason::AlternateKey,
            );
        }
    }

    for link in &links {
        if let Some(child) = tables.iter().find(|t| t.name == link.child_table) {
            push_index(
                &mut indexes,
                index_name("idx", &child.name, &link.child_columns),
                child,
                &link.child_columns,
                false,
                IndexReason::ForeignKey,
            );
        }
    }

    let frequency = dependencies.determinant_frequency();
    for (position, count) in frequency.into_iter().enumerate() {
        if count < determinant_threshold {
            continue;
        }
        let column = vec![dependencies.columns[position].clone()];
        if let Some(table) = tables.iter().find(|t| t.column_index(&column[0]).is_some()) {
            push_index(
                &mut indexes,
                index_name("idx", &table.name, &column),
                table,
                &column,
                false,
                IndexReason::Determinant,
            );
        }
    }

    tracing::info!(
        "Planned {} foreign keys and {} indexes",
        links.len(),
        indexes.len()
    );

    IntegrityPlan {
        links,
        indexes,
        integrity_checks: 0,
    }
}

fn derive_links(tables: &[NormalizedTable]) -> Vec<ForeignKeyLink> {
    let mut links = Vec::new();
    for parent in tables {
        for child in tables {
            if child.name == parent.name {
                continue;
            }
            let Some(key) = referenced_key(child, parent) else {
                continue;
            };
            tracing::debug!("Foreign key {}{:?} -> {}", child.name, key, parent.name);
            links.push(ForeignKeyLink {
                name: index_name(&format!("fk_{}", child.name), &parent.name, &[]),
                child_table: child.name.clone(),
                child_columns: key.clone(),
                parent_table: parent.name.clone(),
                parent_columns: key.clone(),
            });
        }
    }
    links
}

/// The first key of `parent`, primary key first, whose columns all appear
/// in `child` without being a key of `child` itself.
fn referenced_key<'a>(
    child: &NormalizedTable,
    parent: &'a NormalizedTable,
) -> Option<&'a Vec<String>> {
    parent.keys().find(|key| {
        !key.is_empty()
            && key.iter().all(|column| child.column_index(column).is_some())
            && !child.keys().any(|own| own == *key)
    })
}

fn index_name(prefix: &str, table: &str, columns: &[String]) -> String {
    let mut parts = vec![prefix.to_string(), table.to_string()];
    parts.extend(columns.iter().cloned());
    sanitize_identifier(&parts.join("_"))
}

fn push_index(
    indexes: &mut Vec<IndexSpec>,
    name: String,
    table: &NormalizedTable,
    columns: &[String],
    unique: bool,
    reason: IndexReason,
) {
    if columns.is_empty()
        || indexes
            .iter()
            .any(|existing| existing.table == table.name && existing.columns == columns)
    {
        return;
    }
    indexes.push(IndexSpec {
        name,
        table: table.name.clone(),
        columns: columns.to_vec(),
        unique,
        reason,
    });
}

/// Checks every link against the data: each child tuple must exist among
/// the parent's key tuples. Tuples with a missing value are not checked.
///
/// Returns the number of links checked.
///
/// # Errors
/// Returns `NormalizeError::ReferentialIntegrity` for the first link that
/// does not hold.
pub fn check_integrity(plan: &mut IntegrityPlan, tables: &[NormalizedTable]) -> Result<usize> {
    let mut checks = 0;
    for link in &plan.links {
        let child = tables.iter().find(|t| t.name == link.child_table);
        let parent = tables.iter().find(|t| t.name == link.parent_table);
        let holds = match (child, parent) {
            (Some(child), Some(parent)) => {
                match (
                    child.distinct_tuples(&link.child_columns),
                    parent.distinct_tuples(&link.parent_columns),
                ) {
                    (Some(child_keys), Some(parent_keys)) => child_keys.is_subset(&parent_keys),
                    _ => false,
                }
            }
            _ => false,
        };
        checks += 1;
        if !holds {
            return Err(NormalizeError::ReferentialIntegrity {
                child_table: link.child_table.clone(),
                child_columns: link.child_columns.clone(),
                parent_table: link.parent_table.clone(),
            });
        }
    }
    plan.integrity_checks = checks;
    tracing::debug!("{} referential integrity checks passed", checks);
    Ok(checks)
}
