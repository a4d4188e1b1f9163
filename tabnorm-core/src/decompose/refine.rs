//! Splitting relations until each is in third normal form.
//!
//! Every relation is projected from the cleaned table and searched again.
//! When a dependency `X -> A` has a determinant that is not a superkey and
//! a dependent outside every key, `X` and the non-key columns it determines
//! move to a new relation keyed on `X`. The remainder keeps its keys and
//! still holds `X`, so the split is lossless and the remainder can join the
//! new relation on it.

use std::collections::VecDeque;

use crate::dependency::{ColumnSet, DiscoveryOptions};
use crate::models::RawTable;
use crate::Result;

use super::Relation;
use super::verify::{Violation, find_violation};

/// Splits relations until none has a partial or transitive dependency.
///
/// The root relation stays first. Relations that end up with the same
/// columns are merged, their keys kept as alternate keys.
///
/// # Errors
/// Returns an invalid table error if a projection cannot be built.
pub fn refine(
    table: &RawTable,
    relations: Vec<Relation>,
    options: &DiscoveryOptions,
) -> Result<Vec<Relation>> {
    let mut pending: VecDeque<Relation> = relations.into();
    let mut done: Vec<Relation> = Vec::with_capacity(pending.len());

    while let Some(relation) = pending.pop_front() {
        let positions = relation.positions();
        let projected = RawTable::new(
            table.name(),
            positions
                .iter()
                .map(|&p| table.columns()[p].name.clone())
                .collect(),
            table.project_distinct(&positions),
        )?;
        let declared: Vec<ColumnSet> = relation
            .keys()
            .map(|key| to_local(key, &positions))
            .collect();

        match find_violation(&projected, &declared, options) {
            None => done.push(relation),
            Some(violation) => {
                let (rest, split_off) = split(relation, &violation, &positions);
                tracing::debug!(
                    "Splitting {:?} out of a relation keyed on {:?}",
                    names(&split_off.columns, table),
                    names(&rest.key, table)
                );
                pending.push_front(split_off);
                pending.push_front(rest);
            }
        }
    }

    Ok(merge_duplicates(done))
}

fn to_local(set: &ColumnSet, positions: &[usize]) -> ColumnSet {
    ColumnSet::new(
        set.iter()
            .filter_map(|column| positions.iter().position(|&p| p == column)),
    )
}

fn names(set: &ColumnSet, table: &RawTable) -> Vec<String> {
    set.iter().map(|p| table.columns()[p].name.clone()).collect()
}

/// Moves the violating determinant's non-key dependents into their own
/// relation. Returns the remainder and the new relation.
fn split(relation: Relation, violation: &Violation, positions: &[usize]) -> (Relation, Relation) {
    let local_determinant = &violation.dependency.determinant;
    let determinant = ColumnSet::new(local_determinant.iter().map(|i| positions[i]));
    let moved = ColumnSet::new(
        violation
            .found
            .dependencies
            .iter()
            .filter(|fd| {
                fd.determinant == *local_determinant
                    && !violation.keys.iter().any(|key| key.contains(fd.dependent))
            })
            .map(|fd| positions[fd.dependent]),
    );

    let split_off = Relation {
        key: determinant.clone(),
        alternate_keys: Vec::new(),
        columns: determinant.union(&moved),
        is_root: false,
    };
    let rest = Relation {
        columns: ColumnSet::new(relation.columns.iter().filter(|c| !moved.contains(*c))),
        ..relation
    };
    (rest, split_off)
}

fn merge_duplicates(relations: Vec<Relation>) -> Vec<Relation> {
    let mut merged: Vec<Relation> = Vec::with_capacity(relations.len());
    for relation in relations {
        let Some(existing) = merged.iter_mut().find(|r| r.columns == relation.columns) else {
            merged.push(relation);
            continue;
        };
        for key in relation.keys() {
            if *key != existing.key && !existing.alternate_keys.contains(key) {
                existing.alternate_keys.push(key.clone());
            }
        }
    }
    merged
}
