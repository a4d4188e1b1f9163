//! Primary key selection and canonical cover.

use crate::dependency::{ColumnSet, DependencySet, FunctionalDependency, closure, is_implied_without};

/// Chooses the primary key.
///
/// The smallest candidate key wins, leftmost columns first on ties. When
/// the search found no key within its ceiling, the full column set is
/// reduced greedily: scanning from the rightmost column, a column is
/// dropped whenever the remaining columns still determine it.
pub fn select_primary_key(dependencies: &DependencySet) -> ColumnSet {
    if let Some(key) = dependencies.primary_key() {
        return key.clone();
    }

    let mut key = dependencies.all_columns();
    for column in (0..dependencies.columns.len()).rev() {
        let rest = key.without(column);
        if dependencies.closure(&rest).contains(column) {
            key = rest;
        }
    }
    tracing::debug!(
        "No candidate key within size {}, reduced key is {:?}",
        dependencies.max_determinant_size,
        key.names(&dependencies.columns)
    );
    key
}

/// Minimal equivalent set of dependencies.
///
/// Dependencies on the empty set are restated on the primary key. Redundant
/// dependencies are then removed one at a time. Dependencies whose
/// determinant is the primary key are considered last, so the key keeps the
/// attributes it determines directly; the others are considered widest
/// closure first.
pub fn canonical_cover(
    dependencies: &DependencySet,
    primary_key: &ColumnSet,
) -> Vec<FunctionalDependency> {
    let mut cover: Vec<FunctionalDependency> = Vec::with_capacity(dependencies.dependencies.len());
    for fd in &dependencies.dependencies {
        let restated = if fd.determinant.is_empty() {
            FunctionalDependency::new(primary_key.clone(), fd.dependent)
        } else {
            fd.clone()
        };
        if !restated.determinant.contains(restated.dependent) && !cover.contains(&restated) {
            cover.push(restated);
        }
    }

    let mut order: Vec<(bool, usize, FunctionalDependency)> = cover
        .iter()
        .map(|fd| {
            let reach = closure(&fd.determinant, &cover).len();
            (fd.determinant == *primary_key, reach, fd.clone())
        })
        .collect();
    order.sort_by(|a, b| {
        a.0.cmp(&b.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| b.2.determinant.cmp(&a.2.determinant))
            .then_with(|| b.2.dependent.cmp(&a.2.dependent))
    });

    for (_, _, candidate) in order {
        if is_implied_without(&candidate, &cover) {
            tracing::trace!(
                "Removing redundant dependency {}",
                dependencies.name(&candidate)
            );
            cover.retain(|fd| *fd != candidate);
        }
    }
    cover
}
