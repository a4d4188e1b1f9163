//! Level-wise search for minimal functional dependencies.
//!
//! Determinant sets are enumerated by increasing size up to a ceiling.
//! Each set's partition is built once from its parent's partition, so a
//! level costs one refinement per candidate set. Supersets of candidate
//! keys are never visited, and `X -> Y` is only tested when no strict
//! subset of `X` already determines `Y`.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::{RawTable, Value};

use super::{ColumnSet, DependencySet, FunctionalDependency, Partition};

/// Bounds on the dependency search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    /// Largest determinant set explored
    pub max_determinant_size: usize,
    /// Only the first `n` rows are searched; results are re-checked on
    /// the full table
    pub sample_size: Option<usize>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_determinant_size: 3,
            sample_size: None,
        }
    }
}

/// Discovers the minimal functional dependencies and candidate keys of a
/// table.
///
/// With a sample size smaller than the table, the search runs on the first
/// rows only and every result is then verified against all rows; results
/// that do not hold are discarded with a warning.
pub fn discover(table: &RawTable, options: &DiscoveryOptions) -> DependencySet {
    let max_size = options.max_determinant_size.max(1);
    let sample = options
        .sample_size
        .filter(|&rows| rows < table.row_count());

    let source: Cow<'_, RawTable> = match sample {
        Some(rows) => {
            tracing::debug!(
                "Sampling {} of {} rows for dependency discovery",
                rows,
                table.row_count()
            );
            Cow::Owned(table.head(rows))
        }
        None => Cow::Borrowed(table),
    };

    let mut set = search(&source, max_size);
    if let Some(rows) = sample {
        discard_unverified(table, &mut set);
        set.sampled_rows = Some(rows);
    }

    tracing::info!(
        "Discovered {} functional dependencies and {} candidate keys across {} columns",
        set.dependencies.len(),
        set.candidate_keys.len(),
        set.columns.len()
    );
    for fd in &set.dependencies {
        tracing::debug!("  {}", set.name(fd));
    }
    set
}

fn search(table: &RawTable, max_size: usize) -> DependencySet {
    let column_count = table.column_count();
    let all: Vec<usize> = (0..column_count).collect();
    let rows = table.project_distinct(&all);

    let mut set = DependencySet {
        columns: table.columns().iter().map(|c| c.name.clone()).collect(),
        dependencies: Vec::new(),
        candidate_keys: Vec::new(),
        max_determinant_size: max_size,
        sampled_rows: None,
    };

    if rows.len() < 2 {
        tracing::debug!(
            "Table '{}' has {} distinct rows, every column is a trivial key",
            table.name(),
            rows.len()
        );
        set.candidate_keys = all.into_iter().map(ColumnSet::single).collect();
        return set;
    }

    let singles: Vec<Partition> = all
        .iter()
        .map(|&column| Partition::for_column(&rows, column))
        .collect();

    // Constant columns depend on the empty set and never help determine
    // anything else.
    let mut candidates = Vec::with_capacity(column_count);
    for (column, partition) in singles.iter().enumerate() {
        if partition.group_count() == 1 {
            set.dependencies
                .push(FunctionalDependency::new(ColumnSet::empty(), column));
        } else {
            candidates.push(column);
        }
    }

    let distinct_rows = rows.len();
    let mut level: Vec<(ColumnSet, Partition)> = candidates
        .iter()
        .map(|&column| (ColumnSet::single(column), singles[column].clone()))
        .collect();

    for size in 1..=max_size {
        let mut survivors = Vec::with_capacity(level.len());
        for (determinant, partition) in level {
            if set
                .candidate_keys
                .iter()
                .any(|key| key.is_subset(&determinant))
            {
                continue;
            }

            if partition.group_count() == distinct_rows {
                for dependent in 0..column_count {
                    if !determinant.contains(dependent)
                        && !implied_by_subset(&set.dependencies, &determinant, dependent)
                    {
                        set.dependencies
                            .push(FunctionalDependency::new(determinant.clone(), dependent));
                    }
                }
                set.candidate_keys.push(determinant);
                continue;
            }

            for &dependent in &candidates {
                if determinant.contains(dependent)
                    || implied_by_subset(&set.dependencies, &determinant, dependent)
                {
                    continue;
                }
                if partition.determines(&singles[dependent]) {
                    set.dependencies
                        .push(FunctionalDependency::new(determinant.clone(), dependent));
                }
            }
            survivors.push((determinant, partition));
        }

        tracing::trace!(
            "Level {}: {} determinant sets carried forward",
            size,
            survivors.len()
        );
        if size == max_size || survivors.is_empty() {
            break;
        }
        level = next_level(&survivors, &candidates, &singles);
    }

    set
}

/// Extends every surviving set by each candidate column to its right.
fn next_level(
    survivors: &[(ColumnSet, Partition)],
    candidates: &[usize],
    singles: &[Partition],
) -> Vec<(ColumnSet, Partition)> {
    let mut level = Vec::new();
    for (determinant, partition) in survivors {
        let last = determinant.indices().last().copied().unwrap_or(0);
        for &column in candidates.iter().filter(|&&c| c > last) {
            level.push((determinant.with(column), partition.refine(&singles[column])));
        }
    }
    level
}

fn implied_by_subset(
    dependencies: &[FunctionalDependency],
    determinant: &ColumnSet,
    dependent: usize,
) -> bool {
    dependencies
        .iter()
        .any(|fd| fd.dependent == dependent && fd.determinant.is_strict_subset(determinant))
}

fn discard_unverified(table: &RawTable, set: &mut DependencySet) {
    set.dependencies.retain(|fd| {
        let holds = dependency_holds(table, fd);
        if !holds {
            tracing::warn!(
                "Sampled dependency {} does not hold on all rows, discarded",
                set_name(&set.columns, fd)
            );
        }
        holds
    });

    set.candidate_keys.retain(|key| {
        let unique = is_unique(table, key);
        if !unique {
            tracing::warn!(
                "Sampled candidate key {:?} is not unique on all rows, discarded",
                key.names(&set.columns)
            );
        }
        unique
    });
}

fn set_name(columns: &[String], fd: &FunctionalDependency) -> String {
    format!(
        "{:?} -> {}",
        fd.determinant.names(columns),
        columns[fd.dependent]
    )
}

/// Returns true when `fd` holds on every row of `table`.
pub fn dependency_holds(table: &RawTable, fd: &FunctionalDependency) -> bool {
    let mut seen: HashMap<Vec<&Value>, &Value> = HashMap::new();
    table.rows().iter().all(|row| {
        let key: Vec<&Value> = fd.determinant.iter().map(|i| &row[i]).collect();
        let value = &row[fd.dependent];
        *seen.entry(key).or_insert(value) == value
    })
}

/// Returns true when `columns` identifies every distinct row of `table`.
pub fn is_unique(table: &RawTable, columns: &ColumnSet) -> bool {
    let distinct_rows = table.distinct_row_count();
    let distinct_keys: HashSet<Vec<&Value>> = table
        .rows()
        .iter()
        .map(|row| columns.iter().map(|i| &row[i]).collect())
        .collect();
    distinct_keys.len() == distinct_rows
}
