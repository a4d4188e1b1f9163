//! Functional dependency discovery.
//!
//! This module infers from the data which column sets determine which
//! other columns:
//! - **Partitions**: group rows by a column set's value tuple
//! - **Discovery**: bounded, level-wise search for minimal dependencies
//! - **Closure**: every column reachable from a set under the dependencies
//!
//! Columns are referred to by their position in the source table. Use
//! [`DependencySet::named`] to render dependencies with column names.

mod closure;
mod discovery;
mod partition;

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub use closure::{closure, is_implied_without};
pub use discovery::{DiscoveryOptions, dependency_holds, discover, is_unique};
pub use partition::Partition;

/// A set of column positions, kept sorted and free of duplicates.
///
/// Sets order by size first and then by their positions, so the minimum of
/// a collection is the smallest set with the leftmost columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnSet(Vec<usize>);

impl ColumnSet {
    /// Builds a set from any positions.
    pub fn new(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut indices: Vec<usize> = indices.into_iter().collect();
        indices.sort_unstable();
        indices.dedup();
        Self(indices)
    }

    /// The empty set.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// A single column.
    pub fn single(index: usize) -> Self {
        Self(vec![index])
    }

    /// Sorted positions
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true for the empty set
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Membership test.
    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    /// Returns true when every column of `self` is in `other`.
    pub fn is_subset(&self, other: &ColumnSet) -> bool {
        self.0.iter().all(|&i| other.contains(i))
    }

    /// Returns true for a subset that is not equal to `other`.
    pub fn is_strict_subset(&self, other: &ColumnSet) -> bool {
        self.len() < other.len() && self.is_subset(other)
    }

    /// A copy with one more column.
    pub fn with(&self, index: usize) -> ColumnSet {
        let mut indices = self.0.clone();
        if let Err(position) = indices.binary_search(&index) {
            indices.insert(position, index);
        }
        ColumnSet(indices)
    }

    /// A copy without one column.
    pub fn without(&self, index: usize) -> ColumnSet {
        ColumnSet(self.0.iter().copied().filter(|&i| i != index).collect())
    }

    /// Union of two sets.
    pub fn union(&self, other: &ColumnSet) -> ColumnSet {
        ColumnSet::new(self.0.iter().chain(&other.0).copied())
    }

    /// Iterates over positions in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Column names for this set.
    pub fn names<'a>(&self, columns: &'a [String]) -> Vec<&'a str> {
        self.0.iter().map(|&i| columns[i].as_str()).collect()
    }
}

impl Ord for ColumnSet {
    fn cmp(&self, other: &Self) -> Ordering {
        self.len()
            .cmp(&other.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for ColumnSet {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `determinant -> dependent`: every distinct determinant tuple maps to one
/// dependent value in the observed data.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionalDependency {
    /// Left-hand column set
    pub determinant: ColumnSet,
    /// Right-hand column
    pub dependent: usize,
}

impl FunctionalDependency {
    /// Creates a dependency.
    pub fn new(determinant: ColumnSet, dependent: usize) -> Self {
        Self {
            determinant,
            dependent,
        }
    }
}

/// A dependency rendered with column names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedDependency {
    /// Determinant column names
    pub determinant: Vec<String>,
    /// Dependent column name
    pub dependent: String,
}

impl std::fmt::Display for NamedDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.determinant.is_empty() {
            write!(f, "{{}} -> {}", self.dependent)
        } else {
            write!(f, "{} -> {}", self.determinant.join(", "), self.dependent)
        }
    }
}

/// Everything discovery found in one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencySet {
    /// Column names of the analyzed table, by position
    pub columns: Vec<String>,
    /// Minimal non-trivial dependencies in discovery order
    pub dependencies: Vec<FunctionalDependency>,
    /// Minimal determinants whose closure is every column
    pub candidate_keys: Vec<ColumnSet>,
    /// Determinant size ceiling the search ran with
    pub max_determinant_size: usize,
    /// Rows used for discovery when a sample was taken
    pub sampled_rows: Option<usize>,
}

impl DependencySet {
    /// Set of every column.
    pub fn all_columns(&self) -> ColumnSet {
        ColumnSet::new(0..self.columns.len())
    }

    /// Closure of `start` under the discovered dependencies.
    ///
    /// A set containing a candidate key reaches every column even when no
    /// dependency was recorded, which happens for tables with fewer than
    /// two distinct rows.
    pub fn closure(&self, start: &ColumnSet) -> ColumnSet {
        if self.candidate_keys.iter().any(|key| key.is_subset(start)) {
            return self.all_columns();
        }
        let reached = closure(start, &self.dependencies);
        if self.candidate_keys.iter().any(|key| key.is_subset(&reached)) {
            return self.all_columns();
        }
        reached
    }

    /// Returns true when `columns` determines every column.
    pub fn is_superkey(&self, columns: &ColumnSet) -> bool {
        self.closure(columns).len() == self.columns.len()
    }

    /// Smallest candidate key, leftmost columns first on ties.
    pub fn primary_key(&self) -> Option<&ColumnSet> {
        self.candidate_keys.iter().min()
    }

    /// How many dependencies each column appears in as part of the
    /// determinant, by position.
    pub fn determinant_frequency(&self) -> Vec<usize> {
        let mut counts = vec![0; self.columns.len()];
        for fd in &self.dependencies {
            for index in fd.determinant.iter() {
                counts[index] += 1;
            }
        }
        counts
    }

    /// Renders one dependency with column names.
    pub fn name(&self, fd: &FunctionalDependency) -> NamedDependency {
        NamedDependency {
            determinant: fd
                .determinant
                .names(&self.columns)
                .into_iter()
                .map(str::to_string)
                .collect(),
            dependent: self.columns[fd.dependent].clone(),
        }
    }

    /// All dependencies rendered with column names.
    pub fn named(&self) -> Vec<NamedDependency> {
        self.dependencies.iter().map(|fd| self.name(fd)).collect()
    }

    /// Candidate keys rendered with column names.
    pub fn named_keys(&self) -> Vec<Vec<String>> {
        self.candidate_keys
            .iter()
            .map(|key| key.names(&self.columns).into_iter().map(str::to_string).collect())
            .collect()
    }
}
