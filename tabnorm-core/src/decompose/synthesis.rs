//! Third normal form synthesis from a canonical cover.
//!
//! Dependencies are grouped by determinant. Groups whose determinants have
//! the same closure are equivalent and become one relation, keyed on the
//! smallest determinant with the others kept as alternate keys. The group
//! whose closure is every column is the root relation and is keyed on the
//! primary key.
//!
//! Merging equivalent groups can leave a dependent that hangs off part of
//! a key or off another non-key column; `refine` splits those out.

use crate::dependency::{ColumnSet, DependencySet, FunctionalDependency, closure};

/// A relation in column-position space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Key the relation is named after
    pub key: ColumnSet,
    /// Other keys of the relation
    pub alternate_keys: Vec<ColumnSet>,
    /// Every column of the relation, key included
    pub columns: ColumnSet,
    /// True for the relation keyed on the primary key
    pub is_root: bool,
}

impl Relation {
    /// Column positions with the key first, the layout tables are built in.
    pub fn positions(&self) -> Vec<usize> {
        self.key
            .iter()
            .chain(self.columns.iter().filter(|c| !self.key.contains(*c)))
            .collect()
    }

    /// Primary key followed by the alternate keys.
    pub fn keys(&self) -> impl Iterator<Item = &ColumnSet> + '_ {
        std::iter::once(&self.key).chain(&self.alternate_keys)
    }
}

#[derive(Debug)]
struct EquivalenceClass {
    reach: ColumnSet,
    determinants: Vec<ColumnSet>,
    columns: ColumnSet,
}

/// Builds the relations of the decomposition, root first.
pub fn synthesize(
    dependencies: &DependencySet,
    cover: &[FunctionalDependency],
    primary_key: &ColumnSet,
) -> Vec<Relation> {
    let all = dependencies.all_columns();
    let reach = |determinant: &ColumnSet| {
        if dependencies
            .candidate_keys
            .iter()
            .any(|key| key.is_subset(determinant))
        {
            all.clone()
        } else {
            closure(determinant, cover)
        }
    };

    let mut classes: Vec<EquivalenceClass> = Vec::new();
    for fd in cover {
        let target = reach(&fd.determinant);
        let position = classes.iter().position(|class| class.reach == target);
        let class = match position {
            Some(position) => &mut classes[position],
            None => {
                classes.push(EquivalenceClass {
                    reach: target,
                    determinants: Vec::new(),
                    columns: ColumnSet::empty(),
                });
                let last = classes.len() - 1;
                &mut classes[last]
            }
        };
        if !class.determinants.contains(&fd.determinant) {
            class.determinants.push(fd.determinant.clone());
        }
        class.columns = class.columns.union(&fd.determinant).with(fd.dependent);
    }

    let root_position = classes.iter().position(|class| class.reach == all);
    let mut root = match root_position {
        Some(position) => classes.remove(position),
        None => EquivalenceClass {
            reach: all.clone(),
            determinants: Vec::new(),
            columns: ColumnSet::empty(),
        },
    };
    if !root.determinants.contains(primary_key) {
        root.determinants.push(primary_key.clone());
    }
    root.columns = root.columns.union(primary_key);

    // Columns no relation carries are determined by the key alone.
    let covered = classes
        .iter()
        .fold(root.columns.clone(), |acc, class| acc.union(&class.columns));
    for column in all.iter().filter(|&c| !covered.contains(c)) {
        root.columns = root.columns.with(column);
    }

    let mut root_alternates: Vec<ColumnSet> = root
        .determinants
        .iter()
        .chain(&dependencies.candidate_keys)
        .filter(|key| *key != primary_key && key.is_subset(&root.columns))
        .cloned()
        .collect();
    root_alternates.sort();
    root_alternates.dedup();

    let mut relations = Vec::with_capacity(classes.len() + 1);
    relations.push(Relation {
        key: primary_key.clone(),
        alternate_keys: root_alternates,
        columns: root.columns,
        is_root: true,
    });

    for class in classes {
        let mut determinants = class.determinants;
        determinants.sort();
        let key = determinants.remove(0);
        relations.push(Relation {
            key,
            alternate_keys: determinants,
            columns: class.columns,
            is_root: false,
        });
    }
    relations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fd(determinant: &[usize], dependent: usize) -> FunctionalDependency {
        FunctionalDependency::new(ColumnSet::new(determinant.iter().copied()), dependent)
    }

    fn dependency_set(columns: usize, keys: Vec<ColumnSet>) -> DependencySet {
        DependencySet {
            columns: (0..columns).map(|i| format!("c{}", i)).collect(),
            dependencies: Vec::new(),
            candidate_keys: keys,
            max_determinant_size: 3,
            sampled_rows: None,
        }
    }

    #[test]
    fn test_equivalent_determinants_share_a_relation() {
        let set = dependency_set(3, vec![ColumnSet::single(0)]);
        let cover = vec![fd(&[0], 1), fd(&[1], 2), fd(&[2], 1)];

        let relations = synthesize(&set, &cover, &ColumnSet::single(0));
        assert_eq!(relations.len(), 2);

        assert!(relations[0].is_root);
        assert_eq!(relations[0].columns, ColumnSet::new([0, 1]));
        assert!(relations[0].alternate_keys.is_empty());

        assert_eq!(relations[1].key, ColumnSet::single(1));
        assert_eq!(relations[1].alternate_keys, vec![ColumnSet::single(2)]);
        assert_eq!(relations[1].columns, ColumnSet::new([1, 2]));
    }

    #[test]
    fn test_identity_when_no_dependencies() {
        let set = dependency_set(3, vec![ColumnSet::single(0), ColumnSet::single(2)]);
        let relations = synthesize(&set, &[], &ColumnSet::single(0));

        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].columns, ColumnSet::new([0, 1, 2]));
        assert_eq!(relations[0].alternate_keys, vec![ColumnSet::single(2)]);
    }

    #[test]
    fn test_root_created_for_reduced_key() {
        let set = dependency_set(4, Vec::new());
        let cover = vec![fd(&[0], 3)];
        let relations = synthesize(&set, &cover, &ColumnSet::new([0, 1, 2]));

        assert_eq!(relations.len(), 2);
        assert_eq!(relations[0].columns, ColumnSet::new([0, 1, 2]));
        assert_eq!(relations[1].columns, ColumnSet::new([0, 3]));
    }
}
