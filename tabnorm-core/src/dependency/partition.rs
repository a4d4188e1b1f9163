//! Row partitions over column sets.
//!
//! A partition assigns every row the id of its group under the value tuple
//! of some column set. `X -> Y` holds exactly when refining the partition of
//! `X` by `Y` does not split any group.

use std::collections::HashMap;

use crate::models::Value;

/// Group label per row for one column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    labels: Vec<u32>,
    group_count: usize,
}

impl Partition {
    /// Partition of the empty column set: every row in one group.
    pub fn unit(row_count: usize) -> Self {
        Self {
            labels: vec![0; row_count],
            group_count: usize::from(row_count > 0),
        }
    }

    /// Partitions rows by the value of one column.
    ///
    /// `NULL` is treated as an ordinary value, so all missing cells share a
    /// group.
    pub fn for_column(rows: &[Vec<Value>], column: usize) -> Self {
        let mut ids: HashMap<&Value, u32> = HashMap::new();
        let labels = rows
            .iter()
            .map(|row| {
                let next = ids.len() as u32;
                *ids.entry(&row[column]).or_insert(next)
            })
            .collect();
        Self {
            labels,
            group_count: ids.len(),
        }
    }

    /// Number of distinct value tuples
    pub fn group_count(&self) -> usize {
        self.group_count
    }

    /// Number of rows covered
    pub fn row_count(&self) -> usize {
        self.labels.len()
    }

    /// Product partition: rows share a group only if they share one in both.
    pub fn refine(&self, other: &Partition) -> Partition {
        let mut ids: HashMap<(u32, u32), u32> = HashMap::new();
        let labels = self
            .labels
            .iter()
            .zip(&other.labels)
            .map(|(&a, &b)| {
                let next = ids.len() as u32;
                *ids.entry((a, b)).or_insert(next)
            })
            .collect();
        Partition {
            labels,
            group_count: ids.len(),
        }
    }

    /// Returns true when no group of `self` holds two different labels of
    /// `other`.
    pub fn determines(&self, other: &Partition) -> bool {
        let mut seen: HashMap<u32, u32> = HashMap::with_capacity(self.group_count);
        self.labels
            .iter()
            .zip(&other.labels)
            .all(|(&group, &label)| *seen.entry(group).or_insert(label) == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Vec<Value>> {
        vec![
            vec![Value::Integer(1), Value::from("Alice"), Value::from("a@x.com")],
            vec![Value::Integer(2), Value::from("Bob"), Value::from("b@x.com")],
            vec![Value::Integer(3), Value::from("Alice"), Value::from("a@x.com")],
        ]
    }

    #[test]
    fn test_column_partition_groups_equal_values() {
        let partition = Partition::for_column(&rows(), 1);
        assert_eq!(partition.group_count(), 2);
        assert_eq!(partition.row_count(), 3);
    }

    #[test]
    fn test_determines() {
        let rows = rows();
        let order = Partition::for_column(&rows, 0);
        let cust = Partition::for_column(&rows, 1);
        let email = Partition::for_column(&rows, 2);

        assert!(order.determines(&cust));
        assert!(cust.determines(&email));
        assert!(!cust.determines(&order));
        assert_eq!(cust.refine(&email).group_count(), 2);
    }

    #[test]
    fn test_nulls_share_a_group() {
        let rows = vec![
            vec![Value::Null, Value::Integer(1)],
            vec![Value::Null, Value::Integer(2)],
        ];
        let partition = Partition::for_column(&rows, 0);
        assert_eq!(partition.group_count(), 1);
        assert!(!partition.determines(&Partition::for_column(&rows, 1)));
    }

    #[test]
    fn test_unit_partition() {
        assert_eq!(Partition::unit(4).group_count(), 1);
        assert_eq!(Partition::unit(0).group_count(), 0);
    }
}
