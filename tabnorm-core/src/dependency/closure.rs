//! Attribute closure under a set of functional dependencies.

use super::{ColumnSet, FunctionalDependency};

/// Every column reachable from `start` by repeatedly applying `fds`.
pub fn closure<'a, I>(start: &ColumnSet, fds: I) -> ColumnSet
where
    I: IntoIterator<Item = &'a FunctionalDependency>,
    I::IntoIter: Clone,
{
    let fds = fds.into_iter();
    let mut reached = start.clone();
    loop {
        let before = reached.len();
        for fd in fds.clone() {
            if !reached.contains(fd.dependent) && fd.determinant.is_subset(&reached) {
                reached = reached.with(fd.dependent);
            }
        }
        if reached.len() == before {
            return reached;
        }
    }
}

/// Returns true when `fd` follows from `fds` without using `fd` itself.
pub fn is_implied_without(fd: &FunctionalDependency, fds: &[FunctionalDependency]) -> bool {
    let others = fds.iter().filter(|other| *other != fd);
    closure(&fd.determinant, others).contains(fd.dependent)
}
