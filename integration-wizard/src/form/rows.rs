// Stable identities for repeatable row lists (schema fields, parameter rows).
//
// Rows live positionally inside the step's JSON array; the arena keeps a parallel
// vector of ids so removing row 1 of 3 does not renumber the identity of row 2.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowId(u64);

impl RowId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row-{}", self.0)
    }
}

/// Hands out row ids; one per store so ids are never reused within a wizard instance.
#[derive(Debug, Clone, Default)]
pub struct RowIdAllocator {
    next: u64,
}

impl RowIdAllocator {
    pub fn allocate(&mut self) -> RowId {
        let id = RowId(self.next);
        self.next += 1;
        id
    }
}

#[derive(Debug, Clone, Default)]
pub struct RowArena {
    ids: Vec<RowId>,
}

impl RowArena {
    pub fn seeded(len: usize, alloc: &mut RowIdAllocator) -> Self {
        Self {
            ids: (0..len).map(|_| alloc.allocate()).collect(),
        }
    }

    pub fn push(&mut self, alloc: &mut RowIdAllocator) -> RowId {
        let id = alloc.allocate();
        self.ids.push(id);
        id
    }

    pub fn remove(&mut self, index: usize) -> Option<RowId> {
        if index < self.ids.len() {
            Some(self.ids.remove(index))
        } else {
            None
        }
    }

    pub fn ids(&self) -> &[RowId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removing_a_row_keeps_other_identities() {
        let mut alloc = RowIdAllocator::default();
        let mut arena = RowArena::seeded(3, &mut alloc);
        let before = arena.ids().to_vec();

        let removed = arena.remove(1).unwrap();
        assert_eq!(removed, before[1]);
        assert_eq!(arena.ids(), &[before[0], before[2]]);
        assert_eq!(arena.ids()[1], before[2]);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut alloc = RowIdAllocator::default();
        let mut arena = RowArena::default();
        let a = arena.push(&mut alloc);
        arena.remove(0);
        let b = arena.push(&mut alloc);
        assert_ne!(a, b);
        assert!(arena.remove(7).is_none());
    }
}
