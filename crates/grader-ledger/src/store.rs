//! # In-Memory Tables
//!
//! `Table<T>` is the row storage behind the registry and the submission
//! ledger: rows keyed by a monotonically increasing `i64` id. A table does
//! no locking of its own; the owner keeps all of its tables and their
//! unique indexes behind one `parking_lot::RwLock`, so an index lookup and
//! the insert that depends on it happen under the same write guard.
//!
//! Ids are never reused, including after a rolled-back insert.

use std::collections::BTreeMap;

/// A row with a primary key.
pub trait Row: Clone {
    /// Primary key.
    fn id(&self) -> i64;
}

/// Rows of `T` keyed by id, in id order.
#[derive(Debug, Clone)]
pub struct Table<T: Row> {
    rows: BTreeMap<i64, T>,
    next_id: i64,
}

impl<T: Row> Table<T> {
    /// An empty table whose first id is 1.
    pub fn new() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Reserve the next primary key.
    pub fn allocate_id(&mut self) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Insert a row under its own id, returning the previous row if any.
    pub fn insert(&mut self, row: T) -> Option<T> {
        self.rows.insert(row.id(), row)
    }

    /// Row by id.
    pub fn get(&self, id: i64) -> Option<&T> {
        self.rows.get(&id)
    }

    /// Mutable row by id. The caller must not change the row's id.
    pub fn get_mut(&mut self, id: i64) -> Option<&mut T> {
        self.rows.get_mut(&id)
    }

    /// Remove a row; its id stays retired.
    pub fn remove(&mut self, id: i64) -> Option<T> {
        self.rows.remove(&id)
    }

    /// Rows in ascending id order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.rows.values()
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Row> Default for Table<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Named {
        id: i64,
        name: &'static str,
    }

    impl Row for Named {
        fn id(&self) -> i64 {
            self.id
        }
    }

    #[test]
    fn test_ids_are_monotonic_and_not_reused() {
        let mut t: Table<Named> = Table::new();
        let a = t.allocate_id();
        t.insert(Named { id: a, name: "a" });
        let b = t.allocate_id();
        t.insert(Named { id: b, name: "b" });
        assert_eq!((a, b), (1, 2));

        t.remove(b);
        assert_eq!(t.allocate_id(), 3);
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut t: Table<Named> = Table::new();
        let id = t.allocate_id();
        t.insert(Named { id, name: "a" });
        t.get_mut(id).unwrap().name = "z";
        assert_eq!(t.get(id).unwrap().name, "z");
    }
}
