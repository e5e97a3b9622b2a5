//! In-memory record storage.
//!
//! This module provides:
//! - [`Entity`]: anything stored by string ID
//! - [`MemoryStore`]: a thread-safe typed map with the uniform CRUD contract
//! - [`Repository`]: the CRUD contract as a trait, implemented by every
//!   repository through composition over a [`MemoryStore`]

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::types::{Alert, DeliveryRecord, Preference, Team, User, VisibilityTarget};

/// A record addressable by a string ID.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Returns the record's ID.
    fn id(&self) -> &str;
}

impl Entity for Alert {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Team {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for User {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for VisibilityTarget {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for DeliveryRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Entity for Preference {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Thread-safe in-memory map of records keyed by ID.
///
/// All reads return cloned snapshots. Updates run a closure against the
/// stored row while holding the write lock, so concurrent updates to the
/// same row are serialized and each caller only changes the fields it sets.
#[derive(Debug)]
pub struct MemoryStore<T> {
    rows: RwLock<HashMap<String, T>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Entity> MemoryStore<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a record by ID.
    #[must_use]
    pub fn find_by_id(&self, id: &str) -> Option<T> {
        self.rows.read().get(id).cloned()
    }

    /// Returns all records.
    #[must_use]
    pub fn find_all(&self) -> Vec<T> {
        self.rows.read().values().cloned().collect()
    }

    /// Inserts a record, replacing any record with the same ID.
    pub fn create(&self, entity: T) -> T {
        self.rows
            .write()
            .insert(entity.id().to_string(), entity.clone());
        entity
    }

    /// Applies `apply` to the record with the given ID.
    ///
    /// Returns the updated record, or `None` if it doesn't exist.
    pub fn update(&self, id: &str, apply: impl FnOnce(&mut T)) -> Option<T> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(id)?;
        apply(row);
        Some(row.clone())
    }

    /// Removes a record by ID.
    ///
    /// Returns `true` if the record was removed.
    pub fn delete(&self, id: &str) -> bool {
        self.rows.write().remove(id).is_some()
    }

    /// Returns all records matching `predicate`.
    #[must_use]
    pub fn filter(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .read()
            .values()
            .filter(|row| predicate(row))
            .cloned()
            .collect()
    }

    /// Returns the first record matching `predicate`.
    #[must_use]
    pub fn find_first(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.rows.read().values().find(|row| predicate(row)).cloned()
    }

    /// Applies `apply` to the first record matching `predicate`.
    pub fn update_first(
        &self,
        predicate: impl Fn(&T) -> bool,
        apply: impl FnOnce(&mut T),
    ) -> Option<T> {
        let mut rows = self.rows.write();
        let row = rows.values_mut().find(|row| predicate(row))?;
        apply(row);
        Some(row.clone())
    }

    /// Returns the record matching `predicate`, inserting `make()` if there
    /// is none. Lookup and insert happen under one write lock.
    ///
    /// The flag is `true` if the record was created by this call.
    pub fn find_or_create(
        &self,
        predicate: impl Fn(&T) -> bool,
        make: impl FnOnce() -> T,
    ) -> (T, bool) {
        let mut rows = self.rows.write();
        if let Some(existing) = rows.values().find(|row| predicate(row)) {
            return (existing.clone(), false);
        }
        let created = make();
        rows.insert(created.id().to_string(), created.clone());
        (created, true)
    }

    /// Removes every record matching `predicate`, returning how many were removed.
    pub fn delete_where(&self, predicate: impl Fn(&T) -> bool) -> usize {
        let mut rows = self.rows.write();
        let before = rows.len();
        rows.retain(|_, row| !predicate(row));
        before - rows.len()
    }

    /// Returns the number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Returns true if the store holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

/// The uniform CRUD contract shared by all repositories.
///
/// Implementors only provide [`Repository::store`]; the operations are
/// forwarded to it.
pub trait Repository<T: Entity>: Send + Sync {
    /// Returns the backing store.
    fn store(&self) -> &MemoryStore<T>;

    /// Gets a record by ID.
    fn find_by_id(&self, id: &str) -> Option<T> {
        self.store().find_by_id(id)
    }

    /// Returns all records.
    fn find_all(&self) -> Vec<T> {
        self.store().find_all()
    }

    /// Inserts a record.
    fn create(&self, entity: T) -> T {
        self.store().create(entity)
    }

    /// Applies a partial update to a record.
    fn update(&self, id: &str, apply: impl FnOnce(&mut T)) -> Option<T>
    where
        Self: Sized,
    {
        self.store().update(id, apply)
    }

    /// Removes a record by ID.
    fn delete(&self, id: &str) -> bool {
        self.store().delete(id)
    }

    /// Returns the number of records.
    fn count(&self) -> usize {
        self.store().len()
    }
}

impl<T: Entity> Repository<T> for MemoryStore<T> {
    fn store(&self) -> &MemoryStore<T> {
        self
    }
}
