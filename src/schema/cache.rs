//! Table descriptor cache
//!
//! Entries are populated lazily by the resolver and never expire on their own.
//! A schema change in the store is not noticed until the entry is dropped
//! through [`SchemaCache::invalidate`] or [`SchemaCache::clear`].

use crate::model::TableDescriptor;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
pub struct SchemaCache {
    tables: DashMap<String, Arc<TableDescriptor>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<Arc<TableDescriptor>> {
        self.tables.get(table).map(|entry| Arc::clone(entry.value()))
    }

    /// Store a descriptor. Concurrent writers for the same table race
    /// harmlessly; the last one wins with identical content.
    pub fn insert(&self, descriptor: TableDescriptor) -> Arc<TableDescriptor> {
        let descriptor = Arc::new(descriptor);
        self.tables
            .insert(descriptor.name.clone(), Arc::clone(&descriptor));
        descriptor
    }

    pub fn invalidate(&self, table: &str) -> bool {
        let removed = self.tables.remove(table).is_some();
        if removed {
            debug!("Invalidated cached schema for {}", table);
        }
        removed
    }

    pub fn clear(&self) {
        self.tables.clear();
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
