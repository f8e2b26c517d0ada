//! Authoritative map of torrent id to torrent record.

use std::collections::HashMap;

use crate::model::{TorrentId, TorrentItem};
use crate::queue::QueueSnapshot;

/// Outcome of inserting a record into the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// The identifier was not present before.
    Added,
    /// An existing record was replaced.
    Updated,
}

/// Torrent records keyed by identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemStore {
    items: HashMap<TorrentId, TorrentItem>,
}

impl ItemStore {
    /// Construct an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked torrents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Look up a torrent record.
    #[must_use]
    pub fn get(&self, id: &TorrentId) -> Option<&TorrentItem> {
        self.items.get(id)
    }

    /// Whether the identifier is tracked.
    #[must_use]
    pub fn contains(&self, id: &TorrentId) -> bool {
        self.items.contains_key(id)
    }

    /// Insert or wholesale-replace a record.
    pub fn upsert(&mut self, item: TorrentItem) -> Upsert {
        match self.items.insert(item.id.clone(), item) {
            Some(_) => Upsert::Updated,
            None => Upsert::Added,
        }
    }

    /// Remove a record, returning it when it was present.
    pub fn remove(&mut self, id: &TorrentId) -> Option<TorrentItem> {
        self.items.remove(id)
    }

    /// Iterate over tracked identifiers in arbitrary order.
    pub fn ids(&self) -> impl Iterator<Item = &TorrentId> {
        self.items.keys()
    }

    /// Iterate over tracked records in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &TorrentItem> {
        self.items.values()
    }

    /// Identifiers sorted lexicographically.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<TorrentId> {
        let mut ids: Vec<TorrentId> = self.items.keys().cloned().collect();
        ids.sort_unstable();
        ids
    }

    /// Read-only snapshot of current queue order.
    #[must_use]
    pub fn queue_snapshot(&self) -> QueueSnapshot {
        QueueSnapshot::from_items(self.items.values())
    }
}
