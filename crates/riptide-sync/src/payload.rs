//! Cursor-tagged list payloads and their validation.
//!
//! # Design
//! - A payload is validated in full before anything touches the item store.
//! - Shape detection is structural: `full` wins the "everything" path, `changed`/`removed`
//!   form a delta, and the absence of all three means the list is unchanged.

use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::model::{RawTorrent, TorrentId, TorrentItem};

/// Opaque token naming the last applied remote snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Cursor sent before anything has been applied; the remote answers with a full list.
    #[must_use]
    pub const fn initial() -> Self {
        Self(String::new())
    }

    /// Wrap a cursor token received from the remote.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Whether this is the initial (empty) cursor.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Cursor {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

/// Raw list response as decoded by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListPayload {
    /// Cursor to send with the next fetch (required).
    pub cursor: Option<String>,
    /// Complete snapshot of live torrents, sent when the remote did not recognise our cursor.
    pub full: Option<Vec<RawTorrent>>,
    /// Torrents added or changed since the previous cursor.
    pub changed: Option<Vec<RawTorrent>>,
    /// Identifiers removed since the previous cursor.
    pub removed: Option<Vec<String>>,
}

impl ListPayload {
    /// Payload signalling "no change" under the given cursor.
    #[must_use]
    pub fn unchanged(cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            ..Self::default()
        }
    }

    /// Full-snapshot payload.
    #[must_use]
    pub fn full(cursor: impl Into<String>, torrents: Vec<RawTorrent>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            full: Some(torrents),
            ..Self::default()
        }
    }

    /// Delta payload.
    #[must_use]
    pub fn delta(
        cursor: impl Into<String>,
        changed: Vec<RawTorrent>,
        removed: Vec<String>,
    ) -> Self {
        Self {
            cursor: Some(cursor.into()),
            full: None,
            changed: Some(changed),
            removed: Some(removed),
        }
    }

    /// Validate the payload into a typed update without mutating any state.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::MalformedPayload`] when the cursor is missing, shapes conflict,
    /// identifiers repeat, an identifier is both changed and removed, or any entry lacks a
    /// required field.
    pub fn validate(self) -> SyncResult<ValidatedPayload> {
        let cursor = self
            .cursor
            .map(Cursor::new)
            .ok_or_else(|| SyncError::malformed("cursor", "missing"))?;

        let update = match (self.full, self.changed, self.removed) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(SyncError::malformed("full", "conflicting list shapes"));
            }
            (Some(full), None, None) => ListUpdate::Full(convert_entries(full)?),
            (None, None, None) => ListUpdate::Unchanged,
            (None, changed, removed) => {
                let changed = convert_entries(changed.unwrap_or_default())?;
                let removed = collect_removed(removed.unwrap_or_default())?;
                if let Some(item) = changed.iter().find(|item| removed.contains(&item.id)) {
                    return Err(SyncError::malformed_item(
                        "removed",
                        item.id.as_str(),
                        "reported as both changed and removed",
                    ));
                }
                ListUpdate::Delta { changed, removed }
            }
        };

        Ok(ValidatedPayload { cursor, update })
    }
}

/// Validated list update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListUpdate {
    /// Complete snapshot; anything missing locally-present is inferred removed.
    Full(Vec<TorrentItem>),
    /// Incremental changes relative to the previous cursor.
    Delta {
        /// Added or changed torrents.
        changed: Vec<TorrentItem>,
        /// Removed identifiers, without duplicates.
        removed: Vec<TorrentId>,
    },
    /// Nothing changed since the previous cursor.
    Unchanged,
}

/// Payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPayload {
    /// Cursor to record once the update has been applied.
    pub cursor: Cursor,
    /// Typed update.
    pub update: ListUpdate,
}

fn convert_entries(entries: Vec<RawTorrent>) -> SyncResult<Vec<TorrentItem>> {
    let mut seen = HashSet::with_capacity(entries.len());
    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let item = TorrentItem::try_from(entry)?;
        if !seen.insert(item.id.clone()) {
            return Err(SyncError::malformed_item(
                "id",
                item.id.as_str(),
                "duplicate torrent id",
            ));
        }
        items.push(item);
    }
    Ok(items)
}

fn collect_removed(raw: Vec<String>) -> SyncResult<Vec<TorrentId>> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut removed = Vec::with_capacity(raw.len());
    for id in raw {
        if id.trim().is_empty() {
            return Err(SyncError::malformed("removed", "empty torrent id"));
        }
        let id = TorrentId::from(id);
        if seen.insert(id.clone()) {
            removed.push(id);
        }
    }
    Ok(removed)
}
