//! Reconciliation of cursor-tagged list payloads into the item store.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::SyncResult;
use crate::model::{TorrentId, TorrentItem};
use crate::payload::{Cursor, ListPayload, ListUpdate, ValidatedPayload};
use crate::store::{ItemStore, Upsert};

/// Identifiers touched by a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeReport {
    /// Identifiers that were not tracked before.
    pub added: Vec<TorrentId>,
    /// Identifiers whose records were replaced.
    pub updated: Vec<TorrentId>,
    /// Identifiers that are no longer tracked.
    pub removed: Vec<TorrentId>,
}

impl ChangeReport {
    /// Whether nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }

    /// Added followed by updated identifiers.
    pub fn changed(&self) -> impl Iterator<Item = &TorrentId> {
        self.added.iter().chain(self.updated.iter())
    }
}

/// Shape of the payload that was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListShape {
    /// Complete snapshot with inferred removals.
    Full,
    /// Incremental add/change/remove sets.
    Delta,
    /// No list content; only the cursor advanced.
    Unchanged,
}

impl ListShape {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Delta => "delta",
            Self::Unchanged => "unchanged",
        }
    }
}

/// Result of a successful reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    /// Cursor the caller must record and send with the next fetch.
    pub cursor: Cursor,
    /// Shape of the applied payload.
    pub shape: ListShape,
    /// Identifiers touched by the pass.
    pub report: ChangeReport,
}

/// Apply a raw payload to the store.
///
/// The payload is validated before the store is touched, so a rejected payload leaves the
/// store exactly as it was.
///
/// # Errors
///
/// Returns [`crate::SyncError::MalformedPayload`] when validation fails.
pub fn reconcile(
    store: &mut ItemStore,
    previous: &Cursor,
    payload: ListPayload,
) -> SyncResult<Reconciled> {
    let ValidatedPayload { cursor, update } = payload.validate()?;

    let (shape, report) = match update {
        ListUpdate::Unchanged => (ListShape::Unchanged, ChangeReport::default()),
        ListUpdate::Delta { changed, removed } => {
            (ListShape::Delta, apply_delta(store, changed, removed))
        }
        ListUpdate::Full(items) => {
            if !previous.is_initial() {
                warn!(
                    previous = %previous,
                    next = %cursor,
                    "remote did not recognise cursor; inferring removals from full list"
                );
            }
            (ListShape::Full, apply_full(store, items))
        }
    };

    debug!(
        shape = shape.as_str(),
        previous = %previous,
        next = %cursor,
        added = report.added.len(),
        updated = report.updated.len(),
        removed = report.removed.len(),
        "reconciled torrent list"
    );

    Ok(Reconciled {
        cursor,
        shape,
        report,
    })
}

fn apply_delta(
    store: &mut ItemStore,
    changed: Vec<TorrentItem>,
    removed: Vec<TorrentId>,
) -> ChangeReport {
    let mut report = ChangeReport::default();
    upsert_all(store, changed, &mut report);
    for id in removed {
        if store.remove(&id).is_some() {
            report.removed.push(id);
        } else {
            debug!(torrent_id = %id, "ignoring removal of untracked torrent");
        }
    }
    report
}

fn apply_full(store: &mut ItemStore, items: Vec<TorrentItem>) -> ChangeReport {
    let live: HashSet<&TorrentId> = items.iter().map(|item| &item.id).collect();
    let mut stale: Vec<TorrentId> = store
        .ids()
        .filter(|id| !live.contains(id))
        .cloned()
        .collect();
    stale.sort_unstable();

    let mut report = ChangeReport::default();
    for id in stale {
        store.remove(&id);
        report.removed.push(id);
    }
    upsert_all(store, items, &mut report);
    report
}

fn upsert_all(store: &mut ItemStore, items: Vec<TorrentItem>, report: &mut ChangeReport) {
    for item in items {
        let id = item.id.clone();
        match store.upsert(item) {
            Upsert::Added => report.added.push(id),
            Upsert::Updated => report.updated.push(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SyncError;
    use crate::model::RawTorrent;

    fn entry(id: &str, progress: u32) -> RawTorrent {
        RawTorrent {
            id: Some(id.to_string()),
            status: Some(1),
            progress: Some(progress),
            upload_speed: Some(0),
            download_speed: Some(0),
            queue_position: Some(-1),
            ..RawTorrent::default()
        }
    }

    fn ids(values: &[&str]) -> Vec<TorrentId> {
        values.iter().map(|value| TorrentId::from(*value)).collect()
    }

    #[test]
    fn full_shape_infers_removals() {
        let mut store = ItemStore::new();
        reconcile(
            &mut store,
            &Cursor::initial(),
            ListPayload::full("1", vec![entry("A", 0), entry("B", 0), entry("C", 0)]),
        )
        .expect("initial snapshot applies");

        let result = reconcile(
            &mut store,
            &Cursor::new("1"),
            ListPayload::full("2", vec![entry("A", 10), entry("C", 20)]),
        )
        .expect("fallback snapshot applies");

        assert_eq!(result.shape, ListShape::Full);
        assert_eq!(result.cursor, Cursor::new("2"));
        assert_eq!(result.report.removed, ids(&["B"]));
        assert_eq!(result.report.updated, ids(&["A", "C"]));
        assert!(result.report.added.is_empty());
        assert_eq!(store.sorted_ids(), ids(&["A", "C"]));
    }

    #[test]
    fn delta_shape_upserts_and_removes() {
        let mut store = ItemStore::new();
        reconcile(
            &mut store,
            &Cursor::initial(),
            ListPayload::full("1", vec![entry("A", 0), entry("B", 0)]),
        )
        .expect("initial snapshot applies");

        let result = reconcile(
            &mut store,
            &Cursor::new("1"),
            ListPayload::delta(
                "2",
                vec![entry("A", 500), entry("D", 0)],
                vec!["B".into(), "Z".into()],
            ),
        )
        .expect("delta applies");

        assert_eq!(result.shape, ListShape::Delta);
        assert_eq!(result.report.added, ids(&["D"]));
        assert_eq!(result.report.updated, ids(&["A"]));
        assert_eq!(result.report.removed, ids(&["B"]));
        assert_eq!(
            store.get(&"A".into()).map(|item| item.progress_per_mille),
            Some(500)
        );
    }

    #[test]
    fn unchanged_list_still_advances_cursor() {
        let mut store = ItemStore::new();
        let result = reconcile(&mut store, &Cursor::new("5"), ListPayload::unchanged("6"))
            .expect("unchanged payload applies");
        assert_eq!(result.shape, ListShape::Unchanged);
        assert!(result.report.is_empty());
        assert_eq!(result.cursor, Cursor::new("6"));
    }

    #[test]
    fn malformed_payload_leaves_store_untouched() {
        let mut store = ItemStore::new();
        reconcile(
            &mut store,
            &Cursor::initial(),
            ListPayload::full("1", vec![entry("A", 0)]),
        )
        .expect("initial snapshot applies");
        let before = store.clone();

        let mut broken = entry("B", 0);
        broken.status = None;
        let err = reconcile(
            &mut store,
            &Cursor::new("1"),
            ListPayload::delta("2", vec![entry("C", 0), broken], vec!["A".into()]),
        )
        .expect_err("payload must be rejected");

        assert!(matches!(err, SyncError::MalformedPayload { .. }));
        assert_eq!(store, before);
    }
}
