//! `SyncEngine` façade tying reconciliation, aggregation, filtering and reordering together.
//!
//! # Design
//! - The engine owns every piece of mutable state; nothing is global.
//! - One `apply` call runs the full reconcile, aggregate and filter cycle to completion.
//! - Hosts that share an engine across tasks must hold one lock for the whole call.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::category::{CategoryAggregator, CategoryCounters, MembershipDelta, Memberships};
use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::filter::{self, FilterSelection, VisibilityChanges};
use crate::model::TorrentId;
use crate::payload::{Cursor, ListPayload};
use crate::queue::{self, QueueDirection, ReorderPlan};
use crate::reconcile::{self, ChangeReport, ListShape};
use crate::store::ItemStore;

/// Everything a presentation layer needs after a payload was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    /// Cursor to send with the next fetch.
    pub cursor: Cursor,
    /// Shape of the applied payload.
    pub shape: ListShape,
    /// Identifiers added, updated and removed.
    pub report: ChangeReport,
    /// Visibility transitions caused by the payload.
    pub visibility: VisibilityChanges,
}

/// Result of comparing incremental counters with a from-scratch recount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterCheck {
    /// Incrementally maintained counters.
    pub incremental: CategoryCounters,
    /// Counters recounted from the item store.
    pub recounted: CategoryCounters,
}

impl CounterCheck {
    /// Whether both sets of counters agree.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.incremental == self.recounted
    }
}

/// Client-side synchronization engine for one remote torrent list.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    store: ItemStore,
    cursor: Cursor,
    aggregator: CategoryAggregator,
    selection: FilterSelection,
    visible: HashMap<TorrentId, bool>,
}

impl SyncEngine {
    /// Construct an empty engine using the given thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::InvalidConfig`] when the thresholds are out of range.
    pub fn try_new(config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        Ok(Self {
            aggregator: CategoryAggregator::new(config),
            ..Self::default()
        })
    }

    /// Reconcile a payload and propagate the changes to counters and visibility.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::MalformedPayload`] when the payload is rejected; no state
    /// changes.
    pub fn apply(&mut self, payload: ListPayload) -> SyncResult<SyncOutcome> {
        let initial_load = self.store.is_empty();
        let reconciled = reconcile::reconcile(&mut self.store, &self.cursor, payload)?;
        let report = reconciled.report;

        for id in &report.removed {
            self.visible.remove(id);
            if let Err(err) = self.aggregator.remove(id) {
                warn!(
                    torrent_id = %id,
                    error = %err,
                    "removed torrent had no recorded memberships"
                );
            }
        }

        if initial_load && !report.added.is_empty() {
            self.aggregator.rebuild(&self.store);
        } else {
            for id in report.changed() {
                if let Err(err) = self.aggregator.recompute(&self.store, id) {
                    warn!(torrent_id = %id, error = %err, "recompute skipped");
                }
            }
        }

        let mut visibility = VisibilityChanges::default();
        for id in report.changed() {
            let visible = self.evaluate(id);
            let previous = self.visible.insert(id.clone(), visible).unwrap_or(false);
            visibility.record(id, previous, visible);
        }
        visibility.sort();

        self.cursor = reconciled.cursor;
        debug!(
            cursor = %self.cursor,
            shape = reconciled.shape.as_str(),
            shown = visibility.shown.len(),
            hidden = visibility.hidden.len(),
            tracked = self.store.len(),
            "applied torrent list payload"
        );

        Ok(SyncOutcome {
            cursor: self.cursor.clone(),
            shape: reconciled.shape,
            report,
            visibility,
        })
    }

    /// Re-derive memberships for one torrent and refresh its visibility.
    ///
    /// Unknown ids are logged and produce an empty delta.
    pub fn recompute(&mut self, id: &TorrentId) -> MembershipDelta {
        match self.aggregator.recompute(&self.store, id) {
            Ok(delta) => {
                let visible = self.evaluate(id);
                self.visible.insert(id.clone(), visible);
                delta
            }
            Err(err) => {
                warn!(torrent_id = %id, error = %err, "recompute skipped");
                MembershipDelta::default()
            }
        }
    }

    /// Replace the active filter selection, re-evaluating every torrent when it changed.
    pub fn set_selection(&mut self, selection: FilterSelection) -> VisibilityChanges {
        if selection == self.selection {
            return VisibilityChanges::default();
        }
        self.selection = selection;
        self.reevaluate_all()
    }

    /// Replace thresholds, rebuilding memberships, counters and visibility.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::InvalidConfig`] when the thresholds are out of range.
    pub fn set_config(&mut self, config: SyncConfig) -> SyncResult<VisibilityChanges> {
        config.validate()?;
        self.aggregator.reconfigure(config, &self.store);
        Ok(self.reevaluate_all())
    }

    /// Plan a queue move for the selected ids.
    ///
    /// A selection with nothing queued yields an empty plan.
    #[must_use]
    pub fn reorder(&self, selected: &[TorrentId], direction: QueueDirection) -> ReorderPlan {
        queue::plan_reorder(&self.store.queue_snapshot(), selected, direction).unwrap_or_else(
            |err| {
                debug!(direction = direction.as_str(), error = %err, "nothing to reorder");
                ReorderPlan::empty(direction)
            },
        )
    }

    /// Reset the cursor so the next fetch returns a full snapshot.
    ///
    /// Items are kept; the full snapshot's removal inference brings them back in line.
    pub fn request_full_resync(&mut self) {
        warn!(cursor = %self.cursor, "requesting full resync");
        self.cursor = Cursor::initial();
    }

    /// Cursor to send with the next fetch.
    #[must_use]
    pub const fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Tracked torrents.
    #[must_use]
    pub const fn store(&self) -> &ItemStore {
        &self.store
    }

    /// Live per-category counters.
    #[must_use]
    pub const fn counters(&self) -> &CategoryCounters {
        self.aggregator.counters()
    }

    /// Thresholds in use.
    #[must_use]
    pub const fn config(&self) -> &SyncConfig {
        self.aggregator.config()
    }

    /// Recorded memberships for a torrent.
    #[must_use]
    pub fn memberships(&self, id: &TorrentId) -> Option<&Memberships> {
        self.aggregator.memberships(id)
    }

    /// Active filter selection.
    #[must_use]
    pub const fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    /// Whether the torrent currently passes the filter selection.
    #[must_use]
    pub fn is_visible(&self, id: &TorrentId) -> bool {
        self.visible.get(id).copied().unwrap_or(false)
    }

    /// Visible torrent ids, sorted.
    #[must_use]
    pub fn visible_ids(&self) -> Vec<TorrentId> {
        let mut ids: Vec<TorrentId> = self
            .visible
            .iter()
            .filter(|(_, visible)| **visible)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Compare incremental counters with a recount over the item store.
    #[must_use]
    pub fn verify_counters(&self) -> CounterCheck {
        let config = self.aggregator.config();
        let memberships: Vec<Memberships> = self
            .store
            .iter()
            .map(|item| Memberships::classify(item, config))
            .collect();
        CounterCheck {
            incremental: self.aggregator.counters().clone(),
            recounted: CategoryCounters::recount(&memberships),
        }
    }

    fn evaluate(&self, id: &TorrentId) -> bool {
        self.aggregator
            .memberships(id)
            .is_some_and(|memberships| filter::is_visible(memberships, &self.selection))
    }

    fn reevaluate_all(&mut self) -> VisibilityChanges {
        let mut changes = VisibilityChanges::default();
        for id in self.store.sorted_ids() {
            let visible = self.evaluate(&id);
            let previous = self.visible.insert(id.clone(), visible).unwrap_or(false);
            changes.record(&id, previous, visible);
        }
        changes
    }
}
