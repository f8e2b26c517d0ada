//! Multi-item queue reordering.
//!
//! # Design
//! - Planning is pure: it reads a [`QueueSnapshot`] and returns the id order to submit.
//! - Bounds are tracked over ranks in queue order, so sparse or zero-based slot numbering
//!   behaves the same as contiguous numbering.
//! - The remote applies moves in submission order; the plan's order is part of its meaning.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::model::{TorrentId, TorrentItem};

/// Reorder directive issued by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueDirection {
    /// One slot towards the front.
    Up,
    /// One slot towards the back.
    Down,
    /// All the way to the front.
    Top,
    /// All the way to the back.
    Bottom,
}

impl QueueDirection {
    /// Stable label used in logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Top => "top",
            Self::Bottom => "bottom",
        }
    }

    /// Whether the move is towards the front of the queue.
    #[must_use]
    pub const fn towards_front(self) -> bool {
        matches!(self, Self::Up | Self::Top)
    }

    /// Whether the selection is processed from the back of the queue to the front.
    #[must_use]
    pub const fn processes_descending(self) -> bool {
        matches!(self, Self::Down | Self::Top)
    }
}

/// Ordered ids to submit for a reorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReorderPlan {
    /// Direction the remote should apply to every id.
    pub direction: QueueDirection,
    /// Ids in the exact order the remote must apply the moves.
    pub ids: Vec<TorrentId>,
}

impl ReorderPlan {
    /// Plan that moves nothing.
    #[must_use]
    pub const fn empty(direction: QueueDirection) -> Self {
        Self {
            direction,
            ids: Vec::new(),
        }
    }

    /// Whether the plan moves nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Read-only view of queue order taken from the item store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    order: Vec<(TorrentId, u32)>,
    ranks: HashMap<TorrentId, usize>,
}

impl QueueSnapshot {
    /// Build the snapshot from queued items; unqueued items are skipped.
    pub fn from_items<'a>(items: impl IntoIterator<Item = &'a TorrentItem>) -> Self {
        let mut order: Vec<(TorrentId, u32)> = items
            .into_iter()
            .filter_map(|item| {
                item.queue_position
                    .slot()
                    .map(|slot| (item.id.clone(), slot))
            })
            .collect();
        order.sort_unstable_by(|(left_id, left), (right_id, right)| {
            left.cmp(right).then_with(|| left_id.cmp(right_id))
        });
        let ranks = order
            .iter()
            .enumerate()
            .map(|(rank, (id, _))| (id.clone(), rank))
            .collect();
        Self { order, ranks }
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Queue slot reported for the id.
    #[must_use]
    pub fn position(&self, id: &TorrentId) -> Option<u32> {
        self.rank(id).map(|rank| self.order[rank].1)
    }

    /// Zero-based rank of the id in queue order.
    #[must_use]
    pub fn rank(&self, id: &TorrentId) -> Option<usize> {
        self.ranks.get(id).copied()
    }

    /// Queued ids from front to back.
    pub fn ids(&self) -> impl Iterator<Item = &TorrentId> {
        self.order.iter().map(|(id, _)| id)
    }
}

/// Compute the ordered ids to submit for moving `selected` in `direction`.
///
/// Selected items pinned against the front (or back) by other selected items cannot move
/// and are left out; the rest are emitted in the order the remote must apply them.
///
/// # Errors
///
/// Returns [`SyncError::EmptySelection`] when no selected id is queued.
pub fn plan_reorder(
    snapshot: &QueueSnapshot,
    selected: &[TorrentId],
    direction: QueueDirection,
) -> SyncResult<ReorderPlan> {
    let mut seen = HashSet::with_capacity(selected.len());
    let mut ranks: Vec<usize> = selected
        .iter()
        .filter(|id| seen.insert(*id))
        .filter_map(|id| snapshot.rank(id))
        .collect();
    if ranks.is_empty() {
        return Err(SyncError::EmptySelection);
    }
    ranks.sort_unstable();

    let movable: Vec<usize> = if direction.towards_front() {
        let mut low_bound = 0;
        ranks
            .into_iter()
            .filter(|rank| {
                if *rank == low_bound {
                    low_bound += 1;
                    false
                } else {
                    true
                }
            })
            .collect()
    } else {
        let mut high_bound = snapshot.len() - 1;
        let mut kept: Vec<usize> = ranks
            .into_iter()
            .rev()
            .filter(|rank| {
                if *rank == high_bound {
                    high_bound = high_bound.saturating_sub(1);
                    false
                } else {
                    true
                }
            })
            .collect();
        kept.reverse();
        kept
    };

    let mut ids: Vec<TorrentId> = movable
        .into_iter()
        .map(|rank| snapshot.order[rank].0.clone())
        .collect();
    if direction.processes_descending() {
        ids.reverse();
    }
    Ok(ReorderPlan { direction, ids })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawTorrent;

    fn queued(id: &str, slot: i64) -> TorrentItem {
        TorrentItem::try_from(RawTorrent {
            id: Some(id.into()),
            status: Some(64),
            progress: Some(0),
            upload_speed: Some(0),
            download_speed: Some(0),
            queue_position: Some(slot),
            ..RawTorrent::default()
        })
        .expect("fixture validates")
    }

    fn snapshot() -> QueueSnapshot {
        let items = [
            queued("a", 1),
            queued("b", 2),
            queued("c", 3),
            queued("d", 4),
            queued("e", 5),
            queued("idle", -1),
        ];
        QueueSnapshot::from_items(items.iter())
    }

    fn ids(values: &[&str]) -> Vec<TorrentId> {
        values.iter().map(|value| TorrentId::from(*value)).collect()
    }

    fn plan(selected: &[&str], direction: QueueDirection) -> Vec<TorrentId> {
        plan_reorder(&snapshot(), &ids(selected), direction)
            .expect("selection is queued")
            .ids
    }

    #[test]
    fn snapshot_orders_by_position_then_id() {
        let items = [queued("z", 2), queued("y", 2), queued("x", 0), queued("w", -1)];
        let snapshot = QueueSnapshot::from_items(items.iter());
        let order: Vec<&str> = snapshot.ids().map(TorrentId::as_str).collect();
        assert_eq!(order, vec!["x", "y", "z"]);
        assert_eq!(snapshot.rank(&"z".into()), Some(2));
        assert_eq!(snapshot.position(&"y".into()), Some(2));
        assert_eq!(snapshot.position(&"w".into()), None);
    }

    #[test]
    fn moving_the_front_item_up_is_a_no_op() {
        assert!(plan(&["a"], QueueDirection::Up).is_empty());
        assert!(plan(&["a"], QueueDirection::Top).is_empty());
        assert!(plan(&["e"], QueueDirection::Down).is_empty());
        assert!(plan(&["e"], QueueDirection::Bottom).is_empty());
    }

    #[test]
    fn pinned_prefix_is_skipped_when_moving_up() {
        assert_eq!(plan(&["c", "a", "b", "e"], QueueDirection::Up), ids(&["e"]));
        assert_eq!(plan(&["d", "b"], QueueDirection::Up), ids(&["b", "d"]));
    }

    #[test]
    fn down_and_top_are_processed_back_to_front() {
        assert_eq!(plan(&["b", "d"], QueueDirection::Down), ids(&["d", "b"]));
        assert_eq!(plan(&["b", "e", "d"], QueueDirection::Down), ids(&["b"]));
        assert_eq!(plan(&["b", "d"], QueueDirection::Top), ids(&["d", "b"]));
        assert_eq!(plan(&["d", "b"], QueueDirection::Bottom), ids(&["b", "d"]));
    }

    #[test]
    fn unqueued_unknown_and_duplicate_ids_are_dropped() {
        assert_eq!(
            plan(&["c", "idle", "ghost", "c"], QueueDirection::Up),
            ids(&["c"])
        );
        assert_eq!(
            plan_reorder(&snapshot(), &ids(&["idle", "ghost"]), QueueDirection::Top),
            Err(SyncError::EmptySelection)
        );
    }

    #[test]
    fn sparse_positions_use_queue_order() {
        let items = [queued("a", 10), queued("b", 40), queued("c", 90)];
        let snapshot = QueueSnapshot::from_items(items.iter());
        let plan = plan_reorder(&snapshot, &ids(&["a", "c"]), QueueDirection::Up)
            .expect("selection is queued");
        assert_eq!(plan.ids, ids(&["c"]));
        assert_eq!(plan.direction, QueueDirection::Up);
    }
}
