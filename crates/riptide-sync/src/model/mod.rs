//! Torrent records tracked by the sync engine and their wire-decoded form.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{SyncError, SyncResult};

/// Opaque torrent identifier (the info-hash reported by the remote session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TorrentId(String);

impl TorrentId {
    /// Wrap a raw identifier.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for TorrentId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<&str> for TorrentId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for TorrentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Status bitmask reported by the remote session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusFlags(u32);

impl StatusFlags {
    /// Torrent has been started.
    pub const STARTED: Self = Self(1);
    /// Torrent data is being hash-checked.
    pub const CHECKING: Self = Self(1 << 1);
    /// Torrent starts once checking finishes.
    pub const START_AFTER_CHECK: Self = Self(1 << 2);
    /// Torrent data has been checked.
    pub const CHECKED: Self = Self(1 << 3);
    /// Torrent is in an error state.
    pub const ERROR: Self = Self(1 << 4);
    /// Torrent is paused.
    pub const PAUSED: Self = Self(1 << 5);
    /// Torrent is managed by the remote queue.
    pub const QUEUED: Self = Self(1 << 6);
    /// Torrent metadata is loaded.
    pub const LOADED: Self = Self(1 << 7);

    /// Build flags from the raw bitmask.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bitmask value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Whether every bit in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Position of a torrent in the remote download queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum QueuePosition {
    /// Torrent does not participate in queue ordering.
    #[default]
    Unqueued,
    /// Torrent holds the given queue slot.
    At(u32),
}

impl QueuePosition {
    /// Wire value used by the remote session for unqueued torrents.
    pub const UNQUEUED_SENTINEL: i64 = -1;

    /// Decode the wire representation; `None` for values that are neither the sentinel nor a
    /// valid slot.
    #[must_use]
    pub fn from_wire(raw: i64) -> Option<Self> {
        if raw == Self::UNQUEUED_SENTINEL {
            return Some(Self::Unqueued);
        }
        u32::try_from(raw).ok().map(Self::At)
    }

    /// Encode back into the wire representation.
    #[must_use]
    pub fn to_wire(self) -> i64 {
        match self {
            Self::Unqueued => Self::UNQUEUED_SENTINEL,
            Self::At(slot) => i64::from(slot),
        }
    }

    /// Queue slot when the torrent is queued.
    #[must_use]
    pub const fn slot(self) -> Option<u32> {
        match self {
            Self::Unqueued => None,
            Self::At(slot) => Some(slot),
        }
    }
}

impl Serialize for QueuePosition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.to_wire())
    }
}

/// Authoritative local record for a torrent.
///
/// Records are replaced wholesale on every reconciliation that reports the torrent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TorrentItem {
    /// Identifier for the torrent.
    pub id: TorrentId,
    /// Display name (empty when the remote omitted it).
    pub name: String,
    /// Remote status bitmask.
    pub status: StatusFlags,
    /// Completion in per mille (0..=1000).
    pub progress_per_mille: u32,
    /// Total payload size in bytes.
    pub size_bytes: u64,
    /// Bytes downloaded so far.
    pub downloaded_bytes: u64,
    /// Bytes uploaded so far.
    pub uploaded_bytes: u64,
    /// Share ratio in per mille.
    pub ratio_per_mille: u32,
    /// Current upload rate in bytes per second.
    pub upload_bps: u64,
    /// Current download rate in bytes per second.
    pub download_bps: u64,
    /// Estimated seconds remaining, when known.
    pub eta_seconds: Option<u64>,
    /// Labels assigned to the torrent, in remote order without duplicates.
    pub labels: Vec<String>,
    /// Queue slot or [`QueuePosition::Unqueued`].
    pub queue_position: QueuePosition,
    /// Save path reported by the remote.
    pub save_path: Option<String>,
    /// Timestamp when the torrent was added.
    pub added_at: Option<DateTime<Utc>>,
    /// Timestamp when the torrent completed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl TorrentItem {
    /// Completion percentage (0-100).
    #[must_use]
    pub fn percent_complete(&self) -> f64 {
        f64::from(self.progress_per_mille) / 10.0
    }
}

/// Torrent entry as decoded by the transport, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTorrent {
    /// Torrent identifier (required).
    pub id: Option<String>,
    /// Display name.
    pub name: Option<String>,
    /// Status bitmask; no flags when absent.
    pub status: Option<u32>,
    /// Completion in per mille (required).
    pub progress: Option<u32>,
    /// Total payload size in bytes.
    pub size: Option<u64>,
    /// Bytes downloaded so far.
    pub downloaded: Option<u64>,
    /// Bytes uploaded so far.
    pub uploaded: Option<u64>,
    /// Share ratio in per mille.
    pub ratio: Option<u32>,
    /// Upload rate in bytes per second; zero when absent.
    pub upload_speed: Option<u64>,
    /// Download rate in bytes per second; zero when absent.
    pub download_speed: Option<u64>,
    /// Seconds remaining; non-positive values mean unknown.
    pub eta: Option<i64>,
    /// Assigned labels.
    pub labels: Option<Vec<String>>,
    /// Queue slot, `-1` or absent when unqueued.
    pub queue_position: Option<i64>,
    /// Save path.
    pub save_path: Option<String>,
    /// Epoch seconds when added; non-positive values mean unknown.
    pub added_on: Option<i64>,
    /// Epoch seconds when completed; non-positive values mean unknown.
    pub completed_on: Option<i64>,
}

impl TryFrom<RawTorrent> for TorrentItem {
    type Error = SyncError;

    fn try_from(raw: RawTorrent) -> SyncResult<Self> {
        let id = match raw.id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(SyncError::malformed("id", "missing")),
        };
        let progress = required(raw.progress, "progress", &id)?;
        if progress > crate::config::FULL_PROGRESS_PER_MILLE {
            return Err(SyncError::malformed_item(
                "progress",
                id,
                "exceeds 1000 per mille",
            ));
        }
        let queue_raw = raw
            .queue_position
            .unwrap_or(QueuePosition::UNQUEUED_SENTINEL);
        let Some(queue_position) = QueuePosition::from_wire(queue_raw) else {
            return Err(SyncError::malformed_item(
                "queue_position",
                id,
                "negative queue position",
            ));
        };

        Ok(Self {
            id: TorrentId::from(id),
            name: raw.name.unwrap_or_default(),
            status: StatusFlags::from_bits(raw.status.unwrap_or_default()),
            progress_per_mille: progress,
            size_bytes: raw.size.unwrap_or_default(),
            downloaded_bytes: raw.downloaded.unwrap_or_default(),
            uploaded_bytes: raw.uploaded.unwrap_or_default(),
            ratio_per_mille: raw.ratio.unwrap_or_default(),
            upload_bps: raw.upload_speed.unwrap_or_default(),
            download_bps: raw.download_speed.unwrap_or_default(),
            eta_seconds: raw
                .eta
                .and_then(|eta| u64::try_from(eta).ok())
                .filter(|eta| *eta > 0),
            labels: normalize_labels(raw.labels.unwrap_or_default()),
            queue_position,
            save_path: raw.save_path.filter(|path| !path.is_empty()),
            added_at: raw.added_on.and_then(epoch_timestamp),
            completed_at: raw.completed_on.and_then(epoch_timestamp),
        })
    }
}

fn required<T>(value: Option<T>, field: &'static str, id: &str) -> SyncResult<T> {
    value.ok_or_else(|| SyncError::malformed_item(field, id, "missing"))
}

fn normalize_labels(raw: Vec<String>) -> Vec<String> {
    let mut labels: Vec<String> = Vec::with_capacity(raw.len());
    for label in raw {
        let trimmed = label.trim();
        if trimmed.is_empty() || labels.iter().any(|existing| existing == trimmed) {
            continue;
        }
        labels.push(trimmed.to_string());
    }
    labels
}

fn epoch_timestamp(secs: i64) -> Option<DateTime<Utc>> {
    if secs <= 0 {
        return None;
    }
    DateTime::from_timestamp(secs, 0)
}
