//! Error types for list synchronisation.

use thiserror::Error;

/// Primary error type for sync engine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A reconciliation input was missing required fields or was internally inconsistent.
    #[error("malformed sync payload")]
    MalformedPayload {
        /// Field that failed validation.
        field: &'static str,
        /// Torrent identifier when the failure is tied to one entry.
        torrent_id: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// An operation referenced a torrent the engine does not track.
    #[error("unknown torrent reference")]
    UnknownItemReference {
        /// Identifier that could not be resolved.
        torrent_id: String,
    },
    /// A queue move selection contained no queued torrents.
    #[error("queue selection is empty")]
    EmptySelection,
    /// A category identifier could not be parsed.
    #[error("invalid category identifier")]
    InvalidCategory {
        /// Raw identifier supplied by the caller.
        value: String,
    },
    /// Engine configuration contained an invalid value.
    #[error("invalid sync configuration")]
    InvalidConfig {
        /// Field that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
}

impl SyncError {
    pub(crate) fn malformed(field: &'static str, reason: &'static str) -> Self {
        Self::MalformedPayload {
            field,
            torrent_id: None,
            reason,
        }
    }

    pub(crate) fn malformed_item(
        field: &'static str,
        torrent_id: impl Into<String>,
        reason: &'static str,
    ) -> Self {
        Self::MalformedPayload {
            field,
            torrent_id: Some(torrent_id.into()),
            reason,
        }
    }

    /// Whether the caller can carry on without resynchronising.
    ///
    /// Only malformed payloads leave the caller needing a fresh full snapshot.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::MalformedPayload { .. })
    }
}

/// Convenience alias for sync engine results.
pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_malformed_payloads_are_fatal() {
        assert!(!SyncError::malformed("cursor", "missing").is_recoverable());
        assert!(
            SyncError::UnknownItemReference {
                torrent_id: "abc".into()
            }
            .is_recoverable()
        );
        assert!(SyncError::EmptySelection.is_recoverable());
    }

    #[test]
    fn malformed_item_records_torrent_id() {
        let err = SyncError::malformed_item("progress", "deadbeef", "out of range");
        assert_eq!(err.to_string(), "malformed sync payload");
        match err {
            SyncError::MalformedPayload {
                field,
                torrent_id,
                reason,
            } => {
                assert_eq!(field, "progress");
                assert_eq!(torrent_id.as_deref(), Some("deadbeef"));
                assert_eq!(reason, "out of range");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
