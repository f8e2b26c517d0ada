//! Thresholds used to derive category memberships.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Default transfer rate (bytes/s) above which a torrent counts as active.
pub const DEFAULT_ACTIVITY_THRESHOLD_BPS: u64 = 103;
/// Progress value (per mille) at which a torrent counts as completed.
pub const FULL_PROGRESS_PER_MILLE: u32 = 1_000;

/// Tunable inputs for membership classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    /// A torrent is active when either transfer rate is strictly above this value.
    pub activity_threshold_bps: u64,
    /// A torrent is completed when its progress reaches this value.
    pub completion_per_mille: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            activity_threshold_bps: DEFAULT_ACTIVITY_THRESHOLD_BPS,
            completion_per_mille: FULL_PROGRESS_PER_MILLE,
        }
    }
}

impl SyncConfig {
    /// Check the configuration for out-of-range values.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when `completion_per_mille` falls outside
    /// `1..=1000`.
    pub const fn validate(&self) -> SyncResult<()> {
        if self.completion_per_mille == 0 || self.completion_per_mille > FULL_PROGRESS_PER_MILLE
        {
            return Err(SyncError::InvalidConfig {
                field: "completion_per_mille",
                reason: "must be between 1 and 1000",
            });
        }
        Ok(())
    }
}
