#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Incremental torrent list synchronisation and derived aggregation.
//!
//! Layout: `model/` (torrent records and wire-decoded entries), `payload.rs` (cursor-tagged
//! list payloads), `store.rs` (item store), `reconcile.rs` (delta and full-list
//! reconciliation), `category.rs` (memberships and counters), `filter.rs` (visibility),
//! `queue.rs` (multi-item reorder planning), `engine.rs` (`SyncEngine` façade), and
//! `service/` (the `Transport` seam and `SyncClient` host).

pub mod category;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod model;
pub mod payload;
pub mod queue;
pub mod reconcile;
pub mod service;
pub mod store;

pub use category::{
    ActivityCategory, Category, CategoryAggregator, CategoryCounters, MembershipDelta,
    Memberships, StatusCategory,
};
pub use config::SyncConfig;
pub use engine::{CounterCheck, SyncEngine, SyncOutcome};
pub use error::{SyncError, SyncResult};
pub use filter::{FilterSelection, VisibilityChanges, is_visible};
pub use model::{QueuePosition, RawTorrent, StatusFlags, TorrentId, TorrentItem};
pub use payload::{Cursor, ListPayload, ListUpdate, ValidatedPayload};
pub use queue::{QueueDirection, QueueSnapshot, ReorderPlan, plan_reorder};
pub use reconcile::{ChangeReport, ListShape, Reconciled, reconcile};
pub use service::{SyncClient, Transport};
pub use store::{ItemStore, Upsert};
