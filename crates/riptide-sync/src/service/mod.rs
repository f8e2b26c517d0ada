//! Transport seam and the host-side client that drives the engine.
//!
//! # Design
//! - The engine never performs I/O; the [`Transport`] fetches payloads and submits moves.
//! - A poll gate keeps at most one fetch-then-apply cycle in flight.
//! - The engine lock spans one whole apply, so readers never observe a half-applied list.

use anyhow::Context;
use async_trait::async_trait;
use riptide_telemetry::Metrics;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::engine::{SyncEngine, SyncOutcome};
use crate::error::SyncError;
use crate::filter::{FilterSelection, VisibilityChanges};
use crate::model::TorrentId;
use crate::payload::{Cursor, ListPayload};
use crate::queue::{QueueDirection, ReorderPlan};
use crate::reconcile::ListShape;

/// Remote session access implemented by protocol adapters.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the torrent list relative to `cursor`.
    async fn fetch(&self, cursor: &Cursor) -> anyhow::Result<ListPayload>;

    /// Submit a reorder; the remote must apply the moves in plan order.
    async fn submit_reorder(&self, plan: &ReorderPlan) -> anyhow::Result<()>;
}

/// Host wrapper serialising fetch and apply cycles around a shared engine.
pub struct SyncClient<T> {
    transport: T,
    engine: Mutex<SyncEngine>,
    poll_gate: Mutex<()>,
    metrics: Option<Metrics>,
}

impl<T: Transport> SyncClient<T> {
    /// Wrap an engine and transport.
    #[must_use]
    pub fn new(transport: T, engine: SyncEngine) -> Self {
        Self {
            transport,
            engine: Mutex::new(engine),
            poll_gate: Mutex::new(()),
            metrics: None,
        }
    }

    /// Record reconciliation and reorder metrics into `metrics`.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Fetch the next payload and apply it.
    ///
    /// A malformed payload resets the cursor so the next poll receives a full snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport fails or the payload is rejected.
    pub async fn poll_once(&self) -> anyhow::Result<SyncOutcome> {
        let _gate = self.poll_gate.lock().await;
        let cursor = self.engine.lock().await.cursor().clone();
        let payload = self
            .transport
            .fetch(&cursor)
            .await
            .with_context(|| format!("failed to fetch torrent list at cursor '{cursor}'"))?;

        let mut engine = self.engine.lock().await;
        match engine.apply(payload) {
            Ok(outcome) => {
                if let Some(metrics) = &self.metrics {
                    metrics.inc_reconcile(outcome.shape.as_str());
                    if outcome.shape == ListShape::Full {
                        let removed = u64::try_from(outcome.report.removed.len())
                            .unwrap_or(u64::MAX);
                        metrics.add_inferred_removals(removed);
                    }
                    metrics.set_tracked_torrents(engine.store().len());
                    metrics.set_visible_torrents(engine.visible_ids().len());
                }
                Ok(outcome)
            }
            Err(err) => {
                warn!(cursor = %cursor, error = ?err, "rejected torrent list payload");
                if let Some(metrics) = &self.metrics {
                    metrics.inc_malformed_payload();
                }
                if matches!(err, SyncError::MalformedPayload { .. }) {
                    engine.request_full_resync();
                }
                Err(anyhow::Error::new(err).context("failed to apply torrent list payload"))
            }
        }
    }

    /// Replace the active filter selection.
    pub async fn set_selection(&self, selection: FilterSelection) -> VisibilityChanges {
        let mut engine = self.engine.lock().await;
        let changes = engine.set_selection(selection);
        if let Some(metrics) = &self.metrics {
            metrics.set_visible_torrents(engine.visible_ids().len());
        }
        changes
    }

    /// Plan a queue move and submit it when anything moves.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport rejects the submission.
    pub async fn move_queue(
        &self,
        selected: &[TorrentId],
        direction: QueueDirection,
    ) -> anyhow::Result<ReorderPlan> {
        let plan = self.engine.lock().await.reorder(selected, direction);
        if plan.is_empty() {
            return Ok(plan);
        }
        self.transport
            .submit_reorder(&plan)
            .await
            .with_context(|| format!("failed to submit queue move {}", direction.as_str()))?;
        info!(
            direction = direction.as_str(),
            moved = plan.ids.len(),
            "submitted queue reorder"
        );
        if let Some(metrics) = &self.metrics {
            metrics.inc_queue_reorder(direction.as_str());
        }
        Ok(plan)
    }

    /// Run `f` with exclusive access to the engine.
    pub async fn with_engine<R>(&self, f: impl FnOnce(&mut SyncEngine) -> R + Send) -> R {
        let mut engine = self.engine.lock().await;
        f(&mut *engine)
    }

    /// Borrow the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    use anyhow::anyhow;

    use super::*;
    use crate::category::Category;
    use crate::model::RawTorrent;

    #[derive(Default)]
    struct ScriptedTransport {
        responses: StdMutex<VecDeque<ListPayload>>,
        cursors: StdMutex<Vec<Cursor>>,
        submitted: StdMutex<Vec<ReorderPlan>>,
    }

    impl ScriptedTransport {
        fn with(responses: Vec<ListPayload>) -> Self {
            Self {
                responses: StdMutex::new(responses.into()),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(&self, cursor: &Cursor) -> anyhow::Result<ListPayload> {
            self.cursors
                .lock()
                .map_err(|_| anyhow!("cursor log poisoned"))?
                .push(cursor.clone());
            self.responses
                .lock()
                .map_err(|_| anyhow!("response queue poisoned"))?
                .pop_front()
                .ok_or_else(|| anyhow!("no scripted response left"))
        }

        async fn submit_reorder(&self, plan: &ReorderPlan) -> anyhow::Result<()> {
            self.submitted
                .lock()
                .map_err(|_| anyhow!("submission log poisoned"))?
                .push(plan.clone());
            Ok(())
        }
    }

    fn entry(id: &str, progress: u32, slot: i64) -> RawTorrent {
        RawTorrent {
            id: Some(id.into()),
            status: Some(1),
            progress: Some(progress),
            upload_speed: Some(0),
            download_speed: Some(0),
            queue_position: Some(slot),
            ..RawTorrent::default()
        }
    }

    #[tokio::test]
    async fn polls_advance_cursor_and_record_metrics() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![
            ListPayload::full("1", vec![entry("a", 0, 1), entry("b", 1_000, 2)]),
            ListPayload::unchanged("2"),
        ]);
        let metrics = Metrics::new()?;
        let client = SyncClient::new(transport, SyncEngine::default())
            .with_metrics(metrics.clone());

        let first = client.poll_once().await?;
        assert_eq!(first.report.added.len(), 2);
        let second = client.poll_once().await?;
        assert!(second.report.is_empty());
        assert_eq!(second.cursor, Cursor::new("2"));

        let cursors = client
            .transport()
            .cursors
            .lock()
            .map_err(|_| anyhow!("cursor log poisoned"))?
            .clone();
        assert_eq!(cursors, vec![Cursor::initial(), Cursor::new("1")]);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tracked_torrents, 2);
        assert_eq!(snapshot.visible_torrents, 2);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_payload_triggers_full_resync() -> anyhow::Result<()> {
        let mut broken = entry("c", 0, -1);
        broken.upload_speed = None;
        let transport = ScriptedTransport::with(vec![
            ListPayload::full("1", vec![entry("a", 0, 1), entry("b", 0, 2)]),
            ListPayload::delta("2", vec![broken], Vec::new()),
            ListPayload::full("3", vec![entry("a", 0, 1)]),
        ]);
        let metrics = Metrics::new()?;
        let client = SyncClient::new(transport, SyncEngine::default())
            .with_metrics(metrics.clone());

        client.poll_once().await?;
        assert!(client.poll_once().await.is_err());
        assert!(client.with_engine(|engine| engine.cursor().is_initial()).await);

        let recovered = client.poll_once().await?;
        assert_eq!(recovered.report.removed, vec![TorrentId::from("b")]);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.malformed_payloads_total, 1);
        assert_eq!(snapshot.inferred_removals_total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn queue_moves_submit_only_non_empty_plans() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ListPayload::full(
            "1",
            vec![entry("a", 0, 1), entry("b", 0, 2), entry("c", 0, -1)],
        )]);
        let client = SyncClient::new(transport, SyncEngine::default());
        client.poll_once().await?;

        let noop = client
            .move_queue(&[TorrentId::from("a")], QueueDirection::Up)
            .await?;
        assert!(noop.is_empty());
        let plan = client
            .move_queue(&[TorrentId::from("b"), "c".into()], QueueDirection::Top)
            .await?;
        assert_eq!(plan.ids, vec![TorrentId::from("b")]);

        let submitted = client
            .transport()
            .submitted
            .lock()
            .map_err(|_| anyhow!("submission log poisoned"))?
            .clone();
        assert_eq!(submitted, vec![plan]);
        Ok(())
    }

    #[tokio::test]
    async fn selection_updates_visibility() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ListPayload::full(
            "1",
            vec![entry("a", 0, -1), entry("b", 1_000, -1)],
        )]);
        let client = SyncClient::new(transport, SyncEngine::default());
        client.poll_once().await?;

        let changes = client
            .set_selection([Category::Completed].into_iter().collect())
            .await;
        assert_eq!(changes.hidden, vec![TorrentId::from("a")]);
        let visible = client.with_engine(|engine| engine.visible_ids()).await;
        assert_eq!(visible, vec![TorrentId::from("b")]);
        Ok(())
    }
}
