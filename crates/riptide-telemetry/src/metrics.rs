//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges relevant to list synchronisation.

use std::sync::Arc;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared by sync hosts.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    reconciles_total: IntCounterVec,
    malformed_payloads_total: IntCounter,
    inferred_removals_total: IntCounter,
    tracked_torrents: IntGauge,
    visible_torrents: IntGauge,
    queue_reorders_total: IntCounterVec,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Torrents currently tracked by the engine.
    pub tracked_torrents: i64,
    /// Torrents passing the active filter selection.
    pub visible_torrents: i64,
    /// Payloads rejected as malformed.
    pub malformed_payloads_total: u64,
    /// Removals inferred from full snapshots.
    pub inferred_removals_total: u64,
}

impl Metrics {
    /// Construct a new metrics registry with the sync collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let reconciles_total = IntCounterVec::new(
            Opts::new(
                "sync_reconciles_total",
                "Successfully applied list payloads by shape",
            ),
            &["shape"],
        )
        .map_err(|source| collector_error("sync_reconciles_total", source))?;
        let malformed_payloads_total = IntCounter::with_opts(Opts::new(
            "sync_malformed_payloads_total",
            "List payloads rejected as malformed",
        ))
        .map_err(|source| collector_error("sync_malformed_payloads_total", source))?;
        let inferred_removals_total = IntCounter::with_opts(Opts::new(
            "sync_inferred_removals_total",
            "Torrents removed by full-snapshot inference",
        ))
        .map_err(|source| collector_error("sync_inferred_removals_total", source))?;
        let tracked_torrents = IntGauge::with_opts(Opts::new(
            "sync_tracked_torrents",
            "Torrents tracked by the sync engine",
        ))
        .map_err(|source| collector_error("sync_tracked_torrents", source))?;
        let visible_torrents = IntGauge::with_opts(Opts::new(
            "sync_visible_torrents",
            "Torrents passing the active filter selection",
        ))
        .map_err(|source| collector_error("sync_visible_torrents", source))?;
        let queue_reorders_total = IntCounterVec::new(
            Opts::new("queue_reorders_total", "Queue reorders submitted by direction"),
            &["direction"],
        )
        .map_err(|source| collector_error("queue_reorders_total", source))?;

        register(&registry, "sync_reconciles_total", &reconciles_total)?;
        register(
            &registry,
            "sync_malformed_payloads_total",
            &malformed_payloads_total,
        )?;
        register(
            &registry,
            "sync_inferred_removals_total",
            &inferred_removals_total,
        )?;
        register(&registry, "sync_tracked_torrents", &tracked_torrents)?;
        register(&registry, "sync_visible_torrents", &visible_torrents)?;
        register(&registry, "queue_reorders_total", &queue_reorders_total)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                reconciles_total,
                malformed_payloads_total,
                inferred_removals_total,
                tracked_torrents,
                visible_torrents,
                queue_reorders_total,
            }),
        })
    }

    /// Increment the applied payload counter for the given shape.
    pub fn inc_reconcile(&self, shape: &str) {
        self.inner
            .reconciles_total
            .with_label_values(&[shape])
            .inc();
    }

    /// Increment the malformed payload counter.
    pub fn inc_malformed_payload(&self) {
        self.inner.malformed_payloads_total.inc();
    }

    /// Add removals inferred from a full snapshot.
    pub fn add_inferred_removals(&self, count: u64) {
        self.inner.inferred_removals_total.inc_by(count);
    }

    /// Set the tracked torrent gauge.
    pub fn set_tracked_torrents(&self, count: usize) {
        self.inner.tracked_torrents.set(saturating_i64(count));
    }

    /// Set the visible torrent gauge.
    pub fn set_visible_torrents(&self, count: usize) {
        self.inner.visible_torrents.set(saturating_i64(count));
    }

    /// Increment the reorder counter for the given direction.
    pub fn inc_queue_reorder(&self, direction: &str) {
        self.inner
            .queue_reorders_total
            .with_label_values(&[direction])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Exposition { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::ExpositionUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tracked_torrents: self.inner.tracked_torrents.get(),
            visible_torrents: self.inner.visible_torrents.get(),
            malformed_payloads_total: self.inner.malformed_payloads_total.get(),
            inferred_removals_total: self.inner.inferred_removals_total.get(),
        }
    }
}

const fn collector_error(metric: &'static str, source: prometheus::Error) -> TelemetryError {
    TelemetryError::CollectorBuild { metric, source }
}

fn register<C>(registry: &Registry, metric: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::CollectorRegister { metric, source })
}

fn saturating_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
