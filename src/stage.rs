//! Stage facade (C4): the crate's public entry point. Wires one router per
//! signal kind against a shared configuration, shutdown latch, and
//! wait-group, and exposes the three typed `consume*` calls producers use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinSet;

use crate::config::BatchConfig;
use crate::context::RequestMetadata;
use crate::error::StageError;
use crate::router::Router;
use crate::signal::{LogData, MetricData, SignalPayload, TraceData};
use crate::types::{DownstreamSink, TelemetryObserver};
use crate::worker::WorkerShared;

/// Capability flags the stage reports to an embedding pipeline.
///
/// `mutates_data` is always `true`: a payload handed to any `consume*` call
/// may be partially or fully moved into a worker's accumulator, so callers
/// must not reuse it afterward.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub mutates_data: bool,
}

/// One signal kind's independent router + worker-shared state. Each signal
/// kind gets its own tenant map (and so its own cardinality) because its
/// adapter type differs, even though all three are sharded by the same
/// `metadata_keys`.
struct SignalStage<P: SignalPayload> {
    router: Router<P>,
    shared: Arc<WorkerShared<P>>,
}

impl<P: SignalPayload> SignalStage<P> {
    fn new(
        config: Arc<BatchConfig>,
        sink: Arc<dyn DownstreamSink<P>>,
        observer: Arc<dyn TelemetryObserver>,
        shutdown_rx: watch::Receiver<bool>,
        workers: Arc<Mutex<JoinSet<()>>>,
    ) -> Self {
        let shared = Arc::new(WorkerShared {
            config: config.clone(),
            sink,
            observer,
            shutdown: shutdown_rx,
            workers,
        });
        let router = if shared.config.metadata_keys().is_empty() {
            Router::singleton(&shared)
        } else {
            Router::multi(
                shared.config.metadata_keys().to_vec(),
                shared.config.metadata_cardinality_limit(),
            )
        };
        Self { router, shared }
    }

    async fn consume(&self, request: &RequestMetadata, payload: P) -> Result<(), StageError> {
        let sender = self.router.route(request, &self.shared)?;
        // A closed receiver only happens mid-shutdown, after the caller's
        // own `consume` call has already raced the latch; the payload is
        // simply dropped, matching the "no retry, no redelivery" contract.
        let _ = sender.send(payload).await;
        Ok(())
    }

    fn cardinality(&self) -> usize {
        self.router.cardinality()
    }
}

/// The batching stage. Holds one independent router per signal kind, a
/// shared shutdown latch, and a wait-group ([`JoinSet`]) every spawned
/// worker registers into.
pub struct Stage {
    traces: SignalStage<TraceData>,
    metrics: SignalStage<MetricData>,
    logs: SignalStage<LogData>,
    shutdown_tx: watch::Sender<bool>,
    workers: Arc<Mutex<JoinSet<()>>>,
    started: AtomicBool,
}

impl Stage {
    pub fn builder() -> StageBuilder {
        StageBuilder::new()
    }

    /// Marks the stage started. Workers are actually spawned lazily, on
    /// first routing decision per tenant (singleton workers are spawned
    /// eagerly at construction) - `start` exists to mirror the facade
    /// lifecycle the spec names and to make a double-shutdown a caller
    /// error instead of a silent no-op.
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Closes the shutdown latch (waking every worker's `select!`), then
    /// waits for every worker task across all three signal kinds to finish
    /// its drain-and-flush sequence.
    ///
    /// Idempotent: a second call observes `started == false` and returns
    /// immediately rather than waiting on an already-empty `JoinSet`.
    pub async fn shutdown(&self) {
        if !self.started.swap(false, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown_tx.send(true);

        let mut workers = {
            let mut guard = self.workers.lock();
            std::mem::replace(&mut *guard, JoinSet::new())
        };
        while workers.join_next().await.is_some() {}
    }

    /// Routes `payload` to its tenant's trace worker.
    pub async fn consume_traces(&self, request: &RequestMetadata, payload: TraceData) -> Result<(), StageError> {
        self.traces.consume(request, payload).await
    }

    /// Routes `payload` to its tenant's metric worker.
    pub async fn consume_metrics(&self, request: &RequestMetadata, payload: MetricData) -> Result<(), StageError> {
        self.metrics.consume(request, payload).await
    }

    /// Routes `payload` to its tenant's log worker.
    pub async fn consume_logs(&self, request: &RequestMetadata, payload: LogData) -> Result<(), StageError> {
        self.logs.consume(request, payload).await
    }

    pub fn cardinality_traces(&self) -> usize {
        self.traces.cardinality()
    }

    pub fn cardinality_metrics(&self) -> usize {
        self.metrics.cardinality()
    }

    pub fn cardinality_logs(&self) -> usize {
        self.logs.cardinality()
    }

    /// Widest tenant count currently live across the three signal kinds,
    /// for an embedding process that wants a single gauge rather than
    /// three.
    pub fn cardinality(&self) -> usize {
        self.cardinality_traces().max(self.cardinality_metrics()).max(self.cardinality_logs())
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities { mutates_data: true }
    }
}

/// Builder for [`Stage`]. One sink per signal kind is required; the
/// telemetry observer is shared across all three (its `record` calls carry
/// no signal-kind tag, matching the spec's single-observer contract).
#[must_use = "builders do nothing unless you call .build()"]
pub struct StageBuilder {
    config: Option<BatchConfig>,
    trace_sink: Option<Arc<dyn DownstreamSink<TraceData>>>,
    metric_sink: Option<Arc<dyn DownstreamSink<MetricData>>>,
    log_sink: Option<Arc<dyn DownstreamSink<LogData>>>,
    observer: Option<Arc<dyn TelemetryObserver>>,
}

/// A [`TelemetryObserver`] that discards every call; the default when a
/// builder omits `.observer(..)`, since telemetry is an optional
/// collaborator per the spec's external-interfaces section.
struct NoopObserver;

impl TelemetryObserver for NoopObserver {
    fn record(&self, _trigger: crate::types::Trigger, _items: u64, _bytes: u64) {}
}

impl StageBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            trace_sink: None,
            metric_sink: None,
            log_sink: None,
            observer: None,
        }
    }

    pub fn config(mut self, config: BatchConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn trace_sink(mut self, sink: Arc<dyn DownstreamSink<TraceData>>) -> Self {
        self.trace_sink = Some(sink);
        self
    }

    pub fn metric_sink(mut self, sink: Arc<dyn DownstreamSink<MetricData>>) -> Self {
        self.metric_sink = Some(sink);
        self
    }

    pub fn log_sink(mut self, sink: Arc<dyn DownstreamSink<LogData>>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TelemetryObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Builds the stage and starts it. Infallible: `config` must already be
    /// a validated [`BatchConfig`] (produced by [`BatchConfig::builder`]'s
    /// fallible `build()`), so there is no separate validation step here.
    /// A sink missing for a signal kind falls back to one that accepts and
    /// drops, since a stage with an unused signal kind (e.g. a
    /// metrics-only deployment) is a normal configuration, not an error.
    pub fn build(self) -> Stage {
        let config = Arc::new(self.config.unwrap_or_else(|| BatchConfig::builder().build().expect("default config is always valid")));
        let observer: Arc<dyn TelemetryObserver> = self.observer.unwrap_or_else(|| Arc::new(NoopObserver));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let workers = Arc::new(Mutex::new(JoinSet::new()));

        let trace_sink = self.trace_sink.unwrap_or_else(|| Arc::new(DroppingSink::default()));
        let metric_sink = self.metric_sink.unwrap_or_else(|| Arc::new(DroppingSink::default()));
        let log_sink = self.log_sink.unwrap_or_else(|| Arc::new(DroppingSink::default()));

        let traces = SignalStage::new(config.clone(), trace_sink, observer.clone(), shutdown_rx.clone(), workers.clone());
        let metrics = SignalStage::new(config.clone(), metric_sink, observer.clone(), shutdown_rx.clone(), workers.clone());
        let logs = SignalStage::new(config, log_sink, observer, shutdown_rx, workers.clone());

        let stage = Stage {
            traces,
            metrics,
            logs,
            shutdown_tx,
            workers,
            started: AtomicBool::new(false),
        };
        stage.start();
        stage
    }
}

impl Default for StageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Sink that accepts and discards every payload, used to fill in a signal
/// kind the builder's caller never wired a real sink for.
struct DroppingSink<P>(std::marker::PhantomData<fn(P)>);

impl<P> Default for DroppingSink<P> {
    fn default() -> Self {
        Self(std::marker::PhantomData)
    }
}

impl<P: SignalPayload> DownstreamSink<P> for DroppingSink<P> {
    fn accept(&self, _ctx: &crate::context::ExportContext, _payload: P) -> Result<(), crate::error::SinkError> {
        Ok(())
    }
}
