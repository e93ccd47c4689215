//! Batch worker (C2): one task per tenant, owning its adapter and timer
//! exclusively, selecting over item arrival, timer fire, and shutdown.

use std::pin::Pin;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;
use tokio::time::Sleep;

use crate::adapter::Adapter;
use crate::config::BatchConfig;
use crate::context::ExportContext;
use crate::signal::SignalPayload;
use crate::types::{DownstreamSink, TelemetryObserver, Trigger};

/// Bound on a worker's input channel. Small enough that a stalled sink
/// applies backpressure quickly, large enough to absorb a producer burst
/// without the send blocking on every call. See DESIGN.md's "worker
/// channel capacity" note - the spec leaves the exact bound unspecified.
pub const CHANNEL_CAPACITY: usize = 64;

/// State shared by every worker of one signal kind, handed to each worker
/// task at spawn time. Config and sink/observer are read-only from a
/// worker's point of view; `workers` is the wait-group the stage facade
/// joins on shutdown.
pub struct WorkerShared<P: SignalPayload> {
    pub config: Arc<BatchConfig>,
    pub sink: Arc<dyn DownstreamSink<P>>,
    pub observer: Arc<dyn TelemetryObserver>,
    pub shutdown: watch::Receiver<bool>,
    pub workers: Arc<Mutex<JoinSet<()>>>,
}

struct Worker<P: SignalPayload> {
    shared: Arc<WorkerShared<P>>,
    export_ctx: ExportContext,
    input: mpsc::Receiver<P>,
    adapter: Adapter<P>,
    timer: Option<Pin<Box<Sleep>>>,
}

/// Spawn a new worker for `export_ctx`, registering it in `shared.workers`
/// so the stage facade's shutdown can join it, and return the sender end
/// producers enqueue onto.
pub fn spawn<P: SignalPayload>(shared: Arc<WorkerShared<P>>, export_ctx: ExportContext) -> mpsc::Sender<P> {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let timer = if shared.config.timer_enabled() {
        Some(Box::pin(tokio::time::sleep(shared.config.timeout())))
    } else {
        None
    };

    let worker = Worker {
        shared: shared.clone(),
        export_ctx,
        input: rx,
        adapter: Adapter::new(),
        timer,
    };

    shared.workers.lock().spawn(worker.run());
    tx
}

impl<P: SignalPayload> Worker<P> {
    async fn run(mut self) {
        tracing::debug!(tenant = %self.export_ctx.tenant_id(), "batch worker started");

        loop {
            tokio::select! {
                maybe_item = self.input.recv() => {
                    match maybe_item {
                        Some(item) => self.on_item(item).await,
                        None => break,
                    }
                }

                _ = async {
                    self.timer.as_mut().expect("guarded by is_some").as_mut().await
                }, if self.timer.is_some() => {
                    self.on_timer_fire().await;
                }

                _ = self.shared.shutdown.changed() => {
                    self.drain_and_shutdown().await;
                    break;
                }
            }
        }

        tracing::debug!(tenant = %self.export_ctx.tenant_id(), "batch worker stopped");
    }

    /// Item arrival arm: buffer the item, then release whole batches while
    /// the drain-by-size condition holds.
    async fn on_item(&mut self, item: P) {
        if self.process_item(item).await {
            self.reset_timer();
        }
    }

    /// Adds `item` to the adapter, then releases whole batches while the
    /// drain-by-size condition holds. Returns whether at least one release
    /// happened, so callers can decide whether the timer needs resetting.
    ///
    /// Shared between the item-arrival arm and the shutdown drain, per the
    /// spec's §4.2 item 3 requirement that each item pulled off the channel
    /// during shutdown goes through the same `processItem` path a normal
    /// arrival does - not a raw `add` that skips size-based release.
    async fn process_item(&mut self, item: P) -> bool {
        self.adapter.add(item);

        let mut released_any = false;
        while self.should_drain_by_size() {
            if self.release(Trigger::BatchSize).await {
                released_any = true;
            } else {
                break;
            }
        }

        released_any
    }

    /// Gated on `send_batch_size` alone: `0` disables the size-triggered
    /// release path entirely, leaving the timer as the only release
    /// mechanism (Testable Property #2). A nonzero size only drains once
    /// the buffered count reaches it.
    fn should_drain_by_size(&self) -> bool {
        let size = self.shared.config.send_batch_size();
        size > 0 && self.adapter.item_count() >= size
    }

    async fn on_timer_fire(&mut self) {
        if self.adapter.item_count() > 0 {
            self.release(Trigger::Timeout).await;
        }
        self.reset_timer();
    }

    /// Non-blocking drain of whatever is already queued - each item goes
    /// through the same add-then-drain-by-size handling as a normal
    /// arrival, so a large backlog still releases in `send_batch_max_size`
    /// chunks instead of one oversized batch - followed by one final flush
    /// of any remaining partial batch, tagged `Timeout` per the spec's
    /// shutdown contract.
    async fn drain_and_shutdown(&mut self) {
        loop {
            match self.input.try_recv() {
                Ok(item) => {
                    self.process_item(item).await;
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => break,
            }
        }

        if self.adapter.item_count() > 0 {
            self.release(Trigger::Timeout).await;
        }
    }

    /// Release one batch. `Trigger::BatchSize` respects
    /// `send_batch_max_size` (may leave a residue); `Trigger::Timeout`
    /// reuses the same export call with no cap, flushing everything
    /// buffered, per the spec's "same export is reused" note.
    ///
    /// Returns whether a release actually happened (the buffer was
    /// non-empty).
    async fn release(&mut self, trigger: Trigger) -> bool {
        if self.adapter.item_count() == 0 {
            return false;
        }

        let max_size = match trigger {
            Trigger::BatchSize => self.shared.config.send_batch_max_size(),
            Trigger::Timeout => 0,
        };

        let payload = self.adapter.export(max_size);
        let sent_items = payload.item_count() as u64;
        let sent_bytes = if self.shared.observer.detailed() {
            payload.encoded_len() as u64
        } else {
            0
        };

        match self.shared.sink.accept(&self.export_ctx, payload) {
            Ok(()) => {
                self.shared.observer.record(trigger, sent_items, sent_bytes);
            }
            Err(err) => {
                tracing::warn!(
                    tenant = %self.export_ctx.tenant_id(),
                    trigger = %trigger,
                    items = sent_items,
                    error = %err,
                    "downstream sink rejected batch",
                );
            }
        }

        true
    }

    fn reset_timer(&mut self) {
        if let Some(timer) = self.timer.as_mut() {
            timer
                .as_mut()
                .reset(tokio::time::Instant::now() + self.shared.config.timeout());
        }
    }
}
