//! Test doubles shared across module test suites. Not part of the public
//! API; gated behind `#[cfg(test)]` from `lib.rs`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::context::ExportContext;
use crate::error::SinkError;
use crate::signal::SignalPayload;
use crate::types::{DownstreamSink, TelemetryObserver, Trigger};

/// Observer that discards everything. Used where a test only cares about
/// routing/cardinality behavior, not release telemetry.
pub struct NullObserver;

impl TelemetryObserver for NullObserver {
    fn record(&self, _trigger: Trigger, _items: u64, _bytes: u64) {}
}

/// Observer that counts recorded releases, for tests asserting telemetry is
/// (or isn't) emitted.
///
/// `accept`'s signature carries no trigger, so the sink can't distinguish
/// why a batch was released; tests that need trigger-specific assertions
/// read that back from here instead, since `record` does get it.
#[derive(Default)]
pub struct CountingObserver {
    count: AtomicU64,
    releases: Mutex<Vec<(Trigger, u64)>>,
}

impl TelemetryObserver for CountingObserver {
    fn record(&self, trigger: Trigger, items: u64, _bytes: u64) {
        self.count.fetch_add(1, Ordering::AcqRel);
        self.releases.lock().unwrap().push((trigger, items));
    }

    fn detailed(&self) -> bool {
        true
    }
}

impl CountingObserver {
    pub fn recorded_count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    pub fn releases(&self) -> Vec<(Trigger, u64)> {
        self.releases.lock().unwrap().clone()
    }
}

/// Sink that records every accepted release's item count and, optionally,
/// fails every call.
pub struct RecordingSink<P> {
    releases: Mutex<Vec<u64>>,
    attempts: AtomicUsize,
    fail: bool,
    _marker: std::marker::PhantomData<fn(P)>,
}

impl<P: SignalPayload> Default for RecordingSink<P> {
    fn default() -> Self {
        Self {
            releases: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail: false,
            _marker: std::marker::PhantomData,
        }
    }
}

impl<P: SignalPayload> RecordingSink<P> {
    /// A sink whose `accept` always fails, to exercise the
    /// error-is-logged-not-propagated path.
    pub fn failing() -> Self {
        Self {
            releases: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail: true,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn releases(&self) -> Vec<u64> {
        self.releases.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Acquire)
    }
}

impl<P: SignalPayload> DownstreamSink<P> for RecordingSink<P> {
    fn accept(&self, _ctx: &ExportContext, payload: P) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::AcqRel);
        if self.fail {
            return Err(SinkError::from_message("simulated sink failure"));
        }
        self.releases.lock().unwrap().push(payload.item_count() as u64);
        Ok(())
    }
}
