//! Shared small value types: release triggers, the downstream sink
//! contract, and the telemetry observer contract.

use crate::context::ExportContext;
use crate::error::SinkError;

/// Why a batch was released.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Released because the buffered item count crossed `send_batch_size`.
    BatchSize,
    /// Released because `timeout` elapsed since the last release (or this
    /// is the final flush on shutdown).
    Timeout,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trigger::BatchSize => "batch_size",
            Trigger::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The downstream consumer for one signal kind.
///
/// Treated as a black-box sink: `accept` is synchronous from the worker's
/// point of view (consistent with the spec's external-collaborator
/// contract) and its failure does not unwind any buffered state - the
/// released items are considered gone either way.
pub trait DownstreamSink<P>: Send + Sync {
    fn accept(&self, ctx: &ExportContext, payload: P) -> Result<(), SinkError>;
}

/// Observer the stage reports every successful release to, and consults
/// for whether `export` should bother computing serialized byte sizes.
pub trait TelemetryObserver: Send + Sync {
    fn record(&self, trigger: Trigger, items: u64, bytes: u64);

    /// Whether byte-size accounting is worth the cost of computing it.
    fn detailed(&self) -> bool {
        false
    }
}
