//! Telemetry batching stage
//!
//! A per-tenant batching stage for a streaming telemetry pipeline carrying
//! three signal kinds - traces, metrics, logs. Producers submit payloads of
//! arbitrary size; the stage shards them by request metadata, coalesces
//! them per tenant, and releases coalesced payloads to a downstream sink
//! either when an item-count threshold is crossed or after a quiescence
//! timeout.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use telemetry_batcher::{BatchConfig, RequestMetadata, Stage};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BatchConfig::builder()
//!         .send_batch_size(512)
//!         .timeout(Duration::from_secs(5))
//!         .metadata_keys(["tenant"])
//!         .build()
//!         .expect("valid config");
//!
//!     let stage = Stage::builder().config(config).build();
//!
//!     let request = RequestMetadata::new().insert("tenant", "acme");
//!     stage
//!         .consume_traces(&request, Default::default())
//!         .await
//!         .expect("tenant cardinality not exceeded");
//!
//!     stage.shutdown().await;
//! }
//! ```

mod adapter;
mod config;
mod context;
mod error;
mod router;
mod signal;
mod stage;
#[cfg(test)]
mod test_support;
mod types;
mod worker;

pub use config::{BatchConfig, BatchConfigBuilder};
pub use context::{ExportContext, RequestMetadata};
pub use error::{ConfigError, SinkError, StageError};
pub use signal::{
    DataPoint, EncodedSize, Grouped, LogData, LogRecord, MetricData, ResourceGroup, ScopeGroup, SignalPayload, Span,
    TraceData,
};
pub use stage::{Capabilities, Stage, StageBuilder};
pub use types::{DownstreamSink, TelemetryObserver, Trigger};
