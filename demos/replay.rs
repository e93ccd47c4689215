//! Manual smoke-test driver for the batching stage.
//!
//! Replays a handful of synthetic trace/metric/log payloads across two
//! tenants against a [`Stage`] wired to a logging sink, then shuts the
//! stage down and reports what was released. Not part of the public crate;
//! kept alongside the library as a way to exercise the end-to-end flow by
//! hand instead of only through unit tests.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use telemetry_batcher::{
    BatchConfig, DataPoint, DownstreamSink, Grouped, LogData, LogRecord, MetricData, RequestMetadata, ResourceGroup,
    ScopeGroup, SinkError, Span, Stage, TelemetryObserver, TraceData, Trigger,
};

/// Sink that logs every accepted release at `info` instead of forwarding it
/// anywhere real - stands in for the collector exporter this crate treats
/// as an external collaborator.
struct LoggingSink {
    name: &'static str,
}

impl<P> DownstreamSink<P> for LoggingSink
where
    P: telemetry_batcher::SignalPayload,
{
    fn accept(&self, ctx: &telemetry_batcher::ExportContext, payload: P) -> Result<(), SinkError> {
        tracing::info!(
            sink = self.name,
            tenant = %ctx.tenant_id(),
            items = payload.item_count(),
            "released batch"
        );
        Ok(())
    }
}

struct LoggingObserver;

impl TelemetryObserver for LoggingObserver {
    fn record(&self, trigger: Trigger, items: u64, bytes: u64) {
        tracing::info!(%trigger, items, bytes, "telemetry record");
    }

    fn detailed(&self) -> bool {
        true
    }
}

fn trace_batch(n: usize) -> TraceData {
    TraceData(Grouped {
        resources: vec![ResourceGroup {
            resource_id: "demo-service".into(),
            scopes: vec![ScopeGroup {
                scope_id: "demo-scope".into(),
                items: (0..n)
                    .map(|i| Span {
                        trace_id: [i as u8; 16],
                        span_id: [i as u8; 8],
                        name: format!("span-{i}"),
                        attributes: Bytes::new(),
                    })
                    .collect(),
            }],
        }],
    })
}

fn metric_batch(n: usize) -> MetricData {
    MetricData(Grouped {
        resources: vec![ResourceGroup {
            resource_id: "demo-service".into(),
            scopes: vec![ScopeGroup {
                scope_id: "demo-scope".into(),
                items: (0..n)
                    .map(|i| DataPoint {
                        metric_name: "demo.requests".into(),
                        timestamp_unix_nano: i as u64,
                        value: Bytes::new(),
                    })
                    .collect(),
            }],
        }],
    })
}

fn log_batch(n: usize) -> LogData {
    LogData(Grouped {
        resources: vec![ResourceGroup {
            resource_id: "demo-service".into(),
            scopes: vec![ScopeGroup {
                scope_id: "demo-scope".into(),
                items: (0..n)
                    .map(|i| LogRecord {
                        timestamp_unix_nano: i as u64,
                        severity: 9,
                        body: Bytes::from(format!("log line {i}")),
                    })
                    .collect(),
            }],
        }],
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = BatchConfig::builder()
        .send_batch_size(50)
        .send_batch_max_size(50)
        .timeout(Duration::from_millis(500))
        .metadata_keys(["tenant"])
        .metadata_cardinality_limit(10)
        .build()
        .expect("demo config is valid");

    let stage = Stage::builder()
        .config(config)
        .trace_sink(Arc::new(LoggingSink { name: "traces" }))
        .metric_sink(Arc::new(LoggingSink { name: "metrics" }))
        .log_sink(Arc::new(LoggingSink { name: "logs" }))
        .observer(Arc::new(LoggingObserver))
        .build();

    let acme = RequestMetadata::new().insert("tenant", "acme");
    let globex = RequestMetadata::new().insert("tenant", "globex");

    for _ in 0..3 {
        stage.consume_traces(&acme, trace_batch(40)).await.expect("acme under limit");
        stage.consume_metrics(&globex, metric_batch(20)).await.expect("globex under limit");
        stage.consume_logs(&acme, log_batch(10)).await.expect("acme under limit");
    }

    tokio::time::sleep(Duration::from_millis(700)).await;

    tracing::info!(
        cardinality_traces = stage.cardinality_traces(),
        cardinality_metrics = stage.cardinality_metrics(),
        cardinality_logs = stage.cardinality_logs(),
        "shutting down"
    );

    stage.shutdown().await;
}
