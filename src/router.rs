//! Tenant router (C3): maps inbound request metadata to a worker's input
//! channel, creating workers on demand up to a configured cardinality
//! limit.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::context::{project, CanonicalTenantKey, ExportContext, RequestMetadata};
use crate::error::StageError;
use crate::signal::SignalPayload;
use crate::worker::WorkerShared;

/// Routes requests to per-tenant worker channels.
///
/// `Singleton` is used when no metadata keys are configured - there is
/// exactly one worker and `route` never fails. `Multi` shards by the
/// canonical metadata-value tuple, bounded by `metadata_cardinality_limit`.
pub enum Router<P: SignalPayload> {
    Singleton(mpsc::Sender<P>),
    Multi(MultiRouter<P>),
}

pub struct MultiRouter<P: SignalPayload> {
    metadata_keys: Vec<String>,
    cardinality_limit: usize,
    tenants: Mutex<HashMap<CanonicalTenantKey, mpsc::Sender<P>>>,
    cardinality: AtomicUsize,
}

impl<P: SignalPayload> Router<P> {
    pub fn singleton(shared: &Arc<WorkerShared<P>>) -> Self {
        let sender = crate::worker::spawn(shared.clone(), ExportContext::singleton());
        Router::Singleton(sender)
    }

    pub fn multi(metadata_keys: Vec<String>, cardinality_limit: usize) -> Self {
        Router::Multi(MultiRouter {
            metadata_keys,
            cardinality_limit,
            tenants: Mutex::new(HashMap::new()),
            cardinality: AtomicUsize::new(0),
        })
    }

    /// Resolve the worker channel for a request, creating a new worker if
    /// this is the first request from its tenant.
    pub fn route(
        &self,
        request: &RequestMetadata,
        shared: &Arc<WorkerShared<P>>,
    ) -> Result<mpsc::Sender<P>, StageError> {
        match self {
            Router::Singleton(sender) => Ok(sender.clone()),
            Router::Multi(multi) => multi.route(request, shared),
        }
    }

    pub fn cardinality(&self) -> usize {
        match self {
            Router::Singleton(_) => 1,
            Router::Multi(multi) => multi.cardinality.load(Ordering::Acquire),
        }
    }
}

impl<P: SignalPayload> MultiRouter<P> {
    fn route(&self, request: &RequestMetadata, shared: &Arc<WorkerShared<P>>) -> Result<mpsc::Sender<P>, StageError> {
        let (key, tenant_metadata) = project(&self.metadata_keys, request);

        let mut tenants = self.tenants.lock();
        if let Some(sender) = tenants.get(&key) {
            return Ok(sender.clone());
        }

        if self.cardinality_limit != 0 && tenants.len() >= self.cardinality_limit {
            return Err(StageError::TenantLimitExceeded);
        }

        let sender = crate::worker::spawn(shared.clone(), ExportContext::new(tenant_metadata));
        tenants.insert(key, sender.clone());
        self.cardinality.store(tenants.len(), Ordering::Release);
        Ok(sender)
    }
}
