//! In-memory collaborators for pipeline tests
#![allow(dead_code)]

use async_trait::async_trait;
use idempotent_consumer::{DedupError, DedupResult, DedupStore};
use inbound_event_service::error::{DownstreamFailure, ProcessingError, PublishError};
use inbound_event_service::services::{DownstreamGateway, EventProcessor, OutboundPublisher};
use resilience::RecoveryHook;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Barrier;

/// Dedup store whose conditional insert is atomic under the set's lock
#[derive(Default)]
pub struct InMemoryDedupStore {
    ids: Mutex<HashSet<String>>,
    pub exists_calls: AtomicUsize,
    pub inserted: AtomicUsize,
    pub conflicts: AtomicUsize,
}

impl InMemoryDedupStore {
    pub fn contains(&self, event_id: &str) -> bool {
        self.ids.lock().unwrap().contains(event_id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap().len()
    }
}

#[async_trait]
impl DedupStore for InMemoryDedupStore {
    async fn exists(&self, event_id: &str) -> DedupResult<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.contains(event_id))
    }

    async fn record_if_absent(&self, event_id: &str) -> DedupResult<()> {
        if self.ids.lock().unwrap().insert(event_id.to_string()) {
            self.inserted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        } else {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
            Err(DedupError::AlreadyExists(event_id.to_string()))
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum GatewayBehavior {
    Succeed,
    Retryable,
    Fatal,
}

/// Gateway with a fixed answer, optionally held at a barrier before answering
pub struct ScriptedGateway {
    behavior: GatewayBehavior,
    barrier: Option<Arc<Barrier>>,
    pub calls: AtomicUsize,
    pub keys: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn new(behavior: GatewayBehavior) -> Self {
        Self {
            behavior,
            barrier: None,
            calls: AtomicUsize::new(0),
            keys: Mutex::new(Vec::new()),
        }
    }

    /// Every call waits until `barrier` is released
    pub fn blocking_on(mut self, barrier: Arc<Barrier>) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownstreamGateway for ScriptedGateway {
    async fn invoke(&self, key: &str) -> Result<(), DownstreamFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.keys.lock().unwrap().push(key.to_string());

        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }

        match self.behavior {
            GatewayBehavior::Succeed => Ok(()),
            GatewayBehavior::Retryable => Err(DownstreamFailure::Retryable(anyhow::anyhow!(
                "Thirdparty api returned status 503"
            ))),
            GatewayBehavior::Fatal => Err(DownstreamFailure::Fatal(anyhow::anyhow!(
                "Thirdparty api returned status 404"
            ))),
        }
    }
}

/// Publisher that keeps every `(key, payload)` it is handed
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<(String, String)>>,
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboundPublisher for RecordingPublisher {
    async fn publish(&self, key: &str, payload: &str) -> Result<(), PublishError> {
        self.published
            .lock()
            .unwrap()
            .push((key.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Recovery hook counting how often it fired
#[derive(Clone, Default)]
pub struct CountingHook {
    pub fired: Arc<AtomicUsize>,
    pub last_error: Arc<Mutex<Option<String>>>,
}

impl RecoveryHook<ProcessingError> for CountingHook {
    fn recover(&self, _attempts: u32, last_error: ProcessingError) {
        self.fired.fetch_add(1, Ordering::SeqCst);
        *self.last_error.lock().unwrap() = Some(last_error.to_string());
    }
}

pub type TestProcessor = EventProcessor<InMemoryDedupStore, ScriptedGateway, RecordingPublisher>;

pub struct Harness {
    pub store: Arc<InMemoryDedupStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub publisher: Arc<RecordingPublisher>,
    pub processor: TestProcessor,
}

impl Harness {
    pub fn new(gateway: ScriptedGateway) -> Self {
        let store = Arc::new(InMemoryDedupStore::default());
        let gateway = Arc::new(gateway);
        let publisher = Arc::new(RecordingPublisher::default());
        let processor = EventProcessor::new(store.clone(), gateway.clone(), publisher.clone());

        Self {
            store,
            gateway,
            publisher,
            processor,
        }
    }
}
