//! Shared agent state: GPU source, latest serialized snapshot, client tracking.

use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Notify};

use crate::gpu::GpuSource;

pub type SharedSource = Arc<Mutex<GpuSource>>;

#[derive(Clone)]
pub struct AppState {
    pub source: SharedSource,

    // Latest snapshot JSON; every connected socket pushes each new value
    pub snapshots: Arc<watch::Sender<Option<Arc<str>>>>,

    // Adaptive sampling controls
    pub client_count: Arc<AtomicUsize>,
    pub wake_sampler: Arc<Notify>,
}

impl AppState {
    pub fn new(source: GpuSource) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            source: Arc::new(Mutex::new(source)),
            snapshots: Arc::new(tx),
            client_count: Arc::new(AtomicUsize::new(0)),
            wake_sampler: Arc::new(Notify::new()),
        }
    }
}
