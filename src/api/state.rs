//! Shared state injected into every HTTP handler.

use std::sync::Arc;

use crate::metrics::EngineMetrics;
use crate::store::ExecutionStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ExecutionStore>,
    pub metrics: Arc<EngineMetrics>,
}

impl AppState {
    pub fn new(store: Arc<dyn ExecutionStore>, metrics: Arc<EngineMetrics>) -> Self {
        Self { store, metrics }
    }
}
