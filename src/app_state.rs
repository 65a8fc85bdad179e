//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventTrace;
use crate::domain::models::builtin_schemas;
use crate::error::SignalsError;
use crate::persistence::{MemoryStore, Storage};
use crate::service::{HandlerRegistry, MutationGateway, SignalService, register_receivers};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Entity mutations and dispatch proofs.
    pub signal_service: Arc<SignalService>,
}

impl AppState {
    /// Wires an in-memory store, the built-in schemas, and the built-in
    /// receivers, then freezes the registry.
    ///
    /// # Errors
    ///
    /// Propagates receiver registration failures.
    pub fn in_memory(trace_capacity: usize) -> Result<Self, SignalsError> {
        let trace = Arc::new(EventTrace::new(trace_capacity));
        let registry = Arc::new(HandlerRegistry::new());
        register_receivers(&registry, &trace)?;
        registry.freeze();

        let gateway = Arc::new(MutationGateway::new(registry).with_schemas(builtin_schemas()));
        let storage: Arc<dyn Storage> = Arc::new(MemoryStore::new());
        Ok(Self {
            signal_service: Arc::new(SignalService::new(gateway, storage, trace)),
        })
    }
}
