//! Receivers wired into the registry at startup.

use std::sync::Arc;

use super::dispatcher::HandlerContext;
use super::handler_registry::{HandlerRegistry, SignalHandler};
use crate::domain::models::{TRANSACTION_PROOF, TRIGGER};
use crate::domain::{EventKind, EventTrace, Fields, SignalEvent};
use crate::error::SignalsError;

/// Marker the proof receiver appends to the trace when it runs.
pub const RECEIVER_RAN: &str = "receiver_ran";

/// Reacts to `trigger` creation by tracing itself and writing one
/// `transaction_proof` row in the caller's unit of work.
#[derive(Debug)]
pub struct ProofReceiver {
    trace: Arc<EventTrace>,
}

impl ProofReceiver {
    /// Creates a receiver appending to `trace`.
    #[must_use]
    pub fn new(trace: Arc<EventTrace>) -> Self {
        Self { trace }
    }
}

impl SignalHandler for ProofReceiver {
    fn name(&self) -> &str {
        "proof_receiver"
    }

    fn handle(
        &self,
        event: &SignalEvent<'_>,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<(), SignalsError> {
        self.trace.append(RECEIVER_RAN);
        let proof = ctx.create(TRANSACTION_PROOF, Fields::new())?;
        tracing::debug!(trigger = %event.entity.id, proof = %proof.id, "proof recorded");
        Ok(())
    }
}

/// Registers every built-in receiver.
///
/// # Errors
///
/// Propagates [`HandlerRegistry::register`] failures.
pub fn register_receivers(
    registry: &HandlerRegistry,
    trace: &Arc<EventTrace>,
) -> Result<(), SignalsError> {
    registry.register(
        TRIGGER,
        EventKind::PostCreate,
        Arc::new(ProofReceiver::new(Arc::clone(trace))),
    )
}
