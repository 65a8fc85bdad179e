//! Synchronous, fail-fast event dispatch.
//!
//! [`EventDispatcher::dispatch`] runs every handler registered for an
//! event, in registration order, on the calling thread, and returns only
//! after the last one finishes or the first one fails.

use std::sync::Arc;

use super::gateway::MutationGateway;
use super::handler_registry::HandlerRegistry;
use super::transaction::TransactionContext;
use crate::domain::{Entity, EntityKind, Fields, RecordId, SignalEvent};
use crate::error::SignalsError;
use crate::persistence::{Criteria, TxHandle};

/// What a handler may touch while it runs.
///
/// Every operation is routed through the same [`TransactionContext`] as
/// the mutation being dispatched, so handler writes commit or roll back
/// together with it. Mutations made here dispatch their own events.
#[derive(Debug)]
pub struct HandlerContext<'a> {
    gateway: &'a MutationGateway,
    tx: &'a mut TransactionContext,
}

impl<'a> HandlerContext<'a> {
    /// Binds a gateway to the caller's transaction context.
    pub fn new(gateway: &'a MutationGateway, tx: &'a mut TransactionContext) -> Self {
        Self { gateway, tx }
    }

    /// The ambient transaction handle.
    #[must_use]
    pub fn ambient(&self) -> Option<TxHandle> {
        self.tx.ambient()
    }

    /// Creates an entity in the current unit of work.
    ///
    /// # Errors
    ///
    /// See [`MutationGateway::create`].
    pub fn create(
        &mut self,
        kind: impl Into<EntityKind>,
        fields: Fields,
    ) -> Result<Entity, SignalsError> {
        self.gateway.create(self.tx, kind, fields)
    }

    /// Updates an entity in the current unit of work.
    ///
    /// # Errors
    ///
    /// See [`MutationGateway::update`].
    pub fn update(
        &mut self,
        kind: impl Into<EntityKind>,
        id: RecordId,
        fields: Fields,
    ) -> Result<Entity, SignalsError> {
        self.gateway.update(self.tx, kind, id, fields)
    }

    /// Deletes an entity in the current unit of work.
    ///
    /// # Errors
    ///
    /// See [`MutationGateway::delete`].
    pub fn delete(
        &mut self,
        kind: impl Into<EntityKind>,
        id: RecordId,
    ) -> Result<Entity, SignalsError> {
        self.gateway.delete(self.tx, kind, id)
    }

    /// Reads rows as seen by the current unit of work.
    ///
    /// # Errors
    ///
    /// See [`TransactionContext::query`].
    pub fn query(&self, criteria: &Criteria) -> Result<Vec<Entity>, SignalsError> {
        self.tx.query(criteria)
    }

    /// Counts rows as seen by the current unit of work.
    ///
    /// # Errors
    ///
    /// See [`TransactionContext::count`].
    pub fn count(&self, criteria: &Criteria) -> Result<usize, SignalsError> {
        self.tx.count(criteria)
    }
}

/// Resolves handlers from the registry and invokes them in order.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    registry: Arc<HandlerRegistry>,
}

impl EventDispatcher {
    /// Creates a dispatcher over `registry`.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self { registry }
    }

    /// The registry handlers are resolved from.
    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Invokes every handler registered for the event, stopping at the
    /// first failure.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::Handler`] naming the first handler that
    /// failed, with its error as the source. Handlers after it are not
    /// invoked. A handler that returns `Ok` but leaves `event.tx` closed or
    /// no longer ambient counts as failed.
    pub fn dispatch(
        &self,
        event: &SignalEvent<'_>,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<(), SignalsError> {
        let handlers = self.registry.lookup(event.entity_kind, event.event_kind);
        for (position, handler) in handlers.iter().enumerate() {
            tracing::debug!(
                handler = handler.name(),
                position,
                entity_kind = %event.entity_kind,
                event_kind = %event.event_kind,
                entity_id = %event.entity.id,
                tx = %event.tx,
                "dispatching"
            );
            let outcome = handler.handle(event, ctx).and_then(|()| {
                ctx.tx
                    .expect_ambient(event.tx)
                    .map_err(SignalsError::from)
            });
            if let Err(source) = outcome {
                tracing::warn!(
                    handler = handler.name(),
                    skipped = handlers.len().saturating_sub(position + 1),
                    error = %source,
                    "handler failed; dispatch aborted"
                );
                return Err(SignalsError::Handler {
                    handler: handler.name().to_string(),
                    source: Box::new(source),
                });
            }
        }
        Ok(())
    }
}
