//! Mutation gateway: the single entry point that writes domain entities.
//!
//! Every mutation follows the same pattern: validate → write under the
//! ambient handle → dispatch the matching event synchronously → return.
//! When no handle is ambient the whole sequence runs in an implicit
//! transaction. A failed write or a failed dispatch marks the handle
//! rollback-only before the error is returned, so the unit of work can
//! never be committed afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use super::dispatcher::{EventDispatcher, HandlerContext};
use super::handler_registry::HandlerRegistry;
use super::transaction::TransactionContext;
use crate::domain::{Entity, EntityKind, EntitySchema, EventKind, Fields, RecordId, SignalEvent};
use crate::error::SignalsError;
use crate::persistence::{Criteria, TxHandle, WriteRecord};

/// Validates, persists, and dispatches entity mutations.
///
/// Stateless apart from its schemas and dispatcher; the unit of work is
/// always the caller's [`TransactionContext`].
#[derive(Debug, Clone)]
pub struct MutationGateway {
    schemas: HashMap<EntityKind, EntitySchema>,
    dispatcher: EventDispatcher,
}

impl MutationGateway {
    /// Creates a gateway with no schemas, dispatching through `registry`.
    #[must_use]
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            schemas: HashMap::new(),
            dispatcher: EventDispatcher::new(registry),
        }
    }

    /// Adds a schema, replacing any previous one for the same kind.
    #[must_use]
    pub fn with_schema(mut self, schema: EntitySchema) -> Self {
        self.schemas.insert(schema.kind.clone(), schema);
        self
    }

    /// Adds several schemas.
    #[must_use]
    pub fn with_schemas(self, schemas: impl IntoIterator<Item = EntitySchema>) -> Self {
        schemas.into_iter().fold(self, Self::with_schema)
    }

    /// The registry handlers are resolved from.
    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        self.dispatcher.registry()
    }

    /// Schema for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::UnknownEntityKind`] if none is registered.
    pub fn schema(&self, kind: &EntityKind) -> Result<&EntitySchema, SignalsError> {
        self.schemas
            .get(kind)
            .ok_or_else(|| SignalsError::UnknownEntityKind(kind.clone()))
    }

    /// Creates an entity and dispatches `post_create` before returning.
    ///
    /// # Errors
    ///
    /// - [`SignalsError::UnknownEntityKind`] / [`SignalsError::Validation`]
    ///   for bad input; the transaction is untouched.
    /// - [`SignalsError::Storage`] if the write fails, or
    ///   [`SignalsError::Handler`] if a handler fails; the ambient handle
    ///   is marked rollback-only in both cases.
    /// - [`SignalsError::Transaction`] if the ambient handle is already
    ///   rollback-only.
    pub fn create(
        &self,
        ctx: &mut TransactionContext,
        kind: impl Into<EntityKind>,
        fields: Fields,
    ) -> Result<Entity, SignalsError> {
        let kind = kind.into();
        let fields = self.schema(&kind)?.validate_new(&fields)?;
        let entity = self.apply(ctx, EventKind::PostCreate, |ctx| {
            ctx.write(WriteRecord::Insert { kind, fields })
        })?;
        tracing::info!(entity_kind = %entity.kind, id = %entity.id, "entity created");
        Ok(entity)
    }

    /// Overwrites the given fields of an entity and dispatches
    /// `post_update` before returning.
    ///
    /// # Errors
    ///
    /// As [`Self::create`], plus [`SignalsError::NotFound`] if no entity
    /// with `id` is visible; that case leaves the transaction untouched.
    pub fn update(
        &self,
        ctx: &mut TransactionContext,
        kind: impl Into<EntityKind>,
        id: RecordId,
        fields: Fields,
    ) -> Result<Entity, SignalsError> {
        let kind = kind.into();
        let fields = self.schema(&kind)?.validate_partial(&fields)?;
        require_existing(ctx, &kind, id)?;
        let entity = self.apply(ctx, EventKind::PostUpdate, |ctx| {
            ctx.write(WriteRecord::Update { kind, id, fields })
        })?;
        tracing::info!(entity_kind = %entity.kind, id = %entity.id, "entity updated");
        Ok(entity)
    }

    /// Deletes an entity and dispatches `post_delete` before returning.
    ///
    /// # Errors
    ///
    /// As [`Self::update`].
    pub fn delete(
        &self,
        ctx: &mut TransactionContext,
        kind: impl Into<EntityKind>,
        id: RecordId,
    ) -> Result<Entity, SignalsError> {
        let kind = kind.into();
        self.schema(&kind)?;
        require_existing(ctx, &kind, id)?;
        let entity = self.apply(ctx, EventKind::PostDelete, |ctx| {
            ctx.delete(&Criteria::id(kind.clone(), id))?
                .into_iter()
                .next()
                .ok_or(SignalsError::NotFound { kind, id })
        })?;
        tracing::info!(entity_kind = %entity.kind, id = %entity.id, "entity deleted");
        Ok(entity)
    }

    /// Runs `write` under the ambient handle and dispatches `event_kind`
    /// for the written entity, opening an implicit transaction if needed.
    fn apply<F>(
        &self,
        ctx: &mut TransactionContext,
        event_kind: EventKind,
        write: F,
    ) -> Result<Entity, SignalsError>
    where
        F: FnOnce(&mut TransactionContext) -> Result<Entity, SignalsError>,
    {
        let Some(handle) = ctx.ambient() else {
            return ctx.atomic(|ctx| self.apply(ctx, event_kind, write));
        };

        let entity = match write(ctx) {
            Ok(entity) => entity,
            Err(err) => {
                doom(ctx, handle, &err);
                return Err(err);
            }
        };

        let event = SignalEvent {
            entity_kind: &entity.kind,
            event_kind,
            entity: &entity,
            tx: handle,
        };
        let dispatched = self
            .dispatcher
            .dispatch(&event, &mut HandlerContext::new(self, ctx));
        if let Err(err) = dispatched {
            doom(ctx, handle, &err);
            return Err(err);
        }
        Ok(entity)
    }
}

fn require_existing(
    ctx: &TransactionContext,
    kind: &EntityKind,
    id: RecordId,
) -> Result<(), SignalsError> {
    if ctx.count(&Criteria::id(kind.clone(), id))? == 0 {
        return Err(SignalsError::NotFound {
            kind: kind.clone(),
            id,
        });
    }
    Ok(())
}

fn doom(ctx: &mut TransactionContext, handle: TxHandle, cause: &SignalsError) {
    tracing::warn!(tx = %handle, error = %cause, "mutation failed");
    if let Err(err) = ctx.mark_rollback_only(handle) {
        tracing::error!(tx = %handle, error = %err, "could not mark transaction rollback-only");
    }
}
