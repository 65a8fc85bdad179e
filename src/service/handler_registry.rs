//! Ordered handler registrations keyed by entity kind and event kind.
//!
//! The registry is populated once at startup and then frozen; during
//! normal operation it is only read. [`HandlerRegistry::reset`] exists so
//! test harnesses can start each scenario from a clean slate.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::dispatcher::HandlerContext;
use crate::domain::{EntityKind, EventKind, SignalEvent};
use crate::error::SignalsError;

/// A receiver invoked synchronously when a matching mutation happens.
///
/// Handlers run on the caller's thread, inside the caller's unit of
/// work. Anything they write goes through `ctx` and is undone if that
/// unit of work rolls back. Returning `Err` stops dispatch and dooms the
/// unit of work.
pub trait SignalHandler: Send + Sync + fmt::Debug {
    /// Name reported in logs and in [`SignalsError::Handler`].
    fn name(&self) -> &str;

    /// Reacts to `event`.
    ///
    /// # Errors
    ///
    /// Any error aborts the remaining handlers for this event.
    fn handle(&self, event: &SignalEvent<'_>, ctx: &mut HandlerContext<'_>)
    -> Result<(), SignalsError>;
}

/// Adapts a closure into a named [`SignalHandler`].
pub struct FnHandler<F> {
    name: String,
    func: F,
}

impl<F> FnHandler<F> {
    /// Wraps `func` under `name`.
    pub fn new(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&SignalEvent<'_>, &mut HandlerContext<'_>) -> Result<(), SignalsError> + Send + Sync,
    {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

impl<F> SignalHandler for FnHandler<F>
where
    F: Fn(&SignalEvent<'_>, &mut HandlerContext<'_>) -> Result<(), SignalsError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(
        &self,
        event: &SignalEvent<'_>,
        ctx: &mut HandlerContext<'_>,
    ) -> Result<(), SignalsError> {
        (self.func)(event, ctx)
    }
}

type RegistrationKey = (EntityKind, EventKind);

#[derive(Debug, Default)]
struct Registrations {
    handlers: HashMap<RegistrationKey, Vec<Arc<dyn SignalHandler>>>,
    frozen: bool,
}

/// Registry of handlers per `(entity kind, event kind)`.
///
/// Handlers for a key are kept in registration order. The same handler
/// (by `Arc` identity) may be registered at most once per key.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    inner: RwLock<Registrations>,
}

impl HandlerRegistry {
    /// Creates an empty, unfrozen registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the sequence for `(entity_kind, event_kind)`.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::RegistryFrozen`] after [`Self::freeze`], or
    /// [`SignalsError::DuplicateHandler`] if this exact handler is already
    /// registered for the key; the registry is left unchanged.
    pub fn register(
        &self,
        entity_kind: impl Into<EntityKind>,
        event_kind: EventKind,
        handler: Arc<dyn SignalHandler>,
    ) -> Result<(), SignalsError> {
        let entity_kind = entity_kind.into();
        let mut inner = self.inner.write();
        if inner.frozen {
            return Err(SignalsError::RegistryFrozen(handler.name().to_string()));
        }
        let handlers = inner
            .handlers
            .entry((entity_kind.clone(), event_kind))
            .or_default();
        if handlers.iter().any(|existing| same_handler(existing, &handler)) {
            return Err(SignalsError::DuplicateHandler {
                handler: handler.name().to_string(),
                entity_kind,
                event_kind,
            });
        }
        tracing::debug!(
            handler = handler.name(),
            %entity_kind,
            %event_kind,
            position = handlers.len(),
            "handler registered"
        );
        handlers.push(handler);
        Ok(())
    }

    /// Handlers for the key, in registration order. Empty if none.
    #[must_use]
    pub fn lookup(
        &self,
        entity_kind: &EntityKind,
        event_kind: EventKind,
    ) -> Vec<Arc<dyn SignalHandler>> {
        self.inner
            .read()
            .handlers
            .get(&(entity_kind.clone(), event_kind))
            .cloned()
            .unwrap_or_default()
    }

    /// Refuses further registrations.
    pub fn freeze(&self) {
        self.inner.write().frozen = true;
    }

    /// Returns `true` once [`Self::freeze`] has been called.
    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.inner.read().frozen
    }

    /// Total number of registrations across all keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().handlers.values().map(Vec::len).sum()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every registration and unfreezes the registry.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.handlers.clear();
        inner.frozen = false;
    }
}

fn same_handler(a: &Arc<dyn SignalHandler>, b: &Arc<dyn SignalHandler>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str) -> Arc<dyn SignalHandler> {
        Arc::new(FnHandler::new(name, |_event, _ctx| Ok(())))
    }

    fn names(handlers: &[Arc<dyn SignalHandler>]) -> Vec<String> {
        handlers.iter().map(|h| h.name().to_string()).collect()
    }

    #[test]
    fn lookup_preserves_registration_order() {
        let registry = HandlerRegistry::new();
        assert!(registry.register("trigger", EventKind::PostCreate, noop("first")).is_ok());
        assert!(registry.register("trigger", EventKind::PostCreate, noop("second")).is_ok());
        assert!(registry.register("trigger", EventKind::PostUpdate, noop("other")).is_ok());

        let found = registry.lookup(&EntityKind::from("trigger"), EventKind::PostCreate);
        assert_eq!(names(&found), vec!["first", "second"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn lookup_without_registrations_is_empty() {
        let registry = HandlerRegistry::new();
        assert!(registry
            .lookup(&EntityKind::from("nothing"), EventKind::PostCreate)
            .is_empty());
    }

    #[test]
    fn duplicate_handler_is_rejected() {
        let registry = HandlerRegistry::new();
        let handler = noop("once");
        assert!(registry
            .register("trigger", EventKind::PostCreate, Arc::clone(&handler))
            .is_ok());
        let second = registry.register("trigger", EventKind::PostCreate, Arc::clone(&handler));
        assert!(matches!(
            second,
            Err(SignalsError::DuplicateHandler { ref handler, .. }) if handler == "once"
        ));
        assert_eq!(registry.len(), 1);

        // Same handler under a different key is a distinct registration.
        assert!(registry
            .register("trigger", EventKind::PostDelete, Arc::clone(&handler))
            .is_ok());
        // Equal name, different instance: not a duplicate.
        assert!(registry.register("trigger", EventKind::PostCreate, noop("once")).is_ok());
    }

    #[test]
    fn frozen_registry_refuses_registration_until_reset() {
        let registry = HandlerRegistry::new();
        registry.freeze();
        assert!(registry.is_frozen());
        assert!(matches!(
            registry.register("trigger", EventKind::PostCreate, noop("late")),
            Err(SignalsError::RegistryFrozen(_))
        ));

        registry.reset();
        assert!(!registry.is_frozen());
        assert!(registry.register("trigger", EventKind::PostCreate, noop("late")).is_ok());
    }

    #[test]
    fn reset_clears_registrations() {
        let registry = HandlerRegistry::new();
        assert!(registry.register("trigger", EventKind::PostCreate, noop("a")).is_ok());
        registry.reset();
        assert!(registry.is_empty());
    }
}
