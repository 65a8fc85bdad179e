//! Mutation events delivered to registered handlers.

use std::fmt;

use serde::Serialize;

use super::{Entity, EntityKind};
use crate::persistence::TxHandle;

/// Lifecycle point at which handlers are notified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new entity was written.
    PostCreate,
    /// An existing entity was rewritten.
    PostUpdate,
    /// An entity was deleted.
    PostDelete,
}

impl EventKind {
    /// Returns the event kind as a static string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PostCreate => "post_create",
            Self::PostUpdate => "post_update",
            Self::PostDelete => "post_delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload handed to each handler during dispatch.
///
/// `tx` is the handle that was ambient when the mutation ran; everything
/// a handler writes is attributed to it.
#[derive(Debug, Clone, Copy)]
pub struct SignalEvent<'a> {
    /// Kind of the mutated entity.
    pub entity_kind: &'a EntityKind,
    /// What happened to it.
    pub event_kind: EventKind,
    /// The entity as stored by the mutation.
    pub entity: &'a Entity,
    /// Unit of work the mutation belongs to.
    pub tx: TxHandle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_names() {
        assert_eq!(EventKind::PostCreate.to_string(), "post_create");
        assert_eq!(EventKind::PostUpdate.as_str(), "post_update");
        assert_eq!(
            serde_json::to_string(&EventKind::PostDelete).unwrap_or_default(),
            "\"post_delete\""
        );
    }
}
