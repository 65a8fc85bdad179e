//! Domain layer: entities, schemas, mutation events, and the trace fixture.
//!
//! Plain data and validation only; nothing here touches storage or
//! invokes handlers.

pub mod entity;
pub mod models;
pub mod rectangle;
pub mod record_id;
pub mod schema;
pub mod signal;
pub mod trace;

pub use entity::{Entity, EntityKind, Fields};
pub use record_id::RecordId;
pub use schema::{EntitySchema, FieldSpec, FieldType};
pub use signal::{EventKind, SignalEvent};
pub use trace::{EventTrace, ThreadToken, TraceEntry};
