//! Built-in entity kinds used by the proof endpoints.

use serde_json::json;

use super::schema::{EntitySchema, FieldSpec, FieldType};

/// Kind of the entity whose creation triggers the proof receiver.
pub const TRIGGER: &str = "trigger";

/// Kind of the side-effect record written by the proof receiver.
pub const TRANSACTION_PROOF: &str = "transaction_proof";

/// `trigger { name: text(100) }`
#[must_use]
pub fn trigger_schema() -> EntitySchema {
    EntitySchema::new(TRIGGER).field(FieldSpec::required(
        "name",
        FieldType::Text { max_len: 100 },
    ))
}

/// `transaction_proof { created_by_signal: bool = true }`
#[must_use]
pub fn transaction_proof_schema() -> EntitySchema {
    EntitySchema::new(TRANSACTION_PROOF).field(FieldSpec::with_default(
        "created_by_signal",
        FieldType::Boolean,
        json!(true),
    ))
}

/// All built-in schemas.
#[must_use]
pub fn builtin_schemas() -> Vec<EntitySchema> {
    vec![trigger_schema(), transaction_proof_schema()]
}
