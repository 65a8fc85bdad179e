//! Entity request and response bodies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Entity, Fields};

/// Field values for a new entity, keyed by field name.
///
/// ```json
/// { "name": "my trigger" }
/// ```
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct CreateEntityRequest(pub Fields);

/// Committed entities of one kind.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EntityListResponse {
    /// Entity kind that was listed.
    pub kind: String,
    /// Number of entities returned.
    pub total: usize,
    /// Entities, oldest first.
    pub entities: Vec<Entity>,
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use serde_json::{Value, json};
    use utoipa::PartialSchema;

    use super::*;

    #[test]
    fn create_request_is_documented_as_a_plain_object() {
        let schema = serde_json::to_value(CreateEntityRequest::schema()).unwrap_or(Value::Null);
        assert_eq!(schema.get("type"), Some(&json!("object")));
    }

    #[test]
    fn create_request_reads_a_bare_field_map() {
        let parsed: Result<CreateEntityRequest, _> =
            serde_json::from_value(json!({"name": "my trigger"}));
        let Ok(CreateEntityRequest(fields)) = parsed else {
            panic!("field map should parse");
        };
        assert_eq!(fields.get("name"), Some(&json!("my trigger")));
    }
}
