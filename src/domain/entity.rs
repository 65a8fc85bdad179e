//! Persisted domain records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RecordId;

/// Field name to JSON value, ordered by name.
pub type Fields = BTreeMap<String, serde_json::Value>;

/// Name of an entity kind (the "table"), e.g. `"trigger"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct EntityKind(String);

impl EntityKind {
    /// Creates a kind from its name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the kind name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityKind {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// A persisted record with an identity and validated domain fields.
///
/// The store builds these when a write lands; handlers observe them
/// through the dispatched event and never mutate them in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Entity {
    /// Identity assigned by the store on first write.
    pub id: RecordId,
    /// Entity kind.
    pub kind: EntityKind,
    /// Validated field values.
    #[schema(value_type = Object)]
    pub fields: Fields,
    /// First persist timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Entity {
    /// Returns the value of a field, if set.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&serde_json::Value> {
        self.fields.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_displays_its_name() {
        assert_eq!(EntityKind::new("trigger").to_string(), "trigger");
    }

    #[test]
    fn field_lookup() {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), serde_json::json!("X"));
        let now = Utc::now();
        let entity = Entity {
            id: RecordId::generate(),
            kind: EntityKind::from("trigger"),
            fields,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(entity.field("name"), Some(&serde_json::json!("X")));
        assert_eq!(entity.field("missing"), None);
    }
}
