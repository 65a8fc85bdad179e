//! Write and query shapes exchanged with a storage engine.

use serde_json::Value;

use crate::domain::{Entity, EntityKind, Fields, RecordId};

/// A single-row write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRecord {
    /// New row; the engine assigns its identity.
    Insert {
        /// Kind of the new row.
        kind: EntityKind,
        /// Validated field values.
        fields: Fields,
    },
    /// Existing row; `fields` are merged over the stored values.
    Update {
        /// Kind of the row.
        kind: EntityKind,
        /// Identity of the row.
        id: RecordId,
        /// Validated field values to overwrite.
        fields: Fields,
    },
}

/// Row selector: one kind, optionally one identity, plus field equalities.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    /// Kind to search.
    pub kind: EntityKind,
    /// Restrict to a single identity.
    pub id: Option<RecordId>,
    /// Every pair must equal the stored field value.
    pub filters: Vec<(String, Value)>,
}

impl Criteria {
    /// Matches every row of `kind`.
    #[must_use]
    pub fn kind(kind: impl Into<EntityKind>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            filters: Vec::new(),
        }
    }

    /// Matches the single row of `kind` with identity `id`.
    #[must_use]
    pub fn id(kind: impl Into<EntityKind>, id: RecordId) -> Self {
        Self {
            id: Some(id),
            ..Self::kind(kind)
        }
    }

    /// Adds a field equality filter.
    #[must_use]
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    /// Returns `true` if `entity` satisfies every condition.
    #[must_use]
    pub fn matches(&self, entity: &Entity) -> bool {
        entity.kind == self.kind
            && self.id.is_none_or(|id| id == entity.id)
            && self
                .filters
                .iter()
                .all(|(field, value)| entity.field(field) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn entity(kind: &str, name: &str) -> Entity {
        let mut fields = Fields::new();
        fields.insert("name".to_string(), json!(name));
        let now = Utc::now();
        Entity {
            id: RecordId::generate(),
            kind: EntityKind::from(kind),
            fields,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn kind_only_matches_every_row_of_kind() {
        let criteria = Criteria::kind("trigger");
        assert!(criteria.matches(&entity("trigger", "a")));
        assert!(!criteria.matches(&entity("transaction_proof", "a")));
    }

    #[test]
    fn field_filters_must_all_hold() {
        let criteria = Criteria::kind("trigger").eq("name", "X");
        assert!(criteria.matches(&entity("trigger", "X")));
        assert!(!criteria.matches(&entity("trigger", "Y")));
        assert!(!Criteria::kind("trigger").eq("missing", 1).matches(&entity("trigger", "X")));
    }

    #[test]
    fn id_restricts_to_one_row() {
        let row = entity("trigger", "X");
        assert!(Criteria::id("trigger", row.id).matches(&row));
        assert!(!Criteria::id("trigger", RecordId::generate()).matches(&row));
    }
}
