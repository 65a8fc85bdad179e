//! Entity schemas and field validation.
//!
//! Every entity kind the gateway accepts is described by an
//! [`EntitySchema`]. Validation happens before any storage access, so a
//! [`SignalsError::Validation`] never leaves a transaction side effect.

use serde_json::Value;

use super::{EntityKind, Fields};
use crate::error::SignalsError;

/// Value type of a single schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// UTF-8 string of at most `max_len` characters.
    Text {
        /// Maximum length in characters.
        max_len: usize,
    },
    /// JSON boolean.
    Boolean,
    /// JSON integer representable as `i64`.
    Integer,
}

impl FieldType {
    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Text { max_len } => value
                .as_str()
                .is_some_and(|s| s.chars().count() <= *max_len),
            Self::Boolean => value.is_boolean(),
            Self::Integer => value.as_i64().is_some(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Text { max_len } => format!("text (max {max_len} chars)"),
            Self::Boolean => "boolean".to_string(),
            Self::Integer => "integer".to_string(),
        }
    }
}

/// Declaration of one field of an entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Field name.
    pub name: String,
    /// Accepted value type.
    pub field_type: FieldType,
    /// Value used on create when the caller omits the field. `None`
    /// makes the field required.
    pub default: Option<Value>,
}

impl FieldSpec {
    /// A required field.
    #[must_use]
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: None,
        }
    }

    /// An optional field filled with `default` when omitted on create.
    #[must_use]
    pub fn with_default(name: impl Into<String>, field_type: FieldType, default: Value) -> Self {
        Self {
            name: name.into(),
            field_type,
            default: Some(default),
        }
    }
}

/// Shape of one entity kind.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySchema {
    /// Kind this schema describes.
    pub kind: EntityKind,
    /// Declared fields.
    pub fields: Vec<FieldSpec>,
}

impl EntitySchema {
    /// Creates an empty schema for `kind`.
    #[must_use]
    pub fn new(kind: impl Into<EntityKind>) -> Self {
        Self {
            kind: kind.into(),
            fields: Vec::new(),
        }
    }

    /// Adds a field declaration.
    #[must_use]
    pub fn field(mut self, spec: FieldSpec) -> Self {
        self.fields.push(spec);
        self
    }

    fn spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Validates a complete field set for a create, filling defaults.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::Validation`] on an unknown field, a value of
    /// the wrong type, or a missing required field.
    pub fn validate_new(&self, input: &Fields) -> Result<Fields, SignalsError> {
        let mut validated = self.validate_partial(input)?;
        for spec in &self.fields {
            if validated.contains_key(&spec.name) {
                continue;
            }
            let Some(default) = &spec.default else {
                return Err(SignalsError::Validation(format!(
                    "missing required field `{}` for `{}`",
                    spec.name, self.kind
                )));
            };
            validated.insert(spec.name.clone(), default.clone());
        }
        Ok(validated)
    }

    /// Validates only the supplied fields, as for a partial update.
    ///
    /// # Errors
    ///
    /// Returns [`SignalsError::Validation`] on an unknown field or a value
    /// of the wrong type.
    pub fn validate_partial(&self, input: &Fields) -> Result<Fields, SignalsError> {
        let mut validated = Fields::new();
        for (name, value) in input {
            let spec = self.spec(name).ok_or_else(|| {
                SignalsError::Validation(format!("unknown field `{name}` for `{}`", self.kind))
            })?;
            if !spec.field_type.accepts(value) {
                return Err(SignalsError::Validation(format!(
                    "field `{name}` of `{}` must be {}, got {value}",
                    self.kind,
                    spec.field_type.describe()
                )));
            }
            validated.insert(name.clone(), value.clone());
        }
        Ok(validated)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema() -> EntitySchema {
        EntitySchema::new("sample")
            .field(FieldSpec::required("name", FieldType::Text { max_len: 5 }))
            .field(FieldSpec::with_default("flag", FieldType::Boolean, json!(true)))
            .field(FieldSpec::with_default("count", FieldType::Integer, json!(0)))
    }

    fn fields(value: Value) -> Fields {
        serde_json::from_value(value).unwrap_or_default()
    }

    #[test]
    fn fills_defaults_on_create() {
        let result = schema().validate_new(&fields(json!({"name": "abc"})));
        assert_eq!(
            result.ok(),
            Some(fields(json!({"name": "abc", "flag": true, "count": 0})))
        );
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let result = schema().validate_new(&fields(json!({"flag": false})));
        assert!(matches!(result, Err(SignalsError::Validation(msg)) if msg.contains("`name`")));
    }

    #[test]
    fn wrong_type_is_rejected() {
        let result = schema().validate_new(&fields(json!({"name": 42})));
        assert!(matches!(result, Err(SignalsError::Validation(_))));

        let result = schema().validate_new(&fields(json!({"name": "a", "count": "1"})));
        assert!(matches!(result, Err(SignalsError::Validation(_))));
    }

    #[test]
    fn text_longer_than_max_is_rejected() {
        let result = schema().validate_new(&fields(json!({"name": "abcdef"})));
        assert!(matches!(result, Err(SignalsError::Validation(_))));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let result = schema().validate_partial(&fields(json!({"colour": "red"})));
        assert!(matches!(result, Err(SignalsError::Validation(msg)) if msg.contains("colour")));
    }

    #[test]
    fn partial_validation_skips_defaults() {
        let result = schema().validate_partial(&fields(json!({"flag": false})));
        assert_eq!(result.ok(), Some(fields(json!({"flag": false}))));
    }
}
