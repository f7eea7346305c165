//! Closed request schemas.
//!
//! A [`RequestSchema`] lists every field a route accepts. Bodies with fields
//! outside the list are rejected, as are bodies missing required fields or
//! carrying values of the wrong kind.

use crate::error::GuardRejection;
use serde_json::{Map, Value};

/// JSON kind a field must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    Object,
    Array,
}

impl FieldKind {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::String => "must be a string",
            Self::Integer => "must be an integer",
            Self::Boolean => "must be a boolean",
            Self::Object => "must be an object",
            Self::Array => "must be an array",
        }
    }
}

/// Constraints on one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRule {
    name: String,
    kind: FieldKind,
    required: bool,
    max_len: Option<usize>,
}

impl FieldRule {
    fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            max_len: None,
        }
    }

    /// A required string field.
    #[must_use]
    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::String)
    }

    /// A required integer field.
    #[must_use]
    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    /// A required boolean field.
    #[must_use]
    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Boolean)
    }

    /// A required object field. Its contents are only subject to the
    /// dangerous-key scan.
    #[must_use]
    pub fn object(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Object)
    }

    /// A required array field.
    #[must_use]
    pub fn array(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Array)
    }

    /// Allows the field to be absent or null.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Caps string length in characters, or array length in elements.
    #[must_use]
    pub fn max_len(mut self, max: usize) -> Self {
        self.max_len = Some(max);
        self
    }

    fn check(&self, value: Option<&Value>) -> Result<(), GuardRejection> {
        let value = match value {
            None | Some(Value::Null) if self.required => {
                return Err(GuardRejection::validation(&self.name, "is required"));
            }
            None | Some(Value::Null) => return Ok(()),
            Some(value) => value,
        };

        if !self.kind.matches(value) {
            return Err(GuardRejection::validation(&self.name, self.kind.describe()));
        }

        if let Some(max) = self.max_len {
            let len = match value {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                _ => 0,
            };
            if len > max {
                return Err(GuardRejection::validation(
                    &self.name,
                    format!("must be at most {max} long"),
                ));
            }
        }
        Ok(())
    }
}

/// The closed set of fields a route accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestSchema {
    fields: Vec<FieldRule>,
}

impl RequestSchema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field rule.
    #[must_use]
    pub fn field(mut self, rule: FieldRule) -> Self {
        self.fields.push(rule);
        self
    }

    /// Validates `body` against the schema.
    ///
    /// Unknown fields are reported first, in key order, then declared fields
    /// in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`GuardRejection::Validation`] naming the first offending
    /// field.
    pub fn validate(&self, body: &Map<String, Value>) -> Result<(), GuardRejection> {
        if let Some(unknown) = body
            .keys()
            .find(|key| !self.fields.iter().any(|rule| rule.name == **key))
        {
            return Err(GuardRejection::validation(unknown, "unknown field"));
        }

        for rule in &self.fields {
            rule.check(body.get(&rule.name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn stop_schema() -> RequestSchema {
        RequestSchema::new()
            .field(FieldRule::string("hash_key").max_len(512))
            .field(FieldRule::integer("bot_id"))
    }

    #[test]
    fn declared_fields_are_accepted() {
        let body = object(json!({ "hash_key": "k", "bot_id": 1001 }));
        assert!(stop_schema().validate(&body).is_ok());
    }

    #[test]
    fn unknown_field_is_named() {
        let schema = RequestSchema::new().field(FieldRule::string("hash_key"));
        let body = object(json!({ "hash_key": "k", "extra": 1 }));
        assert_eq!(
            schema.validate(&body).unwrap_err(),
            GuardRejection::validation("extra", "unknown field")
        );
    }

    #[test]
    fn missing_required_field() {
        let body = object(json!({ "hash_key": "k" }));
        assert_eq!(
            stop_schema().validate(&body).unwrap_err(),
            GuardRejection::validation("bot_id", "is required")
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let body = object(json!({ "hash_key": "k", "bot_id": null }));
        assert!(stop_schema().validate(&body).is_err());

        let schema = RequestSchema::new().field(FieldRule::string("note").optional());
        assert!(schema.validate(&object(json!({ "note": null }))).is_ok());
        assert!(schema.validate(&Map::new()).is_ok());
    }

    #[test]
    fn wrong_kind_is_rejected() {
        let body = object(json!({ "hash_key": "k", "bot_id": "1001" }));
        assert_eq!(
            stop_schema().validate(&body).unwrap_err(),
            GuardRejection::validation("bot_id", "must be an integer")
        );

        let body = object(json!({ "hash_key": "k", "bot_id": 1.5 }));
        assert!(stop_schema().validate(&body).is_err());
    }

    #[test]
    fn length_cap_counts_characters() {
        let schema = RequestSchema::new().field(FieldRule::string("text").max_len(3));
        assert!(schema.validate(&object(json!({ "text": "äöü" }))).is_ok());
        assert!(schema.validate(&object(json!({ "text": "abcd" }))).is_err());

        let schema = RequestSchema::new().field(FieldRule::array("ids").max_len(1));
        assert!(schema.validate(&object(json!({ "ids": [1, 2] }))).is_err());
    }
}
