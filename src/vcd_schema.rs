//! Attribute schemas for resources and data sources.
//!
//! A [`ResourceSchema`] checks user-supplied attributes before any API call
//! and tells which attribute changes force a resource to be replaced.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// JSON shape an attribute must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// JSON string.
    String,
    /// JSON integer.
    Int,
    /// JSON boolean.
    Bool,
    /// JSON array.
    List,
    /// JSON object.
    Object,
}

impl AttributeType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::Bool => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Who sets an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// Must be set by the user.
    Required,
    /// May be set by the user.
    Optional,
    /// Set by the provider only.
    Computed,
    /// Set by the user, or filled in by the provider when absent.
    OptionalComputed,
}

/// Custom check run on a present, well-typed value.
pub type Validator = fn(&Value) -> Result<(), String>;

/// One attribute of a schema.
#[derive(Debug, Clone, Serialize)]
pub struct Attribute {
    /// Attribute key.
    pub name: &'static str,
    /// Expected JSON shape.
    pub kind: AttributeType,
    /// Who sets it.
    pub presence: Presence,
    /// Changing it replaces the resource.
    pub force_new: bool,
    /// Human-readable description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'static str>,
    /// Extra check on the value.
    #[serde(skip)]
    pub validate: Option<Validator>,
}

impl Attribute {
    /// Optional attribute.
    #[must_use]
    pub const fn new(name: &'static str, kind: AttributeType) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
            force_new: false,
            description: None,
            validate: None,
        }
    }

    /// Mark as required.
    #[must_use]
    pub const fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    /// Mark as provider-set.
    #[must_use]
    pub const fn computed(mut self) -> Self {
        self.presence = Presence::Computed;
        self
    }

    /// Mark as user-set with a provider default.
    #[must_use]
    pub const fn optional_computed(mut self) -> Self {
        self.presence = Presence::OptionalComputed;
        self
    }

    /// Changing this attribute replaces the resource.
    #[must_use]
    pub const fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    /// Attach a custom check.
    #[must_use]
    pub const fn with_validator(mut self, validate: Validator) -> Self {
        self.validate = Some(validate);
        self
    }

    /// Attach a description.
    #[must_use]
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    fn check(&self, value: &Value) -> Result<(), SchemaError> {
        if !self.kind.matches(value) {
            return Err(SchemaError::TypeMismatch {
                name: self.name.to_string(),
                expected: self.kind,
                got: type_name(value),
            });
        }
        if let Some(validate) = self.validate {
            validate(value).map_err(|message| SchemaError::ValidationFailed {
                name: self.name.to_string(),
                message,
            })?;
        }
        Ok(())
    }
}

/// Attribute validation failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// A required attribute is absent.
    #[error("missing required attribute '{0}'")]
    MissingRequired(String),

    /// Wrong JSON shape.
    #[error("attribute '{name}' expects {expected:?}, got {got}")]
    TypeMismatch {
        name: String,
        expected: AttributeType,
        got: &'static str,
    },

    /// The custom check rejected the value.
    #[error("attribute '{name}': {message}")]
    ValidationFailed { name: String, message: String },

    /// Not part of the schema.
    #[error("unknown attribute '{0}'")]
    UnknownAttribute(String),

    /// Set by the user but provider-only.
    #[error("attribute '{0}' is computed and cannot be set")]
    ComputedOnly(String),
}

/// Attributes of a resource or data source type.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSchema {
    /// Type name, e.g. `vcd_disk`.
    pub name: &'static str,
    /// Attributes in declaration order.
    pub attributes: Vec<Attribute>,
}

impl ResourceSchema {
    /// Empty schema.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            attributes: Vec::new(),
        }
    }

    /// Append an attribute.
    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Look up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check user-supplied attributes. `null` counts as absent.
    ///
    /// # Errors
    ///
    /// Returns every problem found, not just the first.
    pub fn validate(&self, attributes: &Map<String, Value>) -> Result<(), Vec<SchemaError>> {
        let mut errors = Vec::new();

        for (name, value) in attributes {
            if value.is_null() {
                continue;
            }
            match self.get(name) {
                None => errors.push(SchemaError::UnknownAttribute(name.clone())),
                Some(attr) if attr.presence == Presence::Computed => {
                    errors.push(SchemaError::ComputedOnly(name.clone()));
                }
                Some(attr) => {
                    if let Err(e) = attr.check(value) {
                        errors.push(e);
                    }
                }
            }
        }

        for attr in &self.attributes {
            if attr.presence == Presence::Required && present(attributes, attr.name).is_none() {
                errors.push(SchemaError::MissingRequired(attr.name.to_string()));
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Force-new attributes whose value differs between `old` and `new`.
    ///
    /// An absent value equals an empty one (`""`, `[]`, `{}`, `false`).
    #[must_use]
    pub fn requires_replacement(
        &self,
        old: &Map<String, Value>,
        new: &Map<String, Value>,
    ) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.force_new && !same_value(present(old, a.name), present(new, a.name)))
            .map(|a| a.name)
            .collect()
    }

    /// `new` with optional-computed attributes it leaves out taken from `old`.
    #[must_use]
    pub fn keep_computed_defaults(
        &self,
        old: &Map<String, Value>,
        new: &Map<String, Value>,
    ) -> Map<String, Value> {
        let mut merged = new.clone();
        for attr in &self.attributes {
            if attr.presence != Presence::OptionalComputed || present(new, attr.name).is_some() {
                continue;
            }
            if let Some(value) = present(old, attr.name) {
                merged.insert(attr.name.to_string(), value.clone());
            }
        }
        merged
    }

    /// Drop computed attributes, keeping what a user may send back.
    #[must_use]
    pub fn user_settable(&self, attributes: &Map<String, Value>) -> Map<String, Value> {
        attributes
            .iter()
            .filter(|(name, _)| {
                self.get(name)
                    .is_some_and(|a| a.presence != Presence::Computed)
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn present<'a>(attributes: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    attributes.get(name).filter(|v| !v.is_null())
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

fn same_value(old: Option<&Value>, new: Option<&Value>) -> bool {
    match (old, new) {
        (Some(a), Some(b)) => a == b || (is_blank(a) && is_blank(b)),
        (Some(v), None) | (None, Some(v)) => is_blank(v),
        (None, None) => true,
    }
}
