//! Declarative field rules for every stored document.
//!
//! Each [`Entity`] has a [`Schema`]: an ordered list of fields, each with a
//! kind and flags. Client payloads pass through a [`Validator`] before they
//! reach the store; the validator sanitizes text, rejects disallowed html and
//! drops keys a client may not set.

mod entities;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::types::is_valid_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Project,
    Build,
    Asset,
    Group,
    Container,
    Script,
    Plugin,
    UserMeta,
    File,
}

#[derive(Debug, Clone, Copy)]
pub enum FieldKind {
    /// Plain text. Tags are stripped and the result trimmed.
    Text { min: usize, max: usize },
    /// Text that may carry a whitelist of html tags.
    Html { allowed: &'static [&'static str] },
    /// Stored as given.
    Raw,
    TextArray,
    IdArray { min: usize },
    IntArray,
    /// A single identifier, or null.
    Id,
    Integer { min: i64, max: i64 },
    Number { min: f64, max: f64 },
    Bool,
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    /// Hidden from non-verbose views.
    pub sensitive: bool,
    /// Set by the server only; dropped from client payloads.
    pub system: bool,
    /// Writable by elevated callers only.
    pub restricted: bool,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            sensitive: false,
            system: false,
            restricted: false,
        }
    }

    pub const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub const fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub const fn system(mut self) -> Self {
        self.system = true;
        self
    }

    pub const fn restricted(mut self) -> Self {
        self.restricted = true;
        self
    }
}

#[derive(Debug)]
pub struct Schema {
    pub entity: Entity,
    pub fields: &'static [Field],
}

impl Schema {
    pub fn sensitive_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.sensitive).map(|f| f.name)
    }

    pub fn restricted_fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().filter(|f| f.restricted).map(|f| f.name)
    }
}

pub fn for_entity(entity: Entity) -> &'static Schema {
    entities::lookup(entity)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Required fields must be present.
    Create,
    /// Only supplied fields are checked.
    Update,
}

pub trait Validator: Send + Sync {
    /// Returns the sanitized subset of `payload` a client is allowed to set.
    /// Errors are reported in field declaration order.
    fn validate(
        &self,
        entity: Entity,
        payload: &Value,
        mode: Mode,
    ) -> Result<Map<String, Value>, Vec<ValidationError>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SchemaValidator;

impl Validator for SchemaValidator {
    fn validate(
        &self,
        entity: Entity,
        payload: &Value,
        mode: Mode,
    ) -> Result<Map<String, Value>, Vec<ValidationError>> {
        let Some(input) = payload.as_object() else {
            return Err(vec![ValidationError::new("", "Expected a JSON object")]);
        };

        let schema = for_entity(entity);
        let mut clean = Map::new();
        let mut errors = Vec::new();

        for field in schema.fields.iter().filter(|f| !f.system) {
            let value = match input.get(field.name) {
                Some(v) => v,
                None if mode == Mode::Create => {
                    if let FieldKind::IdArray { min: min @ 1.. } = field.kind {
                        errors.push(min_items_error(field.name, min));
                    } else if field.required {
                        errors.push(ValidationError::new(
                            field.name,
                            format!("{} is required", field.name),
                        ));
                    }
                    continue;
                }
                None => continue,
            };

            match check(field, value) {
                Ok(v) => {
                    clean.insert(field.name.to_string(), v);
                }
                Err(e) => errors.push(e),
            }
        }

        if errors.is_empty() {
            Ok(clean)
        } else {
            Err(errors)
        }
    }
}

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<\s*/?\s*([a-zA-Z][a-zA-Z0-9]*)[^>]*>").expect("valid regex"));

/// Removes markup and surrounding whitespace.
pub fn strip_tags(s: &str) -> String {
    TAG.replace_all(s, "").trim().to_string()
}

fn has_disallowed_tags(s: &str, allowed: &[&str]) -> bool {
    TAG.captures_iter(s).any(|c| {
        let tag = c[1].to_ascii_lowercase();
        !allowed.contains(&tag.as_str())
    })
}

fn min_items_error(name: &str, min: usize) -> ValidationError {
    let noun = if min == 1 { "item" } else { "items" };
    ValidationError::new(
        name,
        format!("You must select at least {min} {noun} for {name}"),
    )
}

fn type_error(name: &str, expected: &str) -> ValidationError {
    ValidationError::new(name, format!("{name} must be {expected}"))
}

fn check(field: &Field, value: &Value) -> Result<Value, ValidationError> {
    let name = field.name;
    match field.kind {
        FieldKind::Text { min, max } => {
            let s = value.as_str().ok_or_else(|| type_error(name, "a string"))?;
            let s = strip_tags(s);
            let len = s.chars().count();
            if len < min {
                return Err(ValidationError::new(name, format!("{name} cannot be empty")));
            }
            if len > max {
                return Err(ValidationError::new(
                    name,
                    format!("{name} cannot be more than {max} characters"),
                ));
            }
            Ok(Value::String(s))
        }
        FieldKind::Html { allowed } => {
            let s = value.as_str().ok_or_else(|| type_error(name, "a string"))?;
            if has_disallowed_tags(s, allowed) {
                return Err(ValidationError::new(
                    name,
                    format!("'{name}' has html code that is not allowed"),
                ));
            }
            Ok(Value::String(s.trim().to_string()))
        }
        FieldKind::Raw => value
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| type_error(name, "a string")),
        FieldKind::TextArray => {
            let items = value.as_array().ok_or_else(|| type_error(name, "a list"))?;
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                let s = item
                    .as_str()
                    .ok_or_else(|| type_error(name, "a list of strings"))?;
                let s = strip_tags(s);
                if !s.is_empty() {
                    out.push(Value::String(s));
                }
            }
            Ok(Value::Array(out))
        }
        FieldKind::IdArray { min } => {
            let items = value.as_array().ok_or_else(|| type_error(name, "a list"))?;
            if items.len() < min {
                return Err(min_items_error(name, min));
            }
            for item in items {
                match item.as_str() {
                    Some(id) if is_valid_id(id) => {}
                    _ => {
                        return Err(ValidationError::new(
                            name,
                            format!("Please use a valid ID for '{name}'"),
                        ));
                    }
                }
            }
            Ok(value.clone())
        }
        FieldKind::IntArray => {
            let items = value.as_array().ok_or_else(|| type_error(name, "a list"))?;
            if items.iter().any(|i| i.as_i64().is_none()) {
                return Err(type_error(name, "a list of numbers"));
            }
            Ok(value.clone())
        }
        FieldKind::Id => match value {
            Value::Null => Ok(Value::Null),
            Value::String(id) if is_valid_id(id) => Ok(value.clone()),
            _ => Err(ValidationError::new(
                name,
                format!("Please use a valid ID for '{name}'"),
            )),
        },
        FieldKind::Integer { min, max } => {
            let n = value.as_i64().ok_or_else(|| type_error(name, "a number"))?;
            if n < min || n > max {
                return Err(ValidationError::new(
                    name,
                    format!("{name} must be between {min} and {max}"),
                ));
            }
            Ok(Value::from(n))
        }
        FieldKind::Number { min, max } => {
            let n = value.as_f64().ok_or_else(|| type_error(name, "a number"))?;
            if n < min || n > max {
                return Err(ValidationError::new(
                    name,
                    format!("{name} must be between {min} and {max}"),
                ));
            }
            Ok(value.clone())
        }
        FieldKind::Bool => value
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| type_error(name, "true or false")),
        FieldKind::Json => Ok(value.clone()),
    }
}
