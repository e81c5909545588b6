//! Layer field metadata, coded/range domains, and the domain registry.

use std::sync::{Arc, Mutex};

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::{as_number, as_text, loose_eq};

/// Schema validation and lookup failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    /// A field referenced a domain name that was never registered.
    #[error("field `{field}` references unknown domain `{domain}`")]
    UnknownDomain {
        /// Field name.
        field: String,
        /// Missing domain name.
        domain: String,
    },
    /// Value does not match the field's type tag.
    #[error("field `{field}` expects {expected:?}, got {value}")]
    TypeMismatch {
        /// Field name.
        field: String,
        /// Declared type.
        expected: FieldType,
        /// Offending value.
        value: Value,
    },
    /// Value is not a member of the field's domain.
    #[error("value {value} is outside domain `{domain}` of field `{field}`")]
    OutOfDomain {
        /// Field name.
        field: String,
        /// Domain name.
        domain: String,
        /// Offending value.
        value: Value,
    },
    /// Write to a field flagged as not editable.
    #[error("field `{0}` is not editable")]
    NotEditable(String),
}

/// Attribute type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Text.
    String,
    /// Whole number.
    Integer,
    /// Floating point number.
    Double,
    /// True/false.
    Boolean,
    /// Epoch milliseconds or an ISO string.
    Date,
    /// Backend object id.
    Oid,
    /// Geometry column.
    Geometry,
}

/// Domain body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DomainKind {
    /// Inclusive numeric range.
    Range {
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
    },
    /// Enumerated `(code, display value)` pairs.
    Coded {
        /// Code list in display order.
        values: Vec<(Value, String)>,
    },
}

/// Named mapping from stored codes to display values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Domain {
    /// Registry key.
    pub name: String,
    /// Range or code list.
    #[serde(flatten)]
    pub kind: DomainKind,
}

impl Domain {
    /// Range domain.
    pub fn range(name: impl Into<String>, min: f64, max: f64) -> Self {
        Self {
            name: name.into(),
            kind: DomainKind::Range { min, max },
        }
    }

    /// Coded-value domain.
    pub fn coded<I, C, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = (C, S)>,
        C: Into<Value>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: DomainKind::Coded {
                values: values.into_iter().map(|(c, s)| (c.into(), s.into())).collect(),
            },
        }
    }

    /// True when `value` is an allowed code or lies inside the range.
    pub fn contains(&self, value: &Value) -> bool {
        match &self.kind {
            DomainKind::Range { min, max } => {
                as_number(value).is_some_and(|v| v >= *min && v <= *max)
            }
            DomainKind::Coded { values } => values.iter().any(|(code, _)| loose_eq(code, value)),
        }
    }

    /// Display text for a stored value. Unknown codes fall back to the raw value.
    pub fn display(&self, value: &Value) -> String {
        if let DomainKind::Coded { values } = &self.kind
            && let Some((_, label)) = values.iter().find(|(code, _)| loose_eq(code, value))
        {
            return label.clone();
        }
        as_text(value)
    }
}

/// Process-lifetime cache of domains keyed by name.
///
/// Registering a name twice hands back the first instance, so every field
/// referencing a domain shares one `Arc`. Entries are never replaced or
/// removed.
#[derive(Debug, Default)]
pub struct DomainRegistry {
    domains: Mutex<HashMap<String, Arc<Domain>>>,
}

impl DomainRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached domain for `domain.name`, inserting it if absent.
    pub fn get_or_register(&self, domain: Domain) -> Arc<Domain> {
        let mut map = self.domains.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(existing) = map.get(&domain.name) {
            return Arc::clone(existing);
        }
        let name = domain.name.clone();
        let arc = Arc::new(domain);
        map.insert(name, Arc::clone(&arc));
        tracing::debug!(domain = %arc.name, "registered domain");
        arc
    }

    /// Cached domain by name.
    pub fn get(&self, name: &str) -> Option<Arc<Domain>> {
        let map = self.domains.lock().unwrap_or_else(|p| p.into_inner());
        map.get(name).cloned()
    }

    /// Number of cached domains.
    pub fn len(&self) -> usize {
        self.domains.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    /// True when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One attribute of a layer's features.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    alias: String,
    visible: bool,
    editable: bool,
    field_type: FieldType,
    default: Option<Value>,
    domain: Option<Arc<Domain>>,
}

impl Field {
    /// Visible, editable field whose alias is its name.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        let name = name.into();
        Self {
            alias: name.clone(),
            name,
            visible: true,
            editable: true,
            field_type,
            default: None,
            domain: None,
        }
    }

    /// Attaches a registry-owned domain.
    pub fn with_domain(mut self, domain: Arc<Domain>) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Attribute key.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Human-readable name.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Shown in attribute tables.
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Writable through the editor.
    pub fn editable(&self) -> bool {
        self.editable
    }

    /// Type tag.
    pub fn field_type(&self) -> FieldType {
        self.field_type
    }

    /// Value used for newly drawn features.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Attached domain.
    pub fn domain(&self) -> Option<&Arc<Domain>> {
        self.domain.as_ref()
    }

    /// Replaces the alias.
    pub fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = alias.into();
    }

    /// Shows or hides the field.
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Allows or forbids editor writes.
    pub fn set_editable(&mut self, editable: bool) {
        self.editable = editable;
    }

    /// Replaces the default value.
    pub fn set_default(&mut self, default: Option<Value>) {
        self.default = default;
    }

    /// Checks type tag and domain membership. `null` always passes.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
        if value.is_null() {
            return Ok(());
        }
        let type_ok = match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Integer | FieldType::Oid => {
                value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
            }
            FieldType::Double => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Date => value.is_number() || value.is_string(),
            FieldType::Geometry => value.is_object() || value.is_array(),
        };
        if !type_ok {
            return Err(SchemaError::TypeMismatch {
                field: self.name.clone(),
                expected: self.field_type,
                value: value.clone(),
            });
        }
        if let Some(domain) = &self.domain
            && !domain.contains(value)
        {
            return Err(SchemaError::OutOfDomain {
                field: self.name.clone(),
                domain: domain.name.clone(),
                value: value.clone(),
            });
        }
        Ok(())
    }

    /// Display text for `value`, translated through the domain when present.
    pub fn format(&self, value: &Value) -> String {
        match &self.domain {
            Some(domain) => domain.display(value),
            None => as_text(value),
        }
    }
}
