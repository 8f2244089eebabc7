//! Typed property values
//!
//! Every node property holds exactly one [`PropertyValue`]. The matching
//! [`PropertyType`] is used by operation descriptors to declare what an input
//! slot accepts.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Type tag of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    String,
    Long,
    Double,
    Boolean,
    Binary,
    Date,
    Name,
    Path,
    Reference,
    WeakReference,
    Uri,
}

impl PropertyType {
    /// Whether values of this type take part in arithmetic
    pub fn is_numeric(&self) -> bool {
        matches!(self, PropertyType::Long | PropertyType::Double)
    }

    /// Stable lowercase name, as used in manifests and error messages
    pub fn name(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Long => "long",
            PropertyType::Double => "double",
            PropertyType::Boolean => "boolean",
            PropertyType::Binary => "binary",
            PropertyType::Date => "date",
            PropertyType::Name => "name",
            PropertyType::Path => "path",
            PropertyType::Reference => "reference",
            PropertyType::WeakReference => "weak_reference",
            PropertyType::Uri => "uri",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Binary(Vec<u8>),
    Date(DateTime<FixedOffset>),
    Name(String),
    Path(String),
    Reference(Uuid),
    WeakReference(Uuid),
    Uri(String),
}

impl PropertyValue {
    /// The type tag of this value
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Long(_) => PropertyType::Long,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::Boolean(_) => PropertyType::Boolean,
            PropertyValue::Binary(_) => PropertyType::Binary,
            PropertyValue::Date(_) => PropertyType::Date,
            PropertyValue::Name(_) => PropertyType::Name,
            PropertyValue::Path(_) => PropertyType::Path,
            PropertyValue::Reference(_) => PropertyType::Reference,
            PropertyValue::WeakReference(_) => PropertyType::WeakReference,
            PropertyValue::Uri(_) => PropertyType::Uri,
        }
    }

    /// Borrow the text of string-like values (string, name, path, URI)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s)
            | PropertyValue::Name(s)
            | PropertyValue::Path(s)
            | PropertyValue::Uri(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            PropertyValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric view; longs widen to doubles
    pub fn as_double(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(v) => Some(*v),
            PropertyValue::Long(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    /// Target node of reference and weak-reference values
    pub fn as_reference(&self) -> Option<Uuid> {
        match self {
            PropertyValue::Reference(id) | PropertyValue::WeakReference(id) => Some(*id),
            _ => None,
        }
    }

    /// Parse the textual form produced by `Display` back into a value of the given type
    pub fn parse(value_type: PropertyType, text: &str) -> Option<PropertyValue> {
        match value_type {
            PropertyType::String => Some(PropertyValue::String(text.to_string())),
            PropertyType::Long => text.trim().parse().ok().map(PropertyValue::Long),
            PropertyType::Double => text.trim().parse().ok().map(PropertyValue::Double),
            PropertyType::Boolean => match text.trim() {
                "true" => Some(PropertyValue::Boolean(true)),
                "false" => Some(PropertyValue::Boolean(false)),
                _ => None,
            },
            PropertyType::Binary => BASE64.decode(text.trim()).ok().map(PropertyValue::Binary),
            PropertyType::Date => DateTime::parse_from_rfc3339(text.trim())
                .ok()
                .map(PropertyValue::Date),
            PropertyType::Name => Some(PropertyValue::Name(text.to_string())),
            PropertyType::Path => Some(PropertyValue::Path(text.to_string())),
            PropertyType::Reference => Uuid::parse_str(text.trim())
                .ok()
                .map(PropertyValue::Reference),
            PropertyType::WeakReference => Uuid::parse_str(text.trim())
                .ok()
                .map(PropertyValue::WeakReference),
            PropertyType::Uri => Some(PropertyValue::Uri(text.to_string())),
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s)
            | PropertyValue::Name(s)
            | PropertyValue::Path(s)
            | PropertyValue::Uri(s) => f.write_str(s),
            PropertyValue::Long(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Boolean(v) => write!(f, "{}", v),
            PropertyValue::Binary(bytes) => f.write_str(&BASE64.encode(bytes)),
            PropertyValue::Date(date) => f.write_str(&date.to_rfc3339()),
            PropertyValue::Reference(id) | PropertyValue::WeakReference(id) => {
                write!(f, "{}", id)
            }
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

/// A named property as stored on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
