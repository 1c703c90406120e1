//! Property values and the primitive wire-conversion table.

use std::borrow::Cow;

use crate::error::{Error, Result};
use crate::schema::PrimitiveKind;

/// A named property with its value and any instance annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: Value,
    pub annotations: Vec<InstanceAnnotation>,
}

impl Property {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Property {
            name: name.into(),
            value: value.into(),
            annotations: Vec::new(),
        }
    }
}

/// An instance annotation attached to a property.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceAnnotation {
    pub term: String,
    pub value: Value,
}

impl InstanceAnnotation {
    pub fn new(term: impl Into<String>, value: impl Into<Value>) -> Self {
        InstanceAnnotation {
            term: term.into(),
            value: value.into(),
        }
    }
}

/// A property value.
///
/// `Stream` may only appear as an entry-level media resource, never inside
/// a collection or complex value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Primitive(PrimitiveValue),
    Enum(EnumValue),
    Complex(ComplexValue),
    Collection(CollectionValue),
    Stream(StreamValue),
}

impl Value {
    #[inline(always)]
    pub fn as_primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Value::Primitive(v) => Some(v),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_complex(&self) -> Option<&ComplexValue> {
        match self {
            Value::Complex(v) => Some(v),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_collection(&self) -> Option<&CollectionValue> {
        match self {
            Value::Collection(v) => Some(v),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Value::Enum(v) => Some(v),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl From<PrimitiveValue> for Value {
    fn from(v: PrimitiveValue) -> Self {
        Value::Primitive(v)
    }
}

impl From<EnumValue> for Value {
    fn from(v: EnumValue) -> Self {
        Value::Enum(v)
    }
}

impl From<ComplexValue> for Value {
    fn from(v: ComplexValue) -> Self {
        Value::Complex(v)
    }
}

impl From<CollectionValue> for Value {
    fn from(v: CollectionValue) -> Self {
        Value::Collection(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Primitive(PrimitiveValue::String(v.to_string()))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Primitive(PrimitiveValue::Int32(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Primitive(PrimitiveValue::Boolean(v))
    }
}

/// A primitive value.
///
/// Decimal, Guid and DateTimeOffset values are carried as validated wire
/// text; the codec converts representations, it does not do arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveValue {
    Boolean(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Single(f32),
    Double(f64),
    Decimal(String),
    String(String),
    Guid(String),
    DateTimeOffset(String),
}

impl PrimitiveValue {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            PrimitiveValue::Boolean(_) => PrimitiveKind::Boolean,
            PrimitiveValue::Int16(_) => PrimitiveKind::Int16,
            PrimitiveValue::Int32(_) => PrimitiveKind::Int32,
            PrimitiveValue::Int64(_) => PrimitiveKind::Int64,
            PrimitiveValue::Single(_) => PrimitiveKind::Single,
            PrimitiveValue::Double(_) => PrimitiveKind::Double,
            PrimitiveValue::Decimal(_) => PrimitiveKind::Decimal,
            PrimitiveValue::String(_) => PrimitiveKind::String,
            PrimitiveValue::Guid(_) => PrimitiveKind::Guid,
            PrimitiveValue::DateTimeOffset(_) => PrimitiveKind::DateTimeOffset,
        }
    }

    /// Wire text for this value.
    pub fn to_wire(&self) -> Cow<'_, str> {
        match self {
            PrimitiveValue::Boolean(v) => Cow::Borrowed(if *v { "true" } else { "false" }),
            PrimitiveValue::Int16(v) => Cow::Owned(v.to_string()),
            PrimitiveValue::Int32(v) => Cow::Owned(v.to_string()),
            PrimitiveValue::Int64(v) => Cow::Owned(v.to_string()),
            PrimitiveValue::Single(v) => Cow::Owned(float_to_wire(*v as f64)),
            PrimitiveValue::Double(v) => Cow::Owned(float_to_wire(*v)),
            PrimitiveValue::Decimal(v)
            | PrimitiveValue::String(v)
            | PrimitiveValue::Guid(v)
            | PrimitiveValue::DateTimeOffset(v) => Cow::Borrowed(v),
        }
    }

    /// Parse wire text as a value of the given kind.
    pub fn from_wire(kind: PrimitiveKind, text: &str) -> Result<PrimitiveValue> {
        let err = || Error::InvalidPrimitive {
            kind: kind.name(),
            text: text.to_string(),
        };
        Ok(match kind {
            PrimitiveKind::Boolean => match text {
                "true" | "1" => PrimitiveValue::Boolean(true),
                "false" | "0" => PrimitiveValue::Boolean(false),
                _ => return Err(err()),
            },
            PrimitiveKind::Int16 => PrimitiveValue::Int16(text.parse().map_err(|_| err())?),
            PrimitiveKind::Int32 => PrimitiveValue::Int32(text.parse().map_err(|_| err())?),
            PrimitiveKind::Int64 => PrimitiveValue::Int64(text.parse().map_err(|_| err())?),
            PrimitiveKind::Single => PrimitiveValue::Single(float_from_wire(text).ok_or_else(err)? as f32),
            PrimitiveKind::Double => PrimitiveValue::Double(float_from_wire(text).ok_or_else(err)?),
            PrimitiveKind::Decimal => {
                if !is_decimal_text(text) {
                    return Err(err());
                }
                PrimitiveValue::Decimal(text.to_string())
            }
            PrimitiveKind::String => PrimitiveValue::String(text.to_string()),
            PrimitiveKind::Guid => {
                if !is_guid_text(text) {
                    return Err(err());
                }
                PrimitiveValue::Guid(text.to_string())
            }
            PrimitiveKind::DateTimeOffset => {
                // Lexical validation only; offsets are kept as written.
                if text.len() < 16 || !text.contains('T') {
                    return Err(err());
                }
                PrimitiveValue::DateTimeOffset(text.to_string())
            }
            PrimitiveKind::Stream => return Err(err()),
        })
    }
}

fn float_to_wire(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "INF".to_string()
    } else if value == f64::NEG_INFINITY {
        "-INF".to_string()
    } else {
        value.to_string()
    }
}

fn float_from_wire(text: &str) -> Option<f64> {
    match text {
        "INF" => Some(f64::INFINITY),
        "-INF" => Some(f64::NEG_INFINITY),
        "NaN" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

fn is_decimal_text(text: &str) -> bool {
    let rest = text.strip_prefix('-').unwrap_or(text);
    !rest.is_empty()
        && rest.chars().all(|c| c.is_ascii_digit() || c == '.')
        && rest.chars().filter(|c| *c == '.').count() <= 1
}

fn is_guid_text(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

/// An enum value: the member name plus an optional type annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumValue {
    pub type_name: Option<String>,
    pub value: String,
}

impl EnumValue {
    pub fn new(type_name: impl Into<String>, value: impl Into<String>) -> Self {
        EnumValue {
            type_name: Some(type_name.into()),
            value: value.into(),
        }
    }
}

/// A complex value: named properties with an optional type annotation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ComplexValue {
    pub type_name: Option<String>,
    pub properties: Vec<Property>,
}

impl ComplexValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        ComplexValue {
            type_name: Some(type_name.into()),
            properties: Vec::new(),
        }
    }

    pub fn with(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }
}

/// An ordered collection of items with an optional type annotation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectionValue {
    pub type_name: Option<String>,
    pub items: Vec<Value>,
}

impl CollectionValue {
    pub fn new(type_name: impl Into<String>) -> Self {
        CollectionValue {
            type_name: Some(type_name.into()),
            items: Vec::new(),
        }
    }

    pub fn with(mut self, item: impl Into<Value>) -> Self {
        self.items.push(item.into());
        self
    }
}

/// A media resource: links, media type and etag of a binary stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamValue {
    pub read_link: Option<String>,
    pub edit_link: Option<String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

impl StreamValue {
    /// The empty media resource synthesized for default-stream types.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boolean_wire_text() {
        assert_eq!(PrimitiveValue::Boolean(true).to_wire(), "true");
        assert_eq!(
            PrimitiveValue::from_wire(PrimitiveKind::Boolean, "false").unwrap(),
            PrimitiveValue::Boolean(false)
        );
        assert!(PrimitiveValue::from_wire(PrimitiveKind::Boolean, "yes").is_err());
    }

    #[test]
    fn float_special_values() {
        assert_eq!(PrimitiveValue::Double(f64::INFINITY).to_wire(), "INF");
        assert_eq!(PrimitiveValue::Double(f64::NEG_INFINITY).to_wire(), "-INF");
        assert_eq!(PrimitiveValue::Double(f64::NAN).to_wire(), "NaN");
        assert_eq!(
            PrimitiveValue::from_wire(PrimitiveKind::Double, "INF").unwrap(),
            PrimitiveValue::Double(f64::INFINITY)
        );
        match PrimitiveValue::from_wire(PrimitiveKind::Double, "NaN").unwrap() {
            PrimitiveValue::Double(v) => assert!(v.is_nan()),
            other => panic!("unexpected value: {:?}", other),
        }
    }

    #[test]
    fn integer_parse_rejects_garbage() {
        assert!(PrimitiveValue::from_wire(PrimitiveKind::Int32, "12x").is_err());
        assert_eq!(
            PrimitiveValue::from_wire(PrimitiveKind::Int64, "-9000000000").unwrap(),
            PrimitiveValue::Int64(-9000000000)
        );
    }

    #[test]
    fn guid_shape_is_validated() {
        assert!(PrimitiveValue::from_wire(
            PrimitiveKind::Guid,
            "38cf68c2-4010-4ccc-8922-868217f03ddc"
        )
        .is_ok());
        assert!(PrimitiveValue::from_wire(PrimitiveKind::Guid, "not-a-guid").is_err());
    }

    #[test]
    fn decimal_shape_is_validated() {
        assert!(PrimitiveValue::from_wire(PrimitiveKind::Decimal, "-12.5").is_ok());
        assert!(PrimitiveValue::from_wire(PrimitiveKind::Decimal, "1.2.3").is_err());
    }

    #[test]
    fn stream_kind_has_no_wire_text() {
        assert!(PrimitiveValue::from_wire(PrimitiveKind::Stream, "x").is_err());
    }
}
