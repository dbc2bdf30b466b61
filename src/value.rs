use std::fmt;

use time::OffsetDateTime;

use crate::entity::Entity;
use crate::fieldaccess::{RelatedEntities, RelationshipEntities, Traversal};
use crate::model::PropertyValue;

/// Value of an entity field as seen by domain code.
#[derive(Clone)]
pub enum Value {
    /// No value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point.
    Float(f64),
    /// String.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// Point in time, stored through a converter.
    Timestamp(OffsetDateTime),
    /// Enum variant name, stored through a converter.
    Variant(String),
    /// Another entity.
    Entity(Entity),
    /// Live view over related entities.
    Entities(RelatedEntities),
    /// Live view over relationship entities.
    Relationships(RelationshipEntities),
    /// Lazy traversal result.
    Traversal(Traversal),
}

impl Value {
    /// Short name of the variant, for messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Timestamp(_) => "timestamp",
            Value::Variant(_) => "variant",
            Value::Entity(_) => "entity",
            Value::Entities(_) => "entity collection",
            Value::Relationships(_) => "relationship collection",
            Value::Traversal(_) => "traversal",
        }
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The stored primitive equivalent, for primitive variants only.
    pub fn to_property(&self) -> Option<PropertyValue> {
        match self {
            Value::Bool(v) => Some(PropertyValue::Bool(*v)),
            Value::Int(v) => Some(PropertyValue::Int(*v)),
            Value::Float(v) => Some(PropertyValue::Float(*v)),
            Value::String(v) => Some(PropertyValue::String(v.clone())),
            Value::Bytes(v) => Some(PropertyValue::Bytes(v.clone())),
            _ => None,
        }
    }

    /// String content, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) | Value::Variant(v) => Some(v),
            _ => None,
        }
    }

    /// Integer content, if any.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Boolean content, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Float content, if any.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Timestamp content, if any.
    pub fn as_timestamp(&self) -> Option<OffsetDateTime> {
        match self {
            Value::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Borrowed entity, if any.
    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Value::Entity(v) => Some(v),
            _ => None,
        }
    }

    /// Owned entity, if any.
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Value::Entity(v) => Some(v),
            _ => None,
        }
    }

    /// Related-entity view, if any.
    pub fn into_entities(self) -> Option<RelatedEntities> {
        match self {
            Value::Entities(v) => Some(v),
            _ => None,
        }
    }

    /// Relationship-entity view, if any.
    pub fn into_relationships(self) -> Option<RelationshipEntities> {
        match self {
            Value::Relationships(v) => Some(v),
            _ => None,
        }
    }

    /// Traversal, if any.
    pub fn into_traversal(self) -> Option<Traversal> {
        match self {
            Value::Traversal(v) => Some(v),
            _ => None,
        }
    }
}

impl From<PropertyValue> for Value {
    fn from(value: PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(v) => Value::Bool(v),
            PropertyValue::Int(v) => Value::Int(v),
            PropertyValue::Float(v) => Value::Float(v),
            PropertyValue::String(v) => Value::String(v),
            PropertyValue::Bytes(v) => Value::Bytes(v),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Value::Timestamp(value)
    }
}

impl From<Entity> for Value {
    fn from(value: Entity) -> Self {
        Value::Entity(value)
    }
}

impl From<&Entity> for Value {
    fn from(value: &Entity) -> Self {
        Value::Entity(value.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Int(v) => write!(f, "Int({v})"),
            Value::Float(v) => write!(f, "Float({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Bytes(v) => write!(f, "Bytes({} bytes)", v.len()),
            Value::Timestamp(v) => write!(f, "Timestamp({v})"),
            Value::Variant(v) => write!(f, "Variant({v})"),
            Value::Entity(v) => write!(f, "Entity({v:?})"),
            Value::Entities(v) => write!(f, "{v:?}"),
            Value::Relationships(v) => write!(f, "{v:?}"),
            Value::Traversal(v) => write!(f, "{v:?}"),
        }
    }
}
