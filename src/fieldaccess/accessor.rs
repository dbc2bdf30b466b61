use std::fmt;
use std::sync::Arc;

use crate::context::GraphContext;
use crate::convert::Converter;
use crate::error::{GraphError, Result};
use crate::model::{PropertyValue, RecordId};
use crate::schema::{FieldDescriptor, FieldKind};
use crate::store::BackingStore;
use crate::value::Value;

/// What an accessor operates on: the context and the bound record.
#[derive(Clone, Copy)]
pub struct AccessContext<'a> {
    /// Context the entity belongs to.
    pub ctx: &'a Arc<GraphContext>,
    /// Backing record of the entity.
    pub record: RecordId,
}

impl<'a> AccessContext<'a> {
    /// Shorthand for the context's store.
    pub fn store(&self) -> &'a dyn BackingStore {
        self.ctx.store()
    }
}

/// Usage error for whole-field writes of a field kind that does not allow
/// them.
pub(crate) fn not_writable(field: &FieldDescriptor) -> GraphError {
    let name = field.qualified_name();
    GraphError::usage(match &field.kind {
        FieldKind::Relationships { read_only: true, .. } => format!("{name} is read-only"),
        FieldKind::Relationships { .. } => {
            format!("{name} cannot be assigned as a whole; add and remove through its view")
        }
        FieldKind::RelationshipEntities(_) => format!("{name} cannot be assigned; use relate_to"),
        FieldKind::Id => format!("{name} cannot change once the entity is bound"),
        FieldKind::StartNode { .. } | FieldKind::EndNode { .. } => {
            format!("{name} is fixed when the relationship is created")
        }
        kind => format!("{} field {name} is not writable", kind.label()),
    })
}

/// Reads and writes one field of a bound entity against its record.
pub trait FieldAccessor: Send + Sync + fmt::Debug {
    /// Current value of the field.
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value>;

    /// Replaces the value of the field.
    fn write(&self, cx: &AccessContext<'_>, value: &Value) -> Result<()>;

    /// Property that `write` would store for `value`, without touching the
    /// store. `None` for null values and for fields not kept as a property.
    fn encode(&self, _value: &Value) -> Result<Option<PropertyValue>> {
        Ok(None)
    }
}

fn store_encoded(
    cx: &AccessContext<'_>,
    field: &FieldDescriptor,
    property: Option<PropertyValue>,
) -> Result<()> {
    match property {
        Some(property) => cx.store().set_property(cx.record, field.key(), property),
        None => cx.store().remove_property(cx.record, field.key()).map(|_| ()),
    }
}

/// Primitive stored directly as a property.
#[derive(Debug)]
pub struct PropertyFieldAccessor {
    field: Arc<FieldDescriptor>,
}

impl PropertyFieldAccessor {
    /// Accessor for `field`.
    pub fn new(field: Arc<FieldDescriptor>) -> Self {
        Self { field }
    }
}

impl FieldAccessor for PropertyFieldAccessor {
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value> {
        let stored = cx.store().get_property(cx.record, self.field.key())?;
        Ok(stored
            .or_else(|| self.field.default.clone())
            .map_or(Value::Null, Value::from))
    }

    fn write(&self, cx: &AccessContext<'_>, value: &Value) -> Result<()> {
        store_encoded(cx, &self.field, self.encode(value)?)
    }

    fn encode(&self, value: &Value) -> Result<Option<PropertyValue>> {
        if value.is_null() {
            return Ok(None);
        }
        value.to_property().map(Some).ok_or_else(|| {
            GraphError::usage(format!(
                "{} holds primitive values, got {}",
                self.field.qualified_name(),
                value.kind_name()
            ))
        })
    }
}

/// Value stored through a [`Converter`].
#[derive(Debug)]
pub struct ConvertingPropertyFieldAccessor {
    field: Arc<FieldDescriptor>,
    converter: Arc<dyn Converter>,
}

impl ConvertingPropertyFieldAccessor {
    /// Accessor for `field` using `converter`.
    pub fn new(field: Arc<FieldDescriptor>, converter: Arc<dyn Converter>) -> Self {
        Self { field, converter }
    }

    fn conversion_error(&self, message: impl fmt::Display) -> GraphError {
        GraphError::Conversion {
            field: self.field.qualified_name(),
            message: message.to_string(),
        }
    }
}

impl FieldAccessor for ConvertingPropertyFieldAccessor {
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value> {
        let stored = cx.store().get_property(cx.record, self.field.key())?;
        match stored.or_else(|| self.field.default.clone()) {
            Some(property) => self
                .converter
                .decode(&property)
                .map_err(|err| self.conversion_error(err)),
            None => Ok(Value::Null),
        }
    }

    fn write(&self, cx: &AccessContext<'_>, value: &Value) -> Result<()> {
        store_encoded(cx, &self.field, self.encode(value)?)
    }

    fn encode(&self, value: &Value) -> Result<Option<PropertyValue>> {
        if value.is_null() {
            return Ok(None);
        }
        self.converter
            .encode(value)
            .map(Some)
            .map_err(|err| self.conversion_error(err))
    }
}

/// Exposes the backing record identifier.
#[derive(Debug)]
pub struct IdFieldAccessor {
    field: Arc<FieldDescriptor>,
}

impl IdFieldAccessor {
    /// Accessor for `field`.
    pub fn new(field: Arc<FieldDescriptor>) -> Self {
        Self { field }
    }
}

impl FieldAccessor for IdFieldAccessor {
    fn read(&self, cx: &AccessContext<'_>) -> Result<Value> {
        let raw = i64::try_from(cx.record.raw()).map_err(|_| {
            GraphError::InvalidArgument(format!("{} does not fit an integer", cx.record))
        })?;
        Ok(Value::Int(raw))
    }

    fn write(&self, _cx: &AccessContext<'_>, _value: &Value) -> Result<()> {
        Err(not_writable(&self.field))
    }
}
