//! Converters translate between domain values and stored primitives.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use time::OffsetDateTime;

use crate::model::PropertyValue;
use crate::value::Value;

/// Name under which [`TimestampMillisConverter`] is registered by default.
pub const TIMESTAMP_MILLIS: &str = "timestamp-millis";

/// Reason a converter rejected a value.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct ConvertError(pub String);

/// Two-way translation used by converting property fields.
pub trait Converter: Send + Sync + fmt::Debug {
    /// Domain value to the primitive that gets stored.
    fn encode(&self, value: &Value) -> Result<PropertyValue, ConvertError>;

    /// Stored primitive back to the domain value.
    fn decode(&self, value: &PropertyValue) -> Result<Value, ConvertError>;
}

/// Closed set of variant names stored as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConverter {
    variants: Vec<String>,
}

impl EnumConverter {
    /// Accepts exactly the given variant names.
    pub fn new<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            variants: variants.into_iter().map(Into::into).collect(),
        }
    }

    /// Known variant names.
    pub fn variants(&self) -> &[String] {
        &self.variants
    }

    fn check(&self, name: &str) -> Result<(), ConvertError> {
        if self.variants.iter().any(|variant| variant == name) {
            Ok(())
        } else {
            Err(ConvertError(format!("unknown variant '{name}'")))
        }
    }
}

impl Converter for EnumConverter {
    fn encode(&self, value: &Value) -> Result<PropertyValue, ConvertError> {
        match value {
            Value::Variant(name) | Value::String(name) => {
                self.check(name)?;
                Ok(PropertyValue::String(name.clone()))
            }
            other => Err(ConvertError(format!(
                "expected an enum variant, got {}",
                other.kind_name()
            ))),
        }
    }

    fn decode(&self, value: &PropertyValue) -> Result<Value, ConvertError> {
        match value {
            PropertyValue::String(name) => {
                self.check(name)?;
                Ok(Value::Variant(name.clone()))
            }
            other => Err(ConvertError(format!(
                "expected a stored variant name, got {other}"
            ))),
        }
    }
}

/// Timestamps stored as the decimal string of Unix milliseconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampMillisConverter;

impl Converter for TimestampMillisConverter {
    fn encode(&self, value: &Value) -> Result<PropertyValue, ConvertError> {
        match value {
            Value::Timestamp(at) => {
                let millis = at.unix_timestamp_nanos() / 1_000_000;
                Ok(PropertyValue::String(millis.to_string()))
            }
            other => Err(ConvertError(format!(
                "expected a timestamp, got {}",
                other.kind_name()
            ))),
        }
    }

    fn decode(&self, value: &PropertyValue) -> Result<Value, ConvertError> {
        let millis: i128 = match value {
            PropertyValue::String(text) => text
                .parse()
                .map_err(|_| ConvertError(format!("'{text}' is not a millisecond count")))?,
            PropertyValue::Int(millis) => i128::from(*millis),
            other => {
                return Err(ConvertError(format!(
                    "expected stored milliseconds, got {other}"
                )))
            }
        };
        let nanos = millis
            .checked_mul(1_000_000)
            .ok_or_else(|| ConvertError(format!("{millis} ms is out of range")))?;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map(Value::Timestamp)
            .map_err(|err| ConvertError(err.to_string()))
    }
}

/// Named converters available to converting property fields.
#[derive(Debug, Clone)]
pub struct ConverterRegistry {
    converters: BTreeMap<String, Arc<dyn Converter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Registry holding the built-in converters.
    pub fn new() -> Self {
        let mut registry = Self {
            converters: BTreeMap::new(),
        };
        registry.register(TIMESTAMP_MILLIS, TimestampMillisConverter);
        registry
    }

    /// Registers or replaces a converter.
    pub fn register(&mut self, name: impl Into<String>, converter: impl Converter + 'static) {
        self.converters.insert(name.into(), Arc::new(converter));
    }

    /// Looks a converter up by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Converter>> {
        self.converters.get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.converters.keys().map(String::as_str)
    }
}
