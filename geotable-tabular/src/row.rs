//! Rows and attribute values.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::schema::{ColumnType, Schema};
use crate::Geometry;

/// A single attribute value.
///
/// Each non-null variant corresponds to exactly one [`ColumnType`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Byte(i8),
    UByte(u8),
    Bool(bool),
    Short(i16),
    UShort(u16),
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Float(f32),
    Double(f64),
    String(String),
    Json(serde_json::Value),
    DateTime(DateTime<Utc>),
    Binary(Vec<u8>),
}

impl Value {
    /// Column type this value belongs to, `None` for [`Value::Null`].
    pub fn column_type(&self) -> Option<ColumnType> {
        Some(match self {
            Self::Null => return None,
            Self::Byte(_) => ColumnType::Byte,
            Self::UByte(_) => ColumnType::UByte,
            Self::Bool(_) => ColumnType::Bool,
            Self::Short(_) => ColumnType::Short,
            Self::UShort(_) => ColumnType::UShort,
            Self::Int(_) => ColumnType::Int,
            Self::UInt(_) => ColumnType::UInt,
            Self::Long(_) => ColumnType::Long,
            Self::ULong(_) => ColumnType::ULong,
            Self::Float(_) => ColumnType::Float,
            Self::Double(_) => ColumnType::Double,
            Self::String(_) => ColumnType::String,
            Self::Json(_) => ColumnType::Json,
            Self::DateTime(_) => ColumnType::DateTime,
            Self::Binary(_) => ColumnType::Binary,
        })
    }

    /// Short variant name, for error messages.
    pub fn kind(&self) -> &'static str {
        self.column_type().map_or("null", |t| t.name())
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get string value (returns None if wrong type or null).
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get boolean value (returns None if wrong type or null).
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Get any integer value widened to i64.
    ///
    /// Returns None for non-integer types, null, and `ULong` values above
    /// `i64::MAX`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Byte(v) => Some(*v as i64),
            Self::UByte(v) => Some(*v as i64),
            Self::Short(v) => Some(*v as i64),
            Self::UShort(v) => Some(*v as i64),
            Self::Int(v) => Some(*v as i64),
            Self::UInt(v) => Some(*v as i64),
            Self::Long(v) => Some(*v),
            Self::ULong(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// Get a floating point value widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Get bytes value (returns None if wrong type or null).
    #[inline]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Render as a JSON value.
    ///
    /// Timestamps become RFC 3339 strings and binary values lowercase hex.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Byte(v) => Json::from(*v),
            Self::UByte(v) => Json::from(*v),
            Self::Short(v) => Json::from(*v),
            Self::UShort(v) => Json::from(*v),
            Self::Int(v) => Json::from(*v),
            Self::UInt(v) => Json::from(*v),
            Self::Long(v) => Json::from(*v),
            Self::ULong(v) => Json::from(*v),
            Self::Float(v) => Json::from(*v),
            Self::Double(v) => Json::from(*v),
            Self::String(s) => Json::String(s.clone()),
            Self::Json(j) => j.clone(),
            Self::DateTime(dt) => Json::String(dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Self::Binary(b) => {
                Json::String(b.iter().map(|byte| format!("{byte:02x}")).collect())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// One feature: positional attribute values plus an optional geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Values in schema column order.
    pub values: Vec<Value>,
    /// Geometry slot, outside the column list.
    pub geometry: Option<Geometry>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            geometry: None,
        }
    }

    /// Attach a geometry.
    pub fn with_geometry(mut self, geometry: impl Into<Geometry>) -> Self {
        self.geometry = Some(geometry.into());
        self
    }

    /// A row of `n` nulls and no geometry.
    pub fn nulls(n: usize) -> Self {
        Self::new(vec![Value::Null; n])
    }

    /// Value at column position `index`.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of the column called `name` in `schema`.
    pub fn get_by_name(&self, schema: &Schema, name: &str) -> Option<&Value> {
        schema.index_of(name).and_then(|i| self.get(i))
    }

    /// Number of attribute values (geometry not counted).
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
