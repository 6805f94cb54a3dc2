//! Table schemas: an ordered list of named, typed columns.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabularError};

/// Attribute column types.
///
/// The geometry slot of a row is implicit and has no column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Byte,
    UByte,
    Bool,
    Short,
    UShort,
    Int,
    UInt,
    Long,
    ULong,
    Float,
    Double,
    String,
    /// JSON document, stored as serialized text.
    Json,
    /// UTC timestamp.
    DateTime,
    Binary,
}

impl ColumnType {
    /// All column types, in declaration order.
    pub const ALL: [ColumnType; 15] = [
        ColumnType::Byte,
        ColumnType::UByte,
        ColumnType::Bool,
        ColumnType::Short,
        ColumnType::UShort,
        ColumnType::Int,
        ColumnType::UInt,
        ColumnType::Long,
        ColumnType::ULong,
        ColumnType::Float,
        ColumnType::Double,
        ColumnType::String,
        ColumnType::Json,
        ColumnType::DateTime,
        ColumnType::Binary,
    ];

    /// Lowercase display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::UByte => "ubyte",
            Self::Bool => "bool",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::Float => "float",
            Self::Double => "double",
            Self::String => "string",
            Self::Json => "json",
            Self::DateTime => "datetime",
            Self::Binary => "binary",
        }
    }

    /// Encoded width in bytes for fixed-width types, `None` for
    /// variable-length ones.
    pub fn fixed_width(&self) -> Option<usize> {
        match self {
            Self::Byte | Self::UByte | Self::Bool => Some(1),
            Self::Short | Self::UShort => Some(2),
            Self::Int | Self::UInt | Self::Float => Some(4),
            Self::Long | Self::ULong | Self::Double => Some(8),
            Self::DateTime => Some(12),
            Self::String | Self::Json | Self::Binary => None,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single column definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name, unique within a schema.
    pub name: String,
    /// Declared value type.
    pub column_type: ColumnType,
    /// Whether rows may leave this column null.
    pub nullable: bool,
}

impl ColumnDef {
    /// A nullable column.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
        }
    }

    /// Mark the column as required.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

/// Ordered, named collection of columns.
///
/// Column order is stable and defines the positional order of values in
/// every [`Row`](crate::Row) bound to this schema.
#[derive(Debug, Clone)]
pub struct Schema {
    name: String,
    columns: Vec<ColumnDef>,
    name_to_index: HashMap<String, usize>,
}

impl Schema {
    /// Create a schema, rejecting duplicate column names.
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Result<Self> {
        let mut name_to_index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if name_to_index.insert(column.name.clone(), i).is_some() {
                return Err(TabularError::Schema(format!(
                    "duplicate column name '{}'",
                    column.name
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            columns,
            name_to_index,
        })
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column definitions in order.
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    /// Column definition at `index`.
    #[inline]
    pub fn column(&self, index: usize) -> Option<&ColumnDef> {
        self.columns.get(index)
    }

    /// Position of the column called `name`.
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Number of columns (the geometry slot is not counted).
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.columns == other.columns
    }
}

impl Eq for Schema {}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> Schema {
        Schema::new(
            "parks",
            vec![
                ColumnDef::new("name", ColumnType::String),
                ColumnDef::new("area_id", ColumnType::Long).not_null(),
                ColumnDef::new("open", ColumnType::Bool),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_schema_lookup() {
        let schema = sample_schema();

        assert_eq!(schema.name(), "parks");
        assert_eq!(schema.num_columns(), 3);
        assert_eq!(schema.index_of("name"), Some(0));
        assert_eq!(schema.index_of("open"), Some(2));
        assert_eq!(schema.index_of("missing"), None);
        assert!(!schema.column(1).unwrap().nullable);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let err = Schema::new(
            "dup",
            vec![
                ColumnDef::new("a", ColumnType::Int),
                ColumnDef::new("a", ColumnType::Long),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate column name 'a'"));
    }

    #[test]
    fn test_schema_equality_ignores_lookup_table() {
        let a = sample_schema();
        let b = Schema::new("parks", a.columns().to_vec()).unwrap();
        assert_eq!(a, b);

        let renamed = Schema::new("gardens", a.columns().to_vec()).unwrap();
        assert_ne!(a, renamed);
    }

    #[test]
    fn test_fixed_width() {
        assert_eq!(ColumnType::Bool.fixed_width(), Some(1));
        assert_eq!(ColumnType::UShort.fixed_width(), Some(2));
        assert_eq!(ColumnType::Float.fixed_width(), Some(4));
        assert_eq!(ColumnType::ULong.fixed_width(), Some(8));
        assert_eq!(ColumnType::DateTime.fixed_width(), Some(12));
        assert_eq!(ColumnType::Json.fixed_width(), None);
        assert_eq!(ColumnType::DateTime.to_string(), "datetime");
    }
}
