//! Column type tags and attribute value encoding.
//!
//! Fixed-width types are stored little-endian at their natural width.
//! `DateTime` is an `i64` count of seconds since the Unix epoch followed by
//! `u32` nanoseconds, which covers the full range of `DateTime<Utc>`.
//! `String`, `Json` and `Binary` are a `u32` length followed by the payload;
//! JSON is stored as serialized text.

use chrono::DateTime;
use geotable_tabular::{ColumnDef, ColumnType, Row, Value};

use crate::error::{Result, StoreError};
use crate::format::wire::{
    put_bytes_u32, read_f32, read_f64, read_i16, read_i32, read_i64, read_i8, read_slice,
    read_str, read_u16, read_u32, read_u64, read_u8,
};

/// Binary tag of a column type.
pub fn column_type_tag(column_type: ColumnType) -> u8 {
    match column_type {
        ColumnType::Byte => 0,
        ColumnType::UByte => 1,
        ColumnType::Bool => 2,
        ColumnType::Short => 3,
        ColumnType::UShort => 4,
        ColumnType::Int => 5,
        ColumnType::UInt => 6,
        ColumnType::Long => 7,
        ColumnType::ULong => 8,
        ColumnType::Float => 9,
        ColumnType::Double => 10,
        ColumnType::String => 11,
        ColumnType::Json => 12,
        ColumnType::DateTime => 13,
        ColumnType::Binary => 14,
    }
}

/// Column type for a binary tag.
pub fn column_type_from_tag(tag: u8) -> Result<ColumnType> {
    Ok(match tag {
        0 => ColumnType::Byte,
        1 => ColumnType::UByte,
        2 => ColumnType::Bool,
        3 => ColumnType::Short,
        4 => ColumnType::UShort,
        5 => ColumnType::Int,
        6 => ColumnType::UInt,
        7 => ColumnType::Long,
        8 => ColumnType::ULong,
        9 => ColumnType::Float,
        10 => ColumnType::Double,
        11 => ColumnType::String,
        12 => ColumnType::Json,
        13 => ColumnType::DateTime,
        14 => ColumnType::Binary,
        _ => return Err(StoreError::UnsupportedType(tag)),
    })
}

/// Append a non-null `value` declared as `column`.
///
/// The value variant must match the column type exactly; there is no
/// implicit widening.
pub fn encode_value(buf: &mut Vec<u8>, column: &ColumnDef, value: &Value) -> Result<()> {
    let mismatch = || StoreError::TypeConversion {
        column: column.name.clone(),
        expected: column.column_type,
        found: value.kind(),
    };

    match (column.column_type, value) {
        (ColumnType::Byte, Value::Byte(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::UByte, Value::UByte(v)) => buf.push(*v),
        (ColumnType::Bool, Value::Bool(v)) => buf.push(*v as u8),
        (ColumnType::Short, Value::Short(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::UShort, Value::UShort(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::Int, Value::Int(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::UInt, Value::UInt(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::Long, Value::Long(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::ULong, Value::ULong(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::Float, Value::Float(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::Double, Value::Double(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::String, Value::String(s)) => put_bytes_u32(buf, s.as_bytes(), "string")?,
        (ColumnType::Json, Value::Json(j)) => {
            let text = serde_json::to_vec(j)
                .map_err(|e| StoreError::format(format!("json encode: {e}")))?;
            put_bytes_u32(buf, &text, "json")?;
        }
        (ColumnType::DateTime, Value::DateTime(dt)) => {
            buf.extend_from_slice(&dt.timestamp().to_le_bytes());
            buf.extend_from_slice(&dt.timestamp_subsec_nanos().to_le_bytes());
        }
        (ColumnType::Binary, Value::Binary(b)) => put_bytes_u32(buf, b, "binary")?,
        _ => return Err(mismatch()),
    }
    Ok(())
}

/// Decode one value of `column_type` at `pos`, advancing.
pub fn decode_value(data: &[u8], pos: &mut usize, column_type: ColumnType) -> Result<Value> {
    Ok(match column_type {
        ColumnType::Byte => Value::Byte(read_i8(data, pos, "byte value")?),
        ColumnType::UByte => Value::UByte(read_u8(data, pos, "ubyte value")?),
        ColumnType::Bool => match read_u8(data, pos, "bool value")? {
            0 => Value::Bool(false),
            1 => Value::Bool(true),
            b => return Err(StoreError::format(format!("invalid bool byte {b}"))),
        },
        ColumnType::Short => Value::Short(read_i16(data, pos, "short value")?),
        ColumnType::UShort => Value::UShort(read_u16(data, pos, "ushort value")?),
        ColumnType::Int => Value::Int(read_i32(data, pos, "int value")?),
        ColumnType::UInt => Value::UInt(read_u32(data, pos, "uint value")?),
        ColumnType::Long => Value::Long(read_i64(data, pos, "long value")?),
        ColumnType::ULong => Value::ULong(read_u64(data, pos, "ulong value")?),
        ColumnType::Float => Value::Float(read_f32(data, pos, "float value")?),
        ColumnType::Double => Value::Double(read_f64(data, pos, "double value")?),
        ColumnType::String => {
            let len = read_u32(data, pos, "string length")? as usize;
            Value::String(read_str(data, pos, len, "string value")?.to_string())
        }
        ColumnType::Json => {
            let len = read_u32(data, pos, "json length")? as usize;
            let text = read_slice(data, pos, len, "json value")?;
            Value::Json(
                serde_json::from_slice(text)
                    .map_err(|e| StoreError::format(format!("invalid json value: {e}")))?,
            )
        }
        ColumnType::DateTime => {
            let secs = read_i64(data, pos, "datetime seconds")?;
            let nanos = read_u32(data, pos, "datetime nanoseconds")?;
            let dt = DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
                StoreError::format(format!("datetime out of range: {secs}s {nanos}ns"))
            })?;
            Value::DateTime(dt)
        }
        ColumnType::Binary => {
            let len = read_u32(data, pos, "binary length")? as usize;
            Value::Binary(read_slice(data, pos, len, "binary value")?.to_vec())
        }
    })
}

/// Encode the sparse properties vector of `row`: `{ u16 column index }{ value }`
/// for every non-null value, in column order.
pub fn encode_properties(buf: &mut Vec<u8>, columns: &[ColumnDef], row: &Row) -> Result<()> {
    if row.values.len() != columns.len() {
        return Err(StoreError::RowArity {
            expected: columns.len(),
            found: row.values.len(),
        });
    }
    for (i, (column, value)) in columns.iter().zip(&row.values).enumerate() {
        if value.is_null() {
            if !column.nullable {
                return Err(StoreError::TypeConversion {
                    column: column.name.clone(),
                    expected: column.column_type,
                    found: value.kind(),
                });
            }
            continue;
        }
        // Column count is bounded by the u16 header field.
        buf.extend_from_slice(&(i as u16).to_le_bytes());
        encode_value(buf, column, value)?;
    }
    Ok(())
}

/// Decode a properties vector into one value per column. Columns absent
/// from the vector decode as [`Value::Null`].
pub fn decode_properties(data: &[u8], columns: &[ColumnDef]) -> Result<Vec<Value>> {
    let mut values = vec![Value::Null; columns.len()];
    let mut seen = vec![false; columns.len()];
    let mut pos = 0;
    while pos < data.len() {
        let index = read_u16(data, &mut pos, "column index")? as usize;
        let column = columns.get(index).ok_or_else(|| {
            StoreError::format(format!(
                "property refers to column {index} but the schema has {}",
                columns.len()
            ))
        })?;
        if std::mem::replace(&mut seen[index], true) {
            return Err(StoreError::format(format!(
                "duplicate property for column '{}'",
                column.name
            )));
        }
        values[index] = decode_value(data, &mut pos, column.column_type)?;
    }
    Ok(values)
}
