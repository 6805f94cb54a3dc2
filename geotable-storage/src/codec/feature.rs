//! Feature record codec.
//!
//! ```text
//! record_len:     u32          (length prefix, not part of the record)
//! properties_len: u32
//! properties:     properties_len bytes, see [`super::value::encode_properties`]
//! has_geometry:   u8           0 or 1
//! geometry:       tagged geometry when has_geometry == 1
//! ```

use geotable_tabular::{ColumnDef, Row};

use super::geometry::{decode_geometry, encode_geometry};
use super::value::{decode_properties, encode_properties};
use crate::error::{Result, StoreError};
use crate::format::wire::{count_u32, read_slice, read_u32, read_u8};
use crate::format::{GeometryType, SIZE_PREFIX_LEN};

/// Encodes rows into size-prefixed feature records.
///
/// The two scratch vectors are reused across rows and cleared per feature.
pub struct FeatureEncoder<'a> {
    columns: &'a [ColumnDef],
    geometry_type: GeometryType,
    properties: Vec<u8>,
    record: Vec<u8>,
}

impl<'a> FeatureEncoder<'a> {
    pub fn new(columns: &'a [ColumnDef], geometry_type: GeometryType) -> Self {
        Self {
            columns,
            geometry_type,
            properties: Vec::with_capacity(256),
            record: Vec::with_capacity(1024),
        }
    }

    /// Encode `row` and return the complete record, length prefix included.
    pub fn encode(&mut self, row: &Row) -> Result<&[u8]> {
        self.properties.clear();
        encode_properties(&mut self.properties, self.columns, row)?;

        self.record.clear();
        self.record.extend_from_slice(&[0u8; SIZE_PREFIX_LEN]);
        self.record
            .extend_from_slice(&count_u32(self.properties.len(), "properties byte")?.to_le_bytes());
        self.record.extend_from_slice(&self.properties);
        match &row.geometry {
            Some(geometry) => {
                self.record.push(1);
                encode_geometry(&mut self.record, self.geometry_type, geometry)?;
            }
            None => self.record.push(0),
        }

        let body_len = count_u32(self.record.len() - SIZE_PREFIX_LEN, "record byte")?;
        self.record[..SIZE_PREFIX_LEN].copy_from_slice(&body_len.to_le_bytes());
        Ok(&self.record)
    }
}

/// Decode one feature record (without its length prefix) into a row.
pub fn decode_feature(
    record: &[u8],
    columns: &[ColumnDef],
    geometry_type: GeometryType,
) -> Result<Row> {
    let mut pos = 0;
    let properties_len = read_u32(record, &mut pos, "properties length")? as usize;
    let properties = read_slice(record, &mut pos, properties_len, "properties")?;
    let values = decode_properties(properties, columns)?;

    let geometry = match read_u8(record, &mut pos, "geometry flag")? {
        0 => None,
        1 => Some(decode_geometry(record, &mut pos, geometry_type)?),
        b => return Err(StoreError::format(format!("invalid geometry flag {b}"))),
    };

    if pos != record.len() {
        return Err(StoreError::format(format!(
            "feature record has {} trailing bytes",
            record.len() - pos
        )));
    }
    Ok(Row { values, geometry })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo_types::polygon;
    use geotable_tabular::{ColumnType, Value};

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("name", ColumnType::String),
            ColumnDef::new("area_id", ColumnType::Long),
        ]
    }

    #[test]
    fn test_record_layout_and_decode() {
        let columns = columns();
        let row = Row::new(vec!["park".into(), Value::Long(42)]).with_geometry(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]);

        let mut encoder = FeatureEncoder::new(&columns, GeometryType::Polygon);
        let framed = encoder.encode(&row).unwrap().to_vec();

        let body_len = u32::from_le_bytes(framed[0..4].try_into().unwrap()) as usize;
        assert_eq!(body_len + SIZE_PREFIX_LEN, framed.len());

        let decoded = decode_feature(&framed[4..], &columns, GeometryType::Polygon).unwrap();
        assert_eq!(decoded, row);
    }

    #[test]
    fn test_encoder_reuse_does_not_leak_between_rows() {
        let columns = columns();
        let mut encoder = FeatureEncoder::new(&columns, GeometryType::Unknown);

        let big = Row::new(vec![Value::String("x".repeat(500)), Value::Long(1)]);
        let small = Row::new(vec![Value::Null, Value::Long(2)]);
        encoder.encode(&big).unwrap();
        let framed = encoder.encode(&small).unwrap().to_vec();

        let decoded = decode_feature(&framed[4..], &columns, GeometryType::Unknown).unwrap();
        assert_eq!(decoded, small);
        assert!(decoded.geometry.is_none());
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let columns = columns();
        let mut encoder = FeatureEncoder::new(&columns, GeometryType::Unknown);
        let mut framed = encoder.encode(&Row::nulls(2)).unwrap().to_vec();
        framed.push(0);
        let err = decode_feature(&framed[4..], &columns, GeometryType::Unknown).unwrap_err();
        assert!(err.to_string().contains("1 trailing bytes"));
    }

    #[test]
    fn test_bad_geometry_flag() {
        let mut record = 0u32.to_le_bytes().to_vec();
        record.push(7);
        let err = decode_feature(&record, &columns(), GeometryType::Unknown).unwrap_err();
        assert!(err.to_string().contains("invalid geometry flag 7"));
    }
}
