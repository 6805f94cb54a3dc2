//! Header codec: magic marker plus the length-prefixed metadata block.
//!
//! Header block layout (after `header_len: u32`):
//!
//! ```text
//! geometry_type:   u8
//! flags:           u8      bit 0 = index region populated
//! srid:            i32
//! index_node_size: u16     0 = no index region
//! features_count:  u64
//! name:            u32 len + UTF-8
//! column_count:    u16
//! columns:         column_count x { u16 len + UTF-8 name, u8 type tag, u8 nullable }
//! ```

use std::io::{Read, Write};

use geotable_tabular::{ColumnDef, Schema};

use super::wire::{
    put_bytes_u16, put_bytes_u32, read_i32, read_str, read_u16, read_u32, read_u64, read_u8,
};
use super::{check_magic, GeometryType, FLAG_INDEX_POPULATED, MAGIC, MAGIC_LEN, SIZE_PREFIX_LEN};
use crate::codec::value::{column_type_from_tag, column_type_tag};
use crate::config::TableConfig;
use crate::error::{Result, StoreError};
use crate::index::PackedRTree;
use crate::read::FrameBuffer;

/// Decoded header metadata. The single source of truth for decoding the rest
/// of the file.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMeta {
    /// Collection name.
    pub name: String,
    pub geometry_type: GeometryType,
    pub flags: u8,
    pub srid: i32,
    pub index_node_size: u16,
    pub features_count: u64,
    pub columns: Vec<ColumnDef>,
}

impl HeaderMeta {
    /// Header for writing `features_count` rows of `schema` under `config`.
    pub fn for_schema(schema: &Schema, config: &TableConfig, features_count: u64) -> Self {
        let flags = if config.build_index
            && PackedRTree::calc_size(features_count, config.index_node_size) > 0
        {
            FLAG_INDEX_POPULATED
        } else {
            0
        };
        Self {
            name: schema.name().to_string(),
            geometry_type: config.geometry_type,
            flags,
            srid: config.srid,
            index_node_size: config.index_node_size,
            features_count,
            columns: schema.columns().to_vec(),
        }
    }

    /// True when the index region holds a built R-tree.
    #[inline]
    pub fn index_populated(&self) -> bool {
        self.flags & FLAG_INDEX_POPULATED != 0
    }

    /// Byte length of the index region that follows the header.
    #[inline]
    pub fn index_size(&self) -> u64 {
        PackedRTree::calc_size(self.features_count, self.index_node_size)
    }

    /// Rebuild the table schema declared by this header.
    ///
    /// A header whose columns do not form a valid schema (duplicate names)
    /// is a damaged file and fails with `Format`.
    pub fn schema(&self) -> Result<Schema> {
        Schema::new(self.name.clone(), self.columns.clone())
            .map_err(|e| StoreError::format(format!("invalid header schema: {e}")))
    }
}

/// A decoded header together with the offsets of the sections that follow.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderInfo {
    pub meta: HeaderMeta,
    /// Absolute byte offset of the index region.
    pub index_offset: u64,
}

impl HeaderInfo {
    /// Absolute byte offset of the first feature record.
    #[inline]
    pub fn features_offset(&self) -> u64 {
        self.index_offset + self.meta.index_size()
    }
}

/// Encode the header block (without magic or length prefix).
pub fn encode_header(meta: &HeaderMeta) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(64 + meta.columns.len() * 16);
    buf.push(meta.geometry_type.as_u8());
    buf.push(meta.flags);
    buf.extend_from_slice(&meta.srid.to_le_bytes());
    buf.extend_from_slice(&meta.index_node_size.to_le_bytes());
    buf.extend_from_slice(&meta.features_count.to_le_bytes());
    put_bytes_u32(&mut buf, meta.name.as_bytes(), "collection name")?;

    let column_count = u16::try_from(meta.columns.len()).map_err(|_| {
        StoreError::format(format!("too many columns: {}", meta.columns.len()))
    })?;
    buf.extend_from_slice(&column_count.to_le_bytes());
    for column in &meta.columns {
        put_bytes_u16(&mut buf, column.name.as_bytes(), "column name")?;
        buf.push(column_type_tag(column.column_type));
        buf.push(column.nullable as u8);
    }
    Ok(buf)
}

/// Decode a header block. The block must be consumed exactly.
pub fn decode_header(data: &[u8]) -> Result<HeaderMeta> {
    let mut pos = 0;
    let geometry_type = GeometryType::from_u8(read_u8(data, &mut pos, "geometry type")?)?;
    let flags = read_u8(data, &mut pos, "flags")?;
    let srid = read_i32(data, &mut pos, "srid")?;
    let index_node_size = read_u16(data, &mut pos, "index node size")?;
    let features_count = read_u64(data, &mut pos, "features count")?;
    let name_len = read_u32(data, &mut pos, "collection name length")? as usize;
    let name = read_str(data, &mut pos, name_len, "collection name")?.to_string();

    let column_count = read_u16(data, &mut pos, "column count")? as usize;
    let mut columns = Vec::with_capacity(column_count);
    for _ in 0..column_count {
        let len = read_u16(data, &mut pos, "column name length")? as usize;
        let column_name = read_str(data, &mut pos, len, "column name")?.to_string();
        let column_type = column_type_from_tag(read_u8(data, &mut pos, "column type")?)?;
        let nullable = match read_u8(data, &mut pos, "column nullable")? {
            0 => false,
            1 => true,
            b => return Err(StoreError::format(format!("invalid nullable flag {b}"))),
        };
        columns.push(ColumnDef {
            name: column_name,
            column_type,
            nullable,
        });
    }

    if pos != data.len() {
        return Err(StoreError::format(format!(
            "header block has {} trailing bytes",
            data.len() - pos
        )));
    }

    Ok(HeaderMeta {
        name,
        geometry_type,
        flags,
        srid,
        index_node_size,
        features_count,
        columns,
    })
}

/// Write magic, header length and header block. Returns the number of bytes
/// written, which is the absolute offset of the index region.
pub fn write_header<W: Write>(writer: &mut W, meta: &HeaderMeta) -> Result<u64> {
    let block = encode_header(meta)?;
    let block_len = u32::try_from(block.len())
        .map_err(|_| StoreError::format(format!("header block too long: {}", block.len())))?;
    writer.write_all(&MAGIC)?;
    writer.write_all(&block_len.to_le_bytes())?;
    writer.write_all(&block)?;
    Ok((MAGIC_LEN + SIZE_PREFIX_LEN + block.len()) as u64)
}

/// Read and validate the header through `buffer`.
///
/// Never pulls bytes past the end of the header block from `reader`; on
/// return the buffer is empty and `reader` is positioned at the index region.
pub fn read_header<R: Read>(reader: &mut R, buffer: &mut FrameBuffer) -> Result<HeaderInfo> {
    let _span = tracing::debug_span!("read_header").entered();

    let prefix_len = MAGIC_LEN + SIZE_PREFIX_LEN;
    buffer.fill_exact(reader, MAGIC_LEN, "magic")?;
    check_magic(buffer.data())?;
    buffer.fill_exact(reader, prefix_len, "header length")?;
    let mut pos = MAGIC_LEN;
    let block_len = read_u32(buffer.data(), &mut pos, "header length")? as usize;

    let total = prefix_len
        .checked_add(block_len)
        .ok_or_else(|| StoreError::format("header length overflows"))?;
    if total > buffer.capacity() {
        return Err(StoreError::format(format!(
            "header block of {block_len} bytes exceeds working buffer capacity {}",
            buffer.capacity()
        )));
    }
    buffer.fill_exact(reader, total, "header block")?;
    let meta = decode_header(&buffer.data()[prefix_len..total])?;
    buffer.consume(total);

    tracing::debug!(
        name = %meta.name,
        features = meta.features_count,
        columns = meta.columns.len(),
        node_size = meta.index_node_size,
        header_bytes = total,
        "header read"
    );

    Ok(HeaderInfo {
        meta,
        index_offset: total as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use geotable_tabular::ColumnType;
    use std::io::Cursor;

    fn sample_meta() -> HeaderMeta {
        HeaderMeta {
            name: "parks".into(),
            geometry_type: GeometryType::Polygon,
            flags: FLAG_INDEX_POPULATED,
            srid: 4326,
            index_node_size: 16,
            features_count: 42,
            columns: vec![
                ColumnDef::new("name", ColumnType::String),
                ColumnDef::new("area_id", ColumnType::Long).not_null(),
                ColumnDef::new("tags", ColumnType::Json),
            ],
        }
    }

    fn written(meta: &HeaderMeta) -> Vec<u8> {
        let mut out = Vec::new();
        write_header(&mut out, meta).unwrap();
        out
    }

    #[test]
    fn test_header_roundtrip_and_offsets() {
        let meta = sample_meta();
        let mut bytes = written(&meta);
        let header_len = bytes.len() as u64;
        bytes.extend_from_slice(&[0xAA; 16]); // start of the index region

        let mut cursor = Cursor::new(bytes);
        let mut buffer = FrameBuffer::new(1024);
        let info = read_header(&mut cursor, &mut buffer).unwrap();

        assert_eq!(info.meta, meta);
        assert_eq!(info.index_offset, header_len);
        assert_eq!(info.features_offset(), header_len + meta.index_size());
        // Nothing past the header block was pulled from the reader.
        assert_eq!(cursor.position(), header_len);
        assert_eq!(buffer.available(), 0);
    }

    #[test]
    fn test_schema_from_header() {
        let meta = sample_meta();
        let schema = meta.schema().unwrap();
        assert_eq!(schema.name(), "parks");
        assert_eq!(schema.columns(), meta.columns.as_slice());
    }

    #[test]
    fn test_duplicate_header_columns_are_format_errors() {
        let mut meta = sample_meta();
        meta.columns[2].name = "name".into();
        let mut bytes = written(&meta);
        bytes.extend_from_slice(&[0; 16]);

        // The block itself decodes; the schema it declares is invalid.
        let mut buffer = FrameBuffer::new(1024);
        let info = read_header(&mut Cursor::new(bytes), &mut buffer).unwrap();
        let err = info.meta.schema().unwrap_err();
        assert!(err.is_format(), "{err}");
        assert!(err.to_string().contains("invalid header schema"));
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = written(&sample_meta());
        bytes[0] = b'x';
        let err = read_header(&mut Cursor::new(bytes), &mut FrameBuffer::new(1024)).unwrap_err();
        assert!(matches!(err, StoreError::Format(_)));
        assert!(err.to_string().contains("not a recognized file"));
    }

    #[test]
    fn test_truncated_header() {
        let bytes = written(&sample_meta());
        for cut in [3, MAGIC_LEN + 2, bytes.len() - 1] {
            let err = read_header(&mut Cursor::new(&bytes[..cut]), &mut FrameBuffer::new(1024))
                .unwrap_err();
            assert!(matches!(err, StoreError::Format(_)), "cut at {cut}: {err}");
        }
    }

    #[test]
    fn test_header_larger_than_buffer() {
        let bytes = written(&sample_meta());
        let err = read_header(&mut Cursor::new(bytes), &mut FrameBuffer::new(32)).unwrap_err();
        assert!(err.to_string().contains("exceeds working buffer capacity"));
    }

    #[test]
    fn test_unknown_column_type_tag() {
        let meta = HeaderMeta {
            columns: vec![ColumnDef::new("x", ColumnType::Int)],
            ..sample_meta()
        };
        let mut bytes = written(&meta);
        // Column tag sits two bytes before the end (tag, nullable).
        let tag_pos = bytes.len() - 2;
        bytes[tag_pos] = 200;
        let err = read_header(&mut Cursor::new(bytes), &mut FrameBuffer::new(1024)).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedType(200)));
    }

    #[test]
    fn test_trailing_bytes_in_block_rejected() {
        let mut block = encode_header(&sample_meta()).unwrap();
        block.push(0);
        let err = decode_header(&block).unwrap_err();
        assert!(err.to_string().contains("trailing bytes"));
    }

    #[test]
    fn test_for_schema_flags() {
        let schema = sample_meta().schema().unwrap();

        let meta = HeaderMeta::for_schema(&schema, &TableConfig::default(), 10);
        assert!(meta.index_populated());
        assert_eq!(meta.srid, 3857);

        let meta = HeaderMeta::for_schema(
            &schema,
            &TableConfig::default().with_build_index(false),
            10,
        );
        assert!(!meta.index_populated());

        // Nothing to index for an empty table.
        let meta = HeaderMeta::for_schema(&schema, &TableConfig::default(), 0);
        assert!(!meta.index_populated());
        assert_eq!(meta.index_size(), 0);
    }
}
