//! Table writer: rows -> header, index region, feature stream.
//!
//! The feature count is taken from the row source up front and written into
//! the header before any feature, so the source must know its length. The
//! index region is reserved zero-filled, features are streamed after it, and
//! the built R-tree is then written back over the reserved bytes.

use std::io::{self, Read, Seek, SeekFrom, Write};

use geotable_tabular::{Row, Schema};

use crate::codec::FeatureEncoder;
use crate::config::TableConfig;
use crate::error::{Result, StoreError};
use crate::format::{write_header, HeaderMeta};
use crate::index::{NodeItem, PackedRTree};

/// Byte layout and counts of a written table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub features: u64,
    /// Magic, header length prefix and header block.
    pub header_bytes: u64,
    pub index_bytes: u64,
    pub feature_bytes: u64,
    /// True when the index region holds a built R-tree.
    pub index_built: bool,
}

impl WriteStats {
    /// Total bytes written.
    pub fn total_bytes(&self) -> u64 {
        self.header_bytes + self.index_bytes + self.feature_bytes
    }
}

/// Write a complete table for `schema` to `writer`.
///
/// `rows` is iterated exactly once. Its reported length becomes the declared
/// feature count; a source that yields a different number of rows fails the
/// write. On error the bytes already written are not a valid table.
pub fn write_table<W, I>(
    writer: &mut W,
    schema: &Schema,
    config: &TableConfig,
    rows: I,
) -> Result<WriteStats>
where
    W: Write + Seek,
    I: IntoIterator<Item = Row>,
    I::IntoIter: ExactSizeIterator,
{
    config.validate()?;
    let rows = rows.into_iter();
    let count = rows.len() as u64;
    let _span =
        tracing::debug_span!("write_table", name = schema.name(), features = count).entered();

    // 1. Header
    let meta = HeaderMeta::for_schema(schema, config, count);
    let start = writer.stream_position()?;
    let header_bytes = write_header(writer, &meta)?;
    if header_bytes as usize > config.buffer_capacity {
        return Err(StoreError::format(format!(
            "header of {header_bytes} bytes exceeds working buffer capacity {}",
            config.buffer_capacity
        )));
    }

    // 2. Reserve the index region
    let index_bytes = meta.index_size();
    let reserved = io::copy(&mut io::repeat(0).take(index_bytes), writer)?;
    debug_assert_eq!(reserved, index_bytes);

    // 3. Stream features, collecting leaf envelopes
    let build_index = meta.index_populated();
    let mut leaves = Vec::new();
    let mut encoder = FeatureEncoder::new(schema.columns(), config.geometry_type);
    let mut feature_bytes = 0u64;
    let mut written = 0u64;
    for row in rows {
        if written == count {
            return Err(StoreError::format(format!(
                "row source yielded more than the declared {count} rows"
            )));
        }
        let record = encoder.encode(&row)?;
        let len = record.len();
        if len > config.buffer_capacity {
            return Err(StoreError::format(format!(
                "feature {written} of {len} bytes exceeds working buffer capacity {}",
                config.buffer_capacity
            )));
        }
        writer.write_all(record)?;
        if build_index {
            leaves.push(NodeItem::from_geometry(row.geometry.as_ref(), feature_bytes));
        }
        feature_bytes += len as u64;
        written += 1;
    }
    if written != count {
        return Err(StoreError::format(format!(
            "declared {count} rows but row source yielded {written}"
        )));
    }

    // 4. Back-patch the index region
    if build_index {
        let tree = PackedRTree::build(&leaves, meta.index_node_size)?;
        debug_assert_eq!(tree.byte_size(), index_bytes);
        writer.seek(SeekFrom::Start(start + header_bytes))?;
        tree.write_to(writer)?;
        writer.seek(SeekFrom::Start(start + header_bytes + index_bytes + feature_bytes))?;
    } else if index_bytes > 0 {
        tracing::warn!(
            name = schema.name(),
            index_bytes,
            "index region reserved but not populated; spatial search unavailable"
        );
    }
    writer.flush()?;

    let stats = WriteStats {
        features: count,
        header_bytes,
        index_bytes,
        feature_bytes,
        index_built: build_index,
    };
    tracing::debug!(
        features = stats.features,
        header_bytes,
        index_bytes,
        feature_bytes,
        index_built = build_index,
        "table written"
    );
    Ok(stats)
}
