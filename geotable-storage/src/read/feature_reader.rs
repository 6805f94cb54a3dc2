//! Streaming row decoder over a forward-only byte source.
//!
//! A [`FeatureReader`] owns its reader and a single [`FrameBuffer`]. Opening
//! it reads the header and skips the index region; each call to
//! [`Iterator::next`] then decodes exactly one size-prefixed feature record.
//! The reader is released when the decoder is dropped, whether iteration ran
//! to the end, failed, or was abandoned.

use std::io::Read;
use std::iter::FusedIterator;

use geotable_tabular::Row;

use crate::codec::decode_feature;
use crate::error::{Result, StoreError};
use crate::format::wire::read_u32;
use crate::format::{read_header, HeaderInfo, SIZE_PREFIX_LEN};
use crate::read::FrameBuffer;

/// Where the decoder stands in the feature stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    /// Header read and index skipped; no feature decoded yet.
    Positioned,
    /// At least one feature decoded and more remain.
    Reading,
    /// Every declared feature has been decoded.
    Exhausted,
    /// A read or decode error ended iteration early.
    Failed,
}

pub struct FeatureReader<R: Read> {
    reader: R,
    buffer: FrameBuffer,
    header: HeaderInfo,
    cursor: u64,
    state: DecoderState,
}

impl<R: Read> FeatureReader<R> {
    /// Read the header from `reader` and position the decoder at the first
    /// feature. `capacity` bounds the largest header block and feature
    /// record that can be decoded.
    pub fn open(mut reader: R, capacity: usize) -> Result<Self> {
        let mut buffer = FrameBuffer::new(capacity);
        let header = read_header(&mut reader, &mut buffer)?;
        buffer.skip(&mut reader, header.meta.index_size(), "index region")?;

        let state = if header.meta.features_count == 0 {
            DecoderState::Exhausted
        } else {
            DecoderState::Positioned
        };
        tracing::trace!(
            features = header.meta.features_count,
            features_offset = header.features_offset(),
            capacity,
            "feature reader opened"
        );
        Ok(Self {
            reader,
            buffer,
            header,
            cursor: 0,
            state,
        })
    }

    #[inline]
    pub fn header(&self) -> &HeaderInfo {
        &self.header
    }

    #[inline]
    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Number of features decoded so far.
    #[inline]
    pub fn position(&self) -> u64 {
        self.cursor
    }

    /// Features declared by the header.
    #[inline]
    pub fn features_count(&self) -> u64 {
        self.header.meta.features_count
    }

    /// True while declared features remain and no error has occurred.
    #[inline]
    pub fn has_next(&self) -> bool {
        matches!(self.state, DecoderState::Positioned | DecoderState::Reading)
    }

    fn read_feature(&mut self) -> Result<Row> {
        self.buffer
            .fill(&mut self.reader, SIZE_PREFIX_LEN, "feature length")?;
        let mut pos = 0;
        let len = read_u32(self.buffer.data(), &mut pos, "feature length")? as usize;

        let frame = SIZE_PREFIX_LEN + len;
        if frame > self.buffer.capacity() {
            return Err(StoreError::format(format!(
                "feature {} of {len} bytes exceeds working buffer capacity {}",
                self.cursor,
                self.buffer.capacity()
            )));
        }
        self.buffer.fill(&mut self.reader, frame, "feature record")?;

        let meta = &self.header.meta;
        let row = decode_feature(
            &self.buffer.data()[SIZE_PREFIX_LEN..frame],
            &meta.columns,
            meta.geometry_type,
        )?;
        self.buffer.consume(frame);
        tracing::trace!(feature = self.cursor, bytes = frame, "feature decoded");
        Ok(row)
    }
}

impl<R: Read> Iterator for FeatureReader<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if !self.has_next() {
            return None;
        }
        match self.read_feature() {
            Ok(row) => {
                self.cursor += 1;
                self.state = if self.cursor == self.features_count() {
                    DecoderState::Exhausted
                } else {
                    DecoderState::Reading
                };
                Some(Ok(row))
            }
            Err(err) => {
                tracing::debug!(feature = self.cursor, error = %err, "feature read failed");
                self.state = DecoderState::Failed;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if !self.has_next() {
            return (0, Some(0));
        }
        let remaining = self.features_count() - self.cursor;
        // A failure can end iteration before the declared count.
        (0, usize::try_from(remaining).ok())
    }
}

impl<R: Read> FusedIterator for FeatureReader<R> {}

impl<R: Read> Drop for FeatureReader<R> {
    fn drop(&mut self) {
        tracing::trace!(
            state = ?self.state,
            decoded = self.cursor,
            "feature reader released"
        );
    }
}

impl<R: Read> std::fmt::Debug for FeatureReader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureReader")
            .field("header", &self.header)
            .field("buffer", &self.buffer)
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::FeatureEncoder;
    use crate::format::header::{write_header, HeaderMeta};
    use crate::format::GeometryType;
    use geo_types::point;
    use geotable_tabular::{ColumnDef, ColumnType, Value};
    use std::cell::Cell;
    use std::io::{self, Cursor};
    use std::rc::Rc;

    struct Chunked<R> {
        inner: R,
        chunk: usize,
    }

    impl<R: Read> Read for Chunked<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = buf.len().min(self.chunk);
            self.inner.read(&mut buf[..n])
        }
    }

    /// Counts how many times it is dropped.
    struct DropCounter<R> {
        inner: R,
        drops: Rc<Cell<u32>>,
    }

    impl<R: Read> Read for DropCounter<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl<R> Drop for DropCounter<R> {
        fn drop(&mut self) {
            self.drops.set(self.drops.get() + 1);
        }
    }

    fn columns() -> Vec<ColumnDef> {
        vec![
            ColumnDef::new("label", ColumnType::String),
            ColumnDef::new("rank", ColumnType::Int),
        ]
    }

    fn rows(n: usize, label_len: usize) -> Vec<Row> {
        (0..n)
            .map(|i| {
                Row::new(vec![
                    Value::String("x".repeat(label_len)),
                    Value::Int(i as i32),
                ])
                .with_geometry(point!(x: i as f64, y: -(i as f64)))
            })
            .collect()
    }

    /// Header, a zero-filled index region and encoded features.
    fn table_bytes(rows: &[Row], node_size: u16) -> Vec<u8> {
        let meta = HeaderMeta {
            name: "points".into(),
            geometry_type: GeometryType::Point,
            flags: 0,
            srid: 4326,
            index_node_size: node_size,
            features_count: rows.len() as u64,
            columns: columns(),
        };
        let mut out = Vec::new();
        write_header(&mut out, &meta).unwrap();
        out.resize(out.len() + meta.index_size() as usize, 0);
        let columns = columns();
        let mut encoder = FeatureEncoder::new(&columns, GeometryType::Point);
        for row in rows {
            out.extend_from_slice(encoder.encode(row).unwrap());
        }
        out
    }

    #[test]
    fn test_reads_all_features() {
        let expected = rows(25, 3);
        let bytes = table_bytes(&expected, 4);
        let mut reader = FeatureReader::open(Cursor::new(bytes), 1024).unwrap();
        assert_eq!(reader.state(), DecoderState::Positioned);
        assert!(reader.has_next());

        let first = reader.next().unwrap().unwrap();
        assert_eq!(first, expected[0]);
        assert_eq!(reader.state(), DecoderState::Reading);

        let rest: Vec<Row> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(rest, expected[1..]);
        assert_eq!(reader.state(), DecoderState::Exhausted);
        assert!(!reader.has_next());
        assert!(reader.next().is_none());
        assert_eq!(reader.position(), 25);
    }

    #[test]
    fn test_records_straddling_reads_and_compaction() {
        // Records of ~120 bytes through a 256-byte buffer fed 7 bytes at a
        // time: most records straddle both reads and the buffer end.
        let expected = rows(40, 80);
        let bytes = table_bytes(&expected, 16);
        let chunked = Chunked {
            inner: Cursor::new(bytes.clone()),
            chunk: 7,
        };
        let small: Vec<Row> = FeatureReader::open(chunked, 256)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        let large: Vec<Row> = FeatureReader::open(Cursor::new(bytes), 1 << 20)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(small, expected);
        assert_eq!(large, expected);
    }

    #[test]
    fn test_empty_stream() {
        let bytes = table_bytes(&[], 16);
        let mut reader = FeatureReader::open(Cursor::new(bytes), 1024).unwrap();
        assert_eq!(reader.state(), DecoderState::Exhausted);
        assert!(!reader.has_next());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_oversized_feature_rejected() {
        let mut expected = rows(3, 4);
        expected[1] = Row::new(vec![Value::String("y".repeat(500)), Value::Int(1)]);
        let bytes = table_bytes(&expected, 0);

        let mut reader = FeatureReader::open(Cursor::new(bytes), 256).unwrap();
        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, StoreError::Format(ref m) if m.contains("exceeds working buffer")));
        assert_eq!(reader.state(), DecoderState::Failed);
        // No silent resumption after the failure.
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_truncated_stream_fails_once() {
        let expected = rows(5, 4);
        let mut bytes = table_bytes(&expected, 16);
        bytes.truncate(bytes.len() - 3);

        let results: Vec<Result<Row>> = FeatureReader::open(Cursor::new(bytes), 1024)
            .unwrap()
            .collect();
        assert_eq!(results.len(), 5);
        assert!(results[..4].iter().all(|r| r.is_ok()));
        let err = results[4].as_ref().unwrap_err();
        assert!(err.is_format());
        assert!(err.to_string().contains("truncated feature record"));
    }

    #[test]
    fn test_truncated_index_region() {
        let expected = rows(5, 4);
        let bytes = table_bytes(&expected, 16);
        let header_len = {
            let mut probe = FrameBuffer::new(1024);
            read_header(&mut Cursor::new(&bytes), &mut probe)
                .unwrap()
                .index_offset as usize
        };
        let err = FeatureReader::open(Cursor::new(&bytes[..header_len + 10]), 1024).unwrap_err();
        assert!(err.to_string().contains("truncated index region"));
    }

    #[test]
    fn test_drop_releases_reader_once() {
        let bytes = table_bytes(&rows(10, 4), 16);

        let drops = Rc::new(Cell::new(0));
        let mut reader = FeatureReader::open(
            DropCounter {
                inner: Cursor::new(bytes.clone()),
                drops: drops.clone(),
            },
            1024,
        )
        .unwrap();
        reader.next().unwrap().unwrap();
        assert_eq!(drops.get(), 0);
        drop(reader);
        assert_eq!(drops.get(), 1);

        // Natural exhaustion releases the same way.
        let drops = Rc::new(Cell::new(0));
        {
            let reader = FeatureReader::open(
                DropCounter {
                    inner: Cursor::new(bytes),
                    drops: drops.clone(),
                },
                1024,
            )
            .unwrap();
            assert_eq!(reader.count(), 10);
        }
        assert_eq!(drops.get(), 1);
    }
}
