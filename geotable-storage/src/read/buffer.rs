//! Fixed-capacity compacting working buffer.
//!
//! Bytes are pulled from a forward-only reader into `buf[end..]` and
//! consumed from `buf[start..]`. The capacity never grows, so the largest
//! frame (header block or feature record, prefix included) that can be
//! decoded is exactly [`FrameBuffer::capacity`]; larger frames are rejected
//! as format errors before any read is attempted.
//!
//! ```text
//! 0          start              end            capacity
//! |  consumed  |  unread bytes  |  free tail   |
//! ```
//!
//! Compaction moves `buf[start..end]` to the front. It runs before a read
//! whenever the requested frame would not fit between `start` and the end of
//! the buffer, so unread bytes of a partially received frame are always kept.

use std::io::{self, Read};

use crate::error::{Result, StoreError};

pub struct FrameBuffer {
    buf: Box<[u8]>,
    start: usize,
    end: usize,
}

impl FrameBuffer {
    /// Allocate a buffer of `capacity` bytes. This is the only allocation
    /// the buffer ever makes.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            start: 0,
            end: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of buffered, unconsumed bytes.
    #[inline]
    pub fn available(&self) -> usize {
        self.end - self.start
    }

    /// The buffered, unconsumed bytes.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Mark `n` buffered bytes as consumed. Once everything is consumed the
    /// buffer is cleared back to its start.
    pub fn consume(&mut self, n: usize) {
        debug_assert!(n <= self.available());
        self.start += n.min(self.available());
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
    }

    /// Shift unread bytes to the front of the buffer.
    pub fn compact(&mut self) {
        if self.start == 0 {
            return;
        }
        self.buf.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;
    }

    /// Ensure at least `need` unread bytes, reading ahead as far as the free
    /// space allows.
    pub fn fill<R: Read>(&mut self, reader: &mut R, need: usize, ctx: &str) -> Result<()> {
        self.fill_until(reader, need, self.capacity(), ctx)
    }

    /// Ensure at least `need` unread bytes without reading any byte past
    /// them.
    pub fn fill_exact<R: Read>(&mut self, reader: &mut R, need: usize, ctx: &str) -> Result<()> {
        self.fill_until(reader, need, need, ctx)
    }

    /// Discard `n` bytes: buffered ones first, then straight from `reader`.
    pub fn skip<R: Read>(&mut self, reader: &mut R, n: u64, ctx: &str) -> Result<()> {
        let buffered = (self.available() as u64).min(n);
        self.consume(buffered as usize);
        let rest = n - buffered;
        if rest == 0 {
            return Ok(());
        }
        let skipped = io::copy(&mut reader.by_ref().take(rest), &mut io::sink())
            .map_err(|e| StoreError::from_read(e, ctx))?;
        if skipped != rest {
            return Err(StoreError::format(format!(
                "truncated {ctx}: expected {rest} more bytes, found {skipped}"
            )));
        }
        Ok(())
    }

    /// Read until `need` bytes are buffered, never reading more than
    /// `limit` bytes past `start`.
    fn fill_until<R: Read>(
        &mut self,
        reader: &mut R,
        need: usize,
        limit: usize,
        ctx: &str,
    ) -> Result<()> {
        if need > self.capacity() {
            return Err(StoreError::format(format!(
                "{ctx} of {need} bytes exceeds working buffer capacity {}",
                self.capacity()
            )));
        }
        if self.available() >= need {
            return Ok(());
        }
        if self.start + need > self.capacity() {
            self.compact();
        }
        let read_end = (self.start + limit.max(need)).min(self.capacity());
        while self.available() < need {
            match reader.read(&mut self.buf[self.end..read_end]) {
                Ok(0) => {
                    return Err(StoreError::from_read(
                        io::ErrorKind::UnexpectedEof.into(),
                        ctx,
                    ))
                }
                Ok(n) => self.end += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(StoreError::from_read(e, ctx)),
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("capacity", &self.capacity())
            .field("start", &self.start)
            .field("end", &self.end)
            .finish()
    }
}
