//! Bounds-checked little-endian read/write helpers shared by the codecs.

use crate::error::{Result, StoreError};

/// Check that `data[pos..pos+need]` is within bounds.
#[inline]
pub(crate) fn ensure_len(data: &[u8], pos: usize, need: usize, ctx: &str) -> Result<()> {
    match pos.checked_add(need) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(StoreError::format(format!(
            "truncated at {ctx} (need {need} bytes at offset {pos}, have {})",
            data.len()
        ))),
    }
}

/// Read `N` bytes at `pos`, advancing.
#[inline]
fn take<const N: usize>(data: &[u8], pos: &mut usize, ctx: &str) -> Result<[u8; N]> {
    ensure_len(data, *pos, N, ctx)?;
    let mut out = [0u8; N];
    out.copy_from_slice(&data[*pos..*pos + N]);
    *pos += N;
    Ok(out)
}

#[inline]
pub(crate) fn read_u8(data: &[u8], pos: &mut usize, ctx: &str) -> Result<u8> {
    Ok(take::<1>(data, pos, ctx)?[0])
}

#[inline]
pub(crate) fn read_i8(data: &[u8], pos: &mut usize, ctx: &str) -> Result<i8> {
    Ok(i8::from_le_bytes(take(data, pos, ctx)?))
}

#[inline]
pub(crate) fn read_u16(data: &[u8], pos: &mut usize, ctx: &str) -> Result<u16> {
    Ok(u16::from_le_bytes(take(data, pos, ctx)?))
}

#[inline]
pub(crate) fn read_i16(data: &[u8], pos: &mut usize, ctx: &str) -> Result<i16> {
    Ok(i16::from_le_bytes(take(data, pos, ctx)?))
}

#[inline]
pub(crate) fn read_u32(data: &[u8], pos: &mut usize, ctx: &str) -> Result<u32> {
    Ok(u32::from_le_bytes(take(data, pos, ctx)?))
}

#[inline]
pub(crate) fn read_i32(data: &[u8], pos: &mut usize, ctx: &str) -> Result<i32> {
    Ok(i32::from_le_bytes(take(data, pos, ctx)?))
}

#[inline]
pub(crate) fn read_u64(data: &[u8], pos: &mut usize, ctx: &str) -> Result<u64> {
    Ok(u64::from_le_bytes(take(data, pos, ctx)?))
}

#[inline]
pub(crate) fn read_i64(data: &[u8], pos: &mut usize, ctx: &str) -> Result<i64> {
    Ok(i64::from_le_bytes(take(data, pos, ctx)?))
}

#[inline]
pub(crate) fn read_f32(data: &[u8], pos: &mut usize, ctx: &str) -> Result<f32> {
    Ok(f32::from_le_bytes(take(data, pos, ctx)?))
}

#[inline]
pub(crate) fn read_f64(data: &[u8], pos: &mut usize, ctx: &str) -> Result<f64> {
    Ok(f64::from_le_bytes(take(data, pos, ctx)?))
}

/// Borrow `len` bytes at `pos`, advancing.
#[inline]
pub(crate) fn read_slice<'a>(
    data: &'a [u8],
    pos: &mut usize,
    len: usize,
    ctx: &str,
) -> Result<&'a [u8]> {
    ensure_len(data, *pos, len, ctx)?;
    let slice = &data[*pos..*pos + len];
    *pos += len;
    Ok(slice)
}

/// Borrow `len` bytes at `pos` as UTF-8, advancing.
pub(crate) fn read_str<'a>(
    data: &'a [u8],
    pos: &mut usize,
    len: usize,
    ctx: &str,
) -> Result<&'a str> {
    let bytes = read_slice(data, pos, len, ctx)?;
    std::str::from_utf8(bytes)
        .map_err(|e| StoreError::format(format!("invalid UTF-8 in {ctx}: {e}")))
}

/// Append `bytes` prefixed by their length as u32 LE.
pub(crate) fn put_bytes_u32(buf: &mut Vec<u8>, bytes: &[u8], ctx: &str) -> Result<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| StoreError::format(format!("{ctx} too long: {} bytes", bytes.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Append `bytes` prefixed by their length as u16 LE.
pub(crate) fn put_bytes_u16(buf: &mut Vec<u8>, bytes: &[u8], ctx: &str) -> Result<()> {
    let len = u16::try_from(bytes.len())
        .map_err(|_| StoreError::format(format!("{ctx} too long: {} bytes", bytes.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Convert a count to u32, failing with a format error on overflow.
#[inline]
pub(crate) fn count_u32(n: usize, ctx: &str) -> Result<u32> {
    u32::try_from(n).map_err(|_| StoreError::format(format!("{ctx} count {n} exceeds u32")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reads_advance_position() {
        let mut buf = Vec::new();
        buf.push(7u8);
        buf.extend_from_slice(&513u16.to_le_bytes());
        buf.extend_from_slice(&(-2i32).to_le_bytes());
        buf.extend_from_slice(&1.5f64.to_le_bytes());
        put_bytes_u32(&mut buf, b"abc", "name").unwrap();

        let mut pos = 0;
        assert_eq!(read_u8(&buf, &mut pos, "a").unwrap(), 7);
        assert_eq!(read_u16(&buf, &mut pos, "b").unwrap(), 513);
        assert_eq!(read_i32(&buf, &mut pos, "c").unwrap(), -2);
        assert_eq!(read_f64(&buf, &mut pos, "d").unwrap(), 1.5);
        let len = read_u32(&buf, &mut pos, "len").unwrap() as usize;
        assert_eq!(read_str(&buf, &mut pos, len, "name").unwrap(), "abc");
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_truncated_read_is_format_error() {
        let buf = [1u8, 2, 3];
        let mut pos = 0;
        let err = read_u32(&buf, &mut pos, "count").unwrap_err();
        assert!(matches!(err, StoreError::Format(_)));
        assert!(err.to_string().contains("truncated at count"));
        assert_eq!(pos, 0);
    }

    #[test]
    fn test_overflowing_length_is_rejected() {
        let buf = [0u8; 4];
        assert!(ensure_len(&buf, 2, usize::MAX, "huge").is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let buf = [0xff, 0xfe];
        let mut pos = 0;
        let err = read_str(&buf, &mut pos, 2, "column name").unwrap_err();
        assert!(err.to_string().contains("invalid UTF-8 in column name"));
    }
}
