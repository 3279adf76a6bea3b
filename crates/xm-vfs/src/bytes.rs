//! Bounds-checked field readers over byte buffers
//!
//! Every reader takes the absolute offset of the field and a short description
//! used in the [`VfsError::Truncated`] error when the buffer is too short.

use xm_core::error::VfsError;

/// Borrow `len` bytes at `offset`
pub fn slice_at<'a>(
    data: &'a [u8],
    offset: usize,
    len: usize,
    what: &'static str,
) -> Result<&'a [u8], VfsError> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| VfsError::truncated(what, offset, len, data.len().saturating_sub(offset)))
}

/// Copy a fixed-size array at `offset`
pub fn array_at<const N: usize>(
    data: &[u8],
    offset: usize,
    what: &'static str,
) -> Result<[u8; N], VfsError> {
    let mut out = [0u8; N];
    out.copy_from_slice(slice_at(data, offset, N, what)?);
    Ok(out)
}

pub fn read_u8(data: &[u8], offset: usize, what: &'static str) -> Result<u8, VfsError> {
    Ok(array_at::<1>(data, offset, what)?[0])
}

pub fn read_u16_le(data: &[u8], offset: usize, what: &'static str) -> Result<u16, VfsError> {
    array_at(data, offset, what).map(u16::from_le_bytes)
}

pub fn read_u32_le(data: &[u8], offset: usize, what: &'static str) -> Result<u32, VfsError> {
    array_at(data, offset, what).map(u32::from_le_bytes)
}

pub fn read_i64_le(data: &[u8], offset: usize, what: &'static str) -> Result<i64, VfsError> {
    array_at(data, offset, what).map(i64::from_le_bytes)
}

pub fn read_u16_be(data: &[u8], offset: usize, what: &'static str) -> Result<u16, VfsError> {
    array_at(data, offset, what).map(u16::from_be_bytes)
}

pub fn read_u32_be(data: &[u8], offset: usize, what: &'static str) -> Result<u32, VfsError> {
    array_at(data, offset, what).map(u32::from_be_bytes)
}

/// Uppercase hex of the bytes in the order given
pub fn hex_upper(bytes: &[u8]) -> String {
    hex::encode_upper(bytes)
}

/// Decode a fixed-width text field: every NUL byte is dropped, the rest is read as UTF-8
pub fn utf8_without_nulls(bytes: &[u8]) -> String {
    let filtered: Vec<u8> = bytes.iter().copied().filter(|&b| b != 0).collect();
    String::from_utf8_lossy(&filtered).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_readers() {
        let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
        assert_eq!(read_u16_le(&data, 0, "test").unwrap(), 0x3412);
        assert_eq!(read_u16_be(&data, 0, "test").unwrap(), 0x1234);
        assert_eq!(read_u32_le(&data, 1, "test").unwrap(), 0x9A785634);
        assert_eq!(read_u32_be(&data, 1, "test").unwrap(), 0x3456789A);
        assert_eq!(read_u8(&data, 4, "test").unwrap(), 0x9A);
    }

    #[test]
    fn test_out_of_bounds_reports_sizes() {
        let data = [0u8; 6];
        match read_u32_be(&data, 4, "field") {
            Err(VfsError::Truncated {
                what,
                offset,
                needed,
                available,
            }) => {
                assert_eq!(what, "field");
                assert_eq!(offset, 4);
                assert_eq!(needed, 4);
                assert_eq!(available, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }

        assert!(slice_at(&data, usize::MAX, 2, "overflow").is_err());
        assert!(slice_at(&data, 10, 0, "past end").is_err());
    }

    #[test]
    fn test_hex_upper_keeps_byte_order() {
        assert_eq!(hex_upper(&[0x4D, 0x53, 0x08, 0x2b]), "4D53082B");
    }

    #[test]
    fn test_utf8_without_nulls() {
        assert_eq!(utf8_without_nulls(b"\0H\0a\0l\0o\0\0"), "Halo");
        assert_eq!(utf8_without_nulls(&[0u8; 16]), "");
    }
}
