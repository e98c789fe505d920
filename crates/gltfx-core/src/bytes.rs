//! Little-endian binary primitives.
//!
//! Every multi-byte value in glTF buffers and GLB framing is little-endian;
//! there is no endianness override. Bulk conversions go through `byteorder`
//! so slices are converted in one pass.

use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{GltfError, Result};

/// Fill byte for binary (BIN chunk, buffer view) padding.
pub const BIN_PADDING: u8 = 0x00;

/// Fill byte for JSON-adjacent padding (ASCII space).
pub const JSON_PADDING: u8 = 0x20;

/// A numeric scalar that can be stored little-endian in a glTF buffer.
pub trait LeScalar: Copy + Default + PartialOrd + num_traits::NumCast + Send + Sync + 'static {
    /// Size of one value in bytes.
    const SIZE: usize;

    /// Decodes one value from the first `SIZE` bytes of `bytes`.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encodes one value into the first `SIZE` bytes of `out`.
    fn write_le(self, out: &mut [u8]);
}

impl LeScalar for u8 {
    const SIZE: usize = 1;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn write_le(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl LeScalar for i8 {
    const SIZE: usize = 1;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn write_le(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
}

macro_rules! impl_le_scalar {
    ($($ty:ty => $size:expr, $read:ident, $write:ident;)*) => {
        $(
            impl LeScalar for $ty {
                const SIZE: usize = $size;

                fn read_le(bytes: &[u8]) -> Self {
                    LittleEndian::$read(bytes)
                }

                fn write_le(self, out: &mut [u8]) {
                    LittleEndian::$write(out, self)
                }
            }
        )*
    };
}

impl_le_scalar! {
    i16 => 2, read_i16, write_i16;
    u16 => 2, read_u16, write_u16;
    i32 => 4, read_i32, write_i32;
    u32 => 4, read_u32, write_u32;
    i64 => 8, read_i64, write_i64;
    u64 => 8, read_u64, write_u64;
    f32 => 4, read_f32, write_f32;
    f64 => 8, read_f64, write_f64;
}

/// Reads one value at `offset`.
pub fn read<T: LeScalar>(data: &[u8], offset: usize) -> Result<T> {
    let end = offset
        .checked_add(T::SIZE)
        .filter(|&end| end <= data.len())
        .ok_or_else(|| {
            GltfError::BufferOverflow(format!(
                "read of {} bytes at offset {} exceeds {} bytes",
                T::SIZE,
                offset,
                data.len()
            ))
        })?;
    Ok(T::read_le(&data[offset..end]))
}

/// Appends one value to `out`.
pub fn write<T: LeScalar>(out: &mut Vec<u8>, value: T) {
    let start = out.len();
    out.resize(start + T::SIZE, 0);
    value.write_le(&mut out[start..]);
}

/// `offset..offset + len`, or `BufferOverflow` when the end does not fit in
/// `usize`. Offsets and lengths parsed from JSON go through here.
pub fn checked_range(offset: usize, len: usize) -> Result<Range<usize>> {
    offset
        .checked_add(len)
        .map(|end| offset..end)
        .ok_or_else(|| GltfError::BufferOverflow(format!("{} bytes at offset {} overflow", len, offset)))
}

/// `count * size`, or `BufferOverflow` on overflow.
pub fn checked_size(count: usize, size: usize) -> Result<usize> {
    count
        .checked_mul(size)
        .ok_or_else(|| GltfError::BufferOverflow(format!("{} elements of {} bytes overflow", count, size)))
}

/// Overwrites one value at `offset`.
pub fn write_at<T: LeScalar>(data: &mut [u8], offset: usize, value: T) -> Result<()> {
    if checked_range(offset, T::SIZE)?.end > data.len() {
        return Err(GltfError::BufferOverflow(format!(
            "write of {} bytes at offset {} exceeds {} bytes",
            T::SIZE,
            offset,
            data.len()
        )));
    }
    value.write_le(&mut data[offset..offset + T::SIZE]);
    Ok(())
}

/// Serializes a slice of values contiguously.
pub fn to_bytes<T: LeScalar>(values: &[T]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * T::SIZE];
    for (chunk, value) in out.chunks_exact_mut(T::SIZE).zip(values) {
        value.write_le(chunk);
    }
    out
}

/// Deserializes a contiguous byte run; the length must be a multiple of the value size.
pub fn from_bytes<T: LeScalar>(bytes: &[u8]) -> Result<Vec<T>> {
    if bytes.len() % T::SIZE != 0 {
        return Err(GltfError::invalid_input(format!(
            "{} bytes is not a multiple of element size {}",
            bytes.len(),
            T::SIZE
        )));
    }
    Ok(bytes.chunks_exact(T::SIZE).map(T::read_le).collect())
}

/// Bulk float-to-bytes conversion.
pub fn f32_to_bytes(values: &[f32]) -> Vec<u8> {
    let mut out = vec![0u8; values.len() * 4];
    LittleEndian::write_f32_into(values, &mut out);
    out
}

/// Bulk bytes-to-float conversion.
pub fn bytes_to_f32(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(GltfError::invalid_input(format!(
            "{} bytes is not a multiple of 4",
            bytes.len()
        )));
    }
    let mut out = vec![0f32; bytes.len() / 4];
    LittleEndian::read_f32_into(bytes, &mut out);
    Ok(out)
}

/// Number of bytes needed to bring `len` up to a multiple of `alignment`.
pub fn padding_len(len: usize, alignment: usize) -> usize {
    if alignment <= 1 {
        return 0;
    }
    (alignment - len % alignment) % alignment
}

/// Rounds `len` up to a multiple of `alignment`.
pub fn align_up(len: usize, alignment: usize) -> usize {
    len + padding_len(len, alignment)
}

/// Pads `bytes` in place to a multiple of `alignment` with `fill`; returns the pad count.
pub fn pad_to(bytes: &mut Vec<u8>, alignment: usize, fill: u8) -> usize {
    let pad = padding_len(bytes.len(), alignment);
    bytes.resize(bytes.len() + pad, fill);
    pad
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_scalar_layout() {
        let mut out = Vec::new();
        write(&mut out, 1.0f32);
        write(&mut out, 0x0102u16);
        write(&mut out, -1i8);
        assert_eq!(out, vec![0x00, 0x00, 0x80, 0x3F, 0x02, 0x01, 0xFF]);
        assert_eq!(read::<f32>(&out, 0).unwrap(), 1.0);
        assert_eq!(read::<u16>(&out, 4).unwrap(), 0x0102);
        assert_eq!(read::<i8>(&out, 6).unwrap(), -1);
    }

    #[test]
    fn test_read_past_end() {
        let data = [0u8; 6];
        assert!(matches!(read::<u32>(&data, 4), Err(GltfError::BufferOverflow(_))));
        assert!(read::<u16>(&data, 4).is_ok());
    }

    #[test]
    fn test_float_bulk() {
        let bytes = f32_to_bytes(&[1.0, 2.0, 3.0]);
        assert_eq!(
            bytes,
            vec![0x00, 0x00, 0x80, 0x3F, 0x00, 0x00, 0x00, 0x40, 0x00, 0x00, 0x40, 0x40]
        );
        assert_eq!(bytes_to_f32(&bytes).unwrap(), vec![1.0, 2.0, 3.0]);
        assert!(bytes_to_f32(&bytes[..5]).is_err());
    }

    #[test]
    fn test_padding_fills() {
        let mut json = b"{\"a\":1}".to_vec();
        assert_eq!(pad_to(&mut json, 4, JSON_PADDING), 1);
        assert_eq!(json.last(), Some(&0x20));

        let mut bin = vec![1u8, 2, 3];
        assert_eq!(pad_to(&mut bin, 4, BIN_PADDING), 1);
        assert_eq!(bin, vec![1, 2, 3, 0]);

        let mut meta = vec![0u8; 9];
        assert_eq!(pad_to(&mut meta, 8, JSON_PADDING), 7);
        assert_eq!(meta.len(), 16);
        assert_eq!(pad_to(&mut meta, 8, JSON_PADDING), 0);
    }

    proptest! {
        #[test]
        fn prop_i64_bytes_roundtrip(values in proptest::collection::vec(any::<i64>(), 0..64)) {
            let bytes = to_bytes(&values);
            prop_assert_eq!(bytes.len(), values.len() * 8);
            prop_assert_eq!(from_bytes::<i64>(&bytes).unwrap(), values);
        }

        #[test]
        fn prop_padding_in_range(len in 0usize..1000, alignment in 1usize..16) {
            let pad = padding_len(len, alignment);
            prop_assert!(pad < alignment);
            prop_assert_eq!((len + pad) % alignment, 0);
        }
    }
}
