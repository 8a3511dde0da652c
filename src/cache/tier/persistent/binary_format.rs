//! Headerless fixed-width record format
//!
//! Each record is `key_length` native-endian `f32` values followed by one
//! native-endian `f32` value. Records are written back to back with no
//! padding, no count prefix and no magic number.

use std::io::Write;

pub const FLOAT_SIZE: usize = std::mem::size_of::<f32>();

/// Bytes occupied by one record
#[inline(always)]
pub const fn record_size(key_length: usize) -> usize {
    (key_length + 1) * FLOAT_SIZE
}

/// Write a single record
pub fn write_record<W: Write>(writer: &mut W, key: &[f32], value: f32) -> std::io::Result<()> {
    for element in key {
        writer.write_all(&element.to_ne_bytes())?;
    }
    writer.write_all(&value.to_ne_bytes())
}

#[inline(always)]
fn read_f32(bytes: &[u8]) -> f32 {
    let mut raw = [0u8; FLOAT_SIZE];
    raw.copy_from_slice(&bytes[..FLOAT_SIZE]);
    f32::from_ne_bytes(raw)
}

/// Iterate over every complete record in `data`
///
/// A trailing partial record is not yielded; see [`trailing_bytes`].
pub fn decode_records(data: &[u8], key_length: usize) -> impl Iterator<Item = (Vec<f32>, f32)> + '_ {
    data.chunks_exact(record_size(key_length)).map(move |record| {
        let key = record[..key_length * FLOAT_SIZE]
            .chunks_exact(FLOAT_SIZE)
            .map(read_f32)
            .collect();
        let value = read_f32(&record[key_length * FLOAT_SIZE..]);
        (key, value)
    })
}

/// Bytes left over after the last complete record
#[inline(always)]
pub fn trailing_bytes(data_length: usize, key_length: usize) -> usize {
    data_length % record_size(key_length)
}
