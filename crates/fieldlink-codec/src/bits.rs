//! Bit and hex helpers shared by the codec and by protocol code.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{CodecError, Result};
use crate::kind::ValueKind;

/// Read bit `pos` of `value`. Positions past 63 read as clear.
pub fn bit(value: u64, pos: u32) -> bool {
    value.checked_shr(pos).is_some_and(|v| v & 1 == 1)
}

/// Return `value` with bit `pos` set or cleared. Positions past 63 are ignored.
pub fn with_bit(value: u64, pos: u32, on: bool) -> u64 {
    match 1u64.checked_shl(pos) {
        Some(mask) if on => value | mask,
        Some(mask) => value & !mask,
        None => value,
    }
}

/// Pack booleans LSB-first, 8 per byte, zero-padding the last byte.
pub fn pack_bools(bits: &[bool]) -> BytesMut {
    let mut out = BytesMut::with_capacity(bits.len().div_ceil(8));
    for chunk in bits.chunks(8) {
        let byte = chunk
            .iter()
            .enumerate()
            .fold(0u8, |acc, (i, &on)| if on { acc | (1 << i) } else { acc });
        out.put_u8(byte);
    }
    out
}

/// Unpack `count` booleans LSB-first. `count` is capped at `buffer.len() * 8`.
pub fn unpack_bools(buffer: &[u8], count: usize) -> Vec<bool> {
    let count = count.min(buffer.len() * 8);
    (0..count)
        .map(|i| buffer[i / 8] & (1 << (i % 8)) != 0)
        .collect()
}

/// Render bytes as space-separated uppercase hex: `68 03 AA`.
pub fn format_bytes(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 3);
    for (i, byte) in data.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// Parse hex text such as `"68 03 AA"` or `"6803aa"`.
///
/// Whitespace between bytes is ignored; a byte may not be split by it.
pub fn parse_hex(text: &str) -> Result<Bytes> {
    let mut out = BytesMut::new();
    for group in text.split_whitespace() {
        if group.len() % 2 != 0 {
            return Err(CodecError::invalid(
                ValueKind::HexString,
                format!("odd number of digits in {group:?}"),
            ));
        }
        for pair in group.as_bytes().chunks_exact(2) {
            let digits = std::str::from_utf8(pair).map_err(|e| {
                CodecError::invalid(ValueKind::HexString, e.to_string())
            })?;
            let byte = u8::from_str_radix(digits, 16).map_err(|_| {
                CodecError::invalid(ValueKind::HexString, format!("{digits:?} is not hex"))
            })?;
            out.put_u8(byte);
        }
    }
    Ok(out.freeze())
}
