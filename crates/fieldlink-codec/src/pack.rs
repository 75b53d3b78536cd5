//! Packing and unpacking of values under an element endianness.

use std::fmt;

use bytes::{BufMut, Bytes, BytesMut};

use crate::bits::{format_bytes, pack_bools, parse_hex, unpack_bools};
use crate::error::{CodecError, Result};
use crate::kind::ValueKind;
use crate::order::Endian;
use crate::value::{TextEncoding, Value};

/// Struct-style description of one packed element, e.g. `<h` or `>Q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PackFormat {
    pub endian: Endian,
    pub code: char,
}

impl fmt::Display for PackFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.endian.prefix(), self.code)
    }
}

/// Element width and pack format of a fixed-width kind.
///
/// Fails with [`CodecError::UnsupportedKind`] for string, hex-string and
/// byte-array kinds.
pub fn width_and_format(kind: ValueKind, endian: Endian) -> Result<(usize, PackFormat)> {
    let code = match kind.element() {
        ValueKind::Bool | ValueKind::Int8 => 'b',
        ValueKind::UInt8 => 'B',
        ValueKind::Int16 => 'h',
        ValueKind::UInt16 => 'H',
        ValueKind::Int32 => 'i',
        ValueKind::UInt32 => 'I',
        ValueKind::Int64 => 'q',
        ValueKind::UInt64 => 'Q',
        ValueKind::Float => 'f',
        ValueKind::Double => 'd',
        other => {
            return Err(CodecError::UnsupportedKind(format!(
                "{other} has no fixed packing format"
            )))
        }
    };
    let width = kind
        .width()
        .ok_or_else(|| CodecError::UnsupportedKind(kind.to_string()))?;
    Ok((width, PackFormat { endian, code }))
}

fn window(buffer: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    offset
        .checked_add(len)
        .and_then(|end| buffer.get(offset..end))
        .ok_or(CodecError::TruncatedBuffer {
            offset,
            needed: len,
            available: buffer.len().saturating_sub(offset),
        })
}

/// Decode `count` elements of `kind` starting at byte `offset`.
///
/// - string: `buffer[offset..offset + count]` decoded as one `Text`
/// - hex-string: the same slice rendered as one `Text` (`"68 03 AA"`)
/// - byte-array: the same slice as one `Bytes`
/// - bool kinds: `count` bits, LSB-first, starting at byte `offset`
/// - everything else: `count` consecutive fixed-width windows
pub fn bytes_to_values(
    buffer: &[u8],
    kind: ValueKind,
    offset: usize,
    count: usize,
    encoding: TextEncoding,
    endian: Endian,
) -> Result<Vec<Value>> {
    match kind {
        ValueKind::String => {
            let raw = window(buffer, offset, count)?;
            Ok(vec![Value::Text(encoding.decode(raw)?)])
        }
        ValueKind::HexString => {
            let raw = window(buffer, offset, count)?;
            Ok(vec![Value::Text(format_bytes(raw))])
        }
        ValueKind::ByteArray => {
            let raw = window(buffer, offset, count)?;
            Ok(vec![Value::Bytes(Bytes::copy_from_slice(raw))])
        }
        ValueKind::Bool | ValueKind::BoolArray => {
            let raw = window(buffer, offset, count.div_ceil(8))?;
            Ok(unpack_bools(raw, count).into_iter().map(Value::Bool).collect())
        }
        _ => {
            let (width, _) = width_and_format(kind, endian)?;
            let needed = width.checked_mul(count).ok_or(CodecError::TruncatedBuffer {
                offset,
                needed: usize::MAX,
                available: buffer.len().saturating_sub(offset),
            })?;
            let raw = window(buffer, offset, needed)?;
            raw.chunks_exact(width)
                .map(|chunk| decode_element(chunk, kind.element(), endian))
                .collect()
        }
    }
}

macro_rules! decode_as {
    ($chunk:expr, $endian:expr, $ty:ty, $variant:ident) => {{
        let bytes: [u8; std::mem::size_of::<$ty>()] = $chunk
            .try_into()
            .map_err(|_| CodecError::TruncatedBuffer {
                offset: 0,
                needed: std::mem::size_of::<$ty>(),
                available: $chunk.len(),
            })?;
        Value::$variant(match $endian {
            Endian::Little => <$ty>::from_le_bytes(bytes),
            Endian::Big => <$ty>::from_be_bytes(bytes),
        })
    }};
}

fn decode_element(chunk: &[u8], element: ValueKind, endian: Endian) -> Result<Value> {
    let value = match element {
        ValueKind::Int8 => decode_as!(chunk, endian, i8, I8),
        ValueKind::UInt8 => decode_as!(chunk, endian, u8, U8),
        ValueKind::Int16 => decode_as!(chunk, endian, i16, I16),
        ValueKind::UInt16 => decode_as!(chunk, endian, u16, U16),
        ValueKind::Int32 => decode_as!(chunk, endian, i32, I32),
        ValueKind::UInt32 => decode_as!(chunk, endian, u32, U32),
        ValueKind::Int64 => decode_as!(chunk, endian, i64, I64),
        ValueKind::UInt64 => decode_as!(chunk, endian, u64, U64),
        ValueKind::Float => decode_as!(chunk, endian, f32, F32),
        ValueKind::Double => decode_as!(chunk, endian, f64, F64),
        other => return Err(CodecError::UnsupportedKind(other.to_string())),
    };
    Ok(value)
}

/// Encode a single scalar. See [`values_to_bytes`].
pub fn value_to_bytes(
    value: &Value,
    kind: ValueKind,
    encoding: TextEncoding,
    endian: Endian,
) -> Result<BytesMut> {
    values_to_bytes(std::slice::from_ref(value), kind, encoding, endian)
}

/// Encode a homogeneous list of values as `kind`.
///
/// A single `Value::Bytes` input is returned untouched whatever the kind.
/// Text destined for an integer kind is parsed as a number and truncated
/// toward zero; values that do not fit the kind fail with
/// [`CodecError::InvalidValue`].
pub fn values_to_bytes(
    values: &[Value],
    kind: ValueKind,
    encoding: TextEncoding,
    endian: Endian,
) -> Result<BytesMut> {
    if let [Value::Bytes(raw)] = values {
        return Ok(BytesMut::from(&raw[..]));
    }

    match kind {
        ValueKind::String => {
            let mut out = BytesMut::new();
            for value in values {
                out.put_slice(&encoding.encode(&text_of(value))?);
            }
            Ok(out)
        }
        ValueKind::HexString => {
            let mut out = BytesMut::new();
            for value in values {
                out.put_slice(&parse_hex(&text_of(value))?);
            }
            Ok(out)
        }
        ValueKind::ByteArray => {
            let mut out = BytesMut::with_capacity(values.len());
            for value in values {
                match value {
                    Value::Bytes(raw) => out.put_slice(raw),
                    other => {
                        let byte = coerce_int(other, ValueKind::UInt8, 0, u8::MAX.into())?;
                        out.put_u8(byte as u8);
                    }
                }
            }
            Ok(out)
        }
        ValueKind::Bool | ValueKind::BoolArray => {
            let bits = values
                .iter()
                .map(|v| {
                    v.as_bool()
                        .ok_or_else(|| CodecError::invalid(kind, format!("{v} is not a boolean")))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(pack_bools(&bits))
        }
        _ => {
            let (width, _) = width_and_format(kind, endian)?;
            let mut out = BytesMut::with_capacity(width * values.len());
            for value in values {
                encode_element(&mut out, value, kind.element(), endian)?;
            }
            Ok(out)
        }
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer coercion: exact for integer values, float-then-int for text and floats.
fn coerce_int(value: &Value, kind: ValueKind, min: i128, max: i128) -> Result<i128> {
    let n = match value.as_i128() {
        Some(n) => n,
        None => {
            let exact = value.as_str().and_then(|s| s.trim().parse::<i128>().ok());
            match exact {
                Some(n) => n,
                None => {
                    let f = value.as_f64().ok_or_else(|| {
                        CodecError::invalid(kind, format!("{value:?} is not numeric"))
                    })?;
                    if !f.is_finite() {
                        return Err(CodecError::invalid(kind, format!("{f} is not finite")));
                    }
                    let t = f.trunc();
                    if t < min as f64 || t > max as f64 {
                        return Err(CodecError::invalid(kind, format!("{value} is out of range")));
                    }
                    t as i128
                }
            }
        }
    };
    if n < min || n > max {
        return Err(CodecError::invalid(kind, format!("{value} is out of range")));
    }
    Ok(n)
}

fn coerce_float(value: &Value, kind: ValueKind) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| CodecError::invalid(kind, format!("{value:?} is not numeric")))
}

macro_rules! put_as {
    ($out:expr, $endian:expr, $value:expr) => {{
        let v = $value;
        match $endian {
            Endian::Little => $out.put_slice(&v.to_le_bytes()),
            Endian::Big => $out.put_slice(&v.to_be_bytes()),
        }
    }};
}

macro_rules! int_range {
    ($ty:ty) => {
        (<$ty>::MIN as i128, <$ty>::MAX as i128)
    };
}

fn encode_element(
    out: &mut BytesMut,
    value: &Value,
    element: ValueKind,
    endian: Endian,
) -> Result<()> {
    let int = |(min, max): (i128, i128)| coerce_int(value, element, min, max);
    match element {
        ValueKind::Int8 => put_as!(out, endian, int(int_range!(i8))? as i8),
        ValueKind::UInt8 => put_as!(out, endian, int(int_range!(u8))? as u8),
        ValueKind::Int16 => put_as!(out, endian, int(int_range!(i16))? as i16),
        ValueKind::UInt16 => put_as!(out, endian, int(int_range!(u16))? as u16),
        ValueKind::Int32 => put_as!(out, endian, int(int_range!(i32))? as i32),
        ValueKind::UInt32 => put_as!(out, endian, int(int_range!(u32))? as u32),
        ValueKind::Int64 => put_as!(out, endian, int(int_range!(i64))? as i64),
        ValueKind::UInt64 => put_as!(out, endian, int(int_range!(u64))? as u64),
        ValueKind::Float => put_as!(out, endian, coerce_float(value, element)? as f32),
        ValueKind::Double => put_as!(out, endian, coerce_float(value, element)?),
        other => return Err(CodecError::UnsupportedKind(other.to_string())),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn le(kind: ValueKind, values: &[Value]) -> BytesMut {
        values_to_bytes(values, kind, TextEncoding::Utf8, Endian::Little).unwrap()
    }

    fn try_le(kind: ValueKind, values: &[Value]) -> Result<BytesMut> {
        values_to_bytes(values, kind, TextEncoding::Utf8, Endian::Little)
    }

    fn unpack_le(buf: &[u8], kind: ValueKind, offset: usize, count: usize) -> Result<Vec<Value>> {
        bytes_to_values(buf, kind, offset, count, TextEncoding::Utf8, Endian::Little)
    }

    #[test]
    fn fixed_kinds_have_pack_formats() {
        let (w, f) = width_and_format(ValueKind::Int16, Endian::Little).unwrap();
        assert_eq!(w, 2);
        assert_eq!(f.to_string(), "<h");

        let (w, f) = width_and_format(ValueKind::UInt64Array, Endian::Big).unwrap();
        assert_eq!(w, 8);
        assert_eq!(f.to_string(), ">Q");

        for kind in [ValueKind::String, ValueKind::HexString, ValueKind::ByteArray] {
            assert!(matches!(
                width_and_format(kind, Endian::Little),
                Err(CodecError::UnsupportedKind(_))
            ));
        }
    }

    #[test]
    fn int16_endianness() {
        let little = le(ValueKind::Int16, &[Value::from(0x1234i16)]);
        assert_eq!(&little[..], &[0x34, 0x12]);

        let big = values_to_bytes(
            &[Value::from(0x1234i16)],
            ValueKind::Int16,
            TextEncoding::Utf8,
            Endian::Big,
        )
        .unwrap();
        assert_eq!(&big[..], &[0x12, 0x34]);
    }

    #[test]
    fn text_is_coerced_float_then_int() {
        let out = le(ValueKind::UInt16, &[Value::from("12.9")]);
        assert_eq!(&out[..], &[12, 0]);

        let out = le(ValueKind::Int32, &[Value::from("-7.5")]);
        assert_eq!(&out[..], &(-7i32).to_le_bytes());
    }

    #[test]
    fn out_of_range_is_invalid() {
        let err = try_le(ValueKind::UInt8, &[Value::from(300u16)]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { .. }));

        let err = try_le(ValueKind::Int16, &[Value::from("abc")]).unwrap_err();
        assert!(matches!(err, CodecError::InvalidValue { .. }));
    }

    #[test]
    fn u64_max_is_exact() {
        let out = le(ValueKind::UInt64, &[Value::from(u64::MAX)]);
        let back = unpack_le(&out, ValueKind::UInt64, 0, 1).unwrap();
        assert_eq!(back, vec![Value::U64(u64::MAX)]);

        let out = le(ValueKind::UInt64, &[Value::from("18446744073709551615")]);
        assert_eq!(&out[..], &[0xFF; 8]);
    }

    #[test]
    fn raw_bytes_pass_through() {
        let raw = Value::from(vec![1u8, 2, 3]);
        for kind in [ValueKind::Float, ValueKind::String, ValueKind::BoolArray] {
            let out = value_to_bytes(&raw, kind, TextEncoding::Utf8, Endian::Big).unwrap();
            assert_eq!(&out[..], &[1, 2, 3]);
        }
    }

    #[test]
    fn bool_array_packing() {
        let bits: Vec<Value> = [true, false, true, true, false, false, false, false, true]
            .into_iter()
            .map(Value::from)
            .collect();
        let out = le(ValueKind::BoolArray, &bits);
        assert_eq!(&out[..], &[0b0000_1101, 0b0000_0001]);

        let back = unpack_le(&out, ValueKind::BoolArray, 0, 9).unwrap();
        assert_eq!(back, bits);
    }

    #[test]
    fn decode_with_offset() {
        let buf = [0xFF, 0x01, 0x00, 0x02, 0x00];
        let values = unpack_le(&buf, ValueKind::UInt16Array, 1, 2).unwrap();
        assert_eq!(values, vec![Value::U16(1), Value::U16(2)]);
    }

    #[test]
    fn truncated_buffer_is_reported() {
        let err = unpack_le(&[0x01, 0x02, 0x03], ValueKind::UInt16Array, 0, 2).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TruncatedBuffer { needed: 4, available: 3, .. }
        ));

        let err = unpack_le(&[0x01], ValueKind::String, 2, 1).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedBuffer { .. }));
    }

    #[test]
    fn variable_kinds() {
        let buf = b"\x00hello\x68";
        let ascii = TextEncoding::Ascii;
        let text = bytes_to_values(buf, ValueKind::String, 1, 5, ascii, Endian::Little).unwrap();
        assert_eq!(text, vec![Value::from("hello")]);

        let hex = unpack_le(buf, ValueKind::HexString, 5, 2).unwrap();
        assert_eq!(hex, vec![Value::from("6F 68")]);

        let raw = unpack_le(buf, ValueKind::ByteArray, 0, 2).unwrap();
        assert_eq!(raw, vec![Value::from(vec![0x00, b'h'])]);

        let packed = le(ValueKind::HexString, &[Value::from("68 03 AA")]);
        assert_eq!(&packed[..], &[0x68, 0x03, 0xAA]);
    }

    #[test]
    fn float_from_text() {
        let out = le(ValueKind::Float, &[Value::from("1.5")]);
        assert_eq!(&out[..], &1.5f32.to_le_bytes());
    }
}
