use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Closed set of value kinds understood by the codec.
///
/// The discriminants are stable and match the integer codes device
/// configurations use to name a point's data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
#[repr(i32)]
pub enum ValueKind {
    Bool = 0,
    BoolArray = 1,
    Int8 = 2,
    Int8Array = 3,
    UInt8 = 4,
    UInt8Array = 5,
    Int16 = 6,
    Int16Array = 7,
    UInt16 = 8,
    UInt16Array = 9,
    Int32 = 10,
    Int32Array = 11,
    UInt32 = 12,
    UInt32Array = 13,
    Int64 = 14,
    Int64Array = 15,
    UInt64 = 16,
    UInt64Array = 17,
    Float = 18,
    FloatArray = 19,
    Double = 20,
    DoubleArray = 21,
    String = 22,
    HexString = 23,
    ByteArray = 24,
}

const ALL: [ValueKind; 25] = [
    ValueKind::Bool,
    ValueKind::BoolArray,
    ValueKind::Int8,
    ValueKind::Int8Array,
    ValueKind::UInt8,
    ValueKind::UInt8Array,
    ValueKind::Int16,
    ValueKind::Int16Array,
    ValueKind::UInt16,
    ValueKind::UInt16Array,
    ValueKind::Int32,
    ValueKind::Int32Array,
    ValueKind::UInt32,
    ValueKind::UInt32Array,
    ValueKind::Int64,
    ValueKind::Int64Array,
    ValueKind::UInt64,
    ValueKind::UInt64Array,
    ValueKind::Float,
    ValueKind::FloatArray,
    ValueKind::Double,
    ValueKind::DoubleArray,
    ValueKind::String,
    ValueKind::HexString,
    ValueKind::ByteArray,
];

impl ValueKind {
    /// Stable integer code.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Every kind, ordered by code.
    pub fn all() -> &'static [ValueKind] {
        &ALL
    }

    /// Byte width of one element, `None` for variable-length kinds.
    pub fn width(self) -> Option<usize> {
        match self.element() {
            ValueKind::Bool | ValueKind::Int8 | ValueKind::UInt8 => Some(1),
            ValueKind::Int16 | ValueKind::UInt16 => Some(2),
            ValueKind::Int32 | ValueKind::UInt32 | ValueKind::Float => Some(4),
            ValueKind::Int64 | ValueKind::UInt64 | ValueKind::Double => Some(8),
            _ => None,
        }
    }

    /// The scalar kind of an array kind; scalars map to themselves.
    pub fn element(self) -> ValueKind {
        match self {
            ValueKind::BoolArray => ValueKind::Bool,
            ValueKind::Int8Array => ValueKind::Int8,
            ValueKind::UInt8Array => ValueKind::UInt8,
            ValueKind::Int16Array => ValueKind::Int16,
            ValueKind::UInt16Array => ValueKind::UInt16,
            ValueKind::Int32Array => ValueKind::Int32,
            ValueKind::UInt32Array => ValueKind::UInt32,
            ValueKind::Int64Array => ValueKind::Int64,
            ValueKind::UInt64Array => ValueKind::UInt64,
            ValueKind::FloatArray => ValueKind::Float,
            ValueKind::DoubleArray => ValueKind::Double,
            other => other,
        }
    }

    pub fn is_array(self) -> bool {
        self.element() != self
    }

    pub fn is_bool(self) -> bool {
        self.element() == ValueKind::Bool
    }

    pub fn is_float(self) -> bool {
        matches!(self.element(), ValueKind::Float | ValueKind::Double)
    }

    /// String, hex-string and byte-array kinds.
    pub fn is_variable(self) -> bool {
        self.width().is_none()
    }

    /// Number of 16-bit registers one element occupies.
    ///
    /// Variable-length kinds report `length`.
    pub fn register_count(self, length: usize) -> usize {
        match self.width() {
            Some(1) | Some(2) => 1,
            Some(4) => 2,
            Some(8) => 4,
            _ => length,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::BoolArray => "bool_array",
            ValueKind::Int8 => "int8",
            ValueKind::Int8Array => "int8_array",
            ValueKind::UInt8 => "uint8",
            ValueKind::UInt8Array => "uint8_array",
            ValueKind::Int16 => "int16",
            ValueKind::Int16Array => "int16_array",
            ValueKind::UInt16 => "uint16",
            ValueKind::UInt16Array => "uint16_array",
            ValueKind::Int32 => "int32",
            ValueKind::Int32Array => "int32_array",
            ValueKind::UInt32 => "uint32",
            ValueKind::UInt32Array => "uint32_array",
            ValueKind::Int64 => "int64",
            ValueKind::Int64Array => "int64_array",
            ValueKind::UInt64 => "uint64",
            ValueKind::UInt64Array => "uint64_array",
            ValueKind::Float => "float",
            ValueKind::FloatArray => "float_array",
            ValueKind::Double => "double",
            ValueKind::DoubleArray => "double_array",
            ValueKind::String => "string",
            ValueKind::HexString => "hex_string",
            ValueKind::ByteArray => "byte_array",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<i32> for ValueKind {
    type Error = CodecError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        ALL.into_iter()
            .find(|kind| kind.code() == code)
            .ok_or_else(|| CodecError::UnsupportedKind(format!("code {code}")))
    }
}

/// Accepts `uint16`, `UINT16_ARRAY`, `uint16[]`, and numeric codes.
impl FromStr for ValueKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i32>() {
            return ValueKind::try_from(code);
        }

        let mut normalized = trimmed.to_ascii_lowercase().replace('-', "_");
        if let Some(base) = normalized.strip_suffix("[]") {
            normalized = format!("{base}_array");
        }

        ALL.into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| CodecError::UnsupportedKind(s.to_string()))
    }
}

impl From<ValueKind> for &'static str {
    fn from(kind: ValueKind) -> Self {
        kind.as_str()
    }
}

impl TryFrom<String> for ValueKind {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
