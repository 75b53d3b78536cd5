use serde::Serialize;

use crate::error::Result;
use crate::kind::ValueKind;
use crate::order::{reorder_words, Endian, WordOrder};
use crate::pack::{bytes_to_values, values_to_bytes};
use crate::value::{TextEncoding, Value};

/// Result of [`convert`]: one element when a valid position was requested,
/// otherwise the whole decoded array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Converted {
    Single(Value),
    Many(Vec<Value>),
}

impl Converted {
    pub fn single(&self) -> Option<&Value> {
        match self {
            Converted::Single(v) => Some(v),
            Converted::Many(_) => None,
        }
    }

    pub fn into_vec(self) -> Vec<Value> {
        match self {
            Converted::Single(v) => vec![v],
            Converted::Many(values) => values,
        }
    }
}

/// Reinterpret values of `from` as values of `to` under a word order.
///
/// Packs `values` as `from`, permutes the buffer with [`reorder_words`] and
/// decodes as many `to` elements as fit. When `position` indexes into the
/// decoded list the single element is returned. An absent or out-of-range
/// position returns the whole list instead of failing; pollers reading
/// heterogeneous register maps rely on that.
pub fn convert(
    values: &[Value],
    from: ValueKind,
    to: ValueKind,
    order: WordOrder,
    position: Option<usize>,
    endian: Endian,
) -> Result<Converted> {
    let packed = values_to_bytes(values, from, TextEncoding::Utf8, endian)?;
    let ordered = reorder_words(&packed, order);

    let count = match to.width() {
        Some(_) if to.is_bool() => ordered.len() * 8,
        Some(width) => ordered.len() / width,
        None => ordered.len(),
    };
    let mut decoded = bytes_to_values(&ordered, to, 0, count, TextEncoding::Utf8, endian)?;

    match position {
        Some(index) if index < decoded.len() => Ok(Converted::Single(decoded.swap_remove(index))),
        _ => Ok(Converted::Many(decoded)),
    }
}
