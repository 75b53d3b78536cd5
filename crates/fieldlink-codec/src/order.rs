//! Word ordering and element endianness.
//!
//! The two settings are independent. [`Endian`] decides how an element is
//! packed; [`WordOrder`] permutes the already-packed buffer the way the
//! device lays out its registers.

use std::fmt;
use std::str::FromStr;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Register layout of multi-byte data, in ABCD notation.
///
/// For the bytes `[A, B, C, D]`:
/// - `Abcd` keeps them as-is
/// - `Badc` swaps the bytes of each 16-bit word: `[B, A, D, C]`
/// - `Cdab` reverses the order of the 16-bit words: `[C, D, A, B]`
/// - `Dcba` reverses every byte: `[D, C, B, A]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "&'static str", try_from = "String")]
pub enum WordOrder {
    #[default]
    Abcd,
    Badc,
    Cdab,
    Dcba,
}

impl WordOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            WordOrder::Abcd => "ABCD",
            WordOrder::Badc => "BADC",
            WordOrder::Cdab => "CDAB",
            WordOrder::Dcba => "DCBA",
        }
    }

    /// True for orders that move 16-bit words as units.
    pub fn is_word_based(self) -> bool {
        matches!(self, WordOrder::Badc | WordOrder::Cdab)
    }
}

impl fmt::Display for WordOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `ABCD`, `ab-cd`, `ABCDEFGH` and the other three patterns.
impl FromStr for WordOrder {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', '_'], "");
        match normalized.as_str() {
            "ABCD" | "ABCDEFGH" => Ok(WordOrder::Abcd),
            "BADC" | "BADCFEHG" => Ok(WordOrder::Badc),
            "CDAB" | "GHEFCDAB" => Ok(WordOrder::Cdab),
            "DCBA" | "HGFEDCBA" => Ok(WordOrder::Dcba),
            _ => Err(CodecError::UnsupportedKind(format!("word order {s:?}"))),
        }
    }
}

impl From<WordOrder> for &'static str {
    fn from(order: WordOrder) -> Self {
        order.as_str()
    }
}

impl TryFrom<String> for WordOrder {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Byte order used when packing a single element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Struct-format prefix character (`<` or `>`).
    pub fn prefix(self) -> char {
        match self {
            Endian::Little => '<',
            Endian::Big => '>',
        }
    }

    pub fn is_little(self) -> bool {
        self == Endian::Little
    }
}

impl fmt::Display for Endian {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endian::Little => f.write_str("little"),
            Endian::Big => f.write_str("big"),
        }
    }
}

impl FromStr for Endian {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "little" | "le" | "little_endian" | "<" => Ok(Endian::Little),
            "big" | "be" | "big_endian" | ">" => Ok(Endian::Big),
            _ => Err(CodecError::UnsupportedKind(format!("endianness {s:?}"))),
        }
    }
}

/// Permute a whole buffer according to `order`.
///
/// `Cdab` reverses the sequence of 2-byte words across the entire buffer,
/// so a 4-byte value goes `ABCD -> CDAB` and an 8-byte value goes
/// `ABCDEFGH -> GHEFCDAB`. For `Badc` and `Cdab` an odd trailing byte stays
/// where it is, neither dropped nor zero-filled: `Cdab` turns
/// `[1, 2, 3, 4, 5]` into `[3, 4, 1, 2, 5]`. Every order is its own inverse.
pub fn reorder_words(buffer: &[u8], order: WordOrder) -> BytesMut {
    let mut out = BytesMut::from(buffer);
    permute(&mut out, order);
    out
}

/// Apply `order` independently to each `width`-byte element.
///
/// Use this for arrays of 32/64-bit values where each element must be
/// reordered on its own. A trailing partial element is left untouched; a
/// `width` of zero reorders the buffer as a whole.
pub fn reorder_chunks(buffer: &[u8], order: WordOrder, width: usize) -> BytesMut {
    if width == 0 {
        return reorder_words(buffer, order);
    }
    let mut out = BytesMut::from(buffer);
    for chunk in out.chunks_exact_mut(width) {
        permute(chunk, order);
    }
    out
}

fn permute(buf: &mut [u8], order: WordOrder) {
    let even = buf.len() & !1;
    match order {
        WordOrder::Abcd => {}
        WordOrder::Badc => {
            for pair in buf[..even].chunks_exact_mut(2) {
                pair.swap(0, 1);
            }
        }
        WordOrder::Cdab => {
            let words = even / 2;
            for i in 0..words / 2 {
                let j = words - 1 - i;
                buf.swap(2 * i, 2 * j);
                buf.swap(2 * i + 1, 2 * j + 1);
            }
        }
        WordOrder::Dcba => buf.reverse(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_word_order() {
        assert_eq!("ABCD".parse::<WordOrder>().unwrap(), WordOrder::Abcd);
        assert_eq!("ab-cd".parse::<WordOrder>().unwrap(), WordOrder::Abcd);
        assert_eq!("CD-AB".parse::<WordOrder>().unwrap(), WordOrder::Cdab);
        assert_eq!("badc".parse::<WordOrder>().unwrap(), WordOrder::Badc);
        assert_eq!("HGFEDCBA".parse::<WordOrder>().unwrap(), WordOrder::Dcba);
        assert!("ACBD".parse::<WordOrder>().is_err());
        assert_eq!(WordOrder::default(), WordOrder::Abcd);
    }

    #[test]
    fn parse_endian() {
        assert_eq!("LE".parse::<Endian>().unwrap(), Endian::Little);
        assert_eq!(">".parse::<Endian>().unwrap(), Endian::Big);
        assert_eq!(Endian::default(), Endian::Little);
        assert_eq!(Endian::Big.prefix(), '>');
    }

    #[test]
    fn four_byte_orders() {
        let abcd = [0x0A, 0x0B, 0x0C, 0x0D];
        assert_eq!(&reorder_words(&abcd, WordOrder::Abcd)[..], &abcd);
        assert_eq!(&reorder_words(&abcd, WordOrder::Badc)[..], &[0x0B, 0x0A, 0x0D, 0x0C]);
        assert_eq!(&reorder_words(&abcd, WordOrder::Cdab)[..], &[0x0C, 0x0D, 0x0A, 0x0B]);
        assert_eq!(&reorder_words(&abcd, WordOrder::Dcba)[..], &[0x0D, 0x0C, 0x0B, 0x0A]);
    }

    #[test]
    fn cdab_spans_whole_buffer() {
        let buf = [1, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(
            &reorder_words(&buf, WordOrder::Cdab)[..],
            &[7, 8, 5, 6, 3, 4, 1, 2]
        );
    }

    #[test]
    fn odd_trailing_byte_stays() {
        let buf = [1, 2, 3, 4, 5];
        assert_eq!(&reorder_words(&buf, WordOrder::Badc)[..], &[2, 1, 4, 3, 5]);
        assert_eq!(&reorder_words(&buf, WordOrder::Cdab)[..], &[3, 4, 1, 2, 5]);
        assert_eq!(&reorder_words(&buf, WordOrder::Dcba)[..], &[5, 4, 3, 2, 1]);
    }

    #[test]
    fn empty_buffer_stays_empty() {
        for order in [WordOrder::Abcd, WordOrder::Badc, WordOrder::Cdab, WordOrder::Dcba] {
            assert!(reorder_words(&[], order).is_empty());
        }
    }

    #[test]
    fn reorder_chunks_per_element() {
        let buf = [1, 2, 3, 4, 5, 6, 7, 8, 9];
        assert_eq!(
            &reorder_chunks(&buf, WordOrder::Cdab, 4)[..],
            &[3, 4, 1, 2, 7, 8, 5, 6, 9]
        );
        assert_eq!(
            &reorder_chunks(&buf[..8], WordOrder::Cdab, 0)[..],
            &reorder_words(&buf[..8], WordOrder::Cdab)[..]
        );
    }
}
