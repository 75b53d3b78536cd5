use std::ops::Range;

use bytes::Bytes;
use fieldlink_codec::{format_bytes, Endian};

use crate::descriptor::FrameDescriptor;
use crate::error::{FrameError, Result};

/// A fixed-size head that carries the content length at a known offset.
///
/// Content length is `field + adjustment`, where `field` is the unsigned
/// integer of `length_width` bytes at `length_offset`. Optionally the head
/// must start with a fixed prefix and/or echo a byte range of the request
/// (transaction ids).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthFieldFrame {
    head_length: usize,
    length_offset: usize,
    length_width: usize,
    length_endian: Endian,
    adjustment: i64,
    prefix: Option<Bytes>,
    echo: Option<Range<usize>>,
}

impl LengthFieldFrame {
    /// A head of `head_length` bytes with a one-byte length at `length_offset`.
    pub fn new(head_length: usize, length_offset: usize) -> Self {
        Self {
            head_length,
            length_offset,
            length_width: 1,
            length_endian: Endian::Big,
            adjustment: 0,
            prefix: None,
            echo: None,
        }
    }

    /// Width of the length field: 1, 2, 4 or 8 bytes.
    pub fn with_length_width(mut self, width: usize) -> Self {
        self.length_width = width;
        self
    }

    pub fn with_length_endian(mut self, endian: Endian) -> Self {
        self.length_endian = endian;
        self
    }

    /// Added to the field value; negative when the field counts head bytes.
    pub fn with_adjustment(mut self, adjustment: i64) -> Self {
        self.adjustment = adjustment;
        self
    }

    /// Bytes every head must start with.
    pub fn with_prefix(mut self, prefix: impl Into<Bytes>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Head bytes in `range` must equal the same range of the request.
    pub fn with_echo(mut self, range: Range<usize>) -> Self {
        self.echo = Some(range);
        self
    }

    fn read_field(&self, head: &[u8]) -> Result<u64> {
        if !matches!(self.length_width, 1 | 2 | 4 | 8) {
            return Err(FrameError::integrity(format!(
                "unsupported length field width {}",
                self.length_width
            )));
        }
        let field = self
            .length_offset
            .checked_add(self.length_width)
            .and_then(|end| head.get(self.length_offset..end))
            .ok_or_else(|| FrameError::integrity("head too short for length field"))?;

        let fold = |acc: u64, &b: &u8| (acc << 8) | u64::from(b);
        Ok(match self.length_endian {
            Endian::Big => field.iter().fold(0, fold),
            Endian::Little => field.iter().rev().fold(0, fold),
        })
    }
}

impl FrameDescriptor for LengthFieldFrame {
    fn head_length(&self) -> usize {
        self.head_length
    }

    fn content_length(&self, head: &[u8]) -> Result<usize> {
        let field = self.read_field(head)?;
        let length = i128::from(field) + i128::from(self.adjustment);
        usize::try_from(length).map_err(|_| {
            FrameError::integrity(format!(
                "length field {field} with adjustment {} is invalid",
                self.adjustment
            ))
        })
    }

    fn check_response(&self, head: &[u8], sent: &[u8]) -> Result<()> {
        if let Some(prefix) = &self.prefix {
            if !head.starts_with(prefix) {
                return Err(FrameError::integrity(format!(
                    "head {} does not start with {}",
                    format_bytes(head),
                    format_bytes(prefix)
                )));
            }
        }
        if let Some(range) = &self.echo {
            if sent.is_empty() {
                return Ok(());
            }
            let got = head.get(range.clone());
            let want = sent.get(range.clone());
            if got.is_none() || got != want {
                return Err(FrameError::integrity(format!(
                    "head bytes {range:?} do not echo the request"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_byte_length() {
        let frame = LengthFieldFrame::new(2, 1);
        assert_eq!(frame.content_length(&[0x68, 0x05]).unwrap(), 5);
    }

    #[test]
    fn two_byte_length_with_adjustment() {
        // 7-byte head, 2-byte big-endian length at offset 4 that also counts
        // the byte at offset 6.
        let frame = LengthFieldFrame::new(7, 4)
            .with_length_width(2)
            .with_adjustment(-1);
        let head = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x11];
        assert_eq!(frame.content_length(&head).unwrap(), 5);

        let little = LengthFieldFrame::new(3, 1)
            .with_length_width(2)
            .with_length_endian(Endian::Little);
        assert_eq!(little.content_length(&[0x00, 0x10, 0x01]).unwrap(), 0x0110);
    }

    #[test]
    fn negative_length_is_integrity_error() {
        let frame = LengthFieldFrame::new(2, 1).with_adjustment(-4);
        assert!(matches!(
            frame.content_length(&[0x00, 0x02]),
            Err(FrameError::Integrity(_))
        ));
    }

    #[test]
    fn prefix_and_echo() {
        let frame = LengthFieldFrame::new(4, 3)
            .with_prefix(&b"\xAA"[..])
            .with_echo(1..3);
        let sent = [0xAA, 0x12, 0x34, 0x00];

        assert!(frame.check_response(&[0xAA, 0x12, 0x34, 0x02], &sent).is_ok());
        assert!(frame.check_response(&[0xAB, 0x12, 0x34, 0x02], &sent).is_err());
        assert!(frame.check_response(&[0xAA, 0x12, 0x35, 0x02], &sent).is_err());
        assert!(frame.check_response(&[0xAA, 0x00, 0x00, 0x02], &[]).is_ok());
    }

    #[test]
    fn short_head_is_integrity_error() {
        let frame = LengthFieldFrame::new(4, 3).with_length_width(2);
        assert!(frame.content_length(&[0, 0, 0, 1]).is_err());
    }
}
