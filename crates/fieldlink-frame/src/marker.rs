use bytes::{BufMut, Bytes, BytesMut};

use crate::descriptor::FrameDescriptor;
use crate::error::{FrameError, Result};

/// Start-of-frame marker byte.
pub const MARKER: u8 = 0x68;

/// Head size: marker (1) + length (1).
pub const MARKER_HEAD_SIZE: usize = 2;

/// Largest content a one-byte length field can announce.
pub const MAX_MARKER_CONTENT: usize = u8::MAX as usize;

/// Fixed-header framing: `0x68`, a one-byte content length, then content.
///
/// ```text
/// ┌────────────┬────────────┬──────────────────┐
/// │ Marker 1B  │ Length 1B  │ Content          │
/// │ 0x68       │ N          │ (N bytes)        │
/// └────────────┴────────────┴──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerFrame;

impl FrameDescriptor for MarkerFrame {
    fn head_length(&self) -> usize {
        MARKER_HEAD_SIZE
    }

    fn content_length(&self, head: &[u8]) -> Result<usize> {
        head.get(1)
            .map(|&len| len as usize)
            .ok_or_else(|| FrameError::integrity("head too short for length byte"))
    }

    fn check_response(&self, head: &[u8], _sent: &[u8]) -> Result<()> {
        match head.first() {
            Some(&MARKER) => Ok(()),
            Some(other) => Err(FrameError::integrity(format!(
                "expected marker 0x{MARKER:02X}, got 0x{other:02X}"
            ))),
            None => Err(FrameError::integrity("empty head")),
        }
    }
}

/// Wrap `content` in a marker frame.
pub fn encode_marker_frame(content: &[u8]) -> Result<Bytes> {
    if content.len() > MAX_MARKER_CONTENT {
        return Err(FrameError::ContentTooLarge {
            size: content.len(),
            max: MAX_MARKER_CONTENT,
        });
    }
    let mut out = BytesMut::with_capacity(MARKER_HEAD_SIZE + content.len());
    out.put_u8(MARKER);
    out.put_u8(content.len() as u8);
    out.put_slice(content);
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_prefixes_marker_and_length() {
        let frame = encode_marker_frame(&[0xAA, 0xBB, 0xCC]).unwrap();
        assert_eq!(frame.as_ref(), &[0x68, 0x03, 0xAA, 0xBB, 0xCC]);

        let empty = encode_marker_frame(&[]).unwrap();
        assert_eq!(empty.as_ref(), &[0x68, 0x00]);
    }

    #[test]
    fn encode_rejects_oversized_content() {
        let err = encode_marker_frame(&[0u8; 256]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::ContentTooLarge { size: 256, max: 255 }
        ));
    }

    #[test]
    fn marker_descriptor_reads_length_byte() {
        assert_eq!(MarkerFrame.head_length(), 2);
        assert_eq!(MarkerFrame.content_length(&[0x68, 0x03]).unwrap(), 3);
        assert!(MarkerFrame.check_response(&[0x68, 0x03], &[]).is_ok());
        assert!(matches!(
            MarkerFrame.check_response(&[0x10, 0x03], &[]),
            Err(FrameError::Integrity(_))
        ));
    }
}
