use bytes::{BufMut, Bytes, BytesMut};

use crate::error::Result;

/// Default maximum content length: 16 MiB.
pub const DEFAULT_MAX_CONTENT: usize = 16 * 1024 * 1024;

/// Describes how one response is laid out on the wire.
///
/// A framed read first takes exactly [`head_length`](Self::head_length)
/// bytes, validates them with [`check_response`](Self::check_response), and
/// then takes exactly [`content_length`](Self::content_length) more.
pub trait FrameDescriptor {
    /// Fixed number of head bytes.
    fn head_length(&self) -> usize;

    /// Number of content bytes that follow `head`.
    fn content_length(&self, head: &[u8]) -> Result<usize>;

    /// Validate the head against the request that was sent. `sent` is empty
    /// when there is no request (server side, push streams).
    fn check_response(&self, _head: &[u8], _sent: &[u8]) -> Result<()> {
        Ok(())
    }
}

impl<D: FrameDescriptor + ?Sized> FrameDescriptor for Box<D> {
    fn head_length(&self) -> usize {
        (**self).head_length()
    }

    fn content_length(&self, head: &[u8]) -> Result<usize> {
        (**self).content_length(head)
    }

    fn check_response(&self, head: &[u8], sent: &[u8]) -> Result<()> {
        (**self).check_response(head, sent)
    }
}

/// Produces a fresh descriptor for every exchange.
pub trait FrameFactory {
    type Frame: FrameDescriptor;

    fn new_frame(&self) -> Self::Frame;
}

impl<F, D> FrameFactory for F
where
    F: Fn() -> D,
    D: FrameDescriptor,
{
    type Frame = D;

    fn new_frame(&self) -> D {
        self()
    }
}

/// Per-exchange state of one framed read.
///
/// Created with the bytes that were sent, filled with the head and then the
/// content, and finally consumed into the concatenated payload.
#[derive(Debug)]
pub struct FramedMessage<D> {
    descriptor: D,
    sent: Bytes,
    head: Bytes,
    content: Bytes,
}

impl<D: FrameDescriptor> FramedMessage<D> {
    pub fn new(descriptor: D, sent: impl Into<Bytes>) -> Self {
        Self {
            descriptor,
            sent: sent.into(),
            head: Bytes::new(),
            content: Bytes::new(),
        }
    }

    /// A message with no originating request.
    pub fn unsolicited(descriptor: D) -> Self {
        Self::new(descriptor, Bytes::new())
    }

    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    pub fn sent(&self) -> &Bytes {
        &self.sent
    }

    pub fn head(&self) -> &Bytes {
        &self.head
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub(crate) fn set_head(&mut self, head: Bytes) {
        self.head = head;
    }

    pub(crate) fn set_content(&mut self, content: Bytes) {
        self.content = content;
    }

    /// Head followed by content.
    pub fn into_payload(self) -> Bytes {
        if self.content.is_empty() {
            return self.head;
        }
        let mut out = BytesMut::with_capacity(self.head.len() + self.content.len());
        out.put_slice(&self.head);
        out.put_slice(&self.content);
        out.freeze()
    }
}

/// Limits applied to every framed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameConfig {
    /// Maximum content length a head may announce. Default: 16 MiB.
    pub max_content_length: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_content_length: DEFAULT_MAX_CONTENT,
        }
    }
}

impl FrameConfig {
    pub fn with_max_content_length(mut self, max: usize) -> Self {
        self.max_content_length = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(usize, usize);

    impl FrameDescriptor for Fixed {
        fn head_length(&self) -> usize {
            self.0
        }

        fn content_length(&self, _head: &[u8]) -> Result<usize> {
            Ok(self.1)
        }
    }

    #[test]
    fn payload_concatenates_head_and_content() {
        let mut message = FramedMessage::new(Fixed(2, 3), &b"req"[..]);
        message.set_head(Bytes::from_static(&[0x68, 0x03]));
        message.set_content(Bytes::from_static(&[0xAA, 0xBB, 0xCC]));
        assert_eq!(message.sent().as_ref(), b"req");
        assert_eq!(
            message.into_payload().as_ref(),
            &[0x68, 0x03, 0xAA, 0xBB, 0xCC]
        );
    }

    #[test]
    fn closure_is_a_factory() {
        let factory = || Fixed(4, 0);
        let frame = factory.new_frame();
        assert_eq!(frame.head_length(), 4);
        assert!(frame.check_response(&[], &[]).is_ok());
    }

    #[test]
    fn boxed_descriptor_delegates() {
        let boxed: Box<dyn FrameDescriptor> = Box::new(Fixed(1, 9));
        assert_eq!(boxed.head_length(), 1);
        assert_eq!(boxed.content_length(&[0]).unwrap(), 9);
    }

    #[test]
    fn config_builder() {
        let cfg = FrameConfig::default().with_max_content_length(255);
        assert_eq!(cfg.max_content_length, 255);
        assert_eq!(FrameConfig::default().max_content_length, DEFAULT_MAX_CONTENT);
    }
}
