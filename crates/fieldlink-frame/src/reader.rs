use std::io::Read;

use bytes::Bytes;
use fieldlink_outcome::Outcome;
use fieldlink_transport::{try_receive_exact, DeviceStream};
use tracing::{debug, warn};

use crate::descriptor::{FrameConfig, FrameDescriptor, FrameFactory, FramedMessage};
use crate::error::{FrameError, Result};

/// Head, check, then content: the framed read shared by every caller.
fn read_framed<R, D>(
    reader: &mut R,
    mut message: FramedMessage<D>,
    config: &FrameConfig,
) -> Result<Bytes>
where
    R: Read + ?Sized,
    D: FrameDescriptor,
{
    let head = try_receive_exact(reader, message.descriptor().head_length())?;
    message.set_head(head);

    message
        .descriptor()
        .check_response(message.head(), message.sent())?;

    let length = message.descriptor().content_length(message.head())?;
    if length > config.max_content_length {
        return Err(FrameError::ContentTooLarge {
            size: length,
            max: config.max_content_length,
        });
    }

    let content = try_receive_exact(reader, length)?;
    message.set_content(content);
    Ok(message.into_payload())
}

/// Read one framed message from a device socket.
///
/// When the head fails the descriptor's check, or announces too much
/// content, the stream is shut down before the error is returned: the byte
/// position of the next frame is unknown, so the socket cannot be reused.
pub fn try_receive_framed_message<D: FrameDescriptor>(
    stream: &mut DeviceStream,
    message: FramedMessage<D>,
    config: &FrameConfig,
) -> Result<Bytes> {
    match read_framed(stream, message, config) {
        Err(err @ (FrameError::Integrity(_) | FrameError::ContentTooLarge { .. })) => {
            warn!(error = %err, "closing stream after integrity failure");
            if let Err(e) = stream.shutdown() {
                debug!(error = %e, "shutdown after integrity failure failed");
            }
            Err(err)
        }
        other => other,
    }
}

/// Outcome form of [`try_receive_framed_message`].
pub fn receive_framed_message<D: FrameDescriptor>(
    stream: &mut DeviceStream,
    message: FramedMessage<D>,
    config: &FrameConfig,
) -> Outcome<Bytes> {
    try_receive_framed_message(stream, message, config).into()
}

/// Reads complete framed messages from any `Read` stream.
///
/// Reads exactly the bytes of each message, so the stream is positioned at
/// the start of the next one afterwards.
pub struct FrameReader<T> {
    inner: T,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self { inner, config }
    }

    /// Read the message described by `message` (blocking).
    pub fn read_message<D: FrameDescriptor>(&mut self, message: FramedMessage<D>) -> Result<Bytes> {
        read_framed(&mut self.inner, message, &self.config)
    }

    /// Read an unsolicited message with a fresh descriptor from `factory`.
    pub fn read_next<F: FrameFactory + ?Sized>(&mut self, factory: &F) -> Result<Bytes> {
        self.read_message(FramedMessage::unsolicited(factory.new_frame()))
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
