//! Descriptor-driven framing for request/response device protocols.
//!
//! A device response is read in two exact steps:
//! - a fixed-length head, checked against the request that was sent
//! - a content block whose length the head announces
//!
//! The [`FrameDescriptor`] trait supplies those lengths and the check; a
//! [`FrameFactory`] hands out a fresh descriptor per exchange. No partial
//! reads, no buffer management in user code.

pub mod descriptor;
pub mod error;
pub mod length_field;
pub mod marker;
pub mod reader;

pub use descriptor::{
    FrameConfig, FrameDescriptor, FrameFactory, FramedMessage, DEFAULT_MAX_CONTENT,
};
pub use error::{FrameError, Result};
pub use length_field::LengthFieldFrame;
pub use marker::{encode_marker_frame, MarkerFrame, MARKER, MARKER_HEAD_SIZE, MAX_MARKER_CONTENT};
pub use reader::{receive_framed_message, try_receive_framed_message, FrameReader};
