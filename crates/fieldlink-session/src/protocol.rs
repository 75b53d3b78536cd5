use bytes::Bytes;
use fieldlink_frame::{encode_marker_frame, FrameFactory, MarkerFrame};
use fieldlink_outcome::Outcome;
use fieldlink_transport::DeviceStream;

/// The hooks a concrete device protocol plugs into [`Connection`] and
/// [`Listener`].
///
/// The descriptor factory ([`FrameFactory`]) says how responses are framed.
/// `initialize_on_connect` and `extra_on_disconnect` have no sensible
/// default and fail with `UnsupportedMethod` until a protocol overrides
/// them; packing and unpacking default to passing bytes through.
///
/// [`Connection`]: crate::Connection
/// [`Listener`]: crate::Listener
pub trait DeviceProtocol: FrameFactory + Send + Sync {
    /// Runs once on every freshly connected socket (login, handshake).
    fn initialize_on_connect(&self, _stream: &mut DeviceStream) -> Outcome<()> {
        Outcome::unsupported("initialize_on_connect")
    }

    /// Runs before an explicit disconnect (protocol goodbye).
    fn extra_on_disconnect(&self, _stream: &mut DeviceStream) -> Outcome<()> {
        Outcome::unsupported("extra_on_disconnect")
    }

    /// Add the protocol header to an outgoing command.
    fn pack_command_with_header(&self, command: &[u8]) -> Outcome<Bytes> {
        Outcome::success(Bytes::copy_from_slice(command))
    }

    /// Validate a framed response and strip its envelope. `sent` is the
    /// packed command.
    fn unpack_response(&self, _sent: &[u8], received: Bytes) -> Outcome<Bytes> {
        Outcome::success(received)
    }
}

/// The `0x68 <len> <content>` fixed-header protocol.
///
/// Needs no handshake or goodbye. Packing wraps a command in a marker frame;
/// responses are delivered with their head.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkerProtocol;

impl FrameFactory for MarkerProtocol {
    type Frame = MarkerFrame;

    fn new_frame(&self) -> MarkerFrame {
        MarkerFrame
    }
}

impl DeviceProtocol for MarkerProtocol {
    fn initialize_on_connect(&self, _stream: &mut DeviceStream) -> Outcome<()> {
        Outcome::done()
    }

    fn extra_on_disconnect(&self, _stream: &mut DeviceStream) -> Outcome<()> {
        Outcome::done()
    }

    fn pack_command_with_header(&self, command: &[u8]) -> Outcome<Bytes> {
        encode_marker_frame(command).into()
    }
}

#[cfg(test)]
mod tests {
    use fieldlink_frame::{FrameDescriptor, LengthFieldFrame};
    use fieldlink_outcome::FaultKind;

    use super::*;

    struct Bare;

    impl FrameFactory for Bare {
        type Frame = LengthFieldFrame;

        fn new_frame(&self) -> LengthFieldFrame {
            LengthFieldFrame::new(2, 1)
        }
    }

    impl DeviceProtocol for Bare {}

    #[test]
    fn default_packing_is_identity() {
        let packed = Bare.pack_command_with_header(&[1, 2, 3]);
        assert_eq!(packed.contents().map(|b| b.as_ref()), Some(&[1u8, 2, 3][..]));

        let unpacked = Bare.unpack_response(&[1], Bytes::from_static(&[9, 9]));
        assert_eq!(unpacked.into_contents().unwrap().as_ref(), &[9, 9]);
    }

    #[test]
    fn marker_protocol_packs_frames() {
        let packed = MarkerProtocol.pack_command_with_header(&[0xAA, 0xBB, 0xCC]);
        assert_eq!(
            packed.into_contents().unwrap().as_ref(),
            &[0x68, 0x03, 0xAA, 0xBB, 0xCC]
        );
        assert_eq!(MarkerProtocol.new_frame().head_length(), 2);
    }

    #[test]
    fn marker_protocol_rejects_oversized_command() {
        let packed = MarkerProtocol.pack_command_with_header(&[0u8; 300]);
        assert_eq!(packed.kind(), Some(FaultKind::Integrity));
    }
}
