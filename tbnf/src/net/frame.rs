//! Wire framing: `u16 LE frameSize | TypeTag (u16 LE) | payload` (§4.2, §6).
//!
//! `write_message`/`read_message` are the async counterparts of the spec's `WriteMessage` and
//! `ReadMessage`. Every suspension point races against a [`CancellationToken`] so a socket
//! replacement or endpoint disposal can interrupt an in-flight read or write promptly (§5).

use crate::registry::{MessageRegistry, PackagedFrame, TypeTag, MAX_FRAME_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use std::any::Any;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

/// A decoded, type-erased message ready for [`crate::dispatch::HandlerDispatch`].
pub struct Envelope {
    pub tag: TypeTag,
    pub payload: Box<dyn Any + Send + Sync>,
}

/// Outcome of a single `read_message` call.
pub struct FrameRead {
    /// `Some` when a frame was read and its tag was registered; `None` for an unrecognized
    /// tag (the frame is still consumed — the connection stays open) or end-of-stream.
    pub envelope: Option<Envelope>,
    /// `true` only when the stream itself ended (EOF, cancellation, or a malformed length
    /// prefix) — the signal the receive loop uses to stop (§4.4).
    pub closed: bool,
}

/// Writes an already-packed frame: `size (u16 LE)` then the packed bytes. Returns `false` on
/// cancellation or any I/O failure, with no partial-success reporting (§4.2).
pub async fn write_message<S>(stream: &mut S, frame: &PackagedFrame, cancel: &CancellationToken) -> bool
where
    S: AsyncWrite + Unpin,
{
    if frame.len() > MAX_FRAME_SIZE {
        return false;
    }

    let write = async {
        let mut header = [0u8; 2];
        LittleEndian::write_u16(&mut header, frame.len() as u16);
        stream.write_all(&header).await?;
        stream.write_all(frame.as_bytes()).await?;
        stream.flush().await
    };

    tokio::select! {
        _ = cancel.cancelled() => false,
        result = write => result.is_ok(),
    }
}

/// Reads one length-prefixed frame and decodes it against `registry`.
pub async fn read_message<S>(stream: &mut S, registry: &MessageRegistry, cancel: &CancellationToken) -> FrameRead
where
    S: AsyncRead + Unpin,
{
    let read = async {
        let mut header = [0u8; 2];
        stream.read_exact(&mut header).await.ok()?;
        let size = LittleEndian::read_u16(&header) as usize;
        if size < 2 {
            return None;
        }
        let mut body = vec![0u8; size];
        stream.read_exact(&mut body).await.ok()?;
        Some(PackagedFrame::from_wire(body))
    };

    let frame = tokio::select! {
        _ = cancel.cancelled() => None,
        frame = read => frame,
    };

    let frame = match frame {
        Some(frame) => frame,
        None => return FrameRead { envelope: None, closed: true },
    };

    match frame.unpack_dyn(registry) {
        Some(payload) => FrameRead {
            envelope: Some(Envelope { tag: frame.type_tag(), payload }),
            closed: false,
        },
        None => FrameRead { envelope: None, closed: false },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{IdentificationMessage, PermittedAuthor, WireMessage};
    use crate::registry::MessageDescriptor;
    use tokio::io::duplex;

    #[tokio::test]
    async fn round_trips_a_message_over_an_in_memory_duplex() {
        let registry = MessageRegistry::build(Vec::new()).unwrap();
        let (mut a, mut b) = duplex(4096);
        let cancel = CancellationToken::new();

        let frame = PackagedFrame::pack(&registry, &IdentificationMessage { hardware_address: [9; 6] }).unwrap();
        assert!(write_message(&mut a, &frame, &cancel).await);

        let read = read_message(&mut b, &registry, &cancel).await;
        assert!(!read.closed);
        let envelope = read.envelope.unwrap();
        let decoded = envelope.payload.downcast::<IdentificationMessage>().unwrap();
        assert_eq!(decoded.hardware_address, [9; 6]);
    }

    #[tokio::test]
    async fn closed_stream_is_reported_as_closed() {
        let registry = MessageRegistry::build(Vec::new()).unwrap();
        let (a, mut b) = duplex(4096);
        drop(a);
        let cancel = CancellationToken::new();

        let read = read_message(&mut b, &registry, &cancel).await;
        assert!(read.closed);
        assert!(read.envelope.is_none());
    }

    #[derive(Debug)]
    struct UnregisteredMessage;

    impl WireMessage for UnregisteredMessage {
        const CANONICAL_NAME: &'static str = "tbnf::tests::UnregisteredMessage";
        const AUTHOR: PermittedAuthor = PermittedAuthor::ClientOrHost;

        fn write_payload(&self, _w: &mut dyn std::io::Write) -> Result<(), crate::error::CodecError> {
            Ok(())
        }

        fn read_payload(_r: &mut dyn std::io::Read) -> Result<Self, crate::error::CodecError> {
            Ok(UnregisteredMessage)
        }
    }

    #[tokio::test]
    async fn unknown_tag_consumes_the_frame_but_stays_open() {
        // Build two registries: a wide one that knows `UnregisteredMessage` (used only to
        // pack the frame) and a narrow one (used to read it) that never registered it.
        let writer_registry = MessageRegistry::build(vec![MessageDescriptor::of::<UnregisteredMessage>()]).unwrap();
        let reader_registry = MessageRegistry::build(Vec::new()).unwrap();

        let (mut a, mut b) = duplex(4096);
        let cancel = CancellationToken::new();
        let frame = PackagedFrame::pack(&writer_registry, &UnregisteredMessage).unwrap();
        assert!(write_message(&mut a, &frame, &cancel).await);

        let read = read_message(&mut b, &reader_registry, &cancel).await;
        assert!(!read.closed);
        assert!(read.envelope.is_none());
    }
}
