//! Wire framing for the tunnel.
//!
//! [`PayloadCodec`] frames every message the tunnel carries — the
//! bincode-serialized role handshake request/reply as well as the
//! opaque application bytes exchanged once `Connected` — behind one
//! length-prefixed wire shape (`u32` big-endian byte length, then the
//! payload). The core communication subsystem never looks inside a
//! payload beyond the `RoleHeader` byte described in `envelope.rs`; a
//! handshake message is just a payload the SCM happens to
//! (de)serialize as a [`RoleRequest`]/[`RoleReply`] before handing it
//! to or taking it from the tunnel.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Maximum frame size (16 MB). Generous relative to any role handshake
/// or application payload this link carries; exists to bound memory
/// use against a misbehaving or hostile peer rather than to express a
/// real protocol limit.
const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },
}

/// Reads a length-prefixed frame out of `src` without interpreting its
/// contents, returning the raw bytes. Shared by both codecs below.
fn decode_frame(src: &mut BytesMut) -> Result<Option<BytesMut>, CodecError> {
    if src.len() < 4 {
        return Ok(None);
    }

    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    if src.len() < 4 + len {
        src.reserve(4 + len - src.len());
        return Ok(None);
    }

    src.advance(4);
    Ok(Some(src.split_to(len)))
}

fn encode_frame(data: &[u8], dst: &mut BytesMut) -> Result<(), CodecError> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(CodecError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    dst.reserve(4 + data.len());
    dst.put_u32(data.len() as u32);
    dst.put_slice(data);
    Ok(())
}

/// Frames opaque application payloads exchanged after the handshake
/// completes, in both directions.
#[derive(Debug, Default)]
pub struct PayloadCodec;

impl Decoder for PayloadCodec {
    type Item = Vec<u8>;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(frame) = decode_frame(src)? else {
            return Ok(None);
        };
        Ok(Some(frame.to_vec()))
    }
}

impl Encoder<Vec<u8>> for PayloadCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Vec<u8>, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(&item, dst)
    }
}

impl Encoder<&[u8]> for PayloadCodec {
    type Error = CodecError;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_frame(item, dst)
    }
}
