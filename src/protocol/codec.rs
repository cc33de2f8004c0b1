//! Frame codec for exchange messages
//!
//! Each frame is a varint length prefix followed by one protobuf-encoded
//! message. The declared length is checked against the configured maximum
//! before any payload space is reserved.

use bytes::{Buf, Bytes, BytesMut};
use prost::Message as _;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, trace};

use super::{wire, Message, MessageError, MAX_FRAME_SIZE};

/// A u64 varint never needs more than 10 bytes.
const MAX_PREFIX_LEN: usize = 10;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(u64, usize),

    #[error("Truncated frame: expected {expected} bytes, received {received}")]
    TruncatedFrame { expected: usize, received: usize },

    #[error("Stream ended inside a length prefix")]
    TruncatedPrefix,

    #[error("Invalid length prefix")]
    InvalidLengthPrefix,

    #[error("Stream closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Encode error: {0}")]
    Encode(#[from] prost::EncodeError),

    #[error(transparent)]
    Message(#[from] MessageError),
}

/// Fold one prefix byte into `value`. Returns true once the prefix is complete.
fn push_prefix_byte(value: &mut u64, index: usize, byte: u8) -> Result<bool, CodecError> {
    if index == MAX_PREFIX_LEN - 1 && byte > 1 {
        return Err(CodecError::InvalidLengthPrefix);
    }
    *value |= u64::from(byte & 0x7f) << (7 * index);
    Ok(byte & 0x80 == 0)
}

/// Parse a length prefix from the front of `buf` without consuming it.
/// Returns the declared length and the prefix size, or None if incomplete.
fn peek_prefix(buf: &[u8]) -> Result<Option<(u64, usize)>, CodecError> {
    let mut value = 0u64;
    for (i, &byte) in buf.iter().take(MAX_PREFIX_LEN).enumerate() {
        if push_prefix_byte(&mut value, i, byte)? {
            return Ok(Some((value, i + 1)));
        }
    }
    if buf.len() >= MAX_PREFIX_LEN {
        return Err(CodecError::InvalidLengthPrefix);
    }
    Ok(None)
}

fn check_length(length: u64, max_frame_size: usize) -> Result<usize, CodecError> {
    match usize::try_from(length) {
        Ok(length) if length <= max_frame_size => Ok(length),
        _ => {
            debug!(length, max = max_frame_size, "Rejecting oversized frame");
            Err(CodecError::FrameTooLarge(length, max_frame_size))
        }
    }
}

fn decode_payload(payload: Bytes) -> Result<Message, CodecError> {
    let pb = wire::Message::decode(payload).map_err(MessageError::from)?;
    let message = Message::from_wire(pb).map_err(|e| {
        debug!(error = %e, "Failed to decode message");
        e
    })?;
    Ok(message)
}

/// Encodes messages into frames
#[derive(Debug, Clone)]
pub struct Encoder {
    max_frame_size: usize,
}

impl Encoder {
    pub fn new() -> Self {
        Self::with_max_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Append one frame to `buf`.
    ///
    /// Refuses messages whose encoding exceeds the maximum frame size, since
    /// a peer using the same limit would reject them.
    pub fn encode(&self, message: &Message, buf: &mut BytesMut) -> Result<(), CodecError> {
        let pb = message.to_wire();
        let length = pb.encoded_len();
        check_length(length as u64, self.max_frame_size)?;

        buf.reserve(length + MAX_PREFIX_LEN);
        pb.encode_length_delimited(buf)?;

        trace!(bytes = length, "Encoded frame");
        Ok(())
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Incrementally decodes frames from a buffer
#[derive(Debug)]
pub struct Decoder {
    max_frame_size: usize,
    state: DecodeState,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    #[default]
    Prefix,
    Payload {
        length: usize,
    },
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_size(max_frame_size: usize) -> Self {
        Self {
            max_frame_size,
            state: DecodeState::Prefix,
        }
    }

    /// Attempt to decode a frame from the buffer.
    /// Returns Ok(None) if more data is needed.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        loop {
            match self.state {
                DecodeState::Prefix => {
                    let Some((length, prefix_len)) = peek_prefix(buf)? else {
                        return Ok(None);
                    };
                    let length = check_length(length, self.max_frame_size)?;

                    buf.advance(prefix_len);
                    buf.reserve(length.saturating_sub(buf.len()));
                    self.state = DecodeState::Payload { length };
                }
                DecodeState::Payload { length } => {
                    if buf.len() < length {
                        return Ok(None);
                    }

                    let payload = buf.split_to(length).freeze();
                    self.state = DecodeState::Prefix;

                    trace!(bytes = length, "Decoded frame");
                    return decode_payload(payload).map(Some);
                }
            }
        }
    }

    /// Decode a frame once no more input will arrive.
    ///
    /// Leftover bytes that do not form a whole frame are an error.
    pub fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Message>, CodecError> {
        if let Some(message) = self.decode(buf)? {
            return Ok(Some(message));
        }
        match self.state {
            DecodeState::Payload { length } => Err(CodecError::TruncatedFrame {
                expected: length,
                received: buf.len(),
            }),
            DecodeState::Prefix if !buf.is_empty() => Err(CodecError::TruncatedPrefix),
            DecodeState::Prefix => Ok(None),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Write one framed message and flush the stream.
///
/// A failure part way through leaves the stream mid-frame; callers should
/// drop the connection.
pub async fn write_message<W>(
    io: &mut W,
    message: &Message,
    max_frame_size: usize,
) -> Result<(), CodecError>
where
    W: AsyncWrite + Unpin,
{
    let mut buf = BytesMut::new();
    Encoder::with_max_size(max_frame_size).encode(message, &mut buf)?;

    io.write_all(&buf).await.map_err(|e| {
        debug!(error = %e, "Failed to write frame");
        e
    })?;
    io.flush().await?;

    trace!(bytes = buf.len(), "Wrote frame");
    Ok(())
}

async fn read_prefix<R>(io: &mut R) -> Result<u64, CodecError>
where
    R: AsyncRead + Unpin,
{
    let mut value = 0u64;
    for i in 0..MAX_PREFIX_LEN {
        let byte = match io.read_u8().await {
            Ok(byte) => byte,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(if i == 0 {
                    CodecError::Closed
                } else {
                    CodecError::TruncatedPrefix
                });
            }
            Err(e) => return Err(e.into()),
        };
        if push_prefix_byte(&mut value, i, byte)? {
            return Ok(value);
        }
    }
    Err(CodecError::InvalidLengthPrefix)
}

/// Read exactly one framed message.
///
/// An oversized frame is rejected right after its prefix; the payload is
/// left unread on the stream.
pub async fn read_message<R>(io: &mut R, max_frame_size: usize) -> Result<Message, CodecError>
where
    R: AsyncRead + Unpin,
{
    let length = check_length(read_prefix(io).await?, max_frame_size)?;
    trace!(length, "Read length prefix");

    let mut payload = Vec::with_capacity(length);
    let received = (&mut *io).take(length as u64).read_to_end(&mut payload).await?;
    if received < length {
        debug!(expected = length, received, "Stream ended inside a frame");
        return Err(CodecError::TruncatedFrame {
            expected: length,
            received,
        });
    }

    decode_payload(Bytes::from(payload))
}
