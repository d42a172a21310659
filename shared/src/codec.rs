//! Length-prefixed codec for TCP framing
//!
//! All commands are framed as:
//! ```text
//! [ 4 bytes: length (u32, big-endian) ][ N bytes: compact UTF-8 JSON ]
//! ```
//!
//! There is no checksum and no magic; the only version marker is the `v`
//! field inside the JSON.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::Command;

/// Size of the length prefix in bytes
pub const PREFIX_LEN: usize = 4;

/// Default receive limit (10 MB) to prevent memory exhaustion
pub const MAX_MESSAGE_SIZE: u32 = 10 * 1024 * 1024;

/// Errors that can occur during encoding/decoding
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Message too large: {0} bytes does not fit a u32 length prefix")]
    MessageTooLarge(usize),

    #[error("Invalid message length prefix: {0}")]
    InvalidLength(u32),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Command body must be a JSON object")]
    BodyNotObject,
}

/// Big-endian length prefix for a payload of `len` bytes
pub fn length_prefix(len: u32) -> [u8; PREFIX_LEN] {
    len.to_be_bytes()
}

/// Payload length carried by a prefix
pub fn read_length_prefix(prefix: [u8; PREFIX_LEN]) -> u32 {
    u32::from_be_bytes(prefix)
}

/// Compact JSON payload of a command
pub fn encode_json(command: &Command) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(command)?)
}

/// Frame an already serialized payload
pub fn encode_payload(payload: &[u8]) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    put_frame(payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a command into a length-prefixed byte buffer
pub fn encode(command: &Command) -> Result<Bytes, CodecError> {
    encode_payload(&encode_json(command)?)
}

/// Encode a command directly into a provided buffer
pub fn encode_into(command: &Command, buf: &mut BytesMut) -> Result<(), CodecError> {
    put_frame(&encode_json(command)?, buf)
}

fn put_frame(payload: &[u8], buf: &mut BytesMut) -> Result<(), CodecError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| CodecError::MessageTooLarge(payload.len()))?;

    buf.reserve(PREFIX_LEN + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);

    Ok(())
}

/// Try to split one complete frame payload off the front of `buf`
///
/// Returns:
/// - `Ok(Some(payload))` if a complete frame was available (possibly empty)
/// - `Ok(None)` if more data is needed; `buf` is left untouched
/// - `Err(InvalidLength)` if the prefix exceeds `max_len`
pub fn decode_frame(buf: &mut BytesMut, max_len: u32) -> Result<Option<Bytes>, CodecError> {
    if buf.len() < PREFIX_LEN {
        return Ok(None);
    }

    // Peek at the length prefix without consuming
    let msg_len = read_length_prefix([buf[0], buf[1], buf[2], buf[3]]);

    if msg_len > max_len {
        return Err(CodecError::InvalidLength(msg_len));
    }

    let total_len = PREFIX_LEN + msg_len as usize;
    if buf.len() < total_len {
        return Ok(None);
    }

    buf.advance(PREFIX_LEN);
    Ok(Some(buf.split_to(msg_len as usize).freeze()))
}

/// Try to decode a length-prefixed command from a buffer
pub fn decode(buf: &mut BytesMut) -> Result<Option<Command>, CodecError> {
    match decode_frame(buf, MAX_MESSAGE_SIZE)? {
        Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
        None => Ok(None),
    }
}

/// Decoder state machine for streaming decoding
#[derive(Debug)]
pub struct FrameDecoder {
    /// Partial frame data being accumulated
    buffer: BytesMut,
    max_len: u32,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a new frame decoder with the default size limit
    pub fn new() -> Self {
        Self::with_max_len(MAX_MESSAGE_SIZE)
    }

    /// Create a decoder rejecting payloads longer than `max_len`
    pub fn with_max_len(max_len: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_len,
        }
    }

    /// Add data to the decoder buffer
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to decode the next raw payload
    ///
    /// Call this repeatedly until it returns `Ok(None)` to drain all complete frames
    pub fn decode_next(&mut self) -> Result<Option<Bytes>, CodecError> {
        decode_frame(&mut self.buffer, self.max_len)
    }

    /// Try to decode the next payload as a command
    pub fn decode_command(&mut self) -> Result<Option<Command>, CodecError> {
        match self.decode_next()? {
            Some(payload) => Ok(Some(serde_json::from_slice(&payload)?)),
            None => Ok(None),
        }
    }

    /// Get the current buffer length (for debugging)
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Encoder for building frames
#[derive(Debug, Default)]
pub struct FrameEncoder {
    buffer: BytesMut,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Encode a command and append it to the output buffer
    pub fn encode(&mut self, command: &Command) -> Result<(), CodecError> {
        encode_into(command, &mut self.buffer)
    }

    /// Take the encoded bytes, leaving an empty buffer
    pub fn take(&mut self) -> Bytes {
        self.buffer.split().freeze()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::{Axis, Direction, EnableDrive, Jog, JogStop};

    fn enable_cmd() -> Command {
        Command::from_body("CMD_001", &EnableDrive::new(Axis::Pan)).unwrap()
    }

    fn jog_cmd() -> Command {
        let jog = Jog::new(Axis::Pan, Direction::Fwd, 50.0, 40.0, 30.0);
        Command::from_body("CMD_JOG", &jog).unwrap()
    }

    #[test]
    fn test_frame_is_prefix_plus_json() {
        let cmd = jog_cmd();
        let json = encode_json(&cmd).unwrap();
        let frame = encode(&cmd).unwrap();

        assert_eq!(&frame[PREFIX_LEN..], &json[..]);
        assert_eq!(frame[..PREFIX_LEN], (json.len() as u32).to_be_bytes());
    }

    #[test]
    fn test_enable_drive_scenario() {
        let frame = encode(&enable_cmd()).unwrap();
        let expected = br#"{"v":1,"id":"CMD_001","type":"Command","name":"EnableDrive","src":"wcs","body":{"axis":"PAN"},"meta":{}}"#;

        assert_eq!(expected.len(), 104);
        assert_eq!(&frame[..PREFIX_LEN], &[0x00, 0x00, 0x00, 0x68]);
        assert_eq!(&frame[PREFIX_LEN..], &expected[..]);
    }

    #[test]
    fn test_length_prefix_boundaries() {
        for len in [0u32, 1, 255, 256, 65_535, 65_536, 0x00FF_FFFF, u32::MAX - 1, u32::MAX] {
            assert_eq!(read_length_prefix(length_prefix(len)), len);
        }
        assert_eq!(length_prefix(0), [0, 0, 0, 0]);
        assert_eq!(length_prefix(u32::MAX), [0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(length_prefix(78), [0x00, 0x00, 0x00, 0x4E]);
    }

    #[test]
    fn test_empty_payload_frame() {
        let frame = encode_payload(&[]).unwrap();
        assert_eq!(&frame[..], &[0, 0, 0, 0]);

        let mut buf = BytesMut::from(&frame[..]);
        let payload = decode_frame(&mut buf, MAX_MESSAGE_SIZE)
            .expect("decode failed")
            .expect("no frame");
        assert!(payload.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let original = jog_cmd();
        let encoded = encode(&original).expect("encode failed");

        let mut buf = BytesMut::from(&encoded[..]);
        let decoded = decode(&mut buf).expect("decode failed").expect("no message");

        assert_eq!(decoded, original);
        assert!(buf.is_empty(), "buffer should be empty after decode");
    }

    #[test]
    fn test_partial_decode() {
        let encoded = encode(&enable_cmd()).expect("encode failed");

        // Prefix complete, payload not
        let mut buf = BytesMut::from(&encoded[..10]);
        let result = decode(&mut buf).expect("decode should not fail on partial data");
        assert!(result.is_none(), "should return None for partial data");

        // Buffer should be unchanged (data not consumed)
        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_frame_decoder_chunks() {
        let encoded = encode(&enable_cmd()).expect("encode failed");
        let mut decoder = FrameDecoder::new();

        for byte in &encoded[..encoded.len() - 1] {
            decoder.extend(std::slice::from_ref(byte));
            assert!(decoder.decode_next().expect("decode error").is_none());
        }

        decoder.extend(&encoded[encoded.len() - 1..]);
        let decoded = decoder
            .decode_command()
            .expect("decode error")
            .expect("should have message");
        assert_eq!(decoded.name, "EnableDrive");
        assert_eq!(decoder.buffer_len(), 0);
    }

    #[test]
    fn test_back_to_back_frames_concatenate() {
        let first = jog_cmd();
        let second = Command::from_body("CMD_STOP", &JogStop::new(Axis::Pan)).unwrap();

        let mut encoder = FrameEncoder::new();
        encoder.encode(&first).unwrap();
        encoder.encode(&second).unwrap();
        let stream = encoder.take();
        assert!(encoder.is_empty());

        let mut expected = encode(&first).unwrap().to_vec();
        expected.extend_from_slice(&encode(&second).unwrap());
        assert_eq!(&stream[..], &expected[..]);

        let mut decoder = FrameDecoder::new();
        decoder.extend(&stream);
        assert_eq!(decoder.decode_command().unwrap(), Some(first));
        assert_eq!(decoder.decode_command().unwrap(), Some(second));
        assert!(decoder.decode_command().unwrap().is_none());
    }

    #[test]
    fn test_message_too_large() {
        let mut buf = BytesMut::new();
        buf.put_u32(MAX_MESSAGE_SIZE + 1);
        buf.put_bytes(0, 100);

        let result = decode(&mut buf);
        assert!(matches!(result, Err(CodecError::InvalidLength(_))));
    }

    #[test]
    fn test_decoder_custom_limit() {
        let encoded = encode(&enable_cmd()).unwrap();
        let mut decoder = FrameDecoder::with_max_len(64);
        decoder.extend(&encoded);
        assert!(matches!(
            decoder.decode_next(),
            Err(CodecError::InvalidLength(104))
        ));
    }

    #[test]
    fn test_invalid_json_payload() {
        let frame = encode_payload(b"{not json").unwrap();
        let mut buf = BytesMut::from(&frame[..]);
        assert!(matches!(decode(&mut buf), Err(CodecError::Json(_))));
    }
}
