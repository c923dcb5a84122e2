//! Binary codec for peary request and response frames.
//!
//! Wire format (protocol version `"1"`):
//! ```text
//! [length:4][sequence:2][status:2][payload:N][crc32:4]
//! ```
//! `length` counts every byte after the length field itself.  The trailing
//! `crc32` is only present when the session runs in [`IntegrityMode::Crc32`].
//! All multi-byte integers are big-endian.
//!
//! # Why a length prefix? (for beginners)
//!
//! TCP delivers a stream of bytes, not messages.  A reader that only sees
//! bytes needs some way to know where one frame ends and the next begins.
//! The 4-byte prefix tells the reader exactly how many more bytes belong to
//! the current frame, so it can read the header first and then the rest.
//!
//! # Integrity checking
//!
//! In [`IntegrityMode::Crc32`] the encoder appends a CRC-32 (IEEE) computed
//! over the sequence, status, and payload bytes.  The decoder recomputes it
//! and rejects the frame on mismatch.  In [`IntegrityMode::None`] no trailer
//! is written and none is expected.  Both peers must agree on the mode; it
//! is fixed for the lifetime of a session.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Protocol constants ────────────────────────────────────────────────────────

/// The single protocol version this implementation speaks.
///
/// Compared byte-for-byte against the daemon's reply to `protocol_version`.
pub const PROTOCOL_VERSION: &str = "1";

/// Status value signalling that the daemon handled a request successfully.
pub const STATUS_OK: u16 = 0;

/// Size of the big-endian length prefix.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Size of the sequence + status header that follows the length prefix.
pub const HEADER_SIZE: usize = 4;

/// Size of the CRC-32 trailer in [`IntegrityMode::Crc32`].
pub const CHECKSUM_SIZE: usize = 4;

/// Default receive buffer for one response frame.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Largest payload that still fits the 32-bit length field in every mode.
pub const MAX_PAYLOAD_SIZE: usize = u32::MAX as usize - HEADER_SIZE - CHECKSUM_SIZE;

// ── Integrity mode ────────────────────────────────────────────────────────────

/// How frames are protected against corruption on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrityMode {
    /// No checksum is written or verified.
    #[default]
    None,
    /// A CRC-32 trailer is written on encode and verified on every decode.
    Crc32,
}

impl IntegrityMode {
    /// Number of trailer bytes this mode appends to each frame.
    pub fn trailer_len(self) -> usize {
        match self {
            IntegrityMode::None => 0,
            IntegrityMode::Crc32 => CHECKSUM_SIZE,
        }
    }
}

impl std::fmt::Display for IntegrityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityMode::None => f.write_str("none"),
            IntegrityMode::Crc32 => f.write_str("crc32"),
        }
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Errors that can occur while encoding or decoding a frame.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    /// The byte slice is shorter than the length prefix plus the header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The length field declares fewer bytes than the header (and trailer) require.
    #[error("declared frame length {declared} is below the minimum of {minimum}")]
    LengthTooShort { declared: usize, minimum: usize },

    /// The length field does not match the number of bytes actually present.
    #[error("frame length mismatch: header says {declared}, available is {available}")]
    LengthMismatch { declared: usize, available: usize },

    /// The CRC-32 trailer does not match the recomputed value.
    #[error("checksum mismatch: frame carries 0x{received:08X}, computed 0x{computed:08X}")]
    ChecksumMismatch { received: u32, computed: u32 },

    /// The payload cannot be described by the 32-bit length field.
    #[error("payload of {len} bytes does not fit the 32-bit length field")]
    PayloadTooLarge { len: usize },
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// One decoded unit of wire data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Request text (command plus space-joined arguments) or opaque response bytes.
    pub payload: Vec<u8>,
    /// Sequence number assigned by the requesting session.
    pub sequence: u16,
    /// [`STATUS_OK`] or a daemon-defined failure code.
    pub status: u16,
}

impl Frame {
    /// Creates a frame from its three fields.
    pub fn new(payload: impl Into<Vec<u8>>, sequence: u16, status: u16) -> Self {
        Self {
            payload: payload.into(),
            sequence,
            status,
        }
    }

    /// Creates a frame carrying [`STATUS_OK`], the status every request uses.
    pub fn ok(payload: impl Into<Vec<u8>>, sequence: u16) -> Self {
        Self::new(payload, sequence, STATUS_OK)
    }

    /// Returns `true` when the status equals [`STATUS_OK`].
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }

    /// Encodes this frame.  See [`encode_frame`].
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::PayloadTooLarge`] if the payload does not fit the
    /// length field.
    pub fn encode(&self, mode: IntegrityMode) -> Result<Vec<u8>, FrameError> {
        encode_frame(&self.payload, self.sequence, self.status, mode)
    }

    /// Decodes one frame.  See [`decode_frame`].
    ///
    /// # Errors
    ///
    /// Returns [`FrameError`] if the bytes are malformed or fail the integrity check.
    pub fn decode(bytes: &[u8], mode: IntegrityMode) -> Result<Self, FrameError> {
        decode_frame(bytes, mode)
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Encodes `(payload, sequence, status)` into a self-delimiting frame.
///
/// The output depends only on the inputs and `mode`, so identical calls
/// always produce identical bytes.
///
/// # Errors
///
/// Returns [`FrameError::PayloadTooLarge`] if `payload` is longer than
/// [`MAX_PAYLOAD_SIZE`].
///
/// # Examples
///
/// ```rust
/// use peary_core::protocol::{decode_frame, encode_frame, IntegrityMode, STATUS_OK};
///
/// let bytes = encode_frame(b"add_device alpha", 1, STATUS_OK, IntegrityMode::None).unwrap();
/// let frame = decode_frame(&bytes, IntegrityMode::None).unwrap();
/// assert_eq!(frame.payload, b"add_device alpha");
/// assert_eq!(frame.sequence, 1);
/// ```
pub fn encode_frame(
    payload: &[u8],
    sequence: u16,
    status: u16,
    mode: IntegrityMode,
) -> Result<Vec<u8>, FrameError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge { len: payload.len() });
    }
    let body_len = HEADER_SIZE + payload.len() + mode.trailer_len();

    let mut buf = Vec::with_capacity(LENGTH_PREFIX_SIZE + body_len);
    buf.extend_from_slice(&(body_len as u32).to_be_bytes());
    buf.extend_from_slice(&sequence.to_be_bytes());
    buf.extend_from_slice(&status.to_be_bytes());
    buf.extend_from_slice(payload);

    if mode == IntegrityMode::Crc32 {
        // Checksum covers everything after the length prefix.
        let checksum = crc32fast::hash(&buf[LENGTH_PREFIX_SIZE..]);
        buf.extend_from_slice(&checksum.to_be_bytes());
    }
    Ok(buf)
}

/// Decodes exactly one frame from `bytes`.
///
/// `bytes` must hold the complete frame and nothing else: trailing bytes are
/// reported as a [`FrameError::LengthMismatch`] just like missing ones.
///
/// # Errors
///
/// Returns [`FrameError`] if the frame is too short, its length field is
/// inconsistent, or (in [`IntegrityMode::Crc32`]) its checksum does not match.
pub fn decode_frame(bytes: &[u8], mode: IntegrityMode) -> Result<Frame, FrameError> {
    let needed = LENGTH_PREFIX_SIZE + HEADER_SIZE;
    if bytes.len() < needed {
        return Err(FrameError::InsufficientData {
            needed,
            available: bytes.len(),
        });
    }

    let declared = declared_length([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let minimum = HEADER_SIZE + mode.trailer_len();
    if declared < minimum {
        return Err(FrameError::LengthTooShort { declared, minimum });
    }

    let body = &bytes[LENGTH_PREFIX_SIZE..];
    if body.len() != declared {
        return Err(FrameError::LengthMismatch {
            declared,
            available: body.len(),
        });
    }

    let (content, trailer) = body.split_at(declared - mode.trailer_len());
    if mode == IntegrityMode::Crc32 {
        let received = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let computed = crc32fast::hash(content);
        if received != computed {
            return Err(FrameError::ChecksumMismatch { received, computed });
        }
    }

    Ok(Frame {
        sequence: u16::from_be_bytes([content[0], content[1]]),
        status: u16::from_be_bytes([content[2], content[3]]),
        payload: content[HEADER_SIZE..].to_vec(),
    })
}

/// Interprets a length prefix, returning the number of bytes that follow it.
pub fn declared_length(prefix: [u8; LENGTH_PREFIX_SIZE]) -> usize {
    u32::from_be_bytes(prefix) as usize
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(frame: &Frame, mode: IntegrityMode) -> Frame {
        let encoded = frame.encode(mode).expect("encode failed");
        Frame::decode(&encoded, mode).expect("decode failed")
    }

    // ── Layout ────────────────────────────────────────────────────────────────

    #[test]
    fn test_layout_without_checksum() {
        // Arrange / Act
        let bytes = encode_frame(b"abc", 0x0102, 0x0304, IntegrityMode::None).unwrap();

        // Assert
        assert_eq!(
            bytes,
            vec![0x00, 0x00, 0x00, 0x07, 0x01, 0x02, 0x03, 0x04, b'a', b'b', b'c']
        );
    }

    #[test]
    fn test_layout_with_checksum_appends_crc_of_header_and_payload() {
        // Arrange
        let bytes = encode_frame(b"abc", 7, STATUS_OK, IntegrityMode::Crc32).unwrap();

        // Act
        let expected_crc = crc32fast::hash(&bytes[4..11]);
        let trailer = u32::from_be_bytes(bytes[11..15].try_into().unwrap());

        // Assert
        assert_eq!(bytes.len(), 15);
        assert_eq!(declared_length(bytes[0..4].try_into().unwrap()), 11);
        assert_eq!(trailer, expected_crc);
    }

    #[test]
    fn test_empty_payload_encodes_header_only() {
        let bytes = encode_frame(b"", 1, STATUS_OK, IntegrityMode::None).unwrap();
        assert_eq!(bytes.len(), LENGTH_PREFIX_SIZE + HEADER_SIZE);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let a = encode_frame(b"list_devices", 42, STATUS_OK, IntegrityMode::Crc32).unwrap();
        let b = encode_frame(b"list_devices", 42, STATUS_OK, IntegrityMode::Crc32).unwrap();
        assert_eq!(a, b);
    }

    // ── Round trips ───────────────────────────────────────────────────────────

    #[test]
    fn test_round_trip_preserves_fields_in_both_modes() {
        let frame = Frame::new(b"device.name 0".to_vec(), u16::MAX, 3);
        assert_eq!(round_trip(&frame, IntegrityMode::None), frame);
        assert_eq!(round_trip(&frame, IntegrityMode::Crc32), frame);
    }

    #[test]
    fn test_round_trip_binary_payload() {
        let frame = Frame::ok(vec![0x00, 0xFF, 0x20, 0x0A], 9);
        assert_eq!(round_trip(&frame, IntegrityMode::Crc32), frame);
    }

    // ── Error conditions ──────────────────────────────────────────────────────

    #[test]
    fn test_decode_empty_bytes_returns_insufficient_data() {
        let result = decode_frame(&[], IntegrityMode::None);
        assert_eq!(
            result,
            Err(FrameError::InsufficientData {
                needed: 8,
                available: 0
            })
        );
    }

    #[test]
    fn test_decode_declared_length_below_header_is_rejected() {
        // Length field says 2, which cannot hold sequence + status.
        let bytes = [0, 0, 0, 2, 0, 1, 0, 0];
        let result = decode_frame(&bytes, IntegrityMode::None);
        assert_eq!(
            result,
            Err(FrameError::LengthTooShort {
                declared: 2,
                minimum: 4
            })
        );
    }

    #[test]
    fn test_decode_crc_mode_requires_room_for_trailer() {
        let bytes = encode_frame(b"", 1, STATUS_OK, IntegrityMode::None).unwrap();
        let result = decode_frame(&bytes, IntegrityMode::Crc32);
        assert!(matches!(result, Err(FrameError::LengthTooShort { minimum: 8, .. })));
    }

    #[test]
    fn test_decode_truncated_frame_returns_length_mismatch() {
        let mut bytes = encode_frame(b"hello", 1, STATUS_OK, IntegrityMode::None).unwrap();
        bytes.truncate(bytes.len() - 2);
        let result = decode_frame(&bytes, IntegrityMode::None);
        assert_eq!(
            result,
            Err(FrameError::LengthMismatch {
                declared: 9,
                available: 7
            })
        );
    }

    #[test]
    fn test_decode_trailing_bytes_return_length_mismatch() {
        let mut bytes = encode_frame(b"hello", 1, STATUS_OK, IntegrityMode::None).unwrap();
        bytes.push(0xAA);
        let result = decode_frame(&bytes, IntegrityMode::None);
        assert!(matches!(result, Err(FrameError::LengthMismatch { .. })));
    }

    #[test]
    fn test_decode_flipped_payload_bit_fails_checksum() {
        // Arrange
        let mut bytes = encode_frame(b"hello", 1, STATUS_OK, IntegrityMode::Crc32).unwrap();
        bytes[9] ^= 0x01;

        // Act
        let result = decode_frame(&bytes, IntegrityMode::Crc32);

        // Assert
        assert!(matches!(result, Err(FrameError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_decode_flipped_sequence_bit_fails_checksum() {
        let mut bytes = encode_frame(b"", 1, STATUS_OK, IntegrityMode::Crc32).unwrap();
        bytes[5] ^= 0x02;
        let result = decode_frame(&bytes, IntegrityMode::Crc32);
        assert!(matches!(result, Err(FrameError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_decode_without_checking_ignores_corruption() {
        // In None mode the corrupted byte is simply part of the payload.
        let mut bytes = encode_frame(b"hello", 1, STATUS_OK, IntegrityMode::None).unwrap();
        bytes[8] = b'j';
        let frame = decode_frame(&bytes, IntegrityMode::None).unwrap();
        assert_eq!(frame.payload, b"jello");
    }

    #[test]
    fn test_integrity_mode_trailer_len() {
        assert_eq!(IntegrityMode::None.trailer_len(), 0);
        assert_eq!(IntegrityMode::Crc32.trailer_len(), CHECKSUM_SIZE);
    }

    #[test]
    fn test_integrity_mode_default_is_none() {
        assert_eq!(IntegrityMode::default(), IntegrityMode::None);
    }
}
