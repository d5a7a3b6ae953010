//! WebSocket frame parsing and serialization (RFC 6455).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! | |1|2|3|       |K|             |                               |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |                 Masking key (if MASK set)                     |
//! +---------------------------------------------------------------+
//! |                     Payload data                              |
//! +---------------------------------------------------------------+
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::apply_mask;

/// Maximum payload size for control frames (RFC 6455).
pub const MAX_CONTROL_FRAME_PAYLOAD: usize = 125;

/// Control frames must be final and carry at most 125 bytes.
pub(crate) fn check_control(opcode: OpCode, fin: bool, len: u64) -> Result<()> {
    if opcode.is_control() {
        if !fin {
            return Err(Error::FragmentedControlFrame);
        }
        if len > MAX_CONTROL_FRAME_PAYLOAD as u64 {
            return Err(Error::ControlFrameTooLarge(len as usize));
        }
    }
    Ok(())
}

/// Fields decoded from the two fixed header bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BaseHeader {
    pub(crate) fin: bool,
    pub(crate) opcode: OpCode,
    pub(crate) masked: bool,
    pub(crate) len7: u8,
}

impl BaseHeader {
    /// Decode byte0/byte1. RSV bits must be clear since no extension is ever
    /// negotiated.
    pub(crate) fn decode(byte0: u8, byte1: u8) -> Result<Self> {
        if byte0 & 0x70 != 0 {
            return Err(Error::ReservedBitsSet);
        }
        Ok(Self {
            fin: byte0 & 0x80 != 0,
            opcode: OpCode::from_u8(byte0)?,
            masked: byte1 & 0x80 != 0,
            len7: byte1 & 0x7F,
        })
    }

    /// Number of extended length bytes that follow the base header.
    pub(crate) const fn extended_len_size(&self) -> usize {
        match self.len7 {
            126 => 2,
            127 => 8,
            _ => 0,
        }
    }

    /// Resolve the payload length from the extension bytes.
    ///
    /// `ext` must hold exactly `extended_len_size()` bytes.
    pub(crate) fn payload_len(&self, ext: &[u8]) -> Result<u64> {
        match self.len7 {
            126 => Ok(u64::from(u16::from_be_bytes([ext[0], ext[1]]))),
            127 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&ext[..8]);
                let len = u64::from_be_bytes(raw);
                if len & (1 << 63) != 0 {
                    return Err(Error::ProtocolError(
                        "64-bit payload length has its most significant bit set".into(),
                    ));
                }
                Ok(len)
            }
            short => Ok(u64::from(short)),
        }
    }
}

/// A WebSocket frame.
///
/// `mask` is the key the frame was (or will be) masked with on the wire;
/// `payload` always holds the unmasked bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key, present iff the frame travels client to server.
    pub mask: Option<[u8; 4]>,
    payload: Bytes,
}

impl Frame {
    /// Create an unmasked frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: impl Into<Bytes>) -> Self {
        Self {
            fin,
            opcode,
            mask: None,
            payload: payload.into(),
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Text, data)
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Binary, data)
    }

    /// Create a close frame with an optional status code.
    #[must_use]
    pub fn close(code: Option<u16>) -> Self {
        let payload = code.map(|c| c.to_be_bytes().to_vec()).unwrap_or_default();
        Self::new(true, OpCode::Close, payload)
    }

    /// Create a ping frame.
    #[must_use]
    pub fn ping(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Ping, data)
    }

    /// Create a pong frame.
    #[must_use]
    pub fn pong(data: impl Into<Bytes>) -> Self {
        Self::new(true, OpCode::Pong, data)
    }

    /// Set the masking key used when this frame is written.
    #[must_use]
    pub fn with_mask(mut self, mask: Option<[u8; 4]>) -> Self {
        self.mask = mask;
        self
    }

    /// Unmasked payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Status code carried by a close frame, if any.
    #[must_use]
    pub fn close_code(&self) -> Option<u16> {
        match (self.opcode, self.payload.as_ref()) {
            (OpCode::Close, [hi, lo, ..]) => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Parse a frame from a buffer.
    ///
    /// Returns the frame and the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if `buf` does not yet hold the whole frame
    /// - `Error::FrameTooLarge` if the declared length exceeds `max_payload`;
    ///   this is reported as soon as the length field is readable
    /// - `Error::ReservedOpcode` / `Error::ReservedBitsSet` / `Error::ProtocolError`
    ///   for malformed headers
    pub fn parse(buf: &[u8], max_payload: usize) -> Result<(Self, usize)> {
        if buf.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - buf.len(),
            });
        }
        let base = BaseHeader::decode(buf[0], buf[1])?;

        let ext_end = 2 + base.extended_len_size();
        if buf.len() < ext_end {
            return Err(Error::IncompleteFrame {
                needed: ext_end - buf.len(),
            });
        }
        let declared = base.payload_len(&buf[2..ext_end])?;
        if declared > max_payload as u64 {
            return Err(Error::FrameTooLarge {
                size: declared,
                max: max_payload,
            });
        }
        // Bounded by max_payload, which is a usize.
        let payload_len = declared as usize;

        let header_len = if base.masked { ext_end + 4 } else { ext_end };
        let total = header_len + payload_len;
        if buf.len() < total {
            return Err(Error::IncompleteFrame {
                needed: total - buf.len(),
            });
        }

        let mask = base
            .masked
            .then(|| [buf[ext_end], buf[ext_end + 1], buf[ext_end + 2], buf[ext_end + 3]]);
        let mut payload = buf[header_len..total].to_vec();
        if let Some(key) = mask {
            apply_mask(&mut payload, key);
        }

        let frame = Frame {
            fin: base.fin,
            opcode: base.opcode,
            mask,
            payload: Bytes::from(payload),
        };
        Ok((frame, total))
    }

    /// Validate control frame rules.
    ///
    /// # Errors
    ///
    /// - `Error::FragmentedControlFrame` if a control frame has FIN=0
    /// - `Error::ControlFrameTooLarge` if a control frame payload exceeds 125 bytes
    pub fn validate(&self) -> Result<()> {
        check_control(self.opcode, self.fin, self.payload.len() as u64)
    }

    /// Header length on the wire for this frame.
    #[must_use]
    pub fn header_size(&self) -> usize {
        let ext = match self.payload.len() {
            0..=125 => 0,
            126..=65535 => 2,
            _ => 8,
        };
        2 + ext + if self.mask.is_some() { 4 } else { 0 }
    }

    /// Total size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self) -> usize {
        self.header_size() + self.payload.len()
    }

    /// Append the wire encoding of this frame to `dst`.
    ///
    /// When `mask` is set, the masked bytes are produced in `dst`; the frame's
    /// own payload is never modified.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        let payload_len = self.payload.len();
        dst.reserve(self.wire_size());

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        dst.put_u8(byte0);

        let mask_bit = if self.mask.is_some() { 0x80 } else { 0 };
        match payload_len {
            0..=125 => dst.put_u8(mask_bit | payload_len as u8),
            126..=65535 => {
                dst.put_u8(mask_bit | 126);
                dst.put_u16(payload_len as u16);
            }
            _ => {
                dst.put_u8(mask_bit | 127);
                dst.put_u64(payload_len as u64);
            }
        }

        match self.mask {
            Some(key) => {
                dst.put_slice(&key);
                let start = dst.len();
                dst.put_slice(&self.payload);
                apply_mask(&mut dst[start..], key);
            }
            None => dst.put_slice(&self.payload),
        }
    }

    /// Encode this frame into a fresh buffer.
    #[must_use]
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.wire_size());
        self.encode_into(&mut buf);
        buf.freeze()
    }
}
