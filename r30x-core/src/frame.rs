//! Wire frame encoding and decoding

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    constants::{CHECKSUM_LEN, FRAME_HEADER_LEN, START_CODE},
    error::{Error, Result},
};

/// Frame kind byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameKind {
    /// Host-to-sensor command
    Command = 0x01,

    /// Bulk data, more to follow
    Data = 0x02,

    /// Sensor acknowledgement
    Ack = 0x07,

    /// Bulk data, final frame
    EndData = 0x08,
}

impl FrameKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Command => "CMD",
            Self::Data => "DATA",
            Self::Ack => "ACK",
            Self::EndData => "END_DATA",
        }
    }
}

impl TryFrom<u8> for FrameKind {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x01 => Ok(Self::Command),
            0x02 => Ok(Self::Data),
            0x07 => Ok(Self::Ack),
            0x08 => Ok(Self::EndData),
            other => Err(Error::UnexpectedFrameType {
                found: other,
                expected: "a defined frame kind",
            }),
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One protocol frame.
///
/// # Wire layout
///
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┬─────────┐
/// │  Start  │ Address │  Kind   │ Length  │ Payload │Checksum │
/// │ 2 bytes │ 4 bytes │ 1 byte  │ 2 bytes │ N bytes │ 2 bytes │
/// │ 0xEF01  │ (BE u32)│         │ (BE u16)│         │ (BE u16)│
/// └─────────┴─────────┴─────────┴─────────┴─────────┴─────────┘
/// ```
///
/// All multi-byte values are big-endian. The length field counts the
/// payload plus the two checksum bytes, so it is at least 2 in every
/// well-formed frame.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub payload: Bytes,
}

impl Frame {
    /// Largest payload the 16-bit length field can carry.
    pub const MAX_PAYLOAD: usize = u16::MAX as usize - CHECKSUM_LEN;

    /// Create a frame.
    ///
    /// # Examples
    ///
    /// ```
    /// use r30x_core::{Frame, FrameKind};
    ///
    /// let frame = Frame::new(FrameKind::Command, vec![0x1D]);
    /// assert_eq!(frame.payload.len(), 1);
    /// ```
    pub fn new(kind: FrameKind, payload: impl Into<Bytes>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// Encode the frame for the given device address.
    ///
    /// # Examples
    ///
    /// ```
    /// use r30x_core::{Frame, FrameKind};
    ///
    /// let frame = Frame::new(FrameKind::Command, vec![0x1D]);
    /// let encoded = frame.encode(0xFFFF_FFFF).unwrap();
    ///
    /// // Header + payload + checksum
    /// assert_eq!(encoded.len(), 9 + 1 + 2);
    /// assert_eq!(encoded[0], 0xEF);
    /// ```
    pub fn encode(&self, address: u32) -> Result<BytesMut> {
        if self.payload.len() > Self::MAX_PAYLOAD {
            return Err(Error::InvalidArgument(format!(
                "payload of {} bytes does not fit in a frame",
                self.payload.len()
            )));
        }

        let length = (self.payload.len() + CHECKSUM_LEN) as u16;
        let mut buf = BytesMut::with_capacity(FRAME_HEADER_LEN + length as usize);

        buf.put_u16(START_CODE);
        buf.put_u32(address);
        buf.put_u8(self.kind as u8);
        buf.put_u16(length);
        buf.put_slice(&self.payload);
        buf.put_u16(checksum::over(self.kind as u8, length, &self.payload));

        Ok(buf)
    }

    /// Attach the body read after `header` and verify the checksum.
    ///
    /// `body` is the `header.remaining()` bytes following the fixed header:
    /// the payload plus the two trailing checksum bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use r30x_core::{Frame, FrameHeader, FrameKind};
    ///
    /// let encoded = Frame::new(FrameKind::Ack, vec![0x00])
    ///     .encode(0xFFFF_FFFF)
    ///     .unwrap();
    ///
    /// let header = FrameHeader::parse(&encoded[..9]).unwrap();
    /// let frame = Frame::assemble(header, &encoded[9..]).unwrap();
    /// assert_eq!(frame.kind, FrameKind::Ack);
    /// ```
    pub fn assemble(header: FrameHeader, body: &[u8]) -> Result<Self> {
        let Some(payload_len) = body.len().checked_sub(CHECKSUM_LEN) else {
            return Err(Error::BadHeader(format!(
                "frame body of {} bytes is shorter than the checksum",
                body.len()
            )));
        };

        let (payload, trailer) = body.split_at(payload_len);
        let received = u16::from_be_bytes([trailer[0], trailer[1]]);
        let computed = checksum::over(header.kind as u8, header.length, payload);

        if computed != received {
            return Err(Error::BadChecksum { computed, received });
        }

        Ok(Self {
            kind: header.kind,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Decode one complete frame from a contiguous buffer.
    ///
    /// `address` is the session's device address; a frame carrying any
    /// other address is rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use r30x_core::{Frame, FrameKind};
    ///
    /// let original = Frame::new(FrameKind::Command, vec![0x1D]);
    /// let encoded = original.encode(0xFFFF_FFFF).unwrap();
    /// let decoded = Frame::decode(&encoded, 0xFFFF_FFFF).unwrap();
    ///
    /// assert_eq!(decoded.kind, original.kind);
    /// assert_eq!(decoded.payload, original.payload);
    /// ```
    pub fn decode(buf: &[u8], address: u32) -> Result<Self> {
        let header = FrameHeader::parse(buf)?;
        header.expect_address(address)?;

        let total = FRAME_HEADER_LEN + header.remaining();
        if buf.len() < total {
            return Err(Error::BadHeader(format!(
                "frame truncated at {} of {} bytes",
                buf.len(),
                total
            )));
        }

        Self::assemble(header, &buf[FRAME_HEADER_LEN..total])
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("kind", &self.kind)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame[{}](len={})", self.kind, self.payload.len())
    }
}

/// Parsed fixed-size frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub address: u32,
    pub kind: FrameKind,
    /// Value of the length field: payload bytes + 2 checksum bytes.
    pub length: u16,
}

impl FrameHeader {
    /// Parse the first [`FRAME_HEADER_LEN`] bytes of a frame.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < FRAME_HEADER_LEN {
            return Err(Error::BadHeader(format!(
                "frame truncated at {} bytes",
                buf.len()
            )));
        }

        let mut buf = &buf[..FRAME_HEADER_LEN];
        let start = buf.get_u16();
        if start != START_CODE {
            return Err(Error::BadHeader(format!("start code 0x{start:04X}")));
        }

        let address = buf.get_u32();
        let kind = FrameKind::try_from(buf.get_u8())?;
        let length = buf.get_u16();
        if (length as usize) < CHECKSUM_LEN {
            return Err(Error::BadHeader(format!(
                "length field {length} is shorter than the checksum"
            )));
        }

        Ok(Self {
            address,
            kind,
            length,
        })
    }

    /// Number of bytes still to read after the header.
    pub fn remaining(&self) -> usize {
        self.length as usize
    }

    /// Reject a frame addressed to a different device.
    pub fn expect_address(&self, address: u32) -> Result<()> {
        if self.address != address {
            return Err(Error::BadHeader(format!(
                "frame addressed to 0x{:08X} instead of 0x{:08X}",
                self.address, address
            )));
        }
        Ok(())
    }
}
