//! System parameter block

use std::fmt;

use crate::error::{Error, Result};

/// DATA frame payload sizes, indexed by the sensor's packet-size code.
const PACKET_SIZES: [u16; 4] = [32, 64, 128, 256];

/// Map a payload size in bytes to the sensor's packet-size code.
pub fn packet_size_code(size: u16) -> Option<u8> {
    PACKET_SIZES
        .iter()
        .position(|&s| s == size)
        .map(|code| code as u8)
}

/// Decoded 16-byte system parameter block (ReadSysPara reply).
///
/// The datasheet is inconsistent about units; all sizes here are as the
/// sensor reports them, with conversions exposed as methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemParameters {
    pub status_register: u16,
    pub system_identifier: u16,

    /// Number of template slots in the library
    pub capacity: u16,

    /// Matching strictness, 1..=5
    pub security_level: u16,

    /// Device address as configured on the sensor
    pub address: u32,

    /// DATA frame payload size code, 0..=3
    pub packet_size_code: u16,

    /// Serial speed in units of 9600 baud
    pub baud_unit: u16,
}

impl SystemParameters {
    /// Length of the raw parameter block on the wire.
    pub const BLOCK_LEN: usize = 16;

    /// Decode the parameter block that follows the status byte of a
    /// ReadSysPara acknowledgement.
    pub fn from_block(block: &[u8]) -> Result<Self> {
        if block.len() < Self::BLOCK_LEN {
            return Err(Error::Parse(format!(
                "parameter block of {} bytes, expected {}",
                block.len(),
                Self::BLOCK_LEN
            )));
        }

        Ok(Self {
            status_register: u16::from_be_bytes([block[0], block[1]]),
            system_identifier: u16::from_be_bytes([block[2], block[3]]),
            capacity: u16::from_be_bytes([block[4], block[5]]),
            security_level: u16::from_be_bytes([block[6], block[7]]),
            address: u32::from_be_bytes([block[8], block[9], block[10], block[11]]),
            packet_size_code: u16::from_be_bytes([block[12], block[13]]),
            baud_unit: u16::from_be_bytes([block[14], block[15]]),
        })
    }

    /// Negotiated DATA frame payload size in bytes.
    ///
    /// A code outside 0..=3 means the block was corrupted or the sensor
    /// speaks a dialect this driver does not.
    pub fn packet_size(&self) -> Result<u16> {
        PACKET_SIZES
            .get(self.packet_size_code as usize)
            .copied()
            .ok_or_else(|| {
                Error::Parse(format!(
                    "packet size code {} out of range",
                    self.packet_size_code
                ))
            })
    }

    /// Serial speed in baud.
    pub fn baud_rate(&self) -> u32 {
        self.baud_unit as u32 * 9600
    }
}

impl fmt::Display for SystemParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SystemParameters[capacity: {}, security: {}, address: 0x{:08X}]",
            self.capacity, self.security_level, self.address
        )
    }
}
