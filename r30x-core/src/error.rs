//! Error types for r30x-core

use crate::instruction::Instruction;
use crate::status::ConfirmCode;

/// Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wire-protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller-side input the protocol cannot express
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Frame header is malformed
    #[error("bad frame header: {0}")]
    BadHeader(String),

    /// Frame checksum verification failed
    #[error("frame checksum mismatch: computed 0x{computed:04X}, received 0x{received:04X}")]
    BadChecksum { computed: u16, received: u16 },

    /// A frame of the wrong kind arrived
    #[error("unexpected frame type 0x{found:02X} while waiting for {expected}")]
    UnexpectedFrameType { found: u8, expected: &'static str },

    /// The sensor answered with a documented failure code
    #[error("sensor refused {command}: {code}")]
    Protocol { command: Instruction, code: ConfirmCode },

    /// The sensor answered with a code outside the documented table
    #[error("sensor answered {command} with undocumented status 0x{code:02X}")]
    UnknownStatus { command: Instruction, code: u8 },
}
