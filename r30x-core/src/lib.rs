//! # r30x-core
//!
//! Wire-protocol primitives for the ZhianTec R30x / FPM10A fingerprint
//! sensor family.
//!
//! This crate provides the low-level protocol pieces:
//! - Frame structure and encoding/decoding
//! - Checksum calculation
//! - Instruction definitions
//! - Acknowledgement status decoding

pub mod checksum;
pub mod constants;
pub mod error;
pub mod frame;
pub mod instruction;
pub mod status;

pub use error::{Error, Result};
pub use frame::{Frame, FrameHeader, FrameKind};
pub use instruction::Instruction;
pub use status::{ConfirmCode, Outcome};
