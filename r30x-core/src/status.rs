//! Acknowledgement status decoding
//!
//! Every command is answered by exactly one ACK frame whose first payload
//! byte is a confirmation code. A handful of codes are expected outcomes of
//! specific commands (no finger on the window, no matching template, ...)
//! and decode to values; every other code is an error. A few codes are
//! overloaded across commands, so decoding always pairs the code with the
//! instruction that was issued.

use std::fmt;

use crate::error::{Error, Result};
use crate::instruction::Instruction;

/// Documented confirmation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConfirmCode {
    Ok = 0x00,
    CommunicationError = 0x01,
    NoFinger = 0x02,
    EnrollFailed = 0x03,
    MessyImage = 0x06,
    FewFeaturePoints = 0x07,
    NotMatching = 0x08,
    NoTemplateFound = 0x09,
    CharacteristicsMismatch = 0x0A,
    InvalidPosition = 0x0B,
    TemplateReadFailed = 0x0C,
    CharacteristicsDownloadFailed = 0x0D,
    PacketResponseFailed = 0x0E,
    ImageDownloadFailed = 0x0F,
    DeleteFailed = 0x10,
    ClearFailed = 0x11,
    WrongPassword = 0x13,
    InvalidImage = 0x15,
    FlashError = 0x18,
    InvalidRegister = 0x1A,
    AddressMismatch = 0x20,
}

impl ConfirmCode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::Ok),
            0x01 => Some(Self::CommunicationError),
            0x02 => Some(Self::NoFinger),
            0x03 => Some(Self::EnrollFailed),
            0x06 => Some(Self::MessyImage),
            0x07 => Some(Self::FewFeaturePoints),
            0x08 => Some(Self::NotMatching),
            0x09 => Some(Self::NoTemplateFound),
            0x0A => Some(Self::CharacteristicsMismatch),
            0x0B => Some(Self::InvalidPosition),
            0x0C => Some(Self::TemplateReadFailed),
            0x0D => Some(Self::CharacteristicsDownloadFailed),
            0x0E => Some(Self::PacketResponseFailed),
            0x0F => Some(Self::ImageDownloadFailed),
            0x10 => Some(Self::DeleteFailed),
            0x11 => Some(Self::ClearFailed),
            0x13 => Some(Self::WrongPassword),
            0x15 => Some(Self::InvalidImage),
            0x18 => Some(Self::FlashError),
            0x1A => Some(Self::InvalidRegister),
            0x20 => Some(Self::AddressMismatch),
            _ => None,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::CommunicationError => "communication error",
            Self::NoFinger => "no finger on the window",
            Self::EnrollFailed => "failed to enroll the image",
            Self::MessyImage => "image too messy",
            Self::FewFeaturePoints => "too few feature points",
            Self::NotMatching => "characteristics do not match",
            Self::NoTemplateFound => "no matching template found",
            Self::CharacteristicsMismatch => "characteristics mismatch",
            Self::InvalidPosition => "invalid storage position",
            Self::TemplateReadFailed => "failed to read template",
            Self::CharacteristicsDownloadFailed => "failed to transfer characteristics",
            Self::PacketResponseFailed => "packet response failure",
            Self::ImageDownloadFailed => "failed to transfer image",
            Self::DeleteFailed => "failed to delete template",
            Self::ClearFailed => "failed to clear the database",
            Self::WrongPassword => "wrong password",
            Self::InvalidImage => "invalid image",
            Self::FlashError => "flash write error",
            Self::InvalidRegister => "invalid register number",
            Self::AddressMismatch => "address mismatch",
        }
    }
}

impl fmt::Display for ConfirmCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.describe(), *self as u8)
    }
}

/// Expected outcome of a command, decoded from its confirmation code.
///
/// Anything other than [`Outcome::Ok`] is a result the caller is supposed to
/// branch on, not an error: a control loop waiting for a finger polls
/// ReadImage until the `NoFinger` answers stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,

    /// ReadImage: no finger was on the window
    NoFinger,

    /// VerifyPassword: the password does not match
    WrongPassword,

    /// SearchTemplate: no stored template matches
    NoMatch,

    /// CreateTemplate / CompareCharacteristics: the buffers disagree
    Mismatch,

    /// DeleteTemplate / ClearDatabase: the sensor refused the operation
    Refused,
}

/// Decode the confirmation code of an ACK to `command`.
///
/// Soft codes map to an [`Outcome`] only for the command that defines them;
/// the same byte from any other command is a [`Error::Protocol`]. Codes
/// outside the documented table surface as [`Error::UnknownStatus`] carrying
/// the raw byte. Total over all 256 byte values for every instruction.
pub fn decode(command: Instruction, byte: u8) -> Result<Outcome> {
    use Instruction::*;

    let code = match ConfirmCode::from_byte(byte) {
        Some(code) => code,
        None => return Err(Error::UnknownStatus { command, code: byte }),
    };

    match (command, code) {
        (_, ConfirmCode::Ok) => Ok(Outcome::Ok),
        (ReadImage, ConfirmCode::NoFinger) => Ok(Outcome::NoFinger),
        (VerifyPassword, ConfirmCode::WrongPassword) => Ok(Outcome::WrongPassword),
        (SearchTemplate, ConfirmCode::NoTemplateFound) => Ok(Outcome::NoMatch),
        (CreateTemplate, ConfirmCode::CharacteristicsMismatch) => Ok(Outcome::Mismatch),
        (CompareCharacteristics, ConfirmCode::NotMatching) => Ok(Outcome::Mismatch),
        (DeleteTemplate, ConfirmCode::DeleteFailed) => Ok(Outcome::Refused),
        (ClearDatabase, ConfirmCode::ClearFailed) => Ok(Outcome::Refused),
        _ => Err(Error::Protocol { command, code }),
    }
}
