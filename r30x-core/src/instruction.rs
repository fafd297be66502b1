//! Sensor instruction set

use std::fmt;

/// Instruction codes understood by the sensor.
///
/// The first byte of every command payload is one of these.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Instruction {
    /// Capture a finger image into the image buffer
    ReadImage = 0x01,

    /// Extract characteristics from the image buffer
    ConvertImage = 0x02,

    /// Compare the two character buffers
    CompareCharacteristics = 0x03,

    /// Search the template library for the given buffer
    SearchTemplate = 0x04,

    /// Combine both character buffers into a template
    CreateTemplate = 0x05,

    /// Store a template at a library slot
    StoreTemplate = 0x06,

    /// Load a stored template into a character buffer
    LoadTemplate = 0x07,

    /// Stream a character buffer to the host
    DownloadCharacteristics = 0x08,

    /// Stream characteristics from the host into a buffer
    UploadCharacteristics = 0x09,

    /// Stream the image buffer to the host
    DownloadImage = 0x0A,

    /// Delete a range of templates
    DeleteTemplate = 0x0C,

    /// Delete every template
    ClearDatabase = 0x0D,

    /// Write a system register
    SetSystemParameter = 0x0E,

    /// Read the 16-byte system parameter block
    ReadSystemParameters = 0x0F,

    /// Change the device password
    SetPassword = 0x12,

    /// Check the device password
    VerifyPassword = 0x13,

    /// Ask the sensor for a random number
    GenerateRandomNumber = 0x14,

    /// Change the device address
    SetAddress = 0x15,

    /// Count the stored templates
    TemplateCount = 0x1D,

    /// Read one occupancy index page
    TemplateIndex = 0x1F,
}

impl Instruction {
    /// Datasheet mnemonic
    pub fn name(self) -> &'static str {
        match self {
            Self::ReadImage => "GenImg",
            Self::ConvertImage => "Img2Tz",
            Self::CompareCharacteristics => "Match",
            Self::SearchTemplate => "Search",
            Self::CreateTemplate => "RegModel",
            Self::StoreTemplate => "Store",
            Self::LoadTemplate => "LoadChar",
            Self::DownloadCharacteristics => "UpChar",
            Self::UploadCharacteristics => "DownChar",
            Self::DownloadImage => "UpImage",
            Self::DeleteTemplate => "DeletChar",
            Self::ClearDatabase => "Empty",
            Self::SetSystemParameter => "WriteReg",
            Self::ReadSystemParameters => "ReadSysPara",
            Self::SetPassword => "SetPwd",
            Self::VerifyPassword => "VfyPwd",
            Self::GenerateRandomNumber => "GetRandomCode",
            Self::SetAddress => "SetAdder",
            Self::TemplateCount => "TempleteNum",
            Self::TemplateIndex => "ReadIndexTable",
        }
    }
}

impl From<Instruction> for u8 {
    fn from(instruction: Instruction) -> u8 {
        instruction as u8
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(0x{:02X})", self.name(), *self as u8)
    }
}
