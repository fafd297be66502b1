//! # r30x
//!
//! Driver for ZhianTec R30x / FPM10A optical fingerprint sensors over a
//! serial line.
//!
//! ## Features
//!
//! - Complete command set: enrollment, search, comparison, template and
//!   image transfer
//! - Checksummed frame codec resilient to partial reads
//! - Typed confirmation-code decoding per command
//! - Injectable blocking transport
//!
//! ## Quick Start
//!
//! ```no_run
//! use r30x::{CharBuffer, Sensor, SensorConfig};
//!
//! fn main() -> r30x::Result<()> {
//!     let mut sensor = Sensor::open(SensorConfig::new("/dev/ttyUSB0"))?;
//!
//!     if !sensor.verify_password()? {
//!         eprintln!("sensor password rejected");
//!         return Ok(());
//!     }
//!
//!     // Wait for a finger and capture it
//!     while !sensor.read_image()? {}
//!     sensor.convert_image(CharBuffer::One)?;
//!
//!     if let Some(found) = sensor.search_template(CharBuffer::One, 0, None)? {
//!         println!("finger recognised: {found}");
//!     } else {
//!         println!("finger not enrolled");
//!     }
//!
//!     sensor.close()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod sensor;

pub use config::SensorConfig;
pub use error::{Error, Result};
pub use sensor::Sensor;

// Re-export the protocol types callers interact with
pub use r30x_core::constants::{CharBuffer, SysParam};
pub use r30x_core::{ConfirmCode, Frame, FrameKind, Instruction};
pub use r30x_transport::{SerialTransport, Transport};
pub use r30x_types::image::{FingerImage, ImageSink};
pub use r30x_types::system_params::SystemParameters;
pub use r30x_types::template_index::{TemplateIndex, TemplateMatch};
