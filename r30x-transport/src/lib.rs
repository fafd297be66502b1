//! Transport layer for R30x sensors
//!
//! The sensor protocol is strictly synchronous request-reply, so the
//! transport is a blocking byte pipe with a bounded timeout on every read
//! and write.

pub mod error;
pub mod serial;

pub use error::{Error, Result};
pub use serial::SerialTransport;

use std::time::Duration;

/// Abstraction over the byte-oriented link to the sensor.
///
/// The driver owns exactly one transport per session and never assumes any
/// bytes remain buffered between commands. Implementations may discard
/// stale bytes on their own schedule but must not reorder.
pub trait Transport: Send {
    /// Open the underlying device.
    fn connect(&mut self) -> Result<()>;

    /// Close the underlying device. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Check if the device is open.
    fn is_connected(&self) -> bool;

    /// Write and flush all of `data` within the configured timeout.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes, each read bounded by the configured
    /// timeout. Partial delivery of any granularity is handled.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Bound every subsequent blocking read and write.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()>;

    /// Human-readable name of the endpoint, for diagnostics.
    fn descriptor(&self) -> String;
}
