//! Serial transport

use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};

use crate::{error::*, Transport};

/// Default bound on a single blocking read or write.
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Serial transport for R30x sensors.
///
/// The sensors speak 8 data bits, no parity, one stop bit, no flow control
/// at every supported baud rate.
pub struct SerialTransport {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    /// Create a new serial transport. The port is opened by [`Transport::connect`].
    pub fn new(port_name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate,
            timeout: DEFAULT_TIMEOUT,
            port: None,
        }
    }

    /// Set the read/write timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn map_read_error(err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::TimedOut => Error::ReadTimeout,
        std::io::ErrorKind::UnexpectedEof => Error::Closed,
        _ => Error::Io(err),
    }
}

fn map_write_error(err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::TimedOut => Error::WriteTimeout,
        _ => Error::Io(err),
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        debug!("Opening {} at {} baud...", self.port_name, self.baud_rate);

        let port = serialport::new(self.port_name.as_str(), self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open()
            .map_err(|e| Error::Io(e.into()))?;

        debug!("Opened {}", self.port_name);

        self.port = Some(port);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(port) = self.port.take() {
            debug!("Closing {}...", self.port_name);
            drop(port);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        trace!("TX {} bytes: {:02X?}", data.len(), &data[..data.len().min(16)]);

        port.write_all(data).map_err(map_write_error)?;
        port.flush().map_err(map_write_error)?;

        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let port = self.port.as_mut().ok_or(Error::NotConnected)?;

        port.read_exact(buf).map_err(map_read_error)?;

        trace!("RX {} bytes: {:02X?}", buf.len(), &buf[..buf.len().min(16)]);

        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        if let Some(port) = self.port.as_mut() {
            port.set_timeout(timeout).map_err(|e| Error::Io(e.into()))?;
        }
        Ok(())
    }

    fn descriptor(&self) -> String {
        format!("{}@{}", self.port_name, self.baud_rate)
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        if self.is_connected() {
            warn!("Serial transport dropped while still open");
        }
    }
}
