//! Session configuration

use std::time::Duration;

use r30x_core::constants::{
    BAUD_UNIT, DEFAULT_ADDRESS, DEFAULT_BAUD_RATE, DEFAULT_PASSWORD, DEFAULT_TIMEOUT_MS,
};

use crate::error::{Error, Result};

/// Highest serial speed the sensor family supports.
const MAX_BAUD_RATE: u32 = 115_200;

/// Explicit connection settings for a sensor session.
///
/// Every knob the sensor cares about is a field here; there are no hidden
/// global defaults beyond [`SensorConfig::new`]'s factory values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorConfig {
    /// Serial port device name
    pub port: String,

    /// Serial speed; a multiple of 9600 in [9600, 115200]
    pub baud_rate: u32,

    /// Device address the sensor is configured with
    pub address: u32,

    /// Device password
    pub password: u32,

    /// Bound on any single blocking read or write
    pub timeout: Duration,
}

impl SensorConfig {
    /// Settings for a factory-fresh sensor on `port`.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            address: DEFAULT_ADDRESS,
            password: DEFAULT_PASSWORD,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_address(mut self, address: u32) -> Self {
        self.address = address;
        self
    }

    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Reject settings the sensor cannot speak, before any I/O happens.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate < BAUD_UNIT
            || self.baud_rate > MAX_BAUD_RATE
            || self.baud_rate % BAUD_UNIT != 0
        {
            return Err(Error::InvalidArgument(format!(
                "baud rate {} is not a multiple of 9600 in [9600, 115200]",
                self.baud_rate
            )));
        }
        Ok(())
    }
}
