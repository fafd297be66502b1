//! High-level sensor session

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info, trace, warn};

use r30x_core::constants::{CharBuffer, SysParam, BAUD_UNIT, FRAME_HEADER_LEN, INDEX_PAGES};
use r30x_core::{status, Frame, FrameHeader, FrameKind, Instruction, Outcome};
use r30x_transport::{SerialTransport, Transport};
use r30x_types::image::{FingerImage, ImageSink};
use r30x_types::system_params::{packet_size_code, SystemParameters};
use r30x_types::template_index::{TemplateIndex, TemplateMatch};

use crate::config::SensorConfig;
use crate::error::{Error, Result};

/// A session with one fingerprint sensor.
///
/// The session exclusively owns its transport and runs the protocol
/// strictly request-reply: no command is issued before the previous reply
/// (or reply sequence) has been fully read. After a timeout or framing
/// error the link state is indeterminate and the session should be dropped
/// and reopened.
///
/// # Examples
///
/// ```no_run
/// use r30x::{Sensor, SensorConfig};
///
/// fn main() -> r30x::Result<()> {
///     let mut sensor = Sensor::open(SensorConfig::new("/dev/ttyUSB0"))?;
///
///     if !sensor.verify_password()? {
///         eprintln!("sensor password rejected");
///         return Ok(());
///     }
///
///     println!("{} templates stored", sensor.template_count()?);
///     sensor.close()?;
///     Ok(())
/// }
/// ```
pub struct Sensor {
    transport: Box<dyn Transport>,
    address: u32,
    password: u32,
    timeout: Duration,
}

impl Sensor {
    /// Open a serial session using `config`.
    pub fn open(config: SensorConfig) -> Result<Self> {
        let transport =
            SerialTransport::new(config.port.as_str(), config.baud_rate).with_timeout(config.timeout);
        let mut sensor = Self::with_transport(Box::new(transport), &config)?;
        sensor.connect()?;
        Ok(sensor)
    }

    /// Wrap an already-configured transport.
    ///
    /// The transport is taken as-is; call [`Sensor::connect`] if it is not
    /// open yet.
    pub fn with_transport(transport: Box<dyn Transport>, config: &SensorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            transport,
            address: config.address,
            password: config.password,
            timeout: config.timeout,
        })
    }

    /// Open the transport and apply the session timeout.
    pub fn connect(&mut self) -> Result<()> {
        info!("Connecting to {}...", self.transport.descriptor());
        self.transport.connect()?;
        self.transport.set_timeout(self.timeout)?;
        Ok(())
    }

    /// Close the session, releasing the transport. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.transport.is_connected() {
            info!("Closing {}", self.transport.descriptor());
            self.transport.close()?;
        }
        Ok(())
    }

    /// Device address frames are currently built with.
    pub fn address(&self) -> u32 {
        self.address
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Bound every subsequent blocking read and write.
    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.timeout = timeout;
        self.transport.set_timeout(timeout)?;
        Ok(())
    }

    // Commands

    /// Check the session password against the sensor.
    ///
    /// `false` means the sensor answered "wrong password"; a wrong device
    /// address or any link problem is an error.
    pub fn verify_password(&mut self) -> Result<bool> {
        let password = self.password;
        let (outcome, _) = self.exchange(Instruction::VerifyPassword, &password.to_be_bytes())?;
        Ok(matches!(outcome, Outcome::Ok))
    }

    /// Change the device password. The session mirror is updated only when
    /// the sensor confirms the change.
    pub fn set_password(&mut self, new_password: u32) -> Result<bool> {
        let (outcome, _) = self.exchange(Instruction::SetPassword, &new_password.to_be_bytes())?;
        match outcome {
            Outcome::Ok => {
                self.password = new_password;
                debug!("Password updated");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Change the device address. The session mirror is updated only when
    /// the sensor confirms the change.
    pub fn set_address(&mut self, new_address: u32) -> Result<bool> {
        let (outcome, _) = self.exchange(Instruction::SetAddress, &new_address.to_be_bytes())?;
        match outcome {
            Outcome::Ok => {
                self.address = new_address;
                debug!("Address updated to 0x{:08X}", new_address);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Write one system register.
    ///
    /// Valid values: baud rate 1..=12 (units of 9600), security level
    /// 1..=5, packet size code 0..=3. Anything else is rejected before a
    /// byte goes on the wire.
    pub fn set_system_parameter(&mut self, param: SysParam, value: u8) -> Result<bool> {
        let valid = match param {
            SysParam::BaudRate => (1..=12).contains(&value),
            SysParam::SecurityLevel => (1..=5).contains(&value),
            SysParam::PacketSize => value <= 3,
        };
        if !valid {
            return Err(Error::InvalidArgument(format!(
                "value {value} out of range for {param:?}"
            )));
        }

        let (outcome, _) =
            self.exchange(Instruction::SetSystemParameter, &[param as u8, value])?;
        Ok(matches!(outcome, Outcome::Ok))
    }

    /// Set the serial speed. Takes effect on the sensor side; the host
    /// must reopen its port at the new speed.
    pub fn set_baud_rate(&mut self, baud_rate: u32) -> Result<bool> {
        if baud_rate == 0 || baud_rate % BAUD_UNIT != 0 {
            return Err(Error::InvalidArgument(format!(
                "baud rate {baud_rate} is not a multiple of {BAUD_UNIT}"
            )));
        }
        self.set_system_parameter(SysParam::BaudRate, (baud_rate / BAUD_UNIT) as u8)
    }

    /// Set the matching strictness, 1 (loosest) to 5 (strictest).
    pub fn set_security_level(&mut self, level: u8) -> Result<bool> {
        self.set_system_parameter(SysParam::SecurityLevel, level)
    }

    /// Set the DATA frame payload size; one of 32, 64, 128 or 256 bytes.
    pub fn set_max_packet_size(&mut self, size: u16) -> Result<bool> {
        let code = packet_size_code(size)
            .ok_or_else(|| Error::InvalidArgument(format!("unsupported packet size {size}")))?;
        self.set_system_parameter(SysParam::PacketSize, code)
    }

    /// Read the 16-byte system parameter block.
    pub fn system_parameters(&mut self) -> Result<SystemParameters> {
        let (_, block) = self.exchange(Instruction::ReadSystemParameters, &[])?;
        Ok(SystemParameters::from_block(&block)?)
    }

    /// Number of template slots in the library.
    pub fn storage_capacity(&mut self) -> Result<u16> {
        Ok(self.system_parameters()?.capacity)
    }

    /// Current matching strictness.
    pub fn security_level(&mut self) -> Result<u16> {
        Ok(self.system_parameters()?.security_level)
    }

    /// Negotiated DATA frame payload size in bytes.
    pub fn max_packet_size(&mut self) -> Result<u16> {
        Ok(self.system_parameters()?.packet_size()?)
    }

    /// Serial speed the sensor is configured for.
    pub fn baud_rate(&mut self) -> Result<u32> {
        Ok(self.system_parameters()?.baud_rate())
    }

    /// Read one occupancy index page (0..=3).
    pub fn template_index(&mut self, page: u8) -> Result<TemplateIndex> {
        if page >= INDEX_PAGES {
            return Err(Error::InvalidArgument(format!(
                "index page {page} out of range 0..{INDEX_PAGES}"
            )));
        }

        let (_, payload) = self.exchange(Instruction::TemplateIndex, &[page])?;
        Ok(TemplateIndex::from_page_bytes(page, &payload))
    }

    /// Number of stored templates.
    pub fn template_count(&mut self) -> Result<u16> {
        let (_, payload) = self.exchange(Instruction::TemplateCount, &[])?;
        read_u16(&payload, "template count")
    }

    /// Capture a finger image into the sensor's image buffer.
    ///
    /// `false` means no finger was on the window; callers poll this in a
    /// capture loop.
    pub fn read_image(&mut self) -> Result<bool> {
        let (outcome, _) = self.exchange(Instruction::ReadImage, &[])?;
        Ok(matches!(outcome, Outcome::Ok))
    }

    /// Stream the image buffer to the host and hand the decoded 256x288
    /// grayscale image to `sink`.
    pub fn download_image(&mut self, sink: &mut dyn ImageSink) -> Result<()> {
        self.exchange(Instruction::DownloadImage, &[])?;
        let stream = self.receive_data()?;
        let image = FingerImage::from_stream(&stream)?;

        sink.write_image(&image)
            .map_err(|e| Error::NotWritable(e.to_string()))?;
        Ok(())
    }

    /// Extract characteristics from the captured image into `buffer`.
    pub fn convert_image(&mut self, buffer: CharBuffer) -> Result<bool> {
        let (outcome, _) = self.exchange(Instruction::ConvertImage, &[buffer as u8])?;
        Ok(matches!(outcome, Outcome::Ok))
    }

    /// Combine both character buffers into a template.
    ///
    /// `false` means the two captures do not belong to the same finger.
    pub fn create_template(&mut self) -> Result<bool> {
        let (outcome, _) = self.exchange(Instruction::CreateTemplate, &[])?;
        Ok(matches!(outcome, Outcome::Ok))
    }

    /// Store the template in `buffer` and return the slot it went to.
    ///
    /// With `position: None` the four index pages are scanned for the
    /// lowest free slot; [`Error::StorageFull`] if there is none.
    pub fn store_template(&mut self, position: Option<u16>, buffer: CharBuffer) -> Result<u16> {
        let slot = match position {
            Some(p) => {
                let capacity = self.storage_capacity()?;
                if p >= capacity {
                    return Err(Error::InvalidArgument(format!(
                        "position {p} exceeds the sensor capacity of {capacity}"
                    )));
                }
                p
            }
            None => self.first_free_slot()?,
        };

        let mut args = [0u8; 3];
        args[0] = buffer as u8;
        args[1..3].copy_from_slice(&slot.to_be_bytes());
        self.exchange(Instruction::StoreTemplate, &args)?;

        debug!("Template stored at slot {slot}");
        Ok(slot)
    }

    /// Search `count` slots from `start` for the characteristics in
    /// `buffer`. `None` (or zero) count searches the whole library.
    pub fn search_template(
        &mut self,
        buffer: CharBuffer,
        start: u16,
        count: Option<u16>,
    ) -> Result<Option<TemplateMatch>> {
        let count = match count {
            Some(n) if n > 0 => n,
            _ => self.storage_capacity()?,
        };

        let mut args = [0u8; 5];
        args[0] = buffer as u8;
        args[1..3].copy_from_slice(&start.to_be_bytes());
        args[3..5].copy_from_slice(&count.to_be_bytes());

        let (outcome, payload) = self.exchange(Instruction::SearchTemplate, &args)?;
        if matches!(outcome, Outcome::NoMatch) {
            return Ok(None);
        }

        match payload.as_ref() {
            [p_hi, p_lo, s_hi, s_lo, ..] => Ok(Some(TemplateMatch {
                position: u16::from_be_bytes([*p_hi, *p_lo]),
                score: u16::from_be_bytes([*s_hi, *s_lo]),
            })),
            _ => Err(Error::InvalidResponse(format!(
                "search reply of {} bytes",
                payload.len()
            ))),
        }
    }

    /// Load the template at `position` into `buffer`.
    pub fn load_template(&mut self, position: u16, buffer: CharBuffer) -> Result<bool> {
        let capacity = self.storage_capacity()?;
        if position >= capacity {
            return Err(Error::InvalidArgument(format!(
                "position {position} exceeds the sensor capacity of {capacity}"
            )));
        }

        let mut args = [0u8; 3];
        args[0] = buffer as u8;
        args[1..3].copy_from_slice(&position.to_be_bytes());

        let (outcome, _) = self.exchange(Instruction::LoadTemplate, &args)?;
        Ok(matches!(outcome, Outcome::Ok))
    }

    /// Delete `count` templates starting at `position`.
    ///
    /// `false` means the sensor refused the deletion.
    pub fn delete_template(&mut self, position: u16, count: u16) -> Result<bool> {
        let capacity = self.storage_capacity()?;
        if position >= capacity {
            return Err(Error::InvalidArgument(format!(
                "position {position} exceeds the sensor capacity of {capacity}"
            )));
        }
        if count > capacity - position {
            return Err(Error::InvalidArgument(format!(
                "count {count} runs past the end of the library"
            )));
        }

        let mut args = [0u8; 4];
        args[0..2].copy_from_slice(&position.to_be_bytes());
        args[2..4].copy_from_slice(&count.to_be_bytes());

        let (outcome, _) = self.exchange(Instruction::DeleteTemplate, &args)?;
        Ok(matches!(outcome, Outcome::Ok))
    }

    /// Delete every template.
    ///
    /// `false` means the sensor refused.
    pub fn clear_database(&mut self) -> Result<bool> {
        let (outcome, _) = self.exchange(Instruction::ClearDatabase, &[])?;
        Ok(matches!(outcome, Outcome::Ok))
    }

    /// Compare the two character buffers; 0 when they do not match.
    pub fn compare_characteristics(&mut self) -> Result<u16> {
        let (outcome, payload) = self.exchange(Instruction::CompareCharacteristics, &[])?;
        if matches!(outcome, Outcome::Mismatch) {
            return Ok(0);
        }
        read_u16(&payload, "comparison score")
    }

    /// Ask the sensor's hardware generator for a random number.
    pub fn generate_random_number(&mut self) -> Result<u32> {
        let (_, payload) = self.exchange(Instruction::GenerateRandomNumber, &[])?;
        match payload.as_ref() {
            [a, b, c, d, ..] => Ok(u32::from_be_bytes([*a, *b, *c, *d])),
            _ => Err(Error::InvalidResponse(format!(
                "random number reply of {} bytes",
                payload.len()
            ))),
        }
    }

    /// Push feature characteristics into a sensor buffer.
    ///
    /// The sensor gives no per-chunk acknowledgement, so the upload is
    /// verified by downloading the buffer back; `false` means the echo did
    /// not match.
    pub fn upload_characteristics(&mut self, buffer: CharBuffer, data: &[u8]) -> Result<bool> {
        if data.is_empty() {
            return Err(Error::InvalidArgument(
                "characteristics data must not be empty".into(),
            ));
        }

        let max = self.max_packet_size()? as usize;
        self.exchange(Instruction::UploadCharacteristics, &[buffer as u8])?;
        self.send_data(data, max)?;

        let echoed = self.download_characteristics(buffer)?;
        Ok(echoed == data)
    }

    /// Stream a character buffer to the host.
    pub fn download_characteristics(&mut self, buffer: CharBuffer) -> Result<Bytes> {
        self.exchange(Instruction::DownloadCharacteristics, &[buffer as u8])?;
        self.receive_data()
    }

    // Bulk transfer

    /// Concatenate DATA frame payloads until the END_DATA frame arrives.
    fn receive_data(&mut self) -> Result<Bytes> {
        let mut data = BytesMut::new();
        loop {
            let frame = self.read_frame()?;
            match frame.kind {
                FrameKind::Data => data.put_slice(&frame.payload),
                FrameKind::EndData => {
                    data.put_slice(&frame.payload);
                    debug!("Received {} bytes of bulk data", data.len());
                    return Ok(data.freeze());
                }
                other => {
                    return Err(r30x_core::Error::UnexpectedFrameType {
                        found: other as u8,
                        expected: "a data frame",
                    }
                    .into())
                }
            }
        }
    }

    /// Send `data` as DATA frames of at most `max` bytes, closing with one
    /// END_DATA frame. A payload that fits in a single frame is sent as
    /// END_DATA alone.
    fn send_data(&mut self, data: &[u8], max: usize) -> Result<()> {
        let mut chunks = data.chunks(max).peekable();
        while let Some(chunk) = chunks.next() {
            let kind = if chunks.peek().is_none() {
                FrameKind::EndData
            } else {
                FrameKind::Data
            };
            self.send_frame(&Frame::new(kind, Bytes::copy_from_slice(chunk)))?;
        }

        debug!("Sent {} bytes of bulk data", data.len());
        Ok(())
    }

    // Plumbing

    /// Scan the index pages for the lowest unoccupied slot.
    fn first_free_slot(&mut self) -> Result<u16> {
        for page in 0..INDEX_PAGES {
            let index = self.template_index(page)?;
            if let Some(slot) = index.first_free_global() {
                return Ok(slot);
            }
        }
        Err(Error::StorageFull)
    }

    /// Send `instruction` + `args` as one command, read the ACK, and decode
    /// its status. Returns the outcome and the ACK payload after the status
    /// byte.
    fn exchange(&mut self, instruction: Instruction, args: &[u8]) -> Result<(Outcome, Bytes)> {
        let mut payload = BytesMut::with_capacity(1 + args.len());
        payload.put_u8(instruction.into());
        payload.put_slice(args);

        self.send_frame(&Frame::new(FrameKind::Command, payload.freeze()))?;

        let reply = self.read_frame()?;
        if reply.kind != FrameKind::Ack {
            return Err(r30x_core::Error::UnexpectedFrameType {
                found: reply.kind as u8,
                expected: "an acknowledgement",
            }
            .into());
        }

        let Some(&code) = reply.payload.first() else {
            return Err(Error::InvalidResponse(
                "acknowledgement with empty payload".into(),
            ));
        };

        let outcome = status::decode(instruction, code)?;
        debug!("{instruction} -> {outcome:?}");
        Ok((outcome, reply.payload.slice(1..)))
    }

    fn send_frame(&mut self, frame: &Frame) -> Result<()> {
        trace!("TX {frame}");
        let data = frame.encode(self.address)?;
        self.transport.send(&data)?;
        Ok(())
    }

    fn read_frame(&mut self) -> Result<Frame> {
        let mut header_buf = [0u8; FRAME_HEADER_LEN];
        self.transport.read_exact(&mut header_buf)?;

        let header = FrameHeader::parse(&header_buf)?;
        header.expect_address(self.address)?;

        let mut body = vec![0u8; header.remaining()];
        self.transport.read_exact(&mut body)?;

        let frame = Frame::assemble(header, &body)?;
        trace!("RX {frame}");
        Ok(frame)
    }
}

impl Drop for Sensor {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close the transport: {e}");
        }
    }
}

fn read_u16(payload: &[u8], what: &str) -> Result<u16> {
    match payload {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(Error::InvalidResponse(format!(
            "{what} reply of {} bytes",
            payload.len()
        ))),
    }
}
