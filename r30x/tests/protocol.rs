//! Protocol-level tests against a scripted transport.
//!
//! The mock hands reply bytes out one at a time, so every test also
//! exercises frame assembly from arbitrarily fragmented reads.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;

use r30x::{
    CharBuffer, Error, FingerImage, Frame, FrameKind, ImageSink, Sensor, SensorConfig,
    TemplateMatch, Transport,
};

const ADDRESS: u32 = 0xFFFF_FFFF;

/// Shared script state, so tests keep a handle after the sensor takes the
/// transport.
#[derive(Default)]
struct Script {
    /// Raw bytes of every frame the driver wrote, in order.
    writes: Vec<Vec<u8>>,
    /// Queued reply bytes.
    rx: VecDeque<u8>,
}

struct MockTransport {
    script: Arc<Mutex<Script>>,
    connected: bool,
}

impl MockTransport {
    fn new() -> (Self, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script::default()));
        (
            Self {
                script: Arc::clone(&script),
                connected: true,
            },
            script,
        )
    }
}

impl Transport for MockTransport {
    fn connect(&mut self) -> r30x_transport::Result<()> {
        self.connected = true;
        Ok(())
    }

    fn close(&mut self) -> r30x_transport::Result<()> {
        self.connected = false;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn send(&mut self, data: &[u8]) -> r30x_transport::Result<()> {
        self.script.lock().unwrap().writes.push(data.to_vec());
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> r30x_transport::Result<()> {
        let mut script = self.script.lock().unwrap();
        for slot in buf.iter_mut() {
            *slot = script
                .rx
                .pop_front()
                .ok_or(r30x_transport::Error::ReadTimeout)?;
        }
        Ok(())
    }

    fn set_timeout(&mut self, _timeout: Duration) -> r30x_transport::Result<()> {
        Ok(())
    }

    fn descriptor(&self) -> String {
        "mock".to_string()
    }
}

fn sensor_with_script() -> (Sensor, Arc<Mutex<Script>>) {
    let (transport, script) = MockTransport::new();
    let sensor = Sensor::with_transport(
        Box::new(transport),
        &SensorConfig::new("mock").with_timeout(Duration::from_millis(100)),
    )
    .unwrap();
    (sensor, script)
}

fn queue_frame(script: &Arc<Mutex<Script>>, kind: FrameKind, payload: &[u8], address: u32) {
    let encoded = Frame::new(kind, payload.to_vec()).encode(address).unwrap();
    script.lock().unwrap().rx.extend(encoded);
}

fn queue_ack(script: &Arc<Mutex<Script>>, payload: &[u8]) {
    queue_frame(script, FrameKind::Ack, payload, ADDRESS);
}

/// Decode a recorded write for structural assertions.
fn decode_write(write: &[u8]) -> Frame {
    Frame::decode(write, ADDRESS).unwrap()
}

/// ReadSysPara reply block with the given capacity and packet size code.
fn params_block(capacity: u16, packet_size_code: u16) -> Vec<u8> {
    let mut block = vec![0x00];
    block.extend_from_slice(&[0x00, 0x00]); // status register
    block.extend_from_slice(&[0x00, 0x09]); // system identifier
    block.extend_from_slice(&capacity.to_be_bytes());
    block.extend_from_slice(&[0x00, 0x03]); // security level
    block.extend_from_slice(&ADDRESS.to_be_bytes());
    block.extend_from_slice(&packet_size_code.to_be_bytes());
    block.extend_from_slice(&[0x00, 0x06]); // 57600 baud
    block
}

#[test]
fn verify_password_success_is_byte_exact() {
    let (mut sensor, script) = sensor_with_script();
    script.lock().unwrap().rx.extend([
        0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0A,
    ]);

    assert!(sensor.verify_password().unwrap());

    let script = script.lock().unwrap();
    assert_eq!(script.writes.len(), 1);
    assert_eq!(
        script.writes[0],
        vec![
            0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x07, 0x13, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x1B,
        ]
    );
}

#[test]
fn verify_password_wrong_is_a_value_not_an_error() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x13]);

    assert!(!sensor.verify_password().unwrap());
}

#[test]
fn template_count_parses_the_count() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x00, 0x00, 0x2A]);

    assert_eq!(sensor.template_count().unwrap(), 42);

    let script = script.lock().unwrap();
    let request = decode_write(&script.writes[0]);
    assert_eq!(request.kind, FrameKind::Command);
    assert_eq!(&request.payload[..], &[0x1D]);
}

#[test]
fn search_without_match_returns_none() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x09]);

    let found = sensor
        .search_template(CharBuffer::One, 0, Some(200))
        .unwrap();
    assert_eq!(found, None);

    let script = script.lock().unwrap();
    let request = decode_write(&script.writes[0]);
    assert_eq!(&request.payload[..], &[0x04, 0x01, 0x00, 0x00, 0x00, 0xC8]);
}

#[test]
fn search_with_match_returns_position_and_score() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x00, 0x00, 0x05, 0x00, 0x63]);

    let found = sensor
        .search_template(CharBuffer::Two, 0, Some(200))
        .unwrap();
    assert_eq!(
        found,
        Some(TemplateMatch {
            position: 5,
            score: 99,
        })
    );
}

#[test]
fn search_with_no_count_uses_the_full_capacity() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &params_block(200, 2));
    queue_ack(&script, &[0x09]);

    sensor.search_template(CharBuffer::One, 0, None).unwrap();

    let script = script.lock().unwrap();
    let request = decode_write(&script.writes[1]);
    assert_eq!(&request.payload[..], &[0x04, 0x01, 0x00, 0x00, 0x00, 0xC8]);
}

#[test]
fn corrupt_checksum_is_a_framing_error() {
    let (mut sensor, script) = sensor_with_script();
    // The S1 reply with its final byte flipped
    script.lock().unwrap().rx.extend([
        0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00, 0x00, 0x0B,
    ]);

    let err = sensor.verify_password().unwrap_err();
    assert!(matches!(
        err,
        Error::Core(r30x_core::Error::BadChecksum { .. })
    ));
}

#[test]
fn silent_sensor_is_a_read_timeout() {
    let (mut sensor, _script) = sensor_with_script();

    let err = sensor.verify_password().unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(r30x_transport::Error::ReadTimeout)
    ));
}

#[test]
fn short_reply_is_a_read_timeout() {
    let (mut sensor, script) = sensor_with_script();
    // Header promises 3 more bytes, only 1 arrives
    script.lock().unwrap().rx.extend([
        0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x07, 0x00, 0x03, 0x00,
    ]);

    let err = sensor.verify_password().unwrap_err();
    assert!(matches!(
        err,
        Error::Transport(r30x_transport::Error::ReadTimeout)
    ));
}

#[test]
fn data_frame_in_place_of_ack_is_rejected() {
    let (mut sensor, script) = sensor_with_script();
    queue_frame(&script, FrameKind::Data, &[0x00], ADDRESS);

    let err = sensor.verify_password().unwrap_err();
    assert!(matches!(
        err,
        Error::Core(r30x_core::Error::UnexpectedFrameType { found: 0x02, .. })
    ));
}

#[test]
fn reply_for_another_address_is_rejected() {
    let (mut sensor, script) = sensor_with_script();
    queue_frame(&script, FrameKind::Ack, &[0x00], 0x1234_5678);

    let err = sensor.verify_password().unwrap_err();
    assert!(matches!(err, Error::Core(r30x_core::Error::BadHeader(_))));
}

#[test]
fn undocumented_status_carries_the_raw_byte() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x99]);

    let err = sensor.verify_password().unwrap_err();
    match err {
        Error::Core(r30x_core::Error::UnknownStatus { code, .. }) => assert_eq!(code, 0x99),
        other => panic!("expected UnknownStatus, got {other:?}"),
    }
}

#[test]
fn set_password_mirrors_only_on_ok() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x00]);
    queue_ack(&script, &[0x00]);

    assert!(sensor.set_password(0xDEAD_BEEF).unwrap());
    assert!(sensor.verify_password().unwrap());

    let script = script.lock().unwrap();
    // The follow-up VfyPwd must carry the new password
    assert_eq!(
        script.writes[1],
        vec![
            0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x07, 0x13, 0xDE, 0xAD, 0xBE, 0xEF,
            0x03, 0x53,
        ]
    );
}

#[test]
fn failed_set_password_keeps_the_old_mirror() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x01]); // communication error
    queue_ack(&script, &[0x00]);

    assert!(sensor.set_password(0xDEAD_BEEF).is_err());
    assert!(sensor.verify_password().unwrap());

    let script = script.lock().unwrap();
    // The follow-up VfyPwd still carries the default password
    assert_eq!(
        script.writes[1],
        vec![
            0xEF, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x00, 0x07, 0x13, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x1B,
        ]
    );
}

#[test]
fn set_address_rebuilds_frames_with_the_new_address() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x00]);
    // The follow-up reply must come from the new address
    queue_frame(&script, FrameKind::Ack, &[0x00, 0x00, 0x2A], 0x1234_5678);

    assert!(sensor.set_address(0x1234_5678).unwrap());
    assert_eq!(sensor.address(), 0x1234_5678);
    assert_eq!(sensor.template_count().unwrap(), 42);

    let script = script.lock().unwrap();
    assert_eq!(&script.writes[1][2..6], &[0x12, 0x34, 0x56, 0x78]);
}

#[test]
fn store_template_scans_pages_for_the_first_free_slot() {
    let (mut sensor, script) = sensor_with_script();

    // Pages 0 and 1 full; page 2 has slot 1 free
    let full = [0xFFu8; 32];
    let mut page2 = [0xFFu8; 32];
    page2[0] = 0xFD;

    let mut ack = vec![0x00];
    ack.extend_from_slice(&full);
    queue_ack(&script, &ack);
    queue_ack(&script, &ack);

    let mut ack2 = vec![0x00];
    ack2.extend_from_slice(&page2);
    queue_ack(&script, &ack2);

    queue_ack(&script, &[0x00]); // Store

    let slot = sensor.store_template(None, CharBuffer::One).unwrap();
    assert_eq!(slot, 2 * 256 + 1);

    let script = script.lock().unwrap();
    assert_eq!(script.writes.len(), 4);
    let store = decode_write(&script.writes[3]);
    assert_eq!(&store.payload[..], &[0x06, 0x01, 0x02, 0x01]);
}

#[test]
fn store_template_with_full_index_fails() {
    let (mut sensor, script) = sensor_with_script();

    let mut ack = vec![0x00];
    ack.extend_from_slice(&[0xFFu8; 32]);
    for _ in 0..4 {
        queue_ack(&script, &ack);
    }

    let err = sensor.store_template(None, CharBuffer::One).unwrap_err();
    assert!(matches!(err, Error::StorageFull));
}

#[test]
fn store_template_rejects_position_beyond_capacity() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &params_block(200, 2));

    let err = sensor
        .store_template(Some(200), CharBuffer::One)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    // Only the capacity query went out
    assert_eq!(script.lock().unwrap().writes.len(), 1);
}

#[test]
fn upload_download_round_trip() {
    let (mut sensor, script) = sensor_with_script();
    let data: Vec<u8> = (0..300u16).map(|i| (i % 256) as u8).collect();

    queue_ack(&script, &params_block(200, 2)); // max packet size 128
    queue_ack(&script, &[0x00]); // upload initiation
    queue_ack(&script, &[0x00]); // download initiation
    queue_frame(&script, FrameKind::Data, &data[..128], ADDRESS);
    queue_frame(&script, FrameKind::Data, &data[128..256], ADDRESS);
    queue_frame(&script, FrameKind::EndData, &data[256..], ADDRESS);

    assert!(sensor.upload_characteristics(CharBuffer::One, &data).unwrap());

    let script = script.lock().unwrap();
    // ReadSysPara, UpChar initiation, 3 data frames, DownChar initiation
    assert_eq!(script.writes.len(), 6);

    let chunk1 = decode_write(&script.writes[2]);
    let chunk2 = decode_write(&script.writes[3]);
    let chunk3 = decode_write(&script.writes[4]);

    assert_eq!(chunk1.kind, FrameKind::Data);
    assert_eq!(&chunk1.payload[..], &data[..128]);
    assert_eq!(chunk2.kind, FrameKind::Data);
    assert_eq!(&chunk2.payload[..], &data[128..256]);
    assert_eq!(chunk3.kind, FrameKind::EndData);
    assert_eq!(&chunk3.payload[..], &data[256..]);
}

#[test]
fn upload_that_fits_one_frame_sends_end_data_only() {
    let (mut sensor, script) = sensor_with_script();
    let data = [0xA5u8; 40];

    queue_ack(&script, &params_block(200, 1)); // max packet size 64
    queue_ack(&script, &[0x00]);
    queue_ack(&script, &[0x00]);
    queue_frame(&script, FrameKind::EndData, &data, ADDRESS);

    assert!(sensor.upload_characteristics(CharBuffer::Two, &data).unwrap());

    let script = script.lock().unwrap();
    assert_eq!(script.writes.len(), 4);
    let chunk = decode_write(&script.writes[2]);
    assert_eq!(chunk.kind, FrameKind::EndData);
    assert_eq!(&chunk.payload[..], &data[..]);
}

#[test]
fn upload_mismatching_echo_returns_false() {
    let (mut sensor, script) = sensor_with_script();
    let data = [0x11u8; 16];

    queue_ack(&script, &params_block(200, 0)); // max packet size 32
    queue_ack(&script, &[0x00]);
    queue_ack(&script, &[0x00]);
    queue_frame(&script, FrameKind::EndData, &[0x22u8; 16], ADDRESS);

    assert!(!sensor.upload_characteristics(CharBuffer::One, &data).unwrap());
}

#[test]
fn upload_rejects_empty_data() {
    let (mut sensor, script) = sensor_with_script();

    let err = sensor
        .upload_characteristics(CharBuffer::One, &[])
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(script.lock().unwrap().writes.is_empty());
}

#[test]
fn download_characteristics_concatenates_data_frames() {
    let (mut sensor, script) = sensor_with_script();

    queue_ack(&script, &[0x00]);
    queue_frame(&script, FrameKind::Data, &[1, 2, 3], ADDRESS);
    queue_frame(&script, FrameKind::Data, &[4, 5], ADDRESS);
    queue_frame(&script, FrameKind::EndData, &[6], ADDRESS);

    let data = sensor.download_characteristics(CharBuffer::One).unwrap();
    assert_eq!(&data[..], &[1, 2, 3, 4, 5, 6]);
}

#[test]
fn download_aborts_on_non_data_frame() {
    let (mut sensor, script) = sensor_with_script();

    queue_ack(&script, &[0x00]);
    queue_frame(&script, FrameKind::Data, &[1, 2, 3], ADDRESS);
    queue_ack(&script, &[0x00]); // ACK in the middle of a bulk transfer

    let err = sensor
        .download_characteristics(CharBuffer::One)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Core(r30x_core::Error::UnexpectedFrameType { found: 0x07, .. })
    ));
}

#[test]
fn delete_and_clear_refusals_are_values() {
    let (mut sensor, script) = sensor_with_script();

    queue_ack(&script, &params_block(200, 2));
    queue_ack(&script, &[0x10]); // delete refused
    assert!(!sensor.delete_template(3, 1).unwrap());

    queue_ack(&script, &[0x11]); // clear refused
    assert!(!sensor.clear_database().unwrap());
}

#[test]
fn delete_rejects_out_of_range_arguments() {
    let (mut sensor, script) = sensor_with_script();

    queue_ack(&script, &params_block(200, 2));
    assert!(matches!(
        sensor.delete_template(250, 1).unwrap_err(),
        Error::InvalidArgument(_)
    ));

    queue_ack(&script, &params_block(200, 2));
    assert!(matches!(
        sensor.delete_template(100, 150).unwrap_err(),
        Error::InvalidArgument(_)
    ));
}

#[test]
fn compare_mismatch_is_a_zero_score() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x08]);

    assert_eq!(sensor.compare_characteristics().unwrap(), 0);
}

#[test]
fn compare_success_returns_the_score() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x00, 0x01, 0x2C]);

    assert_eq!(sensor.compare_characteristics().unwrap(), 300);
}

#[test]
fn read_image_no_finger_is_false() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x02]);

    assert!(!sensor.read_image().unwrap());
}

#[test]
fn convert_image_failure_is_a_protocol_error() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x06]); // image too messy

    let err = sensor.convert_image(CharBuffer::One).unwrap_err();
    assert!(matches!(
        err,
        Error::Core(r30x_core::Error::Protocol { .. })
    ));
}

#[test]
fn create_template_mismatch_is_false() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x0A]);

    assert!(!sensor.create_template().unwrap());
}

#[test]
fn generate_random_number_parses_big_endian() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x00, 0xDE, 0xAD, 0xBE, 0xEF]);

    assert_eq!(sensor.generate_random_number().unwrap(), 0xDEAD_BEEF);
}

#[test]
fn template_index_rejects_bad_page() {
    let (mut sensor, script) = sensor_with_script();

    let err = sensor.template_index(4).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert!(script.lock().unwrap().writes.is_empty());
}

#[test]
fn system_parameter_views_decode_the_block() {
    let (mut sensor, script) = sensor_with_script();

    queue_ack(&script, &params_block(200, 2));
    assert_eq!(sensor.storage_capacity().unwrap(), 200);

    queue_ack(&script, &params_block(200, 2));
    assert_eq!(sensor.max_packet_size().unwrap(), 128);

    queue_ack(&script, &params_block(200, 2));
    assert_eq!(sensor.baud_rate().unwrap(), 57_600);

    queue_ack(&script, &params_block(200, 2));
    assert_eq!(sensor.security_level().unwrap(), 3);
}

#[test]
fn out_of_range_packet_size_code_is_a_hard_failure() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &params_block(200, 7));

    assert!(matches!(
        sensor.max_packet_size().unwrap_err(),
        Error::Types(r30x_types::Error::Parse(_))
    ));
}

#[test]
fn set_system_parameter_validates_before_sending() {
    let (mut sensor, script) = sensor_with_script();

    assert!(matches!(
        sensor.set_baud_rate(9601).unwrap_err(),
        Error::InvalidArgument(_)
    ));
    assert!(matches!(
        sensor.set_baud_rate(13 * 9600).unwrap_err(),
        Error::InvalidArgument(_)
    ));
    assert!(matches!(
        sensor.set_security_level(6).unwrap_err(),
        Error::InvalidArgument(_)
    ));
    assert!(matches!(
        sensor.set_max_packet_size(48).unwrap_err(),
        Error::InvalidArgument(_)
    ));
    assert!(script.lock().unwrap().writes.is_empty());
}

#[test]
fn set_baud_rate_sends_the_unit_code() {
    let (mut sensor, script) = sensor_with_script();
    queue_ack(&script, &[0x00]);

    assert!(sensor.set_baud_rate(115_200).unwrap());

    let script = script.lock().unwrap();
    let request = decode_write(&script.writes[0]);
    assert_eq!(&request.payload[..], &[0x0E, 0x04, 0x0C]);
}

struct CollectingSink {
    image: Option<FingerImage>,
}

impl ImageSink for CollectingSink {
    fn write_image(&mut self, image: &FingerImage) -> std::io::Result<()> {
        self.image = Some(image.clone());
        Ok(())
    }
}

struct BrokenSink;

impl ImageSink for BrokenSink {
    fn write_image(&mut self, _image: &FingerImage) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only destination",
        ))
    }
}

fn queue_image_stream(script: &Arc<Mutex<Script>>, stream: &[u8]) {
    let mut chunks = stream.chunks(128).peekable();
    while let Some(chunk) = chunks.next() {
        let kind = if chunks.peek().is_none() {
            FrameKind::EndData
        } else {
            FrameKind::Data
        };
        queue_frame(script, kind, chunk, ADDRESS);
    }
}

#[test]
fn download_image_decodes_nibbles_row_major() {
    let (mut sensor, script) = sensor_with_script();

    let mut stream = vec![0x00u8; 256 * 288 / 2];
    stream[0] = 0xF0; // first two pixels: white, black
    queue_ack(&script, &[0x00]);
    queue_image_stream(&script, &stream);

    let mut sink = CollectingSink { image: None };
    sensor.download_image(&mut sink).unwrap();

    let image = sink.image.unwrap();
    assert_eq!(image.width(), 256);
    assert_eq!(image.height(), 288);
    assert_eq!(image.pixels()[0], 0xFF);
    assert_eq!(image.pixels()[1], 0x00);
}

#[test]
fn download_image_surfaces_sink_failures_as_not_writable() {
    let (mut sensor, script) = sensor_with_script();

    let stream = vec![0x00u8; 256 * 288 / 2];
    queue_ack(&script, &[0x00]);
    queue_image_stream(&script, &stream);

    let err = sensor.download_image(&mut BrokenSink).unwrap_err();
    assert!(matches!(err, Error::NotWritable(_)));
}
