//! Finger enrollment example

use std::time::Duration;

use r30x::{CharBuffer, Sensor, SensorConfig};

fn main() -> r30x::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let port = std::env::var("SENSOR_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());

    let mut sensor = Sensor::open(SensorConfig::new(port))?;

    if !sensor.verify_password()? {
        eprintln!("Sensor password rejected");
        return Ok(());
    }

    println!("Place a finger on the sensor...");
    while !sensor.read_image()? {}
    sensor.convert_image(CharBuffer::One)?;

    println!("Lift the finger...");
    std::thread::sleep(Duration::from_secs(2));

    println!("Place the same finger again...");
    while !sensor.read_image()? {}
    sensor.convert_image(CharBuffer::Two)?;

    if !sensor.create_template()? {
        eprintln!("The two captures do not match, try again");
        return Ok(());
    }

    let slot = sensor.store_template(None, CharBuffer::One)?;
    println!("Enrolled at slot {slot}");

    let mut used = 0;
    for page in 0..4 {
        used += sensor.template_index(page)?.used_count();
    }
    println!("{used} of {} slots used", sensor.storage_capacity()?);

    sensor.close()?;
    Ok(())
}
