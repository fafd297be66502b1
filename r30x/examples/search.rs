//! Finger search example

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

    println!("{} templates stored", sensor.template_count()?);

    println!("Place a finger on the sensor...");
    while !sensor.read_image()? {}
    sensor.convert_image(CharBuffer::One)?;

    match sensor.search_template(CharBuffer::One, 0, None)? {
        Some(found) => println!("Finger recognised: {found}"),
        None => println!("Finger not enrolled"),
    }

    sensor.close()?;
    Ok(())
}
