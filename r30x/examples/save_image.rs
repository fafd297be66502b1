//! Capture a finger image and save it as a binary PGM file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use r30x::{FingerImage, ImageSink, Sensor, SensorConfig};

struct PgmSink {
    path: PathBuf,
}

impl ImageSink for PgmSink {
    fn write_image(&mut self, image: &FingerImage) -> std::io::Result<()> {
        let file = File::create(&self.path)?;
        let mut out = BufWriter::new(file);
        write!(out, "P5\n{} {}\n255\n", image.width(), image.height())?;
        out.write_all(image.pixels())?;
        out.flush()
    }
}

fn main() -> r30x::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let port = std::env::var("SENSOR_PORT").unwrap_or_else(|_| "/dev/ttyUSB0".to_string());
    let path = std::env::args().nth(1).unwrap_or_else(|| "finger.pgm".to_string());

    let mut sensor = Sensor::open(SensorConfig::new(port))?;

    if !sensor.verify_password()? {
        eprintln!("Sensor password rejected");
        return Ok(());
    }

    println!("Place a finger on the sensor...");
    while !sensor.read_image()? {}

    let mut sink = PgmSink { path: path.into() };
    sensor.download_image(&mut sink)?;
    println!("Image saved");

    sensor.close()?;
    Ok(())
}
