use std::io;

use thiserror::Error;
use tracing::{info, instrument};

use crate::{
    config::{Config, Variant},
    models::sample::Sample,
};

use super::{analog::SystemAnalogSource, digital::DigitalPinSource, random::RandomSource};

/// This service separates reading the sensor hardware from the sampling
/// loop, which makes the loop testable without any hardware attached.
pub trait ReadingSource: Send {
    /// Take exactly one reading. Blocks for the duration of the bus or
    /// daemon round trip; there is no timeout.
    fn produce_one_reading(&mut self) -> Result<Sample, SourceError>;

    /// Release the underlying handle. Safe to call more than once.
    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

impl<T: ReadingSource + ?Sized> ReadingSource for Box<T> {
    fn produce_one_reading(&mut self) -> Result<Sample, SourceError> {
        (**self).produce_one_reading()
    }

    fn close(&mut self) -> Result<(), SourceError> {
        (**self).close()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

#[derive(Error, Debug)]
pub enum SourceError {
    /// The source was already closed.
    #[error("Reading source is closed.")]
    Closed,

    #[error("Invalid random range {min}..={max}.")]
    InvalidRange { min: i64, max: i64 },

    #[error("Invalid ADC channel {0}. The MCP3008 has channels 0 through 7.")]
    InvalidChannel(u8),

    /// Opening `/dev/spidevB.D` or configuring it failed.
    #[error("Failed to open SPI device '{path}'. Error: {source}")]
    SpiOpen { path: String, source: io::Error },

    #[error("SPI transfer failed. Error: {0}")]
    SpiTransfer(io::Error),

    #[error("SPI support is not compiled in. Rebuild with the `spi` feature.")]
    SpiUnsupported,

    /// The pigpio daemon could not be reached at startup.
    #[error("Failed to reach pigpio daemon at '{addr}'. Error: {source}")]
    DaemonUnreachable { addr: String, source: io::Error },

    /// Communication with the pigpio daemon was lost mid-loop.
    #[error("Lost communication with pigpio daemon. Error: {0}")]
    DaemonIo(io::Error),

    #[error("pigpio daemon rejected command {command} with status {status}.")]
    DaemonStatus { command: u32, status: i32 },
}

/// Open the reading source selected by the configured variant. Hardware
/// handles are acquired here, once, so failures surface before sampling starts.
#[instrument(skip_all, fields(variant = ?config.variant))]
pub fn open_source(config: &Config) -> Result<Box<dyn ReadingSource>, SourceError> {
    let source: Box<dyn ReadingSource> = match config.variant {
        Variant::Random => Box::new(RandomSource::new(config.random_min, config.random_max)?),
        Variant::Analog => Box::new(SystemAnalogSource::open_spidev(
            config.spi_channel,
            config.spi_bus,
            config.spi_device,
            config.spi_speed_hz,
        )?),
        Variant::Digital => Box::new(DigitalPinSource::connect(
            &config.pigpio_addr,
            config.gpio_pin,
            config.gpio_scale,
        )?),
    };
    info!("Opened {} reading source.", source.name());
    Ok(source)
}
