use std::{net::SocketAddr, time::Duration};

use clap::{Parser, ValueEnum};
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::externals::sensors::analog::ADC_CHANNELS;

/// Upper bound on per-subscriber queue slots. Every slot is allocated up front.
pub const MAX_CHANNEL_CAPACITY: usize = 65_536;

/// Which reading source to sample. Each variant carries its own default rate.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// Uniform random integers, no hardware (50 Hz).
    Random,
    /// MCP3008 channel over SPI, normalized to [0, 1] (12.5 Hz).
    Analog,
    /// GPIO level through the pigpio daemon (10 Hz).
    Digital,
}

impl Variant {
    pub fn default_interval(self) -> Duration {
        match self {
            Variant::Random => Duration::from_millis(20),
            Variant::Analog => Duration::from_millis(80),
            Variant::Digital => Duration::from_millis(100),
        }
    }
}

/// Stream live EMG readings to browsers over a websocket.
#[derive(Parser, Debug, Clone)]
#[command(version)]
pub struct Config {
    /// Reading source.
    #[arg(long, env = "EMG_VARIANT", value_enum, default_value_t = Variant::Random)]
    pub variant: Variant,

    /// Milliseconds to sleep between samples. Defaults per variant.
    #[arg(long, env = "EMG_INTERVAL_MS")]
    pub interval_ms: Option<u64>,

    #[arg(long, env = "EMG_RANDOM_MIN", default_value_t = 1, allow_negative_numbers = true)]
    pub random_min: i64,

    #[arg(long, env = "EMG_RANDOM_MAX", default_value_t = 10, allow_negative_numbers = true)]
    pub random_max: i64,

    /// MCP3008 input channel (0-7).
    #[arg(long, env = "EMG_SPI_CHANNEL", default_value_t = 0)]
    pub spi_channel: u8,

    #[arg(long, env = "EMG_SPI_BUS", default_value_t = 0)]
    pub spi_bus: u8,

    /// Chip select line (0 is CE0).
    #[arg(long, env = "EMG_SPI_DEVICE", default_value_t = 0)]
    pub spi_device: u8,

    #[arg(long, env = "EMG_SPI_SPEED_HZ", default_value_t = 1_000_000)]
    pub spi_speed_hz: u32,

    /// Broadcom GPIO number.
    #[arg(long, env = "EMG_GPIO_PIN", default_value_t = 17)]
    pub gpio_pin: u8,

    #[arg(long, env = "EMG_PIGPIO_ADDR", default_value = "127.0.0.1:8888")]
    pub pigpio_addr: String,

    /// Multiplier applied to each digital level. 1024 matches older deployments.
    #[arg(long, env = "EMG_GPIO_SCALE", default_value_t = 1)]
    pub gpio_scale: i64,

    #[arg(long, env = "EMG_BIND", default_value = "127.0.0.1:5000")]
    pub bind: SocketAddr,

    /// Samples a subscriber may fall behind before it starts skipping.
    #[arg(long, env = "EMG_CHANNEL_CAPACITY", default_value_t = 32)]
    pub channel_capacity: usize,

    #[arg(long, env = "EMG_LOG_LEVEL", default_value = "info")]
    pub log_level: LevelFilter,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Sampling interval must be greater than zero.")]
    ZeroInterval,

    #[error("Random range is empty: min {min} is greater than max {max}.")]
    InvalidRandomRange { min: i64, max: i64 },

    #[error("SPI channel {0} is out of range. The MCP3008 has channels 0 through 7.")]
    InvalidSpiChannel(u8),

    #[error("Channel capacity must be greater than zero.")]
    ZeroCapacity,

    #[error("Channel capacity {0} is above the limit of 65536.")]
    CapacityTooLarge(usize),
}

impl Config {
    pub fn interval(&self) -> Duration {
        self.interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.variant.default_interval())
    }

    /// Reject settings that would only fail later, at startup or mid-loop.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval().is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.channel_capacity > MAX_CHANNEL_CAPACITY {
            return Err(ConfigError::CapacityTooLarge(self.channel_capacity));
        }
        match self.variant {
            Variant::Random if self.random_min > self.random_max => {
                Err(ConfigError::InvalidRandomRange {
                    min: self.random_min,
                    max: self.random_max,
                })
            }
            Variant::Analog if self.spi_channel >= ADC_CHANNELS => {
                Err(ConfigError::InvalidSpiChannel(self.spi_channel))
            }
            _ => Ok(()),
        }
    }
}
