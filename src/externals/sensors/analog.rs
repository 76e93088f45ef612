use std::io;

use tracing::{debug, trace};

use crate::models::sample::Sample;

use super::services::{ReadingSource, SourceError};

/// Full scale of the 10-bit MCP3008.
pub const ADC_MAX: u16 = 1023;

/// The MCP3008 has eight single-ended inputs.
pub const ADC_CHANNELS: u8 = 8;

/// Build the 3-byte request for a single-ended conversion on `channel`:
/// start bit, then single-ended flag plus channel in the high nibble.
pub fn mcp3008_request(channel: u8) -> [u8; 3] {
    [0x01, (8 + channel) << 4, 0x00]
}

/// Extract the 10-bit conversion result: the low 2 bits of the second
/// response byte followed by all of the third.
pub fn decode_mcp3008_response(response: [u8; 3]) -> u16 {
    (((response[1] & 0x03) as u16) << 8) + response[2] as u16
}

/// Map a raw conversion result onto [0.0, 1.0].
pub fn normalize(raw: u16) -> f64 {
    raw as f64 / ADC_MAX as f64
}

/// A full-duplex SPI bus able to clock out three bytes while reading three.
pub trait SpiBus: Send {
    fn transfer(&mut self, tx: [u8; 3]) -> io::Result<[u8; 3]>;
}

/// Reads one channel of an MCP3008 and reports it normalized.
pub struct AnalogChannelSource<B: SpiBus> {
    bus: Option<B>,
    channel: u8,
}

impl<B: SpiBus> AnalogChannelSource<B> {
    pub fn new(bus: B, channel: u8) -> Result<Self, SourceError> {
        if channel >= ADC_CHANNELS {
            return Err(SourceError::InvalidChannel(channel));
        }
        Ok(Self {
            bus: Some(bus),
            channel,
        })
    }

    /// Raw 10-bit conversion result.
    pub fn read_raw(&mut self) -> Result<u16, SourceError> {
        let bus = self.bus.as_mut().ok_or(SourceError::Closed)?;
        let response = bus
            .transfer(mcp3008_request(self.channel))
            .map_err(SourceError::SpiTransfer)?;
        let raw = decode_mcp3008_response(response);
        trace!("Channel {} read raw value {}.", self.channel, raw);
        Ok(raw)
    }
}

impl<B: SpiBus> ReadingSource for AnalogChannelSource<B> {
    fn produce_one_reading(&mut self) -> Result<Sample, SourceError> {
        self.read_raw().map(|raw| Sample::Float(normalize(raw)))
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.bus.take().is_some() {
            debug!("Closed SPI bus.");
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "analog"
    }
}

#[cfg(feature = "spi")]
pub use spidev_bus::SpidevBus;

/// The analog source backed by whatever SPI support this build carries.
#[cfg(feature = "spi")]
pub type SystemAnalogSource = AnalogChannelSource<SpidevBus>;

#[cfg(not(feature = "spi"))]
pub type SystemAnalogSource = AnalogChannelSource<NoSpiBus>;

#[cfg(feature = "spi")]
mod spidev_bus {
    use std::io;

    use spidev::{SpiModeFlags, Spidev, SpidevOptions, SpidevTransfer};

    use super::{SourceError, SpiBus};

    /// Linux userspace SPI device (`/dev/spidev<bus>.<device>`).
    pub struct SpidevBus {
        device: Spidev,
    }

    impl SpidevBus {
        pub fn open(bus: u8, device: u8, speed_hz: u32) -> Result<Self, SourceError> {
            let path = format!("/dev/spidev{}.{}", bus, device);
            let open_error = |source: io::Error| SourceError::SpiOpen {
                path: path.clone(),
                source,
            };

            let mut spi = Spidev::open(&path).map_err(open_error)?;
            let options = SpidevOptions::new()
                .bits_per_word(8)
                .max_speed_hz(speed_hz)
                .mode(SpiModeFlags::SPI_MODE_0)
                .build();
            spi.configure(&options).map_err(open_error)?;

            Ok(Self { device: spi })
        }
    }

    impl SpiBus for SpidevBus {
        fn transfer(&mut self, tx: [u8; 3]) -> io::Result<[u8; 3]> {
            let mut rx = [0u8; 3];
            {
                let mut transfer = SpidevTransfer::read_write(&tx, &mut rx);
                self.device.transfer(&mut transfer)?;
            }
            Ok(rx)
        }
    }

    impl super::AnalogChannelSource<SpidevBus> {
        pub fn open_spidev(
            channel: u8,
            bus: u8,
            device: u8,
            speed_hz: u32,
        ) -> Result<Self, SourceError> {
            Self::new(SpidevBus::open(bus, device, speed_hz)?, channel)
        }
    }
}

/// Placeholder bus for builds without the `spi` feature. Never constructed.
#[cfg(not(feature = "spi"))]
pub enum NoSpiBus {}

#[cfg(not(feature = "spi"))]
impl SpiBus for NoSpiBus {
    fn transfer(&mut self, _tx: [u8; 3]) -> io::Result<[u8; 3]> {
        match *self {}
    }
}

#[cfg(not(feature = "spi"))]
impl AnalogChannelSource<NoSpiBus> {
    pub fn open_spidev(
        _channel: u8,
        _bus: u8,
        _device: u8,
        _speed_hz: u32,
    ) -> Result<Self, SourceError> {
        Err(SourceError::SpiUnsupported)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use super::*;

    /// Replays canned responses and records every request.
    struct ScriptedBus {
        responses: VecDeque<io::Result<[u8; 3]>>,
        requests: Arc<Mutex<Vec<[u8; 3]>>>,
    }

    impl SpiBus for ScriptedBus {
        fn transfer(&mut self, tx: [u8; 3]) -> io::Result<[u8; 3]> {
            self.requests.lock().unwrap().push(tx);
            self.responses
                .pop_front()
                .unwrap_or_else(|| Err(io::Error::from(io::ErrorKind::TimedOut)))
        }
    }

    fn scripted(responses: Vec<io::Result<[u8; 3]>>) -> (ScriptedBus, Arc<Mutex<Vec<[u8; 3]>>>) {
        let requests = Arc::new(Mutex::new(vec![]));
        let bus = ScriptedBus {
            responses: responses.into(),
            requests: requests.clone(),
        };
        (bus, requests)
    }

    #[test]
    fn test_request_framing() {
        assert_eq!(mcp3008_request(0), [0x01, 0x80, 0x00]);
        assert_eq!(mcp3008_request(3), [0x01, 0xB0, 0x00]);
        assert_eq!(mcp3008_request(7), [0x01, 0xF0, 0x00]);
    }

    #[test]
    fn test_decode_masks_second_byte() {
        assert_eq!(decode_mcp3008_response([0xFF, 0x00, 0x00]), 0);
        assert_eq!(decode_mcp3008_response([0x00, 0x01, 0x00]), 256);
        assert_eq!(decode_mcp3008_response([0x00, 0x02, 0x05]), 517);
        assert_eq!(decode_mcp3008_response([0x00, 0xFF, 0xFF]), 1023);
        // Only the low two bits of the second byte carry data.
        assert_eq!(decode_mcp3008_response([0x00, 0xFC, 0x10]), 16);
    }

    #[test]
    fn test_normalized_value_always_in_unit_interval() {
        for b1 in 0..=3u8 {
            for b2 in 0..=255u8 {
                let raw = decode_mcp3008_response([0, b1, b2]);
                assert_eq!(raw, ((b1 as u16 & 0x03) << 8) + b2 as u16);
                let value = normalize(raw);
                assert!((0.0..=1.0).contains(&value), "{} out of range", value);
            }
        }
        assert_eq!(normalize(0), 0.0);
        assert_eq!(normalize(ADC_MAX), 1.0);
    }

    #[test]
    fn test_reading_sends_channel_request() {
        let (bus, requests) = scripted(vec![Ok([0x00, 0x03, 0xFF]), Ok([0x00, 0x00, 0x00])]);
        let mut source = AnalogChannelSource::new(bus, 2).unwrap();

        assert_eq!(source.produce_one_reading().unwrap(), Sample::Float(1.0));
        assert_eq!(source.produce_one_reading().unwrap(), Sample::Float(0.0));
        assert_eq!(*requests.lock().unwrap(), vec![[0x01, 0xA0, 0x00]; 2]);
    }

    #[test]
    fn test_rejects_invalid_channel() {
        let (bus, _) = scripted(vec![]);
        assert!(matches!(
            AnalogChannelSource::new(bus, 8),
            Err(SourceError::InvalidChannel(8))
        ));
    }

    #[test]
    fn test_transfer_failure_is_reported() {
        let (bus, _) = scripted(vec![Err(io::Error::from(io::ErrorKind::BrokenPipe))]);
        let mut source = AnalogChannelSource::new(bus, 0).unwrap();
        assert!(matches!(
            source.produce_one_reading(),
            Err(SourceError::SpiTransfer(_))
        ));
    }

    #[test]
    fn test_closed_source_refuses_reads() {
        let (bus, requests) = scripted(vec![Ok([0, 0, 1])]);
        let mut source = AnalogChannelSource::new(bus, 0).unwrap();

        source.close().unwrap();
        source.close().unwrap();
        assert!(matches!(
            source.produce_one_reading(),
            Err(SourceError::Closed)
        ));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[cfg(not(feature = "spi"))]
    #[test]
    fn test_open_without_spi_support() {
        assert!(matches!(
            SystemAnalogSource::open_spidev(0, 0, 0, 1_000_000),
            Err(SourceError::SpiUnsupported)
        ));
    }
}
