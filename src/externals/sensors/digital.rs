use std::{
    io::{self, Read, Write},
    net::{Shutdown, TcpStream},
};

use tracing::{debug, instrument, trace, warn};

use crate::models::sample::Sample;

use super::services::{ReadingSource, SourceError};

/// Set the mode of a GPIO.
pub const PI_CMD_MODES: u32 = 0;
/// Read the level of a GPIO.
pub const PI_CMD_READ: u32 = 3;
/// Mode value for an input pin.
pub const PI_INPUT: u32 = 0;

/// Every pigpio socket command and reply is four little-endian 32-bit words.
const FRAME_LEN: usize = 16;

/// Encode a command without extension data.
pub fn encode_command(command: u32, p1: u32, p2: u32) -> [u8; FRAME_LEN] {
    let mut frame = [0u8; FRAME_LEN];
    frame[0..4].copy_from_slice(&command.to_le_bytes());
    frame[4..8].copy_from_slice(&p1.to_le_bytes());
    frame[8..12].copy_from_slice(&p2.to_le_bytes());
    // The fourth word is the extension length, always zero here.
    frame
}

/// The daemon echoes the first three words and puts a signed result in the
/// last one. Negative results are pigpio error codes.
pub fn decode_reply(reply: [u8; FRAME_LEN]) -> i32 {
    i32::from_le_bytes([reply[12], reply[13], reply[14], reply[15]])
}

/// Minimal client for the pigpio daemon's socket interface.
pub struct PigpioClient {
    stream: Option<TcpStream>,
}

impl PigpioClient {
    /// Connect to the daemon. Fails immediately if it is not running.
    #[instrument(skip_all, fields(addr = addr))]
    pub fn connect(addr: &str) -> Result<Self, SourceError> {
        let unreachable = |source: io::Error| SourceError::DaemonUnreachable {
            addr: addr.to_string(),
            source,
        };
        let stream = TcpStream::connect(addr).map_err(unreachable)?;
        stream.set_nodelay(true).map_err(unreachable)?;
        debug!("Connected to pigpio daemon.");
        Ok(Self {
            stream: Some(stream),
        })
    }

    /// Send one command and wait for its reply.
    pub fn command(&mut self, command: u32, p1: u32, p2: u32) -> Result<i32, SourceError> {
        let stream = self.stream.as_mut().ok_or(SourceError::Closed)?;
        stream
            .write_all(&encode_command(command, p1, p2))
            .map_err(SourceError::DaemonIo)?;

        let mut reply = [0u8; FRAME_LEN];
        stream
            .read_exact(&mut reply)
            .map_err(SourceError::DaemonIo)?;

        let status = decode_reply(reply);
        trace!("Command {} returned {}.", command, status);
        if status < 0 {
            return Err(SourceError::DaemonStatus { command, status });
        }
        Ok(status)
    }

    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.shutdown(Shutdown::Both) {
                // The daemon may already have hung up.
                warn!("Failed to shut down pigpio connection. Error: {}", e);
            } else {
                debug!("Closed pigpio connection.");
            }
        }
    }
}

/// Reads the level of one GPIO line through the pigpio daemon.
pub struct DigitalPinSource {
    client: PigpioClient,
    pin: u8,
    scale: i64,
}

impl DigitalPinSource {
    /// Connect to the daemon and put `pin` into input mode. `scale`
    /// multiplies every level read (1 reports the bare 0/1 level).
    pub fn connect(addr: &str, pin: u8, scale: i64) -> Result<Self, SourceError> {
        let mut client = PigpioClient::connect(addr)?;
        client.command(PI_CMD_MODES, pin as u32, PI_INPUT)?;
        Ok(Self { client, pin, scale })
    }
}

impl ReadingSource for DigitalPinSource {
    fn produce_one_reading(&mut self) -> Result<Sample, SourceError> {
        let level = self.client.command(PI_CMD_READ, self.pin as u32, 0)?;
        Ok(Sample::Integer(level as i64 * self.scale))
    }

    fn close(&mut self) -> Result<(), SourceError> {
        self.client.close();
        Ok(())
    }

    fn name(&self) -> &'static str {
        "digital"
    }
}

impl Drop for DigitalPinSource {
    fn drop(&mut self) {
        self.client.close();
    }
}
