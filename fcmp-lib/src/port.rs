use crate::error::FcmpError;
use crate::hardware::ByteTransport;
use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::Duration;
use tracing::{info, warn};

// Reads only ever ask for bytes that already arrived, so this only bounds writes
const PORT_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial link (USB CDC or UART) implementing [`ByteTransport`].
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
    baud_rate: u32,
}

impl SerialTransport {
    pub fn open(path: &str, baud_rate: u32) -> Result<Self, FcmpError> {
        let port = serialport::new(path, baud_rate).timeout(PORT_TIMEOUT).open()?;
        info!(path, baud_rate, "serial port open");
        Ok(Self {
            port,
            path: path.to_string(),
            baud_rate,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Close and open the port again after an I/O error.
    pub fn reopen(&mut self) -> Result<(), FcmpError> {
        warn!(path = %self.path, "reopening serial port");
        // Best effort: the old handle may already be dead
        let _ = self.port.flush();
        self.port = serialport::new(&self.path, self.baud_rate).timeout(PORT_TIMEOUT).open()?;
        Ok(())
    }
}

impl ByteTransport for SerialTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, FcmpError> {
        let available = self.port.bytes_to_read()? as usize;
        if available == 0 || buf.is_empty() {
            return Ok(0);
        }
        let want = available.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), FcmpError> {
        self.port.write_all(bytes)?;
        Ok(())
    }
}
