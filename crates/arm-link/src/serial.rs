use crate::{ArmLink, LinkError, PortInfo, Result};
use serialport::{SerialPort, SerialPortType};
use std::io::{Read, Write};
use std::time::Duration;
use tracing::info;

/// Serial-port backend for the arm controller link.
///
/// The port is opened with a short read timeout; `read_available` first asks
/// the driver how many bytes are buffered and only then reads, so polling
/// never stalls the caller when the controller is quiet.
pub struct SerialLink {
    path: String,
    port: Box<dyn SerialPort>,
}

impl SerialLink {
    pub fn open_with(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(20))
            .open()
            .map_err(|e| match e.kind {
                serialport::ErrorKind::NoDevice => LinkError::InterfaceNotFound(path.to_string()),
                _ => LinkError::Io(e.to_string()),
            })?;
        info!(port = path, baud, "serial link open");
        Ok(SerialLink {
            path: path.to_string(),
            port,
        })
    }
}

impl ArmLink for SerialLink {
    fn open(path: &str, baud: u32) -> Result<Self>
    where
        Self: Sized,
    {
        Self::open_with(path, baud)
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| LinkError::Io(e.to_string()))? {
            let driver = match p.port_type {
                SerialPortType::UsbPort(_) => "usb-serial",
                _ => "serial",
            };
            out.push(PortInfo {
                name: p.port_name,
                driver: driver.to_string(),
            });
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        &self.path
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        self.port
            .write_all(line.as_bytes())
            .map_err(|e| LinkError::Io(e.to_string()))
    }

    fn read_available(&mut self) -> Result<Vec<u8>> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| LinkError::Io(e.to_string()))?;
        if pending == 0 {
            return Ok(Vec::new());
        }
        let mut buf = vec![0u8; pending as usize];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            // The driver said bytes were pending but they evaporated before
            // the read; treat like a quiet tick rather than a fault.
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(LinkError::Io(e.to_string())),
        }
    }
}
