use crate::packet;
use crate::{
    PortInfo, Result, ServoBus, StatusFramer, StatusPacket, TransportError, DEFAULT_BAUD_RATE,
    DEFAULT_TIMEOUT_MS,
};
use serialport::{SerialPort, SerialPortType};
use std::io::Write;
use std::time::Duration;
use tracing::trace;

/// Protocol 2.0 over a USB serial adapter (U2D2, Waveshare bus servo board, ...).
pub struct SerialBus {
    port_path: String,
    port: Box<dyn SerialPort>,
    timeout: Duration,
    framer: StatusFramer,
}

impl SerialBus {
    pub fn open_with(path: &str, baud: u32, timeout_ms: u64) -> Result<Self> {
        let timeout = Duration::from_millis(timeout_ms);
        let port = serialport::new(path, baud)
            .timeout(timeout)
            .open()
            .map_err(|e| match e.kind() {
                serialport::ErrorKind::NoDevice => TransportError::PortNotFound(path.to_string()),
                _ => TransportError::Io(e.to_string()),
            })?;
        Ok(SerialBus {
            port_path: path.to_string(),
            port,
            timeout,
            framer: StatusFramer::new(),
        })
    }

    pub fn port_path(&self) -> &str {
        &self.port_path
    }

    fn send(&mut self, request: &[u8]) -> Result<()> {
        // Stale bytes from an earlier timed out reply would desync framing.
        self.port.clear(serialport::ClearBuffer::Input).ok();
        self.framer.clear();
        trace!(port = %self.port_path, bytes = request.len(), "tx");
        self.port
            .write_all(request)
            .map_err(|e| TransportError::Io(e.to_string()))?;
        self.port
            .flush()
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn recv_status_from(&mut self, id: u8) -> Result<StatusPacket> {
        self.framer
            .recv_status_from(self.port.as_mut(), self.timeout, id)
    }
}

impl ServoBus for SerialBus {
    fn open(path: &str) -> Result<Self>
    where
        Self: Sized,
    {
        Self::open_with(path, DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS)
    }

    fn list() -> Result<Vec<PortInfo>> {
        let mut out = Vec::new();
        for p in serialport::available_ports().map_err(|e| TransportError::Io(e.to_string()))? {
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

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.port
            .set_baud_rate(baud)
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn set_timeout(&mut self, timeout_ms: u64) -> Result<()> {
        self.timeout = Duration::from_millis(timeout_ms);
        self.port
            .set_timeout(self.timeout)
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    fn ping(&mut self, id: u8) -> Result<StatusPacket> {
        self.send(&packet::ping_packet(id))?;
        self.recv_status_from(id)
    }

    fn read(&mut self, id: u8, address: u16, length: u16) -> Result<StatusPacket> {
        self.send(&packet::read_packet(id, address, length))?;
        self.recv_status_from(id)
    }

    fn write(&mut self, id: u8, address: u16, data: &[u8]) -> Result<StatusPacket> {
        self.send(&packet::write_packet(id, address, data))?;
        self.recv_status_from(id)
    }

    fn sync_read(&mut self, address: u16, length: u16, ids: &[u8]) -> Result<Vec<StatusPacket>> {
        self.send(&packet::sync_read_packet(address, length, ids))?;
        self.framer
            .recv_statuses(self.port.as_mut(), self.timeout, ids.len())
    }

    fn sync_write(&mut self, address: u16, length: u16, params: &[(u8, Vec<u8>)]) -> Result<()> {
        let request = packet::sync_write_packet(address, length, params)?;
        self.send(&request)
    }
}
