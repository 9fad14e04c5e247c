use crate::{PortInfo, Result, StatusPacket, TransportError};

/// A minimal blocking servo bus interface.
///
/// Every call is one request followed by at most one round of replies; the
/// half-duplex medium does not allow two transactions in flight.
pub trait ServoBus {
    /// Open a bus by port name (e.g., "/dev/ttyACM0", "mock0").
    fn open(port: &str) -> Result<Self>
    where
        Self: Sized;

    /// Attempt to list available ports for this backend.
    fn list() -> Result<Vec<PortInfo>>;

    fn set_baud_rate(&mut self, _baud: u32) -> Result<()> {
        let _ = _baud;
        Err(TransportError::Unsupported("baud rate not configurable"))
    }

    /// Response timeout for every following transaction.
    fn set_timeout(&mut self, timeout_ms: u64) -> Result<()>;

    /// Ask one device for its status; a reply means it is present.
    fn ping(&mut self, id: u8) -> Result<StatusPacket>;

    /// Read `length` bytes starting at `address` from one device.
    fn read(&mut self, id: u8, address: u16, length: u16) -> Result<StatusPacket>;

    /// Write `data` starting at `address` on one device and wait for its status.
    fn write(&mut self, id: u8, address: u16, data: &[u8]) -> Result<StatusPacket>;

    /// Read the same register span from several devices in one transaction.
    ///
    /// Returns one status per device that answered, in reply order.
    fn sync_read(&mut self, address: u16, length: u16, ids: &[u8]) -> Result<Vec<StatusPacket>>;

    /// Write one register span on several devices in one transaction.
    ///
    /// Each parameter carries exactly `length` data bytes. Devices do not reply.
    fn sync_write(&mut self, address: u16, length: u16, params: &[(u8, Vec<u8>)]) -> Result<()>;
}
