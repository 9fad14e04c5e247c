use crate::packet::{self, Packet};
use crate::{Instruction, PortInfo, Result, ServoBus, StatusPacket, TransportError, BROADCAST_ID};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::trace;

/// An in-process simulated servo chain.
///
/// Requests are encoded to Protocol 2.0 bytes, decoded again by the simulated
/// devices, and answered with real status packets, so the whole framing path is
/// exercised. Use [`MockBus::handle`] to inspect or change device state while
/// the bus itself is owned by a client.
pub struct MockBus {
    name: String,
    state: Arc<Mutex<ChainState>>,
}

/// Shared view on a [`MockBus`] chain.
#[derive(Clone)]
pub struct MockHandle {
    state: Arc<Mutex<ChainState>>,
}

/// Transaction counters, per instruction.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MockStats {
    pub reads: u32,
    pub writes: u32,
    pub sync_reads: u32,
    pub sync_writes: u32,
    pub failures: u32,
}

#[derive(Debug)]
struct SimDevice {
    registers: BTreeMap<u16, u8>,
    online: bool,
    error: u8,
}

impl SimDevice {
    fn new() -> Self {
        Self {
            registers: BTreeMap::new(),
            online: true,
            error: 0,
        }
    }

    fn load(&self, address: u16, length: u16) -> Vec<u8> {
        (0..length)
            .map(|i| {
                let addr = address.wrapping_add(i);
                self.registers.get(&addr).copied().unwrap_or(0)
            })
            .collect()
    }

    fn store(&mut self, address: u16, data: &[u8]) {
        for (i, b) in data.iter().enumerate() {
            self.registers.insert(address.wrapping_add(i as u16), *b);
        }
    }
}

#[derive(Debug, Default)]
struct ChainState {
    devices: BTreeMap<u8, SimDevice>,
    fail_next: u32,
    baud_rate: u32,
    timeout_ms: u64,
    stats: MockStats,
}

fn lock(state: &Arc<Mutex<ChainState>>) -> MutexGuard<'_, ChainState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn le_u16(params: &[u8], at: usize) -> Result<u16> {
    match params.get(at..at + 2) {
        Some(b) => Ok(u16::from_le_bytes([b[0], b[1]])),
        None => Err(TransportError::InvalidPacket("short parameters")),
    }
}

impl ChainState {
    fn take_injected_failure(&mut self) -> bool {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            self.stats.failures += 1;
            true
        } else {
            false
        }
    }

    fn online(&self, id: u8) -> Option<&SimDevice> {
        self.devices.get(&id).filter(|d| d.online)
    }

    /// Serve one request; returns the raw reply bytes (possibly empty).
    fn serve(&mut self, request: &Packet) -> Result<Vec<u8>> {
        match request.instruction {
            Instruction::Ping => {
                self.stats.reads += 1;
                let dev = self.online(request.id).ok_or(TransportError::Timeout)?;
                Ok(packet::status_packet(request.id, dev.error, &[]))
            }
            Instruction::Read => {
                self.stats.reads += 1;
                let address = le_u16(&request.params, 0)?;
                let length = le_u16(&request.params, 2)?;
                let dev = self.online(request.id).ok_or(TransportError::Timeout)?;
                let data = if dev.error == 0 {
                    dev.load(address, length)
                } else {
                    Vec::new()
                };
                Ok(packet::status_packet(request.id, dev.error, &data))
            }
            Instruction::Write => {
                self.stats.writes += 1;
                let address = le_u16(&request.params, 0)?;
                let dev = self
                    .devices
                    .get_mut(&request.id)
                    .filter(|d| d.online)
                    .ok_or(TransportError::Timeout)?;
                if dev.error == 0 {
                    dev.store(address, &request.params[2..]);
                }
                Ok(packet::status_packet(request.id, dev.error, &[]))
            }
            Instruction::SyncRead => {
                self.stats.sync_reads += 1;
                let address = le_u16(&request.params, 0)?;
                let length = le_u16(&request.params, 2)?;
                let mut reply = Vec::new();
                for id in &request.params[4..] {
                    if let Some(dev) = self.online(*id) {
                        reply.extend(packet::status_packet(*id, dev.error, &dev.load(address, length)));
                    }
                }
                if reply.is_empty() {
                    return Err(TransportError::Timeout);
                }
                Ok(reply)
            }
            Instruction::SyncWrite => {
                self.stats.sync_writes += 1;
                let address = le_u16(&request.params, 0)?;
                let length = le_u16(&request.params, 2)? as usize;
                for chunk in request.params[4..].chunks(length + 1) {
                    if chunk.len() != length + 1 {
                        return Err(TransportError::InvalidPacket("sync write chunk"));
                    }
                    if let Some(dev) = self.devices.get_mut(&chunk[0]).filter(|d| d.online) {
                        dev.store(address, &chunk[1..]);
                    }
                }
                Ok(Vec::new())
            }
            Instruction::Status => Err(TransportError::InvalidPacket("status sent by controller")),
        }
    }
}

impl MockBus {
    /// A chain pre-populated with online devices at `ids`.
    pub fn with_devices(name: &str, ids: &[u8]) -> Self {
        let bus = Self {
            name: name.to_string(),
            state: Arc::new(Mutex::new(ChainState::default())),
        };
        let handle = bus.handle();
        for id in ids {
            handle.add_device(*id);
        }
        bus
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> MockHandle {
        MockHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let mut state = lock(&self.state);
        trace!(port = %self.name, bytes = request.len(), "tx");
        if state.take_injected_failure() {
            trace!(port = %self.name, "injected failure");
            return Err(TransportError::Io("injected failure".to_string()));
        }
        let decoded = packet::decode(request)?;
        if decoded.id != BROADCAST_ID && !state.devices.contains_key(&decoded.id) {
            return Err(TransportError::Timeout);
        }
        state.serve(&decoded)
    }
}

impl MockHandle {
    pub fn add_device(&self, id: u8) {
        lock(&self.state).devices.entry(id).or_insert_with(SimDevice::new);
    }

    /// Store raw bytes into a device's register memory.
    pub fn set_register(&self, id: u8, address: u16, data: &[u8]) {
        let mut state = lock(&self.state);
        state
            .devices
            .entry(id)
            .or_insert_with(SimDevice::new)
            .store(address, data);
    }

    /// Store `value` little-endian over `width` bytes.
    pub fn set_value(&self, id: u8, address: u16, width: u16, value: u32) {
        let bytes = value.to_le_bytes();
        let width = (width as usize).min(bytes.len());
        self.set_register(id, address, &bytes[..width]);
    }

    pub fn register(&self, id: u8, address: u16, length: u16) -> Option<Vec<u8>> {
        lock(&self.state)
            .devices
            .get(&id)
            .map(|d| d.load(address, length))
    }

    pub fn value(&self, id: u8, address: u16, width: u16) -> Option<u32> {
        let bytes = self.register(id, address, width.min(4))?;
        let mut buf = [0u8; 4];
        buf[..bytes.len()].copy_from_slice(&bytes);
        Some(u32::from_le_bytes(buf))
    }

    /// An offline device never answers; requests to it time out.
    pub fn set_online(&self, id: u8, online: bool) {
        if let Some(dev) = lock(&self.state).devices.get_mut(&id) {
            dev.online = online;
        }
    }

    /// Error byte the device puts in every status packet.
    pub fn set_device_error(&self, id: u8, error: u8) {
        if let Some(dev) = lock(&self.state).devices.get_mut(&id) {
            dev.error = error;
        }
    }

    /// Make the next `count` transactions fail at the transport level.
    pub fn fail_next(&self, count: u32) {
        lock(&self.state).fail_next = count;
    }

    pub fn stats(&self) -> MockStats {
        lock(&self.state).stats.clone()
    }

    pub fn baud_rate(&self) -> u32 {
        lock(&self.state).baud_rate
    }

    pub fn timeout_ms(&self) -> u64 {
        lock(&self.state).timeout_ms
    }
}

impl ServoBus for MockBus {
    fn open(port: &str) -> Result<Self> {
        Ok(Self::with_devices(port, &[]))
    }

    fn list() -> Result<Vec<PortInfo>> {
        Ok(vec![PortInfo {
            name: "mock0".to_string(),
            driver: "mock".to_string(),
        }])
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        lock(&self.state).baud_rate = baud;
        Ok(())
    }

    fn set_timeout(&mut self, timeout_ms: u64) -> Result<()> {
        lock(&self.state).timeout_ms = timeout_ms;
        Ok(())
    }

    fn ping(&mut self, id: u8) -> Result<StatusPacket> {
        let reply = self.transact(&packet::ping_packet(id))?;
        packet::decode_status(&reply)
    }

    fn read(&mut self, id: u8, address: u16, length: u16) -> Result<StatusPacket> {
        let reply = self.transact(&packet::read_packet(id, address, length))?;
        packet::decode_status(&reply)
    }

    fn write(&mut self, id: u8, address: u16, data: &[u8]) -> Result<StatusPacket> {
        let reply = self.transact(&packet::write_packet(id, address, data))?;
        packet::decode_status(&reply)
    }

    fn sync_read(&mut self, address: u16, length: u16, ids: &[u8]) -> Result<Vec<StatusPacket>> {
        let reply = self.transact(&packet::sync_read_packet(address, length, ids))?;
        packet::decode_statuses(&reply)
    }

    fn sync_write(&mut self, address: u16, length: u16, params: &[(u8, Vec<u8>)]) -> Result<()> {
        let request = packet::sync_write_packet(address, length, params)?;
        self.transact(&request).map(|_| ())
    }
}
