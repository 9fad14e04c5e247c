use crate::session::{GroupSyncRead, GroupSyncWrite, SessionKey};
use crate::{BusError, BusMetrics, DriveMode, OperatingMode, Result, TorqueMode};
use control_table::{field, ControlTables, FieldMap, Register};
use servo_transport::{ServoBus, StatusPacket, TransportError};
use servo_transport::{DEFAULT_BAUD_RATE, DEFAULT_TIMEOUT_MS};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Port parameters applied once when the chain is connected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BusSettings {
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

/// One motor on the chain with its resolved control table.
#[derive(Clone, Debug)]
pub struct Motor {
    pub id: u8,
    pub model: String,
    fields: FieldMap,
}

impl Motor {
    pub fn register(&self, field: &str) -> Option<Register> {
        self.fields.get(field).copied()
    }
}

/// Values for a synchronized write: one for everybody, or one per motor.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncValues {
    Broadcast(u32),
    PerDevice(Vec<u32>),
}

impl SyncValues {
    fn expand(self, motors: usize) -> Result<Vec<u32>> {
        match self {
            SyncValues::Broadcast(v) => Ok(vec![v; motors]),
            SyncValues::PerDevice(values) if values.len() == motors => Ok(values),
            SyncValues::PerDevice(values) => Err(BusError::ValueCount {
                values: values.len(),
                motors,
            }),
        }
    }
}

impl From<u32> for SyncValues {
    fn from(value: u32) -> Self {
        SyncValues::Broadcast(value)
    }
}

impl From<Vec<u32>> for SyncValues {
    fn from(values: Vec<u32>) -> Self {
        SyncValues::PerDevice(values)
    }
}

impl From<&[u32]> for SyncValues {
    fn from(values: &[u32]) -> Self {
        SyncValues::PerDevice(values.to_vec())
    }
}

/// All motors sharing one bus.
///
/// The chain owns the transport and a registry of grouped transaction sessions
/// keyed by field and ordered motor list. Not meant to be shared across
/// threads; wrap it in a mutex if that is ever needed.
pub struct MotorsChain<B: ServoBus> {
    bus: B,
    port: String,
    motors: Vec<Motor>,
    readers: HashMap<SessionKey, GroupSyncRead>,
    writers: HashMap<SessionKey, GroupSyncWrite>,
    metrics: Option<BusMetrics>,
}

impl<B: ServoBus> MotorsChain<B> {
    /// Build a chain on an already opened bus. `motors` maps motor ID to model.
    pub fn new<I, S>(bus: B, port: &str, motors: I, tables: &ControlTables) -> Result<Self>
    where
        I: IntoIterator<Item = (u8, S)>,
        S: Into<String>,
    {
        let mut resolved: Vec<Motor> = Vec::new();
        for (id, model) in motors {
            let model = model.into();
            if resolved.iter().any(|m| m.id == id) {
                return Err(BusError::DuplicateMotor(id));
            }
            let fields = tables
                .resolve(&model)
                .map_err(|source| BusError::Catalog { id, source })?;
            resolved.push(Motor { id, model, fields });
        }
        debug!(port, motors = resolved.len(), "motor chain ready");
        Ok(Self {
            bus,
            port: port.to_string(),
            motors: resolved,
            readers: HashMap::new(),
            writers: HashMap::new(),
            metrics: None,
        })
    }

    /// Open `port`, apply `settings`, and build the chain.
    pub fn connect<I, S>(
        port: &str,
        motors: I,
        tables: &ControlTables,
        settings: BusSettings,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (u8, S)>,
        S: Into<String>,
    {
        let setup = |source: TransportError| BusError::Setup {
            port: port.to_string(),
            source,
        };
        let mut bus = B::open(port).map_err(setup)?;
        bus.set_baud_rate(settings.baud_rate).map_err(setup)?;
        bus.set_timeout(settings.timeout_ms).map_err(setup)?;
        Self::new(bus, port, motors, tables)
    }

    pub fn with_metrics(mut self, metrics: BusMetrics) -> Self {
        metrics.motors_registered.set(self.motors.len() as i64);
        self.metrics = Some(metrics);
        self
    }

    pub fn port(&self) -> &str {
        &self.port
    }

    pub fn motors(&self) -> &[Motor] {
        &self.motors
    }

    /// Motor IDs in declaration order.
    pub fn motor_ids(&self) -> Vec<u8> {
        self.motors.iter().map(|m| m.id).collect()
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_inner(self) -> B {
        self.bus
    }

    pub fn read_session_count(&self) -> usize {
        self.readers.len()
    }

    pub fn write_session_count(&self) -> usize {
        self.writers.len()
    }

    pub fn write_session(&self, field: &str, ids: &[u8]) -> Option<&GroupSyncWrite> {
        self.writers.get(&SessionKey::new(field, ids))
    }

    pub fn read_session(&self, field: &str, ids: &[u8]) -> Option<&GroupSyncRead> {
        self.readers.get(&SessionKey::new(field, ids))
    }

    /// Register of `field` on motor `id`.
    pub fn register(&self, field: &str, id: u8) -> Result<Register> {
        let motor = self
            .motors
            .iter()
            .find(|m| m.id == id)
            .ok_or(BusError::UnknownMotor(id))?;
        motor.register(field).ok_or_else(|| BusError::UnknownField {
            id,
            field: field.to_string(),
        })
    }

    /// Register shared by every motor in `ids`.
    fn group_register(&self, field: &str, ids: &[u8]) -> Result<Register> {
        let mut shared: Option<Register> = None;
        for id in ids {
            let reg = self.register(field, *id)?;
            match shared {
                Some(prev) if prev != reg => {
                    return Err(BusError::InconsistentField {
                        field: field.to_string(),
                        ids: ids.to_vec(),
                    })
                }
                _ => shared = Some(reg),
            }
        }
        shared.ok_or(BusError::ValueCount {
            values: 0,
            motors: 0,
        })
    }

    /// An empty list means every motor on the chain. A motor may appear once.
    fn targets(&self, ids: &[u8]) -> Result<Vec<u8>> {
        if ids.is_empty() {
            return Ok(self.motor_ids());
        }
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(BusError::DuplicateMotor(*id));
            }
        }
        Ok(ids.to_vec())
    }

    fn count_transaction(&self) {
        if let Some(m) = &self.metrics {
            m.transactions.inc();
        }
    }

    fn count_failure(&self) {
        if let Some(m) = &self.metrics {
            m.comm_failures.inc();
        }
    }

    fn check_status(
        &self,
        op: &'static str,
        field: &str,
        id: u8,
        reply: std::result::Result<StatusPacket, TransportError>,
    ) -> Result<StatusPacket> {
        self.count_transaction();
        let status = reply.map_err(|source| {
            self.count_failure();
            BusError::Communication {
                op,
                port: self.port.clone(),
                id,
                field: field.to_string(),
                source,
            }
        })?;
        if status.error_number() != 0 {
            self.count_failure();
            return Err(BusError::Device {
                op,
                port: self.port.clone(),
                id,
                field: field.to_string(),
                code: status.error,
            });
        }
        if status.hardware_alert() {
            warn!(id, field, error = status.error, "motor reports hardware alert");
        }
        Ok(status)
    }

    /// Write `value` into `field` of one motor, truncated to the field width.
    pub fn write(&mut self, field: &str, value: u32, id: u8) -> Result<()> {
        let reg = self.register(field, id)?;
        let data = reg.width.encode(value);
        debug!(id, field, value, "write");
        let reply = self.bus.write(id, reg.address, &data);
        self.check_status("write", field, id, reply)?;
        Ok(())
    }

    /// Read `field` from one motor. Fails on any communication problem.
    pub fn read(&mut self, field: &str, id: u8) -> Result<u32> {
        let reg = self.register(field, id)?;
        let reply = self.bus.read(id, reg.address, reg.width.into());
        let status = self.check_status("read", field, id, reply)?;
        reg.width
            .decode(&status.params)
            .ok_or_else(|| BusError::MalformedReply {
                id,
                field: field.to_string(),
                len: status.params.len(),
            })
    }

    /// Like [`read`](Self::read), but a communication failure gives `None`.
    /// Configuration mistakes are still errors.
    pub fn try_read(&mut self, field: &str, id: u8) -> Result<Option<u32>> {
        match self.read(field, id) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_communication() => {
                warn!(id, field, error = %e, "read unavailable");
                if let Some(m) = &self.metrics {
                    m.absent_readings.inc();
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Write `field` on several motors in one transaction.
    ///
    /// The session for this exact (field, motor list) pair is created on first
    /// use; later calls only replace its parameters.
    pub fn sync_write(
        &mut self,
        field: &str,
        values: impl Into<SyncValues>,
        ids: &[u8],
    ) -> Result<()> {
        let ids = self.targets(ids)?;
        let values = values.into().expand(ids.len())?;
        let reg = self.group_register(field, &ids)?;
        let key = SessionKey::new(field, &ids);

        let rejected = |id: u8| BusError::RejectedParam {
            field: field.to_string(),
            id,
        };
        let fresh = !self.writers.contains_key(&key);
        let group = match self.writers.entry(key) {
            // Registered only once every motor was accepted.
            Entry::Vacant(slot) => {
                let mut group = GroupSyncWrite::new(reg);
                for (id, value) in ids.iter().zip(&values) {
                    if !group.add_param(*id, reg.width.encode(*value)) {
                        return Err(rejected(*id));
                    }
                }
                slot.insert(group)
            }
            Entry::Occupied(slot) => {
                let group = slot.into_mut();
                for (id, value) in ids.iter().zip(&values) {
                    if !group.change_param(*id, reg.width.encode(*value)) {
                        return Err(rejected(*id));
                    }
                }
                group
            }
        };
        debug!(field, ids = ?ids, values = ?values, fresh, "sync write");

        let result = group.tx_packet(&mut self.bus);
        self.count_transaction();
        result.map_err(|source| {
            self.count_failure();
            BusError::GroupCommunication {
                port: self.port.clone(),
                field: field.to_string(),
                ids,
                source,
            }
        })
    }

    /// Read `field` from several motors in one transaction.
    ///
    /// A transport failure is not an error: every motor reads as `None`. Motors
    /// missing from an otherwise successful reply are `None` individually.
    pub fn sync_read(&mut self, field: &str, ids: &[u8]) -> Result<Vec<Option<u32>>> {
        let ids = self.targets(ids)?;
        let reg = self.group_register(field, &ids)?;
        let key = SessionKey::new(field, &ids);

        let group = self.readers.entry(key).or_insert_with(|| {
            let mut group = GroupSyncRead::new(reg);
            for id in &ids {
                group.add_param(*id);
            }
            group
        });
        let outcome = group.tx_rx_packet(&mut self.bus);
        let values: Vec<Option<u32>> = ids.iter().map(|id| group.get_data(*id)).collect();

        self.count_transaction();
        if let Err(e) = outcome {
            self.count_failure();
            warn!(port = %self.port, field, ids = ?ids, error = %e, "sync read failed");
        }
        let absent = values.iter().filter(|v| v.is_none()).count();
        if absent > 0 {
            if let Some(m) = &self.metrics {
                m.absent_readings.inc_by(absent as u64);
            }
        }
        Ok(values)
    }

    /// True if motor `id` answers a ping.
    pub fn ping(&mut self, id: u8) -> Result<bool> {
        if !self.motors.iter().any(|m| m.id == id) {
            return Err(BusError::UnknownMotor(id));
        }
        self.count_transaction();
        match self.bus.ping(id) {
            Ok(_) => Ok(true),
            Err(e) => {
                debug!(id, error = %e, "no ping reply");
                Ok(false)
            }
        }
    }

    pub fn write_torque_enable(&mut self, id: u8) -> Result<()> {
        self.write(field::TORQUE, TorqueMode::Enabled.code(), id)
    }

    pub fn write_torque_disable(&mut self, id: u8) -> Result<()> {
        self.write(field::TORQUE, TorqueMode::Disabled.code(), id)
    }

    pub fn sync_write_torque(&mut self, mode: TorqueMode, ids: &[u8]) -> Result<()> {
        self.sync_write(field::TORQUE, mode.code(), ids)
    }

    pub fn write_operating_mode(&mut self, mode: OperatingMode, id: u8) -> Result<()> {
        self.write(field::OPERATING_MODE, mode.code(), id)
    }

    pub fn sync_write_operating_mode(&mut self, mode: OperatingMode, ids: &[u8]) -> Result<()> {
        self.sync_write(field::OPERATING_MODE, mode.code(), ids)
    }

    pub fn read_operating_mode(&mut self, id: u8) -> Result<OperatingMode> {
        OperatingMode::try_from(self.read(field::OPERATING_MODE, id)?)
    }

    pub fn sync_write_drive_mode(&mut self, mode: DriveMode, ids: &[u8]) -> Result<()> {
        self.sync_write(field::DRIVE_MODE, mode.code(), ids)
    }

    pub fn sync_write_homing_offset(
        &mut self,
        offsets: impl Into<SyncValues>,
        ids: &[u8],
    ) -> Result<()> {
        self.sync_write(field::HOMING_OFFSET, offsets, ids)
    }

    pub fn read_position(&mut self, id: u8) -> Result<u32> {
        self.read(field::POSITION, id)
    }

    pub fn sync_read_position(&mut self, ids: &[u8]) -> Result<Vec<Option<u32>>> {
        self.sync_read(field::POSITION, ids)
    }

    pub fn write_goal_position(&mut self, value: u32, id: u8) -> Result<()> {
        self.write(field::GOAL_POSITION, value, id)
    }

    pub fn sync_write_goal_position(
        &mut self,
        values: impl Into<SyncValues>,
        ids: &[u8],
    ) -> Result<()> {
        self.sync_write(field::GOAL_POSITION, values, ids)
    }
}
