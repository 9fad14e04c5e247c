use control_table::Register;
use servo_transport::{ServoBus, TransportError};
use std::collections::HashMap;
use tracing::warn;

/// Identity of a grouped transaction: one field on an ordered list of motors.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct SessionKey {
    pub field: String,
    pub ids: Vec<u8>,
}

impl SessionKey {
    pub fn new(field: &str, ids: &[u8]) -> Self {
        Self {
            field: field.to_string(),
            ids: ids.to_vec(),
        }
    }
}

/// Parameters of a synchronized write, kept between calls so that later writes
/// only replace the data bytes.
#[derive(Debug, Clone)]
pub struct GroupSyncWrite {
    register: Register,
    params: Vec<(u8, Vec<u8>)>,
}

impl GroupSyncWrite {
    pub fn new(register: Register) -> Self {
        Self {
            register,
            params: Vec::new(),
        }
    }

    pub fn register(&self) -> Register {
        self.register
    }

    /// Register a motor. Returns false if it is already present or `data` has
    /// the wrong width.
    pub fn add_param(&mut self, id: u8, data: Vec<u8>) -> bool {
        if data.len() != self.register.width.bytes() || self.params.iter().any(|(i, _)| *i == id) {
            return false;
        }
        self.params.push((id, data));
        true
    }

    /// Replace the data of an already registered motor.
    pub fn change_param(&mut self, id: u8, data: Vec<u8>) -> bool {
        if data.len() != self.register.width.bytes() {
            return false;
        }
        match self.params.iter_mut().find(|(i, _)| *i == id) {
            Some((_, slot)) => {
                *slot = data;
                true
            }
            None => false,
        }
    }

    pub fn params(&self) -> &[(u8, Vec<u8>)] {
        &self.params
    }

    pub fn tx_packet<B: ServoBus>(&self, bus: &mut B) -> Result<(), TransportError> {
        bus.sync_write(
            self.register.address,
            self.register.width.into(),
            &self.params,
        )
    }
}

/// Motor list and last received data of a synchronized read.
#[derive(Debug, Clone)]
pub struct GroupSyncRead {
    register: Register,
    ids: Vec<u8>,
    data: HashMap<u8, Vec<u8>>,
}

impl GroupSyncRead {
    pub fn new(register: Register) -> Self {
        Self {
            register,
            ids: Vec::new(),
            data: HashMap::new(),
        }
    }

    pub fn register(&self) -> Register {
        self.register
    }

    pub fn add_param(&mut self, id: u8) -> bool {
        if self.ids.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn ids(&self) -> &[u8] {
        &self.ids
    }

    /// Run the transaction. Previous data is dropped first, so after a failure
    /// every motor reads as absent.
    pub fn tx_rx_packet<B: ServoBus>(&mut self, bus: &mut B) -> Result<(), TransportError> {
        self.data.clear();
        let statuses = bus.sync_read(
            self.register.address,
            self.register.width.into(),
            &self.ids,
        )?;
        for status in statuses {
            if !self.ids.contains(&status.id) {
                warn!(id = status.id, "status from motor outside the group");
                continue;
            }
            if status.error_number() != 0 {
                warn!(id = status.id, error = status.error, "motor rejected sync read");
                continue;
            }
            if status.params.len() != self.register.width.bytes() {
                warn!(id = status.id, len = status.params.len(), "short sync read data");
                continue;
            }
            self.data.insert(status.id, status.params);
        }
        Ok(())
    }

    /// Little-endian value received from `id` in the last transaction.
    pub fn get_data(&self, id: u8) -> Option<u32> {
        self.data
            .get(&id)
            .and_then(|bytes| self.register.width.decode(bytes))
    }
}
