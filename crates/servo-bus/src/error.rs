use control_table::CatalogError;
use servo_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = BusError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("motor {id}: {source}")]
    Catalog {
        id: u8,
        #[source]
        source: CatalogError,
    },
    #[error("motor {0} declared twice")]
    DuplicateMotor(u8),
    #[error("motor {0} is not on this chain")]
    UnknownMotor(u8),
    #[error("motor {id} has no field `{field}`")]
    UnknownField { id: u8, field: String },
    #[error("field `{field}` maps to different registers across motors {ids:?}")]
    InconsistentField { field: String, ids: Vec<u8> },
    #[error("motor {id} rejected by the `{field}` sync write session")]
    RejectedParam { field: String, id: u8 },
    #[error("{values} values given for {motors} motors")]
    ValueCount { values: usize, motors: usize },
    #[error("invalid {kind} code {code}")]
    InvalidMode { kind: &'static str, code: u32 },
    #[error("failed to set up port {port}: {source}")]
    Setup {
        port: String,
        #[source]
        source: TransportError,
    },
    #[error("{op} of `{field}` on motor {id} failed on port {port}: {source}")]
    Communication {
        op: &'static str,
        port: String,
        id: u8,
        field: String,
        #[source]
        source: TransportError,
    },
    #[error("{op} of `{field}` on motor {id} failed on port {port}: device error 0x{code:02X}")]
    Device {
        op: &'static str,
        port: String,
        id: u8,
        field: String,
        code: u8,
    },
    #[error("malformed {field} reply from motor {id}: {len} data bytes")]
    MalformedReply { id: u8, field: String, len: usize },
    #[error("sync write of `{field}` to motors {ids:?} failed on port {port}: {source}")]
    GroupCommunication {
        port: String,
        field: String,
        ids: Vec<u8>,
        #[source]
        source: TransportError,
    },
}

impl BusError {
    /// Setup mistakes that no retry can fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            BusError::Catalog { .. }
                | BusError::DuplicateMotor(_)
                | BusError::UnknownMotor(_)
                | BusError::UnknownField { .. }
                | BusError::InconsistentField { .. }
                | BusError::ValueCount { .. }
                | BusError::RejectedParam { .. }
                | BusError::InvalidMode { .. }
        )
    }

    /// Transport failures and device-reported errors.
    pub fn is_communication(&self) -> bool {
        !self.is_configuration()
    }

    /// Motor the error is about, when there is exactly one.
    pub fn motor_id(&self) -> Option<u8> {
        match self {
            BusError::Catalog { id, .. }
            | BusError::UnknownField { id, .. }
            | BusError::Communication { id, .. }
            | BusError::Device { id, .. }
            | BusError::MalformedReply { id, .. }
            | BusError::RejectedParam { id, .. } => Some(*id),
            BusError::DuplicateMotor(id) | BusError::UnknownMotor(id) => Some(*id),
            _ => None,
        }
    }
}
