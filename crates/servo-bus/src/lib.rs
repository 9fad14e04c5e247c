//! servo-bus: typed register access for a daisy-chained servo bus
//!
//! [`MotorsChain`] resolves every motor's control table once, then reads and
//! writes named fields either on one motor or on a group of motors in a single
//! synchronized transaction. The [`codec`] module converts between the raw
//! unsigned register values and signed, homed, possibly inverted positions.

mod error;
pub use error::{BusError, Result};

mod modes;
pub use modes::{DriveMode, OperatingMode, TorqueMode};

mod session;
pub use session::{GroupSyncRead, GroupSyncWrite, SessionKey};

mod chain;
pub use chain::{BusSettings, Motor, MotorsChain, SyncValues};

mod metrics;
pub use metrics::{BusMetrics, MetricsHub};

pub mod codec;

pub use control_table::{field, ControlTables, Register, Width};
