//! servo-transport: byte-level access to a half-duplex servo bus
//!
//! This crate frames Dynamixel Protocol 2.0 instruction and status packets and
//! exposes them through the [`ServoBus`] trait. The default build enables a
//! `mock` backend that simulates a chain of devices in memory, so that callers
//! can be exercised without hardware. The `serial` feature adds a backend on top
//! of the `serialport` crate.

mod types;
pub use types::{Instruction, PortInfo, StatusPacket, BROADCAST_ID, MAX_ID};

mod error;
pub use error::{Result, TransportError};

pub mod packet;

mod framing;
pub use framing::StatusFramer;

mod traits;
pub use traits::ServoBus;

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockBus, MockHandle, MockStats};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialBus;

/// Baud rate used by the Low Cost Robot servo chain.
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

/// Response timeout applied when a port is opened.
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
