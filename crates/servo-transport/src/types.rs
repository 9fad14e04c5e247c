use core::fmt;

/// ID that addresses every device on the bus at once.
pub const BROADCAST_ID: u8 = 0xFE;

/// Highest ID a single device may carry.
pub const MAX_ID: u8 = 0xFC;

/// Protocol 2.0 instruction codes used by this crate.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Instruction {
    Ping,
    Read,
    Write,
    SyncRead,
    SyncWrite,
    Status,
}

impl Instruction {
    pub fn code(self) -> u8 {
        match self {
            Instruction::Ping => 0x01,
            Instruction::Read => 0x02,
            Instruction::Write => 0x03,
            Instruction::SyncRead => 0x82,
            Instruction::SyncWrite => 0x83,
            Instruction::Status => 0x55,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x01 => Some(Instruction::Ping),
            0x02 => Some(Instruction::Read),
            0x03 => Some(Instruction::Write),
            0x82 => Some(Instruction::SyncRead),
            0x83 => Some(Instruction::SyncWrite),
            0x55 => Some(Instruction::Status),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Instruction::Ping => "PING",
            Instruction::Read => "READ",
            Instruction::Write => "WRITE",
            Instruction::SyncRead => "SYNC_READ",
            Instruction::SyncWrite => "SYNC_WRITE",
            Instruction::Status => "STATUS",
        };
        f.write_str(name)
    }
}

/// A decoded status packet returned by one device.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StatusPacket {
    pub id: u8,
    /// Device error byte; zero means the instruction was accepted.
    pub error: u8,
    pub params: Vec<u8>,
}

impl StatusPacket {
    pub fn is_ok(&self) -> bool {
        self.error == 0
    }

    /// Alert bit: the device has a hardware error latched.
    pub fn hardware_alert(&self) -> bool {
        self.error & 0x80 != 0
    }

    /// Error number in the low seven bits (result fail, instruction error, ...).
    pub fn error_number(&self) -> u8 {
        self.error & 0x7F
    }
}

#[derive(Clone, Debug)]
pub struct PortInfo {
    pub name: String,
    pub driver: String,
}
