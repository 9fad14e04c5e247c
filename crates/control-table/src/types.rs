use crate::CatalogError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Register width in bytes. Only 1, 2 and 4 byte fields exist on the bus.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Width {
    One,
    Two,
    Four,
}

impl Width {
    pub fn bytes(self) -> usize {
        match self {
            Width::One => 1,
            Width::Two => 2,
            Width::Four => 4,
        }
    }

    /// Keep the low `bytes()` bytes of `value`, little-endian.
    pub fn encode(self, value: u32) -> Vec<u8> {
        value.to_le_bytes()[..self.bytes()].to_vec()
    }

    /// Little-endian decode; `None` if `data` is not exactly `bytes()` long.
    pub fn decode(self, data: &[u8]) -> Option<u32> {
        if data.len() != self.bytes() {
            return None;
        }
        let mut buf = [0u8; 4];
        buf[..data.len()].copy_from_slice(data);
        Some(u32::from_le_bytes(buf))
    }
}

impl TryFrom<u8> for Width {
    type Error = CatalogError;

    fn try_from(width: u8) -> Result<Self, Self::Error> {
        match width {
            1 => Ok(Width::One),
            2 => Ok(Width::Two),
            4 => Ok(Width::Four),
            other => Err(CatalogError::InvalidWidth {
                field: String::new(),
                width: other,
            }),
        }
    }
}

impl From<Width> for u8 {
    fn from(width: Width) -> Self {
        width.bytes() as u8
    }
}

impl From<Width> for u16 {
    fn from(width: Width) -> Self {
        width.bytes() as u16
    }
}

/// One row of a control table.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RegisterEntry {
    pub name: String,
    pub address: u16,
    pub width: Width,
}

impl RegisterEntry {
    pub fn new(name: &str, address: u16, width: u8) -> Result<Self, CatalogError> {
        let width = Width::try_from(width).map_err(|_| CatalogError::InvalidWidth {
            field: name.to_string(),
            width,
        })?;
        Ok(Self {
            name: name.to_string(),
            address,
            width,
        })
    }

    pub fn register(&self) -> Register {
        Register {
            address: self.address,
            width: self.width,
        }
    }
}

/// Resolved location of one field on one device.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Register {
    pub address: u16,
    pub width: Width,
}

/// Field name to register, resolved once per device.
pub type FieldMap = HashMap<String, Register>;
