use crate::BusError;

/// Control loop selected through the `operating_mode` register.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum OperatingMode {
    Velocity,
    Position,
    /// Multi-turn position; the reading does not wrap at one revolution.
    ExtendedPosition,
    CurrentControlledPosition,
    Pwm,
}

impl OperatingMode {
    pub fn code(self) -> u32 {
        match self {
            OperatingMode::Velocity => 1,
            OperatingMode::Position => 3,
            OperatingMode::ExtendedPosition => 4,
            OperatingMode::CurrentControlledPosition => 5,
            OperatingMode::Pwm => 16,
        }
    }
}

impl TryFrom<u32> for OperatingMode {
    type Error = BusError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            1 => Ok(OperatingMode::Velocity),
            3 => Ok(OperatingMode::Position),
            4 => Ok(OperatingMode::ExtendedPosition),
            5 => Ok(OperatingMode::CurrentControlledPosition),
            16 => Ok(OperatingMode::Pwm),
            code => Err(BusError::InvalidMode {
                kind: "operating mode",
                code,
            }),
        }
    }
}

/// Rotation direction selected through the `drive_mode` register.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum DriveMode {
    #[default]
    NonInverted,
    Inverted,
}

impl DriveMode {
    pub fn code(self) -> u32 {
        match self {
            DriveMode::NonInverted => 0,
            DriveMode::Inverted => 1,
        }
    }
}

impl TryFrom<u32> for DriveMode {
    type Error = BusError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(DriveMode::NonInverted),
            1 => Ok(DriveMode::Inverted),
            code => Err(BusError::InvalidMode {
                kind: "drive mode",
                code,
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TorqueMode {
    Disabled,
    Enabled,
}

impl TorqueMode {
    pub fn code(self) -> u32 {
        match self {
            TorqueMode::Disabled => 0,
            TorqueMode::Enabled => 1,
        }
    }
}

impl TryFrom<u32> for TorqueMode {
    type Error = BusError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(TorqueMode::Disabled),
            1 => Ok(TorqueMode::Enabled),
            code => Err(BusError::InvalidMode {
                kind: "torque mode",
                code,
            }),
        }
    }
}

impl From<bool> for TorqueMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            TorqueMode::Enabled
        } else {
            TorqueMode::Disabled
        }
    }
}
