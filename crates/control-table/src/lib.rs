//! control-table: static register catalog for serial bus servos
//!
//! Maps a device model name to its control table, i.e. the byte address and
//! width of every named register field. Caller-supplied models can be merged on
//! top of the built-in table without touching it.

mod types;
pub use types::{FieldMap, Register, RegisterEntry, Width};

mod error;
pub use error::{CatalogError, Result};

mod catalog;
pub use catalog::{ControlTables, X_SERIES, X_SERIES_MODELS};

mod loader;
pub use loader::{load_models_file, parse_models};

/// Field names of the built-in X-series table.
pub mod field {
    pub const MODEL_NUMBER: &str = "model_number";
    pub const FIRMWARE_VERSION: &str = "firmware_version";
    pub const ID: &str = "id";
    pub const BAUD_RATE: &str = "baud_rate";
    pub const RETURN_DELAY_TIME: &str = "return_delay_time";
    pub const DRIVE_MODE: &str = "drive_mode";
    pub const OPERATING_MODE: &str = "operating_mode";
    pub const HOMING_OFFSET: &str = "homing_offset";
    pub const TEMPERATURE_LIMIT: &str = "temperature_limit";
    pub const PWM_LIMIT: &str = "pwm_limit";
    pub const CURRENT_LIMIT: &str = "current_limit";
    pub const MAX_POSITION_LIMIT: &str = "max_position_limit";
    pub const MIN_POSITION_LIMIT: &str = "min_position_limit";
    pub const TORQUE: &str = "torque";
    pub const LED: &str = "led";
    pub const GOAL_PWM: &str = "goal_pwm";
    pub const GOAL_CURRENT: &str = "goal_current";
    pub const GOAL_VELOCITY: &str = "goal_velocity";
    pub const PROFILE_ACCELERATION: &str = "profile_acceleration";
    pub const PROFILE_VELOCITY: &str = "profile_velocity";
    pub const GOAL_POSITION: &str = "goal_position";
    pub const MOVING: &str = "moving";
    pub const PWM: &str = "pwm";
    pub const CURRENT: &str = "current";
    pub const VELOCITY: &str = "velocity";
    pub const POSITION: &str = "position";
    pub const VOLTAGE: &str = "voltage";
    pub const TEMPERATURE: &str = "temperature";
}
