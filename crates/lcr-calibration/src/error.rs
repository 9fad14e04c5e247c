use servo_bus::BusError;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = CalibrationError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum CalibrationError {
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("{pose} has {actual} targets for {expected} joints")]
    PoseLength {
        pose: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("resolution must be positive, got {0}")]
    Resolution(i32),
    #[error("arm layout has no motors")]
    EmptyLayout,
    #[error("motor {0} listed twice in the arm layout")]
    DuplicateJoint(u8),
    #[error("gripper {0} is not one of the arm motors")]
    GripperNotInArm(u8),
    #[error("no reading for motor {0}; check its cable and run calibration again")]
    MissingJoint(u8),
    #[error("operator prompt failed: {0}")]
    Operator(#[source] std::io::Error),
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("calibration file: {0}")]
    Format(#[from] serde_json::Error),
    #[error("calibration text: {0}")]
    Parse(String),
}
