//! lcr-calibration: homing offsets and rotation directions for the Low Cost Robot
//!
//! The arm is posed twice by hand. From the raw positions read at each pose the
//! calibrator solves, per joint, the homing offset and inversion flag that make
//! the configured readings land on fixed nominal vectors. The result can be
//! saved, reloaded and checked live with [`verify`].

mod error;
pub use error::{CalibrationError, Result};

mod layout;
pub use layout::{ArmLayout, CalibrationConfig, POSE_1, POSE_2, RESOLUTION};

mod operator;
pub use operator::Operator;

pub mod calibration;
pub use calibration::Calibrator;

mod result;
pub use result::{CalibrationOutcome, CalibrationResult};

mod verify;
pub use verify::verify;
