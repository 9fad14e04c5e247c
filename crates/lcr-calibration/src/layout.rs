use crate::{CalibrationError, Result};
use serde::{Deserialize, Serialize};

/// Nominal joint positions with the arm in the first reference pose.
pub const POSE_1: [i32; 6] = [0, -1024, 1024, 0, 0, 0];
/// Nominal joint positions with the arm in the second reference pose.
pub const POSE_2: [i32; 6] = [1024, 0, 0, 1024, 1024, -1024];
/// Ticks per quarter turn on the X-series encoders.
pub const RESOLUTION: i32 = 1024;

/// Which motors make up the arm and which one drives the gripper.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ArmLayout {
    pub motor_ids: Vec<u8>,
    pub gripper_id: u8,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_model() -> String {
    "xl330-m288".to_string()
}

impl Default for ArmLayout {
    fn default() -> Self {
        Self {
            motor_ids: vec![1, 2, 3, 4, 5, 6],
            gripper_id: 6,
            model: default_model(),
        }
    }
}

impl ArmLayout {
    pub fn validate(&self) -> Result<()> {
        if self.motor_ids.is_empty() {
            return Err(CalibrationError::EmptyLayout);
        }
        for (i, id) in self.motor_ids.iter().enumerate() {
            if self.motor_ids[..i].contains(id) {
                return Err(CalibrationError::DuplicateJoint(*id));
            }
        }
        if !self.motor_ids.contains(&self.gripper_id) {
            return Err(CalibrationError::GripperNotInArm(self.gripper_id));
        }
        Ok(())
    }

    pub fn joint_count(&self) -> usize {
        self.motor_ids.len()
    }

    /// Every motor except the gripper, in layout order.
    pub fn joints(&self) -> Vec<u8> {
        self.motor_ids
            .iter()
            .copied()
            .filter(|id| *id != self.gripper_id)
            .collect()
    }

    /// `(id, model)` pairs for building a motor chain.
    pub fn motors(&self) -> impl Iterator<Item = (u8, String)> + '_ {
        self.motor_ids.iter().map(|id| (*id, self.model.clone()))
    }
}

/// Reference poses and rounding step.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct CalibrationConfig {
    pub pose_1: Vec<i32>,
    pub pose_2: Vec<i32>,
    #[serde(default = "default_resolution")]
    pub resolution: i32,
}

fn default_resolution() -> i32 {
    RESOLUTION
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pose_1: POSE_1.to_vec(),
            pose_2: POSE_2.to_vec(),
            resolution: RESOLUTION,
        }
    }
}

impl CalibrationConfig {
    pub fn validate(&self, joints: usize) -> Result<()> {
        if self.resolution <= 0 {
            return Err(CalibrationError::Resolution(self.resolution));
        }
        for (pose, targets) in [("pose 1", &self.pose_1), ("pose 2", &self.pose_2)] {
            if targets.len() != joints {
                return Err(CalibrationError::PoseLength {
                    pose,
                    expected: joints,
                    actual: targets.len(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = ArmLayout::default();
        layout.validate().unwrap();
        assert_eq!(layout.joints(), vec![1, 2, 3, 4, 5]);
        CalibrationConfig::default().validate(layout.joint_count()).unwrap();
    }

    #[test]
    fn test_gripper_anywhere_in_layout() {
        let layout = ArmLayout {
            motor_ids: vec![10, 11, 12],
            gripper_id: 10,
            model: default_model(),
        };
        layout.validate().unwrap();
        assert_eq!(layout.joints(), vec![11, 12]);
    }

    #[test]
    fn test_layout_errors() {
        let mut layout = ArmLayout::default();
        layout.gripper_id = 9;
        assert!(matches!(layout.validate(), Err(CalibrationError::GripperNotInArm(9))));
        layout.motor_ids = vec![1, 2, 1];
        assert!(matches!(layout.validate(), Err(CalibrationError::DuplicateJoint(1))));
        layout.motor_ids.clear();
        assert!(matches!(layout.validate(), Err(CalibrationError::EmptyLayout)));
    }

    #[test]
    fn test_pose_length_checked() {
        let config = CalibrationConfig::default();
        let err = config.validate(5).unwrap_err();
        assert!(matches!(
            err,
            CalibrationError::PoseLength { expected: 5, actual: 6, .. }
        ));
    }

    #[test]
    fn test_config_yaml_defaults() {
        let layout: ArmLayout = serde_json::from_str(r#"{"motor_ids":[1,2],"gripper_id":2}"#).unwrap();
        assert_eq!(layout.model, "xl330-m288");
        let config: CalibrationConfig =
            serde_json::from_str(r#"{"pose_1":[0,0],"pose_2":[1024,1024]}"#).unwrap();
        assert_eq!(config.resolution, 1024);
    }
}
