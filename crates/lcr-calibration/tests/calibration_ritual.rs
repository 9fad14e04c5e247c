use lcr_calibration::{
    verify, ArmLayout, CalibrationConfig, CalibrationError, CalibrationResult, Calibrator, POSE_1,
    POSE_2,
};
use servo_bus::codec::signed_to_unsigned;
use servo_bus::{ControlTables, MotorsChain};
use servo_transport::{MockBus, MockHandle};
use std::time::Duration;

const PRESENT_POSITION: u16 = 132;

/// A hand-assembled arm: each joint sits `base` ticks away from its logical
/// zero and may turn the opposite way.
struct SimulatedArm {
    base: [i32; 6],
    direction: [i32; 6],
    noise: [i32; 6],
}

impl SimulatedArm {
    fn assembled() -> Self {
        Self {
            base: [4096, -2048, 0, 8192, -1024, 3072],
            direction: [1, -1, 1, -1, 1, -1],
            noise: [0; 6],
        }
    }

    fn raw(&self, pose: &[i32; 6], joint: usize) -> i32 {
        self.base[joint] + self.direction[joint] * pose[joint] + self.noise[joint]
    }

    fn hold(&self, handle: &MockHandle, pose: &[i32; 6]) {
        for joint in 0..6 {
            let id = joint as u8 + 1;
            let raw = signed_to_unsigned(self.raw(pose, joint));
            handle.set_value(id, PRESENT_POSITION, 4, raw);
        }
    }
}

fn open_chain() -> (MotorsChain<MockBus>, MockHandle) {
    let bus = MockBus::with_devices("mock0", &[1, 2, 3, 4, 5, 6]);
    let handle = bus.handle();
    let chain = MotorsChain::new(
        bus,
        "mock0",
        ArmLayout::default().motors(),
        &ControlTables::builtin(),
    )
    .unwrap();
    (chain, handle)
}

fn calibrate(
    chain: &mut MotorsChain<MockBus>,
    handle: &MockHandle,
    arm: &SimulatedArm,
    at_pose_2: impl Fn(&MockHandle),
) -> lcr_calibration::CalibrationOutcome {
    let mut pauses = 0;
    let mut operator = |_prompt: &str| -> std::io::Result<()> {
        pauses += 1;
        if pauses == 1 {
            arm.hold(handle, &POSE_1);
        } else {
            arm.hold(handle, &POSE_2);
            at_pose_2(handle);
        }
        Ok(())
    };
    let mut calibrator =
        Calibrator::new(chain, ArmLayout::default(), CalibrationConfig::default()).unwrap();
    calibrator.run(&mut operator).unwrap()
}

#[test]
fn test_calibration_reproduces_both_poses() {
    let (mut chain, handle) = open_chain();
    let arm = SimulatedArm::assembled();
    let outcome = calibrate(&mut chain, &handle, &arm, |_| {});
    let result = outcome.into_result().unwrap();

    assert_eq!(result.motor_ids, vec![1, 2, 3, 4, 5, 6]);
    assert_eq!(result.inverted, vec![false, true, false, true, false, true]);

    arm.hold(&handle, &POSE_1);
    let raw = chain.sync_read_position(&[]).unwrap();
    let pose_1: Vec<Option<i32>> = POSE_1.iter().map(|v| Some(*v)).collect();
    assert_eq!(result.apply(&raw), pose_1);

    arm.hold(&handle, &POSE_2);
    let raw = chain.sync_read_position(&[]).unwrap();
    let pose_2: Vec<Option<i32>> = POSE_2.iter().map(|v| Some(*v)).collect();
    assert_eq!(result.apply(&raw), pose_2);
}

#[test]
fn test_calibration_leaves_motors_prepared() {
    let (mut chain, handle) = open_chain();
    let arm = SimulatedArm::assembled();
    calibrate(&mut chain, &handle, &arm, |_| {});
    assert_eq!(handle.value(1, 11, 1), Some(4));
    assert_eq!(handle.value(6, 11, 1), Some(5));
    assert_eq!(handle.value(3, 64, 1), Some(0));
}

#[test]
fn test_small_pose_error_is_absorbed() {
    let (mut chain, handle) = open_chain();
    let mut arm = SimulatedArm::assembled();
    arm.noise = [100, -150, 200, -90, 30, -250];
    let result = calibrate(&mut chain, &handle, &arm, |_| {})
        .into_result()
        .unwrap();
    assert_eq!(result.inverted, vec![false, true, false, true, false, true]);

    arm.hold(&handle, &POSE_2);
    let raw = chain.sync_read_position(&[]).unwrap();
    for (joint, value) in result.apply(&raw).into_iter().enumerate() {
        let value = value.unwrap();
        let error = (value - POSE_2[joint]).abs();
        assert!(error <= 250, "joint {joint}: {value}");
    }
}

#[test]
fn test_unplugged_motor_blocks_result() {
    let (mut chain, handle) = open_chain();
    let arm = SimulatedArm::assembled();
    let outcome = calibrate(&mut chain, &handle, &arm, |h| h.set_online(3, false));

    assert_eq!(outcome.missing(), vec![3]);
    assert_eq!(outcome.homing_offset.len(), 6);
    assert!(outcome.homing_offset[0].is_some());
    assert!(matches!(
        outcome.into_result(),
        Err(CalibrationError::MissingJoint(3))
    ));
}

#[test]
fn test_dropped_transaction_leaves_every_joint_absent() {
    let (mut chain, handle) = open_chain();
    let arm = SimulatedArm::assembled();
    // the inversion read at pose 2 is lost
    let outcome = calibrate(&mut chain, &handle, &arm, |h| h.fail_next(1));
    assert_eq!(outcome.inverted, vec![None; 6]);
    assert_eq!(outcome.homing_offset, vec![None; 6]);
    assert_eq!(outcome.missing().len(), 6);
}

#[test]
fn test_saved_calibration_verifies() {
    let (mut chain, handle) = open_chain();
    let arm = SimulatedArm::assembled();
    let result = calibrate(&mut chain, &handle, &arm, |_| {})
        .into_result()
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    result.save(&path).unwrap();
    let loaded = CalibrationResult::load(&path).unwrap();

    arm.hold(&handle, &POSE_1);
    let mut readings = Vec::new();
    verify(&mut chain, &loaded, Duration::ZERO, Some(2), |p| {
        readings.push(p.to_vec())
    })
    .unwrap();
    assert_eq!(readings.len(), 2);
    assert_eq!(
        readings[1],
        POSE_1.iter().map(|v| Some(*v)).collect::<Vec<_>>()
    );
}
