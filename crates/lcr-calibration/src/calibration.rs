//! The two-pose calibration ritual.
//!
//! All arithmetic works on `Option` per joint: a motor that could not be read
//! stays `None` through every step instead of picking up a made-up value.

use crate::{ArmLayout, CalibrationConfig, CalibrationError, CalibrationOutcome, Operator, Result};
use servo_bus::codec::{apply_configuration, to_signed};
use servo_bus::{DriveMode, MotorsChain, OperatingMode, TorqueMode};
use servo_transport::ServoBus;
use tracing::{debug, info};

/// Round `value` to the nearest multiple of `resolution`, ties to even.
pub fn round_to_resolution(value: i32, resolution: i32) -> i32 {
    let steps = (f64::from(value) / f64::from(resolution)).round_ties_even() as i64;
    (steps * i64::from(resolution)) as i32
}

/// Homing offsets that bring `raw`, read with the given inversion flags and no
/// offset, onto `wanted`.
///
/// Offsets come out in the pre-inversion sign convention; inverted joints must
/// have theirs negated before use (see [`finalize_offsets`]).
pub fn homing_correction(
    raw: &[Option<u32>],
    inverted: &[Option<bool>],
    wanted: &[i32],
    resolution: i32,
) -> Vec<Option<i32>> {
    let neutral = vec![0i32; raw.len()];
    let present = to_signed(&apply_configuration(raw, &neutral, inverted));
    present
        .iter()
        .zip(inverted)
        .zip(wanted)
        .map(|((value, flip), target)| {
            let rounded = round_to_resolution((*value)?, resolution);
            Some(if (*flip)? {
                rounded.wrapping_sub(*target)
            } else {
                target.wrapping_sub(rounded)
            })
        })
        .collect()
}

/// A joint is inverted when, with the step-one offsets applied and no
/// inversion, it does not land on its pose-2 target.
pub fn detect_inversion(
    raw: &[Option<u32>],
    homing: &[Option<i32>],
    wanted: &[i32],
    resolution: i32,
) -> Vec<Option<bool>> {
    let straight = vec![false; raw.len()];
    let present = to_signed(&apply_configuration(raw, homing, &straight));
    present
        .iter()
        .zip(wanted)
        .map(|(value, target)| Some(round_to_resolution((*value)?, resolution) != *target))
        .collect()
}

/// Flip the offsets of inverted joints into the runtime convention.
pub fn finalize_offsets(homing: &[Option<i32>], inverted: &[Option<bool>]) -> Vec<Option<i32>> {
    homing
        .iter()
        .zip(inverted)
        .map(|(offset, flip)| {
            let offset = (*offset)?;
            Some(if (*flip)? { offset.wrapping_neg() } else { offset })
        })
        .collect()
}

/// Drives the calibration of one arm over an open motor chain.
pub struct Calibrator<'a, B: ServoBus> {
    chain: &'a mut MotorsChain<B>,
    layout: ArmLayout,
    config: CalibrationConfig,
}

impl<'a, B: ServoBus> Calibrator<'a, B> {
    pub fn new(
        chain: &'a mut MotorsChain<B>,
        layout: ArmLayout,
        config: CalibrationConfig,
    ) -> Result<Self> {
        layout.validate()?;
        config.validate(layout.joint_count())?;
        Ok(Self {
            chain,
            layout,
            config,
        })
    }

    pub fn layout(&self) -> &ArmLayout {
        &self.layout
    }

    /// Put every motor into a known state: torque off, multi-turn position
    /// mode on the joints, current-limited position mode on the gripper, zero
    /// homing offsets and normal direction.
    pub fn prepare(&mut self) -> Result<()> {
        let ids = self.layout.motor_ids.clone();
        let joints = self.layout.joints();
        info!(motors = ?ids, gripper = self.layout.gripper_id, "preparing arm");

        self.chain.sync_write_torque(TorqueMode::Disabled, &ids)?;
        if !joints.is_empty() {
            self.chain
                .sync_write_operating_mode(OperatingMode::ExtendedPosition, &joints)?;
        }
        self.chain.write_operating_mode(
            OperatingMode::CurrentControlledPosition,
            self.layout.gripper_id,
        )?;
        self.chain.sync_write_homing_offset(0, &ids)?;
        self.chain.sync_write_drive_mode(DriveMode::NonInverted, &ids)?;
        Ok(())
    }

    /// Raw present positions, `None` for motors that did not answer.
    pub fn read_positions(&mut self) -> Result<Vec<Option<u32>>> {
        let ids = self.layout.motor_ids.clone();
        let raw = self.chain.sync_read_position(&ids)?;
        debug!(raw = ?raw, "present positions");
        Ok(raw)
    }

    /// Offsets for the arm held at pose 1, assuming no joint is inverted.
    pub fn initial_homing(&mut self) -> Result<Vec<Option<i32>>> {
        let raw = self.read_positions()?;
        let straight = vec![Some(false); raw.len()];
        Ok(homing_correction(
            &raw,
            &straight,
            &self.config.pose_1,
            self.config.resolution,
        ))
    }

    /// Inversion flags for the arm held at pose 2.
    pub fn detect_inversion(&mut self, homing: &[Option<i32>]) -> Result<Vec<Option<bool>>> {
        let raw = self.read_positions()?;
        Ok(detect_inversion(
            &raw,
            homing,
            &self.config.pose_2,
            self.config.resolution,
        ))
    }

    /// Offsets for the arm held at pose 2 with the detected inversion flags,
    /// already in the runtime convention.
    pub fn final_homing(&mut self, inverted: &[Option<bool>]) -> Result<Vec<Option<i32>>> {
        let raw = self.read_positions()?;
        let homing = homing_correction(&raw, inverted, &self.config.pose_2, self.config.resolution);
        Ok(finalize_offsets(&homing, inverted))
    }

    /// Full ritual: prepare, pose 1, pose 2.
    ///
    /// Bus setup failures abort. Joints that could not be read come back as
    /// `None` in the outcome.
    pub fn run<O: Operator>(&mut self, operator: &mut O) -> Result<CalibrationOutcome> {
        self.prepare()?;

        operator
            .pause("Move the arm to pose 1, then press Enter")
            .map_err(CalibrationError::Operator)?;
        let homing = self.initial_homing()?;
        info!(homing = ?homing, "initial homing computed");

        operator
            .pause("Move the arm to pose 2, then press Enter")
            .map_err(CalibrationError::Operator)?;
        let inverted = self.detect_inversion(&homing)?;
        info!(inverted = ?inverted, "rotation directions detected");

        let homing_offset = self.final_homing(&inverted)?;
        info!(homing = ?homing_offset, "calibration done");

        Ok(CalibrationOutcome {
            motor_ids: self.layout.motor_ids.clone(),
            homing_offset,
            inverted,
        })
    }
}
