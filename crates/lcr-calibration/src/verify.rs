use crate::{CalibrationResult, Result};
use servo_bus::MotorsChain;
use servo_transport::ServoBus;
use std::thread;
use std::time::Duration;
use tracing::warn;

/// Read the arm every `period` and hand the calibrated positions to `sink`.
///
/// Runs `count` cycles, or forever when `count` is `None`. Motors that miss a
/// cycle show up as `None`; only configuration errors end the loop early.
/// Returns the number of cycles run.
pub fn verify<B, F>(
    chain: &mut MotorsChain<B>,
    result: &CalibrationResult,
    period: Duration,
    count: Option<usize>,
    mut sink: F,
) -> Result<usize>
where
    B: ServoBus,
    F: FnMut(&[Option<i32>]),
{
    let mut cycles = 0usize;
    while count.map_or(true, |n| cycles < n) {
        if cycles > 0 && !period.is_zero() {
            thread::sleep(period);
        }
        let raw = chain.sync_read_position(&result.motor_ids)?;
        let positions = result.apply(&raw);
        if positions.iter().any(Option::is_none) {
            warn!(positions = ?positions, "incomplete reading");
        }
        sink(&positions);
        cycles += 1;
    }
    Ok(cycles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use servo_bus::ControlTables;
    use servo_transport::MockBus;
    use time::OffsetDateTime;

    #[test]
    fn test_verify_survives_dropped_cycle() {
        let bus = MockBus::with_devices("mock0", &[1, 2]);
        let handle = bus.handle();
        handle.set_value(1, 132, 4, 2048);
        handle.set_value(2, 132, 4, 1024);
        let mut chain = MotorsChain::new(
            bus,
            "mock0",
            [(1u8, "xl330-m288"), (2u8, "xl330-m288")],
            &ControlTables::builtin(),
        )
        .unwrap();
        let result = CalibrationResult {
            motor_ids: vec![1, 2],
            homing_offset: vec![-2048, 0],
            inverted: vec![false, true],
            calibrated_at: OffsetDateTime::UNIX_EPOCH,
        };

        let mut seen = Vec::new();
        handle.fail_next(1);
        let cycles = verify(&mut chain, &result, Duration::ZERO, Some(3), |p| {
            seen.push(p.to_vec())
        })
        .unwrap();
        assert_eq!(cycles, 3);
        assert_eq!(seen[0], vec![None, None]);
        assert_eq!(seen[1], vec![Some(0), Some(-1024)]);
        assert_eq!(seen[2], seen[1]);
    }

    #[test]
    fn test_verify_unknown_motor_stops() {
        let bus = MockBus::with_devices("mock0", &[1]);
        let mut chain =
            MotorsChain::new(bus, "mock0", [(1u8, "xl330-m288")], &ControlTables::builtin())
                .unwrap();
        let result = CalibrationResult {
            motor_ids: vec![1, 9],
            homing_offset: vec![0, 0],
            inverted: vec![false, false],
            calibrated_at: OffsetDateTime::UNIX_EPOCH,
        };
        assert!(verify(&mut chain, &result, Duration::ZERO, Some(1), |_| {}).is_err());
    }
}
