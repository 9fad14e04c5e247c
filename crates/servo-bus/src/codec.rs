//! Conversions between raw register values and signed joint positions.
//!
//! The bus transports 32-bit positions as unsigned integers; the application
//! works in two's-complement. Every function here maps element-wise over a
//! slice where any element may be `None` (no reading for that motor), and
//! `None` always comes back out at the same position.
//!
//! Offsets and inversion flags are generic over `Into<Option<_>>`, so both
//! plain calibration values (`&[i32]`, `&[bool]`) and partially known ones
//! (`&[Option<i32>]`) are accepted. A missing offset or flag makes that
//! element `None` as well.

/// Raw values above `i32::MAX` wrap to negative.
pub fn unsigned_to_signed(value: u32) -> i32 {
    value as i32
}

/// Negative values wrap into the upper half of the unsigned range.
pub fn signed_to_unsigned(value: i32) -> u32 {
    value as u32
}

pub fn to_signed(values: &[Option<u32>]) -> Vec<Option<i32>> {
    values.iter().map(|v| v.map(unsigned_to_signed)).collect()
}

pub fn to_unsigned(values: &[Option<i32>]) -> Vec<Option<u32>> {
    values.iter().map(|v| v.map(signed_to_unsigned)).collect()
}

fn nth<T, O>(items: &[O], i: usize) -> Option<T>
where
    O: Copy + Into<Option<T>>,
{
    items.get(i).copied().and_then(Into::<Option<T>>::into)
}

/// Add each offset in signed space, wrapping modulo 2^32.
pub fn apply_homing_offset<O>(values: &[Option<u32>], offsets: &[O]) -> Vec<Option<u32>>
where
    O: Copy + Into<Option<i32>>,
{
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let value = unsigned_to_signed((*v)?);
            let offset: i32 = nth(offsets, i)?;
            Some(signed_to_unsigned(value.wrapping_add(offset)))
        })
        .collect()
}

/// Negate, in signed space, every element whose flag is set.
pub fn apply_inversion<F>(values: &[Option<u32>], inverted: &[F]) -> Vec<Option<u32>>
where
    F: Copy + Into<Option<bool>>,
{
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let value = unsigned_to_signed((*v)?);
            let flip: bool = nth(inverted, i)?;
            let value = if flip { value.wrapping_neg() } else { value };
            Some(signed_to_unsigned(value))
        })
        .collect()
}

/// Inversion first, then the homing offset. Calibration depends on this order.
pub fn apply_configuration<O, F>(
    values: &[Option<u32>],
    offsets: &[O],
    inverted: &[F],
) -> Vec<Option<u32>>
where
    O: Copy + Into<Option<i32>>,
    F: Copy + Into<Option<bool>>,
{
    apply_homing_offset(&apply_inversion(values, inverted), offsets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundaries() {
        assert_eq!(unsigned_to_signed(2_147_483_647), 2_147_483_647);
        assert_eq!(unsigned_to_signed(2_147_483_648), -2_147_483_648);
        assert_eq!(signed_to_unsigned(-1), 4_294_967_295);
        assert_eq!(unsigned_to_signed(u32::MAX), -1);
    }

    #[test]
    fn test_unsigned_roundtrip() {
        for x in [0u32, 1, 1024, 2_147_483_647, 2_147_483_648, 3_000_000_000, u32::MAX] {
            assert_eq!(signed_to_unsigned(unsigned_to_signed(x)), x);
        }
    }

    #[test]
    fn test_homing_offset_adds_in_signed_space() {
        let cases = [
            (0u32, -1024i32),
            (4_294_966_272, 2048),
            (2_147_483_647, 1),
            (100, -100),
        ];
        for (x, o) in cases {
            let out = apply_homing_offset(&[Some(x)], &[o])[0].unwrap();
            assert_eq!(unsigned_to_signed(out), unsigned_to_signed(x).wrapping_add(o));
        }
        assert_eq!(apply_homing_offset(&[Some(0)], &[-1024]), vec![Some(4_294_966_272)]);
    }

    #[test]
    fn test_inversion_is_self_inverse() {
        let values = vec![Some(0u32), Some(1024), Some(signed_to_unsigned(-3072)), Some(u32::MAX)];
        let flags = [true; 4];
        let twice = apply_inversion(&apply_inversion(&values, &flags), &flags);
        assert_eq!(twice, values);
        assert_eq!(
            apply_inversion(&[Some(1024)], &[true]),
            vec![Some(signed_to_unsigned(-1024))]
        );
        assert_eq!(apply_inversion(&[Some(1024)], &[false]), vec![Some(1024)]);
    }

    #[test]
    fn test_absent_propagates() {
        let values = vec![Some(10u32), None, Some(30)];
        assert_eq!(to_signed(&values), vec![Some(10), None, Some(30)]);
        assert_eq!(
            apply_homing_offset(&values, &[1, 2, 3]),
            vec![Some(11), None, Some(33)]
        );
        assert_eq!(
            apply_inversion(&values, &[false, true, false]),
            vec![Some(10), None, Some(30)]
        );
        assert_eq!(
            apply_configuration(&values, &[0, 0, 0], &[false, false, true]),
            vec![Some(10), None, Some(signed_to_unsigned(-30))]
        );
    }

    #[test]
    fn test_absent_offset_or_flag_yields_absent() {
        let values = [Some(5u32), Some(6)];
        assert_eq!(
            apply_homing_offset(&values, &[Some(1), None]),
            vec![Some(6), None]
        );
        assert_eq!(
            apply_inversion(&values, &[None, Some(false)]),
            vec![None, Some(6)]
        );
    }

    #[test]
    fn test_configuration_inverts_before_offset() {
        // invert then offset: -100 + 1000 = 900
        // offset then invert would give -(100 + 1000) = -1100
        let out = apply_configuration(&[Some(100)], &[1000], &[true]);
        assert_eq!(to_signed(&out), vec![Some(900)]);
        let swapped = apply_inversion(&apply_homing_offset(&[Some(100)], &[1000]), &[true]);
        assert_eq!(to_signed(&swapped), vec![Some(-1100)]);
    }
}
