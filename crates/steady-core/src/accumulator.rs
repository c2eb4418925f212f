//! Fractional carry-over between ticks.
//!
//! Each tick adds `axis * factor` to a per-axis remainder, then emits the
//! whole part (truncated toward zero) and keeps only the fraction. Over N
//! ticks the emitted total never drifts more than one unit from the ideal
//! real-valued total, and negating the input negates the output exactly.
//! A tick never releases more than the injector can carry; the excess of
//! an oversized vector waits in the remainder.

use crate::constants::{MAX_POINTER_STEP, MAX_SCROLL_STEP, SNAP_EPSILON};
use crate::profile::Profile;

/// Whole units released by one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Step {
    pub dx: i64,
    pub dy: i64,
    pub dz: i64,
}

impl Step {
    pub fn has_pointer(&self) -> bool {
        self.dx != 0 || self.dy != 0
    }

    pub fn has_scroll(&self) -> bool {
        self.dz != 0
    }

    pub fn is_empty(&self) -> bool {
        !self.has_pointer() && !self.has_scroll()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Accumulator {
    x: f64,
    y: f64,
    z: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current remainders. Each is strictly inside (-1, 1) unless the vector
    /// outruns the per-tick emission limit.
    pub fn remainders(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Add one tick of `profile` scaled by `factor` and release the whole units.
    pub fn advance(&mut self, profile: &Profile, factor: f64) -> Step {
        self.x += profile.axis_x * factor;
        self.y += profile.axis_y * factor;
        self.z += profile.axis_z * factor;
        Step {
            dx: take_whole(&mut self.x, MAX_POINTER_STEP),
            dy: take_whole(&mut self.y, MAX_POINTER_STEP),
            dz: take_whole(&mut self.z, MAX_SCROLL_STEP),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Split `acc` into its whole part (returned, at most `limit` in magnitude)
/// and whatever is left behind.
fn take_whole(acc: &mut f64, limit: f64) -> i64 {
    if !acc.is_finite() {
        // a non-finite axis would poison the remainder forever
        *acc = 0.0;
        return 0;
    }
    let nearest = acc.round();
    let whole = if (*acc - nearest).abs() < SNAP_EPSILON {
        nearest
    } else {
        acc.trunc()
    };
    let whole = whole.clamp(-limit, limit);
    *acc -= whole;
    whole as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn run(profile: &Profile, factor: f64, ticks: usize) -> Vec<Step> {
        let mut acc = Accumulator::new();
        (0..ticks).map(|_| acc.advance(profile, factor)).collect()
    }

    #[test]
    fn test_negative_fraction_scenario() {
        let steps = run(&Profile::live(0.0, -0.7, 0.0), 1.0, 10);
        let dys: Vec<i64> = steps.iter().map(|s| s.dy).collect();
        assert_eq!(dys, vec![0, -1, -1, 0, -1, -1, 0, -1, -1, -1]);
        assert_eq!(dys.iter().sum::<i64>(), -7);
        assert!(steps.iter().all(|s| s.dx == 0 && s.dz == 0));
    }

    #[test]
    fn test_remainder_follows_fraction_of_total() {
        let profile = Profile::live(0.0, -0.7, 0.0);
        let mut acc = Accumulator::new();
        for k in 1..=10 {
            acc.advance(&profile, 1.0);
            let ideal = (-0.7 * k as f64).fract();
            let ideal = if ideal.abs() > 1.0 - 1e-9 { 0.0 } else { ideal };
            assert_abs_diff_eq!(acc.remainders()[1], ideal, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reduction_applied_before_rounding() {
        let steps = run(&Profile::live(0.0, -2.0, 0.0), 0.5, 2);
        assert_eq!(steps.iter().map(|s| s.dy).sum::<i64>(), -2);
    }

    #[test]
    fn test_truncates_toward_zero() {
        let mut acc = Accumulator::new();
        let step = acc.advance(&Profile::live(1.9, -1.9, 0.0), 1.0);
        assert_eq!((step.dx, step.dy), (1, -1));
        let [x, y, _] = acc.remainders();
        assert_abs_diff_eq!(x, 0.9, epsilon = 1e-12);
        assert_abs_diff_eq!(y, -0.9, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_profile_emits_nothing() {
        let steps = run(&Profile::live(0.0, 0.0, 0.0), 1.0, 50);
        assert!(steps.iter().all(Step::is_empty));
    }

    #[test]
    fn test_scroll_axis_independent() {
        let steps = run(&Profile::live(0.0, 0.0, 0.5), 1.0, 4);
        let flags: Vec<(bool, bool)> = steps
            .iter()
            .map(|s| (s.has_pointer(), s.has_scroll()))
            .collect();
        assert_eq!(
            flags,
            vec![(false, false), (false, true), (false, false), (false, true)]
        );
    }

    #[test]
    fn test_large_values_keep_remainder_bounded() {
        let mut acc = Accumulator::new();
        let step = acc.advance(&Profile::live(1.0e6 + 0.25, -3.75, 9.5), 1.0);
        assert_eq!(step, Step { dx: 1_000_000, dy: -3, dz: 9 });
        assert!(acc.remainders().iter().all(|r| r.abs() < 1.0));
    }

    #[test]
    fn test_oversized_vector_carries_excess() {
        let profile = Profile::live(3.0e9, -3.0e9, 2.0e7);
        let mut acc = Accumulator::new();
        let (mut sx, mut sy, mut sz) = (0i64, 0i64, 0i64);
        for _ in 0..3 {
            let step = acc.advance(&profile, 1.0);
            assert_eq!(step.dx, i64::from(i32::MAX));
            assert_eq!(step.dy, -i64::from(i32::MAX));
            assert!(step.dz.abs() * i64::from(crate::constants::WHEEL_DELTA) <= i64::from(i32::MAX));
            sx += step.dx;
            sy += step.dy;
            sz += step.dz;
        }
        let [x, y, z] = acc.remainders();
        assert_eq!(sx as f64 + x, 9.0e9);
        assert_eq!(sy as f64 + y, -9.0e9);
        assert_eq!(sz as f64 + z, 6.0e7);

        // the backlog drains once the vector drops
        let quiet = Profile::live(0.0, 0.0, 0.0);
        let mut drained = 0i64;
        while acc.remainders()[0] >= 1.0 {
            drained += acc.advance(&quiet, 1.0).dx;
        }
        assert_eq!(sx + drained, 9_000_000_000);
    }

    #[test]
    fn test_non_finite_axis_is_dropped() {
        let mut acc = Accumulator::new();
        let step = acc.advance(&Profile::live(f64::NAN, 1.0, 0.0), 1.0);
        assert_eq!(step, Step { dx: 0, dy: 1, dz: 0 });
        assert_eq!(acc.remainders()[0], 0.0);
    }

    #[test]
    fn test_reset() {
        let mut acc = Accumulator::new();
        acc.advance(&Profile::live(0.4, 0.4, 0.4), 1.0);
        acc.reset();
        assert_eq!(acc.remainders(), [0.0, 0.0, 0.0]);
    }
}
