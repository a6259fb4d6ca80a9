//! # Animated Parameter Values
//!
//! Float parameters can follow an [`AnimationCurve`], color parameters a
//! [`ColorGradient`]. Both are evaluated on the core thread each time a
//! parameter set is updated.

use bsf_shared::Color;
use bytemuck::{Pod, Zeroable};

/// Wraps `t` into `[0, length)`. Returns 0 for a non-positive length.
#[must_use]
pub fn repeat(t: f32, length: f32) -> f32 {
    if length <= 0.0 {
        return 0.0;
    }
    t - (t / length).floor() * length
}

/// One key of an [`AnimationCurve`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct CurveKey {
    /// Key time.
    pub time: f32,
    /// Value at `time`.
    pub value: f32,
    /// Incoming tangent.
    pub in_tangent: f32,
    /// Outgoing tangent.
    pub out_tangent: f32,
}

impl CurveKey {
    /// A key with flat tangents.
    #[must_use]
    pub const fn new(time: f32, value: f32) -> Self {
        Self { time, value, in_tangent: 0.0, out_tangent: 0.0 }
    }

    /// A key with explicit tangents.
    #[must_use]
    pub const fn with_tangents(time: f32, value: f32, in_tangent: f32, out_tangent: f32) -> Self {
        Self { time, value, in_tangent, out_tangent }
    }
}

/// Cubic Hermite curve over sorted keys.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationCurve {
    pub(crate) keys: Vec<CurveKey>,
}

impl AnimationCurve {
    /// Creates a curve; keys are sorted by time.
    #[must_use]
    pub fn new(mut keys: Vec<CurveKey>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Keys in time order.
    #[must_use]
    pub fn keys(&self) -> &[CurveKey] {
        &self.keys
    }

    /// Time of the last key minus time of the first.
    #[must_use]
    pub fn length(&self) -> f32 {
        match (self.keys.first(), self.keys.last()) {
            (Some(first), Some(last)) => last.time - first.time,
            _ => 0.0,
        }
    }

    /// Value at `t`. With `wrap`, `t` repeats over the curve's range;
    /// otherwise it clamps to the end keys.
    #[must_use]
    pub fn evaluate(&self, t: f32, wrap: bool) -> f32 {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return 0.0;
        };
        if self.keys.len() == 1 {
            return first.value;
        }

        let t = if wrap { first.time + repeat(t - first.time, self.length()) } else { t };
        if t <= first.time {
            return first.value;
        }
        if t >= last.time {
            return last.value;
        }

        let right = self.keys.partition_point(|key| key.time <= t);
        let a = self.keys[right - 1];
        let b = self.keys[right];

        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return a.value;
        }
        let s = (t - a.time) / span;
        let s2 = s * s;
        let s3 = s2 * s;

        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        h00 * a.value + h10 * span * a.out_tangent + h01 * b.value + h11 * span * b.in_tangent
    }
}

/// One key of a [`ColorGradient`].
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GradientKey {
    /// Color at `time`.
    pub color: Color,
    /// Key time.
    pub time: f32,
}

impl GradientKey {
    /// Creates a key.
    #[must_use]
    pub const fn new(color: Color, time: f32) -> Self {
        Self { color, time }
    }
}

/// Piecewise linear color ramp.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ColorGradient {
    pub(crate) keys: Vec<GradientKey>,
    pub(crate) duration: f32,
}

impl ColorGradient {
    /// Creates a gradient lasting `duration` seconds; keys are sorted by time.
    #[must_use]
    pub fn new(mut keys: Vec<GradientKey>, duration: f32) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys, duration }
    }

    /// Keys in time order.
    #[must_use]
    pub fn keys(&self) -> &[GradientKey] {
        &self.keys
    }

    /// Length of one cycle.
    #[must_use]
    pub const fn duration(&self) -> f32 {
        self.duration
    }

    /// Color at `t`, clamped to the end keys.
    #[must_use]
    pub fn evaluate(&self, t: f32) -> Color {
        let (Some(first), Some(last)) = (self.keys.first(), self.keys.last()) else {
            return Color::WHITE;
        };
        if t <= first.time {
            return first.color;
        }
        if t >= last.time {
            return last.color;
        }

        let right = self.keys.partition_point(|key| key.time <= t);
        let a = self.keys[right - 1];
        let b = self.keys[right];
        let span = b.time - a.time;
        if span <= f32::EPSILON {
            return a.color;
        }
        a.color.lerp(b.color, (t - a.time) / span)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeat_wraps_negative_time() {
        assert!((repeat(2.5, 2.0) - 0.5).abs() < 1e-6);
        assert!((repeat(-0.5, 2.0) - 1.5).abs() < 1e-6);
        assert_eq!(repeat(3.0, 0.0), 0.0);
    }

    #[test]
    fn test_curve_hits_keys_and_interpolates() {
        let curve = AnimationCurve::new(vec![CurveKey::new(1.0, 10.0), CurveKey::new(0.0, 0.0)]);
        assert_eq!(curve.evaluate(0.0, false), 0.0);
        assert_eq!(curve.evaluate(1.0, false), 10.0);
        // flat tangents: smoothstep, midpoint is exact
        assert!((curve.evaluate(0.5, false) - 5.0).abs() < 1e-5);
        assert_eq!(curve.evaluate(7.0, false), 10.0);
        assert!((curve.evaluate(1.5, true) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_curve_is_zero() {
        assert_eq!(AnimationCurve::default().evaluate(3.0, true), 0.0);
    }

    #[test]
    fn test_gradient_lerps_between_keys() {
        let gradient = ColorGradient::new(
            vec![GradientKey::new(Color::BLACK, 0.0), GradientKey::new(Color::WHITE, 1.0)],
            1.0,
        );
        let mid = gradient.evaluate(0.5);
        assert!((mid.r - 0.5).abs() < 1e-6);
        assert_eq!(mid.a, 1.0);
        assert_eq!(gradient.evaluate(2.0), Color::WHITE);
    }
}
