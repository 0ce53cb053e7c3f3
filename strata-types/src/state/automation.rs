//! Automation point types for per-pattern parameter automation.

use serde::{Deserialize, Serialize};

/// Interpolation curve type between automation points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CurveType {
    /// Linear interpolation (default)
    Linear,
    /// Slow start, fast finish (good for volume, frequency)
    Exponential,
    /// Fast start, slow finish
    Logarithmic,
    /// Smoothstep S-curve
    SCurve,
}

impl Default for CurveType {
    fn default() -> Self {
        Self::Linear
    }
}

impl CurveType {
    /// Reshape a normalized position `t` in [0, 1].
    pub fn shape(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            CurveType::Linear => t,
            CurveType::Exponential => t * t,
            CurveType::Logarithmic => t.sqrt(),
            CurveType::SCurve => t * t * (3.0 - 2.0 * t),
        }
    }

    /// Interpolate between two values based on curve type
    pub fn interpolate(self, from: f32, to: f32, t: f32) -> f32 {
        from + (to - from) * self.shape(t)
    }
}

/// A single automation point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutomationPoint {
    /// Position in beats, relative to the pattern start
    pub time: f64,
    /// Normalized value (0.0-1.0)
    pub value: f32,
    /// Curve type to next point
    pub curve: CurveType,
}

impl AutomationPoint {
    pub fn new(time: f64, value: f32) -> Self {
        Self::with_curve(time, value, CurveType::default())
    }

    pub fn with_curve(time: f64, value: f32, curve: CurveType) -> Self {
        Self {
            time: if time.is_finite() { time.max(0.0) } else { 0.0 },
            value: if value.is_finite() { value.clamp(0.0, 1.0) } else { 0.0 },
            curve,
        }
    }
}

/// Interpolated value of a time-sorted point list at `time`.
///
/// Holds the first/last value outside the point range. Coincident points
/// resolve to the later one.
pub fn value_at(points: &[AutomationPoint], time: f64) -> Option<f32> {
    let first = points.first()?;
    let last = points.last()?;

    if time <= first.time {
        return Some(first.value);
    }
    if time >= last.time {
        return Some(last.value);
    }

    // First point strictly after `time`; the one before it brackets from below.
    let next_idx = points.partition_point(|p| p.time <= time);
    let prev = &points[next_idx - 1];
    let next = &points[next_idx];

    let span = next.time - prev.time;
    if span <= 0.0 {
        return Some(next.value);
    }
    let t = ((time - prev.time) / span) as f32;
    Some(prev.curve.interpolate(prev.value, next.value, t))
}
