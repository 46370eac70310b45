//! Runtime-tunable limits for the GRBL protocol layer, following the plain
//! `Default`-impl configuration style used elsewhere in this crate.

use std::ops::RangeInclusive;

/// Pen actuator Z heights in mm. DrawCore firmware inverts the usual CNC
/// convention: a higher Z lifts the pen further *down* onto the paper, so
/// `down_mm` is normally greater than `up_mm` (§4.2 `pen_down`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PenHeights {
    pub up_mm: f64,
    pub down_mm: f64,
}

impl Default for PenHeights {
    fn default() -> Self {
        Self {
            up_mm: 0.0,
            down_mm: 5.0,
        }
    }
}

/// Machine travel and feed-rate clamps applied by `move_absolute` (§4.2).
#[derive(Clone, Debug)]
pub struct MotionLimits {
    pub x_mm: RangeInclusive<f64>,
    pub y_mm: RangeInclusive<f64>,
    pub feed_mm_per_min: RangeInclusive<f64>,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            x_mm: 0.0..=297.0,
            y_mm: -420.0..=420.0,
            feed_mm_per_min: 50.0..=2500.0,
        }
    }
}

fn clamp(value: f64, range: &RangeInclusive<f64>) -> f64 {
    value.max(*range.start()).min(*range.end())
}

impl MotionLimits {
    pub fn clamp_x(&self, x: f64) -> f64 {
        clamp(x, &self.x_mm)
    }

    pub fn clamp_y(&self, y: f64) -> f64 {
        clamp(y, &self.y_mm)
    }

    pub fn clamp_feed(&self, feed: f64) -> f64 {
        clamp(feed, &self.feed_mm_per_min)
    }
}
