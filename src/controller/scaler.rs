//! Axis scaling from the sensor's native range into the device range.

use serde::{Deserialize, Serialize};

/// Closed signed range of an axis, `min < 0 < max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisDomain {
    pub min: i16,
    pub max: i16,
}

impl AxisDomain {
    pub const fn new(min: i16, max: i16) -> Self {
        Self { min, max }
    }

    /// Both halves must be non-empty for sign-split scaling.
    pub fn is_valid(&self) -> bool {
        self.min < 0 && self.max > 0
    }
}

/// Scale `raw` from `[src_min, src_max]` to `[dst_min, dst_max]`.
///
/// Positive and negative values are scaled separately against their own
/// half-range, so asymmetric ranges keep zero at zero. The result saturates
/// at the destination bounds.
pub fn scale(raw: i16, src_min: i16, src_max: i16, dst_min: i16, dst_max: i16) -> i16 {
    let raw = i32::from(raw);
    let (src_min, src_max) = (i32::from(src_min), i32::from(src_max));
    let (dst_min, dst_max) = (i32::from(dst_min), i32::from(dst_max));

    // i16 * i16 always fits in i32
    let scaled = if raw > 0 {
        if src_max > 0 {
            raw * dst_max / src_max
        } else {
            dst_max
        }
    } else if raw < 0 {
        if src_min < 0 {
            raw * dst_min / src_min
        } else {
            dst_min
        }
    } else {
        0
    };

    if scaled > dst_max {
        dst_max as i16
    } else if scaled < dst_min {
        dst_min as i16
    } else {
        scaled as i16
    }
}

/// Fixed source and device domains for every axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisScaler {
    pub source: AxisDomain,
    pub device: AxisDomain,
}

impl AxisScaler {
    pub const fn new(source: AxisDomain, device: AxisDomain) -> Self {
        Self { source, device }
    }

    pub fn scale(&self, raw: i16) -> i16 {
        scale(
            raw,
            self.source.min,
            self.source.max,
            self.device.min,
            self.device.max,
        )
    }
}
