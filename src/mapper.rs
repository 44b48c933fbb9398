use crate::config::TrackingConfig;
use crate::Delta;

/// Maps camera-space displacements to screen-space deltas: a scalar
/// sensitivity multiplier plus optional axis flips.
///
/// Both OpenCV frames and screen coordinates put the origin top-left with y
/// growing downward, so no flip happens by default; `invert_x`/`invert_y`
/// cover mirrored or upside-down camera mounts.
#[derive(Debug, Clone, Copy)]
pub struct CoordinateMapper {
    sensitivity: f64,
    invert_x: bool,
    invert_y: bool,
}

impl CoordinateMapper {
    pub fn new(tracking: &TrackingConfig) -> Self {
        Self {
            sensitivity: tracking.sensitivity,
            invert_x: tracking.invert_x,
            invert_y: tracking.invert_y,
        }
    }

    pub fn map(&self, delta: Delta) -> Delta {
        let sx = if self.invert_x {
            -self.sensitivity
        } else {
            self.sensitivity
        };
        let sy = if self.invert_y {
            -self.sensitivity
        } else {
            self.sensitivity
        };
        Delta {
            dx: delta.dx * sx,
            dy: delta.dy * sy,
        }
    }
}
