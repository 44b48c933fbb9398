use crate::config::CursorConfig;
use crate::Delta;
use anyhow::{Context, Result};
use enigo::{Coordinate, Enigo, Mouse, Settings};
use tracing::{info, warn};

/// Pure cursor arithmetic: position bookkeeping, bounds clamping and the
/// movement threshold. Kept apart from the OS actuator so it can be tested
/// headlessly. Position is held as f64 so sub-pixel deltas accumulate
/// instead of being lost to rounding.
#[derive(Debug, Clone)]
pub struct CursorState {
    x: f64,
    y: f64,
    screen_width: i32,
    screen_height: i32,
    margin: i32,
    threshold: f64,
}

impl CursorState {
    pub fn new(start: (i32, i32), screen: (i32, i32), margin: i32, threshold: f64) -> Self {
        let mut state = Self {
            x: start.0 as f64,
            y: start.1 as f64,
            screen_width: screen.0,
            screen_height: screen.1,
            margin,
            threshold,
        };
        state.x = clamp_axis(state.x, state.screen_width, state.margin);
        state.y = clamp_axis(state.y, state.screen_height, state.margin);
        state
    }

    /// Adds a smoothed delta, clamped to the screen. Returns the new pixel
    /// position, or `None` when both components sit below the threshold and
    /// no move should reach the OS.
    pub fn apply(&mut self, delta: Delta) -> Option<(i32, i32)> {
        if delta.dx.abs() <= self.threshold && delta.dy.abs() <= self.threshold {
            return None;
        }
        self.x = clamp_axis(self.x + delta.dx, self.screen_width, self.margin);
        self.y = clamp_axis(self.y + delta.dy, self.screen_height, self.margin);
        Some(self.position())
    }

    pub fn position(&self) -> (i32, i32) {
        (self.x.round() as i32, self.y.round() as i32)
    }
}

fn clamp_axis(value: f64, extent: i32, margin: i32) -> f64 {
    // a margin wider than the screen would invert the range; ignore it
    let margin = if 2 * margin >= extent { 0 } else { margin };
    value.clamp(margin as f64, (extent - 1 - margin) as f64)
}

/// Moves the real OS pointer. Reads screen size and the starting pointer
/// position once at construction; afterwards position state is mutated
/// incrementally and failures to move are logged per frame, never fatal.
pub struct CursorController {
    enigo: Enigo,
    state: CursorState,
    screen: (i32, i32),
    enabled: bool,
}

impl CursorController {
    pub fn new(config: &CursorConfig) -> Result<Self> {
        let enigo =
            Enigo::new(&Settings::default()).context("Failed to initialize input backend")?;
        let screen = enigo.main_display().context("Failed to query screen size")?;
        let start = match enigo.location() {
            Ok(position) => position,
            Err(error) => {
                warn!("Failed to read cursor position: {error}, starting from screen center");
                (screen.0 / 2, screen.1 / 2)
            }
        };
        info!(
            "Cursor controller initialized: screen {}x{}, margin {}",
            screen.0, screen.1, config.boundary_margin
        );
        Ok(Self {
            enigo,
            state: CursorState::new(
                start,
                screen,
                config.boundary_margin,
                config.movement_threshold,
            ),
            screen,
            enabled: config.enabled,
        })
    }

    /// Applies a screen-space delta. Returns the (possibly unchanged)
    /// cursor position.
    pub fn apply(&mut self, delta: Delta) -> (i32, i32) {
        let Some((x, y)) = self.state.apply(delta) else {
            return self.state.position();
        };
        if self.enabled {
            if let Err(error) = self.enigo.move_mouse(x, y, Coordinate::Abs) {
                warn!("Cursor move failed: {error}");
            }
        }
        (x, y)
    }

    pub fn position(&self) -> (i32, i32) {
        self.state.position()
    }

    pub fn screen_dimensions(&self) -> (i32, i32) {
        self.screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCREEN: (i32, i32) = (1920, 1080);

    fn state(margin: i32, threshold: f64) -> CursorState {
        CursorState::new((960, 540), SCREEN, margin, threshold)
    }

    #[test]
    fn moves_by_delta() {
        let mut cursor = state(0, 0.0);
        let position = cursor.apply(Delta { dx: 5.0, dy: -3.0 });
        assert_eq!(position, Some((965, 537)));
    }

    #[test]
    fn never_leaves_screen_bounds() {
        let mut cursor = state(0, 0.0);
        cursor.apply(Delta {
            dx: 100_000.0,
            dy: 100_000.0,
        });
        assert_eq!(cursor.position(), (1919, 1079));

        cursor.apply(Delta {
            dx: -200_000.0,
            dy: -200_000.0,
        });
        assert_eq!(cursor.position(), (0, 0));
    }

    #[test]
    fn margin_shrinks_the_usable_area() {
        let mut cursor = state(50, 0.0);
        cursor.apply(Delta {
            dx: 100_000.0,
            dy: -100_000.0,
        });
        assert_eq!(cursor.position(), (1869, 50));
    }

    #[test]
    fn start_position_is_clamped() {
        let cursor = CursorState::new((5000, -20), SCREEN, 0, 0.0);
        assert_eq!(cursor.position(), (1919, 0));
    }

    #[test]
    fn below_threshold_is_suppressed() {
        let mut cursor = state(0, 0.5);
        assert_eq!(cursor.apply(Delta { dx: 0.3, dy: -0.4 }), None);
        assert_eq!(cursor.position(), (960, 540));
    }

    #[test]
    fn one_axis_above_threshold_moves() {
        let mut cursor = state(0, 0.5);
        assert!(cursor.apply(Delta { dx: 0.1, dy: 2.0 }).is_some());
    }

    #[test]
    fn fractional_deltas_accumulate() {
        let mut cursor = state(0, 0.0);
        for _ in 0..10 {
            cursor.apply(Delta { dx: 0.6, dy: 0.0 });
        }
        assert_eq!(cursor.position(), (966, 540));
    }

    #[test]
    fn oversized_margin_is_ignored() {
        let mut cursor = CursorState::new((10, 10), (20, 20), 50, 0.0);
        cursor.apply(Delta { dx: 100.0, dy: 100.0 });
        assert_eq!(cursor.position(), (19, 19));
    }
}
