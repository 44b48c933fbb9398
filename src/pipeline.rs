use crate::config::Config;
use crate::cursor::CursorController;
use crate::mapper::CoordinateMapper;
use crate::smoothing::{create_filter, MotionFilter};
use crate::tracker::{MotionTracker, TrackingView};
use crate::Delta;
use anyhow::Result;
use opencv::prelude::*;
use tracing::trace;

/// Everything observers need from one loop iteration.
pub struct FrameReport {
    /// Camera-space displacement straight out of the tracker.
    pub raw_delta: Delta,
    /// Screen-space delta after mapping and smoothing.
    pub smoothed_delta: Delta,
    pub cursor: (i32, i32),
    pub reinitialized: bool,
    pub view: TrackingView,
}

/// The whole control path as one context struct: track, map, smooth, move.
/// One synchronous `process_frame` call per camera frame; no state lives
/// outside this struct.
pub struct MousePipeline {
    tracker: MotionTracker,
    mapper: CoordinateMapper,
    filter: Box<dyn MotionFilter>,
    cursor: CursorController,
}

impl MousePipeline {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            tracker: MotionTracker::new(config),
            mapper: CoordinateMapper::new(&config.tracking),
            filter: create_filter(&config.smoothing),
            cursor: CursorController::new(&config.cursor)?,
        })
    }

    pub fn process_frame(&mut self, frame: &Mat) -> Result<FrameReport> {
        let outcome = self.tracker.track(frame)?;
        if outcome.reinitialized {
            self.filter.reset();
        }

        let mapped = self.mapper.map(outcome.delta);
        let smoothed = self.filter.apply(mapped);
        let cursor = self.cursor.apply(smoothed);

        trace!(
            "raw ({:.2}, {:.2}) smoothed ({:.2}, {:.2}) cursor {:?}",
            outcome.delta.dx,
            outcome.delta.dy,
            smoothed.dx,
            smoothed.dy,
            cursor
        );

        Ok(FrameReport {
            raw_delta: outcome.delta,
            smoothed_delta: smoothed,
            cursor,
            reinitialized: outcome.reinitialized,
            view: outcome.view,
        })
    }

    pub fn cursor_position(&self) -> (i32, i32) {
        self.cursor.position()
    }

    pub fn screen_dimensions(&self) -> (i32, i32) {
        self.cursor.screen_dimensions()
    }
}
