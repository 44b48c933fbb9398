use thiserror::Error;

pub mod camera;
pub mod config;
pub mod cursor;
pub mod display;
pub mod mapper;
pub mod perf;
pub mod pipeline;
pub mod smoothing;
pub mod tracker;

/// 2D displacement in pixels. Camera-space coming out of the tracker,
/// screen-space after the coordinate mapper.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Delta {
    pub dx: f64,
    pub dy: f64,
}

impl Delta {
    pub const ZERO: Delta = Delta { dx: 0.0, dy: 0.0 };
}

#[derive(Error, Debug)]
pub enum ErrorWrapper {
    #[error("Zenoh error {0:?}")]
    ZenohError(#[from] zenoh::Error),
}
