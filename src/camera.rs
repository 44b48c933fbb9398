use crate::config::{CameraConfig, VideoSource};
use anyhow::Result;
use opencv::prelude::*;
use opencv::videoio;
use tracing::{info, warn};

pub struct CameraSource {
    capture: videoio::VideoCapture,
}

impl CameraSource {
    /// Opens the configured device or stream. Failing to open is fatal;
    /// per-frame read failures later are not.
    pub fn new(config: &CameraConfig) -> Result<Self> {
        info!("Opening camera source: {}", config.source);
        let mut capture = match &config.source {
            VideoSource::Index(index) => videoio::VideoCapture::new(*index, videoio::CAP_ANY)?,
            VideoSource::Url(url) => videoio::VideoCapture::from_file(url, videoio::CAP_ANY)?,
        };
        let opened = videoio::VideoCapture::is_opened(&capture)?;
        if !opened {
            anyhow::bail!("Unable to open camera source {}", config.source);
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64)?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64)?;
        capture.set(videoio::CAP_PROP_FPS, config.fps as f64)?;

        // the driver may refuse the requested mode, report what we got
        let width = capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32;
        let height = capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32;
        let fps = capture.get(videoio::CAP_PROP_FPS)? as i32;
        info!("Camera initialized: {}x{} @ {}fps", width, height, fps);

        Ok(Self { capture })
    }

    /// `Ok(None)` means a dropped frame; the caller skips the iteration.
    pub fn next_frame(&mut self) -> Result<Option<Mat>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? {
            warn!("Failed to capture frame");
            return Ok(None);
        }
        if frame.size()?.width == 0 {
            warn!("Camera produced an empty frame");
            return Ok(None);
        }
        Ok(Some(frame))
    }

    pub fn frame_dimensions(&self) -> Result<(i32, i32)> {
        Ok((
            self.capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as i32,
            self.capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as i32,
        ))
    }
}

pub fn jpeg_to_mat(data: &[u8]) -> Result<Mat> {
    let buffer = opencv::core::Vector::<u8>::from_slice(data);
    let frame = opencv::imgcodecs::imdecode(&buffer, opencv::imgcodecs::IMREAD_COLOR)?;
    if frame.size()?.width == 0 {
        anyhow::bail!("Failed to decode JPEG frame");
    }
    Ok(frame)
}

pub fn mat_to_jpeg(frame: &Mat) -> Result<Vec<u8>> {
    let mut buffer: opencv::core::Vector<u8> = Default::default();
    opencv::imgcodecs::imencode_def(".jpg", frame, &mut buffer)?;
    Ok(buffer.to_vec())
}
