use crate::config::{DisplayConfig, RecordingConfig};
use crate::pipeline::FrameReport;
use crate::tracker::TrackingView;
use anyhow::{Context, Result};
use opencv::core::{Point, Rect, Scalar, Size, Vector};
use opencv::prelude::*;
use opencv::{core, highgui, imgproc, videoio};
use std::collections::VecDeque;
use tracing::{info, warn};

const CAMERA_WINDOW: &str = "Camera Feed - Optical Mouse";
const DESKTOP_WINDOW: &str = "Desktop View - Optical Mouse";
const DEMO_WINDOW: &str = "Optical Mouse Demo - Recording";

/// Centroid trail length for the color-tracking overlay.
const TRAIL_LIMIT: usize = 20;

/// Debug visualization. Strictly an observer: it reads per-frame reports
/// and never feeds anything back into the control path.
pub struct DisplayManager {
    config: DisplayConfig,
    trail: VecDeque<(i32, i32)>,
}

impl DisplayManager {
    pub fn new(config: &DisplayConfig) -> Result<Self> {
        if config.show_camera {
            highgui::named_window(CAMERA_WINDOW, highgui::WINDOW_NORMAL)?;
            highgui::resize_window(CAMERA_WINDOW, config.window_width, config.window_height)?;
            highgui::move_window(CAMERA_WINDOW, 50, 50)?;
        }
        if config.show_desktop {
            highgui::named_window(DESKTOP_WINDOW, highgui::WINDOW_NORMAL)?;
            highgui::resize_window(DESKTOP_WINDOW, config.window_width, config.window_height)?;
            highgui::move_window(DESKTOP_WINDOW, config.window_width + 100, 50)?;
        }
        info!("Display windows created");
        Ok(Self {
            config: config.clone(),
            trail: VecDeque::new(),
        })
    }

    /// Camera feed with tracking overlays and the metrics panel.
    pub fn render_camera(
        &mut self,
        frame: &Mat,
        report: &FrameReport,
        fps: f64,
        latency_ms: f64,
    ) -> Result<Mat> {
        let mut debug_frame = frame.clone();

        match &report.view {
            TrackingView::Points(points) => {
                for point in points {
                    let center = Point {
                        x: point.x as i32,
                        y: point.y as i32,
                    };
                    imgproc::circle_def(&mut debug_frame, center, 5, (0, 255, 0).into())?;
                }
            }
            TrackingView::Centroid(Some((cx, cy))) => {
                let center = Point::new(*cx as i32, *cy as i32);
                self.trail.push_back((center.x, center.y));
                if self.trail.len() > TRAIL_LIMIT {
                    self.trail.pop_front();
                }
                imgproc::circle(
                    &mut debug_frame,
                    center,
                    10,
                    (255, 0, 255).into(),
                    imgproc::FILLED,
                    imgproc::LINE_8,
                    0,
                )?;
                imgproc::circle_def(&mut debug_frame, center, 20, (255, 0, 255).into())?;
                draw_crosshair(&mut debug_frame, center, 15, (255, 0, 255).into())?;

                if self.trail.len() > 1 {
                    let mut trail_points: Vector<Point> = Vector::new();
                    for (x, y) in &self.trail {
                        trail_points.push(Point::new(*x, *y));
                    }
                    imgproc::polylines(
                        &mut debug_frame,
                        &trail_points,
                        false,
                        (0, 255, 255).into(),
                        2,
                        imgproc::LINE_8,
                        0,
                    )?;
                }
            }
            TrackingView::Centroid(None) => {}
        }

        if self.config.fps_display {
            draw_metrics(&mut debug_frame, fps, report.view.point_count(), latency_ms)?;
        }

        Ok(debug_frame)
    }

    /// Desktop capture with the cursor highlighted, or `None` when the
    /// desktop window is disabled. Capture failures degrade to a black frame.
    pub fn desktop_view(&self, cursor: (i32, i32), screen: (i32, i32)) -> Result<Option<Mat>> {
        if !self.config.show_desktop {
            return Ok(None);
        }
        let mut desktop = match capture_primary_monitor() {
            Ok(frame) => frame,
            Err(error) => {
                warn!("Screen capture failed: {error:#}");
                Mat::zeros(
                    self.config.window_height,
                    self.config.window_width,
                    core::CV_8UC3,
                )?
                .to_mat()?
            }
        };

        // captures can be larger than the logical screen on HiDPI displays
        let size = desktop.size()?;
        if size.width > 0 && screen.0 > 0 && screen.1 > 0 {
            let x = (cursor.0 as f64 * size.width as f64 / screen.0 as f64) as i32;
            let y = (cursor.1 as f64 * size.height as f64 / screen.1 as f64) as i32;
            draw_cursor_highlight(&mut desktop, Point::new(x, y))?;
        }

        let mut resized = Mat::default();
        imgproc::resize_def(
            &desktop,
            &mut resized,
            Size::new(self.config.window_width, self.config.window_height),
        )?;
        Ok(Some(resized))
    }

    pub fn show(&self, camera_frame: &Mat, desktop_frame: Option<&Mat>) -> Result<()> {
        if self.config.show_camera {
            highgui::imshow(CAMERA_WINDOW, camera_frame)?;
        }
        if let Some(desktop_frame) = desktop_frame {
            highgui::imshow(DESKTOP_WINDOW, desktop_frame)?;
        }
        Ok(())
    }

    pub fn show_demo(&self, demo_frame: &Mat) -> Result<()> {
        highgui::imshow(DEMO_WINDOW, demo_frame)?;
        Ok(())
    }

    pub fn exit_requested(&self) -> Result<bool> {
        let key = highgui::poll_key()?;
        Ok(key == 27 || key == i32::from(b'q'))
    }

    pub fn close(&self) -> Result<()> {
        highgui::destroy_all_windows()?;
        Ok(())
    }
}

fn draw_metrics(frame: &mut Mat, fps: f64, points: usize, latency_ms: f64) -> Result<()> {
    let mut overlay = frame.clone();
    imgproc::rectangle(
        &mut overlay,
        Rect::new(10, 10, 240, 90),
        (0, 0, 0).into(),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;
    let mut blended = Mat::default();
    core::add_weighted_def(&overlay, 0.6, &*frame, 0.4, 0.0, &mut blended)?;
    *frame = blended;

    let lines = [
        format!("FPS: {:.1}", fps),
        format!("Points: {}", points),
        format!("Latency: {:.1}ms", latency_ms),
    ];
    let mut y = 35;
    for line in &lines {
        imgproc::put_text(
            frame,
            line,
            Point::new(20, y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            0.6,
            (0, 255, 0).into(),
            2,
            imgproc::LINE_8,
            false,
        )?;
        y += 25;
    }
    Ok(())
}

fn draw_cursor_highlight(frame: &mut Mat, center: Point) -> Result<()> {
    let size = frame.size()?;
    if center.x < 0 || center.y < 0 || center.x >= size.width || center.y >= size.height {
        return Ok(());
    }
    draw_crosshair(frame, center, 20, (0, 0, 255).into())?;
    imgproc::circle(frame, center, 15, (0, 0, 255).into(), 2, imgproc::LINE_8, 0)?;
    imgproc::circle_def(frame, center, 25, (0, 255, 255).into())?;
    Ok(())
}

fn draw_crosshair(frame: &mut Mat, center: Point, arm: i32, color: Scalar) -> Result<()> {
    imgproc::line(
        frame,
        Point::new(center.x - arm, center.y),
        Point::new(center.x + arm, center.y),
        color,
        2,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::line(
        frame,
        Point::new(center.x, center.y - arm),
        Point::new(center.x, center.y + arm),
        color,
        2,
        imgproc::LINE_8,
        0,
    )?;
    Ok(())
}

fn capture_primary_monitor() -> Result<Mat> {
    let monitors = xcap::Monitor::all().context("Failed to enumerate monitors")?;
    let monitor = monitors
        .iter()
        .find(|monitor| monitor.is_primary())
        .or_else(|| monitors.first())
        .context("No monitor available")?;
    let image = monitor
        .capture_image()
        .context("Failed to capture monitor")?;
    let height = image.height() as i32;
    let data = image.into_raw();

    let flat = Mat::from_slice(&data)?;
    let rgba = flat.reshape(4, height)?;
    let mut bgr = Mat::default();
    imgproc::cvt_color_def(&rgba, &mut bgr, imgproc::COLOR_RGBA2BGR)?;
    Ok(bgr)
}

/// Writes a side-by-side demo video: camera feed next to a black canvas
/// tracing the cursor path.
pub struct Recorder {
    writer: videoio::VideoWriter,
    canvas: Mat,
    trail: VecDeque<(i32, i32)>,
    trail_length: usize,
    width: i32,
    height: i32,
}

impl Recorder {
    pub fn new(config: &RecordingConfig, canvas_width: i32, canvas_height: i32) -> Result<Self> {
        let fourcc = videoio::VideoWriter::fourcc('m', 'p', '4', 'v')?;
        let writer = videoio::VideoWriter::new(
            &config.output_file,
            fourcc,
            config.fps,
            Size::new(canvas_width * 2, canvas_height),
            true,
        )?;
        if !writer.is_opened()? {
            anyhow::bail!("Failed to open recording output {}", config.output_file);
        }
        let canvas = Mat::zeros(canvas_height, canvas_width, core::CV_8UC3)?.to_mat()?;
        info!(
            "Recording to {} ({}x{} @ {}fps)",
            config.output_file,
            canvas_width * 2,
            canvas_height,
            config.fps
        );
        Ok(Self {
            writer,
            canvas,
            trail: VecDeque::new(),
            trail_length: config.trail_length,
            width: canvas_width,
            height: canvas_height,
        })
    }

    pub fn write_demo_frame(
        &mut self,
        camera_frame: &Mat,
        cursor: (i32, i32),
        screen: (i32, i32),
    ) -> Result<Mat> {
        let mut camera_resized = Mat::default();
        imgproc::resize_def(
            camera_frame,
            &mut camera_resized,
            Size::new(self.width, self.height),
        )?;

        self.draw_cursor_on_canvas(cursor, screen)?;
        let mut canvas = self.canvas.clone();

        label(&mut camera_resized, "Camera Feed + Tracking", (0, 255, 0).into())?;
        label(&mut canvas, "Cursor Movement", (0, 255, 255).into())?;
        imgproc::circle(
            &mut camera_resized,
            Point::new(self.width - 30, 25),
            8,
            (0, 0, 255).into(),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;

        let mut combined = Mat::default();
        core::hconcat2(&camera_resized, &canvas, &mut combined)?;
        self.writer.write(&combined)?;
        Ok(combined)
    }

    fn draw_cursor_on_canvas(&mut self, cursor: (i32, i32), screen: (i32, i32)) -> Result<()> {
        let x = (cursor.0 as f64 / screen.0.max(1) as f64 * self.width as f64) as i32;
        let y = (cursor.1 as f64 / screen.1.max(1) as f64 * self.height as f64) as i32;
        self.trail.push_back((x, y));
        if self.trail.len() > self.trail_length {
            self.trail.pop_front();
        }

        // fade previous strokes so the trail decays
        let mut faded = Mat::default();
        core::add_weighted_def(&self.canvas, 0.95, &self.canvas, 0.0, 0.0, &mut faded)?;
        self.canvas = faded;

        for i in 1..self.trail.len() {
            let (x1, y1) = self.trail[i - 1];
            let (x2, y2) = self.trail[i];
            let intensity = (255 * i / self.trail.len()) as i32;
            let thickness = ((3 * i) / self.trail.len()).max(1) as i32;
            imgproc::line(
                &mut self.canvas,
                Point::new(x1, y1),
                Point::new(x2, y2),
                (255 - intensity, intensity, 255).into(),
                thickness,
                imgproc::LINE_8,
                0,
            )?;
        }

        if x >= 0 && x < self.width && y >= 0 && y < self.height {
            let center = Point::new(x, y);
            imgproc::circle(
                &mut self.canvas,
                center,
                10,
                (0, 255, 255).into(),
                imgproc::FILLED,
                imgproc::LINE_8,
                0,
            )?;
            imgproc::circle(
                &mut self.canvas,
                center,
                15,
                (255, 255, 255).into(),
                2,
                imgproc::LINE_8,
                0,
            )?;
            draw_crosshair(&mut self.canvas, center, 20, (255, 255, 255).into())?;
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        self.writer.release()?;
        info!("Recording stopped and saved");
        Ok(())
    }
}

fn label(frame: &mut Mat, text: &str, color: Scalar) -> Result<()> {
    let width = frame.size()?.width;
    imgproc::rectangle(
        frame,
        Rect::new(5, 5, width - 10, 40),
        (0, 0, 0).into(),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )?;
    imgproc::put_text(
        frame,
        text,
        Point::new(10, 30),
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.7,
        color,
        2,
        imgproc::LINE_8,
        false,
    )?;
    Ok(())
}
