use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

/// Application configuration, loaded from a TOML file once at startup and
/// immutable afterwards. Every section has defaults so a partial file works.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub tracking: TrackingConfig,
    pub optical_flow: OpticalFlowConfig,
    pub color_tracking: ColorTrackingConfig,
    pub smoothing: SmoothingConfig,
    pub cursor: CursorConfig,
    pub display: DisplayConfig,
    pub recording: RecordingConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Missing file falls back to defaults. A file that exists but does not
    /// parse or validate is a hard error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            warn!("Config file not found: {}, using defaults", path.display());
            Ok(Config::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width <= 0 || self.camera.height <= 0 {
            anyhow::bail!(
                "Camera resolution must be positive, got {}x{}",
                self.camera.width,
                self.camera.height
            );
        }
        if self.camera.fps <= 0 {
            anyhow::bail!("Camera fps must be positive, got {}", self.camera.fps);
        }

        if self.tracking.sensitivity <= 0.0 {
            anyhow::bail!(
                "Sensitivity must be positive, got {}",
                self.tracking.sensitivity
            );
        }
        if self.tracking.min_tracked_points == 0 {
            anyhow::bail!("min_tracked_points must be at least 1");
        }

        let alpha = self.smoothing.alpha;
        if !(alpha > 0.0 && alpha <= 1.0) {
            anyhow::bail!("Smoothing alpha must be in (0, 1], got {}", alpha);
        }
        if self.smoothing.process_noise <= 0.0 || self.smoothing.measurement_noise <= 0.0 {
            anyhow::bail!("Kalman noise parameters must be positive");
        }

        let flow = &self.optical_flow;
        if flow.max_corners < 1 {
            anyhow::bail!("max_corners must be at least 1, got {}", flow.max_corners);
        }
        if !(flow.quality_level > 0.0 && flow.quality_level <= 1.0) {
            anyhow::bail!(
                "quality_level must be in (0, 1], got {}",
                flow.quality_level
            );
        }
        if flow.min_distance <= 0.0 {
            anyhow::bail!("min_distance must be positive, got {}", flow.min_distance);
        }
        if flow.block_size < 1 || flow.win_size < 3 || flow.max_level < 0 {
            anyhow::bail!("Invalid optical flow window parameters");
        }
        if !(0.0..=1.0).contains(&flow.min_success_rate) {
            anyhow::bail!(
                "min_success_rate must be in [0, 1], got {}",
                flow.min_success_rate
            );
        }
        if flow.max_track_error <= 0.0 {
            anyhow::bail!(
                "max_track_error must be positive, got {}",
                flow.max_track_error
            );
        }

        let color = &self.color_tracking;
        for i in 0..3 {
            if color.lower_hsv[i] > color.upper_hsv[i] {
                anyhow::bail!(
                    "HSV range inverted on channel {}: {} > {}",
                    i,
                    color.lower_hsv[i],
                    color.upper_hsv[i]
                );
            }
        }
        if color.min_area < 0.0 {
            anyhow::bail!("min_area must not be negative, got {}", color.min_area);
        }

        if self.cursor.boundary_margin < 0 {
            anyhow::bail!(
                "boundary_margin must not be negative, got {}",
                self.cursor.boundary_margin
            );
        }
        if self.cursor.movement_threshold < 0.0 {
            anyhow::bail!(
                "movement_threshold must not be negative, got {}",
                self.cursor.movement_threshold
            );
        }

        if self.recording.enabled && self.recording.fps <= 0.0 {
            anyhow::bail!("Recording fps must be positive, got {}", self.recording.fps);
        }

        Ok(())
    }
}

/// Camera source: a local device index or a stream URL.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum VideoSource {
    Index(i32),
    Url(String),
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Index(index) => write!(f, "device {}", index),
            VideoSource::Url(url) => write!(f, "{}", url),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub source: VideoSource,
    pub width: i32,
    pub height: i32,
    pub fps: i32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            source: VideoSource::Index(0),
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMethod {
    OpticalFlow,
    ColorTracking,
}

/// How per-point deltas are collapsed into one displacement. Median is the
/// outlier-resistant option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Mean,
    Median,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub method: TrackingMethod,
    pub sensitivity: f64,
    /// Flip the horizontal axis of mapped deltas. Off by default: a surface
    /// moving right under the camera should move the cursor right.
    pub invert_x: bool,
    /// Flip the vertical axis. Camera rows and screen rows both grow
    /// downward, so this stays off unless the camera is mounted upside down.
    pub invert_y: bool,
    pub aggregation: Aggregation,
    /// Hard floor for optical flow: fewer valid points than this yields a
    /// zero displacement and triggers re-detection.
    pub min_tracked_points: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            method: TrackingMethod::OpticalFlow,
            sensitivity: 1.0,
            invert_x: false,
            invert_y: false,
            aggregation: Aggregation::Mean,
            min_tracked_points: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpticalFlowConfig {
    pub max_corners: i32,
    pub quality_level: f64,
    pub min_distance: f64,
    pub block_size: i32,
    pub win_size: i32,
    pub max_level: i32,
    /// Tracked fraction below which the point set is refreshed.
    pub min_success_rate: f64,
    /// Mean LK error above which the point set is refreshed.
    pub max_track_error: f64,
}

impl Default for OpticalFlowConfig {
    fn default() -> Self {
        Self {
            max_corners: 100,
            quality_level: 0.3,
            min_distance: 7.0,
            block_size: 7,
            win_size: 15,
            max_level: 2,
            min_success_rate: 0.5,
            max_track_error: 50.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColorTrackingConfig {
    pub lower_hsv: [u8; 3],
    pub upper_hsv: [u8; 3],
    /// Blobs smaller than this many pixels are treated as no detection.
    pub min_area: f64,
}

impl Default for ColorTrackingConfig {
    fn default() -> Self {
        // green
        Self {
            lower_hsv: [35, 50, 50],
            upper_hsv: [85, 255, 255],
            min_area: 100.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    Ema,
    Kalman,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    pub filter: FilterKind,
    pub alpha: f64,
    pub process_noise: f64,
    pub measurement_noise: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            filter: FilterKind::Ema,
            alpha: 0.3,
            process_noise: 0.05,
            measurement_noise: 4.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
    /// Keep the cursor this many pixels away from every screen edge.
    pub boundary_margin: i32,
    /// Smoothed deltas with both components below this are not sent to the
    /// OS, so jitter does not flood the input queue.
    pub movement_threshold: f64,
    /// When false the pipeline runs without touching the pointer.
    pub enabled: bool,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            boundary_margin: 50,
            movement_threshold: 0.5,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_camera: bool,
    pub show_desktop: bool,
    pub window_width: i32,
    pub window_height: i32,
    pub fps_display: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_camera: true,
            show_desktop: true,
            window_width: 800,
            window_height: 600,
            fps_display: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub enabled: bool,
    pub output_file: String,
    pub fps: f64,
    pub trail_length: usize,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_file: "optical_mouse_demo.mp4".to_string(),
            fps: 20.0,
            trail_length: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn alpha_zero_rejected() {
        let mut config = Config::default();
        config.smoothing.alpha = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn alpha_above_one_rejected() {
        let mut config = Config::default();
        config.smoothing.alpha = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn alpha_one_accepted() {
        let mut config = Config::default();
        config.smoothing.alpha = 1.0;
        config.validate().unwrap();
    }

    #[test]
    fn negative_sensitivity_rejected() {
        let mut config = Config::default();
        config.tracking.sensitivity = -0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn inverted_hsv_range_rejected() {
        let mut config = Config::default();
        config.color_tracking.lower_hsv = [90, 50, 50];
        config.color_tracking.upper_hsv = [85, 255, 255];
        assert!(config.validate().is_err());
    }

    #[test]
    fn source_parses_index_and_url() {
        let config: Config = toml::from_str("[camera]\nsource = 1\n").unwrap();
        assert!(matches!(config.camera.source, VideoSource::Index(1)));

        let config: Config =
            toml::from_str("[camera]\nsource = \"http://192.168.1.5:8080/video\"\n").unwrap();
        assert!(matches!(config.camera.source, VideoSource::Url(_)));
    }

    #[test]
    fn partial_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "[tracking]\nmethod = \"color_tracking\"\nsensitivity = 2.0\n\n\
             [smoothing]\nfilter = \"kalman\"\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.tracking.method, TrackingMethod::ColorTracking);
        assert_eq!(config.tracking.sensitivity, 2.0);
        assert_eq!(config.smoothing.filter, FilterKind::Kalman);
        // untouched sections keep their defaults
        assert_eq!(config.camera.width, 640);
    }

    #[test]
    fn invalid_file_is_a_hard_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[smoothing]\nalpha = 0.0\n").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = Config::load_or_default(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.tracking.min_tracked_points, 10);
    }
}
