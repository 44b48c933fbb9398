use crate::config::{
    Aggregation, ColorTrackingConfig, Config, OpticalFlowConfig, TrackingMethod,
};
use crate::Delta;
use anyhow::Result;
use opencv::core::{Point, Point2f, Vector};
use opencv::prelude::*;
use opencv::{core, imgproc};
use tracing::{debug, info};

/// Tracked state handed to the display layer, never fed back into the
/// control path.
pub enum TrackingView {
    Points(Vector<Point2f>),
    Centroid(Option<(f64, f64)>),
}

impl TrackingView {
    pub fn point_count(&self) -> usize {
        match self {
            TrackingView::Points(points) => points.len(),
            TrackingView::Centroid(centroid) => usize::from(centroid.is_some()),
        }
    }
}

pub struct TrackOutcome {
    /// Camera-pixel displacement since the previous frame.
    pub delta: Delta,
    /// True when tracking state was rebuilt this frame; smoothing state is
    /// reset alongside it.
    pub reinitialized: bool,
    pub view: TrackingView,
}

pub enum MotionTracker {
    Flow(FlowTracker),
    Color(ColorTracker),
}

impl MotionTracker {
    pub fn new(config: &Config) -> Self {
        match config.tracking.method {
            TrackingMethod::OpticalFlow => MotionTracker::Flow(FlowTracker::new(
                config.optical_flow.clone(),
                config.tracking.aggregation,
                config.tracking.min_tracked_points,
            )),
            TrackingMethod::ColorTracking => {
                MotionTracker::Color(ColorTracker::new(config.color_tracking.clone()))
            }
        }
    }

    pub fn track(&mut self, frame: &Mat) -> Result<TrackOutcome> {
        match self {
            MotionTracker::Flow(tracker) => tracker.track(frame),
            MotionTracker::Color(tracker) => tracker.track(frame),
        }
    }
}

pub struct FlowTracker {
    params: OpticalFlowConfig,
    aggregation: Aggregation,
    min_points: usize,
    previous_gray: Option<Mat>,
    points: Vector<Point2f>,
}

impl FlowTracker {
    pub fn new(params: OpticalFlowConfig, aggregation: Aggregation, min_points: usize) -> Self {
        Self {
            params,
            aggregation,
            min_points,
            previous_gray: None,
            points: Vector::new(),
        }
    }

    pub fn track(&mut self, frame: &Mat) -> Result<TrackOutcome> {
        let gray = convert_to_grayscale(frame)?;

        // first frame
        let Some(previous_gray) = self.previous_gray.take() else {
            self.points = detect_corners(&gray, &self.params)?;
            info!("Detected {} tracking points", self.points.len());
            self.previous_gray = Some(gray);
            return Ok(TrackOutcome {
                delta: Delta::ZERO,
                reinitialized: false,
                view: TrackingView::Points(self.points.clone()),
            });
        };

        // recovering after a full loss
        if self.points.is_empty() {
            self.points = detect_corners(&gray, &self.params)?;
            info!("Recovered {} tracking points", self.points.len());
            self.previous_gray = Some(gray);
            return Ok(TrackOutcome {
                delta: Delta::ZERO,
                reinitialized: true,
                view: TrackingView::Points(self.points.clone()),
            });
        }

        let (moved, status, errors) =
            track_points(&previous_gray, &gray, &self.points, &self.params)?;

        let total = moved.len();
        let mut displacements = Vec::new();
        let mut kept_points: Vector<Point2f> = Vector::new();
        let mut error_sum = 0.0f64;
        for i in 0..total {
            if status.get(i).unwrap_or_default() == 1 {
                let old = self.points.get(i)?;
                let new = moved.get(i)?;
                displacements.push(Delta {
                    dx: (new.x - old.x) as f64,
                    dy: (new.y - old.y) as f64,
                });
                kept_points.push(new);
                error_sum += errors.get(i)? as f64;
            }
        }
        let valid = displacements.len();

        if valid < self.min_points {
            info!("Tracking lost ({} of {} points), reinitializing", valid, total);
            self.points = detect_corners(&gray, &self.params)?;
            self.previous_gray = Some(gray);
            return Ok(TrackOutcome {
                delta: Delta::ZERO,
                reinitialized: true,
                view: TrackingView::Points(self.points.clone()),
            });
        }

        let delta = aggregate_displacement(&displacements, self.aggregation);

        // the frame's displacement stands, but a degraded set is refreshed
        let success_rate = valid as f64 / total as f64;
        let mean_error = error_sum / valid as f64;
        let reinitialized = if success_rate < self.params.min_success_rate
            || mean_error > self.params.max_track_error
        {
            debug!(
                "Tracking quality low (rate {:.2}, error {:.1}), refreshing points",
                success_rate, mean_error
            );
            self.points = detect_corners(&gray, &self.params)?;
            true
        } else {
            self.points = kept_points;
            false
        };
        self.previous_gray = Some(gray);

        Ok(TrackOutcome {
            delta,
            reinitialized,
            view: TrackingView::Points(self.points.clone()),
        })
    }
}

pub struct ColorTracker {
    params: ColorTrackingConfig,
    previous_centroid: Option<(f64, f64)>,
}

impl ColorTracker {
    pub fn new(params: ColorTrackingConfig) -> Self {
        Self {
            params,
            previous_centroid: None,
        }
    }

    pub fn track(&mut self, frame: &Mat) -> Result<TrackOutcome> {
        let centroid = detect_color_centroid(frame, &self.params)?;

        let delta = match (self.previous_centroid, centroid) {
            (Some(previous), Some(current)) => Delta {
                dx: current.0 - previous.0,
                dy: current.1 - previous.1,
            },
            _ => Delta::ZERO,
        };
        let reinitialized = centroid.is_none() && self.previous_centroid.is_some();
        if reinitialized {
            debug!("Color target lost");
        }
        self.previous_centroid = centroid;

        Ok(TrackOutcome {
            delta,
            reinitialized,
            view: TrackingView::Centroid(centroid),
        })
    }
}

pub fn convert_to_grayscale(image: &Mat) -> Result<Mat> {
    let mut gray: Mat = Mat::default();
    imgproc::cvt_color_def(&image, &mut gray, imgproc::COLOR_BGR2GRAY)?;
    Ok(gray)
}

pub fn detect_corners(gray: &Mat, params: &OpticalFlowConfig) -> Result<Vector<Point2f>> {
    let mut corners: Vector<Point2f> = Default::default();
    imgproc::good_features_to_track(
        gray,
        &mut corners,
        params.max_corners,
        params.quality_level,
        params.min_distance,
        &core::no_array(),
        params.block_size,
        false,
        0.04,
    )?;
    Ok(corners)
}

pub fn track_points(
    previous_frame: &Mat,
    frame: &Mat,
    keypoints: &Vector<Point2f>,
    params: &OpticalFlowConfig,
) -> Result<(Vector<Point2f>, Vector<u8>, Vector<f32>)> {
    // output moved points
    let mut moved_points: Vector<Point2f> = Default::default();
    // 1 or 0 if the point motion was detected
    let mut status: Vector<u8> = Default::default();
    // error of point motion
    let mut error_rep: Vector<f32> = Default::default();

    let criteria = core::TermCriteria {
        typ: (core::TermCriteria_EPS | core::TermCriteria_COUNT),
        max_count: 10,
        epsilon: 0.03,
    };

    opencv::video::calc_optical_flow_pyr_lk(
        previous_frame,
        frame,
        keypoints,
        &mut moved_points,
        &mut status,
        &mut error_rep,
        (params.win_size, params.win_size).into(),
        params.max_level,
        criteria,
        0,
        1e-4,
    )?;

    Ok((moved_points, status, error_rep))
}

pub fn detect_color_centroid(
    frame: &Mat,
    params: &ColorTrackingConfig,
) -> Result<Option<(f64, f64)>> {
    let mut hsv = Mat::default();
    imgproc::cvt_color_def(frame, &mut hsv, imgproc::COLOR_BGR2HSV)?;

    let lower = core::Scalar::new(
        params.lower_hsv[0] as f64,
        params.lower_hsv[1] as f64,
        params.lower_hsv[2] as f64,
        0.0,
    );
    let upper = core::Scalar::new(
        params.upper_hsv[0] as f64,
        params.upper_hsv[1] as f64,
        params.upper_hsv[2] as f64,
        0.0,
    );
    let mut mask = Mat::default();
    core::in_range(&hsv, &lower, &upper, &mut mask)?;

    // open then close to drop speckle and seal holes
    let kernel = imgproc::get_structuring_element(
        imgproc::MORPH_RECT,
        core::Size::new(5, 5),
        core::Point::new(-1, -1),
    )?;
    let mut opened = Mat::default();
    imgproc::morphology_ex_def(&mask, &mut opened, imgproc::MORPH_OPEN, &kernel)?;
    let mut cleaned = Mat::default();
    imgproc::morphology_ex_def(&opened, &mut cleaned, imgproc::MORPH_CLOSE, &kernel)?;

    let mut contours: Vector<Vector<Point>> = Vector::new();
    imgproc::find_contours_def(
        &cleaned,
        &mut contours,
        imgproc::RETR_EXTERNAL,
        imgproc::CHAIN_APPROX_SIMPLE,
    )?;

    let mut largest: Option<(f64, Vector<Point>)> = None;
    for contour in &contours {
        let area = imgproc::contour_area_def(&contour)?;
        if largest.as_ref().map_or(true, |(best, _)| area > *best) {
            largest = Some((area, contour));
        }
    }

    let Some((area, contour)) = largest else {
        return Ok(None);
    };
    if area < params.min_area {
        return Ok(None);
    }

    let moments = imgproc::moments_def(&contour)?;
    if moments.m00 == 0.0 {
        return Ok(None);
    }
    Ok(Some((moments.m10 / moments.m00, moments.m01 / moments.m00)))
}

pub fn aggregate_displacement(displacements: &[Delta], aggregation: Aggregation) -> Delta {
    if displacements.is_empty() {
        return Delta::ZERO;
    }
    match aggregation {
        Aggregation::Mean => {
            let count = displacements.len() as f64;
            Delta {
                dx: displacements.iter().map(|d| d.dx).sum::<f64>() / count,
                dy: displacements.iter().map(|d| d.dy).sum::<f64>() / count,
            }
        }
        Aggregation::Median => Delta {
            dx: median(displacements.iter().map(|d| d.dx).collect()),
            dy: median(displacements.iter().map(|d| d.dy).collect()),
        },
    }
}

fn median(mut values: Vec<f64>) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deltas(values: &[(f64, f64)]) -> Vec<Delta> {
        values
            .iter()
            .map(|&(dx, dy)| Delta { dx, dy })
            .collect()
    }

    #[test]
    fn empty_displacements_aggregate_to_zero() {
        assert_eq!(aggregate_displacement(&[], Aggregation::Mean), Delta::ZERO);
        assert_eq!(
            aggregate_displacement(&[], Aggregation::Median),
            Delta::ZERO
        );
    }

    #[test]
    fn mean_aggregation() {
        let displacements = deltas(&[(5.0, 3.0), (5.0, 3.0), (5.0, 3.0)]);
        let delta = aggregate_displacement(&displacements, Aggregation::Mean);
        assert_eq!(delta, Delta { dx: 5.0, dy: 3.0 });

        let displacements = deltas(&[(4.0, 2.0), (6.0, 4.0)]);
        let delta = aggregate_displacement(&displacements, Aggregation::Mean);
        assert_eq!(delta, Delta { dx: 5.0, dy: 3.0 });
    }

    #[test]
    fn median_ignores_a_single_outlier() {
        let displacements = deltas(&[(5.0, 0.0), (5.1, 0.0), (4.9, 0.0), (5.0, 0.0), (80.0, 40.0)]);
        let delta = aggregate_displacement(&displacements, Aggregation::Median);
        assert!((delta.dx - 5.0).abs() < 0.11);
        assert_eq!(delta.dy, 0.0);

        // the same outlier drags the mean far off
        let mean = aggregate_displacement(&displacements, Aggregation::Mean);
        assert!(mean.dx > 15.0);
    }

    #[test]
    fn median_of_even_count_averages_the_middle_pair() {
        let displacements = deltas(&[(1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)]);
        let delta = aggregate_displacement(&displacements, Aggregation::Median);
        assert_eq!(delta.dx, 2.5);
    }
}
