use opencv::core::{self, Rect, Scalar};
use opencv::imgproc;
use opencv::prelude::*;
use optical_mouse::config::{Config, TrackingMethod};
use optical_mouse::mapper::CoordinateMapper;
use optical_mouse::smoothing::{EmaFilter, MotionFilter};
use optical_mouse::tracker::{MotionTracker, TrackingView};
use optical_mouse::Delta;

// Scattered white squares give the corner detector plenty to latch onto.
const SQUARES: [(i32, i32); 8] = [
    (100, 80),
    (250, 150),
    (400, 90),
    (150, 300),
    (350, 320),
    (500, 250),
    (60, 200),
    (470, 400),
];

fn blank_frame() -> Mat {
    Mat::zeros(480, 640, core::CV_8UC3)
        .unwrap()
        .to_mat()
        .unwrap()
}

fn textured_frame(offset_x: i32) -> Mat {
    let mut frame = blank_frame();
    for (x, y) in SQUARES {
        imgproc::rectangle(
            &mut frame,
            Rect::new(x + offset_x, y, 40, 40),
            Scalar::new(255.0, 255.0, 255.0, 0.0),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )
        .unwrap();
    }
    frame
}

fn green_frame(x: i32) -> Mat {
    let mut frame = blank_frame();
    imgproc::rectangle(
        &mut frame,
        Rect::new(x, 200, 60, 60),
        Scalar::new(0.0, 255.0, 0.0, 0.0),
        imgproc::FILLED,
        imgproc::LINE_8,
        0,
    )
    .unwrap();
    frame
}

fn flow_config() -> Config {
    let mut config = Config::default();
    config.tracking.min_tracked_points = 5;
    config
}

fn color_config() -> Config {
    let mut config = Config::default();
    config.tracking.method = TrackingMethod::ColorTracking;
    config
}

#[test]
fn identical_frames_give_zero_displacement() {
    let config = flow_config();
    let mut tracker = MotionTracker::new(&config);
    let frame = textured_frame(0);

    let first = tracker.track(&frame).unwrap();
    assert_eq!(first.delta, Delta::ZERO);

    for _ in 0..3 {
        let outcome = tracker.track(&frame).unwrap();
        assert!(
            outcome.delta.dx.abs() < 0.5 && outcome.delta.dy.abs() < 0.5,
            "static scene drifted: ({}, {})",
            outcome.delta.dx,
            outcome.delta.dy
        );
    }
}

#[test]
fn uniform_shift_reaches_the_cursor_unchanged() {
    // sensitivity 1.0 and alpha 1 turn the whole path into identity
    let config = flow_config();
    let mut tracker = MotionTracker::new(&config);
    let mapper = CoordinateMapper::new(&config.tracking);
    let mut filter = EmaFilter::new(1.0);

    tracker.track(&textured_frame(0)).unwrap();
    let outcome = tracker.track(&textured_frame(5)).unwrap();
    let smoothed = filter.apply(mapper.map(outcome.delta));

    assert!(
        (smoothed.dx - 5.0).abs() < 1.0,
        "expected ~5px rightward, got {}",
        smoothed.dx
    );
    assert!(smoothed.dy.abs() < 1.0, "expected no vertical motion");
}

#[test]
fn sensitivity_scales_the_mapped_shift() {
    let mut config = flow_config();
    config.tracking.sensitivity = 2.0;
    let mut tracker = MotionTracker::new(&config);
    let mapper = CoordinateMapper::new(&config.tracking);

    tracker.track(&textured_frame(0)).unwrap();
    let outcome = tracker.track(&textured_frame(5)).unwrap();
    let mapped = mapper.map(outcome.delta);

    assert!((mapped.dx - 10.0).abs() < 2.0, "got {}", mapped.dx);
}

#[test]
fn full_loss_triggers_fresh_detection() {
    let config = flow_config();
    let mut tracker = MotionTracker::new(&config);

    tracker.track(&textured_frame(0)).unwrap();

    // texture vanishes; whether the points drop out via their status flags
    // or via the error threshold, the set must be rebuilt
    let lost = tracker.track(&blank_frame()).unwrap();
    assert!(lost.reinitialized);

    // the next textured frame detects a fresh point set instead of
    // propagating the stale one
    let recovered = tracker.track(&textured_frame(0)).unwrap();
    match recovered.view {
        TrackingView::Points(points) => assert!(!points.is_empty()),
        TrackingView::Centroid(_) => unreachable!("flow tracker reports points"),
    }

    // and tracking works again afterwards
    let moving = tracker.track(&textured_frame(5)).unwrap();
    assert!((moving.delta.dx - 5.0).abs() < 1.0);
}

#[test]
fn color_centroid_shift_matches_the_motion() {
    let mut tracker = MotionTracker::new(&color_config());

    let first = tracker.track(&green_frame(200)).unwrap();
    assert_eq!(first.delta, Delta::ZERO);

    let second = tracker.track(&green_frame(205)).unwrap();
    assert!(
        (second.delta.dx - 5.0).abs() < 0.5,
        "got {}",
        second.delta.dx
    );
    assert!(second.delta.dy.abs() < 0.5);
}

#[test]
fn empty_mask_reports_zero_and_recovers() {
    let mut tracker = MotionTracker::new(&color_config());

    tracker.track(&green_frame(200)).unwrap();

    let lost = tracker.track(&blank_frame()).unwrap();
    assert_eq!(lost.delta, Delta::ZERO);
    assert!(lost.reinitialized);
    match lost.view {
        TrackingView::Centroid(centroid) => assert!(centroid.is_none()),
        TrackingView::Points(_) => unreachable!("color tracker reports a centroid"),
    }

    // reappearing target contributes no delta on its first frame back
    let back = tracker.track(&green_frame(300)).unwrap();
    assert_eq!(back.delta, Delta::ZERO);

    let moving = tracker.track(&green_frame(304)).unwrap();
    assert!((moving.delta.dx - 4.0).abs() < 0.5);
}
