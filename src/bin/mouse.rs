use clap::Parser;
use optical_mouse::camera::CameraSource;
use optical_mouse::config::Config;
use optical_mouse::display::{DisplayManager, Recorder};
use optical_mouse::perf::PerformanceMonitor;
use optical_mouse::pipeline::MousePipeline;
use std::path::PathBuf;
use tracing::info;

/// Moves the system cursor by tracking surface motion seen by a camera.
#[derive(Parser, Debug)]
#[command()]
struct Args {
    /// Configuration file path.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let args: Args = Args::parse();
    let config = Config::load_or_default(&args.config)?;

    let mut camera = CameraSource::new(&config.camera)?;
    let mut pipeline = MousePipeline::new(&config)?;
    let mut display = DisplayManager::new(&config.display)?;
    let mut monitor = PerformanceMonitor::new();

    let mut recorder = if config.recording.enabled {
        let (width, height) = camera.frame_dimensions()?;
        Some(Recorder::new(&config.recording, width, height)?)
    } else {
        None
    };

    info!("Starting main loop");
    let mut frame_count = 0u64;
    loop {
        monitor.start_frame();
        let Some(frame) = camera.next_frame()? else {
            continue;
        };

        let report = pipeline.process_frame(&frame)?;
        let latency = monitor.end_frame();
        let fps = monitor.fps();

        let camera_frame = display.render_camera(&frame, &report, fps, latency)?;
        if let Some(recorder) = recorder.as_mut() {
            let demo = recorder.write_demo_frame(
                &camera_frame,
                report.cursor,
                pipeline.screen_dimensions(),
            )?;
            display.show_demo(&demo)?;
        } else {
            let desktop = display.desktop_view(report.cursor, pipeline.screen_dimensions())?;
            display.show(&camera_frame, desktop.as_ref())?;
        }

        if display.exit_requested()? {
            info!("Exit key pressed");
            break;
        }

        frame_count += 1;
        if frame_count % 100 == 0 {
            info!(
                "Frames: {}, FPS: {:.1}, latency: {:.1}ms",
                frame_count, fps, latency
            );
        }
    }

    if let Some(recorder) = recorder.as_mut() {
        recorder.finish()?;
    }
    display.close()?;
    info!("Main loop ended after {} frames", frame_count);
    Ok(())
}
