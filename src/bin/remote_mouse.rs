use clap::Parser;
use optical_mouse::camera::jpeg_to_mat;
use optical_mouse::config::Config as AppConfig;
use optical_mouse::display::DisplayManager;
use optical_mouse::perf::PerformanceMonitor;
use optical_mouse::pipeline::MousePipeline;
use optical_mouse::ErrorWrapper;
use std::path::PathBuf;
use tracing::{info, warn};
use zenoh::prelude::r#async::*;

/// Runs the optical-mouse pipeline on frames published by `camera_driver`,
/// so a phone or another machine can act as the camera.
#[derive(Parser, Debug)]
#[command()]
struct Args {
    /// Configuration file path.
    #[arg(short = 'c', long, default_value = "config.toml")]
    config: PathBuf,

    /// Endpoints to connect to.
    #[clap(short = 'e', long)]
    connect: Vec<zenoh_config::EndPoint>,

    /// Endpoints to listen on.
    #[clap(long)]
    listen: Vec<zenoh_config::EndPoint>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
    let args: Args = Args::parse();
    let app_config = AppConfig::load_or_default(&args.config)?;

    // configure zenoh
    let mut zenoh_config = Config::default();
    if !args.listen.is_empty() {
        zenoh_config.listen.endpoints = args.listen.clone();
        info!(
            "Configured listening endpoints {:?}",
            zenoh_config.listen.endpoints
        );
    }
    if !args.connect.is_empty() {
        zenoh_config.connect.endpoints = args.connect.clone();
        info!(
            "Configured connect endpoints {:?}",
            zenoh_config.connect.endpoints
        );
    }

    let zenoh_session = zenoh::open(zenoh_config)
        .res()
        .await
        .map_err(ErrorWrapper::ZenohError)?;
    let zenoh_session = zenoh_session.into_arc();

    let subscriber = zenoh_session
        .declare_subscriber("optical-mouse/image")
        .best_effort()
        .res()
        .await
        .map_err(ErrorWrapper::ZenohError)?;

    let mut pipeline = MousePipeline::new(&app_config)?;
    let mut display = DisplayManager::new(&app_config.display)?;
    let mut monitor = PerformanceMonitor::new();

    info!("Waiting for remote frames");
    loop {
        let msg = subscriber.recv_async().await?;
        let payload: Vec<u8> = msg.value.try_into()?;

        monitor.start_frame();
        let frame = match jpeg_to_mat(&payload) {
            Ok(frame) => frame,
            Err(error) => {
                warn!("Dropping undecodable frame: {error:#}");
                continue;
            }
        };

        let report = pipeline.process_frame(&frame)?;
        let latency = monitor.end_frame();

        let camera_frame = display.render_camera(&frame, &report, monitor.fps(), latency)?;
        let desktop = display.desktop_view(report.cursor, pipeline.screen_dimensions())?;
        display.show(&camera_frame, desktop.as_ref())?;

        if display.exit_requested()? {
            info!("Exit key pressed");
            break;
        }
    }

    display.close()?;
    Ok(())
}
