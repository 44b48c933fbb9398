use clap::Parser;
use opencv::prelude::*;
use opencv::videoio;
use optical_mouse::camera::mat_to_jpeg;
use optical_mouse::ErrorWrapper;
use std::time::Duration;
use tracing::{info, warn};
use zenoh::prelude::r#async::*;

/// Publishes JPEG-encoded camera frames for a remote optical-mouse
/// subscriber. Run this on the machine (or phone bridge) with the camera.
#[derive(Parser, Debug)]
#[command()]
struct Args {
    /// Camera device index to publish.
    #[arg(short = 'i', long, default_value_t = 0)]
    camera_index: i32,

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

    // stale frames are worthless, drop them rather than queue them
    let publisher = zenoh_session
        .declare_publisher("optical-mouse/image")
        .congestion_control(CongestionControl::Drop)
        .priority(Priority::InteractiveHigh)
        .res()
        .await
        .map_err(ErrorWrapper::ZenohError)?;

    let mut cam = videoio::VideoCapture::new(args.camera_index, videoio::CAP_ANY)?;
    let opened = videoio::VideoCapture::is_opened(&cam)?;
    if !opened {
        anyhow::bail!("Unable to open camera {}", args.camera_index);
    }
    info!("Publishing camera {} frames", args.camera_index);

    loop {
        let mut frame = Mat::default();
        cam.read(&mut frame)?;
        if frame.size()?.width == 0 {
            warn!("Camera produced an empty frame");
            tokio::time::sleep(Duration::from_millis(50)).await;
            continue;
        }

        let data = mat_to_jpeg(&frame)?;

        publisher
            .put(data)
            .res()
            .await
            .map_err(ErrorWrapper::ZenohError)?;
    }
}
