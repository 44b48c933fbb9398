use clap::Parser;
use opencv::prelude::*;
use opencv::{highgui, videoio};

/// Probes local camera devices so the right index can go into config.toml.
/// Phone-camera bridges (DroidCam and friends) show up here as extra
/// devices.
#[derive(Parser, Debug)]
#[command()]
struct Args {
    /// Highest device index to probe.
    #[arg(long, default_value_t = 4)]
    max_index: i32,

    /// Show a short preview window for each working camera.
    #[arg(long)]
    preview: bool,
}

fn main() -> anyhow::Result<()> {
    let args: Args = Args::parse();

    println!("Probing camera devices 0..={}", args.max_index);
    for index in 0..=args.max_index {
        let mut cam = match videoio::VideoCapture::new(index, videoio::CAP_ANY) {
            Ok(cam) => cam,
            Err(_) => {
                println!("Camera {}: not available", index);
                continue;
            }
        };
        if !videoio::VideoCapture::is_opened(&cam)? {
            println!("Camera {}: not available", index);
            continue;
        }

        let mut frame = Mat::default();
        cam.read(&mut frame)?;
        let size = frame.size()?;
        if size.width == 0 {
            println!("Camera {}: opened but produced no frame", index);
            continue;
        }
        println!("Camera {}: {}x{}", index, size.width, size.height);

        if args.preview {
            let window = format!("Camera {} preview", index);
            highgui::named_window_def(&window)?;
            highgui::imshow(&window, &frame)?;
            highgui::wait_key(2000)?;
            highgui::destroy_window(&window)?;
        }
    }
    println!("Use a working index as [camera] source in config.toml");

    Ok(())
}
