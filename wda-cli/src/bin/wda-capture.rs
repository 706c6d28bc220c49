//! Standalone CLI tool for taking screenshots through the capture service.

use clap::Parser;
use wda_core::capture::{CaptureRequest, CaptureTarget, ImageFormat, OutputMode};
use wda_core::geometry::Rect;
use wda_core::DesktopAutomation;

#[derive(Parser)]
#[command(name = "wda-capture", about = "Capture a monitor, window, or region")]
struct Args {
    /// Monitor index to capture (default 0 unless --hwnd/--region given)
    #[arg(long)]
    monitor: Option<usize>,

    /// Capture a window by handle instead of a monitor
    #[arg(long)]
    hwnd: Option<isize>,

    /// Capture a region: x,y,width,height in virtual-screen coordinates
    #[arg(long, value_delimiter = ',', num_args = 4)]
    region: Option<Vec<i32>>,

    /// Capture the union of all monitors
    #[arg(long)]
    all: bool,

    /// Output file path (omit for a timestamped temp file)
    #[arg(short, long)]
    out: Option<String>,

    /// Image format: jpeg or png
    #[arg(long, default_value = "jpeg")]
    format: String,

    /// JPEG quality 1-100
    #[arg(long)]
    quality: Option<u8>,

    /// Maximum output width (0 = unconstrained)
    #[arg(long)]
    max_width: Option<u32>,

    /// Include the cursor in the capture
    #[arg(long)]
    cursor: bool,
}

fn main() {
    let args = Args::parse();

    let engine = match DesktopAutomation::new() {
        Ok(e) => e,
        Err(e) => {
            eprintln!("failed to start engine: {e}");
            std::process::exit(1);
        }
    };

    let target = if let Some(handle) = args.hwnd {
        CaptureTarget::Window(handle)
    } else if let Some(region) = &args.region {
        CaptureTarget::Region(Rect::from_origin_size(
            region[0], region[1], region[2], region[3],
        ))
    } else if args.all {
        CaptureTarget::AllMonitors
    } else {
        CaptureTarget::Monitor(args.monitor.unwrap_or(0))
    };

    let Some(format) = ImageFormat::parse(&args.format) else {
        eprintln!("unknown format {:?} (use jpeg or png)", args.format);
        std::process::exit(1);
    };

    let request = CaptureRequest {
        target,
        include_cursor: args.cursor,
        format: Some(format),
        quality: args.quality,
        max_width: args.max_width,
        max_height: None,
        output: OutputMode::File(args.out.clone()),
    };

    match engine.capture.capture(&request) {
        Ok(result) => {
            println!(
                "{} ({}x{} from {}x{}, {} bytes)",
                result.path.as_deref().unwrap_or("<inline>"),
                result.width,
                result.height,
                result.original_width,
                result.original_height,
                result.byte_size
            );
        }
        Err(e) => {
            eprintln!("capture failed: {e}");
            std::process::exit(1);
        }
    }
}
