//! Standalone CLI tool for dumping a window's UI Automation tree as JSON.

use clap::Parser;
use wda_core::{CancelToken, DesktopAutomation};

#[derive(Parser)]
#[command(name = "wda-tree", about = "Dump a window's UI Automation tree as JSON")]
struct Args {
    /// Window handle to inspect.  If omitted, uses the foreground window.
    #[arg(long)]
    hwnd: Option<isize>,

    /// Maximum tree depth (default chosen by detected framework)
    #[arg(long)]
    max_depth: Option<usize>,

    /// Keep only nodes of this control type (and their ancestors)
    #[arg(long)]
    control_type: Option<String>,

    /// Compact JSON output (no pretty-printing)
    #[arg(long)]
    compact: bool,
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

    let handle = match args.hwnd {
        Some(h) => h,
        None => match engine.windows.get_foreground() {
            Ok(info) => info.handle,
            Err(e) => {
                eprintln!("no --hwnd given and get_foreground failed: {e}");
                std::process::exit(1);
            }
        },
    };

    let cancel = CancelToken::new();
    match engine.automation.get_tree(
        handle,
        None,
        args.max_depth,
        args.control_type.as_deref(),
        &cancel,
    ) {
        Ok(result) => {
            let json = if args.compact {
                serde_json::to_string(&result).unwrap()
            } else {
                serde_json::to_string_pretty(&result).unwrap()
            };
            println!("{json}");
        }
        Err(e) => {
            eprintln!("get_tree failed: {e}");
            std::process::exit(1);
        }
    }
}
