//! Standalone CLI tool for listing and finding top-level windows as JSON.

use clap::Parser;
use wda_core::DesktopAutomation;

#[derive(Parser)]
#[command(name = "wda-windows", about = "List top-level windows as JSON")]
struct Args {
    /// Filter by title or process name (case-insensitive substring)
    #[arg(short, long)]
    filter: Option<String>,

    /// Treat the filter as a regex
    #[arg(long)]
    regex: bool,

    /// Include windows on other virtual desktops
    #[arg(long)]
    all_desktops: bool,

    /// Print the foreground window instead of the full list
    #[arg(long)]
    foreground: bool,

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

    let json = if args.foreground {
        match engine.windows.get_foreground() {
            Ok(info) => to_json(&info, args.compact),
            Err(e) => {
                eprintln!("get_foreground failed: {e}");
                std::process::exit(1);
            }
        }
    } else {
        match engine
            .windows
            .list(args.filter.as_deref(), args.regex, args.all_desktops)
        {
            Ok(windows) => to_json(&windows, args.compact),
            Err(e) => {
                eprintln!("list failed: {e}");
                std::process::exit(1);
            }
        }
    };

    println!("{json}");
}

fn to_json<T: serde::Serialize>(value: &T, compact: bool) -> String {
    if compact {
        serde_json::to_string(value).unwrap()
    } else {
        serde_json::to_string_pretty(value).unwrap()
    }
}
