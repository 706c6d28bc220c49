//! Standalone CLI tool for sending input through the input service.

use clap::{Parser, Subcommand};
use wda_core::geometry::Point;
use wda_core::input::{MouseButton, TargetGuard};
use wda_core::DesktopAutomation;

#[derive(Parser)]
#[command(name = "wda-input", about = "Send keyboard/mouse input via the input service")]
struct Args {
    /// Require this substring in the foreground window title before
    /// injecting anything
    #[arg(long)]
    expect_title: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Type Unicode text
    Type { text: String },
    /// Press a named key (enter, esc, f5, a, ...)
    Press { key: String },
    /// Press a combination in order, release in reverse (ctrl c ...)
    Combo { keys: Vec<String> },
    /// Click at virtual-screen coordinates
    Click {
        x: i32,
        y: i32,
        /// Button: left, right, middle
        #[arg(short, long, default_value = "left")]
        button: String,
    },
    /// Move the cursor
    Move { x: i32, y: i32 },
    /// Scroll vertically (negative = down) at the cursor position
    Scroll { delta: i32 },
    /// Print the active keyboard layout
    Layout,
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

    let guard = TargetGuard {
        expected_window_title: args.expect_title.clone(),
        expected_process_name: None,
    };

    let result = match args.command {
        Command::Type { text } => engine
            .input
            .type_text(&text, &guard)
            .map(|n| format!("typed {n} UTF-16 units")),
        Command::Press { key } => engine
            .input
            .press(&key, &guard)
            .map(|_| format!("pressed {key}")),
        Command::Combo { keys } => engine
            .input
            .combo(&keys, &guard)
            .map(|_| format!("sent combo {}", keys.join("+"))),
        Command::Click { x, y, button } => {
            let button = match button.as_str() {
                "right" => MouseButton::Right,
                "middle" => MouseButton::Middle,
                _ => MouseButton::Left,
            };
            engine
                .input
                .click(Point::new(x, y), button, &guard)
                .map(|p| format!("clicked at {},{} (cursor now {},{})", x, y, p.x, p.y))
        }
        Command::Move { x, y } => engine
            .input
            .mouse_move(Point::new(x, y), &guard)
            .map(|p| format!("cursor at {},{}", p.x, p.y)),
        Command::Scroll { delta } => engine
            .input
            .cursor_position()
            .and_then(|p| engine.input.scroll(p, delta, false, &guard))
            .map(|_| format!("scrolled {delta}")),
        Command::Layout => engine
            .input
            .keyboard_layout()
            .map(|l| serde_json::to_string_pretty(&l).unwrap()),
    };

    match result {
        Ok(message) => println!("{message}"),
        Err(e) => {
            eprintln!("input failed: {e}");
            std::process::exit(1);
        }
    }
}
