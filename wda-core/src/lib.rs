//! `wda_core` -- Windows desktop automation engine.
//!
//! The core behind a stdio tool server that lets an LLM drive real
//! applications: enumerate and manipulate windows, query and act on the
//! UI Automation tree, synthesize mouse/keyboard input, and capture
//! screenshots for vision models.  This crate is pure library; the outer
//! JSON-RPC dispatch layer serializes the typed results it returns.
//!
//! # Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`errors`] | `WdaError` taxonomy + `ActionResult` envelope |
//! | [`config`] | Per-component config records from `WDA_*` env vars |
//! | [`com`] | RAII COM apartment guard (STA for the UIA worker) |
//! | [`native`] | Win32 binding seam |
//! | [`geometry`] | `Point` / `Rect` and DPI scaling math |
//! | [`monitors`] | Monitor enumeration and the coordinate model |
//! | [`window`] | Window enumeration, activation, placement, close |
//! | [`keys`] | Named key to virtual-key mapping |
//! | [`input`] | `SendInput` mouse/keyboard synthesis with guards |
//! | [`worker`] | Single-threaded apartment work loop |
//! | [`registry`] | Element-id arena for live UIA references |
//! | [`element`] | Element records and query selectors |
//! | [`uia`] | Control-type taxonomy, pattern probing, tree walks |
//! | [`automation`] | UIA operations (find/click/type/.../capture_annotated) |
//! | [`capture`] | Screen/window capture and the image pipeline |
//! | [`ocr`] | Windows.Media.Ocr text recognition |
//! | [`wait`] | Cancellation token + shared poll loop |
//! | [`paths`] | Windows-aware output-path normalization |

pub mod automation;
pub mod capture;
pub mod com;
pub mod config;
pub mod element;
pub mod errors;
pub mod geometry;
pub mod input;
pub mod keys;
pub mod monitors;
pub mod native;
pub mod ocr;
pub mod paths;
pub mod registry;
pub mod uia;
pub mod wait;
pub mod window;
pub mod worker;

use std::sync::Arc;

use automation::{AutomationService, UiaContext};
use capture::CaptureService;
use config::{AutomationConfig, CaptureConfig, KeyboardConfig, MouseConfig, WindowConfig};
use errors::WdaError;
use input::InputService;
use window::WindowService;
use worker::Worker;

pub use element::{ElementInfo, ElementQuery, ToggleState};
pub use errors::ActionResult;
pub use wait::CancelToken;
pub use window::{WindowInfo, WindowState};

/// Inbox capacity of the automation worker; submitters block (with their
/// own timeout) once this many operations are queued.
const WORKER_INBOX: usize = 32;

/// Facade owning all services, wired with env-derived configuration.
///
/// Construct once per process; every service is cheap to share and safe
/// to call from multiple dispatch threads.  All UIA work funnels through
/// one worker thread that lives as long as this struct.
pub struct DesktopAutomation {
    pub windows: WindowService,
    pub automation: Arc<AutomationService>,
    pub input: Arc<InputService>,
    pub capture: Arc<CaptureService>,
}

impl DesktopAutomation {
    /// Build every service from environment configuration and start the
    /// automation worker.
    pub fn new() -> Result<Self, WdaError> {
        Self::with_configs(
            WindowConfig::from_env(),
            MouseConfig::from_env(),
            KeyboardConfig::from_env(),
            CaptureConfig::from_env(),
            AutomationConfig::from_env(),
        )
    }

    pub fn with_configs(
        window: WindowConfig,
        mouse: MouseConfig,
        keyboard: KeyboardConfig,
        capture: CaptureConfig,
        automation: AutomationConfig,
    ) -> Result<Self, WdaError> {
        let worker: Arc<Worker<UiaContext>> =
            Arc::new(Worker::spawn("wda-uia-worker", WORKER_INBOX)?);

        let input = Arc::new(InputService::new(mouse, keyboard));
        let capture_service = Arc::new(CaptureService::new(capture));
        let automation_service = Arc::new(AutomationService::new(
            worker,
            Arc::clone(&input),
            Arc::clone(&capture_service),
            automation,
        ));

        Ok(Self {
            windows: WindowService::new(window, Arc::clone(&automation_service)),
            automation: automation_service,
            input,
            capture: capture_service,
        })
    }

    /// Monitor snapshot for `screenshot_control.list_monitors`.
    pub fn list_monitors(&self) -> Result<Vec<monitors::MonitorInfo>, WdaError> {
        monitors::list_monitors()
    }
}
