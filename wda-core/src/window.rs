//! Top-level window enumeration and management.
//!
//! Enumeration uses the canonical Alt+Tab filter (visible, not a tool
//! window, not cloaked, no visible owner unless `WS_EX_APPWINDOW`) plus a
//! denylist of shell windows, so the list matches what a user would call
//! "open windows".  Activation is a chain of named strategies tried in
//! order until the target owns the foreground.

use std::sync::Arc;
use std::time::Duration;

use regex::RegexBuilder;
use serde::Serialize;
use windows::Win32::Foundation::{BOOL, HWND, LPARAM, TRUE};
use windows::Win32::UI::WindowsAndMessaging::{
    EnumWindows, GetWindow, GetWindowLongW, IsWindowVisible, GWL_EXSTYLE, GW_OWNER,
    SW_MAXIMIZE, SW_MINIMIZE, SW_RESTORE, WS_EX_APPWINDOW, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW,
};

use crate::automation::AutomationService;
use crate::config::WindowConfig;
use crate::element::ElementQuery;
use crate::errors::WdaError;
use crate::geometry::Rect;
use crate::input;
use crate::monitors::{self, MonitorInfo, MonitorTarget};
use crate::native;
use crate::wait::{poll_until, CancelToken};

/// Settle delay after a ShowWindow call before the fresh snapshot.
const SHOW_SETTLE: Duration = Duration::from_millis(50);

/// Poll interval for window-state waits.
const STATE_POLL: Duration = Duration::from_millis(100);

/// Poll interval for wait-for-window.
const APPEAR_POLL: Duration = Duration::from_millis(250);

/// Per-strategy settle before checking the foreground after activation.
const ACTIVATE_SETTLE: Duration = Duration::from_millis(50);

/// Total budget for the save-dialog dismissal loop.
const DISMISS_BUDGET: Duration = Duration::from_millis(1_000);
const DISMISS_POLL: Duration = Duration::from_millis(100);

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Observable window state.  `hidden` and `closed` are terminal for this
/// engine; state is never cached between operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowState {
    Normal,
    Minimized,
    Maximized,
    Hidden,
}

impl WindowState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" | "restored" => Some(Self::Normal),
            "minimized" => Some(Self::Minimized),
            "maximized" => Some(Self::Maximized),
            "hidden" => Some(Self::Hidden),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Minimized => "minimized",
            Self::Maximized => "maximized",
            Self::Hidden => "hidden",
        }
    }
}

/// Owned snapshot of one top-level window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowInfo {
    /// Native handle, rendered as a decimal string on the wire.
    pub handle: isize,
    pub title: String,
    pub class_name: String,
    pub process_name: String,
    pub pid: u32,
    /// DWM extended-frame bounds in virtual-screen coordinates.
    pub bounds: Rect,
    pub state: WindowState,
    pub monitor_index: usize,
    pub monitor_bounds: Rect,
    pub is_elevated: bool,
    pub is_responding: bool,
    pub is_uwp: bool,
    pub is_foreground: bool,
    pub on_current_desktop: bool,
}

/// Result of `close`: the pre-close snapshot, or nothing when the window
/// was already gone.
#[derive(Debug, Clone, Serialize)]
pub struct CloseResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<WindowInfo>,
    pub already_closed: bool,
    pub dialog_dismissed: bool,
}

/// Outcome of `activate`, naming the strategy that won.
#[derive(Debug, Clone, Serialize)]
pub struct ActivateResult {
    pub window: WindowInfo,
    pub strategy: &'static str,
}

// ---------------------------------------------------------------------------
// Title / process matching
// ---------------------------------------------------------------------------

/// Case-insensitive substring or regex matcher over window titles and
/// process names.
pub enum TitleMatcher {
    Substring(String),
    Pattern(regex::Regex),
}

impl TitleMatcher {
    pub fn build(filter: &str, use_regex: bool) -> Result<Self, WdaError> {
        if use_regex {
            let re = RegexBuilder::new(filter)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    WdaError::InvalidRegex(format!("filter {filter:?} failed to compile: {e}"))
                })?;
            Ok(Self::Pattern(re))
        } else {
            Ok(Self::Substring(filter.to_lowercase()))
        }
    }

    pub fn matches(&self, candidate: &str) -> bool {
        match self {
            Self::Substring(needle) => candidate.to_lowercase().contains(needle),
            Self::Pattern(re) => re.is_match(candidate),
        }
    }
}

// ---------------------------------------------------------------------------
// Enumeration filter
// ---------------------------------------------------------------------------

/// Shell windows that are technically top-level but never useful targets.
const SHELL_CLASS_DENYLIST: &[&str] = &[
    "Shell_TrayWnd",
    "Shell_SecondaryTrayWnd",
    "Progman",
    "WorkerW",
    "NotifyIconOverflowWindow",
    "XamlExplorerHostIslandWindow",
];

fn is_shell_window(class_name: &str, title: &str) -> bool {
    if SHELL_CLASS_DENYLIST.contains(&class_name) {
        return true;
    }
    // UWP hosts with no title are frame shells, not applications.
    (class_name == "ApplicationFrameWindow" || class_name == "Windows.UI.Core.CoreWindow")
        && title.is_empty()
}

/// Empty-title windows survive the filter only with a non-trivial class.
fn title_passes(title: &str, class_name: &str) -> bool {
    if !title.is_empty() {
        return true;
    }
    !class_name.is_empty() && class_name != "#32770"
}

fn has_visible_owner(hwnd: HWND) -> bool {
    match unsafe { GetWindow(hwnd, GW_OWNER) } {
        Ok(owner) if !owner.is_invalid() => unsafe { IsWindowVisible(owner) }.as_bool(),
        _ => false,
    }
}

/// The Alt+Tab visibility rule plus the shell denylist.
fn passes_enumeration_filter(hwnd: HWND, include_all_desktops: bool) -> bool {
    if !native::is_visible(hwnd) {
        return false;
    }

    let ex_style = unsafe { GetWindowLongW(hwnd, GWL_EXSTYLE) } as u32;
    if ex_style & WS_EX_TOOLWINDOW.0 != 0 {
        return false;
    }
    if ex_style & WS_EX_NOACTIVATE.0 != 0 {
        return false;
    }

    if !include_all_desktops && native::is_cloaked(hwnd) {
        return false;
    }

    if has_visible_owner(hwnd) && ex_style & WS_EX_APPWINDOW.0 == 0 {
        return false;
    }

    let class_name = native::window_class(hwnd);
    let title = native::window_title(hwnd);
    if is_shell_window(&class_name, &title) {
        return false;
    }
    title_passes(&title, &class_name)
}

struct EnumState {
    handles: Vec<isize>,
    include_all_desktops: bool,
}

unsafe extern "system" fn enum_callback(hwnd: HWND, lparam: LPARAM) -> BOOL {
    let state = unsafe { &mut *(lparam.0 as *mut EnumState) };
    if passes_enumeration_filter(hwnd, state.include_all_desktops) {
        state.handles.push(hwnd.0 as isize);
    }
    TRUE
}

// ---------------------------------------------------------------------------
// Activation strategies
// ---------------------------------------------------------------------------

struct ActivationTarget {
    hwnd: HWND,
    pid: u32,
    tid: u32,
}

type StrategyFn = fn(&ActivationTarget);

/// Ordered activation attempts; the first one that makes the target the
/// foreground window wins.
const ACTIVATION_STRATEGIES: &[(&str, StrategyFn)] = &[
    ("set_foreground", strategy_set_foreground),
    ("allow_set_foreground", strategy_allow_set_foreground),
    ("alt_nudge", strategy_alt_nudge),
    ("attach_input", strategy_attach_input),
    ("minimize_restore", strategy_minimize_restore),
];

fn strategy_set_foreground(t: &ActivationTarget) {
    native::set_foreground(t.hwnd);
}

fn strategy_allow_set_foreground(t: &ActivationTarget) {
    native::allow_set_foreground(t.pid);
    native::set_foreground(t.hwnd);
}

fn strategy_alt_nudge(t: &ActivationTarget) {
    input::nudge_foreground_lock();
    native::set_foreground(t.hwnd);
}

fn strategy_attach_input(t: &ActivationTarget) {
    let current = native::current_thread_id();
    if current == t.tid {
        return;
    }
    let attached = native::attach_thread_input(current, t.tid, true);
    native::set_foreground(t.hwnd);
    if attached {
        native::attach_thread_input(current, t.tid, false);
    }
}

fn strategy_minimize_restore(t: &ActivationTarget) {
    native::show_window(t.hwnd, SW_MINIMIZE);
    std::thread::sleep(ACTIVATE_SETTLE);
    native::show_window(t.hwnd, SW_RESTORE);
    native::set_foreground(t.hwnd);
}

// ---------------------------------------------------------------------------
// Save-dialog dismissal
// ---------------------------------------------------------------------------

/// One way of finding the "Don't Save" button, tried in order.
struct DismissStrategy {
    name: &'static str,
    automation_id: Option<&'static str>,
    button_name: Option<&'static str>,
    name_contains: Option<&'static str>,
}

/// Windows 11 ships `SecondaryButton`, Windows 10 `CommandButton_7`.  The
/// "t save" substring sidesteps the typographic-apostrophe variants of
/// "Don't Save"; the `&No`/`No` pair covers classic message boxes.
const DISMISS_STRATEGIES: &[DismissStrategy] = &[
    DismissStrategy {
        name: "win11_secondary_button",
        automation_id: Some("SecondaryButton"),
        button_name: None,
        name_contains: None,
    },
    DismissStrategy {
        name: "win10_command_button",
        automation_id: Some("CommandButton_7"),
        button_name: None,
        name_contains: None,
    },
    DismissStrategy {
        name: "dont_save_substring",
        automation_id: None,
        button_name: None,
        name_contains: Some("t save"),
    },
    DismissStrategy {
        name: "mnemonic_no",
        automation_id: None,
        button_name: Some("&No"),
        name_contains: None,
    },
    DismissStrategy {
        name: "plain_no",
        automation_id: None,
        button_name: Some("No"),
        name_contains: None,
    },
];

impl DismissStrategy {
    fn to_query(&self, window: isize) -> ElementQuery {
        ElementQuery {
            window_handle: Some(window),
            automation_id: self.automation_id.map(str::to_owned),
            name: self.button_name.map(str::to_owned),
            name_contains: self.name_contains.map(str::to_owned),
            control_type: Some("Button".into()),
            max_results: Some(1),
            timeout_ms: Some(250),
            ..Default::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Window operations: enumerate, find, activate, state, placement, close.
pub struct WindowService {
    config: WindowConfig,
    automation: Arc<AutomationService>,
}

impl WindowService {
    pub fn new(config: WindowConfig, automation: Arc<AutomationService>) -> Self {
        Self { config, automation }
    }

    /// Read a fresh snapshot for one handle.
    pub fn info(&self, handle: isize) -> Result<WindowInfo, WdaError> {
        let mons = monitors::list_monitors()?;
        self.read_info(handle, &mons)
    }

    fn read_info(&self, handle: isize, mons: &[MonitorInfo]) -> Result<WindowInfo, WdaError> {
        let hwnd = native::hwnd(handle);
        if !native::is_window(hwnd) {
            return Err(WdaError::InvalidHandle(format!(
                "{handle} does not refer to a window"
            )));
        }

        let title = native::window_title(hwnd);
        let class_name = native::window_class(hwnd);
        let (pid, _) = native::window_pid_tid(hwnd);
        let bounds = native::window_bounds(hwnd)?;
        let monitor_index = monitors::monitor_index_for_window(mons, handle);

        let state = if !native::is_visible(hwnd) {
            WindowState::Hidden
        } else if native::is_minimized(hwnd) {
            WindowState::Minimized
        } else if native::is_maximized(hwnd) {
            WindowState::Maximized
        } else {
            WindowState::Normal
        };

        Ok(WindowInfo {
            handle,
            title,
            process_name: native::process_name(pid),
            pid,
            bounds,
            state,
            monitor_index,
            monitor_bounds: mons
                .get(monitor_index)
                .map(|m| m.bounds)
                .unwrap_or_default(),
            is_elevated: native::is_process_elevated(pid),
            is_responding: native::is_responding(
                hwnd,
                self.config.property_timeout_ms as u32,
            ),
            is_uwp: class_name == "ApplicationFrameWindow"
                || class_name == "Windows.UI.Core.CoreWindow",
            is_foreground: native::foreground_window().0 as isize == handle,
            on_current_desktop: native::on_current_virtual_desktop(hwnd),
            class_name,
        })
    }

    /// Enumerate windows, optionally filtered by title or process name.
    pub fn list(
        &self,
        filter: Option<&str>,
        use_regex: bool,
        include_all_desktops: bool,
    ) -> Result<Vec<WindowInfo>, WdaError> {
        let matcher = match filter {
            Some(f) if !f.is_empty() => Some(TitleMatcher::build(f, use_regex)?),
            _ => None,
        };

        let mut state = EnumState {
            handles: Vec::with_capacity(64),
            include_all_desktops,
        };
        unsafe {
            EnumWindows(
                Some(enum_callback),
                LPARAM(&mut state as *mut EnumState as isize),
            )
        }
        .map_err(|e| WdaError::EnumerationFailed(format!("EnumWindows failed: {e}")))?;

        let mons = monitors::list_monitors()?;
        let mut windows = Vec::with_capacity(state.handles.len());
        for handle in state.handles {
            // Windows can vanish between enumeration and the property
            // reads; skip them instead of failing the whole list.
            let Ok(info) = self.read_info(handle, &mons) else {
                continue;
            };
            if let Some(m) = &matcher {
                if !m.matches(&info.title) && !m.matches(&info.process_name) {
                    continue;
                }
            }
            windows.push(info);
        }
        Ok(windows)
    }

    /// Like `list`, but the matcher is required and title-only.
    pub fn find(&self, title: &str, use_regex: bool) -> Result<Vec<WindowInfo>, WdaError> {
        if title.is_empty() {
            return Err(WdaError::MissingParameter("find requires a title".into()));
        }
        let matcher = TitleMatcher::build(title, use_regex)?;
        let all = self.list(None, false, false)?;
        Ok(all
            .into_iter()
            .filter(|w| matcher.matches(&w.title))
            .collect())
    }

    /// Bring a window to the foreground, trying each strategy in order.
    pub fn activate(
        &self,
        handle: isize,
        cancel: &CancelToken,
    ) -> Result<ActivateResult, WdaError> {
        cancel.check("activate")?;

        if native::secure_desktop_active() {
            return Err(WdaError::SecureDesktopActive(
                "cannot activate a window while the secure desktop is up".into(),
            ));
        }

        let hwnd = native::hwnd(handle);
        if !native::is_window(hwnd) {
            return Err(WdaError::WindowNotFound(format!(
                "window {handle} no longer exists"
            )));
        }

        let (pid, tid) = native::window_pid_tid(hwnd);
        if native::is_process_elevated(pid) && !native::current_process_elevated() {
            return Err(WdaError::CrossElevation(format!(
                "window {handle} belongs to an elevated process"
            )));
        }

        // Restoring a minimized window can shove it onto another monitor;
        // the saved bounds are re-applied after every path.  A minimized
        // window's rect is the off-screen parking spot, so its placement
        // record supplies the bounds to protect instead.
        let was_minimized = native::is_minimized(hwnd);
        let saved_bounds = if was_minimized {
            native::window_normal_bounds(hwnd)?
        } else {
            native::window_rect_raw(hwnd)?
        };

        if was_minimized {
            native::show_window(hwnd, SW_RESTORE);
            std::thread::sleep(SHOW_SETTLE);
            if let Err(e) = native::set_window_bounds(hwnd, &saved_bounds) {
                log::debug!("restoring saved bounds after un-minimize failed: {e}");
            }
        }

        let target = ActivationTarget { hwnd, pid, tid };
        let mut winner: Option<&'static str> = None;

        if native::foreground_window().0 as isize == handle {
            winner = Some("already_foreground");
        } else {
            for &(name, strategy) in ACTIVATION_STRATEGIES {
                cancel.check("activate")?;
                strategy(&target);
                std::thread::sleep(ACTIVATE_SETTLE);
                if native::foreground_window().0 as isize == handle {
                    winner = Some(name);
                    break;
                }
                log::debug!("activation strategy {name} did not win the foreground");
            }
        }

        // minimize_restore may have moved the window.
        if !native::is_minimized(hwnd) {
            let current = native::window_rect_raw(hwnd)?;
            if current != saved_bounds && !was_minimized {
                let _ = native::set_window_bounds(hwnd, &saved_bounds);
            }
        }

        match winner {
            Some(strategy) => Ok(ActivateResult {
                window: self.info(handle)?,
                strategy,
            }),
            None => Err(WdaError::ActivationFailed(format!(
                "all {} strategies failed to bring window {handle} to the foreground",
                ACTIVATION_STRATEGIES.len()
            ))),
        }
    }

    /// Snapshot of whatever currently has focus.
    pub fn get_foreground(&self) -> Result<WindowInfo, WdaError> {
        if native::secure_desktop_active() {
            return Err(WdaError::SecureDesktopActive(
                "the secure desktop owns the foreground".into(),
            ));
        }
        let fg = native::foreground_window();
        if fg.is_invalid() {
            return Err(WdaError::WindowNotFound(
                "no window currently has the foreground".into(),
            ));
        }
        self.info(fg.0 as isize)
    }

    pub fn get_state(&self, handle: isize) -> Result<WindowState, WdaError> {
        Ok(self.info(handle)?.state)
    }

    /// Poll until the window reaches `desired`, reporting the last
    /// observed state on timeout.
    pub fn wait_for_state(
        &self,
        handle: isize,
        desired: WindowState,
        timeout_ms: Option<u64>,
        cancel: &CancelToken,
    ) -> Result<WindowInfo, WdaError> {
        let timeout = Duration::from_millis(timeout_ms.unwrap_or(self.config.operation_timeout_ms));
        let mut last_state = None;

        let found = poll_until(timeout, STATE_POLL, cancel, || {
            let info = self.info(handle)?;
            let state = info.state;
            last_state = Some(state);
            Ok((state == desired).then_some(info))
        })?;

        found.ok_or_else(|| {
            WdaError::Timeout(format!(
                "timeout after {} ms; current state: {}",
                timeout.as_millis(),
                last_state.map(|s| s.as_str()).unwrap_or("unknown")
            ))
        })
    }

    fn show_and_report(&self, handle: isize, cmd: windows::Win32::UI::WindowsAndMessaging::SHOW_WINDOW_CMD) -> Result<WindowInfo, WdaError> {
        let hwnd = native::hwnd(handle);
        if !native::is_window(hwnd) {
            return Err(WdaError::WindowNotFound(format!(
                "window {handle} no longer exists"
            )));
        }
        native::show_window(hwnd, cmd);
        std::thread::sleep(SHOW_SETTLE);
        self.info(handle)
    }

    pub fn minimize(&self, handle: isize) -> Result<WindowInfo, WdaError> {
        self.show_and_report(handle, SW_MINIMIZE)
    }

    pub fn maximize(&self, handle: isize) -> Result<WindowInfo, WdaError> {
        self.show_and_report(handle, SW_MAXIMIZE)
    }

    pub fn restore(&self, handle: isize) -> Result<WindowInfo, WdaError> {
        self.show_and_report(handle, SW_RESTORE)
    }

    pub fn move_window(&self, handle: isize, x: i32, y: i32) -> Result<WindowInfo, WdaError> {
        let current = native::window_rect_raw(native::hwnd(handle))?;
        self.set_bounds(handle, x, y, current.width(), current.height())
    }

    pub fn resize(&self, handle: isize, width: i32, height: i32) -> Result<WindowInfo, WdaError> {
        let current = native::window_rect_raw(native::hwnd(handle))?;
        self.set_bounds(handle, current.left, current.top, width, height)
            .map_err(|e| match e {
                WdaError::MoveFailed(msg) => WdaError::ResizeFailed(msg),
                other => other,
            })
    }

    /// Atomic move+resize, no z-order or activation change.
    pub fn set_bounds(
        &self,
        handle: isize,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<WindowInfo, WdaError> {
        if width <= 0 || height <= 0 {
            return Err(WdaError::InvalidCoordinates(format!(
                "window size must be positive, got {width}x{height}"
            )));
        }
        let hwnd = native::hwnd(handle);
        if !native::is_window(hwnd) {
            return Err(WdaError::WindowNotFound(format!(
                "window {handle} no longer exists"
            )));
        }
        native::set_window_bounds(hwnd, &Rect::from_origin_size(x, y, width, height))?;
        self.info(handle)
    }

    /// Post `WM_CLOSE`; optionally dismiss the save-confirmation dialog.
    ///
    /// Never fails because the window is already gone, and dialog
    /// dismissal failures are logged rather than raised.
    pub fn close(
        &self,
        handle: isize,
        discard_changes: bool,
        cancel: &CancelToken,
    ) -> Result<CloseResult, WdaError> {
        cancel.check("close")?;

        let hwnd = native::hwnd(handle);
        if !native::is_window(hwnd) {
            return Ok(CloseResult {
                window: None,
                already_closed: true,
                dialog_dismissed: false,
            });
        }

        let pre_close = self.info(handle)?;
        native::post_close(hwnd)?;

        let mut dismissed = false;
        if discard_changes {
            dismissed = self.dismiss_save_dialog(handle, cancel);
        }

        Ok(CloseResult {
            window: Some(pre_close),
            already_closed: false,
            dialog_dismissed: dismissed,
        })
    }

    /// Bounded loop that hunts for a save-confirmation dialog in the
    /// foreground and clicks its discard button.
    fn dismiss_save_dialog(&self, parent: isize, cancel: &CancelToken) -> bool {
        let deadline = std::time::Instant::now() + DISMISS_BUDGET;

        while std::time::Instant::now() < deadline {
            if cancel.is_cancelled() {
                return false;
            }
            // Parent already gone: nothing left to confirm.
            if !native::is_window(native::hwnd(parent)) {
                return true;
            }

            let fg = native::foreground_window();
            if !fg.is_invalid() {
                let fg_handle = fg.0 as isize;
                for strategy in DISMISS_STRATEGIES {
                    let query = strategy.to_query(fg_handle);
                    match self.automation.try_click_first(&query, cancel) {
                        Ok(true) => {
                            log::info!(
                                "dismissed save dialog via strategy {}",
                                strategy.name
                            );
                            return true;
                        }
                        Ok(false) => {}
                        Err(e) => {
                            log::debug!("dismissal strategy {} failed: {e}", strategy.name);
                        }
                    }
                }
            }

            std::thread::sleep(DISMISS_POLL);
        }

        log::warn!("no save dialog dismissed for window {parent} within the budget");
        false
    }

    /// Poll until a window matching `title` appears.
    pub fn wait_for(
        &self,
        title: &str,
        use_regex: bool,
        timeout_ms: Option<u64>,
        cancel: &CancelToken,
    ) -> Result<WindowInfo, WdaError> {
        // Compile eagerly so a bad pattern fails before the wait starts.
        TitleMatcher::build(title, use_regex)?;

        let timeout = Duration::from_millis(timeout_ms.unwrap_or(self.config.wait_timeout_ms));
        let found = poll_until(timeout, APPEAR_POLL, cancel, || {
            Ok(self.find(title, use_regex)?.into_iter().next())
        })?;

        found.ok_or_else(|| {
            WdaError::Timeout(format!(
                "no window matching {title:?} appeared within {} ms",
                timeout.as_millis()
            ))
        })
    }

    /// Center the window inside another monitor's work area, preserving
    /// its size; oversized windows clamp to the monitor origin.
    pub fn move_to_monitor(
        &self,
        handle: isize,
        target: MonitorTarget,
    ) -> Result<WindowInfo, WdaError> {
        let mons = monitors::list_monitors()?;
        let index = monitors::resolve_target(&mons, target)?;
        let work_area = mons[index].work_area;

        let hwnd = native::hwnd(handle);
        if !native::is_window(hwnd) {
            return Err(WdaError::WindowNotFound(format!(
                "window {handle} no longer exists"
            )));
        }

        let current = native::window_rect_raw(hwnd)?;
        let placed = place_in_work_area(&current, &work_area);
        native::set_window_bounds(hwnd, &placed)
            .map_err(|e| WdaError::MoveFailed(format!("move to monitor {index} failed: {e}")))?;

        self.info(handle)
    }
}

/// Pure placement: center `window` in `work_area` preserving size, clamped
/// to the work-area origin when the window is larger.
fn place_in_work_area(window: &Rect, work_area: &Rect) -> Rect {
    let w = window.width();
    let h = window.height();

    let x = if w >= work_area.width() {
        work_area.left
    } else {
        work_area.left + (work_area.width() - w) / 2
    };
    let y = if h >= work_area.height() {
        work_area.top
    } else {
        work_area.top + (work_area.height() - h) / 2
    };

    Rect::from_origin_size(x, y, w, h)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_state_parse_and_render() {
        assert_eq!(WindowState::parse("normal"), Some(WindowState::Normal));
        assert_eq!(WindowState::parse("Maximized"), Some(WindowState::Maximized));
        assert_eq!(WindowState::parse("restored"), Some(WindowState::Normal));
        assert_eq!(WindowState::parse("gone"), None);
        assert_eq!(WindowState::Minimized.as_str(), "minimized");
    }

    #[test]
    fn title_matcher_substring_is_case_insensitive() {
        let m = TitleMatcher::build("notepad", false).unwrap();
        assert!(m.matches("Untitled - Notepad"));
        assert!(!m.matches("Calculator"));
    }

    #[test]
    fn title_matcher_regex() {
        let m = TitleMatcher::build(r"^Document \d+", true).unwrap();
        assert!(m.matches("Document 12 - Word"));
        assert!(!m.matches("My Document 12"));
    }

    #[test]
    fn title_matcher_bad_regex_is_invalid_regex() {
        assert!(matches!(
            TitleMatcher::build("(oops", true),
            Err(WdaError::InvalidRegex(_))
        ));
    }

    #[test]
    fn shell_windows_are_denylisted() {
        assert!(is_shell_window("Shell_TrayWnd", "Taskbar"));
        assert!(is_shell_window("Progman", "Program Manager"));
        assert!(is_shell_window("ApplicationFrameWindow", ""));
        assert!(!is_shell_window("ApplicationFrameWindow", "Settings"));
        assert!(!is_shell_window("Notepad", "Untitled - Notepad"));
    }

    #[test]
    fn empty_titles_need_a_nontrivial_class() {
        assert!(title_passes("Untitled", "Notepad"));
        assert!(title_passes("", "Chrome_WidgetWin_1"));
        assert!(!title_passes("", ""));
        assert!(!title_passes("", "#32770"));
    }

    #[test]
    fn activation_strategy_order_is_fixed() {
        let names: Vec<&str> = ACTIVATION_STRATEGIES.iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "set_foreground",
                "allow_set_foreground",
                "alt_nudge",
                "attach_input",
                "minimize_restore",
            ]
        );
    }

    #[test]
    fn dismissal_strategy_order_and_queries() {
        let ids: Vec<Option<&str>> = DISMISS_STRATEGIES.iter().map(|s| s.automation_id).collect();
        assert_eq!(ids[0], Some("SecondaryButton"));
        assert_eq!(ids[1], Some("CommandButton_7"));

        let q = DISMISS_STRATEGIES[2].to_query(42);
        assert_eq!(q.window_handle, Some(42));
        assert_eq!(q.name_contains.as_deref(), Some("t save"));
        assert_eq!(q.control_type.as_deref(), Some("Button"));

        assert_eq!(DISMISS_STRATEGIES[3].button_name, Some("&No"));
        assert_eq!(DISMISS_STRATEGIES[4].button_name, Some("No"));
    }

    #[test]
    fn placement_centers_within_work_area() {
        let work = Rect::new(2560, 0, 2560 + 1920, 1040);
        let window = Rect::from_origin_size(100, 100, 800, 600);
        let placed = place_in_work_area(&window, &work);
        assert_eq!(placed.width(), 800);
        assert_eq!(placed.height(), 600);
        assert_eq!(placed.left, 2560 + (1920 - 800) / 2);
        assert_eq!(placed.top, (1040 - 600) / 2);
        assert!(work.contains_rect(&placed));
    }

    #[test]
    fn placement_clamps_oversized_windows_to_origin() {
        let work = Rect::new(0, 0, 1366, 728);
        let window = Rect::from_origin_size(0, 0, 1920, 1080);
        let placed = place_in_work_area(&window, &work);
        assert_eq!(placed.left, 0);
        assert_eq!(placed.top, 0);
        assert_eq!(placed.width(), 1920);
    }
}
