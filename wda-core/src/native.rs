//! Win32 binding seam.
//!
//! Thin, safe wrappers over the raw OS calls the services need: window
//! property reads, placement, DWM attributes, process identity, elevation
//! and secure-desktop probes, cursor state, virtual-screen metrics.  Every
//! fallible call converts the OS error into a typed [`WdaError`] here, so
//! no `windows::core::Error` leaks past this module.

use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::sync::OnceLock;

use parking_lot::Mutex;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, RefreshKind, System};
use windows::Win32::Foundation::{CloseHandle, HANDLE, HWND, LPARAM, RECT, WPARAM};
use windows::Win32::Graphics::Dwm::{
    DwmGetWindowAttribute, DWMWA_CLOAKED, DWMWA_EXTENDED_FRAME_BOUNDS,
};
use windows::Win32::Security::{
    GetTokenInformation, TokenElevation, TOKEN_ELEVATION, TOKEN_QUERY,
};
use windows::Win32::System::Com::{CoCreateInstance, CLSCTX_INPROC_SERVER};
use windows::Win32::System::StationsAndDesktops::{
    CloseDesktop, OpenInputDesktop, DESKTOP_CONTROL_FLAGS, DESKTOP_READOBJECTS,
};
use windows::Win32::System::Threading::{
    GetCurrentProcessId, GetCurrentThreadId, OpenProcess, QueryFullProcessImageNameW,
    PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};
use windows::Win32::UI::Input::KeyboardAndMouse::AttachThreadInput;
use windows::Win32::UI::Shell::{IVirtualDesktopManager, VirtualDesktopManager};
use windows::Win32::UI::WindowsAndMessaging::{
    AllowSetForegroundWindow, GetClassNameW, GetCursorPos, GetForegroundWindow, GetSystemMetrics,
    GetWindowPlacement, GetWindowRect, GetWindowTextLengthW, GetWindowTextW,
    GetWindowThreadProcessId, IsIconic, IsWindow, IsWindowVisible, IsZoomed, PostMessageW,
    SendMessageTimeoutW, SetForegroundWindow, SetWindowPos, ShowWindow, HWND_TOP,
    SET_WINDOW_POS_FLAGS, SHOW_WINDOW_CMD, SMTO_ABORTIFHUNG, SM_CXVIRTUALSCREEN,
    SM_CYVIRTUALSCREEN, SM_XVIRTUALSCREEN, SM_YVIRTUALSCREEN, SWP_NOACTIVATE, SWP_NOZORDER,
    WINDOWPLACEMENT, WM_CLOSE, WM_NULL,
};

use crate::com::ComGuard;
use crate::errors::WdaError;
use crate::geometry::{Point, Rect};

/// Build an `HWND` from the wire representation.
pub fn hwnd(handle: isize) -> HWND {
    HWND(handle as *mut core::ffi::c_void)
}

// ---------------------------------------------------------------------------
// Window property reads
// ---------------------------------------------------------------------------

/// Lossy decode of the first `len` UTF-16 units of a buffer.  Negative
/// lengths (failed reads) decode to an empty string.
fn wide_prefix(buf: &[u16], len: i32) -> String {
    if len <= 0 {
        return String::new();
    }
    String::from_utf16_lossy(&buf[..(len as usize).min(buf.len())])
}

/// Read the window title, sizing the buffer from a length probe.
pub fn window_title(hwnd: HWND) -> String {
    let probed = unsafe { GetWindowTextLengthW(hwnd) };
    if probed <= 0 {
        return String::new();
    }
    let mut buf = vec![0u16; probed as usize + 1];
    let copied = unsafe { GetWindowTextW(hwnd, &mut buf) };
    wide_prefix(&buf, copied)
}

/// Read the window class name; class names are capped well below 256.
pub fn window_class(hwnd: HWND) -> String {
    let mut buf = [0u16; 256];
    let copied = unsafe { GetClassNameW(hwnd, &mut buf) };
    wide_prefix(&buf, copied)
}

/// Owning process id and UI thread id of a window.
pub fn window_pid_tid(hwnd: HWND) -> (u32, u32) {
    let mut pid: u32 = 0;
    let tid = unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
    (pid, tid)
}

pub fn is_window(hwnd: HWND) -> bool {
    unsafe { IsWindow(hwnd) }.as_bool()
}

pub fn is_visible(hwnd: HWND) -> bool {
    unsafe { IsWindowVisible(hwnd) }.as_bool()
}

pub fn is_minimized(hwnd: HWND) -> bool {
    unsafe { IsIconic(hwnd) }.as_bool()
}

pub fn is_maximized(hwnd: HWND) -> bool {
    unsafe { IsZoomed(hwnd) }.as_bool()
}

/// Whether DWM has cloaked the window (other virtual desktop, suspended
/// UWP app).  Cloaked windows pass `IsWindowVisible` but are invisible.
pub fn is_cloaked(hwnd: HWND) -> bool {
    let mut cloaked: u32 = 0;
    let hr = unsafe {
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_CLOAKED,
            &mut cloaked as *mut u32 as *mut _,
            std::mem::size_of::<u32>() as u32,
        )
    };
    hr.is_ok() && cloaked != 0
}

/// Window bounds.  Prefers the DWM extended frame (excludes the invisible
/// resize border, matching what the user sees); falls back to the raw rect.
pub fn window_bounds(hwnd: HWND) -> Result<Rect, WdaError> {
    let mut frame = RECT::default();
    let hr = unsafe {
        DwmGetWindowAttribute(
            hwnd,
            DWMWA_EXTENDED_FRAME_BOUNDS,
            &mut frame as *mut RECT as *mut _,
            std::mem::size_of::<RECT>() as u32,
        )
    };
    if hr.is_ok() {
        return Ok(frame.into());
    }

    let mut raw = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut raw) }.map_err(|e| {
        WdaError::InvalidHandle(format!("GetWindowRect failed for {:?}: {e}", hwnd.0))
    })?;
    Ok(raw.into())
}

/// Raw window rect, including the invisible border (needed by SetWindowPos
/// round-trips, which speak raw coordinates).
pub fn window_rect_raw(hwnd: HWND) -> Result<Rect, WdaError> {
    let mut raw = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut raw) }.map_err(|e| {
        WdaError::InvalidHandle(format!("GetWindowRect failed for {:?}: {e}", hwnd.0))
    })?;
    Ok(raw.into())
}

/// The window's restored (normal) bounds from its placement record.
///
/// `GetWindowRect` on a minimized window reports the off-screen parking
/// position; the placement record holds where it returns to.
pub fn window_normal_bounds(hwnd: HWND) -> Result<Rect, WdaError> {
    let mut placement = WINDOWPLACEMENT {
        length: std::mem::size_of::<WINDOWPLACEMENT>() as u32,
        ..Default::default()
    };
    unsafe { GetWindowPlacement(hwnd, &mut placement) }.map_err(|e| {
        WdaError::InvalidHandle(format!("GetWindowPlacement failed for {:?}: {e}", hwnd.0))
    })?;
    Ok(placement.rcNormalPosition.into())
}

/// Probe whether the window's UI thread is processing messages.
///
/// Sends `WM_NULL` with `SMTO_ABORTIFHUNG`; a hung queue returns zero.
pub fn is_responding(hwnd: HWND, timeout_ms: u32) -> bool {
    let mut result: usize = 0;
    let lres = unsafe {
        SendMessageTimeoutW(
            hwnd,
            WM_NULL,
            WPARAM(0),
            LPARAM(0),
            SMTO_ABORTIFHUNG,
            timeout_ms,
            Some(&mut result),
        )
    };
    lres.0 != 0
}

// ---------------------------------------------------------------------------
// Window placement
// ---------------------------------------------------------------------------

pub fn show_window(hwnd: HWND, cmd: SHOW_WINDOW_CMD) {
    // Return value reports the *previous* visibility, not success.
    let _ = unsafe { ShowWindow(hwnd, cmd) };
}

/// Atomic move+resize without changing z-order or activation.
pub fn set_window_bounds(hwnd: HWND, bounds: &Rect) -> Result<(), WdaError> {
    set_window_pos(
        hwnd,
        bounds,
        SWP_NOZORDER | SWP_NOACTIVATE,
    )
}

pub fn set_window_pos(
    hwnd: HWND,
    bounds: &Rect,
    flags: SET_WINDOW_POS_FLAGS,
) -> Result<(), WdaError> {
    unsafe {
        SetWindowPos(
            hwnd,
            HWND_TOP,
            bounds.left,
            bounds.top,
            bounds.width(),
            bounds.height(),
            flags,
        )
    }
    .map_err(|e| WdaError::MoveFailed(format!("SetWindowPos failed: {e}")))
}

/// Post `WM_CLOSE` without waiting for the target to process it.
pub fn post_close(hwnd: HWND) -> Result<(), WdaError> {
    unsafe { PostMessageW(hwnd, WM_CLOSE, WPARAM(0), LPARAM(0)) }
        .map_err(|e| WdaError::CloseFailed(format!("PostMessage(WM_CLOSE) failed: {e}")))
}

// ---------------------------------------------------------------------------
// Foreground control
// ---------------------------------------------------------------------------

pub fn foreground_window() -> HWND {
    unsafe { GetForegroundWindow() }
}

pub fn set_foreground(hwnd: HWND) -> bool {
    unsafe { SetForegroundWindow(hwnd) }.as_bool()
}

pub fn allow_set_foreground(pid: u32) -> bool {
    unsafe { AllowSetForegroundWindow(pid) }.is_ok()
}

pub fn current_thread_id() -> u32 {
    unsafe { GetCurrentThreadId() }
}

pub fn attach_thread_input(attach_from: u32, attach_to: u32, attach: bool) -> bool {
    unsafe { AttachThreadInput(attach_from, attach_to, attach) }.as_bool()
}

// ---------------------------------------------------------------------------
// Process identity
// ---------------------------------------------------------------------------

static SYSTEM: OnceLock<Mutex<System>> = OnceLock::new();

fn system() -> &'static Mutex<System> {
    SYSTEM.get_or_init(|| {
        Mutex::new(System::new_with_specifics(
            RefreshKind::nothing().with_processes(ProcessRefreshKind::nothing()),
        ))
    })
}

/// Resolve a PID to its executable name.
///
/// Uses the `sysinfo` snapshot first (cheap after the initial refresh);
/// falls back to `QueryFullProcessImageNameW` for processes the snapshot
/// missed.
pub fn process_name(pid: u32) -> String {
    {
        let mut sys = system().lock();
        sys.refresh_processes(ProcessesToUpdate::Some(&[Pid::from_u32(pid)]), true);
        if let Some(process) = sys.process(Pid::from_u32(pid)) {
            let name = process.name().to_string_lossy().into_owned();
            if !name.is_empty() {
                return name;
            }
        }
    }

    query_process_image_name(pid)
        .map(|path| {
            path.rsplit(['\\', '/'])
                .next()
                .unwrap_or(&path)
                .to_owned()
        })
        .unwrap_or_default()
}

fn query_process_image_name(pid: u32) -> Option<String> {
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) }.ok()?;
    let mut buf = [0u16; 1024];
    let mut len = buf.len() as u32;
    let result = unsafe {
        QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            windows::core::PWSTR(buf.as_mut_ptr()),
            &mut len,
        )
    };
    let _ = unsafe { CloseHandle(handle) };
    result.ok()?;
    Some(
        OsString::from_wide(&buf[..len as usize])
            .to_string_lossy()
            .into_owned(),
    )
}

/// Whether `pid` runs with an elevated token.
///
/// Returns `false` when the process cannot even be opened for query -- the
/// caller treats "cannot ask" and "not elevated" the same way, and the
/// input-injection refusal that matters is enforced by the OS regardless.
pub fn is_process_elevated(pid: u32) -> bool {
    let handle = match unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) } {
        Ok(h) => h,
        Err(_) => return false,
    };

    let elevated = (|| -> Option<bool> {
        let mut token = HANDLE::default();
        unsafe {
            windows::Win32::System::Threading::OpenProcessToken(handle, TOKEN_QUERY, &mut token)
        }
        .ok()?;

        let mut elevation = TOKEN_ELEVATION::default();
        let mut returned: u32 = 0;
        let result = unsafe {
            GetTokenInformation(
                token,
                TokenElevation,
                Some(&mut elevation as *mut TOKEN_ELEVATION as *mut _),
                std::mem::size_of::<TOKEN_ELEVATION>() as u32,
                &mut returned,
            )
        };
        let _ = unsafe { CloseHandle(token) };
        result.ok()?;
        Some(elevation.TokenIsElevated != 0)
    })();

    let _ = unsafe { CloseHandle(handle) };
    elevated.unwrap_or(false)
}

pub fn current_process_elevated() -> bool {
    is_process_elevated(unsafe { GetCurrentProcessId() })
}

/// Whether the secure desktop (UAC prompt, lock screen) is active.
///
/// The input desktop cannot be opened from a normal session while the
/// secure desktop holds the input; an open failure is treated as secure.
pub fn secure_desktop_active() -> bool {
    let desktop = match unsafe {
        OpenInputDesktop(DESKTOP_CONTROL_FLAGS(0), false, DESKTOP_READOBJECTS)
    } {
        Ok(d) => d,
        Err(_) => return true,
    };
    let _ = unsafe { CloseDesktop(desktop) };
    false
}

static DESKTOP_MANAGER: OnceLock<Mutex<Option<IVirtualDesktopManager>>> = OnceLock::new();

fn desktop_manager() -> &'static Mutex<Option<IVirtualDesktopManager>> {
    DESKTOP_MANAGER.get_or_init(|| Mutex::new(None))
}

/// Whether the window lives on the current virtual desktop.
///
/// The shell object is created once and cached (window enumeration asks
/// this per window).  Errors degrade to `true`: a window the shell cannot
/// answer for is treated as present rather than silently filtered; a
/// failed call also evicts the cached instance so the next query retries.
pub fn on_current_virtual_desktop(target: HWND) -> bool {
    let Ok(_com) = ComGuard::init_mta() else {
        return true;
    };

    let mut slot = desktop_manager().lock();
    if slot.is_none() {
        *slot = unsafe { CoCreateInstance(&VirtualDesktopManager, None, CLSCTX_INPROC_SERVER) }
            .map_err(|e| log::debug!("VirtualDesktopManager creation failed: {e}"))
            .ok();
    }

    let Some(manager) = slot.as_ref() else {
        return true;
    };
    match unsafe { manager.IsWindowOnCurrentVirtualDesktop(target) } {
        Ok(on_desktop) => on_desktop.as_bool(),
        Err(_) => {
            *slot = None;
            true
        }
    }
}

// ---------------------------------------------------------------------------
// Cursor and virtual screen
// ---------------------------------------------------------------------------

pub fn cursor_pos() -> Result<Point, WdaError> {
    let mut pt = windows::Win32::Foundation::POINT::default();
    unsafe { GetCursorPos(&mut pt) }
        .map_err(|e| WdaError::SystemError(format!("GetCursorPos failed: {e}")))?;
    Ok(pt.into())
}

/// The union rectangle of all monitors.  May have a negative origin.
pub fn virtual_screen_rect() -> Rect {
    unsafe {
        let x = GetSystemMetrics(SM_XVIRTUALSCREEN);
        let y = GetSystemMetrics(SM_YVIRTUALSCREEN);
        let w = GetSystemMetrics(SM_CXVIRTUALSCREEN);
        let h = GetSystemMetrics(SM_CYVIRTUALSCREEN);
        Rect::from_origin_size(x, y, w.max(1), h.max(1))
    }
}
