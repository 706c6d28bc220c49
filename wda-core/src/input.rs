//! Mouse and keyboard synthesis via Win32 `SendInput`.
//!
//! Positions are virtual-screen logical coordinates; the builders translate
//! to the 0..65535 absolute encoding (with `MOUSEEVENTF_VIRTUALDESK`, so
//! multi-monitor layouts with negative origins map correctly).  Text is
//! emitted as `KEYEVENTF_UNICODE` events, no IME dependency, in chunks with
//! a settle delay between them.
//!
//! Both mouse and keyboard actions accept a [`TargetGuard`]: when set, the
//! foreground window is checked immediately before injection and a mismatch
//! aborts with `focus_mismatch` -- no input is sent.

use std::collections::HashSet;
use std::mem;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    GetKeyboardLayout, GetKeyboardLayoutNameW, SendInput, INPUT, INPUT_0, INPUT_KEYBOARD,
    INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS, KEYEVENTF_KEYUP, KEYEVENTF_UNICODE,
    MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP,
    MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_MOVE, MOUSEEVENTF_RIGHTDOWN,
    MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_VIRTUALDESK, MOUSEEVENTF_WHEEL, MOUSEINPUT,
    MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::Globalization::LCIDToLocaleName;

use crate::config::{KeyboardConfig, MouseConfig};
use crate::errors::WdaError;
use crate::geometry::{Point, Rect};
use crate::keys;
use crate::native;

// ---------------------------------------------------------------------------
// INPUT builders
// ---------------------------------------------------------------------------

fn unicode_key_input(scan_code: u16, key_up: bool) -> INPUT {
    let flags = if key_up {
        KEYEVENTF_UNICODE | KEYEVENTF_KEYUP
    } else {
        KEYEVENTF_UNICODE
    };

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: VIRTUAL_KEY(0),
                wScan: scan_code,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn virtual_key_input(vk: VIRTUAL_KEY, key_up: bool) -> INPUT {
    let flags = if key_up {
        KEYEVENTF_KEYUP
    } else {
        KEYBD_EVENT_FLAGS(0)
    };

    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: 0,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn mouse_input(abs_x: i32, abs_y: i32, data: i32, flags: MOUSE_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: abs_x,
                dy: abs_y,
                mouseData: data as u32,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

/// Convert a virtual-screen coordinate into the 0..65535 absolute space
/// used by `MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_VIRTUALDESK`.
fn normalize_absolute(p: Point, virtual_screen: &Rect) -> (i32, i32) {
    let w = virtual_screen.width().max(2) as i64;
    let h = virtual_screen.height().max(2) as i64;

    let ax = ((p.x - virtual_screen.left) as i64 * 65535 / (w - 1)).clamp(0, 65535) as i32;
    let ay = ((p.y - virtual_screen.top) as i64 * 65535 / (h - 1)).clamp(0, 65535) as i32;
    (ax, ay)
}

const ABS_MOVE: MOUSE_EVENT_FLAGS = MOUSE_EVENT_FLAGS(
    MOUSEEVENTF_ABSOLUTE.0 | MOUSEEVENTF_VIRTUALDESK.0 | MOUSEEVENTF_MOVE.0,
);

fn send_batch(inputs: &[INPUT]) -> Result<(), WdaError> {
    let sent = unsafe { SendInput(inputs, mem::size_of::<INPUT>() as i32) };
    if sent as usize != inputs.len() {
        return Err(WdaError::SystemError(format!(
            "SendInput injected {sent} of {} events (blocked by the OS?)",
            inputs.len()
        )));
    }
    Ok(())
}

/// Send a benign Alt down/up pair from this process.
///
/// `SetForegroundWindow` refuses callers that have not received input
/// recently; a synthesized Alt press satisfies the foreground-lock check
/// without any visible effect on the target.
pub fn nudge_foreground_lock() {
    use windows::Win32::UI::Input::KeyboardAndMouse::VK_MENU;
    let inputs = [
        virtual_key_input(VK_MENU, false),
        virtual_key_input(VK_MENU, true),
    ];
    let _ = unsafe { SendInput(&inputs, mem::size_of::<INPUT>() as i32) };
}

// ---------------------------------------------------------------------------
// Target guards
// ---------------------------------------------------------------------------

/// Optional preconditions on the foreground window, checked right before
/// any input is injected.
#[derive(Debug, Clone, Default)]
pub struct TargetGuard {
    pub expected_window_title: Option<String>,
    pub expected_process_name: Option<String>,
}

impl TargetGuard {
    pub fn is_set(&self) -> bool {
        self.expected_window_title.is_some() || self.expected_process_name.is_some()
    }
}

/// Pure guard check against observed foreground properties.
fn guard_matches(
    guard: &TargetGuard,
    foreground_title: &str,
    foreground_process: &str,
) -> Result<(), WdaError> {
    if let Some(expected) = &guard.expected_window_title {
        if !foreground_title
            .to_lowercase()
            .contains(&expected.to_lowercase())
        {
            return Err(WdaError::FocusMismatch(format!(
                "foreground window {foreground_title:?} does not contain expected title \
                 {expected:?}; no input was sent"
            )));
        }
    }
    if let Some(expected) = &guard.expected_process_name {
        if !foreground_process
            .to_lowercase()
            .contains(&expected.to_lowercase())
        {
            return Err(WdaError::FocusMismatch(format!(
                "foreground process {foreground_process:?} does not match expected \
                 {expected:?}; no input was sent"
            )));
        }
    }
    Ok(())
}

fn check_guard(guard: &TargetGuard) -> Result<(), WdaError> {
    if !guard.is_set() {
        return Ok(());
    }
    let fg = native::foreground_window();
    let title = native::window_title(fg);
    let (pid, _) = native::window_pid_tid(fg);
    let process = native::process_name(pid);
    guard_matches(guard, &title, &process)
}

// ---------------------------------------------------------------------------
// Held-key tracking
// ---------------------------------------------------------------------------

/// In-memory record of keys logically held down via `key_down`.
#[derive(Debug, Default)]
struct HeldKeys {
    keys: HashSet<u16>,
}

impl HeldKeys {
    fn press(&mut self, vk: VIRTUAL_KEY) {
        self.keys.insert(vk.0);
    }

    fn release(&mut self, vk: VIRTUAL_KEY) {
        self.keys.remove(&vk.0);
    }

    fn drain(&mut self) -> Vec<VIRTUAL_KEY> {
        let keys: Vec<VIRTUAL_KEY> = self.keys.iter().map(|&v| VIRTUAL_KEY(v)).collect();
        self.keys.clear();
        keys
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Wire records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    fn flags(&self) -> (MOUSE_EVENT_FLAGS, MOUSE_EVENT_FLAGS) {
        match self {
            Self::Left => (MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP),
            Self::Right => (MOUSEEVENTF_RIGHTDOWN, MOUSEEVENTF_RIGHTUP),
            Self::Middle => (MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP),
        }
    }
}

/// One step of a keyboard `sequence`.
#[derive(Debug, Clone)]
pub enum SequenceStep {
    Press { key: String, pause_ms: Option<u64> },
    Type { text: String, pause_ms: Option<u64> },
    Combo { keys: Vec<String>, pause_ms: Option<u64> },
}

/// Active keyboard layout report.
#[derive(Debug, Clone, Serialize)]
pub struct KeyboardLayoutInfo {
    pub locale_id: u32,
    pub tag: String,
    pub display_name: String,
    pub layout_name: String,
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Mouse and keyboard synthesis with held-key tracking and target guards.
pub struct InputService {
    mouse: MouseConfig,
    keyboard: KeyboardConfig,
    held: Mutex<HeldKeys>,
}

impl InputService {
    pub fn new(mouse: MouseConfig, keyboard: KeyboardConfig) -> Self {
        Self {
            mouse,
            keyboard,
            held: Mutex::new(HeldKeys::default()),
        }
    }

    fn key_delay(&self) -> Duration {
        Duration::from_millis(self.keyboard.key_delay_ms)
    }

    // -- mouse ---------------------------------------------------------

    pub fn mouse_move(&self, p: Point, guard: &TargetGuard) -> Result<Point, WdaError> {
        check_guard(guard)?;
        let vs = native::virtual_screen_rect();
        let (ax, ay) = normalize_absolute(p, &vs);
        send_batch(&[mouse_input(ax, ay, 0, ABS_MOVE)])?;
        native::cursor_pos()
    }

    pub fn click(
        &self,
        p: Point,
        button: MouseButton,
        guard: &TargetGuard,
    ) -> Result<Point, WdaError> {
        check_guard(guard)?;
        let vs = native::virtual_screen_rect();
        let (ax, ay) = normalize_absolute(p, &vs);
        let (down, up) = button.flags();
        send_batch(&[
            mouse_input(ax, ay, 0, ABS_MOVE),
            mouse_input(ax, ay, 0, ABS_MOVE | down),
            mouse_input(ax, ay, 0, ABS_MOVE | up),
        ])?;
        native::cursor_pos()
    }

    pub fn double_click(&self, p: Point, guard: &TargetGuard) -> Result<Point, WdaError> {
        self.click(p, MouseButton::Left, guard)?;
        std::thread::sleep(Duration::from_millis(50));
        self.click(p, MouseButton::Left, &TargetGuard::default())
    }

    /// Press at `from`, glide to `to` while held, release.
    pub fn drag(&self, from: Point, to: Point, guard: &TargetGuard) -> Result<Point, WdaError> {
        check_guard(guard)?;
        let vs = native::virtual_screen_rect();
        let (fx, fy) = normalize_absolute(from, &vs);
        let (tx, ty) = normalize_absolute(to, &vs);
        let pause = Duration::from_millis(self.mouse.drag_delay_ms);

        send_batch(&[
            mouse_input(fx, fy, 0, ABS_MOVE),
            mouse_input(fx, fy, 0, ABS_MOVE | MOUSEEVENTF_LEFTDOWN),
        ])?;
        std::thread::sleep(pause);
        send_batch(&[mouse_input(tx, ty, 0, ABS_MOVE)])?;
        std::thread::sleep(pause);
        send_batch(&[mouse_input(tx, ty, 0, ABS_MOVE | MOUSEEVENTF_LEFTUP)])?;
        native::cursor_pos()
    }

    /// Scroll at a position.  `delta` is in wheel notches, signed.
    pub fn scroll(
        &self,
        p: Point,
        delta: i32,
        horizontal: bool,
        guard: &TargetGuard,
    ) -> Result<Point, WdaError> {
        check_guard(guard)?;
        let vs = native::virtual_screen_rect();
        let (ax, ay) = normalize_absolute(p, &vs);
        let wheel = if horizontal {
            MOUSEEVENTF_HWHEEL
        } else {
            MOUSEEVENTF_WHEEL
        };

        // Move and wheel must be separate INPUT events; combining MOVE and
        // WHEEL flags in one event is undefined.
        send_batch(&[
            mouse_input(ax, ay, 0, ABS_MOVE),
            mouse_input(0, 0, delta * 120, wheel),
        ])?;
        native::cursor_pos()
    }

    pub fn cursor_position(&self) -> Result<Point, WdaError> {
        native::cursor_pos()
    }

    // -- keyboard ------------------------------------------------------

    /// Type Unicode text in chunks, pausing `chunk_delay_ms` between them.
    pub fn type_text(&self, text: &str, guard: &TargetGuard) -> Result<usize, WdaError> {
        check_guard(guard)?;

        let units: Vec<u16> = text.encode_utf16().collect();
        if units.is_empty() {
            return Ok(0);
        }

        let chunk_delay = Duration::from_millis(self.keyboard.chunk_delay_ms);
        let mut first = true;
        for chunk in units.chunks(self.keyboard.chunk_size.max(1)) {
            if !first {
                std::thread::sleep(chunk_delay);
                // Focus may shift while we sleep; re-check per chunk.
                check_guard(guard)?;
            }
            first = false;

            let mut inputs = Vec::with_capacity(chunk.len() * 2);
            for &unit in chunk {
                inputs.push(unicode_key_input(unit, false));
                inputs.push(unicode_key_input(unit, true));
            }
            send_batch(&inputs)?;
        }
        Ok(units.len())
    }

    fn resolve_key(name: &str) -> Result<VIRTUAL_KEY, WdaError> {
        keys::lookup(name)
            .ok_or_else(|| WdaError::InvalidAction(format!("unknown key name {name:?}")))
    }

    /// Single down+up of a named key.
    pub fn press(&self, key: &str, guard: &TargetGuard) -> Result<(), WdaError> {
        let vk = Self::resolve_key(key)?;
        check_guard(guard)?;
        send_batch(&[virtual_key_input(vk, false)])?;
        std::thread::sleep(self.key_delay());
        send_batch(&[virtual_key_input(vk, true)])
    }

    /// Press and hold; tracked until `key_up` or `release_all`.
    pub fn key_down(&self, key: &str, guard: &TargetGuard) -> Result<(), WdaError> {
        let vk = Self::resolve_key(key)?;
        check_guard(guard)?;
        send_batch(&[virtual_key_input(vk, false)])?;
        self.held.lock().press(vk);
        Ok(())
    }

    pub fn key_up(&self, key: &str, guard: &TargetGuard) -> Result<(), WdaError> {
        let vk = Self::resolve_key(key)?;
        check_guard(guard)?;
        send_batch(&[virtual_key_input(vk, true)])?;
        self.held.lock().release(vk);
        Ok(())
    }

    /// Press each key in order, release in reverse order.
    pub fn combo(&self, key_names: &[String], guard: &TargetGuard) -> Result<(), WdaError> {
        if key_names.is_empty() {
            return Err(WdaError::MissingParameter(
                "combo requires at least one key".into(),
            ));
        }
        let vks: Vec<VIRTUAL_KEY> = key_names
            .iter()
            .map(|k| Self::resolve_key(k))
            .collect::<Result<_, _>>()?;
        check_guard(guard)?;

        let delay = self.key_delay();
        for &vk in &vks {
            send_batch(&[virtual_key_input(vk, false)])?;
            std::thread::sleep(delay);
        }
        for &vk in vks.iter().rev() {
            send_batch(&[virtual_key_input(vk, true)])?;
            std::thread::sleep(delay);
        }
        Ok(())
    }

    /// Ordered mix of press/type/combo steps with optional pauses.
    pub fn sequence(&self, steps: &[SequenceStep], guard: &TargetGuard) -> Result<(), WdaError> {
        for step in steps {
            let pause = match step {
                SequenceStep::Press { key, pause_ms } => {
                    self.press(key, guard)?;
                    *pause_ms
                }
                SequenceStep::Type { text, pause_ms } => {
                    self.type_text(text, guard)?;
                    *pause_ms
                }
                SequenceStep::Combo { keys, pause_ms } => {
                    self.combo(keys, guard)?;
                    *pause_ms
                }
            };
            if let Some(ms) = pause {
                std::thread::sleep(Duration::from_millis(ms));
            }
        }
        Ok(())
    }

    /// Release every key the service believes is held.  Returns how many
    /// key-up events were sent.
    pub fn release_all(&self) -> Result<usize, WdaError> {
        let held = self.held.lock().drain();
        if held.is_empty() {
            return Ok(0);
        }
        let inputs: Vec<INPUT> = held.iter().map(|&vk| virtual_key_input(vk, true)).collect();
        send_batch(&inputs)?;
        Ok(held.len())
    }

    /// Whether the tracked held-key set is empty.
    pub fn no_keys_held(&self) -> bool {
        self.held.lock().is_empty()
    }

    /// Locale, BCP-47 tag, display name, and KLID of the active layout.
    pub fn keyboard_layout(&self) -> Result<KeyboardLayoutInfo, WdaError> {
        let fg = native::foreground_window();
        let (_, tid) = native::window_pid_tid(fg);
        let hkl = unsafe { GetKeyboardLayout(tid) };
        let locale_id = (hkl.0 as usize & 0xFFFF) as u32;

        let tag = {
            let mut buf = [0u16; 85];
            let len = unsafe { LCIDToLocaleName(locale_id, Some(&mut buf), 0) };
            if len > 1 {
                String::from_utf16_lossy(&buf[..(len - 1) as usize])
            } else {
                String::new()
            }
        };

        let display_name = locale_display_name(&tag).unwrap_or_else(|| tag.clone());

        let layout_name = {
            let mut buf = [0u16; 9];
            match unsafe { GetKeyboardLayoutNameW(&mut buf) } {
                Ok(()) => String::from_utf16_lossy(
                    &buf.iter().copied().take_while(|&c| c != 0).collect::<Vec<u16>>(),
                ),
                Err(_) => String::new(),
            }
        };

        Ok(KeyboardLayoutInfo {
            locale_id,
            tag,
            display_name,
            layout_name,
        })
    }
}

fn locale_display_name(tag: &str) -> Option<String> {
    use windows::core::HSTRING;
    use windows::Win32::Globalization::{GetLocaleInfoEx, LOCALE_SLOCALIZEDDISPLAYNAME};

    if tag.is_empty() {
        return None;
    }
    let wide = HSTRING::from(tag);
    let mut buf = [0u16; 256];
    let len = unsafe {
        GetLocaleInfoEx(
            windows::core::PCWSTR(wide.as_ptr()),
            LOCALE_SLOCALIZEDDISPLAYNAME,
            Some(&mut buf),
        )
    };
    if len > 1 {
        Some(String::from_utf16_lossy(&buf[..(len - 1) as usize]))
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_maps_virtual_screen_corners() {
        let vs = Rect::new(0, 0, 1920, 1080);
        assert_eq!(normalize_absolute(Point::new(0, 0), &vs), (0, 0));
        let (ax, ay) = normalize_absolute(Point::new(1919, 1079), &vs);
        assert_eq!((ax, ay), (65535, 65535));
    }

    #[test]
    fn normalize_handles_negative_origin() {
        // Secondary monitor left of the primary.
        let vs = Rect::new(-1920, 0, 1920, 1080);
        assert_eq!(normalize_absolute(Point::new(-1920, 0), &vs), (0, 0));
        let (ax, _) = normalize_absolute(Point::new(0, 0), &vs);
        // The seam lies halfway across the virtual screen.
        assert!((32_000..=33_500).contains(&ax));
    }

    #[test]
    fn normalize_clamps_out_of_range() {
        let vs = Rect::new(0, 0, 1920, 1080);
        assert_eq!(
            normalize_absolute(Point::new(-500, 5_000), &vs),
            (0, 65535)
        );
    }

    #[test]
    fn guard_title_substring_case_insensitive() {
        let guard = TargetGuard {
            expected_window_title: Some("notepad".into()),
            expected_process_name: None,
        };
        assert!(guard_matches(&guard, "Untitled - Notepad", "notepad.exe").is_ok());
        assert!(matches!(
            guard_matches(&guard, "Calculator", "calc.exe"),
            Err(WdaError::FocusMismatch(_))
        ));
    }

    #[test]
    fn guard_process_name() {
        let guard = TargetGuard {
            expected_window_title: None,
            expected_process_name: Some("Notepad.exe".into()),
        };
        assert!(guard_matches(&guard, "anything", "notepad.exe").is_ok());
        assert!(guard_matches(&guard, "anything", "explorer.exe").is_err());
    }

    #[test]
    fn guard_requires_both_when_both_set() {
        let guard = TargetGuard {
            expected_window_title: Some("Settings".into()),
            expected_process_name: Some("SystemSettings".into()),
        };
        assert!(guard_matches(&guard, "Settings", "SystemSettings.exe").is_ok());
        assert!(guard_matches(&guard, "Settings", "explorer.exe").is_err());
    }

    #[test]
    fn unset_guard_always_passes() {
        let guard = TargetGuard::default();
        assert!(!guard.is_set());
        assert!(guard_matches(&guard, "", "").is_ok());
    }

    #[test]
    fn held_keys_track_and_drain() {
        let mut held = HeldKeys::default();
        held.press(VIRTUAL_KEY(0x11));
        held.press(VIRTUAL_KEY(0x12));
        held.press(VIRTUAL_KEY(0x11)); // duplicate down is one entry
        held.release(VIRTUAL_KEY(0x12));

        let drained = held.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, 0x11);
        assert!(held.is_empty());
        assert!(held.drain().is_empty());
    }

    #[test]
    fn mouse_button_flags() {
        assert_eq!(MouseButton::Left.flags().0, MOUSEEVENTF_LEFTDOWN);
        assert_eq!(MouseButton::Right.flags().1, MOUSEEVENTF_RIGHTUP);
        assert_eq!(MouseButton::Middle.flags().0, MOUSEEVENTF_MIDDLEDOWN);
    }

    #[test]
    fn utf16_chunking_respects_chunk_size() {
        let text = "a".repeat(2_500);
        let units: Vec<u16> = text.encode_utf16().collect();
        let chunks: Vec<&[u16]> = units.chunks(1_000).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 1_000);
        assert_eq!(chunks[2].len(), 500);
    }
}
