//! Named key to virtual-key-code mapping.
//!
//! Key names arrive from the wire as lowercase-ish strings ("enter",
//! "ctrl", "f5", "a").  Lookup is case-insensitive and accepts the common
//! aliases ("esc"/"escape", "ctrl"/"control", "win"/"super").

use windows::Win32::UI::Input::KeyboardAndMouse::{
    VIRTUAL_KEY, VK_APPS, VK_BACK, VK_CAPITAL, VK_CONTROL, VK_DELETE, VK_DOWN, VK_END, VK_ESCAPE,
    VK_F1, VK_F10, VK_F11, VK_F12, VK_F2, VK_F3, VK_F4, VK_F5, VK_F6, VK_F7, VK_F8, VK_F9,
    VK_HOME, VK_INSERT, VK_LCONTROL, VK_LEFT, VK_LMENU, VK_LSHIFT, VK_LWIN,
    VK_MEDIA_NEXT_TRACK, VK_MEDIA_PLAY_PAUSE, VK_MEDIA_PREV_TRACK, VK_MEDIA_STOP, VK_MENU,
    VK_NEXT, VK_NUMLOCK, VK_OEM_1, VK_OEM_2, VK_OEM_3, VK_OEM_4, VK_OEM_5, VK_OEM_6, VK_OEM_7,
    VK_OEM_COMMA, VK_OEM_MINUS, VK_OEM_PERIOD, VK_OEM_PLUS, VK_PAUSE, VK_PRIOR, VK_RCONTROL,
    VK_RETURN, VK_RIGHT, VK_RMENU, VK_RSHIFT, VK_RWIN, VK_SCROLL, VK_SHIFT, VK_SNAPSHOT,
    VK_SPACE, VK_TAB, VK_UP, VK_VOLUME_DOWN, VK_VOLUME_MUTE, VK_VOLUME_UP,
};

/// Resolve a key name to its virtual-key code.
///
/// Single letters and digits map to their literal VK values; everything
/// else goes through the alias table.  Returns `None` for unknown names.
pub fn lookup(name: &str) -> Option<VIRTUAL_KEY> {
    let lower = name.trim().to_ascii_lowercase();

    // Single character: letter or digit.
    if lower.len() == 1 {
        let c = lower.as_bytes()[0];
        if c.is_ascii_lowercase() {
            return Some(VIRTUAL_KEY((c as u16) - b'a' as u16 + b'A' as u16));
        }
        if c.is_ascii_digit() {
            return Some(VIRTUAL_KEY(c as u16));
        }
    }

    let vk = match lower.as_str() {
        "enter" | "return" => VK_RETURN,
        "tab" => VK_TAB,
        "space" | "spacebar" => VK_SPACE,
        "backspace" | "back" => VK_BACK,
        "delete" | "del" => VK_DELETE,
        "insert" | "ins" => VK_INSERT,
        "home" => VK_HOME,
        "end" => VK_END,
        "pageup" | "page_up" | "pgup" => VK_PRIOR,
        "pagedown" | "page_down" | "pgdn" => VK_NEXT,
        "up" => VK_UP,
        "down" => VK_DOWN,
        "left" => VK_LEFT,
        "right" => VK_RIGHT,
        "escape" | "esc" => VK_ESCAPE,
        "shift" => VK_SHIFT,
        "lshift" | "shift_l" => VK_LSHIFT,
        "rshift" | "shift_r" => VK_RSHIFT,
        "ctrl" | "control" => VK_CONTROL,
        "lctrl" | "ctrl_l" => VK_LCONTROL,
        "rctrl" | "ctrl_r" => VK_RCONTROL,
        "alt" | "menu" => VK_MENU,
        "lalt" | "alt_l" => VK_LMENU,
        "ralt" | "alt_r" | "altgr" => VK_RMENU,
        "win" | "windows" | "super" | "lwin" => VK_LWIN,
        "rwin" => VK_RWIN,
        "apps" | "context_menu" => VK_APPS,
        "capslock" | "caps_lock" => VK_CAPITAL,
        "numlock" | "num_lock" => VK_NUMLOCK,
        "scrolllock" | "scroll_lock" => VK_SCROLL,
        "printscreen" | "print_screen" | "prtsc" => VK_SNAPSHOT,
        "pause" => VK_PAUSE,
        "volume_up" => VK_VOLUME_UP,
        "volume_down" => VK_VOLUME_DOWN,
        "volume_mute" | "mute" => VK_VOLUME_MUTE,
        "media_play_pause" | "play_pause" => VK_MEDIA_PLAY_PAUSE,
        "media_next" | "next_track" => VK_MEDIA_NEXT_TRACK,
        "media_prev" | "prev_track" | "media_previous" => VK_MEDIA_PREV_TRACK,
        "media_stop" => VK_MEDIA_STOP,
        "f1" => VK_F1,
        "f2" => VK_F2,
        "f3" => VK_F3,
        "f4" => VK_F4,
        "f5" => VK_F5,
        "f6" => VK_F6,
        "f7" => VK_F7,
        "f8" => VK_F8,
        "f9" => VK_F9,
        "f10" => VK_F10,
        "f11" => VK_F11,
        "f12" => VK_F12,
        "semicolon" | ";" => VK_OEM_1,
        "slash" | "/" => VK_OEM_2,
        "grave" | "backtick" | "`" => VK_OEM_3,
        "bracket_left" | "[" => VK_OEM_4,
        "backslash" | "\\" => VK_OEM_5,
        "bracket_right" | "]" => VK_OEM_6,
        "quote" | "apostrophe" | "'" => VK_OEM_7,
        "comma" | "," => VK_OEM_COMMA,
        "period" | "dot" | "." => VK_OEM_PERIOD,
        "minus" | "-" => VK_OEM_MINUS,
        "plus" | "equals" | "=" => VK_OEM_PLUS,
        _ => return None,
    };
    Some(vk)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letters_map_to_uppercase_vk() {
        assert_eq!(lookup("a").unwrap().0, b'A' as u16);
        assert_eq!(lookup("z").unwrap().0, b'Z' as u16);
        assert_eq!(lookup("A").unwrap().0, b'A' as u16);
    }

    #[test]
    fn digits_map_to_literal_vk() {
        assert_eq!(lookup("0").unwrap().0, b'0' as u16);
        assert_eq!(lookup("9").unwrap().0, b'9' as u16);
    }

    #[test]
    fn aliases_resolve_to_same_key() {
        assert_eq!(lookup("esc"), lookup("escape"));
        assert_eq!(lookup("ctrl"), lookup("control"));
        assert_eq!(lookup("enter"), lookup("return"));
        assert_eq!(lookup("win"), lookup("lwin"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(lookup("ENTER"), lookup("enter"));
        assert_eq!(lookup("F5"), lookup("f5"));
        assert_eq!(lookup("PageUp"), lookup("pageup"));
    }

    #[test]
    fn function_keys() {
        assert_eq!(lookup("f1"), Some(VK_F1));
        assert_eq!(lookup("f12"), Some(VK_F12));
        assert_eq!(lookup("f13"), None);
    }

    #[test]
    fn unknown_names_are_none() {
        assert_eq!(lookup(""), None);
        assert_eq!(lookup("hyper"), None);
        assert_eq!(lookup("enterr"), None);
    }
}
