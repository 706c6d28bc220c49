//! Per-component configuration records.
//!
//! Each service receives one plain record at construction, populated from
//! `WDA_*` environment variables.  Out-of-range values clamp to their bounds
//! and unparseable values fall back to the default, both with a warning --
//! a bad environment never prevents startup.

use std::time::Duration;

use crate::capture::ImageFormat;

// ---------------------------------------------------------------------------
// Env helpers
// ---------------------------------------------------------------------------

/// Parse a bounded integer setting from a raw env value.
fn parse_bounded(name: &str, raw: Option<&str>, default: u64, min: u64, max: u64) -> u64 {
    let value = match raw {
        None => default,
        Some(s) => match s.trim().parse::<u64>() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("{name}={s:?} is not an integer, using default {default}");
                default
            }
        },
    };

    if value < min || value > max {
        let clamped = value.clamp(min, max);
        log::warn!("{name}={value} outside {min}..={max}, clamping to {clamped}");
        clamped
    } else {
        value
    }
}

fn env_bounded(name: &str, default: u64, min: u64, max: u64) -> u64 {
    let raw = std::env::var(name).ok();
    parse_bounded(name, raw.as_deref(), default, min, max)
}

fn parse_format(name: &str, raw: Option<&str>) -> ImageFormat {
    match raw {
        None => ImageFormat::Jpeg,
        Some(s) => match ImageFormat::parse(s) {
            Some(f) => f,
            None => {
                log::warn!("{name}={s:?} is not a known image format, using jpeg");
                ImageFormat::Jpeg
            }
        },
    }
}

// ---------------------------------------------------------------------------
// Component records
// ---------------------------------------------------------------------------

/// Window service configuration.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    /// Default timeout for one window operation.
    pub operation_timeout_ms: u64,
    /// Default timeout for `wait_for` / `wait_for_state`.
    pub wait_timeout_ms: u64,
    /// Budget for single property probes (hung-window check).
    pub property_timeout_ms: u64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5_000,
            wait_timeout_ms: 30_000,
            property_timeout_ms: 100,
        }
    }
}

impl WindowConfig {
    pub fn from_env() -> Self {
        Self {
            operation_timeout_ms: env_bounded("WDA_OPERATION_TIMEOUT_MS", 5_000, 100, 300_000),
            wait_timeout_ms: env_bounded("WDA_WAIT_TIMEOUT_MS", 30_000, 100, 600_000),
            property_timeout_ms: env_bounded("WDA_PROPERTY_TIMEOUT_MS", 100, 10, 10_000),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }
}

/// Mouse synthesis configuration.
#[derive(Debug, Clone)]
pub struct MouseConfig {
    pub timeout_ms: u64,
    /// Pause between press, move, and release during a drag.
    pub drag_delay_ms: u64,
}

impl Default for MouseConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            drag_delay_ms: 100,
        }
    }
}

impl MouseConfig {
    pub fn from_env() -> Self {
        Self {
            timeout_ms: env_bounded("WDA_MOUSE_TIMEOUT_MS", 5_000, 100, 300_000),
            drag_delay_ms: env_bounded("WDA_DRAG_DELAY_MS", 100, 0, 5_000),
        }
    }
}

/// Keyboard synthesis configuration.
#[derive(Debug, Clone)]
pub struct KeyboardConfig {
    /// Delay between adjacent key events.
    pub key_delay_ms: u64,
    /// Delay between text chunks.
    pub chunk_delay_ms: u64,
    /// Maximum UTF-16 units typed per chunk.
    pub chunk_size: usize,
    pub timeout_ms: u64,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            key_delay_ms: 10,
            chunk_delay_ms: 50,
            chunk_size: 1_000,
            timeout_ms: 30_000,
        }
    }
}

impl KeyboardConfig {
    pub fn from_env() -> Self {
        Self {
            key_delay_ms: env_bounded("WDA_KEY_DELAY_MS", 10, 0, 1_000),
            chunk_delay_ms: env_bounded("WDA_CHUNK_DELAY_MS", 50, 0, 5_000),
            chunk_size: env_bounded("WDA_CHUNK_SIZE", 1_000, 1, 10_000) as usize,
            timeout_ms: env_bounded("WDA_KEYBOARD_TIMEOUT_MS", 30_000, 100, 600_000),
        }
    }
}

/// Capture service configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    pub timeout_ms: u64,
    /// Hard ceiling on `width * height` of any capture (default 8K).
    pub max_pixels: u64,
    pub default_format: ImageFormat,
    pub default_quality: u8,
    /// Default downscale constraint; 0 disables.
    pub default_max_width: u32,
    pub default_max_height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_pixels: 33_177_600,
            default_format: ImageFormat::Jpeg,
            default_quality: 85,
            default_max_width: 1_568,
            default_max_height: 0,
        }
    }
}

impl CaptureConfig {
    pub fn from_env() -> Self {
        Self {
            timeout_ms: env_bounded("WDA_SCREENSHOT_TIMEOUT_MS", 5_000, 100, 300_000),
            max_pixels: env_bounded("WDA_MAX_PIXELS", 33_177_600, 1, 133_177_600),
            default_format: parse_format(
                "WDA_DEFAULT_FORMAT",
                std::env::var("WDA_DEFAULT_FORMAT").ok().as_deref(),
            ),
            default_quality: env_bounded("WDA_DEFAULT_QUALITY", 85, 1, 100) as u8,
            default_max_width: env_bounded("WDA_DEFAULT_MAX_WIDTH", 1_568, 0, 16_384) as u32,
            default_max_height: env_bounded("WDA_DEFAULT_MAX_HEIGHT", 0, 0, 16_384) as u32,
        }
    }
}

/// Automation (UIA) service configuration.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Default timeout for one UIA operation.
    pub operation_timeout_ms: u64,
    /// Default timeout for element wait loops.
    pub wait_timeout_ms: u64,
    /// Poll interval inside element wait loops.
    pub poll_interval_ms: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            operation_timeout_ms: 5_000,
            wait_timeout_ms: 5_000,
            poll_interval_ms: 100,
        }
    }
}

impl AutomationConfig {
    pub fn from_env() -> Self {
        Self {
            operation_timeout_ms: env_bounded("WDA_OPERATION_TIMEOUT_MS", 5_000, 100, 300_000),
            wait_timeout_ms: env_bounded("WDA_ELEMENT_WAIT_TIMEOUT_MS", 5_000, 100, 600_000),
            poll_interval_ms: env_bounded("WDA_ELEMENT_POLL_INTERVAL_MS", 100, 10, 5_000),
        }
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bounded_uses_default_when_unset() {
        assert_eq!(parse_bounded("X", None, 5_000, 100, 300_000), 5_000);
    }

    #[test]
    fn parse_bounded_accepts_in_range() {
        assert_eq!(parse_bounded("X", Some("250"), 5_000, 100, 300_000), 250);
    }

    #[test]
    fn parse_bounded_clamps_out_of_range() {
        assert_eq!(parse_bounded("X", Some("1"), 5_000, 100, 300_000), 100);
        assert_eq!(
            parse_bounded("X", Some("999999999"), 5_000, 100, 300_000),
            300_000
        );
    }

    #[test]
    fn parse_bounded_falls_back_on_garbage() {
        assert_eq!(parse_bounded("X", Some("abc"), 5_000, 100, 300_000), 5_000);
        assert_eq!(parse_bounded("X", Some(""), 5_000, 100, 300_000), 5_000);
    }

    #[test]
    fn parse_format_defaults_to_jpeg() {
        assert_eq!(parse_format("X", None), ImageFormat::Jpeg);
        assert_eq!(parse_format("X", Some("bmp")), ImageFormat::Jpeg);
        assert_eq!(parse_format("X", Some("png")), ImageFormat::Png);
        assert_eq!(parse_format("X", Some("JPEG")), ImageFormat::Jpeg);
    }

    #[test]
    fn defaults_match_documented_values() {
        let kb = KeyboardConfig::default();
        assert_eq!(kb.key_delay_ms, 10);
        assert_eq!(kb.chunk_delay_ms, 50);
        assert_eq!(kb.chunk_size, 1_000);

        let cap = CaptureConfig::default();
        assert_eq!(cap.max_pixels, 33_177_600);
        assert_eq!(cap.default_quality, 85);
        assert_eq!(cap.default_max_width, 1_568);
        assert_eq!(cap.default_max_height, 0);

        let win = WindowConfig::default();
        assert_eq!(win.wait_timeout_ms, 30_000);
        assert_eq!(win.property_timeout_ms, 100);
    }
}
