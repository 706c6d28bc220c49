//! Error taxonomy for `wda_core`.
//!
//! Every public operation returns `Result<T, WdaError>`; nothing panics and
//! no OS error escapes untyped.  Each variant maps 1:1 onto a wire tag (see
//! [`WdaError::kind`]) that the embedding tool server serializes next to the
//! human-readable message.  Native failures are converted at the binding
//! seam ([`crate::native`]), never used as control flow.

use serde::Serialize;
use thiserror::Error;
use windows::core::Error as WindowsError;

/// Top-level error type for the automation engine.
///
/// Variants are grouped by the §7 policy: structural failures (bad input,
/// security preflights) surface immediately; transient failures are only
/// produced after the designed wait/retry loops have given up.
#[derive(Debug, Error)]
pub enum WdaError {
    /// The requested action name is not part of the tool surface.
    #[error("invalid action: {0}")]
    InvalidAction(String),

    /// A required parameter was absent from the request.
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    /// Coordinates or sizes outside the representable/virtual-screen range.
    #[error("invalid coordinates: {0}")]
    InvalidCoordinates(String),

    /// A window handle that does not parse or no longer refers to a window.
    #[error("invalid window handle: {0}")]
    InvalidHandle(String),

    /// A caller-supplied regex failed to compile.
    #[error("invalid regex: {0}")]
    InvalidRegex(String),

    /// Unknown image format string (only "jpeg" and "png" are accepted).
    #[error("invalid image format: {0}")]
    InvalidImageFormat(String),

    /// JPEG quality outside 1..=100.
    #[error("invalid quality: {0}")]
    InvalidQuality(String),

    /// No window matched the requested title/handle.
    #[error("window not found: {0}")]
    WindowNotFound(String),

    /// No element matched the query.
    #[error("element not found: {0}")]
    ElementNotFound(String),

    /// The element id refers to an element that left the tree or whose
    /// owning window closed.
    #[error("element no longer available: {0}")]
    ElementStale(String),

    /// The secure desktop (UAC prompt / lock screen) is active.
    #[error("secure desktop is active: {0}")]
    SecureDesktopActive(String),

    /// The foreground window belongs to an elevated process.
    #[error("elevated window is active: {0}")]
    ElevatedWindowActive(String),

    /// The target runs at a higher integrity level than this process.
    #[error("cross-elevation boundary: {0}")]
    CrossElevation(String),

    /// Every activation strategy failed to bring the window forward.
    #[error("activation failed: {0}")]
    ActivationFailed(String),

    #[error("move failed: {0}")]
    MoveFailed(String),

    #[error("resize failed: {0}")]
    ResizeFailed(String),

    #[error("close failed: {0}")]
    CloseFailed(String),

    /// Window or monitor enumeration failed at the OS level.
    #[error("enumeration failed: {0}")]
    EnumerationFailed(String),

    /// The element does not implement the UIA pattern the operation needs.
    #[error("pattern not supported: {0}")]
    PatternNotSupported(String),

    #[error("focus failed: {0}")]
    FocusFailed(String),

    /// A target guard was set and the foreground window did not match it.
    #[error("focus mismatch: {0}")]
    FocusMismatch(String),

    /// A wait loop or worker reply deadline expired.
    #[error("timeout: {0}")]
    Timeout(String),

    /// The caller's cancellation token fired.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("capture failed: {0}")]
    CaptureFailed(String),

    #[error("encoding failed: {0}")]
    EncodingFailed(String),

    /// The requested capture exceeds the configured pixel ceiling.
    #[error("pixel limit exceeded: {0}")]
    PixelLimitExceeded(String),

    /// Output path missing, unwritable, or pointing at a non-directory.
    #[error("invalid output path: {0}")]
    OutputPathInvalid(String),

    /// Anything the taxonomy has no better name for, including converted
    /// COM/Win32 failures and worker panics.
    #[error("system error: {0}")]
    SystemError(String),
}

impl WdaError {
    /// The stable wire tag for this error, serialized by the tool server.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAction(_) => "invalid_action",
            Self::MissingParameter(_) => "missing_required_parameter",
            Self::InvalidCoordinates(_) => "invalid_coordinates",
            Self::InvalidHandle(_) => "invalid_handle",
            Self::InvalidRegex(_) => "invalid_regex",
            Self::InvalidImageFormat(_) => "invalid_image_format",
            Self::InvalidQuality(_) => "invalid_quality",
            Self::WindowNotFound(_) => "window_not_found",
            Self::ElementNotFound(_) => "element_not_found",
            Self::ElementStale(_) => "element_stale",
            Self::SecureDesktopActive(_) => "secure_desktop_active",
            Self::ElevatedWindowActive(_) => "elevated_window_active",
            Self::CrossElevation(_) => "cross_elevation",
            Self::ActivationFailed(_) => "activation_failed",
            Self::MoveFailed(_) => "move_failed",
            Self::ResizeFailed(_) => "resize_failed",
            Self::CloseFailed(_) => "close_failed",
            Self::EnumerationFailed(_) => "enumeration_failed",
            Self::PatternNotSupported(_) => "pattern_not_supported",
            Self::FocusFailed(_) => "focus_failed",
            Self::FocusMismatch(_) => "focus_mismatch",
            Self::Timeout(_) => "timeout",
            Self::Cancelled(_) => "cancelled",
            Self::CaptureFailed(_) => "capture_failed",
            Self::EncodingFailed(_) => "encoding_failed",
            Self::PixelLimitExceeded(_) => "pixel_limit_exceeded",
            Self::OutputPathInvalid(_) => "output_path_invalid",
            Self::SystemError(_) => "system_error",
        }
    }
}

/// Convert a `windows::core::Error` (COM / Win32 HRESULT failure) into a
/// generic system error.  Call sites that know a better kind construct it
/// directly instead of relying on this blanket conversion.
impl From<WindowsError> for WdaError {
    fn from(err: WindowsError) -> Self {
        WdaError::SystemError(format!("Windows error: {err}"))
    }
}

/// Serialized envelope for one tool action.
///
/// The tool server never sees `WdaError` itself; it serializes this record,
/// which carries the success flag, the wire tag, the human-readable
/// sentence, and the action-specific payload.
#[derive(Debug, Clone, Serialize)]
pub struct ActionResult<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ActionResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            error: None,
            error_kind: None,
            data: Some(data),
        }
    }

    pub fn err(error: &WdaError) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            data: None,
        }
    }
}

impl<T: Serialize> From<Result<T, WdaError>> for ActionResult<T> {
    fn from(result: Result<T, WdaError>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::err(&e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_are_snake_case() {
        let errors = [
            WdaError::InvalidAction("x".into()),
            WdaError::MissingParameter("x".into()),
            WdaError::SecureDesktopActive("x".into()),
            WdaError::PatternNotSupported("x".into()),
            WdaError::PixelLimitExceeded("x".into()),
            WdaError::SystemError("x".into()),
        ];
        for e in &errors {
            let kind = e.kind();
            assert!(!kind.is_empty());
            assert!(kind
                .chars()
                .all(|c| c.is_ascii_lowercase() || c == '_'));
        }
    }

    #[test]
    fn timeout_message_carries_detail() {
        let e = WdaError::Timeout("timeout after 5000 ms; current state: maximized".into());
        assert_eq!(e.kind(), "timeout");
        assert!(e.to_string().contains("current state: maximized"));
    }

    #[test]
    fn action_result_ok_serialization() {
        let r = ActionResult::ok(serde_json::json!({"value": 1}));
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(!json.contains("error_kind"));
    }

    #[test]
    fn action_result_err_serialization() {
        let e = WdaError::WindowNotFound("no window titled 'Notepad'".into());
        let r: ActionResult<serde_json::Value> = ActionResult::err(&e);
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"success\":false"));
        assert!(json.contains("\"error_kind\":\"window_not_found\""));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn windows_error_converts_to_system_error() {
        let we = WindowsError::from_hresult(windows::core::HRESULT(-2147467259i32));
        let e: WdaError = we.into();
        assert_eq!(e.kind(), "system_error");
    }
}
