//! Output-path normalization for capture files.
//!
//! Callers frequently pass forward-slash paths (`C:/temp/shot.png`).  Only
//! fully-qualified Windows paths are rewritten to backslashes; relative
//! paths and URLs pass through untouched.

use std::path::{Path, PathBuf};

use crate::errors::WdaError;

/// True for `C:\...`, `C:/...`, and UNC (`\\server\share`) paths.
fn is_fully_qualified_windows(path: &str) -> bool {
    let bytes = path.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
    {
        return true;
    }
    path.starts_with("\\\\") || path.starts_with("//")
}

fn looks_like_url(path: &str) -> bool {
    path.contains("://")
}

/// Convert forward slashes to the OS-native separator, but only when the
/// input is a fully-qualified Windows path.
pub fn normalize_path(input: &str) -> String {
    if looks_like_url(input) || !is_fully_qualified_windows(input) {
        return input.to_owned();
    }
    input.replace('/', "\\")
}

/// Validate a caller-supplied capture output path: the containing directory
/// must already exist.  Returns the normalized path.
pub fn validate_output_path(input: &str) -> Result<PathBuf, WdaError> {
    if input.trim().is_empty() {
        return Err(WdaError::OutputPathInvalid(
            "output path is empty".into(),
        ));
    }

    let normalized = normalize_path(input);
    let path = PathBuf::from(&normalized);

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !Path::new(&parent).is_dir() {
        return Err(WdaError::OutputPathInvalid(format!(
            "directory does not exist: {}",
            parent.display()
        )));
    }

    Ok(path)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drive_letter_forward_slashes_are_rewritten() {
        assert_eq!(
            normalize_path("C:/Users/me/shot.png"),
            "C:\\Users\\me\\shot.png"
        );
        assert_eq!(normalize_path("c:/temp/x.jpg"), "c:\\temp\\x.jpg");
    }

    #[test]
    fn relative_paths_pass_through() {
        assert_eq!(normalize_path("shots/one.png"), "shots/one.png");
        assert_eq!(normalize_path("./x.png"), "./x.png");
    }

    #[test]
    fn urls_pass_through() {
        assert_eq!(
            normalize_path("https://example.com/a/b.png"),
            "https://example.com/a/b.png"
        );
    }

    #[test]
    fn unc_paths_are_rewritten() {
        assert_eq!(
            normalize_path("//server/share/shot.png"),
            "\\\\server\\share\\shot.png"
        );
    }

    #[test]
    fn already_native_paths_are_unchanged() {
        assert_eq!(
            normalize_path("C:\\Users\\me\\shot.png"),
            "C:\\Users\\me\\shot.png"
        );
    }

    #[test]
    fn empty_output_path_is_rejected() {
        assert!(matches!(
            validate_output_path("  "),
            Err(WdaError::OutputPathInvalid(_))
        ));
    }

    #[test]
    fn missing_directory_is_rejected() {
        let result = validate_output_path("Z:/definitely/not/a/dir/shot.png");
        assert!(matches!(result, Err(WdaError::OutputPathInvalid(_))));
    }
}
