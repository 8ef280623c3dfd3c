//! Destination path validation
//!
//! Installer-produced destinations are untrusted input: they may carry a
//! leading separator (tolerated), foreign separators, traversal
//! components, reserved device names, or exceed the OS path length. A
//! destination is sanitised once at ingest; everything downstream works
//! with the sanitised relative path.

use std::path::{Path, PathBuf};

use modforge_errors::{Error, InstallError};

/// Longest destination path accepted, matching OS limits.
pub const MAX_PATH_LEN: usize = if cfg!(windows) { 260 } else { 4096 };

#[cfg(windows)]
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Sanitise an instruction destination. One leading separator is
/// tolerated (some installer formats emit them); separators are rewritten
/// to the platform separator only on platforms that distinguish them.
///
/// # Errors
///
/// Returns [`InstallError::InvalidDestination`] when the path is empty,
/// absolute, escapes the staging root, uses a reserved name, or is too
/// long.
pub fn sanitize_destination(destination: &str) -> Result<String, Error> {
    let trimmed = destination
        .strip_prefix('/')
        .or_else(|| destination.strip_prefix('\\'))
        .unwrap_or(destination);

    if trimmed.is_empty() {
        return Err(invalid(destination, "empty path"));
    }

    let normalized = if cfg!(windows) {
        trimmed.replace('/', "\\")
    } else {
        trimmed.to_string()
    };

    if normalized.len() > MAX_PATH_LEN {
        return Err(invalid(destination, "path exceeds OS length limit"));
    }
    if Path::new(&normalized).is_absolute() || normalized.starts_with('/') {
        return Err(invalid(destination, "absolute path"));
    }

    let sep = if cfg!(windows) { '\\' } else { '/' };
    for component in normalized.split(sep) {
        if component == ".." {
            return Err(invalid(destination, "escapes the install directory"));
        }
        #[cfg(windows)]
        {
            let stem = component
                .split('.')
                .next()
                .unwrap_or(component)
                .to_ascii_uppercase();
            if RESERVED_NAMES.contains(&stem.as_str()) {
                return Err(invalid(destination, "reserved file name"));
            }
        }
    }

    Ok(normalized)
}

/// Join a sanitised destination onto a root, re-checking that the result
/// stays inside it.
///
/// # Errors
///
/// Returns [`InstallError::InvalidDestination`] when the joined path
/// would leave `root`.
pub fn join_destination(root: &Path, sanitized: &str) -> Result<PathBuf, Error> {
    let joined = root.join(sanitized);
    if !joined.starts_with(root) {
        return Err(invalid(sanitized, "escapes the install directory"));
    }
    Ok(joined)
}

fn invalid(path: &str, reason: &str) -> Error {
    InstallError::InvalidDestination {
        path: path.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
