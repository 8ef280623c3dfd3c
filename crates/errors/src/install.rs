//! Installation system error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

const HINT_REMOVE_MANUALLY: &str =
    "Remove the staging directory manually, then retry the installation.";

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum InstallError {
    #[error("invalid destination {path}: {reason}")]
    InvalidDestination { path: String, reason: String },

    #[error("filesystem operation failed: {operation} on {path}: {message}")]
    FilesystemError {
        operation: String,
        path: String,
        message: String,
    },

    #[error("failed to clean up staging directory {path}: {message}")]
    CleanupFailed { path: String, message: String },

    #[error("mod {mod_id} is already being installed")]
    AlreadyInstalling { mod_id: String },

    #[error("mod {mod_id} not found in {game_id}")]
    ModNotFound { game_id: String, mod_id: String },

    #[error("download {download_id} is not usable: {message}")]
    DownloadUnusable {
        download_id: String,
        message: String,
    },
}

impl InstallError {
    /// Shorthand for mapping an I/O failure onto a named filesystem
    /// operation.
    pub fn filesystem(
        operation: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        err: &std::io::Error,
    ) -> Self {
        Self::FilesystemError {
            operation: operation.into(),
            path: path.as_ref().display().to_string(),
            message: err.to_string(),
        }
    }
}

impl UserFacingError for InstallError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::CleanupFailed { .. } => Some(HINT_REMOVE_MANUALLY),
            Self::AlreadyInstalling { .. } => {
                Some("Wait for the running installation to finish.")
            }
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::AlreadyInstalling { .. })
    }
}
