#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the modforge install core
//!
//! This crate provides fine-grained error types organized by domain,
//! wrapped by a single [`Error`] enum for cross-crate boundaries. The
//! wrapper also carries the cancellation kinds that drive install
//! pipeline policy: user cancellation, policy refusal, and transient
//! failure are first-class variants rather than domain errors.

pub mod extract;
pub mod install;
pub mod setup;
pub mod structured;

pub use extract::ExtractError;
pub use install::InstallError;
pub use setup::SetupError;
pub use structured::UserFacingError;

use thiserror::Error;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// The user dismissed a dialog or otherwise declined to proceed.
    #[error("canceled by user")]
    UserCanceled,

    /// A policy refusal: no game selected, empty archive, fatal installer
    /// error. Never reportable.
    #[error("canceled: {message}")]
    ProcessCanceled { message: String },

    /// A transient failure that may succeed on retry.
    #[error("temporary failure: {message}")]
    Temporary { message: String },

    /// An installer produced data the processor cannot act on.
    #[error("invalid installer data: {message}")]
    DataInvalid { message: String },

    /// A referenced resource (dependency source, download, mod) is gone.
    #[error("not found: {message}")]
    NotFound { message: String },

    #[error("extraction error: {0}")]
    Extract(#[from] ExtractError),

    #[error("setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("install error: {0}")]
    Install(#[from] InstallError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        #[cfg_attr(feature = "serde", serde(with = "io_kind_as_str"))]
        kind: std::io::ErrorKind,
        message: String,
        #[cfg_attr(feature = "serde", serde(with = "opt_path_buf"))]
        path: Option<std::path::PathBuf>,
    },
}

/// Terminal disposition of an install context when a pipeline errors out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The pipeline was canceled; nothing to report.
    Canceled,
    /// The pipeline genuinely failed.
    Failed,
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create a `ProcessCanceled` error with a message
    pub fn process_canceled(msg: impl Into<String>) -> Self {
        Self::ProcessCanceled {
            message: msg.into(),
        }
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// True when the user explicitly dismissed a dialog.
    #[must_use]
    pub fn is_user_canceled(&self) -> bool {
        matches!(self, Self::UserCanceled)
    }

    /// True for policy refusals (`ProcessCanceled`).
    #[must_use]
    pub fn is_process_canceled(&self) -> bool {
        matches!(self, Self::ProcessCanceled { .. })
    }

    /// Whether this error warrants an error report. Cancellations, policy
    /// refusals, broken archives, setup and installer-data problems are
    /// the user's (or the mod author's) to resolve; everything else is
    /// unexpected and reportable.
    #[must_use]
    pub fn reportable(&self) -> bool {
        !matches!(
            self,
            Self::UserCanceled
                | Self::ProcessCanceled { .. }
                | Self::Temporary { .. }
                | Self::DataInvalid { .. }
                | Self::NotFound { .. }
                | Self::Extract(_)
                | Self::Setup(_)
        )
    }

    /// Map a terminal pipeline error to the context status it should
    /// finish with.
    #[must_use]
    pub fn disposition(&self) -> Disposition {
        match self {
            Self::UserCanceled | Self::ProcessCanceled { .. } | Self::Temporary { .. } => {
                Disposition::Canceled
            }
            _ => Disposition::Failed,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {err}"))
    }
}

/// Result type alias for modforge operations
pub type Result<T> = std::result::Result<T, Error>;

// Serde helper modules for optional path and io::ErrorKind as string
#[cfg(feature = "serde")]
mod io_kind_as_str {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S>(kind: &std::io::ErrorKind, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format!("{kind:?}"))
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<std::io::ErrorKind, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        // Best effort mapping; default to Other
        Ok(match s.as_str() {
            "NotFound" => std::io::ErrorKind::NotFound,
            "PermissionDenied" => std::io::ErrorKind::PermissionDenied,
            "AlreadyExists" => std::io::ErrorKind::AlreadyExists,
            "InvalidInput" => std::io::ErrorKind::InvalidInput,
            "InvalidData" => std::io::ErrorKind::InvalidData,
            "TimedOut" => std::io::ErrorKind::TimedOut,
            "Interrupted" => std::io::ErrorKind::Interrupted,
            "Unsupported" => std::io::ErrorKind::Unsupported,
            "UnexpectedEof" => std::io::ErrorKind::UnexpectedEof,
            _ => std::io::ErrorKind::Other,
        })
    }
}

#[cfg(feature = "serde")]
mod opt_path_buf {
    use serde::{Deserialize, Deserializer, Serializer};
    #[allow(clippy::ref_option)]
    pub fn serialize<S>(path: &Option<std::path::PathBuf>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match path {
            Some(pb) => s.serialize_some(&pb.display().to_string()),
            None => s.serialize_none(),
        }
    }
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<std::path::PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt = Option::<String>::deserialize(deserializer)?;
        Ok(opt.map(std::path::PathBuf::from))
    }
}
