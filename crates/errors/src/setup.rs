//! Environment and configuration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SetupError {
    /// No registered installer declared support for the archive's file
    /// list.
    #[error("no installer can handle this archive (game {game_id})")]
    NoSupportedInstaller { game_id: String },

    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },
}
