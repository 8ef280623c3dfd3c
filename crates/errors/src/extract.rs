//! Archive extraction error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ExtractError {
    /// The extractor reported a message that marks the archive itself as
    /// damaged ("unexpected end of archive", "data error", "cannot open
    /// as archive").
    #[error("archive is damaged: {message}")]
    ArchiveBroken { message: String },

    /// Extraction exited with a non-zero code and the user declined to
    /// continue, or no output was produced at all.
    #[error("extraction failed with code {code}: {}", .messages.join("; "))]
    Failed { code: i32, messages: Vec<String> },

    /// The archive is password protected and no valid password was
    /// supplied.
    #[error("archive requires a password")]
    PasswordRequired,
}

impl UserFacingError for ExtractError {
    fn user_message(&self) -> Cow<'_, str> {
        match self {
            Self::ArchiveBroken { .. } => Cow::Borrowed(
                "The archive is damaged. Please re-download it; if the problem persists, \
                 the file on the server is broken.",
            ),
            _ => Cow::Owned(self.to_string()),
        }
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::PasswordRequired => Some("Enter the archive password when prompted."),
            _ => None,
        }
    }

    fn is_retryable(&self) -> bool {
        matches!(self, Self::PasswordRequired)
    }
}
