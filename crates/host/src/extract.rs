//! The archive codec, treated as an opaque extractor.

use async_trait::async_trait;
use std::path::Path;

use modforge_errors::Result;

/// Result of a full extraction. `code != 0` with non-critical `errors`
/// leaves the decision to continue with the user.
#[derive(Debug, Clone, Default)]
pub struct ExtractOutcome {
    pub code: i32,
    pub errors: Vec<String>,
}

#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Extract `archive` into `dest`, reporting progress as a fraction in
    /// 0..=1. A password-protected archive fails with
    /// [`modforge_errors::ExtractError::PasswordRequired`] until a valid
    /// `password` is supplied.
    async fn extract_full(
        &self,
        archive: &Path,
        dest: &Path,
        progress: &(dyn Fn(f32) + Send + Sync),
        password: Option<&str>,
    ) -> Result<ExtractOutcome>;
}
