//! The dialog capability: request-reply interactions with the user.
//!
//! Every method may fail with [`modforge_errors::Error::UserCanceled`]
//! when the user dismisses the dialog; implementations for unattended
//! operation answer from recorded choices instead of prompting.

use async_trait::async_trait;

use modforge_errors::Result;

/// Outcome of the name-collision dialog (cancel is an error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameCollisionChoice {
    /// Install alongside the existing mod under `<base>+<variant>`.
    Variant(String),
    /// Remove the existing mod and reuse its id.
    Replace,
}

/// Outcome of the "older version installed" dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionChoice {
    /// Remove the prior mod, inherit its rules and overrides, reuse its id.
    Replace,
    /// Install separately under a new id.
    Install,
}

/// Counts shown before a dependency batch runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyPrompt {
    pub mod_name: String,
    pub install_count: usize,
    pub download_count: usize,
    pub errors: Vec<String>,
    pub recommended: bool,
}

#[async_trait]
pub trait DialogProvider: Send + Sync {
    /// Which of the candidate games should this archive be installed for?
    async fn select_game(&self, archive_name: &str, candidates: &[String]) -> Result<String>;

    /// The archive is password protected; ask for the password.
    async fn query_password(&self, archive_name: &str) -> Result<String>;

    /// Extraction produced non-critical errors; `Ok(())` means continue.
    /// When `allow_continue` is false only cancellation is offered.
    async fn confirm_continue_extraction(
        &self,
        archive_name: &str,
        errors: &[String],
        allow_continue: bool,
    ) -> Result<()>;

    /// A mod with this id already exists.
    async fn query_name_collision(&self, mod_id: &str) -> Result<NameCollisionChoice>;

    /// An older version of the same file is already installed.
    async fn query_version_replace(&self, mod_name: &str) -> Result<VersionChoice>;

    /// The file is not an archive; `Ok(())` means install it as a
    /// single-file mod.
    async fn confirm_single_file_mod(&self, file_name: &str) -> Result<()>;

    /// Confirm installing gathered dependencies; `Ok(())` enables the
    /// batch.
    async fn confirm_dependencies(&self, prompt: &DependencyPrompt) -> Result<()>;

    /// Pick which recommendations to install; returns indices into
    /// `items`. An empty selection means install nothing.
    async fn select_recommendations(
        &self,
        mod_name: &str,
        items: &[String],
    ) -> Result<Vec<usize>>;
}
