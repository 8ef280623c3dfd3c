//! The download manager interface
//!
//! Downloads run in their own subsystem; the install core only starts,
//! resumes, and inspects them. `start_download` and `resume_download`
//! resolve once the download has finished, so a returned id always refers
//! to a locatable archive.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use modforge_errors::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadState {
    Init,
    Started,
    Paused,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadInfo {
    pub id: String,
    pub state: DownloadState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,
    #[serde(default)]
    pub game_ids: Vec<String>,
    #[serde(
        default,
        rename = "fileMD5",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_md5: Option<String>,
}

#[async_trait]
pub trait DownloadClient: Send + Sync {
    /// Start a download from the given mirror urls; resolves with the
    /// download id once finished.
    async fn start_download(&self, urls: Vec<String>, file_name: Option<String>)
        -> Result<String>;

    /// Ask the source repository for the newest file of a mod matching a
    /// version pattern and download it. Returns the ids of the started
    /// downloads.
    async fn start_download_update(
        &self,
        source: &str,
        game_id: &str,
        mod_id: &str,
        file_id: &str,
        version_pattern: &str,
    ) -> Result<Vec<String>>;

    /// Resume a paused download; resolves once finished.
    async fn resume_download(&self, download_id: &str) -> Result<()>;

    async fn download(&self, download_id: &str) -> Result<Option<DownloadInfo>>;

    /// Find an existing download by content hash.
    async fn find_by_md5(&self, file_md5: &str) -> Result<Option<String>>;
}
