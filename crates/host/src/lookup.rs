//! Metadata lookup service interface

use async_trait::async_trait;
use std::path::Path;

use modforge_errors::Result;
use modforge_types::LookupResult;

#[async_trait]
pub trait MetaLookup: Send + Sync {
    /// Look up file metadata by path, hash, and size. Results are ordered
    /// best-match first; the pipeline merges the first one into the mod
    /// info.
    async fn lookup(
        &self,
        file_path: Option<&Path>,
        file_md5: Option<&str>,
        file_size: Option<u64>,
        game_id: &str,
    ) -> Result<Vec<LookupResult>>;
}
