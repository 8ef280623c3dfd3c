//! Metadata lookup results

use serde::{Deserialize, Serialize};

use crate::reference::ModRule;

/// One result from the metadata lookup service, keyed by file identity
/// (hash, size, name).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_version: Option<String>,

    #[serde(
        default,
        rename = "fileMD5",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_md5: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_file_name: Option<String>,

    /// Repository the file is hosted on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Repository id of the mod this file belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<String>,

    /// Repository id of this specific file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,

    /// Where the file can be downloaded from.
    #[serde(
        default,
        rename = "sourceURI",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_uri: Option<String>,

    /// Rules the metadata service knows about for this file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Vec<ModRule>>,
}
