//! Per-install mod info
//!
//! A typed record for the reserved keys plus an open map for whatever a
//! front-end attaches. Persisted with the mod after a successful install.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::lookup::LookupResult;

/// Identity hints carried over from the download that produced the
/// archive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadHints {
    #[serde(
        default,
        rename = "fileMD5",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_md5: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Game ids the download was tagged for, most specific first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub game: Vec<String>,
}

/// Front-end-defined fields with reserved meaning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// The info bag accompanying one install.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModInfo {
    #[serde(default)]
    pub download: DownloadHints,

    /// First metadata lookup result, merged in during the pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<LookupResult>,

    /// Installer dialog choices, for unattended re-install.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<serde_json::Value>,

    /// Attributes of the mod this install replaced, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<serde_json::Value>,

    #[serde(default)]
    pub custom: CustomFields,

    #[serde(flatten)]
    pub extras: BTreeMap<String, serde_json::Value>,
}
