//! Persisted mod entries and profile state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::reference::ModRule;

/// Well-known attribute keys persisted on a mod entry.
pub mod attr {
    pub const NAME: &str = "name";
    pub const VERSION: &str = "version";
    pub const FILE_NAME: &str = "fileName";
    pub const FILE_VERSION: &str = "fileVersion";
    pub const FILE_MD5: &str = "fileMD5";
    pub const FILE_SIZE: &str = "fileSize";
    pub const FILE_ID: &str = "fileId";
    pub const NEWEST_FILE_ID: &str = "newestFileId";
    pub const MOD_ID: &str = "modId";
    pub const LOGICAL_FILE_NAME: &str = "logicalFileName";
    pub const CUSTOM_FILE_NAME: &str = "customFileName";
    pub const INSTALL_TIME: &str = "installTime";
    pub const VARIANT: &str = "variant";
}

/// Lifecycle state of a persisted mod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModState {
    Installing,
    Installed,
}

/// Terminal (and initial) status of an install context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallStatus {
    Started,
    Success,
    Failed,
    Canceled,
}

/// The store's view of one catalogued mod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModEntry {
    pub id: String,
    pub state: ModState,
    /// Mod-type classifier; empty string means default deployment.
    #[serde(default, rename = "type")]
    pub mod_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive_id: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub rules: Vec<ModRule>,
    #[serde(default)]
    pub file_overrides: Vec<String>,
}

impl ModEntry {
    /// Create a fresh entry in `installing` state.
    #[must_use]
    pub fn installing(id: impl Into<String>, archive_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            state: ModState::Installing,
            mod_type: String::new(),
            archive_id,
            attributes: BTreeMap::new(),
            rules: Vec::new(),
            file_overrides: Vec::new(),
        }
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    /// String-typed attribute accessor.
    #[must_use]
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

/// External profile state: which mods are enabled. Mutated only through
/// the host interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: String,
    pub game_id: String,
    #[serde(default)]
    pub mod_state: BTreeMap<String, bool>,
}

impl Profile {
    #[must_use]
    pub fn is_enabled(&self, mod_id: &str) -> bool {
        self.mod_state.get(mod_id).copied().unwrap_or(false)
    }
}
