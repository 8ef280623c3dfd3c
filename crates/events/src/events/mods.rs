use modforge_types::ModInfo;
use serde::{Deserialize, Serialize};

/// Mod catalogue lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModEvent {
    /// Emitted before any filesystem work for an install begins
    WillInstall {
        game_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archive_id: Option<String>,
        mod_id: String,
    },

    /// Emitted after a mod was installed and catalogued
    DidInstall {
        game_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archive_id: Option<String>,
        mod_id: String,
        info: Box<ModInfo>,
    },

    /// Mods were enabled or disabled in a profile
    Enabled {
        mod_ids: Vec<String>,
        enabled: bool,
        game_id: String,
    },
}
