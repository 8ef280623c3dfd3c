use modforge_types::{InstallStatus, ModInfo};
use serde::{Deserialize, Serialize};

/// Install pipeline events consumed by front-ends for activity indicators
/// and progress display
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    /// An activity indicator became visible
    IndicatorStarted { id: String, name: String },

    /// The activity indicator was dismissed
    IndicatorStopped {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mod_id: Option<String>,
    },

    /// An install context opened for a mod
    Started {
        game_id: String,
        mod_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archive_id: Option<String>,
    },

    /// The final install directory was chosen
    DestinationSet { mod_id: String, path: String },

    /// Install progress, 0-100
    Progress { mod_id: String, percent: f32 },

    /// The mod-type was recorded
    ModTypeSet { mod_id: String, mod_type: String },

    /// A titled error was reported against the running install
    ErrorReported {
        title: String,
        message: String,
        reportable: bool,
    },

    /// The context closed; emitted exactly once per install
    Finished {
        mod_id: String,
        status: InstallStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        info: Option<Box<ModInfo>>,
    },
}
