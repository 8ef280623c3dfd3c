use serde::{Deserialize, Serialize};

/// Dependency resolution and batch install events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DependencyEvent {
    /// A dependency batch is about to run
    WillInstall {
        profile_id: String,
        mod_id: String,
        recommended: bool,
    },

    /// A dependency batch finished (including partial failure)
    DidInstall {
        profile_id: String,
        mod_id: String,
        recommended: bool,
    },

    /// One dependency was dropped from the batch
    Skipped { reference: String, reason: String },

    /// One dependency failed without aborting the batch
    InstallFailed { reference: String, message: String },
}
