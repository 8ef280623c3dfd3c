use serde::{Deserialize, Serialize};

pub mod dependency;
pub mod general;
pub mod install;
pub mod mods;

pub use dependency::DependencyEvent;
pub use general::{GeneralEvent, NotificationKind};
pub use install::InstallEvent;
pub use mods::ModEvent;

/// Top-level application event enum that aggregates all domain-specific
/// events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "domain", content = "event", rename_all = "snake_case")]
pub enum AppEvent {
    /// General utility events (warnings, errors, notifications)
    General(GeneralEvent),

    /// Install pipeline events (context lifecycle, progress)
    Install(InstallEvent),

    /// Mod catalogue lifecycle events (will/did install, enabled)
    Mod(ModEvent),

    /// Dependency resolution and batch install events
    Dependency(DependencyEvent),
}

impl AppEvent {
    /// Determine the appropriate tracing log level for this event
    #[must_use]
    pub fn log_level(&self) -> tracing::Level {
        use tracing::Level;

        match self {
            AppEvent::General(GeneralEvent::Error { .. })
            | AppEvent::Install(InstallEvent::ErrorReported { .. })
            | AppEvent::Dependency(DependencyEvent::InstallFailed { .. }) => Level::ERROR,

            AppEvent::General(GeneralEvent::Warning { .. })
            | AppEvent::Dependency(DependencyEvent::Skipped { .. }) => Level::WARN,

            AppEvent::General(GeneralEvent::DebugLog { .. })
            | AppEvent::Install(InstallEvent::Progress { .. }) => Level::DEBUG,

            _ => Level::INFO,
        }
    }
}
