//! The per-pipeline install context: progress, indicator, and error
//! reporting bound to one game and mod id.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use modforge_events::{AppEvent, EventEmitter, EventSender, InstallEvent};
use modforge_types::{InstallStatus, ModInfo};
use tracing::debug;
use uuid::Uuid;

/// Created when a pipeline starts, closed exactly once on every exit
/// path. All methods take `&self`; progress and completion state are
/// atomics so the context can be shared with progress callbacks.
pub struct InstallContext {
    events: EventSender,
    game_id: String,
    mod_id: String,
    archive_id: Option<String>,
    indicator_id: Uuid,
    /// Last reported progress in tenths of a percent.
    last_tenths: AtomicU32,
    finished: AtomicBool,
}

impl InstallContext {
    #[must_use]
    pub fn new(
        events: EventSender,
        game_id: impl Into<String>,
        mod_id: impl Into<String>,
        archive_id: Option<String>,
    ) -> Self {
        Self {
            events,
            game_id: game_id.into(),
            mod_id: mod_id.into(),
            archive_id,
            indicator_id: Uuid::new_v4(),
            last_tenths: AtomicU32::new(u32::MAX),
            finished: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn mod_id(&self) -> &str {
        &self.mod_id
    }

    pub fn start_indicator(&self, name: &str) {
        self.emit(AppEvent::Install(InstallEvent::IndicatorStarted {
            id: self.indicator_id.to_string(),
            name: name.to_string(),
        }));
    }

    pub fn start_install(&self) {
        self.emit(AppEvent::Install(InstallEvent::Started {
            game_id: self.game_id.clone(),
            mod_id: self.mod_id.clone(),
            archive_id: self.archive_id.clone(),
        }));
    }

    pub fn set_install_path(&self, path: &Path) {
        self.emit(AppEvent::Install(InstallEvent::DestinationSet {
            mod_id: self.mod_id.clone(),
            path: path.display().to_string(),
        }));
    }

    /// Report progress in percent. Values are clamped to 0..=100 and only
    /// emitted when they moved by at least a tenth of a point, to keep
    /// the bus quiet during large extractions.
    pub fn set_progress(&self, percent: f32) {
        let clamped = percent.clamp(0.0, 100.0);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let tenths = (clamped * 10.0) as u32;
        if self.last_tenths.swap(tenths, Ordering::Relaxed) == tenths {
            return;
        }
        self.emit(AppEvent::Install(InstallEvent::Progress {
            mod_id: self.mod_id.clone(),
            percent: clamped,
        }));
    }

    pub fn set_mod_type(&self, mod_type: &str) {
        self.emit(AppEvent::Install(InstallEvent::ModTypeSet {
            mod_id: self.mod_id.clone(),
            mod_type: mod_type.to_string(),
        }));
    }

    pub fn report_error(&self, title: &str, message: &str, reportable: bool) {
        self.emit(AppEvent::Install(InstallEvent::ErrorReported {
            title: title.to_string(),
            message: message.to_string(),
            reportable,
        }));
    }

    /// Close the context. The first call wins; later calls are dropped so
    /// error paths can finish unconditionally.
    pub fn finish_install(&self, status: InstallStatus, info: Option<ModInfo>) {
        if self.finished.swap(true, Ordering::SeqCst) {
            debug!(mod_id = %self.mod_id, "install context already finished");
            return;
        }
        self.emit(AppEvent::Install(InstallEvent::Finished {
            mod_id: self.mod_id.clone(),
            status,
            info: info.map(Box::new),
        }));
    }

    pub fn stop_indicator(&self) {
        self.emit(AppEvent::Install(InstallEvent::IndicatorStopped {
            id: self.indicator_id.to_string(),
            mod_id: Some(self.mod_id.clone()),
        }));
    }
}

impl EventEmitter for InstallContext {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.events)
    }
}
