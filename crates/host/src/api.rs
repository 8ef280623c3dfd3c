//! The bundle of host capabilities handed to the install manager.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use modforge_events::{EventEmitter, EventSender};

use crate::{ArchiveExtractor, DialogProvider, DownloadClient, MetaLookup, ModStore};

/// Everything the install core needs from its surroundings: the five
/// capability traits, the event bus, and the install directory layout.
#[derive(Clone)]
pub struct HostApi {
    pub store: Arc<dyn ModStore>,
    pub downloads: Arc<dyn DownloadClient>,
    pub lookup: Arc<dyn MetaLookup>,
    pub dialogs: Arc<dyn DialogProvider>,
    pub extractor: Arc<dyn ArchiveExtractor>,
    pub events: EventSender,
    install_base: PathBuf,
}

impl HostApi {
    pub fn new(
        store: Arc<dyn ModStore>,
        downloads: Arc<dyn DownloadClient>,
        lookup: Arc<dyn MetaLookup>,
        dialogs: Arc<dyn DialogProvider>,
        extractor: Arc<dyn ArchiveExtractor>,
        events: EventSender,
        install_base: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            downloads,
            lookup,
            dialogs,
            extractor,
            events,
            install_base: install_base.into(),
        }
    }

    /// Root of the per-game install tree; mods live in
    /// `<install_dir>/<mod_id>`.
    #[must_use]
    pub fn install_dir(&self, game_id: &str) -> PathBuf {
        self.install_base.join(game_id)
    }

    #[must_use]
    pub fn install_base(&self) -> &Path {
        &self.install_base
    }
}

impl EventEmitter for HostApi {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.events)
    }
}

impl std::fmt::Debug for HostApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostApi")
            .field("install_base", &self.install_base)
            .finish_non_exhaustive()
    }
}
