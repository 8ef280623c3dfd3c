//! The installer registry: priority-ordered installer strategies.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use modforge_errors::Result;
use modforge_types::Instruction;

/// Answer of an installer's support probe.
#[derive(Debug, Clone, Default)]
pub struct Supported {
    pub supported: bool,
    /// Files the installer relied on to make its decision.
    pub required_files: Vec<String>,
}

impl Supported {
    #[must_use]
    pub fn yes(required_files: Vec<String>) -> Self {
        Self {
            supported: true,
            required_files,
        }
    }

    #[must_use]
    pub fn no() -> Self {
        Self::default()
    }
}

/// Arguments to an installer run.
pub struct InstallerParams<'a> {
    /// Relative paths produced by extraction; directories carry a
    /// trailing separator.
    pub files: &'a [String],
    pub temp_path: &'a Path,
    pub game_id: &'a str,
    pub progress: &'a (dyn Fn(f32) + Send + Sync),
    /// Recorded dialog choices for unattended re-install.
    pub choices: Option<&'a serde_json::Value>,
    pub unattended: bool,
}

/// An installer strategy: inspects a file list, emits instructions.
///
/// `install` returning `None` means the installer already surfaced its
/// own error to the user; the pipeline treats it as a cancellation.
#[async_trait]
pub trait ModInstaller: Send + Sync {
    async fn test_supported(&self, files: &[String], game_id: &str) -> Result<Supported>;

    async fn install(&self, params: InstallerParams<'_>) -> Result<Option<Vec<Instruction>>>;
}

#[derive(Clone)]
struct RegisteredInstaller {
    priority: u32,
    installer: Arc<dyn ModInstaller>,
}

/// Priority-ordered list of installers. Lower priority goes first; ties
/// keep registration order. Holds no other state.
#[derive(Default)]
pub struct InstallerRegistry {
    entries: Vec<RegisteredInstaller>,
}

impl InstallerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an installer, keeping the list stably sorted by priority.
    pub fn register(&mut self, priority: u32, installer: Arc<dyn ModInstaller>) {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.priority > priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            pos,
            RegisteredInstaller {
                priority,
                installer,
            },
        );
    }

    /// The installers in scan order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Arc<dyn ModInstaller>> {
        self.entries
            .iter()
            .map(|entry| Arc::clone(&entry.installer))
            .collect()
    }

    /// Scan a snapshot in order; the first installer claiming support
    /// wins.
    ///
    /// # Errors
    ///
    /// Propagates a failing support probe.
    pub async fn find(
        installers: &[Arc<dyn ModInstaller>],
        files: &[String],
        game_id: &str,
    ) -> Result<Option<(Arc<dyn ModInstaller>, Supported)>> {
        for installer in installers {
            let supported = installer.test_supported(files, game_id).await?;
            if supported.supported {
                return Ok(Some((Arc::clone(installer), supported)));
            }
        }
        Ok(None)
    }
}

/// Installer synthesised over an explicit file list: stages exactly the
/// listed files, one copy instruction each.
pub struct FileListInstaller {
    files: Vec<String>,
}

impl FileListInstaller {
    #[must_use]
    pub fn new(files: Vec<String>) -> Self {
        Self { files }
    }
}

#[async_trait]
impl ModInstaller for FileListInstaller {
    async fn test_supported(&self, _files: &[String], _game_id: &str) -> Result<Supported> {
        Ok(Supported::yes(Vec::new()))
    }

    async fn install(&self, _params: InstallerParams<'_>) -> Result<Option<Vec<Instruction>>> {
        let instructions = self
            .files
            .iter()
            .filter(|file| !file.ends_with('/') && !file.ends_with('\\'))
            .map(|file| Instruction::Copy {
                source: file.clone(),
                destination: file.clone(),
            })
            .collect();
        Ok(Some(instructions))
    }
}
