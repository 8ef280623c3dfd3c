//! The install manager: public surface and process-wide state.
//!
//! The only process-wide state is the serial queue and the two
//! registries, all created at startup. Everything per-install lives in
//! the pipeline.

use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use futures::FutureExt;
use modforge_errors::Result;
use modforge_host::HostApi;
use modforge_types::{ModInfo, Profile};
use tracing::warn;

use crate::config::InstallConfig;
use crate::deps;
use crate::modtypes::{ModTypeRegistry, ModTypeTest};
use crate::pipeline::InstallPipeline;
use crate::queue::InstallQueue;
use crate::registry::{InstallerRegistry, ModInstaller};

/// One install request: the archive plus everything known about it.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Download-manager id of the archive, when it came from a download.
    pub archive_id: Option<String>,
    pub archive_path: PathBuf,
    /// Games the download was tagged for; the user picks when ambiguous.
    pub download_game_ids: Vec<String>,
    pub info: ModInfo,
    /// Ask for dependency processing after the install (only honored when
    /// the manager is configured for it).
    pub process_dependencies: bool,
    /// Enable the mod in the active profile after install.
    pub enable: bool,
    /// Skip game resolution and install for this game.
    pub force_game_id: Option<String>,
    /// Install exactly these files instead of consulting the registry.
    pub file_list: Option<Vec<String>>,
    /// Suppress interactive installer dialogs (dependency installs).
    pub unattended: bool,
}

impl InstallRequest {
    #[must_use]
    pub fn new(archive_path: impl Into<PathBuf>) -> Self {
        Self {
            archive_id: None,
            archive_path: archive_path.into(),
            download_game_ids: Vec::new(),
            info: ModInfo::default(),
            process_dependencies: false,
            enable: false,
            force_game_id: None,
            file_list: None,
            unattended: false,
        }
    }

    #[must_use]
    pub fn with_archive_id(mut self, archive_id: impl Into<String>) -> Self {
        self.archive_id = Some(archive_id.into());
        self
    }

    #[must_use]
    pub fn with_game_ids(mut self, game_ids: Vec<String>) -> Self {
        self.download_game_ids = game_ids;
        self
    }

    #[must_use]
    pub fn with_info(mut self, info: ModInfo) -> Self {
        self.info = info;
        self
    }

    #[must_use]
    pub fn with_process_dependencies(mut self, process: bool) -> Self {
        self.process_dependencies = process;
        self
    }

    #[must_use]
    pub fn with_enable(mut self, enable: bool) -> Self {
        self.enable = enable;
        self
    }

    #[must_use]
    pub fn with_force_game(mut self, game_id: impl Into<String>) -> Self {
        self.force_game_id = Some(game_id.into());
        self
    }

    #[must_use]
    pub fn with_file_list(mut self, file_list: Option<Vec<String>>) -> Self {
        self.file_list = file_list;
        self
    }

    #[must_use]
    pub fn with_unattended(mut self, unattended: bool) -> Self {
        self.unattended = unattended;
        self
    }
}

/// Coordinates archive installs: owns the installer registry, the
/// mod-type registry, and the serial install queue.
pub struct InstallManager {
    pub(crate) api: HostApi,
    pub(crate) config: InstallConfig,
    registry: Arc<RwLock<InstallerRegistry>>,
    mod_types: Arc<RwLock<ModTypeRegistry>>,
    queue: InstallQueue,
    pub(crate) active_deps: DashMap<String, ()>,
}

impl InstallManager {
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    pub fn new(api: HostApi, config: InstallConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            api,
            config,
            registry: Arc::new(RwLock::new(InstallerRegistry::new())),
            mod_types: Arc::new(RwLock::new(ModTypeRegistry::new())),
            queue: InstallQueue::new(),
            active_deps: DashMap::new(),
        })
    }

    /// Register an installer strategy. Lower priority is consulted first.
    pub fn register_installer(&self, priority: u32, installer: Arc<dyn ModInstaller>) {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(priority, installer);
    }

    /// Register a game-specific mod-type tester.
    pub fn register_mod_type(&self, game_id: &str, mod_type: Arc<dyn ModTypeTest>) {
        self.mod_types
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(game_id, mod_type);
    }

    /// Install one archive. The pipeline is appended to the serial queue;
    /// the returned id is the catalogued mod id.
    ///
    /// # Errors
    ///
    /// Any pipeline failure, including `UserCanceled` when the user
    /// dismissed one of the install dialogs.
    pub fn install<'a>(
        &'a self,
        request: InstallRequest,
    ) -> futures::future::BoxFuture<'a, Result<String>> {
        async move {
            let process_dependencies = request.process_dependencies;
            let game_hint = request
                .force_game_id
                .clone()
                .or_else(|| request.download_game_ids.first().cloned());

            let pipeline = InstallPipeline::new(
                self.api.clone(),
                Arc::clone(&self.registry),
                Arc::clone(&self.mod_types),
                request,
            );
            let mod_id = self.queue.enqueue(pipeline.run()).await?;

            // Dependency auto-chaining is opt-in via config; it runs after the
            // queue slot is released so child installs can enqueue.
            if self.config.auto_install_dependencies && process_dependencies {
                if let Some(game_id) = game_hint {
                    if let Some(profile) = self.api.store.active_profile(&game_id).await? {
                        if let Err(err) =
                            deps::install_dependencies_impl(self, &profile, &mod_id, false, true)
                                .await
                        {
                            if !err.is_user_canceled() {
                                warn!(mod_id = %mod_id, %err, "automatic dependency installation failed");
                            }
                        }
                    }
                }
            }

            Ok(mod_id)
        }
        .boxed()
    }

    /// Install the `requires` dependencies of an installed mod.
    ///
    /// # Errors
    ///
    /// `UserCanceled` when the user aborts the batch; host failures
    /// otherwise. Individual dependency failures do not fail the call.
    pub async fn install_dependencies(
        &self,
        profile: &Profile,
        mod_id: &str,
        silent: bool,
    ) -> Result<()> {
        deps::install_dependencies_impl(self, profile, mod_id, false, silent).await
    }

    /// Install the `recommends` dependencies of an installed mod, after
    /// asking the user which ones to take.
    ///
    /// # Errors
    ///
    /// Same contract as [`Self::install_dependencies`].
    pub async fn install_recommendations(&self, profile: &Profile, mod_id: &str) -> Result<()> {
        deps::install_dependencies_impl(self, profile, mod_id, true, false).await
    }
}
