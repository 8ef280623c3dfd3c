//! The install pipeline: one archive in, one catalogued mod out.
//!
//! The pipeline is an explicit state machine driven one step at a time;
//! every terminal path funnels through [`InstallPipeline::finish`], which
//! removes the staging directory, closes the install context, and stops
//! the indicator. A step either completes or fails the whole pipeline —
//! resumption only happens at the queue boundary.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use futures::future::BoxFuture;
use futures::FutureExt;
use md5::{Digest, Md5};
use modforge_errors::{Disposition, Error, ExtractError, Result, SetupError, UserFacingError};
use modforge_events::{AppEvent, EventEmitter, ModEvent, NotificationKind};
use modforge_host::HostApi;
use modforge_types::{attr, InstallStatus, ModEntry, ModInfo, ModState};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::archive;
use crate::context::InstallContext;
use crate::manager::InstallRequest;
use crate::modtypes::ModTypeRegistry;
use crate::policy;
use crate::processor::{InstructionProcessor, SubmoduleHandler};
use crate::registry::{
    FileListInstaller, InstallerParams, InstallerRegistry, ModInstaller,
};

const BROWSER_ASSISTANT_ADVISORY: &str =
    "The installation failed due to an interfering \"Browser Assistant\" process on your \
     system. Remove that software, then retry the installation.";

/// The linear states of one install. Enqueueing happens before the
/// machine starts; error/cancel handling is unified in `finish`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstallPhase {
    ResolveGame,
    Hash,
    LookupMeta,
    DeriveName,
    VersionChoice,
    StartContext,
    Extract,
    Enumerate,
    SelectInstaller,
    RunInstaller,
    DetermineModType,
    ProcessInstructions,
    Finalize,
    Done,
}

pub(crate) struct InstallPipeline {
    api: HostApi,
    registry: Arc<RwLock<InstallerRegistry>>,
    mod_types: Arc<RwLock<ModTypeRegistry>>,
    request: InstallRequest,

    game_id: String,
    info: ModInfo,
    mod_id: String,
    enable: bool,
    initial_attributes: BTreeMap<String, serde_json::Value>,
    inherited_rules: Vec<modforge_types::ModRule>,
    inherited_overrides: Vec<String>,
    context: Option<InstallContext>,
    destination: PathBuf,
    temp_path: PathBuf,
    files: Vec<String>,
    installer: Option<Arc<dyn ModInstaller>>,
    instructions: Vec<modforge_types::Instruction>,
}

impl InstallPipeline {
    pub(crate) fn new(
        api: HostApi,
        registry: Arc<RwLock<InstallerRegistry>>,
        mod_types: Arc<RwLock<ModTypeRegistry>>,
        request: InstallRequest,
    ) -> Self {
        let info = request.info.clone();
        Self {
            api,
            registry,
            mod_types,
            request,
            game_id: String::new(),
            info,
            mod_id: String::new(),
            enable: false,
            initial_attributes: BTreeMap::new(),
            inherited_rules: Vec::new(),
            inherited_overrides: Vec::new(),
            context: None,
            destination: PathBuf::new(),
            temp_path: PathBuf::new(),
            files: Vec::new(),
            installer: None,
            instructions: Vec::new(),
        }
    }

    /// Run the machine to completion and return the installed mod id.
    pub(crate) async fn run(mut self) -> Result<String> {
        let result = self.drive().await;
        self.finish(result).await
    }

    async fn drive(&mut self) -> Result<()> {
        let mut phase = InstallPhase::ResolveGame;
        loop {
            debug!(?phase, archive = %self.archive_name(), "install pipeline step");
            phase = match phase {
                InstallPhase::ResolveGame => {
                    self.resolve_game().await?;
                    InstallPhase::Hash
                }
                InstallPhase::Hash => {
                    self.hash_archive().await;
                    InstallPhase::LookupMeta
                }
                InstallPhase::LookupMeta => {
                    self.lookup_meta().await;
                    InstallPhase::DeriveName
                }
                InstallPhase::DeriveName => {
                    self.derive_name().await?;
                    InstallPhase::VersionChoice
                }
                InstallPhase::VersionChoice => {
                    self.version_choice().await?;
                    InstallPhase::StartContext
                }
                InstallPhase::StartContext => {
                    self.start_context().await?;
                    InstallPhase::Extract
                }
                InstallPhase::Extract => {
                    self.extract().await?;
                    InstallPhase::Enumerate
                }
                InstallPhase::Enumerate => {
                    self.enumerate().await?;
                    InstallPhase::SelectInstaller
                }
                InstallPhase::SelectInstaller => {
                    self.select_installer().await?;
                    InstallPhase::RunInstaller
                }
                InstallPhase::RunInstaller => {
                    self.run_installer().await?;
                    InstallPhase::DetermineModType
                }
                InstallPhase::DetermineModType => {
                    self.determine_mod_type().await?;
                    InstallPhase::ProcessInstructions
                }
                InstallPhase::ProcessInstructions => {
                    self.process_instructions().await?;
                    InstallPhase::Finalize
                }
                InstallPhase::Finalize => {
                    self.finalize().await?;
                    InstallPhase::Done
                }
                InstallPhase::Done => return Ok(()),
            };
        }
    }

    fn archive_name(&self) -> String {
        self.request
            .archive_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    fn registry_snapshot(&self) -> Vec<Arc<dyn ModInstaller>> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    async fn resolve_game(&mut self) -> Result<()> {
        self.game_id = if let Some(forced) = &self.request.force_game_id {
            forced.clone()
        } else {
            let candidates = &self.request.download_game_ids;
            match candidates.len() {
                0 => {
                    return Err(Error::process_canceled(
                        "the archive is not associated with any game",
                    ))
                }
                1 => candidates[0].clone(),
                _ => {
                    self.api
                        .dialogs
                        .select_game(&self.archive_name(), candidates)
                        .await?
                }
            }
        };
        Ok(())
    }

    /// Hash failures are non-fatal: metadata lookup still proceeds
    /// without the hash.
    async fn hash_archive(&mut self) {
        match hash_file(&self.request.archive_path).await {
            Ok((md5, size)) => {
                self.info.download.file_md5.get_or_insert(md5);
                self.info.download.size.get_or_insert(size);
            }
            Err(err) => {
                warn!(archive = %self.archive_name(), %err, "hashing failed");
            }
        }
    }

    /// Lookup failures are non-fatal; the first result becomes `meta`.
    async fn lookup_meta(&mut self) {
        let lookup_game = self
            .info
            .download
            .game
            .first()
            .cloned()
            .unwrap_or_else(|| self.game_id.clone());
        let lookup = self
            .api
            .lookup
            .lookup(
                Some(&self.request.archive_path),
                self.info.download.file_md5.as_deref(),
                self.info.download.size,
                &lookup_game,
            )
            .await;
        match lookup {
            Ok(results) => {
                if let Some(first) = results.into_iter().next() {
                    self.info.meta = Some(first);
                }
            }
            Err(err) => warn!(archive = %self.archive_name(), %err, "metadata lookup failed"),
        }
    }

    async fn derive_name(&mut self) -> Result<()> {
        let base = self
            .request
            .archive_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "mod".to_string());

        let decision = policy::resolve_name_collision(&self.api, &self.game_id, &base).await?;
        self.mod_id = decision.mod_id;
        self.enable = self.request.enable || decision.enable;
        self.initial_attributes = decision.attributes;
        if let Some(variant) = decision.variant {
            self.info.custom.variant = Some(variant);
        }
        Ok(())
    }

    async fn version_choice(&mut self) -> Result<()> {
        let Some(file_id) = self
            .info
            .meta
            .as_ref()
            .and_then(|meta| meta.file_id.clone())
        else {
            return Ok(());
        };
        if let Some(decision) =
            policy::check_prior_version(&self.api, &self.game_id, &file_id).await?
        {
            if let Some(reuse) = decision.reuse_id {
                self.mod_id = reuse;
            }
            self.enable = self.enable || decision.enable;
            self.inherited_rules = decision.inherited_rules;
            self.inherited_overrides = decision.inherited_overrides;
        }
        Ok(())
    }

    async fn start_context(&mut self) -> Result<()> {
        let context = InstallContext::new(
            self.api.events.clone(),
            self.game_id.clone(),
            self.mod_id.clone(),
            self.request.archive_id.clone(),
        );
        context.start_indicator(&self.archive_name());
        context.start_install();

        // Consumers get to observe the install before any filesystem work.
        self.api.emit(AppEvent::Mod(ModEvent::WillInstall {
            game_id: self.game_id.clone(),
            archive_id: self.request.archive_id.clone(),
            mod_id: self.mod_id.clone(),
        }));

        let install_dir = self.api.install_dir(&self.game_id);
        self.destination = install_dir.join(&self.mod_id);
        self.temp_path = install_dir.join(format!("{}.installing", self.mod_id));

        tokio::fs::create_dir_all(&install_dir)
            .await
            .map_err(|err| Error::io_with_path(&err, &install_dir))?;
        // Leftovers from an earlier crashed run for the same id.
        remove_dir_if_present(&self.temp_path).await?;
        remove_dir_if_present(&self.destination).await?;

        let mut entry = ModEntry::installing(&self.mod_id, self.request.archive_id.clone());
        entry.attributes = self.initial_attributes.clone();
        entry.attributes.insert(
            attr::INSTALL_TIME.to_string(),
            serde_json::Value::String(chrono::Utc::now().to_rfc3339()),
        );
        entry.attributes.insert(
            attr::FILE_NAME.to_string(),
            serde_json::Value::String(self.archive_name()),
        );
        if let Some(variant) = &self.info.custom.variant {
            entry.attributes.insert(
                attr::VARIANT.to_string(),
                serde_json::Value::String(variant.clone()),
            );
        }
        self.api.store.upsert_mod(&self.game_id, entry).await?;

        context.set_install_path(&self.destination);
        self.context = Some(context);
        Ok(())
    }

    async fn extract(&mut self) -> Result<()> {
        let Some(context) = &self.context else {
            return Err(Error::internal("extract before context"));
        };
        tokio::fs::create_dir_all(&self.temp_path)
            .await
            .map_err(|err| Error::io_with_path(&err, &self.temp_path))?;

        let progress = |fraction: f32| context.set_progress(fraction * 90.0);
        let extracted = archive::extract_archive(
            &self.api,
            &self.request.archive_path,
            &self.temp_path,
            &progress,
        )
        .await;

        match extracted {
            Ok(()) => Ok(()),
            Err(Error::Extract(ExtractError::ArchiveBroken { message }))
                if !archive::has_archive_extension(&self.request.archive_path) =>
            {
                // Not a recognised archive: offer to install the file as-is.
                debug!(archive = %self.archive_name(), %message, "not an archive, offering single-file mod");
                self.api
                    .dialogs
                    .confirm_single_file_mod(&self.archive_name())
                    .await?;
                let target = self.temp_path.join(self.archive_name());
                tokio::fs::copy(&self.request.archive_path, &target)
                    .await
                    .map_err(|err| Error::io_with_path(&err, &target))?;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn enumerate(&mut self) -> Result<()> {
        self.files = archive::enumerate_files(&self.temp_path).await?;
        Ok(())
    }

    async fn select_installer(&mut self) -> Result<()> {
        if let Some(file_list) = &self.request.file_list {
            self.installer = Some(Arc::new(FileListInstaller::new(file_list.clone())));
            return Ok(());
        }
        let snapshot = self.registry_snapshot();
        match InstallerRegistry::find(&snapshot, &self.files, &self.game_id).await? {
            Some((installer, _)) => {
                self.installer = Some(installer);
                Ok(())
            }
            None => Err(SetupError::NoSupportedInstaller {
                game_id: self.game_id.clone(),
            }
            .into()),
        }
    }

    async fn run_installer(&mut self) -> Result<()> {
        let Some(installer) = &self.installer else {
            return Err(Error::internal("installer not selected"));
        };
        let Some(context) = &self.context else {
            return Err(Error::internal("installer run before context"));
        };

        let progress = |fraction: f32| context.set_progress(90.0 + fraction * 5.0);
        let params = InstallerParams {
            files: &self.files,
            temp_path: &self.temp_path,
            game_id: &self.game_id,
            progress: &progress,
            choices: self.info.choices.as_ref(),
            unattended: self.request.unattended,
        };
        match installer.install(params).await? {
            // The installer surfaced its own error dialog already.
            None => Err(Error::UserCanceled),
            Some(instructions) if instructions.is_empty() => Err(Error::process_canceled(
                "empty archive or no options selected",
            )),
            Some(instructions) => {
                self.instructions = instructions;
                Ok(())
            }
        }
    }

    async fn determine_mod_type(&mut self) -> Result<()> {
        let already_typed = self
            .api
            .store
            .get_mod(&self.game_id, &self.mod_id)
            .await?
            .is_some_and(|entry| !entry.mod_type.is_empty());
        if already_typed {
            return Ok(());
        }

        let testers = self
            .mod_types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot(&self.game_id);
        let mod_type = ModTypeRegistry::determine(&testers, &self.instructions).await?;
        if !mod_type.is_empty() {
            self.api
                .store
                .set_mod_type(&self.game_id, &self.mod_id, &mod_type)
                .await?;
            if let Some(context) = &self.context {
                context.set_mod_type(&mod_type);
            }
        }
        Ok(())
    }

    async fn process_instructions(&mut self) -> Result<()> {
        let instructions = std::mem::take(&mut self.instructions);
        let processor = InstructionProcessor {
            api: &self.api,
            game_id: &self.game_id,
            mod_id: &self.mod_id,
            mod_name: &self.mod_id,
            destination: &self.destination,
            temp_path: &self.temp_path,
            archive_md5: self.info.download.file_md5.as_deref(),
        };
        processor.process(instructions, &*self).await
    }

    async fn finalize(&mut self) -> Result<()> {
        // Staging directory is gone once the pipeline succeeds. A refusal
        // here is not worth failing the install over, but the user must
        // know about it.
        if let Err(err) = tokio::fs::remove_dir_all(&self.temp_path).await {
            if err.kind() != ErrorKind::NotFound {
                self.api.emit_notification(
                    NotificationKind::Warning,
                    "Could not remove staging directory",
                    format!(
                        "Remove {} manually to reclaim disk space.",
                        self.temp_path.display()
                    ),
                );
            }
        }

        self.api
            .store
            .set_mod_state(&self.game_id, &self.mod_id, ModState::Installed)
            .await?;
        self.persist_attributes().await?;

        for rule in &self.inherited_rules {
            self.api
                .store
                .add_rule(&self.game_id, &self.mod_id, rule.clone())
                .await?;
        }
        if !self.inherited_overrides.is_empty() {
            self.api
                .store
                .set_file_overrides(&self.game_id, &self.mod_id, self.inherited_overrides.clone())
                .await?;
        }

        if self.enable {
            if let Some(profile) = self.api.store.active_profile(&self.game_id).await? {
                self.api
                    .store
                    .set_enabled(&profile.id, &self.mod_id, true)
                    .await?;
                self.api.emit(AppEvent::Mod(ModEvent::Enabled {
                    mod_ids: vec![self.mod_id.clone()],
                    enabled: true,
                    game_id: self.game_id.clone(),
                }));
            }
        }

        self.api.emit(AppEvent::Mod(ModEvent::DidInstall {
            game_id: self.game_id.clone(),
            archive_id: self.request.archive_id.clone(),
            mod_id: self.mod_id.clone(),
            info: Box::new(self.info.clone()),
        }));
        Ok(())
    }

    /// Record the identity attributes derived from hashing and metadata.
    async fn persist_attributes(&self) -> Result<()> {
        let mut attributes: Vec<(&str, Option<serde_json::Value>)> = vec![
            (
                attr::FILE_MD5,
                self.info.download.file_md5.clone().map(Into::into),
            ),
            (
                attr::FILE_SIZE,
                self.info.download.size.map(Into::into),
            ),
        ];
        if let Some(meta) = &self.info.meta {
            attributes.extend([
                (attr::VERSION, meta.file_version.clone().map(Into::into)),
                (
                    attr::FILE_VERSION,
                    meta.file_version.clone().map(Into::into),
                ),
                (
                    attr::LOGICAL_FILE_NAME,
                    meta.logical_file_name.clone().map(Into::into),
                ),
                (attr::MOD_ID, meta.mod_id.clone().map(Into::into)),
                (attr::FILE_ID, meta.file_id.clone().map(Into::into)),
                (
                    attr::NEWEST_FILE_ID,
                    meta.file_id.clone().map(Into::into),
                ),
            ]);
        }
        for (key, value) in attributes {
            if let Some(value) = value {
                self.api
                    .store
                    .set_attribute(&self.game_id, &self.mod_id, key, value)
                    .await?;
            }
        }
        Ok(())
    }

    /// Unified terminal handling: staging removal, status mapping, error
    /// surfacing, indicator teardown.
    async fn finish(self, result: Result<()>) -> Result<String> {
        match result {
            Ok(()) => {
                if let Some(context) = &self.context {
                    context.finish_install(InstallStatus::Success, Some(self.info.clone()));
                    context.stop_indicator();
                }
                Ok(self.mod_id)
            }
            Err(err) => {
                self.cleanup_failure(&err).await;
                Err(err)
            }
        }
    }

    async fn cleanup_failure(&self, err: &Error) {
        if !self.temp_path.as_os_str().is_empty() {
            if let Err(io_err) = tokio::fs::remove_dir_all(&self.temp_path).await {
                if io_err.kind() != ErrorKind::NotFound {
                    self.api.emit_notification(
                        NotificationKind::Warning,
                        "Could not remove staging directory",
                        format!(
                            "Remove {} manually before installing this mod again.",
                            self.temp_path.display()
                        ),
                    );
                }
            }
        }
        if !self.destination.as_os_str().is_empty() {
            let _ = tokio::fs::remove_dir_all(&self.destination).await;
        }

        // Drop the half-registered catalogue entry, best-effort.
        if self.context.is_some() {
            if let Err(store_err) = self
                .api
                .store
                .remove_mod(&self.game_id, &self.mod_id)
                .await
            {
                debug!(mod_id = %self.mod_id, %store_err, "failed to drop installing entry");
            }
        }

        self.report_failure(err);

        if let Some(context) = &self.context {
            let status = match err.disposition() {
                Disposition::Canceled => InstallStatus::Canceled,
                Disposition::Failed => InstallStatus::Failed,
            };
            context.finish_install(status, None);
            context.stop_indicator();
        }
    }

    fn report_failure(&self, err: &Error) {
        match err {
            Error::UserCanceled => {}
            Error::ProcessCanceled { message } | Error::Temporary { message } => {
                self.api.emit_notification(
                    NotificationKind::Warning,
                    "Installation canceled",
                    message.clone(),
                );
            }
            Error::Extract(extract_err) => {
                self.api.emit_notification(
                    NotificationKind::Error,
                    "Installation failed",
                    extract_err.user_message().into_owned(),
                );
            }
            Error::DataInvalid { message } => {
                self.api.emit_notification(
                    NotificationKind::Error,
                    "Installation failed",
                    format!(
                        "The installer is invalid; please inform the mod author. ({message})"
                    ),
                );
            }
            Error::Setup(_) | Error::NotFound { .. } => {
                self.api.emit_notification(
                    NotificationKind::Error,
                    "Installation failed",
                    err.to_string(),
                );
            }
            other => {
                let text = other.to_string();
                let message = if text.contains("Roaming\\Browser Assistant") {
                    BROWSER_ASSISTANT_ADVISORY.to_string()
                } else {
                    match &self.info.download.file_md5 {
                        Some(md5) => format!("{text} (archive {md5})"),
                        None => text,
                    }
                };
                if let Some(context) = &self.context {
                    context.report_error("Installation failed", &message, other.reportable());
                } else {
                    self.api.emit_notification(
                        NotificationKind::Error,
                        "Installation failed",
                        message,
                    );
                }
            }
        }
    }
}

impl SubmoduleHandler for InstallPipeline {
    fn install_submodule<'a>(
        &'a self,
        archive: &'a Path,
        key: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let nested_temp = self
                .temp_path
                .with_file_name(format!("{}.{key}.installing", self.mod_id));
            let result = self.run_submodule(archive, &nested_temp).await;
            if let Err(err) = tokio::fs::remove_dir_all(&nested_temp).await {
                if err.kind() != ErrorKind::NotFound {
                    warn!(path = %nested_temp.display(), %err, "nested staging cleanup failed");
                }
            }
            result
        }
        .boxed()
    }
}

impl InstallPipeline {
    /// Steps extract through process-instructions, against a nested
    /// archive but the same destination.
    async fn run_submodule(&self, nested_archive: &Path, nested_temp: &Path) -> Result<()> {
        let Some(context) = &self.context else {
            return Err(Error::internal("submodule before context"));
        };
        tokio::fs::create_dir_all(nested_temp)
            .await
            .map_err(|err| Error::io_with_path(&err, nested_temp))?;

        let progress = |fraction: f32| context.set_progress(90.0 + fraction * 5.0);
        archive::extract_archive(&self.api, nested_archive, nested_temp, &progress).await?;

        let files = archive::enumerate_files(nested_temp).await?;
        let snapshot = self.registry_snapshot();
        let Some((installer, _)) =
            InstallerRegistry::find(&snapshot, &files, &self.game_id).await?
        else {
            return Err(SetupError::NoSupportedInstaller {
                game_id: self.game_id.clone(),
            }
            .into());
        };

        let params = InstallerParams {
            files: &files,
            temp_path: nested_temp,
            game_id: &self.game_id,
            progress: &progress,
            choices: None,
            unattended: true,
        };
        let instructions = match installer.install(params).await? {
            None => return Err(Error::UserCanceled),
            Some(instructions) if instructions.is_empty() => return Ok(()),
            Some(instructions) => instructions,
        };

        let processor = InstructionProcessor {
            api: &self.api,
            game_id: &self.game_id,
            mod_id: &self.mod_id,
            mod_name: &self.mod_id,
            destination: &self.destination,
            temp_path: nested_temp,
            archive_md5: self.info.download.file_md5.as_deref(),
        };
        processor.process(instructions, self).await
    }
}

async fn remove_dir_if_present(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed stale directory");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(Error::io_with_path(&err, path)),
    }
}

/// Stream the archive through MD5, returning the hex digest and size.
async fn hash_file(path: &Path) -> Result<(String, u64)> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|err| Error::io_with_path(&err, path))?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; 64 * 1024];
    let mut size = 0u64;
    loop {
        let read = file
            .read(&mut buffer)
            .await
            .map_err(|err| Error::io_with_path(&err, path))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        size += read as u64;
    }
    Ok((format!("{:x}", hasher.finalize()), size))
}
