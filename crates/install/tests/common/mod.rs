//! Shared in-memory host doubles for the install manager tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use md5::{Digest, Md5};
use modforge_errors::{Error, ExtractError, InstallError, Result};
use modforge_events::{channel, AppEvent, EventReceiver};
use modforge_host::{
    ArchiveExtractor, DependencyPrompt, DialogProvider, DownloadClient, DownloadInfo,
    DownloadState, ExtractOutcome, HostApi, MetaLookup, ModStore, NameCollisionChoice,
    VersionChoice,
};
use modforge_install::{
    InstallConfig, InstallManager, InstallerParams, ModInstaller, Supported,
};
use modforge_types::{
    Instruction, LookupResult, ModEntry, ModRule, ModState, Profile,
};
use tempfile::TempDir;

pub fn md5_hex(data: &[u8]) -> String {
    format!("{:x}", Md5::digest(data))
}

// ---------------------------------------------------------------- store

#[derive(Default)]
struct StoreState {
    mods: BTreeMap<String, BTreeMap<String, ModEntry>>,
    profiles: BTreeMap<String, Profile>,
    active_profiles: BTreeMap<String, String>,
    removed: Vec<(String, String)>,
}

pub struct FakeStore {
    install_base: PathBuf,
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn new(install_base: PathBuf) -> Self {
        Self {
            install_base,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn insert_mod(&self, game_id: &str, entry: ModEntry) {
        self.state
            .lock()
            .unwrap()
            .mods
            .entry(game_id.to_string())
            .or_default()
            .insert(entry.id.clone(), entry);
    }

    pub fn insert_profile(&self, profile: Profile, active: bool) {
        let mut state = self.state.lock().unwrap();
        if active {
            state
                .active_profiles
                .insert(profile.game_id.clone(), profile.id.clone());
        }
        state.profiles.insert(profile.id.clone(), profile);
    }

    pub fn mod_entry(&self, game_id: &str, mod_id: &str) -> Option<ModEntry> {
        self.state
            .lock()
            .unwrap()
            .mods
            .get(game_id)
            .and_then(|mods| mods.get(mod_id))
            .cloned()
    }

    pub fn mod_ids(&self, game_id: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .mods
            .get(game_id)
            .map(|mods| mods.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn removed_mods(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn is_enabled(&self, profile_id: &str, mod_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .profiles
            .get(profile_id)
            .is_some_and(|profile| profile.is_enabled(mod_id))
    }
}

#[async_trait]
impl ModStore for FakeStore {
    async fn mods(&self, game_id: &str) -> Result<BTreeMap<String, ModEntry>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .mods
            .get(game_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_mod(&self, game_id: &str, mod_id: &str) -> Result<Option<ModEntry>> {
        Ok(self.mod_entry(game_id, mod_id))
    }

    async fn upsert_mod(&self, game_id: &str, entry: ModEntry) -> Result<()> {
        self.insert_mod(game_id, entry);
        Ok(())
    }

    async fn set_mod_state(&self, game_id: &str, mod_id: &str, state: ModState) -> Result<()> {
        self.with_mod(game_id, mod_id, |entry| entry.state = state)
    }

    async fn remove_mod(&self, game_id: &str, mod_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(mods) = state.mods.get_mut(game_id) {
            mods.remove(mod_id);
        }
        state
            .removed
            .push((game_id.to_string(), mod_id.to_string()));
        drop(state);
        let _ = std::fs::remove_dir_all(self.install_base.join(game_id).join(mod_id));
        Ok(())
    }

    async fn set_attribute(
        &self,
        game_id: &str,
        mod_id: &str,
        key: &str,
        value: serde_json::Value,
    ) -> Result<()> {
        self.with_mod(game_id, mod_id, |entry| {
            entry.attributes.insert(key.to_string(), value);
        })
    }

    async fn set_mod_type(&self, game_id: &str, mod_id: &str, mod_type: &str) -> Result<()> {
        self.with_mod(game_id, mod_id, |entry| {
            entry.mod_type = mod_type.to_string();
        })
    }

    async fn add_rule(&self, game_id: &str, mod_id: &str, rule: ModRule) -> Result<()> {
        self.with_mod(game_id, mod_id, |entry| entry.rules.push(rule))
    }

    async fn remove_rule(&self, game_id: &str, mod_id: &str, rule: &ModRule) -> Result<()> {
        self.with_mod(game_id, mod_id, |entry| {
            entry.rules.retain(|existing| existing != rule);
        })
    }

    async fn set_file_overrides(
        &self,
        game_id: &str,
        mod_id: &str,
        files: Vec<String>,
    ) -> Result<()> {
        self.with_mod(game_id, mod_id, |entry| entry.file_overrides = files)
    }

    async fn profile(&self, profile_id: &str) -> Result<Option<Profile>> {
        Ok(self.state.lock().unwrap().profiles.get(profile_id).cloned())
    }

    async fn active_profile(&self, game_id: &str) -> Result<Option<Profile>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .active_profiles
            .get(game_id)
            .and_then(|id| state.profiles.get(id))
            .cloned())
    }

    async fn set_enabled(&self, profile_id: &str, mod_id: &str, enabled: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(profile) = state.profiles.get_mut(profile_id) else {
            return Err(Error::NotFound {
                message: format!("profile {profile_id}"),
            });
        };
        profile.mod_state.insert(mod_id.to_string(), enabled);
        Ok(())
    }
}

impl FakeStore {
    fn with_mod(
        &self,
        game_id: &str,
        mod_id: &str,
        apply: impl FnOnce(&mut ModEntry),
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let entry = state
            .mods
            .get_mut(game_id)
            .and_then(|mods| mods.get_mut(mod_id))
            .ok_or_else(|| {
                Error::from(InstallError::ModNotFound {
                    game_id: game_id.to_string(),
                    mod_id: mod_id.to_string(),
                })
            })?;
        apply(entry);
        Ok(())
    }
}

// ------------------------------------------------------------ downloads

#[derive(Default)]
struct DownloadsState {
    downloads: BTreeMap<String, DownloadInfo>,
    planned_by_url: BTreeMap<String, DownloadInfo>,
    planned_updates: BTreeMap<String, DownloadInfo>,
    resumed: Vec<String>,
    started_urls: Vec<String>,
    update_requests: Vec<(String, String, String, String, String)>,
}

#[derive(Default)]
pub struct FakeDownloads {
    state: Mutex<DownloadsState>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl FakeDownloads {
    pub fn insert(&self, info: DownloadInfo) {
        self.state
            .lock()
            .unwrap()
            .downloads
            .insert(info.id.clone(), info);
    }

    /// Plan the download that `start_download` for this url will produce.
    pub fn plan_url(&self, url: &str, info: DownloadInfo) {
        self.state
            .lock()
            .unwrap()
            .planned_by_url
            .insert(url.to_string(), info);
    }

    /// Plan the download that `start_download_update` for this repository
    /// mod id will produce.
    pub fn plan_update(&self, mod_id: &str, info: DownloadInfo) {
        self.state
            .lock()
            .unwrap()
            .planned_updates
            .insert(mod_id.to_string(), info);
    }

    pub fn resumed(&self) -> Vec<String> {
        self.state.lock().unwrap().resumed.clone()
    }

    pub fn started_urls(&self) -> Vec<String> {
        self.state.lock().unwrap().started_urls.clone()
    }

    pub fn update_requests(&self) -> Vec<(String, String, String, String, String)> {
        self.state.lock().unwrap().update_requests.clone()
    }

    /// Highest number of concurrently running `start_download` calls.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DownloadClient for FakeDownloads {
    async fn start_download(
        &self,
        urls: Vec<String>,
        _file_name: Option<String>,
    ) -> Result<String> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let mut state = self.state.lock().unwrap();
        let url = urls.first().cloned().unwrap_or_default();
        state.started_urls.push(url.clone());
        let Some(info) = state.planned_by_url.remove(&url) else {
            return Err(Error::NotFound {
                message: format!("no download source behind {url}"),
            });
        };
        let id = info.id.clone();
        state.downloads.insert(id.clone(), info);
        Ok(id)
    }

    async fn start_download_update(
        &self,
        source: &str,
        game_id: &str,
        mod_id: &str,
        file_id: &str,
        version_pattern: &str,
    ) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.update_requests.push((
            source.to_string(),
            game_id.to_string(),
            mod_id.to_string(),
            file_id.to_string(),
            version_pattern.to_string(),
        ));
        let Some(info) = state.planned_updates.remove(mod_id) else {
            return Err(Error::NotFound {
                message: format!("no update download for mod {mod_id}"),
            });
        };
        let id = info.id.clone();
        state.downloads.insert(id.clone(), info);
        Ok(vec![id])
    }

    async fn resume_download(&self, download_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.resumed.push(download_id.to_string());
        let Some(info) = state.downloads.get_mut(download_id) else {
            return Err(Error::NotFound {
                message: format!("download {download_id}"),
            });
        };
        info.state = DownloadState::Finished;
        Ok(())
    }

    async fn download(&self, download_id: &str) -> Result<Option<DownloadInfo>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .downloads
            .get(download_id)
            .cloned())
    }

    async fn find_by_md5(&self, file_md5: &str) -> Result<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .downloads
            .values()
            .find(|info| info.file_md5.as_deref() == Some(file_md5))
            .map(|info| info.id.clone()))
    }
}

// --------------------------------------------------------------- lookup

#[derive(Default)]
pub struct FakeLookup {
    by_md5: Mutex<HashMap<String, Vec<LookupResult>>>,
}

impl FakeLookup {
    pub fn register(&self, md5: &str, results: Vec<LookupResult>) {
        self.by_md5.lock().unwrap().insert(md5.to_string(), results);
    }
}

#[async_trait]
impl MetaLookup for FakeLookup {
    async fn lookup(
        &self,
        _file_path: Option<&Path>,
        file_md5: Option<&str>,
        _file_size: Option<u64>,
        _game_id: &str,
    ) -> Result<Vec<LookupResult>> {
        Ok(file_md5
            .and_then(|md5| self.by_md5.lock().unwrap().get(md5).cloned())
            .unwrap_or_default())
    }
}

// -------------------------------------------------------------- dialogs

/// Scripted dialog provider. Unscripted prompts fall back to sensible
/// defaults; name-collision and version prompts without a script answer
/// cancel, like a user hitting escape. Tracks how many dialogs are open
/// at once so serial-queue behavior is observable.
#[derive(Default)]
pub struct ScriptedDialogs {
    pub game_choices: Mutex<VecDeque<String>>,
    pub collision_choices: Mutex<VecDeque<NameCollisionChoice>>,
    pub version_choices: Mutex<VecDeque<VersionChoice>>,
    pub single_file_answers: Mutex<VecDeque<bool>>,
    pub passwords: Mutex<VecDeque<String>>,
    pub recommendation_picks: Mutex<Option<Vec<usize>>>,
    pub refuse_dependencies: AtomicBool,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedDialogs {
    pub fn peak_open_dialogs(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn gauge(&self) -> DialogGuard<'_> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        // Hold the dialog open long enough for overlap to be observable.
        tokio::time::sleep(Duration::from_millis(10)).await;
        DialogGuard(&self.active)
    }
}

struct DialogGuard<'a>(&'a AtomicUsize);

impl Drop for DialogGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DialogProvider for ScriptedDialogs {
    async fn select_game(&self, _archive_name: &str, candidates: &[String]) -> Result<String> {
        let _open = self.gauge().await;
        if let Some(choice) = self.game_choices.lock().unwrap().pop_front() {
            return Ok(choice);
        }
        candidates
            .first()
            .cloned()
            .ok_or(Error::UserCanceled)
    }

    async fn query_password(&self, _archive_name: &str) -> Result<String> {
        let _open = self.gauge().await;
        self.passwords
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(Error::UserCanceled)
    }

    async fn confirm_continue_extraction(
        &self,
        _archive_name: &str,
        _errors: &[String],
        allow_continue: bool,
    ) -> Result<()> {
        let _open = self.gauge().await;
        if allow_continue {
            Ok(())
        } else {
            Err(Error::UserCanceled)
        }
    }

    async fn query_name_collision(&self, _mod_id: &str) -> Result<NameCollisionChoice> {
        let _open = self.gauge().await;
        self.collision_choices
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(Error::UserCanceled)
    }

    async fn query_version_replace(&self, _mod_name: &str) -> Result<VersionChoice> {
        let _open = self.gauge().await;
        self.version_choices
            .lock()
            .unwrap()
            .pop_front()
            .ok_or(Error::UserCanceled)
    }

    async fn confirm_single_file_mod(&self, _file_name: &str) -> Result<()> {
        let _open = self.gauge().await;
        let answer = self
            .single_file_answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(true);
        if answer {
            Ok(())
        } else {
            Err(Error::UserCanceled)
        }
    }

    async fn confirm_dependencies(&self, _prompt: &DependencyPrompt) -> Result<()> {
        let _open = self.gauge().await;
        if self.refuse_dependencies.load(Ordering::SeqCst) {
            Err(Error::UserCanceled)
        } else {
            Ok(())
        }
    }

    async fn select_recommendations(
        &self,
        _mod_name: &str,
        items: &[String],
    ) -> Result<Vec<usize>> {
        let _open = self.gauge().await;
        Ok(self
            .recommendation_picks
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| (0..items.len()).collect()))
    }
}

// ------------------------------------------------------------ extractor

pub struct ArchiveFixture {
    pub tree: Vec<(String, Vec<u8>)>,
    pub outcome: (i32, Vec<String>),
    pub password: Option<String>,
}

impl ArchiveFixture {
    pub fn tree(entries: &[(&str, &[u8])]) -> Self {
        Self {
            tree: entries
                .iter()
                .map(|(path, data)| ((*path).to_string(), data.to_vec()))
                .collect(),
            outcome: (0, Vec::new()),
            password: None,
        }
    }

    pub fn failing(code: i32, errors: &[&str]) -> Self {
        Self {
            tree: Vec::new(),
            outcome: (code, errors.iter().map(|e| (*e).to_string()).collect()),
            password: None,
        }
    }
}

/// Pretends to be the archive codec: registered paths extract their
/// fixture tree, everything else is "cannot open as archive".
#[derive(Default)]
pub struct FakeExtractor {
    archives: Mutex<HashMap<PathBuf, ArchiveFixture>>,
}

impl FakeExtractor {
    pub fn register(&self, path: &Path, fixture: ArchiveFixture) {
        self.archives.lock().unwrap().insert(path.to_path_buf(), fixture);
    }
}

#[async_trait]
impl ArchiveExtractor for FakeExtractor {
    async fn extract_full(
        &self,
        archive: &Path,
        dest: &Path,
        progress: &(dyn Fn(f32) + Send + Sync),
        password: Option<&str>,
    ) -> Result<ExtractOutcome> {
        let (tree, outcome) = {
            let archives = self.archives.lock().unwrap();
            let Some(fixture) = archives.get(archive) else {
                return Err(ExtractError::ArchiveBroken {
                    message: "Cannot open as archive".to_string(),
                }
                .into());
            };
            if let Some(expected) = &fixture.password {
                if password != Some(expected.as_str()) {
                    return Err(ExtractError::PasswordRequired.into());
                }
            }
            (fixture.tree.clone(), fixture.outcome.clone())
        };

        for (relative, data) in tree {
            let target = dest.join(&relative);
            if relative.ends_with('/') {
                tokio::fs::create_dir_all(&target).await?;
                continue;
            }
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&target, &data).await?;
        }
        progress(1.0);
        Ok(ExtractOutcome {
            code: outcome.0,
            errors: outcome.1,
        })
    }
}

// ----------------------------------------------------------- installers

/// Installer returning a fixed instruction list (or `None`).
pub struct StaticInstaller {
    pub instructions: Option<Vec<Instruction>>,
    pub supported: bool,
    pub calls: AtomicUsize,
    pub last_unattended: AtomicBool,
}

impl StaticInstaller {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions: Some(instructions),
            supported: true,
            calls: AtomicUsize::new(0),
            last_unattended: AtomicBool::new(false),
        }
    }

    /// Copy each named file to the same relative destination.
    pub fn copying(files: &[&str]) -> Self {
        Self::new(
            files
                .iter()
                .map(|file| Instruction::Copy {
                    source: (*file).to_string(),
                    destination: (*file).to_string(),
                })
                .collect(),
        )
    }

    /// An installer that "handled its own error": returns `None`.
    pub fn self_canceling() -> Self {
        Self {
            instructions: None,
            supported: true,
            calls: AtomicUsize::new(0),
            last_unattended: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl ModInstaller for StaticInstaller {
    async fn test_supported(&self, _files: &[String], _game_id: &str) -> Result<Supported> {
        Ok(if self.supported {
            Supported::yes(Vec::new())
        } else {
            Supported::no()
        })
    }

    async fn install(&self, params: InstallerParams<'_>) -> Result<Option<Vec<Instruction>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_unattended
            .store(params.unattended, Ordering::SeqCst);
        (params.progress)(1.0);
        Ok(self.instructions.clone())
    }
}

// -------------------------------------------------------------- harness

pub struct TestHarness {
    pub tempdir: TempDir,
    pub api: HostApi,
    pub store: Arc<FakeStore>,
    pub downloads: Arc<FakeDownloads>,
    pub lookup: Arc<FakeLookup>,
    pub dialogs: Arc<ScriptedDialogs>,
    pub extractor: Arc<FakeExtractor>,
    pub events: Mutex<EventReceiver>,
}

impl TestHarness {
    pub fn new() -> Self {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let install_base = tempdir.path().join("mods");
        let store = Arc::new(FakeStore::new(install_base.clone()));
        let downloads = Arc::new(FakeDownloads::default());
        let lookup = Arc::new(FakeLookup::default());
        let dialogs = Arc::new(ScriptedDialogs::default());
        let extractor = Arc::new(FakeExtractor::default());
        let (events_tx, events_rx) = channel();
        let api = HostApi::new(
            Arc::clone(&store) as Arc<dyn ModStore>,
            Arc::clone(&downloads) as Arc<dyn DownloadClient>,
            Arc::clone(&lookup) as Arc<dyn MetaLookup>,
            Arc::clone(&dialogs) as Arc<dyn DialogProvider>,
            Arc::clone(&extractor) as Arc<dyn ArchiveExtractor>,
            events_tx,
            install_base,
        );
        Self {
            tempdir,
            api,
            store,
            downloads,
            lookup,
            dialogs,
            extractor,
            events: Mutex::new(events_rx),
        }
    }

    pub fn manager(&self) -> InstallManager {
        InstallManager::new(self.api.clone(), InstallConfig::default()).expect("manager")
    }

    pub fn manager_with(&self, config: InstallConfig) -> InstallManager {
        InstallManager::new(self.api.clone(), config).expect("manager")
    }

    /// Create a real file on disk and register its extraction fixture.
    /// Returns the archive path; its content (and thus MD5) is unique per
    /// name.
    pub async fn make_archive(&self, name: &str, entries: &[(&str, &[u8])]) -> PathBuf {
        let path = self.archive_path(name);
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&path, Self::archive_bytes(name))
            .await
            .unwrap();
        self.extractor.register(&path, ArchiveFixture::tree(entries));
        path
    }

    pub fn archive_path(&self, name: &str) -> PathBuf {
        self.tempdir.path().join("downloads").join(name)
    }

    pub fn archive_bytes(name: &str) -> Vec<u8> {
        format!("archive-content:{name}").into_bytes()
    }

    pub fn archive_md5(name: &str) -> String {
        md5_hex(&Self::archive_bytes(name))
    }

    pub fn install_dir(&self, game_id: &str) -> PathBuf {
        self.api.install_dir(game_id)
    }

    pub fn drain_events(&self) -> Vec<AppEvent> {
        let mut events = Vec::new();
        let mut receiver = self.events.lock().unwrap();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }
}
