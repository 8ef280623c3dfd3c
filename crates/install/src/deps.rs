//! Dependency batch execution: download, install, enable, pin.
//!
//! Gathering lives in the resolver crate; this module drives the batch —
//! up to four dependencies in flight, each child install re-entering the
//! serial queue unattended. Per-dependency failures drop that dependency;
//! only a user cancellation aborts the whole batch.

use dashmap::DashMap;
use futures::{FutureExt, StreamExt};
use modforge_errors::{Error, InstallError, Result};
use modforge_events::{AppEvent, DependencyEvent, EventEmitter, ModEvent, NotificationKind};
use modforge_host::{DependencyPrompt, DownloadState, HostApi};
use modforge_resolver::{gather_dependencies, repair_rules, update_rule, GatherReport};
use modforge_types::{attr, Dependency, ModInfo, ModReference, ModRule, Profile, RuleExtra};
use tracing::{debug, warn};

use crate::manager::{InstallManager, InstallRequest};

pub(crate) async fn install_dependencies_impl(
    manager: &InstallManager,
    profile: &Profile,
    mod_id: &str,
    recommended: bool,
    silent: bool,
) -> Result<()> {
    let api = &manager.api;
    api.emit(AppEvent::Dependency(DependencyEvent::WillInstall {
        profile_id: profile.id.clone(),
        mod_id: mod_id.to_string(),
        recommended,
    }));
    let result = run_batch(manager, profile, mod_id, recommended, silent).await;
    api.emit(AppEvent::Dependency(DependencyEvent::DidInstall {
        profile_id: profile.id.clone(),
        mod_id: mod_id.to_string(),
        recommended,
    }));
    result
}

async fn run_batch(
    manager: &InstallManager,
    profile: &Profile,
    mod_id: &str,
    recommended: bool,
    silent: bool,
) -> Result<()> {
    let api = &manager.api;
    let game_id = &profile.game_id;

    repair_rules(api, game_id, mod_id).await?;
    let outcomes = gather_dependencies(api, game_id, profile, mod_id, recommended).await?;
    let report = GatherReport::split(outcomes);

    let selected = select_dependencies(api, mod_id, &report, recommended, silent).await?;

    // Already-satisfied rules still get pinned to the mod that satisfies
    // them. Entries are (rule owner, rule, satisfying mod).
    let mut pinned: Vec<(String, ModRule, String)> = report
        .existing
        .iter()
        .map(|existing| {
            (
                existing.source_mod_id.clone(),
                existing.rule.clone(),
                existing.mod_id.clone(),
            )
        })
        .collect();
    let mut enabled_ids = Vec::new();

    let mut batch = futures::stream::iter(
        selected
            .into_iter()
            .map(|dep| install_one(manager, profile, mod_id, dep)),
    )
    .buffer_unordered(manager.config.dependency_concurrency);

    while let Some(result) = batch.next().await {
        match result {
            Ok(Some(outcome)) => {
                enabled_ids.push(outcome.mod_id.clone());
                pinned.push((outcome.source_mod_id, outcome.rule, outcome.mod_id));
            }
            Ok(None) => {}
            // Only a user cancellation escapes install_one.
            Err(err) => return Err(err),
        }
    }
    drop(batch);

    if !enabled_ids.is_empty() {
        api.emit(AppEvent::Mod(ModEvent::Enabled {
            mod_ids: enabled_ids,
            enabled: true,
            game_id: game_id.clone(),
        }));
    }

    for (owner, rule, dep_mod_id) in pinned {
        if let Err(err) = update_rule(api, game_id, &owner, &rule, &dep_mod_id).await {
            warn!(owner = %owner, dependency = %dep_mod_id, %err, "failed to pin dependency rule");
        }
    }
    Ok(())
}

/// The UI phase: decide which gathered dependencies actually get
/// installed.
async fn select_dependencies(
    api: &HostApi,
    mod_name: &str,
    report: &GatherReport,
    recommended: bool,
    silent: bool,
) -> Result<Vec<Dependency>> {
    if report.success.is_empty() && report.errors.is_empty() {
        return Ok(Vec::new());
    }

    if recommended {
        let items: Vec<String> = report
            .success
            .iter()
            .map(|dep| describe(&dep.reference))
            .collect();
        let picks = api.dialogs.select_recommendations(mod_name, &items).await?;
        return Ok(picks
            .into_iter()
            .filter_map(|index| report.success.get(index).cloned())
            .collect());
    }

    if !(silent && report.errors.is_empty()) {
        let prompt = DependencyPrompt {
            mod_name: mod_name.to_string(),
            install_count: report.success.len(),
            download_count: report
                .success
                .iter()
                .filter(|dep| dep.download.is_none())
                .count(),
            errors: report
                .errors
                .iter()
                .map(|issue| issue.message.clone())
                .collect(),
            recommended: false,
        };
        api.dialogs.confirm_dependencies(&prompt).await?;
    }
    Ok(report.success.clone())
}

struct DepOutcome {
    /// Owner of the rule being satisfied.
    source_mod_id: String,
    rule: ModRule,
    mod_id: String,
}

/// Install one dependency, translating failures according to the batch
/// policy: cancellations by the user propagate, everything else is
/// surfaced and swallowed.
async fn install_one(
    manager: &InstallManager,
    profile: &Profile,
    root_mod_id: &str,
    dep: Dependency,
) -> Result<Option<DepOutcome>> {
    let api = &manager.api;
    let reference = describe(&dep.reference);

    let key = dep.reference.key();
    if manager.active_deps.insert(key.clone(), ()).is_some() {
        debug!(%reference, "dependency already being installed, skipping");
        return Ok(None);
    }
    let _active = ActiveGuard {
        map: &manager.active_deps,
        key,
    };

    match install_one_inner(manager, profile, root_mod_id, &dep).await {
        Ok(outcome) => Ok(Some(outcome)),
        Err(err) if err.is_user_canceled() => Err(err),
        Err(err) if err.is_process_canceled() || matches!(err, Error::NotFound { .. }) => {
            api.emit(AppEvent::Dependency(DependencyEvent::Skipped {
                reference: reference.clone(),
                reason: err.to_string(),
            }));
            api.emit_notification(
                NotificationKind::Warning,
                "Dependency not installed",
                format!("{reference}: {err}"),
            );
            Ok(None)
        }
        Err(err) => {
            api.emit(AppEvent::Dependency(DependencyEvent::InstallFailed {
                reference: reference.clone(),
                message: err.to_string(),
            }));
            api.emit_notification(
                NotificationKind::Error,
                "Failed to install dependency",
                format!("{reference}: {err}"),
            );
            Ok(None)
        }
    }
}

async fn install_one_inner(
    manager: &InstallManager,
    profile: &Profile,
    root_mod_id: &str,
    dep: &Dependency,
) -> Result<DepOutcome> {
    let api = &manager.api;
    let game_id = &profile.game_id;
    let source_mod_id = dep
        .source_mod_id
        .clone()
        .unwrap_or_else(|| root_mod_id.to_string());

    // Installed but disabled: enabling is all that is left.
    if let Some(existing) = &dep.mod_id {
        api.store.set_enabled(&profile.id, existing, true).await?;
        apply_extras(api, game_id, existing, dep.extra.as_ref()).await?;
        return Ok(DepOutcome {
            source_mod_id,
            rule: dep.rule.clone(),
            mod_id: existing.clone(),
        });
    }

    let download_id = tokio::time::timeout(
        manager.config.download_timeout,
        acquire_download(api, dep),
    )
    .await
    .map_err(|_| Error::Temporary {
        message: format!(
            "timed out acquiring the download for {}",
            describe(&dep.reference)
        ),
    })??;

    let download = api
        .downloads
        .download(&download_id)
        .await?
        .ok_or_else(|| Error::NotFound {
            message: format!("download {download_id} disappeared"),
        })?;
    let archive_path = download.file_path.clone().ok_or_else(|| {
        Error::from(InstallError::DownloadUnusable {
            download_id: download_id.clone(),
            message: "the download has no file on disk".to_string(),
        })
    })?;

    let request = InstallRequest::new(archive_path)
        .with_archive_id(download_id)
        .with_game_ids(if download.game_ids.is_empty() {
            vec![game_id.clone()]
        } else {
            download.game_ids.clone()
        })
        .with_info(ModInfo {
            choices: dep.installer_choices.clone(),
            ..ModInfo::default()
        })
        .with_force_game(game_id.clone())
        .with_file_list(dep.file_list.clone())
        .with_unattended(true);

    // Child installs go through the same serial queue; boxing breaks the
    // install → dependencies → install future cycle.
    let new_mod_id = manager.install(request).boxed().await?;

    api.store.set_enabled(&profile.id, &new_mod_id, true).await?;
    apply_extras(api, game_id, &new_mod_id, dep.extra.as_ref()).await?;
    Ok(DepOutcome {
        source_mod_id,
        rule: dep.rule.clone(),
        mod_id: new_mod_id,
    })
}

/// Reuse, resume, or start the download backing a dependency.
async fn acquire_download(api: &HostApi, dep: &Dependency) -> Result<String> {
    if let Some(id) = &dep.download {
        if let Some(info) = api.downloads.download(id).await? {
            if info.state == DownloadState::Paused {
                api.downloads.resume_download(id).await?;
            }
            return Ok(id.clone());
        }
    }
    download_mod(api, dep).await
}

/// Start a fresh download. A fuzzy version match with a fully identified
/// lookup result goes through the repository's update mechanism so the
/// newest matching file is fetched; everything else downloads the
/// looked-up file directly.
async fn download_mod(api: &HostApi, dep: &Dependency) -> Result<String> {
    let lookup = dep.lookup_results.first().ok_or_else(|| Error::NotFound {
        message: format!("no download source for {}", describe(&dep.reference)),
    })?;

    if dep.reference.has_fuzzy_version() {
        if let (Some(source), Some(mod_id), Some(file_id)) =
            (&lookup.source, &lookup.mod_id, &lookup.file_id)
        {
            let pattern = dep
                .reference
                .version_match
                .clone()
                .unwrap_or_else(|| "*".to_string());
            let game_id = lookup.game_id.clone().unwrap_or_default();
            let ids = api
                .downloads
                .start_download_update(source, &game_id, mod_id, file_id, &pattern)
                .await?;
            return ids.into_iter().next().ok_or_else(|| Error::NotFound {
                message: format!("no update download for {}", describe(&dep.reference)),
            });
        }
    }

    let uri = lookup.source_uri.clone().ok_or_else(|| Error::NotFound {
        message: format!("no download url for {}", describe(&dep.reference)),
    })?;
    api.downloads
        .start_download(vec![uri], lookup.file_name.clone())
        .await
}

async fn apply_extras(
    api: &HostApi,
    game_id: &str,
    mod_id: &str,
    extra: Option<&RuleExtra>,
) -> Result<()> {
    let Some(extra) = extra else {
        return Ok(());
    };
    if let Some(mod_type) = &extra.mod_type {
        api.store.set_mod_type(game_id, mod_id, mod_type).await?;
    }
    if let Some(name) = &extra.name {
        api.store
            .set_attribute(
                game_id,
                mod_id,
                attr::CUSTOM_FILE_NAME,
                serde_json::Value::String(name.clone()),
            )
            .await?;
    }
    Ok(())
}

fn describe(reference: &ModReference) -> String {
    reference
        .description
        .clone()
        .or_else(|| reference.logical_file_name.clone())
        .or_else(|| reference.file_expression.clone())
        .or_else(|| reference.id.clone())
        .or_else(|| reference.file_md5.clone())
        .unwrap_or_else(|| "unnamed dependency".to_string())
}

struct ActiveGuard<'a> {
    map: &'a DashMap<String, ()>,
    key: String,
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.map.remove(&self.key);
    }
}
