//! Replace/version policy: what happens when a mod id already exists, or
//! when an older version of the same file is already installed.

use std::collections::BTreeMap;

use modforge_errors::Result;
use modforge_host::{HostApi, NameCollisionChoice, VersionChoice};
use modforge_types::{attr, ModRule};
use tracing::debug;

/// Attributes never carried over when replacing a mod; the new archive
/// supplies fresher values.
const REPLACE_STRIPPED_ATTRIBUTES: &[&str] =
    &[attr::VERSION, attr::FILE_NAME, attr::FILE_VERSION];

/// Outcome of the name-collision loop.
#[derive(Debug, Clone)]
pub(crate) struct NameDecision {
    pub mod_id: String,
    pub enable: bool,
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Variant label, when the user chose to install alongside.
    pub variant: Option<String>,
}

/// Run the collision loop for `base_id`: while the candidate id exists in
/// the catalogue, ask the user to cancel, add a variant, or replace.
///
/// # Errors
///
/// `UserCanceled` when the user dismisses the dialog; store errors
/// otherwise.
pub(crate) async fn resolve_name_collision(
    api: &HostApi,
    game_id: &str,
    base_id: &str,
) -> Result<NameDecision> {
    let mut candidate = base_id.to_string();
    let mut decision = NameDecision {
        mod_id: candidate.clone(),
        enable: false,
        attributes: BTreeMap::new(),
        variant: None,
    };

    loop {
        let mods = api.store.mods(game_id).await?;
        let Some(existing) = mods.get(&candidate) else {
            decision.mod_id = candidate;
            return Ok(decision);
        };

        match api.dialogs.query_name_collision(&candidate).await? {
            NameCollisionChoice::Variant(variant) => {
                candidate = format!("{base_id}+{variant}");
                decision.variant = Some(variant);
                decision.enable = false;
                decision.attributes.clear();
                // Loop again: the variant id may collide too.
            }
            NameCollisionChoice::Replace => {
                let was_enabled = match api.store.active_profile(game_id).await? {
                    Some(profile) => profile.is_enabled(&existing.id),
                    None => false,
                };
                decision.enable = was_enabled;
                decision.attributes = existing
                    .attributes
                    .iter()
                    .filter(|(key, _)| !REPLACE_STRIPPED_ATTRIBUTES.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                debug!(mod_id = %candidate, "replacing existing mod");
                api.store.remove_mod(game_id, &candidate).await?;
                decision.mod_id = candidate;
                return Ok(decision);
            }
        }
    }
}

/// Outcome of the version-choice step when a prior version was found.
#[derive(Debug, Clone, Default)]
pub(crate) struct VersionDecision {
    /// Replacement id to install under (the prior mod's id), when the
    /// user chose to replace.
    pub reuse_id: Option<String>,
    pub enable: bool,
    pub inherited_rules: Vec<ModRule>,
    pub inherited_overrides: Vec<String>,
}

/// Check whether an older version of the same file is installed and ask
/// the user what to do with it. `file_id` is the incoming archive's file
/// id from metadata; a prior mod qualifies when its newest-file pointer
/// names that id but its own file id differs.
///
/// # Errors
///
/// `UserCanceled` aborts the install; store errors propagate.
pub(crate) async fn check_prior_version(
    api: &HostApi,
    game_id: &str,
    file_id: &str,
) -> Result<Option<VersionDecision>> {
    let mods = api.store.mods(game_id).await?;
    let Some(prior) = mods.values().find(|entry| {
        entry.attr_str(attr::NEWEST_FILE_ID) == Some(file_id)
            && entry.attr_str(attr::FILE_ID) != Some(file_id)
    }) else {
        return Ok(None);
    };

    let prior_name = prior
        .attr_str(attr::NAME)
        .unwrap_or(prior.id.as_str())
        .to_string();
    let was_enabled = match api.store.active_profile(game_id).await? {
        Some(profile) => profile.is_enabled(&prior.id),
        None => false,
    };

    match api.dialogs.query_version_replace(&prior_name).await? {
        VersionChoice::Replace => {
            let decision = VersionDecision {
                reuse_id: Some(prior.id.clone()),
                enable: was_enabled,
                inherited_rules: prior.rules.clone(),
                inherited_overrides: prior.file_overrides.clone(),
            };
            debug!(mod_id = %prior.id, "replacing older version");
            api.store.remove_mod(game_id, &prior.id).await?;
            Ok(Some(decision))
        }
        VersionChoice::Install => Ok(Some(VersionDecision {
            reuse_id: None,
            enable: was_enabled,
            inherited_rules: Vec::new(),
            inherited_overrides: Vec::new(),
        })),
    }
}
