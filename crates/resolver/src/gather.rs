//! The gather phase: rules in, dependencies out.

use std::collections::HashSet;

use modforge_errors::Result;
use modforge_host::HostApi;
use modforge_types::{
    Dependency, DependencyIssue, ModRule, Profile, RuleExtra, RuleType,
};
use tracing::debug;

use crate::matching::find_installed;

/// A rule that is already satisfied by an installed, enabled mod.
#[derive(Debug, Clone)]
pub struct ExistingDependency {
    /// The installed mod satisfying the rule.
    pub mod_id: String,
    /// The mod carrying the rule.
    pub source_mod_id: String,
    pub rule: ModRule,
}

/// One gathered rule, classified.
#[derive(Debug, Clone)]
pub enum GatherOutcome {
    /// Needs downloading and/or installing.
    Resolved(Dependency),
    /// Already installed and enabled; nothing to do.
    Existing(ExistingDependency),
    /// Could not be resolved to anything installable.
    Failed(DependencyIssue),
}

/// Gather outcomes split for the UI phase. `existing` keeps the source
/// rule so it can be pinned alongside freshly installed dependencies.
#[derive(Debug, Clone, Default)]
pub struct GatherReport {
    pub success: Vec<Dependency>,
    pub existing: Vec<ExistingDependency>,
    pub errors: Vec<DependencyIssue>,
}

impl GatherReport {
    #[must_use]
    pub fn split(outcomes: Vec<GatherOutcome>) -> Self {
        let mut report = Self::default();
        for outcome in outcomes {
            match outcome {
                GatherOutcome::Resolved(dep) => report.success.push(dep),
                GatherOutcome::Existing(existing) => report.existing.push(existing),
                GatherOutcome::Failed(issue) => report.errors.push(issue),
            }
        }
        report
    }
}

/// Walk the dependency rules of `source_mod_id` transitively and classify
/// every reference. `recommended` selects `recommends` rules instead of
/// `requires`.
///
/// Rule references form a graph that may contain cycles; each
/// `(source mod, reference key)` pair is visited at most once, and two
/// mods requiring the same dependency yield one outcome.
///
/// # Errors
///
/// Fails only on host errors (store/lookup unavailable); an unresolvable
/// reference is a [`GatherOutcome::Failed`], not an error.
pub async fn gather_dependencies(
    api: &HostApi,
    game_id: &str,
    profile: &Profile,
    source_mod_id: &str,
    recommended: bool,
) -> Result<Vec<GatherOutcome>> {
    let wanted = if recommended {
        RuleType::Recommends
    } else {
        RuleType::Requires
    };

    let mods = api.store.mods(game_id).await?;
    let mut outcomes = Vec::new();
    let mut visited: HashSet<(String, String)> = HashSet::new();
    let mut produced: HashSet<String> = HashSet::new();
    let mut pending: Vec<(String, Vec<ModRule>)> = Vec::new();

    if let Some(entry) = mods.get(source_mod_id) {
        pending.push((entry.id.clone(), entry.rules.clone()));
    }

    while let Some((source, rules)) = pending.pop() {
        for rule in rules {
            if rule.rule_type != wanted {
                continue;
            }
            let reference_key = rule.reference.key();
            if !visited.insert((source.clone(), reference_key.clone())) {
                debug!(source = %source, "dependency reference already visited");
                continue;
            }
            if !produced.insert(reference_key) {
                continue;
            }

            if let Some(entry) = find_installed(&mods, &rule.reference) {
                // Transitive requirements of an installed dependency still
                // need gathering; its own rules go on the stack.
                pending.push((entry.id.clone(), entry.rules.clone()));
                if profile.is_enabled(&entry.id) {
                    outcomes.push(GatherOutcome::Existing(ExistingDependency {
                        mod_id: entry.id.clone(),
                        source_mod_id: source.clone(),
                        rule,
                    }));
                } else {
                    let extra = rule.extra.clone();
                    outcomes.push(GatherOutcome::Resolved(Dependency {
                        reference: rule.reference.clone(),
                        lookup_results: Vec::new(),
                        download: None,
                        mod_id: Some(entry.id.clone()),
                        installer_choices: extra_choices(extra.as_ref()),
                        file_list: extra_file_list(extra.as_ref()),
                        extra,
                        source_mod_id: Some(source.clone()),
                        rule,
                    }));
                }
                continue;
            }

            outcomes.push(resolve_remote(api, game_id, &source, rule).await?);
        }
    }

    Ok(outcomes)
}

/// Resolve a reference that matches nothing installed: consult the
/// metadata service and look for an existing download.
async fn resolve_remote(
    api: &HostApi,
    game_id: &str,
    source_mod_id: &str,
    rule: ModRule,
) -> Result<GatherOutcome> {
    let Some(md5) = rule.reference.file_md5.clone() else {
        return Ok(GatherOutcome::Failed(DependencyIssue::new(
            rule.reference,
            "reference matches no installed mod and carries no content hash",
        )));
    };

    let results = api.lookup.lookup(None, Some(&md5), None, game_id).await?;
    if results.is_empty() {
        return Ok(GatherOutcome::Failed(DependencyIssue::new(
            rule.reference,
            format!("no metadata source knows {md5}"),
        )));
    }

    let download = api.downloads.find_by_md5(&md5).await?;
    let extra = rule.extra.clone();
    Ok(GatherOutcome::Resolved(Dependency {
        reference: rule.reference.clone(),
        lookup_results: results,
        download,
        mod_id: None,
        installer_choices: extra_choices(extra.as_ref()),
        file_list: extra_file_list(extra.as_ref()),
        extra,
        source_mod_id: Some(source_mod_id.to_string()),
        rule,
    }))
}

fn extra_choices(extra: Option<&RuleExtra>) -> Option<serde_json::Value> {
    extra.and_then(|e| e.rest.get("installerChoices").cloned())
}

fn extra_file_list(extra: Option<&RuleExtra>) -> Option<Vec<String>> {
    extra
        .and_then(|e| e.rest.get("fileList"))
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}
