//! Rule repair and pinning around a dependency batch.

use modforge_errors::Result;
use modforge_host::HostApi;
use modforge_types::ModRule;
use tracing::debug;

/// Pre-flight repair: a rule whose `reference.id` points at a mod that no
/// longer exists, but which also matches fuzzily (hash, logical name, or
/// expression), gets its id cleared so gathering can re-match it.
///
/// # Errors
///
/// Fails when the store rejects a rule rewrite.
pub async fn repair_rules(api: &HostApi, game_id: &str, mod_id: &str) -> Result<()> {
    let Some(entry) = api.store.get_mod(game_id, mod_id).await? else {
        return Ok(());
    };
    let mods = api.store.mods(game_id).await?;

    for rule in &entry.rules {
        let Some(id) = &rule.reference.id else {
            continue;
        };
        if mods.contains_key(id) || !rule.reference.is_fuzzy() {
            continue;
        }
        debug!(mod_id, dangling = %id, "clearing dangling rule reference");
        let mut fixed = rule.clone();
        fixed.reference.id = None;
        api.store.remove_rule(game_id, mod_id, rule).await?;
        api.store.add_rule(game_id, mod_id, fixed).await?;
    }
    Ok(())
}

/// Pin a rule to the mod that ended up satisfying it. When a fuzzy
/// version match is combined with a logical-name or expression match, the
/// content hash is dropped from the reference: it would tie the rule to
/// one specific file and defeat future updates.
#[must_use]
pub fn pin_rule(rule: &ModRule, installed_mod_id: &str) -> ModRule {
    let mut pinned = rule.clone();
    pinned.reference.id = Some(installed_mod_id.to_string());
    if pinned.reference.has_fuzzy_version()
        && (pinned.reference.logical_file_name.is_some()
            || pinned.reference.file_expression.is_some())
    {
        pinned.reference.file_md5 = None;
    }
    pinned
}

/// Rewrite one rule on `source_mod_id` to pin it to `installed_mod_id`.
///
/// # Errors
///
/// Fails when the store rejects the rewrite.
pub async fn update_rule(
    api: &HostApi,
    game_id: &str,
    source_mod_id: &str,
    original: &ModRule,
    installed_mod_id: &str,
) -> Result<()> {
    let pinned = pin_rule(original, installed_mod_id);
    if pinned == *original {
        return Ok(());
    }
    api.store.remove_rule(game_id, source_mod_id, original).await?;
    api.store.add_rule(game_id, source_mod_id, pinned).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use modforge_types::{ModReference, RuleType};

    fn rule(reference: ModReference) -> ModRule {
        ModRule {
            rule_type: RuleType::Requires,
            reference,
            extra: None,
        }
    }

    #[test]
    fn pin_sets_reference_id() {
        let r = rule(ModReference {
            file_md5: Some("cafebabe".to_string()),
            ..ModReference::default()
        });
        let pinned = pin_rule(&r, "installedMod");
        assert_eq!(pinned.reference.id.as_deref(), Some("installedMod"));
        // exact hash reference keeps its hash
        assert_eq!(pinned.reference.file_md5.as_deref(), Some("cafebabe"));
    }

    #[test]
    fn pin_strips_md5_from_fuzzy_named_references() {
        let r = rule(ModReference {
            file_md5: Some("cafebabe".to_string()),
            logical_file_name: Some("SkyUI".to_string()),
            version_match: Some(">=5.0.0".to_string()),
            ..ModReference::default()
        });
        let pinned = pin_rule(&r, "skyui");
        assert_eq!(pinned.reference.id.as_deref(), Some("skyui"));
        assert!(pinned.reference.file_md5.is_none());
    }
}
