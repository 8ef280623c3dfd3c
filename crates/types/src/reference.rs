//! Mod references and rules
//!
//! A [`ModReference`] identifies a mod by any combination of exact id,
//! content hash, logical file name, file-name expression, and version
//! match. Rules attach a reference to a relationship kind (`requires`,
//! `conflicts`, ...).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifies a mod, possibly fuzzily. Every field is optional; matching
/// precedence is id, then hash, then logical name / file expression
/// combined with the version match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        default,
        rename = "fileMD5",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_md5: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_file_name: Option<String>,

    /// Glob over the mod's file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_expression: Option<String>,

    /// Exact version, semver requirement, or fuzzy pattern.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_match: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ModReference {
    /// Stable key for de-duplication and cycle detection during
    /// dependency gathering.
    #[must_use]
    pub fn key(&self) -> String {
        if let Some(id) = &self.id {
            return format!("id:{id}");
        }
        if let Some(md5) = &self.file_md5 {
            return format!("md5:{md5}");
        }
        let version = self.version_match.as_deref().unwrap_or("*");
        if let Some(name) = &self.logical_file_name {
            return format!("name:{name}:{version}");
        }
        if let Some(expr) = &self.file_expression {
            return format!("expr:{expr}:{version}");
        }
        "unresolvable".to_string()
    }

    /// True when the reference matches by name/expression rather than by
    /// exact id — such references can be re-resolved after the target mod
    /// disappears.
    #[must_use]
    pub fn is_fuzzy(&self) -> bool {
        self.file_expression.is_some()
            || self.file_md5.is_some()
            || self.logical_file_name.is_some()
    }

    /// True when `version_match` is a fuzzy pattern rather than an exact
    /// pin.
    #[must_use]
    pub fn has_fuzzy_version(&self) -> bool {
        self.version_match
            .as_deref()
            .is_some_and(is_fuzzy_version)
    }
}

/// Classify a version match. Exact pins are a plain semver version
/// (optionally `=`-prefixed) or a 32-digit hex hash; everything else
/// (`>=1.2`, `^1.0`, `1.x`, `*`, `latest`) is fuzzy.
#[must_use]
pub fn is_fuzzy_version(version: &str) -> bool {
    let v = version.trim();
    if v.is_empty() {
        return false;
    }
    if v.len() == 32 && v.chars().all(|c| c.is_ascii_hexdigit()) {
        return false;
    }
    let exact = v.strip_prefix('=').unwrap_or(v);
    semver::Version::parse(exact).is_err()
}

/// Relationship kinds a rule can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleType {
    Requires,
    Recommends,
    Conflicts,
    Provides,
    Before,
    After,
}

impl RuleType {
    /// Whether the rule type participates in dependency resolution.
    #[must_use]
    pub fn is_dependency(self) -> bool {
        matches!(self, Self::Requires | Self::Recommends)
    }
}

/// Extra payload carried by a rule: the mod-type and file name to apply to
/// the dependency once installed, plus an open map for anything else.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleExtra {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub mod_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(flatten)]
    pub rest: BTreeMap<String, serde_json::Value>,
}

/// A persisted relationship between a mod and a reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModRule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    pub reference: ModReference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<RuleExtra>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_version_classification() {
        assert!(!is_fuzzy_version("1.2.3"));
        assert!(!is_fuzzy_version("=1.2.3"));
        assert!(!is_fuzzy_version("d41d8cd98f00b204e9800998ecf8427e"));
        assert!(is_fuzzy_version(">=1.2.0"));
        assert!(is_fuzzy_version("^1.0"));
        assert!(is_fuzzy_version("1.x"));
        assert!(is_fuzzy_version("*"));
        assert!(is_fuzzy_version("latest"));
        assert!(!is_fuzzy_version(""));
    }

    #[test]
    fn reference_key_precedence() {
        let by_id = ModReference {
            id: Some("modA".to_string()),
            file_md5: Some("abc".to_string()),
            ..ModReference::default()
        };
        assert_eq!(by_id.key(), "id:modA");

        let by_name = ModReference {
            logical_file_name: Some("SkyUI".to_string()),
            version_match: Some(">=5.0.0".to_string()),
            ..ModReference::default()
        };
        assert_eq!(by_name.key(), "name:SkyUI:>=5.0.0");
    }

    #[test]
    fn rule_type_wire_names() {
        let rule = ModRule {
            rule_type: RuleType::Requires,
            reference: ModReference::default(),
            extra: None,
        };
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "requires");
    }
}
