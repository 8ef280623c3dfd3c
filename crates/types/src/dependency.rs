//! Dependency value types produced by gathering and consumed by the
//! install execution phase. Discarded once the batch completes.

use serde::{Deserialize, Serialize};

use crate::lookup::LookupResult;
use crate::reference::{ModReference, ModRule, RuleExtra};

/// A dependency that still needs downloading and/or installing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    /// The rule this dependency was gathered from; rewritten once the
    /// dependency is installed.
    pub rule: ModRule,

    /// The mod carrying that rule (rules are gathered transitively, so
    /// this is not always the mod the batch was started for).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_mod_id: Option<String>,

    pub reference: ModReference,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lookup_results: Vec<LookupResult>,

    /// Known download id, if the archive is already (partially) present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,

    /// Already-installed mod satisfying the reference, if any (install is
    /// skipped, the mod only needs enabling).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_choices: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_list: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<RuleExtra>,
}

/// A reference the gatherer could not resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyIssue {
    pub reference: ModReference,
    pub message: String,
}

impl DependencyIssue {
    #[must_use]
    pub fn new(reference: ModReference, message: impl Into<String>) -> Self {
        Self {
            reference,
            message: message.into(),
        }
    }
}
