//! The instruction model: the closed set of primitive install actions an
//! installer can emit.

use serde::{Deserialize, Serialize};

use crate::reference::ModRule;

/// A single primitive install action produced by an installer and executed
/// by the instruction processor against a staging directory.
///
/// `source` paths are relative to the pipeline's temp directory,
/// `destination` paths relative to the mod's install directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Instruction {
    /// Stage a file from the temp directory into the mod.
    Copy { source: String, destination: String },

    /// Ensure an empty directory exists.
    Mkdir { destination: String },

    /// Write literal data to `destination`.
    GenerateFile { data: String, destination: String },

    /// Record a key/value for the mod's `Ini Tweaks/<destination>` output.
    IniEdit {
        destination: String,
        section: String,
        key: String,
        value: String,
    },

    /// Recursively install the nested archive at `path`; on completion the
    /// optional `submodule_type` becomes the parent's mod-type.
    Submodule {
        key: String,
        path: String,
        #[serde(
            default,
            rename = "submoduleType",
            skip_serializing_if = "Option::is_none"
        )]
        submodule_type: Option<String>,
    },

    /// Persist a mod attribute.
    Attribute {
        key: String,
        value: serde_json::Value,
    },

    /// Persist the mod-type; when several appear, the last one wins.
    SetModType { value: String },

    /// Persist a mod-rule.
    Rule { rule: ModRule },

    /// Installer feature that is not implemented; non-fatal.
    Unsupported { source: String },

    /// Installer-reported error; `value == "fatal"` aborts the pipeline.
    Error {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
}

impl Instruction {
    /// True for an `error` instruction that must abort the pipeline.
    #[must_use]
    pub fn is_fatal_error(&self) -> bool {
        matches!(self, Self::Error { value, .. } if value == "fatal")
    }
}
