#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core data model for the modforge install core
//!
//! Instructions, mod references and rules, persisted mod entries, lookup
//! results, and the dependency value types exchanged between the resolver
//! and the install manager.

pub mod dependency;
pub mod instruction;
pub mod lookup;
pub mod mod_info;
pub mod mods;
pub mod reference;

pub use dependency::{Dependency, DependencyIssue};
pub use instruction::Instruction;
pub use lookup::LookupResult;
pub use mod_info::{CustomFields, DownloadHints, ModInfo};
pub use mods::{attr, InstallStatus, ModEntry, ModState, Profile};
pub use reference::{is_fuzzy_version, ModReference, ModRule, RuleExtra, RuleType};
