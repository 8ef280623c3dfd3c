#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency gathering for the modforge install core
//!
//! Walks a mod's `requires`/`recommends` rules, matches each reference
//! against the installed catalogue first and the metadata service second,
//! and produces the flat, de-duplicated list of dependencies the install
//! manager then downloads and installs. Rule references form a graph that
//! may contain cycles; the gatherer tracks visited
//! `(source mod, reference)` pairs instead of recursing blindly.

pub mod gather;
pub mod matching;
pub mod rules;

pub use gather::{gather_dependencies, ExistingDependency, GatherOutcome, GatherReport};
pub use matching::{entry_matches, find_installed, version_matches};
pub use rules::{pin_rule, repair_rules, update_rule};
