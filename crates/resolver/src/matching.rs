//! Reference matching against the installed catalogue

use std::collections::BTreeMap;

use globset::Glob;
use modforge_types::{attr, is_fuzzy_version, ModEntry, ModReference};

/// Find an installed mod satisfying `reference`. An exact id short-cuts;
/// otherwise entries are scanned in catalogue order.
#[must_use]
pub fn find_installed<'a>(
    mods: &'a BTreeMap<String, ModEntry>,
    reference: &ModReference,
) -> Option<&'a ModEntry> {
    if let Some(id) = &reference.id {
        if let Some(entry) = mods.get(id) {
            return Some(entry);
        }
    }
    mods.values().find(|entry| entry_matches(entry, reference))
}

/// Does this catalogue entry satisfy the reference?
#[must_use]
pub fn entry_matches(entry: &ModEntry, reference: &ModReference) -> bool {
    if let Some(id) = &reference.id {
        if entry.id == *id {
            return true;
        }
    }

    if let Some(md5) = &reference.file_md5 {
        if entry.attr_str(attr::FILE_MD5) == Some(md5.as_str()) {
            return true;
        }
    }

    let version_ok = version_matches(
        entry.attr_str(attr::VERSION),
        reference.version_match.as_deref(),
    );

    if let Some(name) = &reference.logical_file_name {
        if entry.attr_str(attr::LOGICAL_FILE_NAME) == Some(name.as_str()) && version_ok {
            return true;
        }
    }

    if let Some(expression) = &reference.file_expression {
        if let Some(file_name) = entry.attr_str(attr::FILE_NAME) {
            let matched = Glob::new(expression)
                .map(|glob| glob.compile_matcher().is_match(file_name))
                .unwrap_or(false);
            if matched && version_ok {
                return true;
            }
        }
    }

    false
}

/// Does an installed version satisfy a version match? No constraint or a
/// wildcard accepts anything; an exact pin compares versions; a range is
/// evaluated as a semver requirement; anything unparseable falls back to
/// string equality.
#[must_use]
pub fn version_matches(installed: Option<&str>, version_match: Option<&str>) -> bool {
    let Some(pattern) = version_match else {
        return true;
    };
    let pattern = pattern.trim();
    if pattern.is_empty() || pattern == "*" || pattern == "latest" {
        return true;
    }
    let Some(installed) = installed else {
        return false;
    };

    if !is_fuzzy_version(pattern) {
        let exact = pattern.strip_prefix('=').unwrap_or(pattern);
        return installed == exact;
    }

    match (
        semver::VersionReq::parse(pattern),
        semver::Version::parse(installed),
    ) {
        (Ok(req), Ok(version)) => req.matches(&version),
        _ => installed == pattern,
    }
}
