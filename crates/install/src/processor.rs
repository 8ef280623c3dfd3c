//! The instruction processor: validates, groups, and executes an
//! installer's instruction list against the staging layout.
//!
//! Execution order is fixed: fatal errors abort before any filesystem or
//! store write happens, directories come before file transfers, and
//! catalogue writes (attributes, mod-type, rules) come last.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::Path;

use futures::future::BoxFuture;
use modforge_errors::{Error, InstallError, Result};
use modforge_events::{EventEmitter, NotificationKind};
use modforge_host::HostApi;
use modforge_types::{Instruction, ModRule};
use tracing::{debug, warn};

use crate::validation::{join_destination, sanitize_destination};

/// Callback into the pipeline for nested archives: extract and install
/// the archive at `archive` into the same mod.
pub(crate) trait SubmoduleHandler: Sync {
    fn install_submodule<'a>(
        &'a self,
        archive: &'a Path,
        key: &'a str,
    ) -> BoxFuture<'a, Result<()>>;
}

struct IniEdit {
    destination: String,
    section: String,
    key: String,
    value: String,
}

/// Instructions partitioned by type, with destinations already sanitised.
#[derive(Default)]
struct InstructionGroups {
    copies: Vec<(String, String)>,
    mkdirs: Vec<String>,
    generates: Vec<(String, String)>,
    ini_edits: Vec<IniEdit>,
    submodules: Vec<(String, String, Option<String>)>,
    attributes: Vec<(String, serde_json::Value)>,
    mod_types: Vec<String>,
    rules: Vec<ModRule>,
    errors: Vec<(String, Option<String>)>,
    unsupported: Vec<String>,
    invalid: Vec<(String, Error)>,
}

pub(crate) struct InstructionProcessor<'a> {
    pub api: &'a HostApi,
    pub game_id: &'a str,
    pub mod_id: &'a str,
    pub mod_name: &'a str,
    pub destination: &'a Path,
    pub temp_path: &'a Path,
    pub archive_md5: Option<&'a str>,
}

impl InstructionProcessor<'_> {
    /// Execute an instruction list. Per-instruction validation failures
    /// are surfaced but do not abort; a fatal `error` instruction aborts
    /// before anything is written.
    pub(crate) async fn process(
        &self,
        instructions: Vec<Instruction>,
        submodules: &dyn SubmoduleHandler,
    ) -> Result<()> {
        let groups = Self::group(instructions);

        if let Some((_, source)) = groups
            .errors
            .iter()
            .find(|(value, _)| value == "fatal")
        {
            let detail = source.clone().unwrap_or_else(|| "no details".to_string());
            return Err(Error::process_canceled(format!(
                "the installer reported a fatal error: {detail}"
            )));
        }
        if !groups.errors.is_empty() {
            let combined = groups
                .errors
                .iter()
                .map(|(value, source)| match source {
                    Some(source) => format!("{source}: {value}"),
                    None => value.clone(),
                })
                .collect::<Vec<_>>()
                .join("\n");
            self.api.emit_notification(
                NotificationKind::Error,
                "Installer reported errors",
                combined,
            );
        }

        if !groups.invalid.is_empty() {
            let listed = groups
                .invalid
                .iter()
                .map(|(dest, err)| format!("{dest}: {err}"))
                .collect::<Vec<_>>()
                .join("\n");
            self.api.emit_notification(
                NotificationKind::Warning,
                "Invalid installer instructions",
                format!("The installer for {} produced invalid destinations:\n{listed}", self.mod_name),
            );
        }

        if !groups.unsupported.is_empty() {
            let features = groups.unsupported.join(", ");
            let hash = self.archive_md5.unwrap_or("unknown");
            self.api.emit_notification(
                NotificationKind::Info,
                "Installer uses unsupported features",
                format!(
                    "Please report this to add support: {features} (archive {hash})"
                ),
            );
        }

        self.make_directories(&groups.mkdirs).await?;
        self.transfer_copies(&groups.copies).await?;
        self.generate_files(&groups.generates).await?;
        self.write_ini_tweaks(&groups.ini_edits).await?;

        for (key, path, submodule_type) in &groups.submodules {
            let archive = self.temp_path.join(path);
            submodules.install_submodule(&archive, key).await?;
            if let Some(mod_type) = submodule_type {
                self.api
                    .store
                    .set_mod_type(self.game_id, self.mod_id, mod_type)
                    .await?;
            }
        }

        for (key, value) in groups.attributes {
            self.api
                .store
                .set_attribute(self.game_id, self.mod_id, &key, value)
                .await?;
        }

        if let Some((last, rest)) = groups.mod_types.split_last() {
            if !rest.is_empty() {
                warn!(
                    mod_id = self.mod_id,
                    ignored = ?rest,
                    "multiple setmodtype instructions, last one wins"
                );
            }
            self.api
                .store
                .set_mod_type(self.game_id, self.mod_id, last)
                .await?;
        }

        for rule in groups.rules {
            self.api
                .store
                .add_rule(self.game_id, self.mod_id, rule)
                .await?;
        }

        Ok(())
    }

    /// Partition by type, sanitising destinations as they are ingested.
    fn group(instructions: Vec<Instruction>) -> InstructionGroups {
        let mut groups = InstructionGroups::default();
        for instruction in instructions {
            match instruction {
                Instruction::Copy {
                    source,
                    destination,
                } => match sanitize_destination(&destination) {
                    Ok(dest) => groups.copies.push((source, dest)),
                    Err(err) => groups.invalid.push((destination, err)),
                },
                Instruction::Mkdir { destination } => {
                    match sanitize_destination(&destination) {
                        Ok(dest) => groups.mkdirs.push(dest),
                        Err(err) => groups.invalid.push((destination, err)),
                    }
                }
                Instruction::GenerateFile { data, destination } => {
                    match sanitize_destination(&destination) {
                        Ok(dest) => groups.generates.push((data, dest)),
                        Err(err) => groups.invalid.push((destination, err)),
                    }
                }
                Instruction::IniEdit {
                    destination,
                    section,
                    key,
                    value,
                } => match sanitize_destination(&destination) {
                    Ok(dest) => groups.ini_edits.push(IniEdit {
                        destination: dest,
                        section,
                        key,
                        value,
                    }),
                    Err(err) => groups.invalid.push((destination, err)),
                },
                Instruction::Submodule {
                    key,
                    path,
                    submodule_type,
                } => groups.submodules.push((key, path, submodule_type)),
                Instruction::Attribute { key, value } => {
                    groups.attributes.push((key, value));
                }
                Instruction::SetModType { value } => groups.mod_types.push(value),
                Instruction::Rule { rule } => groups.rules.push(rule),
                Instruction::Unsupported { source } => groups.unsupported.push(source),
                Instruction::Error { value, source } => {
                    groups.errors.push((value, source));
                }
            }
        }
        groups
    }

    async fn make_directories(&self, dirs: &[String]) -> Result<()> {
        for dir in dirs {
            let path = join_destination(self.destination, dir)?;
            tokio::fs::create_dir_all(&path)
                .await
                .map_err(|err| InstallError::filesystem("mkdir", &path, &err))?;
        }
        Ok(())
    }

    /// Stage copies grouped by source. All destinations but the last are
    /// copies; the last is a rename, leaving each source owned by exactly
    /// one destination. A rename refused by the filesystem falls back to
    /// a plain copy. Missing sources are collected rather than fatal.
    async fn transfer_copies(&self, copies: &[(String, String)]) -> Result<()> {
        let mut order: Vec<&String> = Vec::new();
        let mut by_source: HashMap<&String, Vec<&String>> = HashMap::new();
        for (source, destination) in copies {
            let slot = by_source.entry(source).or_default();
            if slot.is_empty() {
                order.push(source);
            }
            slot.push(destination);
        }

        let mut missing = Vec::new();
        for source in order {
            let source_path = self.temp_path.join(source.as_str());
            let destinations = &by_source[source];

            match tokio::fs::metadata(&source_path).await {
                Ok(_) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    missing.push(source.clone());
                    continue;
                }
                Err(err) => {
                    return Err(InstallError::filesystem("stat", &source_path, &err).into())
                }
            }

            for (index, destination) in destinations.iter().enumerate() {
                let dest_path = join_destination(self.destination, destination)?;
                if let Some(parent) = dest_path.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|err| InstallError::filesystem("mkdir", parent, &err))?;
                }

                let is_last = index + 1 == destinations.len();
                if is_last {
                    match tokio::fs::rename(&source_path, &dest_path).await {
                        Ok(()) => {}
                        Err(err)
                            if matches!(
                                err.kind(),
                                ErrorKind::PermissionDenied | ErrorKind::CrossesDevices
                            ) =>
                        {
                            debug!(source = %source_path.display(), "rename refused, copying instead");
                            tokio::fs::copy(&source_path, &dest_path).await.map_err(
                                |err| InstallError::filesystem("copy", &dest_path, &err),
                            )?;
                        }
                        Err(err) => {
                            return Err(
                                InstallError::filesystem("move", &dest_path, &err).into()
                            )
                        }
                    }
                } else {
                    tokio::fs::copy(&source_path, &dest_path)
                        .await
                        .map_err(|err| InstallError::filesystem("copy", &dest_path, &err))?;
                }
            }
        }

        if !missing.is_empty() {
            self.api.emit_notification(
                NotificationKind::Warning,
                "Invalid installer",
                format!(
                    "The installer for {} tried to install files that are not part of the archive: {}",
                    self.mod_name,
                    missing.join(", ")
                ),
            );
        }
        Ok(())
    }

    async fn generate_files(&self, generates: &[(String, String)]) -> Result<()> {
        for (data, destination) in generates {
            let path = join_destination(self.destination, destination)?;
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| InstallError::filesystem("mkdir", parent, &err))?;
            }
            tokio::fs::write(&path, data.as_bytes())
                .await
                .map_err(|err| InstallError::filesystem("write", &path, &err))?;
        }
        Ok(())
    }

    /// Render ini tweaks under `Ini Tweaks/<destination>`: entries grouped
    /// by section, first-seen order preserved, platform line endings.
    async fn write_ini_tweaks(&self, edits: &[IniEdit]) -> Result<()> {
        let mut destinations: Vec<&String> = Vec::new();
        let mut by_destination: HashMap<&String, Vec<&IniEdit>> = HashMap::new();
        for edit in edits {
            let slot = by_destination.entry(&edit.destination).or_default();
            if slot.is_empty() {
                destinations.push(&edit.destination);
            }
            slot.push(edit);
        }

        for destination in destinations {
            let mut sections: Vec<(&String, Vec<&IniEdit>)> = Vec::new();
            for edit in by_destination[destination].iter().copied() {
                match sections.iter_mut().find(|(name, _)| *name == &edit.section) {
                    Some((_, entries)) => entries.push(edit),
                    None => sections.push((&edit.section, vec![edit])),
                }
            }

            let eol = if cfg!(windows) { "\r\n" } else { "\n" };
            let mut rendered = String::new();
            for (section, entries) in &sections {
                rendered.push_str(&format!("[{section}]{eol}"));
                for edit in entries {
                    rendered.push_str(&format!("{} = {}{eol}", edit.key, edit.value));
                }
                rendered.push_str(eol);
            }

            let path = self
                .destination
                .join("Ini Tweaks")
                .join(destination.as_str());
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|err| InstallError::filesystem("mkdir", parent, &err))?;
            }
            tokio::fs::write(&path, rendered.as_bytes())
                .await
                .map_err(|err| InstallError::filesystem("write", &path, &err))?;
        }
        Ok(())
    }
}
