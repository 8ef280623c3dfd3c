//! Extraction glue: error classification, password retry, the
//! continue-on-errors dialog, and file enumeration.

use std::path::Path;

use futures::future::BoxFuture;
use futures::FutureExt;
use modforge_errors::{Error, ExtractError, Result};
use modforge_host::HostApi;
use tracing::warn;

/// Extensions recognised as true archives. Anything else that fails to
/// open gets the single-file-mod fallback instead of a hard error.
pub const ARCHIVE_EXTENSIONS: &[&str] = &[
    "zip", "z01", "7z", "rar", "r00", "001", "bz2", "bzip2", "gz", "gzip", "xz", "z", "lzh",
];

/// Is this file, by extension, expected to be an archive?
#[must_use]
pub fn has_archive_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            let ext = ext.to_ascii_lowercase();
            ARCHIVE_EXTENSIONS.contains(&ext.as_str())
        })
}

/// Extractor messages that mark the archive itself as broken, matched
/// case-insensitively.
const CRITICAL_MESSAGES: &[&str] = &[
    "unexpected end of archive",
    "data error",
    "cannot open as archive",
];

/// Return the first critical message, if any.
#[must_use]
pub fn classify_errors(errors: &[String]) -> Option<&String> {
    errors.iter().find(|message| {
        let lower = message.to_ascii_lowercase();
        CRITICAL_MESSAGES
            .iter()
            .any(|critical| lower.contains(critical))
    })
}

/// Extract `archive` into `dest`, handling passwords and non-critical
/// errors.
///
/// A password-protected archive triggers one password prompt and one
/// retry. A non-zero exit code with only non-critical messages is put to
/// the user; exit codes above 1 are terminal, so the continue option is
/// withheld and the dialog can only cancel.
///
/// # Errors
///
/// - [`ExtractError::ArchiveBroken`] when a critical message appears
/// - [`Error::UserCanceled`] from the password or continue dialog
/// - whatever the extractor itself fails with
pub async fn extract_archive(
    api: &HostApi,
    archive: &Path,
    dest: &Path,
    progress: &(dyn Fn(f32) + Send + Sync),
) -> Result<()> {
    let archive_name = archive
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let outcome = match api
        .extractor
        .extract_full(archive, dest, progress, None)
        .await
    {
        Err(Error::Extract(ExtractError::PasswordRequired)) => {
            let password = api.dialogs.query_password(&archive_name).await?;
            api.extractor
                .extract_full(archive, dest, progress, Some(&password))
                .await?
        }
        other => other?,
    };

    if outcome.code == 0 {
        return Ok(());
    }

    if let Some(critical) = classify_errors(&outcome.errors) {
        return Err(ExtractError::ArchiveBroken {
            message: critical.clone(),
        }
        .into());
    }

    warn!(code = outcome.code, archive = %archive_name, "extraction finished with errors");
    let allow_continue = outcome.code == 1;
    api.dialogs
        .confirm_continue_extraction(&archive_name, &outcome.errors, allow_continue)
        .await
        .map_err(|err| {
            if allow_continue || !err.is_user_canceled() {
                err
            } else {
                ExtractError::Failed {
                    code: outcome.code,
                    messages: outcome.errors.clone(),
                }
                .into()
            }
        })
}

/// Walk `root` and list relative paths, directories with a trailing
/// separator (stop-folder heuristics in some installers depend on it).
/// Entries are sorted for deterministic installer input.
///
/// # Errors
///
/// Fails when a directory cannot be read.
pub async fn enumerate_files(root: &Path) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    walk(root, String::new(), &mut entries).await?;
    entries.sort();
    Ok(entries)
}

fn walk<'a>(
    dir: &'a Path,
    prefix: String,
    entries: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<()>> {
    async move {
        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .map_err(|err| Error::io_with_path(&err, dir))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|err| Error::io_with_path(&err, dir))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}{}{name}", std::path::MAIN_SEPARATOR)
            };
            let file_type = entry
                .file_type()
                .await
                .map_err(|err| Error::io_with_path(&err, entry.path()))?;
            if file_type.is_dir() {
                entries.push(format!("{relative}{}", std::path::MAIN_SEPARATOR));
                walk(&entry.path(), relative, entries).await?;
            } else {
                entries.push(relative);
            }
        }
        Ok(())
    }
    .boxed()
}
