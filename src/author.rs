//! Helpers for authoring shadow files.
//!
//! `sum` prints ready-to-paste `replaces` directive lines; `ngize` creates
//! the `.nextgen` shadow counterpart of an existing build script.

use crate::checksum::{ChecksumError, md5_file};
use crate::discover::SHADOW_SUFFIX;
use crate::header::DIRECTIVE_PREFIX;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum AuthorError {
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
    #[error("{path} has no file name")]
    NoFileName { path: PathBuf },
    #[error("file name of {path} is not valid UTF-8")]
    NonUtf8Name { path: PathBuf },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Persist {
        path: PathBuf,
        source: tempfile::PersistError,
    },
}

/// Formats the `replaces` directive line recording `name`'s current checksum.
pub fn replaces_line(name: &str, md5: &str) -> String {
    format!("# {DIRECTIVE_PREFIX}replaces = {name} {md5}")
}

/// Prints one `replaces` directive line per file, checksums included.
pub fn print_sums(files: &[PathBuf], out: &mut impl Write) -> Result<(), AuthorError> {
    for file in files {
        let md5 = md5_file(file)?;
        writeln!(out, "{}", replaces_line(&file.display().to_string(), &md5)).map_err(|e| {
            AuthorError::Io {
                path: file.clone(),
                source: e,
            }
        })?;
    }
    Ok(())
}

/// Creates the shadow counterpart of `file` at `<file>.nextgen`.
///
/// The shadow starts with the header template's bytes when one is given,
/// then a generated `filename` directive. When `file` itself exists, a
/// `replaces` directive with its checksum follows, then a blank line and the
/// file's bytes verbatim, so that activating the fresh shadow reproduces the
/// original content. The shadow is written atomically (temp file + rename).
pub fn ngize(file: &Path, header_template: Option<&Path>) -> Result<PathBuf, AuthorError> {
    let basename = file
        .file_name()
        .ok_or_else(|| AuthorError::NoFileName {
            path: file.to_path_buf(),
        })?
        .to_str()
        .ok_or_else(|| AuthorError::NonUtf8Name {
            path: file.to_path_buf(),
        })?
        .to_string();
    let dir = file.parent().filter(|p| !p.as_os_str().is_empty());
    let shadow_path = match dir {
        Some(dir) => dir.join(format!("{basename}{SHADOW_SUFFIX}")),
        None => PathBuf::from(format!("{basename}{SHADOW_SUFFIX}")),
    };

    let mut content: Vec<u8> = Vec::new();
    if let Some(template) = header_template {
        content.extend(fs::read(template).map_err(|e| AuthorError::Io {
            path: template.to_path_buf(),
            source: e,
        })?);
    }
    content.extend(format!("# {DIRECTIVE_PREFIX}filename = {basename}\n").into_bytes());
    if file.exists() {
        let md5 = md5_file(file)?;
        content.extend(replaces_line(&basename, &md5).into_bytes());
        content.extend(b"\n\n");
        content.extend(fs::read(file).map_err(|e| AuthorError::Io {
            path: file.to_path_buf(),
            source: e,
        })?);
    }

    let parent = dir.unwrap_or(Path::new("."));
    let mut temp_file =
        tempfile::NamedTempFile::new_in(parent).map_err(|e| AuthorError::Io {
            path: parent.to_path_buf(),
            source: e,
        })?;
    temp_file
        .write_all(&content)
        .map_err(|e| AuthorError::Io {
            path: shadow_path.clone(),
            source: e,
        })?;
    temp_file
        .persist(&shadow_path)
        .map_err(|e| AuthorError::Persist {
            path: shadow_path.clone(),
            source: e,
        })?;

    info!("created {}", shadow_path.display());
    Ok(shadow_path)
}
