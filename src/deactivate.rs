//! Executor for deactivation.
//!
//! Removes installed destination files (best-effort) and reinstates the
//! deleted legacy files from version control. Two backends are supported:
//! git restores file by file from within each file's own directory, which
//! keeps a nested secondary repository working transparently; svn reverts in
//! batches because one `svn revert` invocation per file is far too slow.

use crate::plan::TransitionPlan;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum DeactivateError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("cannot reinstate {path}: path has no file name")]
    BadRestorePath { path: PathBuf },
}

/// Version-control backend used for reinstating deleted files.
///
/// Chosen once per run from the working directory; never re-checked per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VcsBackend {
    Git,
    Svn,
}

impl VcsBackend {
    /// An `.svn` marker directory at the working directory selects svn;
    /// anything else is assumed to be a git checkout.
    pub fn detect(working_dir: &Path) -> VcsBackend {
        if working_dir.join(".svn").exists() {
            VcsBackend::Svn
        } else {
            VcsBackend::Git
        }
    }
}

/// Removes installed destinations and restores scheduled-delete paths.
///
/// Destination removal failures are ignored (a manually removed destination
/// is fine). A restore command that exits non-zero is logged and skipped;
/// only failure to spawn the command at all is fatal.
pub fn run_deactivate(
    plan: &TransitionPlan,
    backend: VcsBackend,
    secondary_repo: Option<&Path>,
) -> Result<(), DeactivateError> {
    for rename in &plan.renames {
        let Some(dest) = rename.dest.as_deref() else {
            continue;
        };
        info!("remove {} (from {})", dest.display(), rename.source.display());
        if let Err(e) = fs::remove_file(dest) {
            debug!("ignoring removal failure for {}: {}", dest.display(), e);
        }
    }

    match backend {
        VcsBackend::Git => restore_with_git(&plan.deletes),
        VcsBackend::Svn => restore_with_svn(&plan.deletes, secondary_repo),
    }
}

/// `git checkout <name>` once per file, run from the file's own directory so
/// that files living in a nested secondary repository are restored by that
/// repository rather than the outer one.
fn restore_with_git(deleted: &[PathBuf]) -> Result<(), DeactivateError> {
    for path in deleted {
        info!("reinstate {}", path.display());
        let Some(name) = path.file_name() else {
            return Err(DeactivateError::BadRestorePath { path: path.clone() });
        };
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut command = Command::new("git");
        command.arg("checkout").arg(name);
        if let Some(dir) = dir {
            command.current_dir(dir);
        }
        run_restore_command(command)?;
    }
    Ok(())
}

/// Batched `svn revert`, partitioned into the secondary repository's files
/// (reverted from inside it, with re-relativized paths) and everything else.
fn restore_with_svn(
    deleted: &[PathBuf],
    secondary_repo: Option<&Path>,
) -> Result<(), DeactivateError> {
    for path in deleted {
        info!("reinstate {}", path.display());
    }
    let (main_paths, secondary_paths) = partition_for_svn(deleted, secondary_repo);

    if !main_paths.is_empty() {
        let mut command = Command::new("svn");
        command.arg("revert").args(&main_paths);
        run_restore_command(command)?;
    }
    if !secondary_paths.is_empty() {
        let mut command = Command::new("svn");
        command.arg("revert").args(&secondary_paths);
        // secondary_paths is only non-empty when a secondary repo was given.
        if let Some(repo) = secondary_repo {
            command.current_dir(repo);
        }
        run_restore_command(command)?;
    }
    Ok(())
}

/// Splits restore paths into those inside the secondary repository (made
/// relative to it) and everything else. Discovery yields "./"-prefixed
/// paths; the repo directory is accepted with or without that prefix.
fn partition_for_svn(
    deleted: &[PathBuf],
    secondary_repo: Option<&Path>,
) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut main_paths: Vec<PathBuf> = Vec::new();
    let mut secondary_paths: Vec<PathBuf> = Vec::new();
    let dotted_repo = secondary_repo.map(|repo| Path::new(".").join(repo));

    for path in deleted {
        let relative = secondary_repo
            .and_then(|repo| path.strip_prefix(repo).ok())
            .or_else(|| {
                dotted_repo
                    .as_deref()
                    .and_then(|repo| path.strip_prefix(repo).ok())
            });
        match relative {
            Some(relative) => secondary_paths.push(relative.to_path_buf()),
            None => main_paths.push(path.clone()),
        }
    }
    (main_paths, secondary_paths)
}

fn run_restore_command(mut command: Command) -> Result<(), DeactivateError> {
    let description = format!("{:?}", command);
    debug!("running {}", description);
    let status = command.status().map_err(|e| DeactivateError::Spawn {
        command: description.clone(),
        source: e,
    })?;
    if !status.success() {
        warn!("{} exited with {}", description, status);
    }
    Ok(())
}
