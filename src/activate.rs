//! Executor for activation and reactivation.
//!
//! Runs a fully validated [`TransitionPlan`]: deletions first, then installs.
//! Mutations are applied best-effort in plan order; the all-or-nothing
//! guarantee lives in the planning stage, not here.

use crate::plan::{RenameOp, TransitionPlan};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum ActivateError {
    #[error("failed to delete {path}: {source}")]
    Delete {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to install {dest} from {source_path}: {source}")]
    Install {
        dest: PathBuf,
        source_path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ActivateOutcome {
    pub deleted: usize,
    pub installed: usize,
    pub up_to_date: usize,
}

/// Reads the process umask without leaving it changed.
///
/// umask(2) has no read-only query, so set-and-restore is the only way. The
/// mask is captured once and treated as immutable for the rest of the
/// process; the set-and-restore dance is not safe to repeat from multiple
/// threads.
fn read_umask() -> u32 {
    static UMASK: std::sync::OnceLock<u32> = std::sync::OnceLock::new();
    *UMASK.get_or_init(|| {
        let mask = unsafe { libc::umask(0o777) };
        unsafe { libc::umask(mask) };
        mask as u32
    })
}

/// Executes deletions and installs from `plan`.
///
/// `initial` selects initial activation (always overwrite) as opposed to
/// reactivation, which skips destinations that are at least as new as their
/// source.
pub fn run_activate(plan: &TransitionPlan, initial: bool) -> Result<ActivateOutcome, ActivateError> {
    let mut outcome = ActivateOutcome::default();

    if !plan.deletes.is_empty() {
        info!(
            "delete files: {}",
            plan.deletes
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" ")
        );
        for path in &plan.deletes {
            fs::remove_file(path).map_err(|e| ActivateError::Delete {
                path: path.clone(),
                source: e,
            })?;
            outcome.deleted += 1;
        }
    }

    let umask = read_umask();
    for rename in &plan.renames {
        install_one(rename, initial, umask, &mut outcome)?;
    }

    Ok(outcome)
}

fn install_one(
    rename: &RenameOp,
    initial: bool,
    umask: u32,
    outcome: &mut ActivateOutcome,
) -> Result<(), ActivateError> {
    let Some(dest) = rename.dest.as_deref() else {
        debug!("no new file from {}", rename.source.display());
        return Ok(());
    };

    if !initial && !needs_install(&rename.source, dest) {
        info!(
            "up to date: {} (from {})",
            dest.display(),
            rename.source.display()
        );
        outcome.up_to_date += 1;
        return Ok(());
    }

    let masked_mode = rename.mode & !umask;
    info!(
        "copy {} -> {} (0{:03o})",
        rename.source.display(),
        dest.display(),
        masked_mode
    );

    let install_err = |e: std::io::Error| ActivateError::Install {
        dest: dest.to_path_buf(),
        source_path: rename.source.clone(),
        source: e,
    };
    fs::copy(&rename.source, dest).map_err(install_err)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dest, fs::Permissions::from_mode(masked_mode)).map_err(install_err)?;
    }
    outcome.installed += 1;
    Ok(())
}

/// A destination needs installing when it is missing or strictly older than
/// its source. mtime granularity is filesystem-dependent; good enough for a
/// developer tool.
fn needs_install(source: &Path, dest: &Path) -> bool {
    let Ok(dest_meta) = fs::metadata(dest) else {
        return true;
    };
    match (
        fs::metadata(source).and_then(|m| m.modified()),
        dest_meta.modified(),
    ) {
        (Ok(src_mtime), Ok(dest_mtime)) => src_mtime > dest_mtime,
        _ => true,
    }
}
