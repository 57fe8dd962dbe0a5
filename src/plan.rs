//! Transition planning.
//!
//! Aggregates parsed headers into a single plan of deletions and installs.
//! Planning is read-only: checksum verification and conflict detection all
//! happen here, before the executors touch the file system.

use crate::checksum::{ChecksumError, md5_file};
use crate::header::Header;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("MD5 does not match: {legacy} (to be replaced by: {shadow})")]
    ChecksumMismatch { legacy: PathBuf, shadow: PathBuf },
    #[error("duplicate %nextgen_build_replaces, duplicated old filenames: {}",
            .names.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", "))]
    DuplicateDeletes { names: Vec<PathBuf> },
    #[error("Checksum error: {0}")]
    Checksum(#[from] ChecksumError),
}

/// One install operation: copy `source` to `dest` with permission `mode`.
///
/// `dest` is `None` when the header had no `filename` directive; such a
/// shadow file only removes legacy files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameOp {
    pub source: PathBuf,
    pub dest: Option<PathBuf>,
    /// Requested permission bits, before the umask is applied.
    pub mode: u32,
}

/// Aggregated plan across all discovered shadow files.
#[derive(Debug, Default)]
pub struct TransitionPlan {
    /// Legacy files to remove, in header order.
    pub deletes: Vec<PathBuf>,
    /// One install per header, in header order.
    pub renames: Vec<RenameOp>,
}

/// Builds a [`TransitionPlan`] from parsed headers.
///
/// `do_removal` schedules the legacy files named by `replaces` directives for
/// deletion; `check_removal` additionally verifies each legacy file's MD5
/// against the recorded value first. Deactivation plans with removal but
/// without verification, since at that point the legacy files are expected to
/// already be gone.
///
/// A legacy path claimed by more than one shadow file is a conflict; it is
/// detected over the whole batch and reported with every duplicated path
/// before anything is mutated.
pub fn plan_transition(
    headers: &[Header],
    do_removal: bool,
    check_removal: bool,
) -> Result<TransitionPlan, PlanError> {
    let mut plan = TransitionPlan::default();

    for header in headers {
        let dir = header.directory();
        if do_removal {
            for (legacy_name, expected_md5) in &header.replaced {
                let legacy_path = dir.join(legacy_name);
                if check_removal {
                    let actual_md5 = md5_file(&legacy_path)?;
                    if actual_md5 != *expected_md5 {
                        return Err(PlanError::ChecksumMismatch {
                            legacy: legacy_path,
                            shadow: header.shadow_path.clone(),
                        });
                    }
                }
                plan.deletes.push(legacy_path);
            }
        }
        plan.renames.push(RenameOp {
            source: header.shadow_path.clone(),
            dest: header.rename_to.as_ref().map(|name| dir.join(name)),
            mode: header.file_mode,
        });
    }

    let duplicates = duplicated_paths(&plan.deletes);
    if !duplicates.is_empty() {
        return Err(PlanError::DuplicateDeletes { names: duplicates });
    }

    debug!(
        "planned {} deletion(s), {} install(s)",
        plan.deletes.len(),
        plan.renames.len()
    );
    Ok(plan)
}

/// Paths occurring more than once, each reported once, in first-seen order.
fn duplicated_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut duplicates = Vec::new();
    for (i, path) in paths.iter().enumerate() {
        if paths[..i].contains(path) && !duplicates.contains(path) {
            duplicates.push(path.clone());
        }
    }
    duplicates
}
