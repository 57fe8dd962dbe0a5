use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File-name suffix marking a shadow file.
pub const SHADOW_SUFFIX: &str = ".nextgen";

#[derive(Debug, thiserror::Error)]
pub enum DiscoverError {
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Recursively finds every shadow file under `root`, following symlinks.
///
/// Results are sorted so that runs process shadow files in a stable order
/// regardless of the underlying directory iteration order.
pub fn discover_shadow_files(root: &Path) -> Result<Vec<PathBuf>, DiscoverError> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(SHADOW_SUFFIX))
        {
            found.push(entry.into_path());
        }
    }
    found.sort();
    debug!("discovered {} shadow file(s)", found.len());
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_shadow_files_recursively_and_sorted() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        fs::write(root.join("z.nextgen"), "").unwrap();
        fs::write(root.join("plain.txt"), "").unwrap();
        fs::write(root.join("sub/a.nextgen"), "").unwrap();
        fs::write(root.join("sub/deeper/b.nextgen"), "").unwrap();

        let found = discover_shadow_files(root).unwrap();

        assert_eq!(
            found,
            vec![
                root.join("sub/a.nextgen"),
                root.join("sub/deeper/b.nextgen"),
                root.join("z.nextgen"),
            ]
        );
    }

    #[test]
    fn empty_tree_yields_nothing() {
        let temp = TempDir::new().unwrap();
        assert!(discover_shadow_files(temp.path()).unwrap().is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn follows_directory_symlinks() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::create_dir(root.join("real")).unwrap();
        fs::write(root.join("real/f.nextgen"), "").unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("linked")).unwrap();

        let found = discover_shadow_files(root).unwrap();

        assert!(found.contains(&root.join("linked/f.nextgen")));
        assert!(found.contains(&root.join("real/f.nextgen")));
    }

    #[test]
    fn suffix_must_terminate_the_name() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        fs::write(root.join("f.nextgen.bak"), "").unwrap();

        assert!(discover_shadow_files(root).unwrap().is_empty());
    }
}
