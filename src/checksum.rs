use md5::{Digest, Md5};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ChecksumError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

/// Computes the hex-encoded MD5 digest of a file's contents.
///
/// The file is read in chunks; nothing is modified. Shadow headers record
/// these digests for the legacy files they replace, so the digest here must
/// match what `md5sum` would print for the same file.
pub fn md5_file(path: &Path) -> Result<String, ChecksumError> {
    let mut file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            ChecksumError::PermissionDenied(path.to_path_buf())
        } else {
            ChecksumError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;

    let mut hasher = Md5::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = file.read(&mut buffer).map_err(|e| ChecksumError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    let digest = format!("{:x}", hasher.finalize());
    debug!("MD5 of {} is {}", path.display(), digest);
    Ok(digest)
}
