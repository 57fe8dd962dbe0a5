use assert_cmd::{Command, cargo::cargo_bin_cmd};
use std::path::Path;

pub fn ngactivate_cmd(cwd: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("ngactivate");
    cmd.arg("-C").arg(cwd);
    cmd
}

/// Runs `ngactivate sum <file>` and returns the printed directive line.
///
/// Integration tests build shadow headers with real checksums this way
/// instead of hashing on their own.
#[allow(dead_code)]
pub fn sum_line(cwd: &Path, file: &str) -> String {
    let output = ngactivate_cmd(cwd)
        .arg("sum")
        .arg(file)
        .output()
        .expect("failed to run `ngactivate sum`");
    assert!(output.status.success(), "sum failed for {file}");
    String::from_utf8(output.stdout)
        .expect("sum stdout should be UTF-8")
        .trim_end()
        .to_string()
}

/// Current process umask, read without leaving it changed.
///
/// Captured once; the set-and-restore needed to query it is not safe to
/// repeat from concurrently running tests.
#[allow(dead_code)]
pub fn current_umask() -> u32 {
    static UMASK: std::sync::OnceLock<u32> = std::sync::OnceLock::new();
    *UMASK.get_or_init(|| {
        let mask = unsafe { libc::umask(0o777) };
        unsafe { libc::umask(mask) };
        mask as u32
    })
}
