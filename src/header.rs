//! Shadow-file directive parsing.
//!
//! A shadow file is an ordinary build script whose leading comment block may
//! contain directive lines of the form:
//!
//! ```text
//! # %nextgen_build_filename = Makefile.am
//! # %nextgen_build_filemode = 7
//! # %nextgen_build_replaces = Makefile.am.orig 0123456789abcdef0123456789abcdef
//! ```
//!
//! Lines that do not match the directive shape are ordinary content and are
//! ignored here; a recognized but unknown directive name is fatal, as is a
//! shadow file containing no directives at all.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

pub const DIRECTIVE_PREFIX: &str = "%nextgen_build_";

/// Default mode before the umask is applied (octal digit 6).
const DEFAULT_FILE_MODE: u32 = 0o666;

#[derive(Debug, thiserror::Error)]
pub enum HeaderError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("duplicate %nextgen_build_filename in {shadow}: {name}")]
    DuplicateFilename { shadow: PathBuf, name: String },
    #[error("duplicate %nextgen_build_replaces in {shadow}: {name}")]
    DuplicateReplaces { shadow: PathBuf, name: String },
    #[error("unknown directive in {shadow}: {line}")]
    UnknownDirective { shadow: PathBuf, line: String },
    #[error("malformed %nextgen_build_{directive} value in {shadow}: {value}")]
    MalformedValue {
        shadow: PathBuf,
        directive: &'static str,
        value: String,
    },
    #[error("no valid directives in file: {0}")]
    NoDirectives(PathBuf),
}

/// Parsed directive set for one shadow file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Path of the shadow file this header was parsed from.
    pub shadow_path: PathBuf,
    /// Destination file name from `filename`, if any.
    pub rename_to: Option<String>,
    /// Permission bits from `filemode` (pre-umask), defaulting to 0o666.
    pub file_mode: u32,
    /// `(legacy filename, expected md5)` pairs from `replaces`, in file order.
    pub replaced: Vec<(String, String)>,
}

impl Header {
    fn new(shadow_path: PathBuf) -> Self {
        Header {
            shadow_path,
            rename_to: None,
            file_mode: DEFAULT_FILE_MODE,
            replaced: Vec::new(),
        }
    }

    /// Directory containing the shadow file; legacy and destination names
    /// are resolved relative to it.
    pub fn directory(&self) -> &Path {
        self.shadow_path.parent().unwrap_or(Path::new(""))
    }

    fn set_rename_to(&mut self, name: &str) -> Result<(), HeaderError> {
        if self.rename_to.is_some() {
            return Err(HeaderError::DuplicateFilename {
                shadow: self.shadow_path.clone(),
                name: name.to_string(),
            });
        }
        self.rename_to = Some(name.to_string());
        Ok(())
    }

    fn set_file_mode(&mut self, value: &str) -> Result<(), HeaderError> {
        let malformed = || HeaderError::MalformedValue {
            shadow: self.shadow_path.clone(),
            directive: "filemode",
            value: value.to_string(),
        };
        let digit = value.parse::<u32>().map_err(|_| malformed())?;
        if value.len() != 1 || digit > 7 {
            return Err(malformed());
        }
        // Expand the octal digit p to the repeating-digit mode 0ppp.
        self.file_mode = digit + 8 * (digit + 8 * digit);
        Ok(())
    }

    fn add_replaced(&mut self, value: &str) -> Result<(), HeaderError> {
        let mut tokens = value.split_whitespace();
        let (Some(legacy), Some(md5), None) = (tokens.next(), tokens.next(), tokens.next()) else {
            return Err(HeaderError::MalformedValue {
                shadow: self.shadow_path.clone(),
                directive: "replaces",
                value: value.to_string(),
            });
        };
        if self.replaced.iter().any(|(name, _)| name == legacy) {
            return Err(HeaderError::DuplicateReplaces {
                shadow: self.shadow_path.clone(),
                name: legacy.to_string(),
            });
        }
        self.replaced.push((legacy.to_string(), md5.to_string()));
        Ok(())
    }
}

/// Splits a line into `(directive name, value)` if it has the directive shape.
///
/// The shape is: optional surrounding whitespace, `#`, at least one space,
/// the directive prefix, a lowercase-ASCII name, `=`, and a non-empty value.
/// Anything else is ordinary file content.
fn match_directive(line: &str) -> Option<(&str, &str)> {
    let line = line.trim();
    let rest = line.strip_prefix('#')?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start().strip_prefix(DIRECTIVE_PREFIX)?;
    let (name, value) = rest.split_once('=')?;
    let name = name.trim_end();
    let value = value.trim();
    if name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase()) {
        return None;
    }
    if value.is_empty() {
        return None;
    }
    Some((name, value))
}

/// Reads a shadow file and parses its directives into a [`Header`].
///
/// Read-only; the embedded replacement content is skipped over.
pub fn parse_header(shadow_path: &Path) -> Result<Header, HeaderError> {
    let file = File::open(shadow_path).map_err(|e| HeaderError::Io {
        path: shadow_path.to_path_buf(),
        source: e,
    })?;

    let mut header = Header::new(shadow_path.to_path_buf());
    let mut found_directive = false;

    for line in BufReader::new(file).lines() {
        let line = line.map_err(|e| HeaderError::Io {
            path: shadow_path.to_path_buf(),
            source: e,
        })?;
        let Some((name, value)) = match_directive(&line) else {
            continue;
        };
        found_directive = true;
        match name {
            "filename" => header.set_rename_to(value)?,
            "filemode" => header.set_file_mode(value)?,
            "replaces" => header.add_replaced(value)?,
            _ => {
                return Err(HeaderError::UnknownDirective {
                    shadow: shadow_path.to_path_buf(),
                    line: line.trim().to_string(),
                });
            }
        }
    }

    if !found_directive {
        return Err(HeaderError::NoDirectives(shadow_path.to_path_buf()));
    }

    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_shadow(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn parses_all_directive_kinds() {
        let temp = TempDir::new().unwrap();
        let path = write_shadow(
            &temp,
            "configure.nextgen",
            "# %nextgen_build_filename = configure\n\
             # %nextgen_build_filemode = 7\n\
             # %nextgen_build_replaces = configure.orig aaaabbbbccccddddaaaabbbbccccdddd\n\
             \n\
             echo hello\n",
        );

        let header = parse_header(&path).unwrap();

        assert_eq!(header.rename_to.as_deref(), Some("configure"));
        assert_eq!(header.file_mode, 0o777);
        assert_eq!(
            header.replaced,
            vec![(
                "configure.orig".to_string(),
                "aaaabbbbccccddddaaaabbbbccccdddd".to_string()
            )]
        );
    }

    #[test]
    fn file_mode_defaults_to_0666() {
        let temp = TempDir::new().unwrap();
        let path = write_shadow(
            &temp,
            "m.nextgen",
            "# %nextgen_build_filename = Makefile.am\n",
        );

        let header = parse_header(&path).unwrap();

        assert_eq!(header.file_mode, 0o666);
    }

    #[test]
    fn file_mode_digit_expands_to_repeated_octal() {
        let temp = TempDir::new().unwrap();
        for (digit, mode) in [("0", 0o000), ("4", 0o444), ("6", 0o666), ("7", 0o777)] {
            let path = write_shadow(
                &temp,
                "m.nextgen",
                &format!("# %nextgen_build_filemode = {digit}\n"),
            );
            assert_eq!(parse_header(&path).unwrap().file_mode, mode);
        }
    }

    #[test]
    fn rejects_out_of_range_or_multi_digit_filemode() {
        let temp = TempDir::new().unwrap();
        for bad in ["8", "66", "x"] {
            let path = write_shadow(
                &temp,
                "m.nextgen",
                &format!("# %nextgen_build_filemode = {bad}\n"),
            );
            assert!(matches!(
                parse_header(&path),
                Err(HeaderError::MalformedValue {
                    directive: "filemode",
                    ..
                })
            ));
        }
    }

    #[test]
    fn second_filename_directive_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = write_shadow(
            &temp,
            "m.nextgen",
            "# %nextgen_build_filename = a\n\
             # %nextgen_build_filename = b\n",
        );

        assert!(matches!(
            parse_header(&path),
            Err(HeaderError::DuplicateFilename { .. })
        ));
    }

    #[test]
    fn distinct_replaces_accepted_duplicate_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write_shadow(
            &temp,
            "m.nextgen",
            "# %nextgen_build_replaces = a.orig 11112222333344441111222233334444\n\
             # %nextgen_build_replaces = b.orig 55556666777788885555666677778888\n",
        );
        let header = parse_header(&path).unwrap();
        assert_eq!(header.replaced.len(), 2);

        let path = write_shadow(
            &temp,
            "m.nextgen",
            "# %nextgen_build_replaces = a.orig 11112222333344441111222233334444\n\
             # %nextgen_build_replaces = a.orig 55556666777788885555666677778888\n",
        );
        match parse_header(&path) {
            Err(HeaderError::DuplicateReplaces { name, .. }) => assert_eq!(name, "a.orig"),
            other => panic!("Expected DuplicateReplaces, got {:?}", other),
        }
    }

    #[test]
    fn replaces_needs_exactly_two_tokens() {
        let temp = TempDir::new().unwrap();
        for bad in ["justonename", "a.orig md5 extra"] {
            let path = write_shadow(
                &temp,
                "m.nextgen",
                &format!("# %nextgen_build_replaces = {bad}\n"),
            );
            assert!(matches!(
                parse_header(&path),
                Err(HeaderError::MalformedValue {
                    directive: "replaces",
                    ..
                })
            ));
        }
    }

    #[test]
    fn unknown_directive_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = write_shadow(&temp, "m.nextgen", "# %nextgen_build_frobnicate = yes\n");

        assert!(matches!(
            parse_header(&path),
            Err(HeaderError::UnknownDirective { .. })
        ));
    }

    #[test]
    fn zero_directives_is_fatal() {
        let temp = TempDir::new().unwrap();
        let path = write_shadow(
            &temp,
            "m.nextgen",
            "# just a comment\nsome content\n# %not_a_directive = x\n",
        );

        match parse_header(&path) {
            Err(HeaderError::NoDirectives(p)) => assert_eq!(p, path),
            other => panic!("Expected NoDirectives, got {:?}", other),
        }
    }

    #[test]
    fn non_directive_lines_are_ignored() {
        let temp = TempDir::new().unwrap();
        // Missing space after '#' and a '%nextgen_build_' mention in plain
        // content must both be ignored.
        let path = write_shadow(
            &temp,
            "m.nextgen",
            "#%nextgen_build_filename = ignored\n\
             echo '%nextgen_build_filename = also ignored'\n\
             # %nextgen_build_filename = real\n",
        );

        let header = parse_header(&path).unwrap();
        assert_eq!(header.rename_to.as_deref(), Some("real"));
    }

    #[test]
    fn directive_tolerates_extra_whitespace() {
        let temp = TempDir::new().unwrap();
        let path = write_shadow(
            &temp,
            "m.nextgen",
            "  #   %nextgen_build_filename   =   spaced.out  \n",
        );

        let header = parse_header(&path).unwrap();
        assert_eq!(header.rename_to.as_deref(), Some("spaced.out"));
    }

    #[test]
    fn unreadable_shadow_file_is_io_error() {
        let result = parse_header(Path::new("/nonexistent/x.nextgen"));
        assert!(matches!(result, Err(HeaderError::Io { .. })));
    }
}
