//! `exiftool`-backed metadata accessor.

use super::{MetadataAccessor, TagMap};
use crate::core::tools::{stderr_summary, ExternalTool};
use crate::error::MetadataError;
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Metadata accessor that shells out to `exiftool`.
///
/// One process per request; at most one request is in flight at a time.
#[derive(Debug, Clone)]
pub struct ExifTool {
    tool: ExternalTool,
}

impl ExifTool {
    /// Locate `exiftool` on the PATH
    pub fn locate() -> Result<Self, MetadataError> {
        Self::with_program("exiftool")
    }

    /// Use a specific exiftool executable
    pub fn with_program(program: impl Into<PathBuf>) -> Result<Self, MetadataError> {
        let tool = ExternalTool::locate(program, "-ver")?;
        Ok(Self { tool })
    }

    /// Version string reported by exiftool
    pub fn version(&self) -> &str {
        self.tool.version()
    }
}

impl MetadataAccessor for ExifTool {
    fn read_tags(&self, path: &Path, tags: &[&str]) -> Result<TagMap, MetadataError> {
        let mut args: Vec<OsString> = vec!["-j".into(), "-q".into()];
        args.extend(tags.iter().map(|t| OsString::from(format!("-{}", t))));
        args.push(file_arg(path));

        let output = self.tool.run(&args).map_err(|e| MetadataError::MetadataUnavailable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        trace!(path = %path.display(), status = %output.status, "exiftool read");

        match parse_read_output(&output.stdout) {
            Ok(tags) => Ok(tags),
            Err(reason) => {
                // Missing files print to stderr only
                let silent = output.stdout.iter().all(u8::is_ascii_whitespace);
                let reason = if silent && !output.status.success() {
                    stderr_summary(&output)
                } else {
                    reason
                };
                Err(MetadataError::MetadataUnavailable {
                    path: path.to_path_buf(),
                    reason,
                })
            }
        }
    }

    fn write_tags(&self, path: &Path, tags: &TagMap) -> Result<(), MetadataError> {
        if tags.is_empty() {
            return Ok(());
        }

        let mut args: Vec<OsString> = vec!["-overwrite_original".into()];
        for (name, value) in tags {
            if !is_valid_tag_name(name) {
                return Err(MetadataError::WriteFailed {
                    path: path.to_path_buf(),
                    reason: format!("invalid tag name '{}'", name),
                });
            }
            args.push(format!("-{}={}", name, value).into());
        }
        args.push(file_arg(path));

        let output = self.tool.run(&args).map_err(|e| MetadataError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if output.status.success() && write_succeeded(&stdout) {
            debug!(path = %path.display(), count = tags.len(), "tags written");
            Ok(())
        } else {
            Err(MetadataError::WriteFailed {
                path: path.to_path_buf(),
                reason: stderr_summary(&output),
            })
        }
    }
}

/// exiftool treats arguments starting with '-' as options
fn file_arg(path: &Path) -> OsString {
    if path.is_relative() && path.to_string_lossy().starts_with('-') {
        Path::new(".").join(path).into_os_string()
    } else {
        path.as_os_str().to_owned()
    }
}

/// Group-qualified names like `EXIF:DateTimeOriginal` are allowed
fn is_valid_tag_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .next()
            .map(|c| c.is_ascii_alphabetic())
            .unwrap_or(false)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_' || c == '-')
}

/// Parse `exiftool -j` output for a single file.
fn parse_read_output(stdout: &[u8]) -> Result<TagMap, String> {
    if stdout.iter().all(u8::is_ascii_whitespace) {
        return Err("exiftool produced no output".to_string());
    }

    let mut objects: Vec<Map<String, Value>> =
        serde_json::from_slice(stdout).map_err(|e| format!("unreadable exiftool output: {}", e))?;

    let object = match objects.len() {
        0 => return Err("exiftool returned no entries".to_string()),
        _ => objects.swap_remove(0),
    };

    if let Some(error) = object.get("Error") {
        return Err(value_to_string(error));
    }

    Ok(object
        .into_iter()
        .filter(|(key, _)| key != "SourceFile")
        .map(|(key, value)| (key, value_to_string(&value)))
        .collect())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// exiftool reports "N image files updated" / "N image files unchanged"
fn write_succeeded(stdout: &str) -> bool {
    stdout.lines().any(|line| {
        let line = line.trim();
        let mut words = line.split_whitespace();
        let count: usize = match words.next().and_then(|n| n.parse().ok()) {
            Some(n) => n,
            None => return false,
        };
        count > 0
            && (line.ends_with("image files updated") || line.ends_with("image files unchanged"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_and_drops_source_file() {
        let json = br#"[{
            "SourceFile": "/photos/a.jpg",
            "DateTimeOriginal": "2024:01:15 14:30:00",
            "Make": "Canon",
            "ISO": 200
        }]"#;
        let tags = parse_read_output(json).unwrap();
        assert_eq!(tags.get("Make").map(String::as_str), Some("Canon"));
        assert_eq!(tags.get("ISO").map(String::as_str), Some("200"));
        assert!(!tags.contains_key("SourceFile"));
    }

    #[test]
    fn error_field_is_unavailable() {
        let json = br#"[{"SourceFile": "/photos/a.jpg", "Error": "File format error"}]"#;
        assert_eq!(parse_read_output(json), Err("File format error".to_string()));
    }

    #[test]
    fn empty_output_is_an_error() {
        assert!(parse_read_output(b"").is_err());
        assert!(parse_read_output(b"  \n").is_err());
        assert!(parse_read_output(b"[]").is_err());
    }

    #[test]
    fn file_without_tags_yields_empty_map() {
        let json = br#"[{"SourceFile": "/photos/a.jpg"}]"#;
        assert!(parse_read_output(json).unwrap().is_empty());
    }

    #[test]
    fn write_summary_detection() {
        assert!(write_succeeded("    1 image files updated\n"));
        assert!(write_succeeded("    1 image files unchanged\n"));
        assert!(!write_succeeded(
            "    0 image files updated\n    1 files weren't updated due to errors\n"
        ));
        assert!(!write_succeeded("Nothing to do.\n"));
    }

    #[test]
    fn tag_names_are_validated() {
        assert!(is_valid_tag_name("Artist"));
        assert!(is_valid_tag_name("EXIF:DateTimeOriginal"));
        assert!(!is_valid_tag_name("-delete_original"));
        assert!(!is_valid_tag_name(""));
        assert!(!is_valid_tag_name("Artist=x"));
    }

    #[test]
    fn dash_prefixed_relative_path_is_escaped() {
        assert_eq!(file_arg(Path::new("-odd.jpg")), OsString::from("./-odd.jpg"));
        assert_eq!(file_arg(Path::new("/abs/-odd.jpg")), OsString::from("/abs/-odd.jpg"));
    }

    #[cfg(unix)]
    mod stub_program {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use std::time::Duration;
        use tempfile::TempDir;

        /// An executable answering `-ver` and running `body` for anything else
        fn stub(dir: &TempDir, body: &str) -> ExifTool {
            let program = dir.path().join("exiftool");
            let script = format!(
                "#!/bin/sh\nif [ \"$1\" = \"-ver\" ]; then echo 12.76; exit 0; fi\n{}\n",
                body
            );
            fs::write(&program, script).unwrap();
            fs::set_permissions(&program, fs::Permissions::from_mode(0o755)).unwrap();

            // Another test's fork may briefly hold the script open for writing
            for _ in 0..20 {
                if let Ok(tool) = ExifTool::with_program(&program) {
                    return tool;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            ExifTool::with_program(&program).unwrap()
        }

        fn photo(dir: &TempDir) -> PathBuf {
            let path = dir.path().join("a.jpg");
            fs::write(&path, b"jpeg bytes").unwrap();
            path
        }

        fn tags(pairs: &[(&str, &str)]) -> TagMap {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }

        #[test]
        fn reads_tags_from_json() {
            let dir = TempDir::new().unwrap();
            let tool = stub(
                &dir,
                r#"echo '[{"SourceFile": "a.jpg", "Make": "Canon", "ISO": 200}]'"#,
            );

            assert_eq!(tool.version(), "12.76");
            let read = tool.read_tags(&photo(&dir), &["Make", "ISO"]).unwrap();
            assert_eq!(read, tags(&[("ISO", "200"), ("Make", "Canon")]));
        }

        #[test]
        fn stderr_only_failure_is_metadata_unavailable() {
            let dir = TempDir::new().unwrap();
            let tool = stub(&dir, "echo 'Error: File not found - a.jpg' >&2\nexit 1");

            let err = tool.read_tags(&photo(&dir), &["Make"]).unwrap_err();
            match err {
                MetadataError::MetadataUnavailable { reason, .. } => {
                    assert!(reason.contains("File not found"), "{}", reason)
                }
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[test]
        fn non_zero_exit_on_write_leaves_file_alone() {
            let dir = TempDir::new().unwrap();
            let tool = stub(&dir, "echo \"Error: can't write\" >&2\nexit 1");
            let path = photo(&dir);

            let err = tool.write_tags(&path, &tags(&[("Artist", "Jane")])).unwrap_err();

            match err {
                MetadataError::WriteFailed { reason, .. } => {
                    assert!(reason.contains("can't write"), "{}", reason)
                }
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(fs::read(&path).unwrap(), b"jpeg bytes");
        }

        #[test]
        fn nothing_updated_is_a_write_failure() {
            let dir = TempDir::new().unwrap();
            let tool = stub(
                &dir,
                concat!(
                    "echo '    0 image files updated'\n",
                    "echo \"    1 files weren't updated due to errors\"",
                ),
            );

            let result = tool.write_tags(&photo(&dir), &tags(&[("Artist", "Jane")]));
            assert!(matches!(result, Err(MetadataError::WriteFailed { .. })));
        }

        #[test]
        fn write_passes_assignments_then_file() {
            let dir = TempDir::new().unwrap();
            let tool = stub(
                &dir,
                concat!(
                    "printf '%s\\n' \"$@\" > \"$(dirname \"$0\")/args\"\n",
                    "echo '    1 image files updated'",
                ),
            );
            let path = photo(&dir);

            tool.write_tags(&path, &tags(&[("Artist", "Jane Doe"), ("Rating", "5")]))
                .unwrap();

            let args = fs::read_to_string(dir.path().join("args")).unwrap();
            let expected = format!(
                "-overwrite_original\n-Artist=Jane Doe\n-Rating=5\n{}\n",
                path.display()
            );
            assert_eq!(args, expected);
        }

        #[test]
        fn invalid_tag_name_never_reaches_the_program() {
            let dir = TempDir::new().unwrap();
            let tool = stub(
                &dir,
                "touch \"$(dirname \"$0\")/ran\"\necho '    1 image files updated'",
            );

            let result = tool.write_tags(&photo(&dir), &tags(&[("-delete_original", "x")]));

            assert!(matches!(result, Err(MetadataError::WriteFailed { .. })));
            assert!(!dir.path().join("ran").exists());
        }
    }
}
