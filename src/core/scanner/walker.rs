//! Directory walking implementation using walkdir.

use super::filter::{is_hidden, MediaFilter};
use super::{MediaFile, MediaScanner, ScanResult};
use crate::error::OrganizeError;
use crate::events::{null_sender, Event, EventSender, ScanEvent, ScanProgress};
use std::fs;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Scanner implementation using the walkdir crate.
///
/// Symbolic links are not followed.
pub struct WalkDirScanner {
    filter: MediaFilter,
}

impl WalkDirScanner {
    /// Create a scanner selecting files with `filter`
    pub fn new(filter: MediaFilter) -> Self {
        Self { filter }
    }

    fn walk(&self, root: &Path, events: &EventSender) -> Result<ScanResult, OrganizeError> {
        if !root.is_dir() {
            return Err(OrganizeError::DirectoryNotFound {
                path: root.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        let mut errors = Vec::new();
        let mut directories_scanned = 0;

        let include_hidden = self.filter.includes_hidden();
        let entries = WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| include_hidden || e.depth() == 0 || !is_hidden(e.path()));

        for entry_result in entries {
            let entry = match entry_result {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    let source = e
                        .into_io_error()
                        .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
                    warn!(path = %path.display(), error = %source, "skipping unreadable entry");
                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.clone(),
                        message: source.to_string(),
                    }));
                    errors.push(OrganizeError::Read { path, source });
                    continue;
                }
            };

            let path = entry.path();

            if entry.file_type().is_dir() {
                directories_scanned += 1;
                events.send(Event::Scan(ScanEvent::Progress(ScanProgress {
                    directories_scanned,
                    files_found: files.len(),
                    current_path: path.to_path_buf(),
                })));
                continue;
            }

            if !self.filter.should_include(path) {
                continue;
            }

            match fs::metadata(path) {
                Ok(metadata) if metadata.is_file() => {
                    events.send(Event::Scan(ScanEvent::FileFound {
                        path: path.to_path_buf(),
                    }));
                    files.push(MediaFile {
                        path: path.to_path_buf(),
                        size: metadata.len(),
                        modified: metadata
                            .modified()
                            .unwrap_or(std::time::SystemTime::UNIX_EPOCH),
                        format: self.filter.get_format(path),
                    });
                }
                Ok(_) => {}
                Err(source) => {
                    events.send(Event::Scan(ScanEvent::Error {
                        path: path.to_path_buf(),
                        message: source.to_string(),
                    }));
                    errors.push(OrganizeError::Read {
                        path: path.to_path_buf(),
                        source,
                    });
                }
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));

        Ok(ScanResult { files, errors })
    }
}

impl MediaScanner for WalkDirScanner {
    fn scan(&self, root: &Path) -> Result<ScanResult, OrganizeError> {
        self.scan_with_events(root, &null_sender())
    }

    fn scan_with_events(
        &self,
        root: &Path,
        events: &EventSender,
    ) -> Result<ScanResult, OrganizeError> {
        events.send(Event::Scan(ScanEvent::Started {
            paths: vec![root.to_path_buf()],
        }));

        let result = self.walk(root, events)?;

        events.send(Event::Scan(ScanEvent::Completed {
            total_files: result.files.len(),
        }));

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_photo(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(&[0xFF, 0xD8, 0xFF, 0xE0]).unwrap();
        path
    }

    fn scanner(filter: MediaFilter) -> WalkDirScanner {
        WalkDirScanner::new(filter)
    }

    #[test]
    fn scan_empty_directory_returns_empty_vec() {
        let temp_dir = TempDir::new().unwrap();
        let result = scanner(MediaFilter::new()).scan(temp_dir.path()).unwrap();

        assert!(result.files.is_empty());
        assert!(result.errors.is_empty());
    }

    #[test]
    fn scan_traverses_nested_directories_in_sorted_order() {
        let temp_dir = TempDir::new().unwrap();
        let subdir = temp_dir.path().join("b");
        fs::create_dir(&subdir).unwrap();

        create_test_photo(&subdir, "nested.jpg");
        create_test_photo(temp_dir.path(), "c.jpg");
        create_test_photo(temp_dir.path(), "a.jpg");

        let result = scanner(MediaFilter::new()).scan(temp_dir.path()).unwrap();

        let names: Vec<_> = result
            .files
            .iter()
            .map(|f| f.path.strip_prefix(temp_dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.jpg"),
                PathBuf::from("b/nested.jpg"),
                PathBuf::from("c.jpg"),
            ]
        );
    }

    #[test]
    fn scan_respects_extension_filter() {
        let temp_dir = TempDir::new().unwrap();
        create_test_photo(temp_dir.path(), "photo.jpg");
        create_test_photo(temp_dir.path(), "photo.heic");
        create_test_photo(temp_dir.path(), "clip.mov");
        File::create(temp_dir.path().join("notes.txt")).unwrap();

        let jpeg_only = scanner(MediaFilter::new()).scan(temp_dir.path()).unwrap();
        assert_eq!(jpeg_only.files.len(), 1);

        let everything = scanner(MediaFilter::all_media()).scan(temp_dir.path()).unwrap();
        assert_eq!(everything.files.len(), 3);
    }

    #[test]
    fn scan_skips_hidden_directories() {
        let temp_dir = TempDir::new().unwrap();
        let hidden = temp_dir.path().join(".thumbnails");
        fs::create_dir(&hidden).unwrap();
        create_test_photo(&hidden, "thumb.jpg");
        create_test_photo(temp_dir.path(), "visible.jpg");
        create_test_photo(temp_dir.path(), ".hidden.jpg");

        let result = scanner(MediaFilter::new()).scan(temp_dir.path()).unwrap();

        assert_eq!(result.files.len(), 1);
        assert!(result.files[0].path.ends_with("visible.jpg"));
    }

    #[test]
    fn scan_can_include_hidden_files() {
        let temp_dir = TempDir::new().unwrap();
        create_test_photo(temp_dir.path(), "visible.jpg");
        create_test_photo(temp_dir.path(), ".hidden.jpg");

        let result = scanner(MediaFilter::new().with_hidden(true))
            .scan(temp_dir.path())
            .unwrap();

        assert_eq!(result.files.len(), 2);
    }

    #[test]
    fn scan_nonexistent_directory_is_an_error() {
        let result = scanner(MediaFilter::new()).scan(Path::new("/nonexistent/path/12345"));
        assert!(matches!(
            result,
            Err(OrganizeError::DirectoryNotFound { .. })
        ));
    }
}
