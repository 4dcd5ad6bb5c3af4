//! Shared helpers for integration tests.

#![allow(dead_code)]

use photo_management::core::metadata::{MetadataAccessor, TagMap};
use photo_management::error::MetadataError;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Metadata keyed by file content, so tags follow a file wherever it moves
/// (the way embedded EXIF does).
#[derive(Default)]
pub struct EmbeddedTags {
    by_content: HashMap<Vec<u8>, TagMap>,
}

impl EmbeddedTags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, content: &[u8], tags: &[(&str, &str)]) -> Self {
        let tags = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.by_content.insert(content.to_vec(), tags);
        self
    }

    /// A photo with a DateTimeOriginal tag
    pub fn photo(self, content: &[u8], date: &str) -> Self {
        self.with_tags(content, &[("DateTimeOriginal", date)])
    }

    /// A readable file with no date tags
    pub fn undated(self, content: &[u8]) -> Self {
        self.with_tags(content, &[])
    }
}

impl MetadataAccessor for EmbeddedTags {
    fn read_tags(&self, path: &Path, tags: &[&str]) -> Result<TagMap, MetadataError> {
        let unavailable = |reason: String| MetadataError::MetadataUnavailable {
            path: path.to_path_buf(),
            reason,
        };

        let content = fs::read(path).map_err(|e| unavailable(e.to_string()))?;
        let stored = self
            .by_content
            .get(&content)
            .ok_or_else(|| unavailable("File format error".to_string()))?;

        Ok(stored
            .iter()
            .filter(|(name, _)| tags.contains(&name.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_tags(&self, path: &Path, _tags: &TagMap) -> Result<(), MetadataError> {
        Err(MetadataError::WriteFailed {
            path: path.to_path_buf(),
            reason: "read-only".to_string(),
        })
    }
}

/// Every regular file under `root`, relative and `/`-separated, sorted
pub fn files_under(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(root)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

/// Media files only (skips the index database and its journals)
pub fn photos_under(root: &Path) -> Vec<String> {
    files_under(root)
        .into_iter()
        .filter(|f| !f.starts_with("library.db"))
        .collect()
}
