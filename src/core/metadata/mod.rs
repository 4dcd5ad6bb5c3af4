//! # Metadata Module
//!
//! Reads and writes embedded photo metadata through a narrow accessor trait.
//!
//! ## Accessors
//! - `ExifTool` - shells out to the `exiftool` binary (production)
//! - `InMemoryMetadata` - a tag table keyed by path (tests, dry experiments)
//!
//! ## Interpreted Fields
//! - Capture date (DateTimeOriginal, then CreateDate, then ModifyDate)
//! - Camera make and model

mod date;
mod exiftool;

pub use date::parse_exif_datetime;
pub use exiftool::ExifTool;

use crate::error::MetadataError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Tag name to tag value, as reported by the metadata tool
pub type TagMap = BTreeMap<String, String>;

/// Date tags in order of preference
pub const DATE_TAGS: &[&str] = &["DateTimeOriginal", "CreateDate", "ModifyDate"];

/// Every tag the organizer asks for
pub const ORGANIZE_TAGS: &[&str] = &[
    "DateTimeOriginal",
    "CreateDate",
    "ModifyDate",
    "Make",
    "Model",
];

/// Access to the metadata embedded in a file.
///
/// Implement this trait to swap the metadata backend (e.g., for testing).
pub trait MetadataAccessor: Send + Sync {
    /// Read the requested tags from `path`.
    ///
    /// Tags the file does not carry are simply absent from the map.
    fn read_tags(&self, path: &Path, tags: &[&str]) -> Result<TagMap, MetadataError>;

    /// Write tags into `path`. On failure the file is left unmodified.
    fn write_tags(&self, path: &Path, tags: &TagMap) -> Result<(), MetadataError>;
}

/// Fields the organizer interprets from raw tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    /// Capture date/time as recorded by the camera (local wall-clock)
    pub date_taken: Option<NaiveDateTime>,
    /// Camera make (e.g., "Apple", "Canon")
    pub camera_make: Option<String>,
    /// Camera model (e.g., "iPhone 15 Pro")
    pub camera_model: Option<String>,
}

impl PhotoMetadata {
    /// Interpret a raw tag map
    pub fn from_tags(tags: &TagMap) -> Self {
        let date_taken = DATE_TAGS
            .iter()
            .filter_map(|tag| tags.get(*tag))
            .find_map(|value| parse_exif_datetime(value));

        Self {
            date_taken,
            camera_make: non_empty(tags.get("Make")),
            camera_model: non_empty(tags.get("Model")),
        }
    }

    /// Check if any metadata was extracted
    pub fn has_data(&self) -> bool {
        self.date_taken.is_some() || self.camera_make.is_some() || self.camera_model.is_some()
    }

    /// Get a display string for the camera
    pub fn camera_display(&self) -> Option<String> {
        match (&self.camera_make, &self.camera_model) {
            (Some(make), Some(model)) => {
                // "Apple" + "Apple iPhone 15" should not read "Apple Apple iPhone 15"
                if model.starts_with(make.as_str()) {
                    Some(model.clone())
                } else {
                    Some(format!("{} {}", make, model))
                }
            }
            (None, Some(model)) => Some(model.clone()),
            (Some(make), None) => Some(make.clone()),
            (None, None) => None,
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| v.trim_end_matches('\0').trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Metadata accessor backed by an in-memory table.
///
/// Paths that were never registered behave like unreadable files.
#[derive(Default)]
pub struct InMemoryMetadata {
    files: Mutex<HashMap<PathBuf, TagMap>>,
}

impl InMemoryMetadata {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the tags for a path
    pub fn insert(&self, path: impl Into<PathBuf>, tags: TagMap) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), tags);
        }
    }

    /// Builder-style variant of `insert`
    pub fn with_file<I, K, V>(self, path: impl Into<PathBuf>, tags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let tags = tags.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.insert(path, tags);
        self
    }

    /// Current tags for a path
    pub fn tags_for(&self, path: &Path) -> Option<TagMap> {
        self.files.lock().ok()?.get(path).cloned()
    }
}

impl MetadataAccessor for InMemoryMetadata {
    fn read_tags(&self, path: &Path, tags: &[&str]) -> Result<TagMap, MetadataError> {
        let files = self.files.lock().map_err(|_| MetadataError::MetadataUnavailable {
            path: path.to_path_buf(),
            reason: "metadata table poisoned".to_string(),
        })?;

        let stored = files
            .get(path)
            .ok_or_else(|| MetadataError::MetadataUnavailable {
                path: path.to_path_buf(),
                reason: "no metadata registered".to_string(),
            })?;

        Ok(stored
            .iter()
            .filter(|(name, _)| tags.contains(&name.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn write_tags(&self, path: &Path, tags: &TagMap) -> Result<(), MetadataError> {
        let mut files = self.files.lock().map_err(|_| MetadataError::WriteFailed {
            path: path.to_path_buf(),
            reason: "metadata table poisoned".to_string(),
        })?;

        let stored = files.get_mut(path).ok_or_else(|| MetadataError::WriteFailed {
            path: path.to_path_buf(),
            reason: "no metadata registered".to_string(),
        })?;

        stored.extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn tags(pairs: &[(&str, &str)]) -> TagMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn metadata_default_has_no_data() {
        let meta = PhotoMetadata::default();
        assert!(!meta.has_data());
    }

    #[test]
    fn date_prefers_date_time_original() {
        let meta = PhotoMetadata::from_tags(&tags(&[
            ("ModifyDate", "2023:05:01 10:00:00"),
            ("DateTimeOriginal", "2021:02:03 04:05:06"),
        ]));
        let expected = NaiveDate::from_ymd_opt(2021, 2, 3)
            .unwrap()
            .and_hms_opt(4, 5, 6)
            .unwrap();
        assert_eq!(meta.date_taken, Some(expected));
    }

    #[test]
    fn unparseable_date_falls_through_to_next_tag() {
        let meta = PhotoMetadata::from_tags(&tags(&[
            ("DateTimeOriginal", "0000:00:00 00:00:00"),
            ("CreateDate", "2022:12:31 23:59:59"),
        ]));
        assert_eq!(
            meta.date_taken.map(|d| d.date()),
            NaiveDate::from_ymd_opt(2022, 12, 31)
        );
    }

    #[test]
    fn blank_make_is_ignored() {
        let meta = PhotoMetadata::from_tags(&tags(&[("Make", "  "), ("Model", "X100V")]));
        assert_eq!(meta.camera_make, None);
        assert_eq!(meta.camera_display(), Some("X100V".to_string()));
    }

    #[test]
    fn camera_display_combines_make_model() {
        let meta = PhotoMetadata {
            camera_make: Some("Canon".to_string()),
            camera_model: Some("EOS R5".to_string()),
            ..Default::default()
        };
        assert_eq!(meta.camera_display(), Some("Canon EOS R5".to_string()));
    }

    #[test]
    fn camera_display_avoids_duplication() {
        let meta = PhotoMetadata {
            camera_make: Some("Apple".to_string()),
            camera_model: Some("Apple iPhone 15 Pro".to_string()),
            ..Default::default()
        };
        assert_eq!(
            meta.camera_display(),
            Some("Apple iPhone 15 Pro".to_string())
        );
    }

    #[test]
    fn in_memory_reads_only_requested_tags() {
        let accessor = InMemoryMetadata::new().with_file(
            "/a.jpg",
            [("Make", "Canon"), ("Artist", "someone")],
        );
        let read = accessor.read_tags(Path::new("/a.jpg"), ORGANIZE_TAGS).unwrap();
        assert_eq!(read.get("Make").map(String::as_str), Some("Canon"));
        assert!(!read.contains_key("Artist"));
    }

    #[test]
    fn in_memory_unknown_path_is_unavailable() {
        let accessor = InMemoryMetadata::new();
        let result = accessor.read_tags(Path::new("/missing.jpg"), ORGANIZE_TAGS);
        assert!(matches!(
            result,
            Err(MetadataError::MetadataUnavailable { .. })
        ));
    }

    #[test]
    fn in_memory_write_updates_tags() {
        let accessor = InMemoryMetadata::new().with_file("/a.jpg", [("Make", "Canon")]);
        accessor
            .write_tags(Path::new("/a.jpg"), &tags(&[("Model", "EOS R5")]))
            .unwrap();
        let stored = accessor.tags_for(Path::new("/a.jpg")).unwrap();
        assert_eq!(stored.get("Model").map(String::as_str), Some("EOS R5"));
        assert_eq!(stored.get("Make").map(String::as_str), Some("Canon"));
    }
}
