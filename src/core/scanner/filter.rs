//! File filtering logic for the scanner.

use super::MediaFormat;
use std::collections::HashSet;
use std::path::Path;

const PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg"];
const HEIC_EXTENSIONS: &[&str] = &["heic", "heif"];
const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "avi"];

/// Filters files down to the media the library manages
#[derive(Debug, Clone)]
pub struct MediaFilter {
    /// File extensions to include (lower-case, no dot)
    extensions: HashSet<String>,
    /// Whether to include hidden files
    include_hidden: bool,
}

impl MediaFilter {
    /// JPEG only
    pub fn new() -> Self {
        Self {
            extensions: PHOTO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            include_hidden: false,
        }
    }

    /// Every kind of file a library may hold
    pub fn all_media() -> Self {
        Self::new().with_heic(true).with_video(true)
    }

    /// Also accept HEIC/HEIF photos
    pub fn with_heic(self, include: bool) -> Self {
        self.with_group(HEIC_EXTENSIONS, include)
    }

    /// Also accept videos
    pub fn with_video(self, include: bool) -> Self {
        self.with_group(VIDEO_EXTENSIONS, include)
    }

    fn with_group(mut self, group: &[&str], include: bool) -> Self {
        if include {
            self.extensions.extend(group.iter().map(|e| e.to_string()));
        }
        self
    }

    /// Include hidden files (starting with .)
    pub fn with_hidden(mut self, include: bool) -> Self {
        self.include_hidden = include;
        self
    }

    /// Override the list of extensions to accept
    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions.into_iter().map(|e| e.to_lowercase()).collect();
        self
    }

    pub fn includes_hidden(&self) -> bool {
        self.include_hidden
    }

    /// Check if a file should be included
    pub fn should_include(&self, path: &Path) -> bool {
        if !self.include_hidden && is_hidden(path) {
            return false;
        }

        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.contains(&ext.to_lowercase()))
            .unwrap_or(false)
    }

    /// Get the media format for a path
    pub fn get_format(&self, path: &Path) -> MediaFormat {
        path.extension()
            .and_then(|e| e.to_str())
            .map(MediaFormat::from_extension)
            .unwrap_or(MediaFormat::Unknown)
    }
}

impl Default for MediaFilter {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(false)
}
