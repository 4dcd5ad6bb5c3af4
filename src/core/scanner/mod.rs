//! # Scanner Module
//!
//! Discovers candidate media files under a directory tree.
//!
//! ## Supported Formats
//! - JPEG (.jpg, .jpeg) - always
//! - HEIC (.heic, .heif) - opt-in
//! - Video (.mov, .mp4, .avi) - opt-in
//!
//! Results are sorted by path so every run visits files in the same order.

mod filter;
mod walker;

pub use filter::MediaFilter;
pub use walker::WalkDirScanner;

use crate::error::OrganizeError;
use crate::events::EventSender;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// A discovered media file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFile {
    /// Path to the file
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
    /// Last modified time
    pub modified: SystemTime,
    /// Format detected from the extension
    pub format: MediaFormat,
}

/// Formats the library manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaFormat {
    Jpeg,
    Heic,
    Mov,
    Mp4,
    Avi,
    Unknown,
}

impl MediaFormat {
    /// Detect format from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => MediaFormat::Jpeg,
            "heic" | "heif" => MediaFormat::Heic,
            "mov" => MediaFormat::Mov,
            "mp4" => MediaFormat::Mp4,
            "avi" => MediaFormat::Avi,
            _ => MediaFormat::Unknown,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, MediaFormat::Mov | MediaFormat::Mp4 | MediaFormat::Avi)
    }
}

/// Result of a scan operation
#[derive(Debug)]
pub struct ScanResult {
    /// Discovered files, sorted by path
    pub files: Vec<MediaFile>,
    /// Errors that occurred during scanning (non-fatal)
    pub errors: Vec<OrganizeError>,
}

/// Trait for media scanners
///
/// Implement this trait to create custom scanners (e.g., for testing).
pub trait MediaScanner: Send + Sync {
    /// Scan a directory tree
    fn scan(&self, root: &std::path::Path) -> Result<ScanResult, OrganizeError>;

    /// Scan with progress reporting via events
    fn scan_with_events(
        &self,
        root: &std::path::Path,
        events: &EventSender,
    ) -> Result<ScanResult, OrganizeError>;
}
