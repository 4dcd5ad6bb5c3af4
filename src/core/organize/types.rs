//! Types for the organize module.

use crate::core::metadata::TagMap;
use crate::core::scanner::MediaFilter;
use crate::core::naming::FolderStructure;
use crate::events::OrganizeSummary;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Operation mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationMode {
    /// Copy files to destination (keep originals)
    #[default]
    Copy,
    /// Move files to destination
    Move,
}

/// Configuration for an organize run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeConfig {
    /// Directory to take files from
    pub source: PathBuf,
    /// Library root files are organized into
    pub library: PathBuf,
    /// Naming template (see `NamingTemplate`)
    pub template: String,
    pub operation: OperationMode,
    /// Plan only; touch nothing
    pub dry_run: bool,
    pub include_heic: bool,
    /// Write HEIC files into the library as JPEG
    pub convert_heic: bool,
    pub include_video: bool,
    /// Import files whose content is already in the library
    pub allow_duplicates: bool,
    /// Use the file's modification time when no date tag is present
    pub use_file_date: bool,
}

impl OrganizeConfig {
    /// Defaults for importing `source` into `library`
    pub fn new(source: impl Into<PathBuf>, library: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            library: library.into(),
            template: FolderStructure::default().template().to_string(),
            operation: OperationMode::Copy,
            dry_run: false,
            include_heic: false,
            convert_heic: false,
            include_video: false,
            allow_duplicates: false,
            use_file_date: false,
        }
    }

    /// Defaults for reorganizing a library in place
    pub fn in_place(library: impl Into<PathBuf>) -> Self {
        let library = library.into();
        Self {
            operation: OperationMode::Move,
            ..Self::new(library.clone(), library)
        }
    }

    /// Filter selecting the files this run considers
    pub fn media_filter(&self) -> MediaFilter {
        MediaFilter::new()
            .with_heic(self.include_heic || self.convert_heic)
            .with_video(self.include_video)
    }

    pub fn is_in_place(&self) -> bool {
        self.source == self.library
    }
}

/// Where in the per-file pipeline something happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovery,
    Checksum,
    Metadata,
    Planning,
    Transfer,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Discovery => "discovery",
            Stage::Checksum => "checksum",
            Stage::Metadata => "metadata",
            Stage::Planning => "planning",
            Stage::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

/// Per-file state machine.
///
/// `Discovered → MetadataRead → PathPlanned → Moved`; `Failed`,
/// `Unchanged` and `Duplicate` are terminal as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum FileState {
    Discovered,
    MetadataRead,
    PathPlanned,
    Moved,
    /// Already at its planned destination
    Unchanged,
    /// Content already in the library (or seen earlier in this run)
    Duplicate { of: String },
    Failed { stage: Stage, reason: String },
}

impl FileState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Moved
                | FileState::Unchanged
                | FileState::Duplicate { .. }
                | FileState::Failed { .. }
        )
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, FileState::Failed { .. })
    }
}

/// One file travelling through a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub tags: TagMap,
    pub checksum: Option<String>,
    pub destination: Option<PathBuf>,
    pub state: FileState,
}

impl PhotoRecord {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            path: path.into(),
            size_bytes,
            tags: TagMap::new(),
            checksum: None,
            destination: None,
            state: FileState::Discovered,
        }
    }

    /// Value of a tag, if the file carries it
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    pub fn metadata_read(&mut self, tags: TagMap) {
        self.tags = tags;
        self.state = FileState::MetadataRead;
    }

    pub fn planned(&mut self, destination: PathBuf) {
        self.destination = Some(destination);
        self.state = FileState::PathPlanned;
    }

    pub fn fail(&mut self, stage: Stage, reason: impl Into<String>) {
        self.state = FileState::Failed {
            stage,
            reason: reason.into(),
        };
    }

    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".to_string())
    }

    pub fn into_outcome(self) -> FileOutcome {
        FileOutcome {
            source: self.path,
            destination: self.destination,
            state: self.state,
        }
    }
}

/// A file the executor has to transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedFile {
    pub source: PathBuf,
    /// Absolute destination inside the library
    pub destination: PathBuf,
    /// Destination relative to the library root, `/`-separated
    pub relative: String,
    pub filename: String,
    pub date: Option<String>, // ISO date string
    pub size_bytes: u64,
    pub checksum: Option<String>,
    /// Destination name needed a numeric suffix
    pub has_conflict: bool,
    /// HEIC source written as JPEG
    pub convert: bool,
    /// Skip when the same content was already placed earlier in this run
    pub dedupe: bool,
}

/// Final result for one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub state: FileState,
}

impl FileOutcome {
    pub fn failed(source: &Path, stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: None,
            state: FileState::Failed {
                stage,
                reason: reason.into(),
            },
        }
    }
}

/// Summary of files by year
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YearSummary {
    pub year: i32,
    pub count: usize,
    pub size_bytes: u64,
}

/// The organization plan (preview)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizePlan {
    pub id: String,
    /// Files that need transferring
    pub files: Vec<PlannedFile>,
    /// Files already settled while planning (unchanged, duplicate, failed)
    pub settled: Vec<FileOutcome>,
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub date_range: Option<(String, String)>, // (earliest, latest)
    pub by_year: Vec<YearSummary>,
    pub no_date_count: usize,
    pub conflict_count: usize,
    /// Planning stopped early
    pub cancelled: bool,
}

/// Result of an organize run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizeReport {
    pub plan_id: String,
    pub dry_run: bool,
    /// Every file's outcome, sorted by source path
    pub outcomes: Vec<FileOutcome>,
    pub folders_created: usize,
    pub total_size_bytes: u64,
    pub duration_ms: u64,
    pub cancelled: bool,
    /// Library-relative paths that were transferred but could not be
    /// recorded in the index; `verify --update` picks them up
    #[serde(default)]
    pub unindexed: Vec<String>,
}

impl OrganizeReport {
    fn count(&self, pred: impl Fn(&FileState) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.state)).count()
    }

    pub fn moved(&self) -> usize {
        self.count(|s| matches!(s, FileState::Moved))
    }

    /// Files a dry run would transfer
    pub fn planned(&self) -> usize {
        self.count(|s| matches!(s, FileState::PathPlanned))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|s| matches!(s, FileState::Unchanged))
    }

    pub fn duplicates(&self) -> usize {
        self.count(|s| matches!(s, FileState::Duplicate { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(FileState::is_failed)
    }

    /// Any file failed, or the index fell behind the disk
    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || !self.unindexed.is_empty()
    }

    /// (source, destination) of every transfer, planned or performed
    pub fn transfers(&self) -> Vec<(PathBuf, PathBuf)> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.state, FileState::Moved | FileState::PathPlanned))
            .filter_map(|o| {
                o.destination
                    .as_ref()
                    .map(|d| (o.source.clone(), d.clone()))
            })
            .collect()
    }

    pub fn summary(&self) -> OrganizeSummary {
        OrganizeSummary {
            moved: self.moved() + self.planned(),
            unchanged: self.unchanged(),
            duplicates: self.duplicates(),
            failed: self.failed(),
            duration_ms: self.duration_ms,
        }
    }
}
