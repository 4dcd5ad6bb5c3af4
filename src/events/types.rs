//! Event type definitions for progress reporting.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// All events emitted while managing the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// File discovery events
    Scan(ScanEvent),
    /// Import/organize events
    Organize(OrganizeEvent),
    /// Library verification events
    Verify(VerifyEvent),
    /// Run-level events
    Run(RunEvent),
}

/// Events during file discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// Scanning has started
    Started { paths: Vec<PathBuf> },
    /// Progress update during scanning
    Progress(ScanProgress),
    /// A candidate file was found
    FileFound { path: PathBuf },
    /// An error occurred but scanning continues
    Error { path: PathBuf, message: String },
    /// Scanning completed
    Completed { total_files: usize },
}

/// Progress information during scanning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    /// Number of directories scanned so far
    pub directories_scanned: usize,
    /// Number of candidate files found so far
    pub files_found: usize,
    /// Current directory being scanned
    pub current_path: PathBuf,
}

/// Events while planning and transferring files
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrganizeEvent {
    /// A phase over `total_files` files has started
    Started { total_files: usize },
    /// Progress update
    Progress(FileProgress),
    /// A file failed; the run continues
    FileFailed { path: PathBuf, message: String },
    /// All files handled
    Completed { summary: OrganizeSummary },
}

/// Events while verifying the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum VerifyEvent {
    /// Checksumming has started
    Started { total_files: usize },
    /// Progress update
    Progress(FileProgress),
    /// Verification completed
    Completed { changes: usize },
}

/// Per-file progress shared by the organize and verify phases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileProgress {
    /// Number of files handled so far
    pub completed: usize,
    /// Total number of files
    pub total: usize,
    /// File currently being handled
    pub current_path: PathBuf,
}

/// Run-level events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    /// Moving to a new phase
    PhaseChanged { phase: RunPhase },
    /// The run stopped early at the caller's request
    Cancelled,
}

/// Phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    Scanning,
    Indexing,
    Planning,
    Transferring,
    Verifying,
}

/// Summary of an organize run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizeSummary {
    pub moved: usize,
    pub unchanged: usize,
    pub duplicates: usize,
    pub failed: usize,
    pub duration_ms: u64,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Scanning => write!(f, "Scanning"),
            RunPhase::Indexing => write!(f, "Indexing library"),
            RunPhase::Planning => write!(f, "Reading metadata"),
            RunPhase::Transferring => write!(f, "Transferring"),
            RunPhase::Verifying => write!(f, "Verifying"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = Event::Organize(OrganizeEvent::Progress(FileProgress {
            completed: 10,
            total: 50,
            current_path: PathBuf::from("/photos/a.jpg"),
        }));

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: Event = serde_json::from_str(&json).unwrap();

        match deserialized {
            Event::Organize(OrganizeEvent::Progress(p)) => {
                assert_eq!(p.total, 50);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn phase_display_is_human_readable() {
        assert_eq!(RunPhase::Planning.to_string(), "Reading metadata");
    }
}
