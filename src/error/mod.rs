//! # Error Module
//!
//! Error types for the photo library manager.
//!
//! ## Design Principles
//! - **Per-file errors are recoverable** - they end up in the run report, the batch continues
//! - **Include context** - paths, tool names, what went wrong
//! - **Fatal errors are few** - a missing tool or an unusable library stops the run

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum PhotoManagerError {
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Organize error: {0}")]
    Organize(#[from] OrganizeError),

    #[error("Library index error: {0}")]
    Index(#[from] IndexError),

    #[error("Naming template error: {0}")]
    Template(#[from] TemplateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Errors raised while talking to the external metadata tool
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Unable to find {tool}. Install it and make sure it is on your PATH.")]
    ToolMissing { tool: String },

    #[error("Metadata unavailable for {path}: {reason}")]
    MetadataUnavailable { path: PathBuf, reason: String },

    #[error("Failed to write metadata to {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },
}

/// Errors raised while organizing a single file or a whole run
#[derive(Error, Debug)]
pub enum OrganizeError {
    #[error("Directory not found: {path}")]
    DirectoryNotFound { path: PathBuf },

    #[error("No free name for {path}: every candidate is taken")]
    PathCollision { path: PathBuf },

    #[error("Source file not found: {path}")]
    SourceNotFound { path: PathBuf },

    #[error("Failed to transfer {source_path} to {destination}: {source}")]
    Transfer {
        source_path: PathBuf,
        destination: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to convert {path}: {reason}")]
    ConversionFailed { path: PathBuf, reason: String },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the library checksum index
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Failed to open library index at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Library index query failed: {0}")]
    QueryFailed(String),

    #[error("Library index at {path} is locked or corrupted. Delete it to rebuild from disk.")]
    Corrupted { path: PathBuf },
}

/// Errors from parsing a naming template
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Naming template is empty")]
    Empty,

    #[error("Unknown token {{{token}}} in naming template (known: {known})")]
    UnknownToken { token: String, known: String },

    #[error("Unbalanced braces in naming template: {template}")]
    Unbalanced { template: String },

    #[error("Naming template may not contain '..' or absolute segments: {template}")]
    EscapesLibrary { template: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, PhotoManagerError>;

impl PhotoManagerError {
    /// Whether this error means a required external tool is not installed
    pub fn is_tool_missing(&self) -> bool {
        matches!(
            self,
            PhotoManagerError::Metadata(MetadataError::ToolMissing { .. })
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_missing_names_the_tool() {
        let error = MetadataError::ToolMissing {
            tool: "exiftool".to_string(),
        };
        assert!(error.to_string().contains("exiftool"));
        assert!(PhotoManagerError::from(error).is_tool_missing());
    }

    #[test]
    fn unavailable_includes_path_and_reason() {
        let error = MetadataError::MetadataUnavailable {
            path: PathBuf::from("/photos/broken.jpg"),
            reason: "File format error".to_string(),
        };
        let message = error.to_string();
        assert!(message.contains("/photos/broken.jpg"));
        assert!(message.contains("File format error"));
    }

    #[test]
    fn unknown_token_lists_the_token() {
        let error = TemplateError::UnknownToken {
            token: "lens".to_string(),
            known: "year, month".to_string(),
        };
        assert!(error.to_string().contains("{lens}"));
    }

    #[test]
    fn corrupted_index_suggests_recovery() {
        let error = IndexError::Corrupted {
            path: PathBuf::from("/library/library.db"),
        };
        assert!(error.to_string().contains("Delete it"));
    }

    #[test]
    fn collision_is_not_tool_missing() {
        let error = PhotoManagerError::from(OrganizeError::PathCollision {
            path: PathBuf::from("/library/2024/a.jpg"),
        });
        assert!(!error.is_tool_missing());
    }
}
