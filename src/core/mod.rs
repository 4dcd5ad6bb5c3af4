//! # Core Module
//!
//! The UI-agnostic photo library engine.
//!
//! ## Modules
//! - `tools` - Locates and runs external programs
//! - `metadata` - Reads and writes embedded tags (via exiftool)
//! - `naming` - Plans library paths from metadata and a naming template
//! - `scanner` - Discovers candidate media files
//! - `checksum` - Content checksums for duplicate detection
//! - `library` - The library's checksum index and verification
//! - `convert` - HEIC to JPEG conversion (via ImageMagick)
//! - `organize` - Imports and in-place reorganization

pub mod checksum;
pub mod convert;
pub mod library;
pub mod metadata;
pub mod naming;
pub mod organize;
pub mod scanner;
pub mod tools;

// Re-export commonly used types
pub use library::{LibraryIndex, VerifyReport};
pub use metadata::{ExifTool, MetadataAccessor, PhotoMetadata, TagMap};
pub use naming::{FolderStructure, NamingTemplate};
pub use organize::{OperationMode, OrganizeConfig, OrganizeReport, Organizer};
pub use scanner::MediaFile;
