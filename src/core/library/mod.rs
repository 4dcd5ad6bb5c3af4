//! # Library Module
//!
//! The photo library on disk and its checksum index.
//!
//! The index (`library.db` at the library root) remembers the content
//! checksum of every imported file so the same photo is never imported
//! twice and silent changes to the library can be detected later.

mod index;
mod verify;

pub use index::{IndexEntry, LibraryIndex, INDEX_FILE};
pub use verify::{verify_library, VerifyReport};

use crate::core::checksum::file_checksum;
use crate::core::scanner::{MediaFilter, MediaScanner, WalkDirScanner};
use crate::error::PhotoManagerError;
use crate::events::{Event, EventSender, FileProgress, RunPhase, VerifyEvent};
use std::path::{Component, Path};
use tracing::{info, warn};

/// Library-relative key for `path`, with `/` separators.
///
/// Returns `None` when `path` is not inside `root`.
pub fn relative_key(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Checksums of every media file currently in the library.
///
/// Unreadable files are logged and returned separately.
pub fn checksum_library(
    root: &Path,
    events: &EventSender,
) -> Result<(Vec<IndexEntry>, Vec<String>), PhotoManagerError> {
    let scanner = WalkDirScanner::new(MediaFilter::all_media());
    let scan = scanner.scan_with_events(root, events)?;

    let total = scan.files.len();
    events.send(Event::Verify(VerifyEvent::Started { total_files: total }));

    let mut entries = Vec::with_capacity(total);
    let mut unreadable = Vec::new();

    for (i, file) in scan.files.iter().enumerate() {
        events.send(Event::Verify(VerifyEvent::Progress(FileProgress {
            completed: i + 1,
            total,
            current_path: file.path.clone(),
        })));

        let key = match relative_key(root, &file.path) {
            Some(key) => key,
            None => continue,
        };

        match file_checksum(&file.path) {
            Ok(checksum) => entries.push(IndexEntry::new(checksum, key)),
            Err(e) => {
                warn!(path = %file.path.display(), error = %e, "could not checksum library file");
                unreadable.push(key);
            }
        }
    }

    entries.sort();
    Ok((entries, unreadable))
}

/// Open the library's index, building it from disk when it does not exist yet.
pub fn open_or_build_index(
    root: &Path,
    events: &EventSender,
) -> Result<LibraryIndex, PhotoManagerError> {
    let existed = LibraryIndex::exists_in(root);
    let index = LibraryIndex::open_in(root)?;

    if !existed {
        events.phase(RunPhase::Indexing);
        info!(library = %root.display(), "calculating checksums for existing photos");

        let (entries, _unreadable) = checksum_library(root, events)?;
        index.replace_all(&entries)?;

        info!(files = entries.len(), "library index built");
    }

    Ok(index)
}

/// In-memory view of the library's index for runs that must not write.
///
/// Built from disk the same way `open_or_build_index` would when the
/// library has no index yet.
pub fn snapshot_index(
    root: &Path,
    events: &EventSender,
) -> Result<LibraryIndex, PhotoManagerError> {
    if LibraryIndex::exists_in(root) {
        return Ok(LibraryIndex::snapshot_of(root)?);
    }

    let index = LibraryIndex::in_memory()?;
    if root.is_dir() {
        let (entries, _unreadable) = checksum_library(root, events)?;
        index.replace_all(&entries)?;
    }
    Ok(index)
}
