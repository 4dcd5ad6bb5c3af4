//! Comparing the library on disk against its index.

use super::{checksum_library, IndexEntry, LibraryIndex};
use crate::error::PhotoManagerError;
use crate::events::{Event, EventSender, RunPhase, VerifyEvent};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::info;

/// Differences between the index and the files on disk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    /// Number of library files checksummed
    pub files_checked: usize,
    /// Indexed paths whose content no longer matches
    pub checksum_changed: Vec<String>,
    /// Indexed paths that are gone from disk
    pub missing_from_disk: Vec<String>,
    /// Files on disk the index does not know about
    pub untracked: Vec<String>,
    /// Files that could not be read
    pub unreadable: Vec<String>,
    /// Whether the index was rebuilt from disk afterwards
    pub index_updated: bool,
}

impl VerifyReport {
    pub fn has_changes(&self) -> bool {
        self.change_count() > 0
    }

    pub fn change_count(&self) -> usize {
        self.checksum_changed.len()
            + self.missing_from_disk.len()
            + self.untracked.len()
            + self.unreadable.len()
    }

    /// Compare indexed entries with freshly computed ones
    pub fn compare(indexed: &[IndexEntry], on_disk: &[IndexEntry]) -> Self {
        let indexed = by_path(indexed);
        let on_disk = by_path(on_disk);

        let mut report = VerifyReport {
            files_checked: on_disk.len(),
            ..Default::default()
        };

        for (path, known) in &indexed {
            match on_disk.get(path) {
                Some(current) if known.is_disjoint(current) => {
                    report.checksum_changed.push(path.to_string())
                }
                Some(_) => {}
                None => report.missing_from_disk.push(path.to_string()),
            }
        }

        report.untracked = on_disk
            .keys()
            .filter(|path| !indexed.contains_key(*path))
            .map(|path| path.to_string())
            .collect();

        report
    }
}

fn by_path(entries: &[IndexEntry]) -> BTreeMap<&str, BTreeSet<&str>> {
    let mut map: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for entry in entries {
        map.entry(entry.path.as_str())
            .or_default()
            .insert(entry.checksum.as_str());
    }
    map
}

/// Entries for an index rebuilt from disk.
///
/// Other checksums recorded for a path are kept while one of them still
/// matches the file, as with the source checksum of a converted photo.
/// Everything recorded for an unreadable file is kept.
fn rebuilt_entries(
    indexed: &[IndexEntry],
    on_disk: &[IndexEntry],
    unreadable: &[String],
) -> Vec<IndexEntry> {
    let known = by_path(indexed);
    let current = by_path(on_disk);

    let still_valid = |path: &str| {
        unreadable.iter().any(|p| p == path)
            || matches!(
                (known.get(path), current.get(path)),
                (Some(before), Some(now)) if !before.is_disjoint(now)
            )
    };

    let mut entries: BTreeSet<IndexEntry> = on_disk.iter().cloned().collect();
    entries.extend(
        indexed
            .iter()
            .filter(|entry| still_valid(&entry.path))
            .cloned(),
    );
    entries.into_iter().collect()
}

/// Recalculate checksums of everything in the library and report changes.
///
/// With `update`, the index is rebuilt from disk afterwards.
pub fn verify_library(
    root: &Path,
    index: &LibraryIndex,
    update: bool,
    events: &EventSender,
) -> Result<VerifyReport, PhotoManagerError> {
    events.phase(RunPhase::Verifying);

    let indexed = index.entries()?;
    let (on_disk, unreadable) = checksum_library(root, events)?;

    let mut report = VerifyReport::compare(&indexed, &on_disk);
    report.files_checked += unreadable.len();
    report.unreadable = unreadable;

    // An unreadable file is not "untracked" or "missing"; it is reported on its own
    report
        .missing_from_disk
        .retain(|p| !report.unreadable.contains(p));

    if update && report.has_changes() {
        let entries = rebuilt_entries(&indexed, &on_disk, &report.unreadable);
        index.replace_all(&entries)?;
        report.index_updated = true;
        info!(entries = entries.len(), "library index rebuilt from disk");
    }

    events.send(Event::Verify(VerifyEvent::Completed {
        changes: report.change_count(),
    }));

    Ok(report)
}
