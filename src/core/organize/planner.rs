//! Plan generator for organize runs.

use super::types::*;
use crate::core::checksum::file_checksum;
use crate::core::library::{relative_key, LibraryIndex};
use crate::core::metadata::{MetadataAccessor, PhotoMetadata, ORGANIZE_TAGS};
use crate::core::naming::{
    is_heic_extension, plan_relative_path, target_extension, NamingTemplate,
};
use crate::core::scanner::MediaFile;
use crate::error::OrganizeError;
use crate::events::{Event, EventSender, FileProgress, OrganizeEvent};
use chrono::{DateTime, Datelike, Local, NaiveDate};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

/// Highest numeric suffix tried before a name counts as exhausted
pub const MAX_SUFFIX: usize = 9999;

/// Generates organize plans.
///
/// Files are visited in the order given (the scanner sorts by path), so
/// the same inputs always claim the same destinations. A file that already
/// sits at its base name or one of its numbered alternatives keeps that
/// name, which makes a second run over an organized library a no-op.
pub struct OrganizePlanner<'a> {
    config: &'a OrganizeConfig,
    template: &'a NamingTemplate,
    accessor: &'a dyn MetadataAccessor,
    index: &'a LibraryIndex,
}

/// A file whose metadata has been read and whose base name is known
struct Candidate<'f> {
    file: &'f MediaFile,
    record: PhotoRecord,
    checksum: String,
    base: PathBuf,
    date: Option<NaiveDate>,
    convert: bool,
    /// Content may be skipped when already placed elsewhere
    dedupe: bool,
}

impl Candidate<'_> {
    fn stays(&self) -> bool {
        is_numbered_variant(&self.base, &self.file.path)
    }
}

impl<'a> OrganizePlanner<'a> {
    pub fn new(
        config: &'a OrganizeConfig,
        template: &'a NamingTemplate,
        accessor: &'a dyn MetadataAccessor,
        index: &'a LibraryIndex,
    ) -> Self {
        Self {
            config,
            template,
            accessor,
            index,
        }
    }

    /// Create an organize plan for `files`.
    ///
    /// Per-file problems end up in `settled` as failures; they never stop
    /// the plan. Planning stops early when `cancel` is raised.
    pub fn create_plan(
        &self,
        files: &[MediaFile],
        cancel: &AtomicBool,
        events: &EventSender,
    ) -> OrganizePlan {
        let total = files.len();
        events.send(Event::Organize(OrganizeEvent::Started { total_files: total }));

        let mut settled = Vec::new();
        let mut candidates = Vec::new();
        let mut cancelled = false;

        for (i, file) in files.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }

            events.send(Event::Organize(OrganizeEvent::Progress(FileProgress {
                completed: i + 1,
                total,
                current_path: file.path.clone(),
            })));

            match self.inspect(file) {
                Ok(candidate) => candidates.push(candidate),
                Err(record) => settle(record, &mut settled, events),
            }
        }

        // Files already at one of their names keep them
        let mut claimed: HashSet<PathBuf> = HashSet::new();
        let mut kept: HashMap<String, String> = HashMap::new();
        let mut moving = Vec::new();

        for mut candidate in candidates {
            if !candidate.stays() {
                moving.push(candidate);
                continue;
            }

            let path = candidate.file.path.clone();
            let relative = relative_key(&self.config.library, &path).unwrap_or_default();
            match kept.get(&candidate.checksum) {
                Some(of) if candidate.dedupe => {
                    candidate.record.state = FileState::Duplicate { of: of.clone() };
                }
                _ => {
                    kept.entry(candidate.checksum.clone()).or_insert(relative);
                    claimed.insert(path.clone());
                    candidate.record.destination = Some(path);
                    candidate.record.state = FileState::Unchanged;
                }
            }
            settled.push(candidate.record.into_outcome());
        }

        // Content already kept in place is not moved again
        let mut movers = Vec::new();
        for mut candidate in moving {
            match kept.get(&candidate.checksum) {
                Some(of) if candidate.dedupe => {
                    debug!(path = %candidate.file.path.display(), of = %of, "duplicate skipped");
                    candidate.record.state = FileState::Duplicate { of: of.clone() };
                    settled.push(candidate.record.into_outcome());
                }
                _ => movers.push(candidate),
            }
        }

        // Moved sources free their old names for later files in this run.
        // A later copy of the same content may be skipped and stay put.
        let leaving: HashSet<PathBuf> = if self.config.operation == OperationMode::Move {
            let mut seen = HashSet::new();
            movers
                .iter()
                .filter(|c| seen.insert(c.checksum.as_str()) || !c.dedupe)
                .map(|c| c.file.path.clone())
                .collect()
        } else {
            HashSet::new()
        };

        let mut planned = Vec::new();
        let mut by_year: HashMap<i32, (usize, u64)> = HashMap::new();
        let mut no_date_count = 0;
        let mut conflict_count = 0;
        let mut earliest: Option<NaiveDate> = None;
        let mut latest: Option<NaiveDate> = None;
        let mut total_size = 0u64;

        for candidate in movers {
            let date = candidate.date;
            let planned_file = match self.place(candidate, &mut claimed, &leaving) {
                Ok(planned_file) => planned_file,
                Err(record) => {
                    settle(record, &mut settled, events);
                    continue;
                }
            };

            total_size += planned_file.size_bytes;
            if planned_file.has_conflict {
                conflict_count += 1;
            }

            match date {
                Some(d) => {
                    earliest = Some(earliest.map_or(d, |e| e.min(d)));
                    latest = Some(latest.map_or(d, |l| l.max(d)));

                    let entry = by_year.entry(d.year()).or_insert((0, 0));
                    entry.0 += 1;
                    entry.1 += planned_file.size_bytes;
                }
                None => no_date_count += 1,
            }

            planned.push(planned_file);
        }

        let mut by_year_vec: Vec<YearSummary> = by_year
            .into_iter()
            .map(|(year, (count, size))| YearSummary {
                year,
                count,
                size_bytes: size,
            })
            .collect();
        by_year_vec.sort_by(|a, b| b.year.cmp(&a.year));

        let date_range = match (earliest, latest) {
            (Some(e), Some(l)) => Some((e.to_string(), l.to_string())),
            _ => None,
        };

        OrganizePlan {
            id: Uuid::new_v4().to_string(),
            total_files: planned.len(),
            total_size_bytes: total_size,
            date_range,
            by_year: by_year_vec,
            no_date_count,
            conflict_count,
            files: planned,
            settled,
            cancelled,
        }
    }

    /// Checksum, index lookup and metadata for one file.
    ///
    /// A file that settles early comes back as its record; the state says why.
    fn inspect<'f>(&self, file: &'f MediaFile) -> Result<Candidate<'f>, PhotoRecord> {
        let mut record = PhotoRecord::new(&file.path, file.size);

        let checksum = match file_checksum(&file.path) {
            Ok(checksum) => checksum,
            Err(e) => {
                record.fail(
                    Stage::Checksum,
                    format!("Failed to read {}: {}", file.path.display(), e),
                );
                return Err(record);
            }
        };
        record.checksum = Some(checksum.clone());

        let indexed = match self.index.paths_for(&checksum) {
            Ok(indexed) => indexed,
            Err(e) => {
                record.fail(Stage::Checksum, e.to_string());
                return Err(record);
            }
        };

        // A file indexed at its own path is never a duplicate
        let own_key = relative_key(&self.config.library, &file.path);
        let self_indexed = own_key.is_some_and(|key| indexed.iter().any(|p| *p == key));
        let dedupe = !self.config.allow_duplicates && !self_indexed;

        if dedupe {
            if let Some(of) = indexed.into_iter().next() {
                debug!(path = %file.path.display(), of = %of, "duplicate skipped");
                record.state = FileState::Duplicate { of };
                return Err(record);
            }
        }

        let tags = match self.accessor.read_tags(&file.path, ORGANIZE_TAGS) {
            Ok(tags) => tags,
            Err(e) => {
                record.fail(Stage::Metadata, e.to_string());
                return Err(record);
            }
        };
        record.metadata_read(tags);

        let mut metadata = PhotoMetadata::from_tags(&record.tags);
        if metadata.date_taken.is_none() && self.config.use_file_date {
            metadata.date_taken = Some(DateTime::<Local>::from(file.modified).naive_local());
        }

        let stem = file
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = target_extension(&file.path, self.config.convert_heic);
        let relative = plan_relative_path(&metadata, self.template, &stem, &extension);

        let source_is_heic = file
            .path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(is_heic_extension);

        Ok(Candidate {
            file,
            record,
            checksum,
            base: self.config.library.join(relative),
            date: metadata.date_taken.map(|d| d.date()),
            convert: self.config.convert_heic && source_is_heic,
            dedupe,
        })
    }

    /// Claim a destination for a file that has to move
    fn place(
        &self,
        mut candidate: Candidate<'_>,
        claimed: &mut HashSet<PathBuf>,
        leaving: &HashSet<PathBuf>,
    ) -> Result<PlannedFile, PhotoRecord> {
        let source = &candidate.file.path;

        let destination = match resolve_destination(&candidate.base, source, claimed, leaving)
        {
            Ok(destination) => destination,
            Err(e) => {
                candidate.record.fail(Stage::Planning, e.to_string());
                return Err(candidate.record);
            }
        };

        let Some(relative) = relative_key(&self.config.library, &destination) else {
            candidate.record.fail(
                Stage::Planning,
                format!("{} is outside the library", destination.display()),
            );
            return Err(candidate.record);
        };

        claimed.insert(destination.clone());
        debug!(source = %source.display(), destination = %relative, "planned");
        candidate.record.planned(destination.clone());

        Ok(PlannedFile {
            source: source.clone(),
            has_conflict: destination != candidate.base,
            destination,
            relative,
            filename: candidate.record.filename(),
            date: candidate.date.map(|d| d.to_string()),
            size_bytes: candidate.file.size,
            checksum: Some(candidate.checksum),
            convert: candidate.convert,
            dedupe: candidate.dedupe,
        })
    }
}

/// Record a file that will not be transferred
fn settle(record: PhotoRecord, settled: &mut Vec<FileOutcome>, events: &EventSender) {
    if let FileState::Failed { stage, reason } = &record.state {
        warn!(path = %record.path.display(), %stage, "{}", reason);
        events.send(Event::Organize(OrganizeEvent::FileFailed {
            path: record.path.clone(),
            message: reason.clone(),
        }));
    }
    settled.push(record.into_outcome());
}

/// Name `base` gets with numeric suffix `counter`
fn numbered(base: &Path, counter: usize) -> PathBuf {
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let name = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}_{}.{}", stem, counter, ext),
        _ => format!("{}_{}", stem, counter),
    };
    base.with_file_name(name)
}

/// Whether `path` is `base` itself or one of `base_1` … `base_9999`
fn is_numbered_variant(base: &Path, path: &Path) -> bool {
    if path == base {
        return true;
    }
    if path.parent() != base.parent() {
        return false;
    }

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("file");
    let Some(rest) = name.strip_prefix(stem).and_then(|r| r.strip_prefix('_')) else {
        return false;
    };
    let digits = match base.extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => rest.strip_suffix(ext).and_then(|r| r.strip_suffix('.')),
        _ => Some(rest),
    };

    digits.is_some_and(|d| {
        !d.starts_with('0')
            && d.bytes().all(|b| b.is_ascii_digit())
            && d.parse::<usize>().is_ok_and(|n| (1..=MAX_SUFFIX).contains(&n))
    })
}

/// Pick the first free name in `base`, `base_1`, `base_2`, ...
///
/// A candidate is free when no other file claimed it in this run and it
/// either does not exist yet, is `source` itself, or is held by a file
/// that moves away in this run.
pub fn resolve_destination(
    base: &Path,
    source: &Path,
    claimed: &HashSet<PathBuf>,
    leaving: &HashSet<PathBuf>,
) -> Result<PathBuf, OrganizeError> {
    let available = |candidate: &Path| {
        !claimed.contains(candidate)
            && (candidate == source
                || leaving.contains(candidate)
                || fs::symlink_metadata(candidate).is_err())
    };

    if available(base) {
        return Ok(base.to_path_buf());
    }

    (1..=MAX_SUFFIX)
        .map(|counter| numbered(base, counter))
        .find(|candidate| available(candidate))
        .ok_or_else(|| OrganizeError::PathCollision {
            path: base.to_path_buf(),
        })
}
