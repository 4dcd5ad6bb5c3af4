//! Executor for organize plans.

use super::types::*;
use crate::core::checksum::file_checksum;
use crate::core::convert::ImageMagick;
use crate::core::library::{relative_key, LibraryIndex};
use crate::error::{IndexError, OrganizeError};
use crate::events::{Event, EventSender, FileProgress, OrganizeEvent};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};

/// Executes organize plans
pub struct OrganizeExecutor<'a> {
    config: &'a OrganizeConfig,
    index: &'a LibraryIndex,
    converter: Option<&'a ImageMagick>,
}

/// One action while carrying out a plan, by position in `plan.files`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Move the source to a hidden name in its own folder
    SetAside(usize),
    Transfer(usize),
}

impl<'a> OrganizeExecutor<'a> {
    pub fn new(
        config: &'a OrganizeConfig,
        index: &'a LibraryIndex,
        converter: Option<&'a ImageMagick>,
    ) -> Self {
        Self {
            config,
            index,
            converter,
        }
    }

    /// Carry out `plan`.
    ///
    /// In a dry run nothing is touched and every planned file is reported
    /// as `PathPlanned`. Stops between files once `cancel` is raised.
    pub fn execute(
        &self,
        plan: &OrganizePlan,
        cancel: &AtomicBool,
        events: &EventSender,
    ) -> OrganizeReport {
        let start = Instant::now();
        let total = plan.files.len();
        events.send(Event::Organize(OrganizeEvent::Started { total_files: total }));

        let steps = transfer_order(&plan.files);
        let cycle_breakers: HashSet<usize> = steps
            .iter()
            .filter_map(|step| match step {
                Step::SetAside(i) => Some(*i),
                Step::Transfer(_) => None,
            })
            .collect();

        let mut outcomes = plan.settled.clone();
        let mut folders_created = 0usize;
        let mut total_size = 0u64;
        let mut created_dirs: HashSet<PathBuf> = HashSet::new();
        let mut cancelled = plan.cancelled;
        let mut unindexed = Vec::new();
        let mut completed = 0usize;
        // Checksum → where this run put that content
        let mut placed: HashMap<String, String> = HashMap::new();
        let mut set_aside: HashMap<usize, PathBuf> = HashMap::new();

        for step in steps {
            // Never stop while a file sits under a temporary name
            if set_aside.is_empty() && cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }

            let i = match step {
                Step::SetAside(i) => {
                    if !self.config.dry_run {
                        if let Some(aside) = self.set_aside(&plan.files[i]) {
                            set_aside.insert(i, aside);
                        }
                    }
                    continue;
                }
                Step::Transfer(i) => i,
            };

            let file = &plan.files[i];
            completed += 1;
            events.send(Event::Organize(OrganizeEvent::Progress(FileProgress {
                completed,
                total,
                current_path: file.source.clone(),
            })));

            let duplicate_of = match &file.checksum {
                Some(checksum) if file.dedupe && !cycle_breakers.contains(&i) => {
                    placed.get(checksum).cloned()
                }
                _ => None,
            };
            if let Some(of) = duplicate_of {
                debug!(path = %file.source.display(), of = %of, "duplicate skipped");
                outcomes.push(FileOutcome {
                    source: file.source.clone(),
                    destination: None,
                    state: FileState::Duplicate { of },
                });
                continue;
            }

            if self.config.dry_run {
                remember_placement(&mut placed, file);
                outcomes.push(FileOutcome {
                    source: file.source.clone(),
                    destination: Some(file.destination.clone()),
                    state: FileState::PathPlanned,
                });
                total_size += file.size_bytes;
                continue;
            }

            if let Some(parent) = file.destination.parent() {
                if !created_dirs.contains(parent) && !parent.is_dir() {
                    if let Err(e) = fs::create_dir_all(parent) {
                        let message = with_return_note(
                            transfer_error(file, e).to_string(),
                            self.put_back(&mut set_aside, i, file),
                        );
                        self.record_failure(&mut outcomes, file, message, events);
                        continue;
                    }
                    created_dirs.insert(parent.to_path_buf());
                    folders_created += 1;
                }
            }

            let aside = set_aside.get(&i).cloned();
            let source = aside.clone().unwrap_or_else(|| file.source.clone());
            match self.transfer(file, &source) {
                Ok(()) => {
                    set_aside.remove(&i);
                    remember_placement(&mut placed, file);
                    if let Err(e) = self.update_index(file, aside.is_none()) {
                        let message =
                            format!("transferred to {} but not indexed: {}", file.relative, e);
                        warn!(path = %file.source.display(), "{}", message);
                        events.send(Event::Organize(OrganizeEvent::FileFailed {
                            path: file.source.clone(),
                            message,
                        }));
                        unindexed.push(file.relative.clone());
                    }
                    debug!(
                        source = %file.source.display(),
                        destination = %file.relative,
                        "transferred"
                    );
                    total_size += file.size_bytes;
                    outcomes.push(FileOutcome {
                        source: file.source.clone(),
                        destination: Some(file.destination.clone()),
                        state: FileState::Moved,
                    });
                }
                Err(e) => {
                    let stranded = self.put_back(&mut set_aside, i, file);
                    let message = with_return_note(e.to_string(), stranded);
                    self.record_failure(&mut outcomes, file, message, events);
                }
            }
        }

        outcomes.sort_by(|a, b| a.source.cmp(&b.source));

        OrganizeReport {
            plan_id: plan.id.clone(),
            dry_run: self.config.dry_run,
            outcomes,
            folders_created,
            total_size_bytes: total_size,
            duration_ms: start.elapsed().as_millis() as u64,
            cancelled,
            unindexed,
        }
    }

    fn record_failure(
        &self,
        outcomes: &mut Vec<FileOutcome>,
        file: &PlannedFile,
        message: String,
        events: &EventSender,
    ) {
        warn!(path = %file.source.display(), "{}", message);
        events.send(Event::Organize(OrganizeEvent::FileFailed {
            path: file.source.clone(),
            message: message.clone(),
        }));
        outcomes.push(FileOutcome::failed(&file.source, Stage::Transfer, message));
    }

    /// Transfer `file`, reading it from `source` (its planned source, or
    /// where it was moved aside to)
    fn transfer(&self, file: &PlannedFile, source: &Path) -> Result<(), OrganizeError> {
        if !source.exists() {
            return Err(OrganizeError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        if file.convert {
            let converter = self.converter.ok_or_else(|| OrganizeError::ConversionFailed {
                path: source.to_path_buf(),
                reason: "ImageMagick is not available".to_string(),
            })?;
            convert_into(converter, source, &file.destination)?;
            if self.config.operation == OperationMode::Move {
                fs::remove_file(source).map_err(|e| transfer_error(file, e))?;
            }
            return Ok(());
        }

        match self.config.operation {
            OperationMode::Copy => copy_no_clobber(source, &file.destination),
            OperationMode::Move => move_file(source, &file.destination),
        }
    }

    /// Point the index at the file's new location.
    ///
    /// `forget_source` is false for files whose old entries were dropped
    /// when they were moved aside; another file may hold that name by now.
    fn update_index(&self, file: &PlannedFile, forget_source: bool) -> Result<(), IndexError> {
        if forget_source && self.config.operation == OperationMode::Move {
            if let Some(old) = relative_key(&self.config.library, &file.source) {
                self.index.remove_path(&old)?;
            }
        }

        if let Some(checksum) = &file.checksum {
            self.index.record(checksum, &file.relative)?;
        }

        // Converted output has different bytes; remember both
        if file.convert {
            match file_checksum(&file.destination) {
                Ok(checksum) => self.index.record(&checksum, &file.relative)?,
                Err(e) => {
                    warn!(path = %file.relative, error = %e, "could not checksum converted file")
                }
            }
        }

        Ok(())
    }

    /// Move a file out of its own name, dropping its index entries
    fn set_aside(&self, file: &PlannedFile) -> Option<PathBuf> {
        let aside = match move_aside(&file.source) {
            Ok(aside) => aside,
            Err(e) => {
                warn!(path = %file.source.display(), error = %e, "could not move file aside");
                return None;
            }
        };
        debug!(path = %file.source.display(), aside = %aside.display(), "moved aside");

        if let Some(old) = relative_key(&self.config.library, &file.source) {
            if let Err(e) = self.index.remove_path(&old) {
                warn!(path = %old, error = %e, "could not update index");
            }
        }
        Some(aside)
    }

    /// Return a file that was moved aside to its own name.
    ///
    /// Gives the temporary location back when that is not possible.
    fn put_back(
        &self,
        set_aside: &mut HashMap<usize, PathBuf>,
        i: usize,
        file: &PlannedFile,
    ) -> Option<PathBuf> {
        let aside = set_aside.remove(&i)?;
        if let Err(e) = move_file(&aside, &file.source) {
            warn!(
                path = %file.source.display(),
                kept_at = %aside.display(),
                error = %e,
                "could not put file back"
            );
            return Some(aside);
        }

        let old = relative_key(&self.config.library, &file.source);
        if let (Some(checksum), Some(old)) = (&file.checksum, old) {
            if let Err(e) = self.index.record(checksum, &old) {
                warn!(path = %old, error = %e, "could not update index");
            }
        }
        None
    }
}

fn remember_placement(placed: &mut HashMap<String, String>, file: &PlannedFile) {
    if let Some(checksum) = &file.checksum {
        placed
            .entry(checksum.clone())
            .or_insert_with(|| file.relative.clone());
    }
}

/// Order transfers so no file lands on a name another file still holds.
///
/// In-place runs may plan a file into the name another planned file is
/// leaving. Destinations are unique, so each file waits on at most one
/// other and the waits form chains and cycles. A chain runs from its far
/// end; a cycle first sets one source aside.
fn transfer_order(files: &[PlannedFile]) -> Vec<Step> {
    let by_source: HashMap<&Path, usize> = files
        .iter()
        .enumerate()
        .map(|(i, f)| (f.source.as_path(), i))
        .collect();
    let waits_on = |i: usize| {
        by_source
            .get(files[i].destination.as_path())
            .copied()
            .filter(|&j| j != i)
    };

    let mut done = vec![false; files.len()];
    let mut steps = Vec::with_capacity(files.len());

    for first in 0..files.len() {
        if done[first] {
            continue;
        }

        let mut chain = vec![first];
        let mut on_chain = HashSet::from([first]);
        let mut cycle = false;
        let mut current = first;
        while let Some(next) = waits_on(current) {
            if done[next] {
                break;
            }
            if !on_chain.insert(next) {
                cycle = next == first;
                break;
            }
            chain.push(next);
            current = next;
        }

        for &i in &chain {
            done[i] = true;
        }
        if cycle {
            steps.push(Step::SetAside(first));
        }
        steps.extend(chain.iter().rev().map(|&i| Step::Transfer(i)));
    }

    steps
}

/// Rename `source` to a fresh hidden name in the same folder
fn move_aside(source: &Path) -> Result<PathBuf, OrganizeError> {
    let parent = source.parent().unwrap_or(Path::new("."));
    let err = |e: io::Error| OrganizeError::Transfer {
        source_path: source.to_path_buf(),
        destination: parent.to_path_buf(),
        source: e,
    };

    let slot = tempfile::Builder::new()
        .prefix(".organizing-")
        .tempfile_in(parent)
        .map_err(err)?
        .into_temp_path();
    fs::rename(source, &slot).map_err(err)?;
    slot.keep().map_err(|e| err(e.error))
}

fn with_return_note(message: String, stranded: Option<PathBuf>) -> String {
    match stranded {
        Some(path) => format!("{} (file kept at {})", message, path.display()),
        None => message,
    }
}

fn transfer_error(file: &PlannedFile, error: io::Error) -> OrganizeError {
    OrganizeError::Transfer {
        source_path: file.source.clone(),
        destination: file.destination.clone(),
        source: error,
    }
}

/// Move `source` to `destination`, refusing to replace anything.
///
/// `rename` fails across filesystems; fall back to copy, verify, delete.
fn move_file(source: &Path, destination: &Path) -> Result<(), OrganizeError> {
    if fs::symlink_metadata(destination).is_ok() {
        return Err(OrganizeError::PathCollision {
            path: destination.to_path_buf(),
        });
    }

    let err = |e: io::Error| OrganizeError::Transfer {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        source: e,
    };

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(error = %e, "rename failed, copying instead");
            copy_no_clobber(source, destination)?;

            let source_size = fs::metadata(source).map_err(err)?.len();
            let dest_size = fs::metadata(destination).map_err(err)?.len();
            if dest_size != source_size {
                // Copy was incomplete, keep the source
                let _ = fs::remove_file(destination);
                return Err(err(io::Error::other(format!(
                    "Copy verification failed: source {} bytes, dest {} bytes",
                    source_size, dest_size
                ))));
            }

            fs::remove_file(source).map_err(err)
        }
    }
}

/// Copy through a temp file next to `destination`, keeping the mtime.
///
/// The temp file is only linked into place if `destination` is still free.
fn copy_no_clobber(source: &Path, destination: &Path) -> Result<(), OrganizeError> {
    let err = |e: io::Error| OrganizeError::Transfer {
        source_path: source.to_path_buf(),
        destination: destination.to_path_buf(),
        source: e,
    };
    let parent = destination.parent().unwrap_or(Path::new("."));

    let mut input = File::open(source).map_err(err)?;
    let modified = input.metadata().and_then(|m| m.modified()).ok();

    let mut temp = NamedTempFile::new_in(parent).map_err(err)?;
    io::copy(&mut input, temp.as_file_mut()).map_err(err)?;
    if let Some(modified) = modified {
        temp.as_file().set_modified(modified).map_err(err)?;
    }
    temp.as_file().sync_all().map_err(err)?;

    persist(temp.into_temp_path(), source, destination)
}

fn convert_into(
    converter: &ImageMagick,
    source: &Path,
    destination: &Path,
) -> Result<(), OrganizeError> {
    let parent = destination.parent().unwrap_or(Path::new("."));
    let suffix = destination
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let temp = tempfile::Builder::new()
        .prefix(".converting-")
        .suffix(&suffix)
        .tempfile_in(parent)
        .map_err(|e| OrganizeError::Transfer {
            source_path: source.to_path_buf(),
            destination: destination.to_path_buf(),
            source: e,
        })?
        .into_temp_path();

    converter.convert(source, &temp)?;
    persist(temp, source, destination)
}

fn persist(temp: TempPath, source: &Path, destination: &Path) -> Result<(), OrganizeError> {
    temp.persist_noclobber(destination).map_err(|e| {
        if e.error.kind() == io::ErrorKind::AlreadyExists {
            OrganizeError::PathCollision {
                path: destination.to_path_buf(),
            }
        } else {
            OrganizeError::Transfer {
                source_path: source.to_path_buf(),
                destination: destination.to_path_buf(),
                source: e.error,
            }
        }
    })
}
