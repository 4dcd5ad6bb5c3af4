//! # Organize Module
//!
//! Imports photos into the library and reorganizes it in place.
//!
//! ## Pipeline
//! 1. Scan the source for candidate files (sorted by path)
//! 2. Checksum each file and skip content the library already has
//! 3. Read metadata and plan a destination from the naming template
//! 4. Transfer (copy, move or convert) and update the library index
//!
//! Per-file failures are collected in the report; the run always
//! finishes the remaining files.

mod executor;
mod planner;
mod types;

pub use executor::OrganizeExecutor;
pub use planner::{resolve_destination, OrganizePlanner, MAX_SUFFIX};
pub use types::*;

use crate::core::convert::ImageMagick;
use crate::core::library::{open_or_build_index, snapshot_index};
use crate::core::metadata::MetadataAccessor;
use crate::core::naming::NamingTemplate;
use crate::core::scanner::{MediaScanner, WalkDirScanner};
use crate::error::{OrganizeError, PhotoManagerError};
use crate::events::{null_sender, Event, EventSender, OrganizeEvent, RunEvent, RunPhase};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Runs imports and in-place reorganizations.
///
/// # Example
///
/// ```rust,ignore
/// use photo_management::core::metadata::ExifTool;
/// use photo_management::core::organize::{OrganizeConfig, Organizer};
///
/// let exiftool = ExifTool::locate()?;
/// let config = OrganizeConfig::new("/media/card", "/home/me/Pictures");
/// let report = Organizer::new(config, &exiftool)?.run()?;
/// println!("{} imported", report.moved());
/// ```
pub struct Organizer<'a> {
    config: OrganizeConfig,
    template: NamingTemplate,
    accessor: &'a dyn MetadataAccessor,
    converter: Option<ImageMagick>,
    cancel: Arc<AtomicBool>,
}

impl<'a> Organizer<'a> {
    /// Validate `config` and prepare a run
    pub fn new(
        config: OrganizeConfig,
        accessor: &'a dyn MetadataAccessor,
    ) -> Result<Self, PhotoManagerError> {
        let template = NamingTemplate::parse(&config.template)?;
        Ok(Self {
            config,
            template,
            accessor,
            converter: None,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Use ImageMagick for HEIC conversion
    pub fn with_converter(mut self, converter: ImageMagick) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Share a cancellation flag with the caller (e.g., a Ctrl-C handler)
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn config(&self) -> &OrganizeConfig {
        &self.config
    }

    pub fn template(&self) -> &NamingTemplate {
        &self.template
    }

    /// Run without progress reporting
    pub fn run(&self) -> Result<OrganizeReport, PhotoManagerError> {
        self.run_with_events(&null_sender())
    }

    /// Run, reporting progress through `events`
    pub fn run_with_events(
        &self,
        events: &EventSender,
    ) -> Result<OrganizeReport, PhotoManagerError> {
        let start = Instant::now();
        let config = &self.config;

        if !config.source.is_dir() {
            return Err(OrganizeError::DirectoryNotFound {
                path: config.source.clone(),
            }
            .into());
        }
        if config.convert_heic && self.converter.is_none() {
            return Err(PhotoManagerError::Config(
                "HEIC conversion requested but ImageMagick is not available".to_string(),
            ));
        }

        let index = if config.dry_run {
            snapshot_index(&config.library, events)?
        } else {
            fs::create_dir_all(&config.library).map_err(|e| {
                PhotoManagerError::Config(format!(
                    "Cannot create library at {}: {}",
                    config.library.display(),
                    e
                ))
            })?;
            open_or_build_index(&config.library, events)?
        };

        events.phase(RunPhase::Scanning);
        let scanner = WalkDirScanner::new(config.media_filter());
        let scan = scanner.scan_with_events(&config.source, events)?;

        let mut files = scan.files;
        if !config.is_in_place() && config.library.starts_with(&config.source) {
            // Importing from a parent of the library; leave the library alone
            files.retain(|f| !f.path.starts_with(&config.library));
        }

        let unreadable: Vec<FileOutcome> = scan
            .errors
            .into_iter()
            .filter_map(|e| match &e {
                OrganizeError::Read { path, .. } => {
                    Some(FileOutcome::failed(path, Stage::Discovery, e.to_string()))
                }
                _ => {
                    warn!(error = %e, "scan problem");
                    None
                }
            })
            .collect();

        info!(
            source = %config.source.display(),
            library = %config.library.display(),
            files = files.len(),
            dry_run = config.dry_run,
            "organizing"
        );

        events.phase(RunPhase::Planning);
        let planner = OrganizePlanner::new(config, &self.template, self.accessor, &index);
        let mut plan = planner.create_plan(&files, &self.cancel, events);
        plan.settled.extend(unreadable);

        events.phase(RunPhase::Transferring);
        let executor = OrganizeExecutor::new(config, &index, self.converter.as_ref());
        let mut report = executor.execute(&plan, &self.cancel, events);
        report.duration_ms = start.elapsed().as_millis() as u64;

        if report.cancelled || self.cancel.load(Ordering::Relaxed) {
            report.cancelled = true;
            events.send(Event::Run(RunEvent::Cancelled));
        }

        let summary = report.summary();
        info!(
            moved = summary.moved,
            unchanged = summary.unchanged,
            duplicates = summary.duplicates,
            failed = summary.failed,
            duration_ms = summary.duration_ms,
            "organize finished"
        );
        events.send(Event::Organize(OrganizeEvent::Completed { summary }));

        Ok(report)
    }
}
