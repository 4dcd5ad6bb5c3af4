//! # CLI Module
//!
//! Command-line interface for the photo library manager.
//!
//! ## Usage
//! ```bash
//! # Copy photos from a memory card into ~/Pictures
//! manage-photos import /Volumes/CARD
//!
//! # Preview, then reorganize the library in place
//! manage-photos organize --structure year-month-day --dry-run
//! manage-photos organize --structure year-month-day
//!
//! # Check the library against its index
//! manage-photos verify
//!
//! # JSON output
//! manage-photos --output json import ~/Downloads
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use console::{style, Term};
use indicatif::{ProgressBar, ProgressStyle};
use photo_management::core::convert::ImageMagick;
use photo_management::core::library::{relative_key, verify_library, LibraryIndex, VerifyReport};
use photo_management::core::metadata::{ExifTool, MetadataAccessor, TagMap};
use photo_management::core::naming::FolderStructure;
use photo_management::core::organize::{
    FileState, OperationMode, OrganizeConfig, OrganizeReport, Organizer,
};
use photo_management::error::{OrganizeError, PhotoManagerError, Result};
use photo_management::events::{
    Event, EventChannel, EventReceiver, OrganizeEvent, RunEvent, VerifyEvent,
};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread::{self, JoinHandle};
use tracing::{info, warn};

/// Photo library manager - organize photos by the metadata inside them
#[derive(Parser, Debug)]
#[command(name = "manage-photos")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Library root (default: ~/Pictures)
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    output: OutputFormat,

    /// exiftool executable to use
    #[arg(long, global = true)]
    exiftool: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy (or move) photos from SOURCE into the library
    Import {
        /// Directory to import from
        #[arg(default_value = ".")]
        source: PathBuf,

        /// Move files instead of copying them
        #[arg(long = "move")]
        move_files: bool,

        #[command(flatten)]
        options: OrganizeOptions,
    },

    /// Reorganize the library in place
    Organize {
        #[command(flatten)]
        options: OrganizeOptions,
    },

    /// Recompute checksums and report changes against the index
    Verify {
        /// Rewrite the index to match the disk afterwards
        #[arg(long)]
        update: bool,
    },

    /// Write metadata tags into files
    Tag {
        /// Files to tag
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Tag to write, e.g. --set "Artist=Jane Doe" (repeatable)
        #[arg(
            long = "set",
            value_name = "TAG=VALUE",
            required = true,
            value_parser = parse_assignment
        )]
        set: Vec<(String, String)>,
    },
}

#[derive(Args, Debug)]
struct OrganizeOptions {
    /// Naming template, e.g. "{year}/{month}/{camera}/{stem}"
    #[arg(long, conflicts_with = "structure")]
    template: Option<String>,

    /// Preset folder layout
    #[arg(long)]
    structure: Option<Structure>,

    /// Show what would happen without touching any file
    #[arg(long)]
    dry_run: bool,

    /// Include HEIC/HEIF files
    #[arg(long)]
    include_heic: bool,

    /// Convert HEIC files to JPEG (requires ImageMagick)
    #[arg(long)]
    convert_heic: bool,

    /// Include videos (.mov, .mp4, .avi)
    #[arg(long)]
    include_video: bool,

    /// Import files even if the same content is already in the library
    #[arg(long)]
    allow_duplicates: bool,

    /// Fall back to the file's modification time when no date tag is present
    #[arg(long)]
    use_file_date: bool,
}

impl OrganizeOptions {
    fn into_config(
        self,
        source: PathBuf,
        library: PathBuf,
        operation: OperationMode,
    ) -> OrganizeConfig {
        let template = match (self.template, self.structure) {
            (Some(template), _) => template,
            (None, structure) => FolderStructure::from(structure.unwrap_or_default())
                .template()
                .to_string(),
        };

        OrganizeConfig {
            source,
            library,
            template,
            operation,
            dry_run: self.dry_run,
            include_heic: self.include_heic,
            convert_heic: self.convert_heic,
            include_video: self.include_video,
            allow_duplicates: self.allow_duplicates,
            use_file_date: self.use_file_date,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Structure {
    /// 2024/01 - January/2024-01-15 09-30-00.jpg (default)
    #[default]
    YearMonth,
    /// 2024/01/15/IMG_0001.jpg
    YearMonthDay,
    /// 2024-01/IMG_0001.jpg
    YearMonthFlat,
}

impl From<Structure> for FolderStructure {
    fn from(structure: Structure) -> Self {
        match structure {
            Structure::YearMonth => FolderStructure::YearMonth,
            Structure::YearMonthDay => FolderStructure::YearMonthDay,
            Structure::YearMonthFlat => FolderStructure::YearMonthFlat,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable output with colors
    Pretty,
    /// JSON output for scripting
    Json,
}

/// Run the CLI and return the process exit code
pub fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    photo_management::init_tracing(cli.verbose);

    // Locate exiftool before any work
    let exiftool = match &cli.exiftool {
        Some(program) => ExifTool::with_program(program)?,
        None => ExifTool::locate()?,
    };
    info!(version = exiftool.version(), "using exiftool");

    match cli.command {
        Commands::Import {
            source,
            move_files,
            options,
        } => {
            let library = resolve_library(cli.library.as_deref(), options.dry_run)?;
            let source = source
                .canonicalize()
                .map_err(|_| OrganizeError::DirectoryNotFound { path: source })?;
            let operation = if move_files {
                OperationMode::Move
            } else {
                OperationMode::Copy
            };
            let config = options.into_config(source, library, operation);
            run_organize(config, &exiftool, cli.output, cli.verbose)
        }
        Commands::Organize { options } => {
            let library = resolve_library(cli.library.as_deref(), options.dry_run)?;
            let config = options.into_config(library.clone(), library, OperationMode::Move);
            run_organize(config, &exiftool, cli.output, cli.verbose)
        }
        Commands::Verify { update } => {
            let library = resolve_library(cli.library.as_deref(), true)?;
            run_verify(&library, update, cli.output, cli.verbose)
        }
        Commands::Tag { files, set } => run_tag(&files, set, &exiftool, cli.output),
    }
}

/// Absolute library root, created unless this is a read-only run
fn resolve_library(explicit: Option<&Path>, read_only: bool) -> Result<PathBuf> {
    let library = match explicit {
        Some(path) => path.to_path_buf(),
        None => dirs::picture_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Pictures")))
            .ok_or_else(|| {
                PhotoManagerError::Config(
                    "Cannot find your Pictures folder; pass --library".to_string(),
                )
            })?,
    };

    if library.exists() && !library.is_dir() {
        return Err(PhotoManagerError::Config(format!(
            "Library {} exists and is not a directory",
            library.display()
        )));
    }

    if !library.exists() {
        if read_only {
            return absolute(&library);
        }
        fs::create_dir_all(&library).map_err(|e| {
            PhotoManagerError::Config(format!(
                "Cannot create library at {}: {}",
                library.display(),
                e
            ))
        })?;
    }

    library.canonicalize().map_err(|e| {
        PhotoManagerError::Config(format!("Cannot open library {}: {}", library.display(), e))
    })
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| PhotoManagerError::Config(format!("Cannot resolve {}: {}", path.display(), e)))
}

fn parse_assignment(raw: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TAG=VALUE, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing tag name in '{}'", raw));
    }
    Ok((name.to_string(), value.to_string()))
}

fn run_organize(
    config: OrganizeConfig,
    exiftool: &ExifTool,
    output: OutputFormat,
    verbose: bool,
) -> Result<ExitCode> {
    let term = Term::stderr();

    if matches!(output, OutputFormat::Pretty) {
        print_header(&term);
    }

    let converter = if config.convert_heic {
        Some(ImageMagick::locate()?)
    } else {
        None
    };

    let mut organizer = Organizer::new(config, exiftool)?;
    if let Some(converter) = converter {
        organizer = organizer.with_converter(converter);
    }

    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_progress(receiver, output, verbose);

    let result = organizer.run_with_events(&sender);

    // Drop sender to signal event thread to finish
    drop(sender);
    event_thread.join().ok();

    let report = result?;

    match output {
        OutputFormat::Pretty => print_organize_pretty(&term, &report, organizer.config(), verbose),
        OutputFormat::Json => print_json(&report),
    }

    Ok(if report.has_failures() {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    })
}

fn run_verify(
    library: &Path,
    update: bool,
    output: OutputFormat,
    verbose: bool,
) -> Result<ExitCode> {
    let term = Term::stderr();

    if !LibraryIndex::exists_in(library) {
        match output {
            OutputFormat::Pretty => {
                term.write_line(&format!(
                    "{} No database to compare against in {}",
                    style("!").yellow().bold(),
                    display_path(library)
                ))
                .ok();
            }
            OutputFormat::Json => print_json(&serde_json::json!({
                "library": library,
                "error": "no database to compare against",
            })),
        }
        return Ok(ExitCode::SUCCESS);
    }

    if matches!(output, OutputFormat::Pretty) {
        print_header(&term);
    }

    let index = LibraryIndex::open_in(library)?;

    let (sender, receiver) = EventChannel::new();
    let event_thread = spawn_progress(receiver, output, verbose);

    let result = verify_library(library, &index, update, &sender);

    drop(sender);
    event_thread.join().ok();

    let report = result?;

    match output {
        OutputFormat::Pretty => print_verify_pretty(&term, &report),
        OutputFormat::Json => print_json(&report),
    }

    Ok(if report.unreadable.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

#[derive(Debug, Serialize)]
struct TagResult {
    path: PathBuf,
    error: Option<String>,
}

fn run_tag(
    files: &[PathBuf],
    assignments: Vec<(String, String)>,
    accessor: &dyn MetadataAccessor,
    output: OutputFormat,
) -> Result<ExitCode> {
    let tags: TagMap = assignments.into_iter().collect();

    let results: Vec<TagResult> = files
        .iter()
        .map(|path| match accessor.write_tags(path, &tags) {
            Ok(()) => {
                info!(path = %path.display(), tags = tags.len(), "tags written");
                TagResult {
                    path: path.clone(),
                    error: None,
                }
            }
            Err(e) => {
                warn!(path = %path.display(), "{}", e);
                TagResult {
                    path: path.clone(),
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    match output {
        OutputFormat::Pretty => {
            let term = Term::stdout();
            for result in &results {
                let line = match &result.error {
                    None => format!("{} {}", style("✓").green(), display_path(&result.path)),
                    Some(error) => format!("{} {}", style("✗").red(), error),
                };
                term.write_line(&line).ok();
            }
        }
        OutputFormat::Json => print_json(&results),
    }

    let failed = results.iter().any(|r| r.error.is_some());
    Ok(if failed { ExitCode::from(1) } else { ExitCode::SUCCESS })
}

/// Render progress events on stderr until the sender is dropped
fn spawn_progress(receiver: EventReceiver, output: OutputFormat, verbose: bool) -> JoinHandle<()> {
    let progress = if matches!(output, OutputFormat::Pretty) {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓░"),
        );
        Some(pb)
    } else {
        None
    };

    thread::spawn(move || {
        let Some(pb) = progress else {
            // Drain so senders never block
            for _ in receiver.iter() {}
            return;
        };

        for event in receiver.iter() {
            match event {
                Event::Run(RunEvent::PhaseChanged { phase }) => {
                    pb.set_message(format!("{}", phase));
                }
                Event::Organize(OrganizeEvent::Started { total_files })
                | Event::Verify(VerifyEvent::Started { total_files }) => {
                    pb.set_length(total_files as u64);
                    pb.set_position(0);
                }
                Event::Organize(OrganizeEvent::Progress(p))
                | Event::Verify(VerifyEvent::Progress(p)) => {
                    pb.set_position(p.completed as u64);
                    if verbose {
                        pb.set_message(
                            p.current_path
                                .file_name()
                                .unwrap_or_default()
                                .to_string_lossy()
                                .into_owned(),
                        );
                    }
                }
                Event::Organize(OrganizeEvent::FileFailed { path, message }) => {
                    if verbose {
                        pb.println(format!(
                            "{} {}: {}",
                            style("✗").red(),
                            display_path(&path),
                            message
                        ));
                    }
                }
                Event::Organize(OrganizeEvent::Completed { .. })
                | Event::Verify(VerifyEvent::Completed { .. }) => {
                    pb.finish_and_clear();
                }
                Event::Run(RunEvent::Cancelled) => {
                    pb.abandon_with_message("cancelled");
                }
                _ => {}
            }
        }

        if !pb.is_finished() {
            pb.finish_and_clear();
        }
    })
}

fn print_header(term: &Term) {
    term.write_line(&format!(
        "{} {}",
        style("Photo Library").bold().cyan(),
        style(concat!("v", env!("CARGO_PKG_VERSION"))).dim()
    ))
    .ok();
    term.write_line("").ok();
}

fn print_organize_pretty(
    term: &Term,
    report: &OrganizeReport,
    config: &OrganizeConfig,
    verbose: bool,
) {
    let verb = match (config.operation, report.dry_run) {
        (OperationMode::Copy, false) => "copied",
        (OperationMode::Move, false) => "moved",
        (OperationMode::Copy, true) => "to copy",
        (OperationMode::Move, true) => "to move",
    };

    term.write_line("").ok();
    if report.dry_run {
        term.write_line(&format!(
            "{} Dry run - nothing was changed",
            style("○").yellow().bold()
        ))
        .ok();
    } else if report.cancelled {
        term.write_line(&format!("{} Cancelled", style("!").yellow().bold()))
            .ok();
    } else {
        term.write_line(&format!("{} Done", style("✓").green().bold()))
            .ok();
    }
    term.write_line("").ok();

    let summary = report.summary();
    term.write_line(&format!(
        "  {} photos {} ({}) in {:.1}s",
        style(summary.moved).cyan(),
        verb,
        format_bytes(report.total_size_bytes),
        summary.duration_ms as f64 / 1000.0
    ))
    .ok();
    term.write_line(&format!(
        "  {} already in place",
        style(summary.unchanged).cyan()
    ))
    .ok();
    term.write_line(&format!(
        "  {} duplicates skipped",
        style(summary.duplicates).cyan()
    ))
    .ok();
    if report.folders_created > 0 {
        term.write_line(&format!(
            "  {} folders created",
            style(report.folders_created).dim()
        ))
        .ok();
    }

    if summary.failed > 0 {
        term.write_line(&format!("  {} failed", style(summary.failed).red().bold()))
            .ok();
    }

    if !report.unindexed.is_empty() {
        term.write_line(&format!(
            "  {} not recorded in the index; run `verify --update`",
            style(report.unindexed.len()).red().bold()
        ))
        .ok();
        if verbose {
            for path in &report.unindexed {
                term.write_line(&format!("    {}", style(path).dim())).ok();
            }
        }
    }

    if report.dry_run || verbose {
        let transfers = report.transfers();
        if !transfers.is_empty() {
            term.write_line("").ok();
            term.write_line(&format!("{}", style("Planned:").bold().underlined()))
                .ok();
            for (source, destination) in transfers {
                let destination = relative_key(&config.library, &destination)
                    .unwrap_or_else(|| destination.display().to_string());
                term.write_line(&format!(
                    "  {} {} {}",
                    display_path(&source),
                    style("→").dim(),
                    destination
                ))
                .ok();
            }
        }
    }

    let failures: Vec<_> = report
        .outcomes
        .iter()
        .filter_map(|o| match &o.state {
            FileState::Failed { reason, .. } => Some((&o.source, reason)),
            _ => None,
        })
        .collect();

    if !failures.is_empty() {
        term.write_line("").ok();
        term.write_line(&format!("{}", style("Failed:").bold().underlined()))
            .ok();
        for (source, reason) in failures {
            term.write_line(&format!(
                "  {} {}",
                style("✗").red(),
                display_path(source)
            ))
            .ok();
            term.write_line(&format!("    {}", style(reason).dim())).ok();
        }
    }
}

fn print_verify_pretty(term: &Term, report: &VerifyReport) {
    term.write_line("").ok();
    term.write_line(&format!(
        "  {} files checked",
        style(report.files_checked).cyan()
    ))
    .ok();
    term.write_line("").ok();

    if !report.has_changes() {
        term.write_line(&format!("{} No changes", style("✓").green().bold()))
            .ok();
        return;
    }

    let sections: [(&str, &Vec<String>); 4] = [
        ("Checksum changed", &report.checksum_changed),
        ("Missing from disk", &report.missing_from_disk),
        ("Not in database", &report.untracked),
        ("Unreadable", &report.unreadable),
    ];

    for (title, paths) in sections {
        if paths.is_empty() {
            continue;
        }
        term.write_line(&format!(
            "{} ({})",
            style(title).bold().underlined(),
            paths.len()
        ))
        .ok();
        for path in paths {
            term.write_line(&format!("  {}", path)).ok();
        }
        term.write_line("").ok();
    }

    if report.index_updated {
        term.write_line(&format!("{} Database updated", style("✓").green().bold()))
            .ok();
    } else {
        term.write_line(&format!(
            "{}",
            style("Run with --update to accept these changes.").dim()
        ))
        .ok();
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("failed to encode JSON output: {}", e),
    }
}

fn display_path(path: &Path) -> String {
    match dirs::home_dir().and_then(|home| path.strip_prefix(home).ok().map(Path::to_path_buf)) {
        Some(relative) => format!("~/{}", relative.display()),
        None => path.display().to_string(),
    }
}

fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
