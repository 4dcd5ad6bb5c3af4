//! # manage-photos CLI
//!
//! Command-line interface for the photo library manager.
//!
//! ## Usage
//! ```bash
//! manage-photos import /Volumes/CARD --dry-run
//! manage-photos organize --include-heic --convert-heic
//! manage-photos verify --update
//! manage-photos tag IMG_0001.jpg --set "Artist=Jane Doe"
//! ```

mod cli;

use std::process::ExitCode;

fn main() -> ExitCode {
    match cli::run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {}", console::style("error:").red().bold(), e);
            ExitCode::from(2)
        }
    }
}
