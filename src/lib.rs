//! # Photo Management
//!
//! Keeps a photo library organized by the metadata embedded in each file.
//!
//! ## Core Philosophy
//! - **Never overwrite** - a file is only ever placed at a free path
//! - **Never import twice** - content already in the library is skipped
//! - **Same input, same layout** - re-running an organize changes nothing
//!
//! ## Architecture
//! - `core` - Metadata access, path planning and the library organizer
//! - `events` - Event-driven progress reporting
//! - `error` - User-friendly error types
//! - `cli` - Command-line interface (binary only)

pub mod core;
pub mod error;
pub mod events;

// Re-export commonly used types at the crate root
pub use error::{PhotoManagerError, Result};

/// Initialize tracing for the library
///
/// Logs go to stderr. `RUST_LOG` wins over the default level, which is
/// `debug` for this crate when `verbose` is set and `warn` otherwise.
/// Calling this twice is harmless.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "photo_management=debug,manage_photos=debug"
    } else {
        "warn"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
