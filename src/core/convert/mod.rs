//! HEIC → JPEG conversion through ImageMagick.

use crate::core::tools::{stderr_summary, ExternalTool};
use crate::error::{MetadataError, OrganizeError};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Converts images by invoking `magick SRC DEST`.
///
/// The output format follows the destination's extension.
#[derive(Debug, Clone)]
pub struct ImageMagick {
    tool: ExternalTool,
}

impl ImageMagick {
    /// Locate `magick` on the PATH
    pub fn locate() -> Result<Self, MetadataError> {
        Self::with_program("magick")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Result<Self, MetadataError> {
        let tool = ExternalTool::locate(program, "-version")?;
        Ok(Self { tool })
    }

    /// Write `source` converted to the format implied by `destination`
    pub fn convert(&self, source: &Path, destination: &Path) -> Result<(), OrganizeError> {
        let output = self
            .tool
            .run([source.as_os_str(), destination.as_os_str()])
            .map_err(|e| OrganizeError::ConversionFailed {
                path: source.to_path_buf(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(OrganizeError::ConversionFailed {
                path: source.to_path_buf(),
                reason: stderr_summary(&output),
            });
        }

        debug!(source = %source.display(), destination = %destination.display(), "converted");
        Ok(())
    }
}
