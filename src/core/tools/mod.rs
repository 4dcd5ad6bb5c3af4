//! Locating and invoking external command-line tools.

use crate::error::MetadataError;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// A command-line program the library shells out to.
#[derive(Debug, Clone)]
pub struct ExternalTool {
    program: PathBuf,
    version: String,
}

impl ExternalTool {
    /// Find `program` by running it with `version_arg`.
    ///
    /// Fails with `ToolMissing` if the program cannot be spawned or exits
    /// with a non-zero status.
    pub fn locate(program: impl Into<PathBuf>, version_arg: &str) -> Result<Self, MetadataError> {
        let program = program.into();
        let missing = || MetadataError::ToolMissing {
            tool: program.display().to_string(),
        };

        let output = Command::new(&program)
            .arg(version_arg)
            .stdin(Stdio::null())
            .output()
            .map_err(|_| missing())?;

        if !output.status.success() {
            return Err(missing());
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        debug!(program = %program.display(), %version, "located external tool");

        Ok(Self { program, version })
    }

    /// Program path or name as given
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// First line of the tool's version output
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Run the tool to completion with the given arguments.
    pub fn run<I, S>(&self, args: I) -> std::io::Result<Output>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
    }
}

/// Collapse a tool's stderr into a single line for error messages
pub fn stderr_summary(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr);
    let joined = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("; ");

    if joined.is_empty() {
        format!("exited with {}", output.status)
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_tool_missing() {
        let result = ExternalTool::locate("definitely-not-a-real-tool-4f1c", "-ver");
        match result {
            Err(MetadataError::ToolMissing { tool }) => {
                assert_eq!(tool, "definitely-not-a-real-tool-4f1c");
            }
            other => panic!("expected ToolMissing, got {:?}", other),
        }
    }
}
