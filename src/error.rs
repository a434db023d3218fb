//! Errors raised at the boundary with external command-line tools.

use std::process::ExitStatus;

/// Failure of an external converter invocation.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The tool could not be started at all, usually because it is not installed.
    #[error("unable to start `{tool}`: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// Writing to the tool's stdin or collecting its output failed.
    #[error("i/o error while talking to `{tool}`: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    /// The tool ran and exited unsuccessfully.
    #[error("`{tool}` exited with {status}: {stderr}")]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },
    /// The tool produced output that is not UTF-8.
    #[error("`{tool}` produced non UTF-8 output")]
    InvalidOutput { tool: String },
}
