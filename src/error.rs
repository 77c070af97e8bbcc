//! Error types shared by both adapters

use thiserror::Error;

/// Errors surfaced by the configuration store and process control adapters.
#[derive(Debug, Error)]
pub enum Error {
    /// The referenced sandbox has no section in the engine config.
    #[error("sandbox '{0}' not found in engine config")]
    SandboxNotFound(String),

    /// The engine's INI config could not be located. Usually means Sandboxie
    /// is not installed, or is installed somewhere other than the configured
    /// install dir.
    #[error("could not locate Sandboxie.ini; is Sandboxie installed?")]
    ConfigNotFound,

    /// The engine config (or the tool's own config file) failed to parse.
    #[error("malformed configuration: {0}")]
    ConfigFormat(String),

    /// The engine launcher exited abnormally or produced output this layer
    /// cannot parse. Carries the raw exit status and captured streams; the
    /// invocation is never retried since launcher actions are not assumed
    /// idempotent.
    #[error("engine launcher failure: {reason} (status {status:?})")]
    ExternalTool {
        reason: String,
        /// Launcher exit code; `None` when it was killed by a signal.
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
