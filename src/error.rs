//! Error types for psrun
//!
//! `RunError` covers a whole supervised run. Only `PermissionDenied` and
//! `ProcTimeout` are recovered inside the library (by the reporter); the
//! rest propagate to the caller. `SamplingError` never leaves the monitor
//! sampler: it is folded into a degraded snapshot instead.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    /// The OS refused to execute the command
    #[error("{0}")]
    PermissionDenied(String),

    /// The configured timeout elapsed before the command exited
    #[error("Timed out after {timeout_secs} secs: {command}")]
    ProcTimeout { timeout_secs: f64, command: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl RunError {
    /// Short name of the error kind, used when reporting at the process boundary
    pub fn kind(&self) -> &'static str {
        match self {
            RunError::PermissionDenied(_) => "PermissionDenied",
            RunError::ProcTimeout { .. } => "ProcTimeout",
            RunError::InvalidConfiguration(_) => "InvalidConfiguration",
            RunError::Io(_) => "IoError",
            RunError::Json(_) => "JsonError",
        }
    }

    /// Whether the reporter handles this error instead of propagating it
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RunError::PermissionDenied(_) | RunError::ProcTimeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RunError>;

/// Failure of a single host statistics collector
#[derive(Error, Debug)]
pub enum SamplingError {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[cfg(target_os = "linux")]
    #[error("{0}")]
    Proc(#[from] procfs::ProcError),

    #[error("{0} is not available on this platform")]
    Unsupported(&'static str),

    #[error("{0}")]
    Malformed(String),
}

impl SamplingError {
    pub fn kind(&self) -> &'static str {
        match self {
            SamplingError::Io(_) => "IoError",
            #[cfg(target_os = "linux")]
            SamplingError::Proc(_) => "ProcError",
            SamplingError::Unsupported(_) => "Unsupported",
            SamplingError::Malformed(_) => "Malformed",
        }
    }
}
