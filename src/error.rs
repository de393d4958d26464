//! Unified error model for the grid client core.
//! One enum covers the three failure classes: local path validation, connect
//! attempts (the only retryable class), and remote grant/query operations.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Which length limit a rejected path violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathLengthKind {
    FullPath,
    Dirname,
    Basename,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GridError {
    /// Raised locally before any remote call is issued.
    PathLength { kind: PathLengthKind, path: String, length: usize, limit: usize },
    /// Failure to establish a connection. `retryable` marks the transient
    /// network class that the session layer retries with bounded attempts.
    Connect { retryable: bool, message: String },
    /// Any failure from a grant/revoke/list/query call. Never retried by this
    /// crate; surfaced after the session is released.
    Remote { op: String, path: String, message: String },
}

impl GridError {
    pub fn path_length(kind: PathLengthKind, path: impl Into<String>, length: usize, limit: usize) -> Self {
        GridError::PathLength { kind, path: path.into(), length, limit }
    }

    pub fn connect(message: impl Into<String>, retryable: bool) -> Self {
        GridError::Connect { retryable, message: message.into() }
    }

    pub fn remote(op: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        GridError::Remote { op: op.into(), path: path.into(), message: message.into() }
    }

    /// True only for the transient connect class the session layer may retry.
    pub fn is_retryable_connect(&self) -> bool {
        matches!(self, GridError::Connect { retryable: true, .. })
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            GridError::PathLength { kind: PathLengthKind::FullPath, .. } => "path_too_long",
            GridError::PathLength { kind: PathLengthKind::Dirname, .. } => "dirname_too_long",
            GridError::PathLength { kind: PathLengthKind::Basename, .. } => "basename_too_long",
            GridError::Connect { .. } => "connect_failed",
            GridError::Remote { .. } => "remote_operation_failed",
        }
    }
}

impl Display for GridError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GridError::PathLength { path, length, limit, .. } => {
                write!(f, "{}: '{}' ({} > {})", self.kind_str(), path, length, limit)
            }
            GridError::Connect { retryable, message } => {
                write!(f, "{}: {} (retryable={})", self.kind_str(), message, retryable)
            }
            GridError::Remote { op, path, message } => {
                write!(f, "{}: {} on '{}': {}", self.kind_str(), op, path, message)
            }
        }
    }
}

impl std::error::Error for GridError {}

pub type GridResult<T> = Result<T, GridError>;

impl From<anyhow::Error> for GridError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: treat as a remote fault unless downcasted elsewhere
        GridError::Remote { op: "internal".into(), path: String::new(), message: err.to_string() }
    }
}
