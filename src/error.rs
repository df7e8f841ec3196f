//! Error types for the edgequake-pdf-upload library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`UploadError`]: **Fatal to one call**: the caller named a file that is
//!   not staged, passed an invalid configuration, or a file could not be read
//!   from disk. Returned as `Err(UploadError)` from orchestrator and registry
//!   operations.
//!
//! * [`TransportError`]: **Per attempt**: one transfer failed (network,
//!   server rejection, deadline). It never escapes the orchestrator; it is
//!   folded into the file's status and message so every other file in the
//!   session carries on untouched.
//!
//! Validation failures are neither: they are verdicts, see
//! [`crate::file::FailureKind`].

use crate::file::FileId;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned to the caller of a session operation.
#[derive(Debug, Error)]
pub enum UploadError {
    // ── Caller contract ───────────────────────────────────────────────────
    /// No staged file carries this id (never staged, or already removed).
    #[error("No staged file with id {id}")]
    UnknownFile { id: FileId },

    /// A positional index is past the end of the registry.
    #[error("Index {index} is out of range (registry holds {len} files)")]
    IndexOutOfRange { index: usize, len: usize },

    // ── Input errors ──────────────────────────────────────────────────────
    /// A file given by path could not be read.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The HTTP client or scanner connection could not be set up.
    #[error("Transport setup failed: {0}")]
    Transport(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a single upload attempt failed.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum TransportError {
    /// The transfer mechanism itself failed (connect, reset, DNS…).
    #[error("Upload error occurred: {0}")]
    Network(String),

    /// The endpoint answered but rejected the content.
    #[error("Server error: {detail}")]
    Server { status: Option<u16>, detail: String },

    /// The attempt did not complete before its deadline.
    #[error("Upload timed out.")]
    Timeout { elapsed_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_file_display() {
        let e = UploadError::UnknownFile { id: FileId::new(7) };
        assert!(e.to_string().contains("#7"), "got: {e}");
    }

    #[test]
    fn index_out_of_range_display() {
        let e = UploadError::IndexOutOfRange { index: 4, len: 2 };
        let msg = e.to_string();
        assert!(msg.contains("Index 4"));
        assert!(msg.contains("2 files"));
    }

    #[test]
    fn timeout_has_its_own_wording() {
        let e = TransportError::Timeout { elapsed_ms: 15_000 };
        assert_eq!(e.to_string(), "Upload timed out.");
    }

    #[test]
    fn server_error_display() {
        let e = TransportError::Server {
            status: Some(503),
            detail: "HTTP 503 Service Unavailable".into(),
        };
        assert!(e.to_string().starts_with("Server error"));
        assert!(e.to_string().contains("503"));
    }
}
