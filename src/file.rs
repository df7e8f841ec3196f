//! Data model: raw intake files, staged files and validator verdicts.

use crate::error::TransportError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A candidate file as handed over by the intake source.
///
/// `size_bytes` is the size the source *declares* for the file (the number a
/// file picker reports). The size check trusts it; the structure probe looks
/// at `content`.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFile {
    pub name: String,
    pub size_bytes: u64,
    pub media_type: String,
    pub content: Bytes,
}

impl RawFile {
    /// Build a file whose declared size is the content length.
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        content: impl Into<Bytes>,
    ) -> Self {
        let content = content.into();
        Self {
            name: name.into(),
            size_bytes: content.len() as u64,
            media_type: media_type.into(),
            content,
        }
    }

    /// Shorthand for an `application/pdf` file.
    pub fn pdf(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self::new(name, crate::config::PDF_MEDIA_TYPE, content)
    }

    /// Override the declared size.
    pub fn with_declared_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }
}

impl fmt::Debug for RawFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawFile")
            .field("name", &self.name)
            .field("size_bytes", &self.size_bytes)
            .field("media_type", &self.media_type)
            .field("content", &format_args!("<{} bytes>", self.content.len()))
            .finish()
    }
}

/// Shared, immutable reference to a raw file.
pub type FileHandle = Arc<RawFile>;

/// Stable identity of a staged file for the whole session.
///
/// Ids are assigned monotonically by the registry and never reused, so a
/// removal never changes what any other id refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(u64);

impl FileId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle status of a staged file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Passed validation; eligible for selection and upload.
    Ready,
    /// An attempt is in flight.
    Uploading,
    /// The transport acknowledged the file.
    Success,
    /// Validation or the last upload attempt failed.
    Error,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileStatus::Ready => "ready",
            FileStatus::Uploading => "uploading",
            FileStatus::Success => "success",
            FileStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Classification of an `Error` status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    // validation-time
    SizeExceeded,
    SecurityRejected,
    StructurallyCorrupt,
    // upload-time
    NetworkError,
    ServerError,
    Timeout,
}

impl FailureKind {
    /// Upload-time failures may be retried with a fresh attempt; validation
    /// failures are final until the file is staged again.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            FailureKind::NetworkError | FailureKind::ServerError | FailureKind::Timeout
        )
    }
}

impl From<&TransportError> for FailureKind {
    fn from(e: &TransportError) -> Self {
        match e {
            TransportError::Network(_) => FailureKind::NetworkError,
            TransportError::Server { .. } => FailureKind::ServerError,
            TransportError::Timeout { .. } => FailureKind::Timeout,
        }
    }
}

/// The validator's result for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub handle: FileHandle,
    pub status: FileStatus,
    pub message: String,
    pub failure: Option<FailureKind>,
}

impl Verdict {
    pub fn ready(handle: FileHandle) -> Self {
        Self {
            handle,
            status: FileStatus::Ready,
            message: crate::messages::READY.to_string(),
            failure: None,
        }
    }

    pub fn rejected(handle: FileHandle, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            handle,
            status: FileStatus::Error,
            message: message.into(),
            failure: Some(kind),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == FileStatus::Ready
    }
}

/// A file tracked by the registry.
///
/// Status, message and failure kind are private and only change together
/// through [`StagedFile::set_status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedFile {
    id: FileId,
    handle: FileHandle,
    status: FileStatus,
    message: String,
    failure: Option<FailureKind>,
}

impl StagedFile {
    pub(crate) fn from_verdict(id: FileId, verdict: Verdict) -> Self {
        Self {
            id,
            handle: verdict.handle,
            status: verdict.status,
            message: verdict.message,
            failure: verdict.failure,
        }
    }

    pub fn id(&self) -> FileId {
        self.id
    }

    pub fn handle(&self) -> &FileHandle {
        &self.handle
    }

    pub fn name(&self) -> &str {
        &self.handle.name
    }

    pub fn status(&self) -> FileStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn failure(&self) -> Option<FailureKind> {
        self.failure
    }

    pub fn is_ready(&self) -> bool {
        self.status == FileStatus::Ready
    }

    /// True for an `Error` left behind by a failed upload attempt.
    pub fn is_retryable(&self) -> bool {
        self.status == FileStatus::Error && self.failure.is_some_and(FailureKind::is_retryable)
    }

    pub(crate) fn set_status(
        &mut self,
        status: FileStatus,
        message: impl Into<String>,
        failure: Option<FailureKind>,
    ) {
        self.status = status;
        self.message = message.into();
        self.failure = failure;
    }

    /// Serialisable snapshot without the file content.
    pub fn summary(&self) -> FileSummary {
        FileSummary {
            id: self.id,
            name: self.handle.name.clone(),
            size_bytes: self.handle.size_bytes,
            status: self.status,
            message: self.message.clone(),
            failure: self.failure,
        }
    }
}

/// JSON-friendly view of a [`StagedFile`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSummary {
    pub id: FileId,
    pub name: String,
    pub size_bytes: u64,
    pub status: FileStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}
