//! Session state and the event reducer that is its only writer.
//!
//! Every mutation of the registry or the selection is an [`Event`] passed to
//! [`SessionState::apply`]. Concurrent validation and upload tasks never
//! touch the collections directly; they report back with an event and the
//! reducer decides, atomically, whether it still applies.
//!
//! Each upload attempt is tagged with an [`AttemptId`]. A completion only
//! lands if its entry still exists and is still `Uploading` under that same
//! attempt; anything else (late completion after a timeout already settled
//! the entry, completion for a removed file) is ignored.

use crate::error::{TransportError, UploadError};
use crate::file::{FailureKind, FileId, FileStatus, Verdict};
use crate::messages;
use crate::pipeline::transport::AttemptOutcome;
use crate::registry::FileRegistry;
use crate::selection::SelectionSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identity of one upload attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(u64);

impl AttemptId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    /// One intake batch, all verdicts at once.
    Staged(Vec<Verdict>),
    SelectionToggled(FileId),
    SelectionCleared,
    Removed(FileId),
    /// Start an attempt for a `Ready` file.
    UploadStarted(FileId),
    /// Start a fresh attempt for a file whose last upload failed.
    RetryStarted(FileId),
    UploadFinished {
        id: FileId,
        attempt: AttemptId,
        outcome: AttemptOutcome,
    },
}

/// Why an event had no effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ignored {
    /// The file is not in a status the event applies to.
    NotEligible,
    /// The file was removed while the attempt was in flight.
    Removed,
    /// The attempt was already settled or superseded.
    Stale,
}

/// What an applied event changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    Staged(Vec<FileId>),
    Selection { id: FileId, selected: bool },
    SelectionCleared(Vec<FileId>),
    Removed { id: FileId, cancelled_upload: bool },
    UploadStarted { id: FileId, attempt: AttemptId },
    Status {
        id: FileId,
        status: FileStatus,
        message: String,
    },
    Ignored { id: Option<FileId>, reason: Ignored },
}

#[derive(Debug)]
struct InFlight {
    attempt: AttemptId,
    cancel: CancellationToken,
}

#[derive(Debug, Default)]
pub struct SessionState {
    registry: FileRegistry,
    selection: SelectionSet,
    in_flight: HashMap<FileId, InFlight>,
    next_attempt: u64,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &FileRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Cancellation token of the attempt in flight for `id`, if any.
    pub fn cancel_token(&self, id: FileId) -> Option<CancellationToken> {
        self.in_flight.get(&id).map(|f| f.cancel.clone())
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn apply(&mut self, event: Event) -> Result<Change, UploadError> {
        match event {
            Event::Staged(verdicts) => Ok(Change::Staged(self.registry.append(verdicts))),

            Event::SelectionToggled(id) => {
                if !self.registry.require(id)?.is_ready() {
                    return Ok(ignored(id, Ignored::NotEligible));
                }
                let selected = self.selection.toggle(id);
                Ok(Change::Selection { id, selected })
            }

            Event::SelectionCleared => Ok(Change::SelectionCleared(self.selection.take())),

            Event::Removed(id) => {
                self.registry.remove(id)?;
                self.selection.remove(id);
                let cancelled_upload = match self.in_flight.remove(&id) {
                    Some(flight) => {
                        flight.cancel.cancel();
                        true
                    }
                    None => false,
                };
                Ok(Change::Removed {
                    id,
                    cancelled_upload,
                })
            }

            Event::UploadStarted(id) => {
                if !self.registry.require(id)?.is_ready() {
                    return Ok(ignored(id, Ignored::NotEligible));
                }
                self.start_attempt(id)
            }

            Event::RetryStarted(id) => {
                if !self.registry.require(id)?.is_retryable() {
                    return Ok(ignored(id, Ignored::NotEligible));
                }
                self.start_attempt(id)
            }

            Event::UploadFinished {
                id,
                attempt,
                outcome,
            } => self.finish_attempt(id, attempt, outcome),
        }
    }

    fn start_attempt(&mut self, id: FileId) -> Result<Change, UploadError> {
        self.next_attempt += 1;
        let attempt = AttemptId(self.next_attempt);
        self.registry
            .update_status(id, FileStatus::Uploading, messages::UPLOADING, None)?;
        self.selection.remove(id);
        self.in_flight.insert(
            id,
            InFlight {
                attempt,
                cancel: CancellationToken::new(),
            },
        );
        Ok(Change::UploadStarted { id, attempt })
    }

    fn finish_attempt(
        &mut self,
        id: FileId,
        attempt: AttemptId,
        outcome: AttemptOutcome,
    ) -> Result<Change, UploadError> {
        let Some(entry) = self.registry.get(id) else {
            debug!("Discarding completion for removed file {}", id);
            return Ok(ignored(id, Ignored::Removed));
        };
        let current = self.in_flight.get(&id).map(|f| f.attempt);
        if entry.status() != FileStatus::Uploading || current != Some(attempt) {
            debug!("Discarding stale completion for {} (attempt {:?})", id, attempt);
            return Ok(ignored(id, Ignored::Stale));
        }
        let (status, message, failure) = match outcome {
            // only removal cancels a token, so a live entry never returns to Ready
            AttemptOutcome::Cancelled => {
                debug!("Ignoring cancelled attempt {:?} for {}", attempt, id);
                return Ok(ignored(id, Ignored::Stale));
            }
            AttemptOutcome::Completed => {
                (FileStatus::Success, messages::UPLOADED.to_string(), None)
            }
            AttemptOutcome::Failed(TransportError::Timeout { .. }) => (
                FileStatus::Error,
                messages::TIMED_OUT.to_string(),
                Some(FailureKind::Timeout),
            ),
            AttemptOutcome::Failed(e) => {
                let kind = FailureKind::from(&e);
                (FileStatus::Error, e.to_string(), Some(kind))
            }
        };
        self.in_flight.remove(&id);
        self.registry
            .update_status(id, status, message.clone(), failure)?;
        Ok(Change::Status {
            id,
            status,
            message,
        })
    }
}

fn ignored(id: FileId, reason: Ignored) -> Change {
    Change::Ignored {
        id: Some(id),
        reason,
    }
}
