//! The orchestrator: user actions in, state changes out.
//!
//! [`Orchestrator`] wires intake to the [`Validator`], and selection to the
//! [`Transport`]. It is cheap to clone (all clones share one session) so
//! upload tasks can be spawned with their own handle.
//!
//! All mutations go through [`SessionState::apply`] under one mutex that is
//! never held across an `.await`. Validation and uploads run outside the
//! lock and come back as events.

use crate::config::PipelineConfig;
use crate::error::UploadError;
use crate::file::{FileHandle, FileId, FileStatus, RawFile, StagedFile};
use crate::pipeline::intake;
use crate::pipeline::probe::{LopdfProbe, StructureProbe};
use crate::pipeline::scan::{scanner_from_config, SecurityScanner};
use crate::pipeline::transport::{self, transport_from_config, Transport};
use crate::pipeline::validate::Validator;
use crate::state::{AttemptId, Change, Event, SessionState};
use crate::stream::{self as change_stream, ChangeStream};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of `upload_one` / `retry_upload`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReport {
    /// The file was not eligible; nothing changed.
    Skipped,
    /// The attempt settled the file.
    Finished { status: FileStatus, message: String },
    /// The file was removed (or the attempt superseded) before it finished.
    Discarded,
}

/// Uploads dispatched by [`Orchestrator::upload_selected`].
///
/// Dropping the batch does not cancel anything; the uploads keep running
/// and report through the registry either way.
#[derive(Debug)]
pub struct UploadBatch {
    tasks: Vec<(FileId, JoinHandle<Result<UploadReport, UploadError>>)>,
}

impl UploadBatch {
    pub fn ids(&self) -> Vec<FileId> {
        self.tasks.iter().map(|(id, _)| *id).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every dispatched upload.
    pub async fn join(self) -> Vec<(FileId, Result<UploadReport, UploadError>)> {
        let mut out = Vec::with_capacity(self.tasks.len());
        for (id, handle) in self.tasks {
            let res = handle
                .await
                .unwrap_or_else(|e| Err(UploadError::Internal(format!("upload task failed: {e}"))));
            out.push((id, res));
        }
        out
    }
}

struct Inner {
    config: PipelineConfig,
    validator: Validator,
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    changes: broadcast::Sender<Change>,
}

#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Build a session from explicit collaborators.
    pub fn new(
        config: PipelineConfig,
        scanner: Arc<dyn SecurityScanner>,
        probe: Arc<dyn StructureProbe>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let validator = Validator::new(&config, scanner, probe);
        let (changes, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                config,
                validator,
                transport,
                state: Mutex::new(SessionState::new()),
                changes,
            }),
        }
    }

    /// Build a session with the scanner and transport the config selects and
    /// the lopdf structure probe.
    pub fn from_config(config: PipelineConfig) -> Result<Self, UploadError> {
        let scanner: Arc<dyn SecurityScanner> = Arc::from(scanner_from_config(&config));
        let transport: Arc<dyn Transport> = Arc::from(transport_from_config(&config)?);
        Ok(Self::new(config, scanner, Arc::new(LopdfProbe), transport))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.inner.config
    }

    // ── Actions ──────────────────────────────────────────────────────────

    /// Filter, validate concurrently, then stage every verdict in one step.
    pub async fn intake(&self, files: Vec<RawFile>) -> Result<Vec<FileId>, UploadError> {
        let (accepted, ignored) = intake::accept(files, &self.inner.config.accepted_media_type);
        info!("Intake: {} accepted, {} ignored", accepted.len(), ignored);
        if let Some(ref obs) = self.inner.config.observer {
            obs.on_intake_start(accepted.len(), ignored);
        }
        if accepted.is_empty() {
            return Ok(Vec::new());
        }

        let verdicts = self.inner.validator.validate_batch(accepted).await;

        let ids = match self.dispatch(Event::Staged(verdicts))? {
            Change::Staged(ids) => ids,
            other => {
                return Err(UploadError::Internal(format!(
                    "staging produced {other:?}"
                )))
            }
        };

        if let Some(ref obs) = self.inner.config.observer {
            let state = self.lock();
            for id in &ids {
                if let Some(file) = state.registry().get(*id) {
                    obs.on_file_staged(file);
                }
            }
        }
        Ok(ids)
    }

    /// Toggle `id` in the selection if it is `Ready`; otherwise a no-op.
    ///
    /// Returns whether the file is selected afterwards.
    pub fn toggle_selection(&self, id: FileId) -> Result<bool, UploadError> {
        match self.dispatch(Event::SelectionToggled(id))? {
            Change::Selection { selected, .. } => Ok(selected),
            _ => Ok(false),
        }
    }

    /// Remove a file. An upload in flight for it is cancelled and its
    /// completion discarded.
    pub fn remove_file(&self, id: FileId) -> Result<StagedFile, UploadError> {
        let mut state = self.lock();
        let removed = state.registry().require(id)?.clone();
        let change = state.apply(Event::Removed(id))?;
        if let Change::Removed {
            cancelled_upload: true,
            ..
        } = change
        {
            info!("Removed {} mid-upload; attempt cancelled", id);
        }
        let _ = self.inner.changes.send(change);
        Ok(removed)
    }

    /// Upload one `Ready` file and wait for the outcome.
    ///
    /// Any other status is a no-op returning [`UploadReport::Skipped`].
    pub async fn upload_one(&self, id: FileId) -> Result<UploadReport, UploadError> {
        match self.begin(Event::UploadStarted(id))? {
            Some(started) => Ok(self.run_attempt(id, started).await),
            None => Ok(UploadReport::Skipped),
        }
    }

    /// Fresh attempt for a file whose last upload failed.
    pub async fn retry_upload(&self, id: FileId) -> Result<UploadReport, UploadError> {
        match self.begin(Event::RetryStarted(id))? {
            Some(started) => Ok(self.run_attempt(id, started).await),
            None => Ok(UploadReport::Skipped),
        }
    }

    /// Dispatch an independent upload for every selected file and clear the
    /// selection without waiting for any of them.
    pub fn upload_selected(&self) -> UploadBatch {
        let ids = match self.dispatch(Event::SelectionCleared) {
            Ok(Change::SelectionCleared(ids)) => ids,
            _ => Vec::new(),
        };
        info!("Dispatching {} uploads", ids.len());

        let tasks = ids
            .into_iter()
            .map(|id| {
                let this = self.clone();
                (id, tokio::spawn(async move { this.upload_one(id).await }))
            })
            .collect();
        UploadBatch { tasks }
    }

    // ── Views ────────────────────────────────────────────────────────────

    /// Snapshot of every staged file, in intake order.
    pub fn files(&self) -> Vec<StagedFile> {
        self.lock().registry().iter().cloned().collect()
    }

    pub fn file(&self, id: FileId) -> Option<StagedFile> {
        self.lock().registry().get(id).cloned()
    }

    /// Currently selected ids, in no particular order.
    pub fn selection(&self) -> Vec<FileId> {
        self.lock().selection().snapshot()
    }

    /// Id at a 0-based display position.
    pub fn id_at(&self, index: usize) -> Result<FileId, UploadError> {
        self.lock().registry().id_at(index)
    }

    /// Upload attempts currently in flight.
    pub fn in_flight(&self) -> usize {
        self.lock().in_flight()
    }

    /// Stream of every change applied from now on.
    pub fn subscribe(&self) -> ChangeStream {
        change_stream::from_receiver(self.inner.changes.subscribe())
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one event and broadcast the change while still holding the lock,
    /// so subscribers see changes in apply order.
    fn dispatch(&self, event: Event) -> Result<Change, UploadError> {
        let mut state = self.lock();
        let change = state.apply(event)?;
        let _ = self.inner.changes.send(change.clone());
        Ok(change)
    }

    /// Apply an upload-start event; on success return what the attempt needs.
    fn begin(&self, event: Event) -> Result<Option<Started>, UploadError> {
        let mut state = self.lock();
        let change = state.apply(event)?;
        let started = match change {
            Change::UploadStarted { id, attempt } => {
                let file = state.registry().require(id)?.handle().clone();
                let cancel = state.cancel_token(id).ok_or_else(|| {
                    UploadError::Internal(format!("no cancellation token for {id}"))
                })?;
                Some(Started {
                    attempt,
                    file,
                    cancel,
                })
            }
            _ => None,
        };
        let _ = self.inner.changes.send(change);
        Ok(started)
    }

    async fn run_attempt(&self, id: FileId, started: Started) -> UploadReport {
        let Started {
            attempt,
            file,
            cancel,
        } = started;
        let observer = self.inner.config.observer.clone();
        if let Some(ref obs) = observer {
            obs.on_upload_start(id, &file.name);
        }

        let outcome = transport::attempt(
            self.inner.transport.as_ref(),
            &file,
            self.inner.config.upload_timeout(),
            &cancel,
        )
        .await;

        let change = self.dispatch(Event::UploadFinished {
            id,
            attempt,
            outcome,
        });

        match change {
            Ok(Change::Status { status, message, .. }) => {
                if let Some(ref obs) = observer {
                    match status {
                        FileStatus::Success => obs.on_upload_complete(id, &file.name),
                        FileStatus::Error => obs.on_upload_error(id, &file.name, &message),
                        _ => {}
                    }
                }
                UploadReport::Finished { status, message }
            }
            Ok(other) => {
                debug!("Attempt {:?} for {} discarded: {:?}", attempt, id, other);
                UploadReport::Discarded
            }
            Err(e) => {
                warn!("Could not record outcome for {}: {}", id, e);
                UploadReport::Discarded
            }
        }
    }
}

struct Started {
    attempt: AttemptId,
    file: FileHandle,
    cancel: CancellationToken,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::messages;
    use crate::pipeline::probe::minimal_pdf;
    use crate::pipeline::scan::NoopScanner;
    use async_trait::async_trait;

    struct Ack;

    #[async_trait]
    impl Transport for Ack {
        async fn send(&self, _file: &FileHandle) -> Result<(), TransportError> {
            Ok(())
        }
    }

    fn session() -> Orchestrator {
        Orchestrator::new(
            PipelineConfig::default(),
            Arc::new(NoopScanner),
            Arc::new(LopdfProbe),
            Arc::new(Ack),
        )
    }

    #[tokio::test]
    async fn intake_then_upload_one() {
        let o = session();
        let ids = o
            .intake(vec![RawFile::pdf("a.pdf", minimal_pdf())])
            .await
            .unwrap();
        let report = o.upload_one(ids[0]).await.unwrap();
        assert_eq!(
            report,
            UploadReport::Finished {
                status: FileStatus::Success,
                message: messages::UPLOADED.to_string()
            }
        );
        assert_eq!(o.in_flight(), 0);
    }

    #[tokio::test]
    async fn upload_of_success_is_skipped() {
        let o = session();
        let id = o
            .intake(vec![RawFile::pdf("a.pdf", minimal_pdf())])
            .await
            .unwrap()[0];
        o.upload_one(id).await.unwrap();
        assert_eq!(o.upload_one(id).await.unwrap(), UploadReport::Skipped);
    }

    #[tokio::test]
    async fn remove_unknown_is_error() {
        let o = session();
        assert!(matches!(
            o.remove_file(FileId::new(1)),
            Err(UploadError::UnknownFile { .. })
        ));
    }
}
