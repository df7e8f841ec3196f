//! Observer trait for intake and upload lifecycle events.
//!
//! Inject an [`Arc<dyn PipelineObserver>`] via
//! [`crate::config::PipelineConfigBuilder::observer`] to be told about each
//! file as it is staged and each upload attempt as it starts and ends.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf_upload::{FileId, PipelineConfig, PipelineObserver};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingObserver {
//!     uploaded: AtomicUsize,
//! }
//!
//! impl PipelineObserver for CountingObserver {
//!     fn on_upload_complete(&self, _id: FileId, name: &str) {
//!         let done = self.uploaded.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{name} uploaded ({done} so far)");
//!     }
//! }
//!
//! let config = PipelineConfig::builder()
//!     .observer(Arc::new(CountingObserver { uploaded: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use crate::file::{FileId, StagedFile};
use std::sync::Arc;

/// Called by the orchestrator as files move through the pipeline.
///
/// Upload callbacks may fire concurrently from different tasks when several
/// attempts are in flight; implementations must synchronise their own state.
/// All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    /// Called once per intake batch, after media-type filtering.
    ///
    /// # Arguments
    /// * `accepted`: files that will be validated
    /// * `ignored`: files dropped for their media type
    fn on_intake_start(&self, accepted: usize, ignored: usize) {
        let _ = (accepted, ignored);
    }

    /// Called for each file once its batch has landed in the registry.
    fn on_file_staged(&self, file: &StagedFile) {
        let _ = file;
    }

    /// Called right before the transport is invoked.
    fn on_upload_start(&self, id: FileId, name: &str) {
        let _ = (id, name);
    }

    /// Called when the transport acknowledged the file.
    fn on_upload_complete(&self, id: FileId, name: &str) {
        let _ = (id, name);
    }

    /// Called when the attempt failed or timed out.
    fn on_upload_error(&self, id: FileId, name: &str, message: &str) {
        let _ = (id, name, message);
    }
}

/// A no-op observer.
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Convenience alias matching the type stored in [`crate::config::PipelineConfig`].
pub type Observer = Arc<dyn PipelineObserver>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
    }

    impl PipelineObserver for Tracking {
        fn on_upload_start(&self, _id: FileId, _name: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_upload_complete(&self, _id: FileId, _name: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_upload_error(&self, _id: FileId, _name: &str, _message: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_observer_does_not_panic() {
        let o = NoopObserver;
        o.on_intake_start(2, 1);
        o.on_upload_start(FileId::new(1), "a.pdf");
        o.on_upload_complete(FileId::new(1), "a.pdf");
        o.on_upload_error(FileId::new(2), "b.pdf", "Upload timed out.");
    }

    #[test]
    fn tracking_observer_counts() {
        let o = Tracking::default();
        o.on_upload_start(FileId::new(1), "a.pdf");
        o.on_upload_start(FileId::new(2), "b.pdf");
        o.on_upload_complete(FileId::new(1), "a.pdf");
        o.on_upload_error(FileId::new(2), "b.pdf", "Server error: 500");
        assert_eq!(o.starts.load(Ordering::SeqCst), 2);
        assert_eq!(o.completes.load(Ordering::SeqCst), 1);
        assert_eq!(o.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_observer_works() {
        let o: Observer = Arc::new(NoopObserver);
        o.on_intake_start(0, 0);
    }
}
