//! Streaming view of session changes.
//!
//! [`crate::Orchestrator::subscribe`] returns a [`ChangeStream`] that yields
//! every [`Change`] the reducer applies, in the order it applied them. Uploads
//! started by `upload_selected` finish in any order; watching this stream is
//! how a caller learns about them without polling.
//!
//! A subscriber that falls more than `event_capacity` changes behind skips
//! the changes it missed (logged at `warn`).

use crate::state::Change;
use std::pin::Pin;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

/// A boxed stream of applied changes.
pub type ChangeStream = Pin<Box<dyn Stream<Item = Change> + Send>>;

pub(crate) fn from_receiver(rx: broadcast::Receiver<Change>) -> ChangeStream {
    let s = BroadcastStream::new(rx).filter_map(|item| match item {
        Ok(change) => Some(change),
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            warn!("Change subscriber lagged; skipped {} changes", n);
            None
        }
    });
    Box::pin(s)
}
