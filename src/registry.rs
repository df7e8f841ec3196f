//! Ordered registry of staged files.
//!
//! Entries are keyed by [`FileId`]. Ids grow monotonically, so iterating the
//! map in key order is intake order, and removing an entry leaves every other
//! id pointing at the same file.

use crate::error::UploadError;
use crate::file::{FailureKind, FileId, FileStatus, StagedFile, Verdict};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileRegistry {
    entries: BTreeMap<FileId, StagedFile>,
    next_id: u64,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry per verdict, preserving verdict order.
    pub fn append(&mut self, verdicts: Vec<Verdict>) -> Vec<FileId> {
        verdicts
            .into_iter()
            .map(|verdict| {
                self.next_id += 1;
                let id = FileId::new(self.next_id);
                self.entries.insert(id, StagedFile::from_verdict(id, verdict));
                id
            })
            .collect()
    }

    pub fn remove(&mut self, id: FileId) -> Result<StagedFile, UploadError> {
        self.entries
            .remove(&id)
            .ok_or(UploadError::UnknownFile { id })
    }

    /// Replace status, message and failure kind of one entry together.
    pub fn update_status(
        &mut self,
        id: FileId,
        status: FileStatus,
        message: impl Into<String>,
        failure: Option<FailureKind>,
    ) -> Result<(), UploadError> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(UploadError::UnknownFile { id })?;
        entry.set_status(status, message, failure);
        Ok(())
    }

    pub fn get(&self, id: FileId) -> Option<&StagedFile> {
        self.entries.get(&id)
    }

    /// Like [`get`](Self::get), but an unknown id is an error.
    pub fn require(&self, id: FileId) -> Result<&StagedFile, UploadError> {
        self.get(id).ok_or(UploadError::UnknownFile { id })
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Entries in intake order.
    pub fn iter(&self) -> impl Iterator<Item = &StagedFile> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current 0-based position of `id`.
    pub fn index_of(&self, id: FileId) -> Option<usize> {
        self.entries.keys().position(|k| *k == id)
    }

    /// Id currently at 0-based `index`.
    pub fn id_at(&self, index: usize) -> Result<FileId, UploadError> {
        self.entries
            .keys()
            .nth(index)
            .copied()
            .ok_or(UploadError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::RawFile;
    use crate::messages;
    use std::sync::Arc;

    fn verdict(name: &str) -> Verdict {
        Verdict::ready(Arc::new(RawFile::pdf(name, &b"%PDF"[..])))
    }

    #[test]
    fn append_preserves_order_and_grows() {
        let mut r = FileRegistry::new();
        let ids = r.append(vec![verdict("a"), verdict("b"), verdict("c")]);
        assert_eq!(r.len(), 3);
        let names: Vec<_> = r.iter().map(|f| f.name().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(ids.len(), 3);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn removal_does_not_shift_other_ids() {
        let mut r = FileRegistry::new();
        let ids = r.append(vec![verdict("a"), verdict("b"), verdict("c")]);
        r.remove(ids[0]).unwrap();
        assert_eq!(r.get(ids[1]).unwrap().name(), "b");
        assert_eq!(r.get(ids[2]).unwrap().name(), "c");
        // positions compact, ids do not
        assert_eq!(r.index_of(ids[2]), Some(1));
        assert_eq!(r.id_at(0).unwrap(), ids[1]);
    }

    #[test]
    fn ids_are_never_reused() {
        let mut r = FileRegistry::new();
        let first = r.append(vec![verdict("a")])[0];
        r.remove(first).unwrap();
        let second = r.append(vec![verdict("b")])[0];
        assert_ne!(first, second);
    }

    #[test]
    fn unknown_ids_are_reported() {
        let mut r = FileRegistry::new();
        let id = FileId::new(99);
        assert!(matches!(r.remove(id), Err(UploadError::UnknownFile { .. })));
        assert!(matches!(
            r.update_status(id, FileStatus::Error, "x", None),
            Err(UploadError::UnknownFile { .. })
        ));
        assert!(matches!(
            r.id_at(0),
            Err(UploadError::IndexOutOfRange { index: 0, len: 0 })
        ));
    }

    #[test]
    fn update_replaces_status_and_message_together() {
        let mut r = FileRegistry::new();
        let id = r.append(vec![verdict("a")])[0];
        r.update_status(
            id,
            FileStatus::Error,
            messages::TIMED_OUT,
            Some(FailureKind::Timeout),
        )
        .unwrap();
        let f = r.get(id).unwrap();
        assert_eq!(f.status(), FileStatus::Error);
        assert_eq!(f.message(), messages::TIMED_OUT);
        assert!(f.is_retryable());
    }
}
