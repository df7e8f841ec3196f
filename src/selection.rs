//! Set of files marked for a batch upload.
//!
//! The set performs no validity checks: keeping it limited to `Ready`
//! files is the job of [`crate::state::SessionState`].

use crate::file::FileId;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: BTreeSet<FileId>,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `id` if absent, remove it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, id: FileId) -> bool {
        if self.ids.remove(&id) {
            false
        } else {
            self.ids.insert(id);
            true
        }
    }

    /// Returns whether `id` was selected.
    pub fn remove(&mut self, id: FileId) -> bool {
        self.ids.remove(&id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Current members. Callers must not rely on the order.
    pub fn snapshot(&self) -> Vec<FileId> {
        self.ids.iter().copied().collect()
    }

    /// Empty the set, returning what it held.
    pub fn take(&mut self) -> Vec<FileId> {
        std::mem::take(&mut self.ids).into_iter().collect()
    }

    pub fn contains(&self, id: FileId) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_toggle_is_identity() {
        let mut s = SelectionSet::new();
        s.toggle(FileId::new(1));
        let before = s.clone();
        assert!(s.toggle(FileId::new(2)));
        assert!(!s.toggle(FileId::new(2)));
        assert_eq!(s, before);
    }

    #[test]
    fn take_empties() {
        let mut s = SelectionSet::new();
        s.toggle(FileId::new(3));
        s.toggle(FileId::new(1));
        let mut taken = s.take();
        taken.sort();
        assert_eq!(taken, vec![FileId::new(1), FileId::new(3)]);
        assert!(s.is_empty());
    }

    #[test]
    fn remove_reports_membership() {
        let mut s = SelectionSet::new();
        s.toggle(FileId::new(1));
        assert!(s.remove(FileId::new(1)));
        assert!(!s.remove(FileId::new(1)));
    }
}
