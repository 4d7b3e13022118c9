//! Per-file index: an offset-ordered map of `Entry`s plus that file's dirty
//! list, behind the file's shared/exclusive lock (spec §3, §4.2).
//!
//! `BTreeMap<u64, Arc<Entry>>` stands in for the intrusive red-black tree
//! `rtl::avl` models elsewhere in this kernel: the toolchain cannot be run
//! in this environment, and an owning collection is the safer choice for
//! code nobody can compile-check before it ships (see DESIGN.md).

extern crate alloc;

use alloc::collections::{BTreeMap, VecDeque};
use alloc::sync::Arc;

use spin::RwLock;

use super::entry::{Entry, ListKind};

/// The tree + dirty list for one file, guarded together by one
/// shared/exclusive lock (spec §5: "file lock").
#[derive(Default)]
pub struct FileTreeState {
    pub tree: BTreeMap<u64, Arc<Entry>>,
    pub dirty_list: VecDeque<Arc<Entry>>,
}

impl FileTreeState {
    pub fn new() -> Self {
        Self {
            tree: BTreeMap::new(),
            dirty_list: VecDeque::new(),
        }
    }

    pub fn push_dirty_tail(&mut self, entry: &Arc<Entry>) {
        entry.set_list_kind(ListKind::FileDirty);
        self.dirty_list.push_back(entry.clone());
    }

    pub fn remove_dirty(&mut self, entry: &Arc<Entry>) {
        if let Some(pos) = self.dirty_list.iter().position(|e| Arc::ptr_eq(e, entry)) {
            self.dirty_list.remove(pos);
        }
        if entry.list_kind() == ListKind::FileDirty {
            entry.set_list_kind(ListKind::Detached);
        }
    }

    /// Take the whole dirty list (whole-file flush mode, spec §4.5).
    pub fn take_dirty_list(&mut self) -> VecDeque<Arc<Entry>> {
        for e in self.dirty_list.iter() {
            e.set_list_kind(ListKind::Detached);
        }
        core::mem::take(&mut self.dirty_list)
    }

    pub fn lower_bound(&self, offset: u64) -> impl Iterator<Item = (&u64, &Arc<Entry>)> {
        self.tree.range(offset..)
    }
}

/// Embedded in any `CacheableFile` implementor: the per-file cache state
/// plus the identity the cache index keys lookups by.
pub struct FileCacheState {
    pub state: RwLock<FileTreeState>,
}

impl FileCacheState {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(FileTreeState::new()),
        }
    }
}

impl Default for FileCacheState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::iface::CacheableFile;
    use crate::cc::mock::MockFile;

    #[test]
    fn dirty_list_round_trips() {
        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        let e = Arc::new(Entry::new(file, 0, 0x1000, None));
        let mut state = FileTreeState::new();
        state.push_dirty_tail(&e);
        assert_eq!(state.dirty_list.len(), 1);
        state.remove_dirty(&e);
        assert!(state.dirty_list.is_empty());
    }

    #[test]
    fn lower_bound_is_offset_ordered() {
        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        let mut state = FileTreeState::new();
        for off in [0u64, 0x1000, 0x3000, 0x7000] {
            let e = Arc::new(Entry::new(file.clone(), off, off, None));
            state.tree.insert(off, e);
        }
        let offsets: alloc::vec::Vec<u64> = state.lower_bound(0x1000).map(|(k, _)| *k).collect();
        assert_eq!(offsets, alloc::vec![0x1000, 0x3000, 0x7000]);
    }
}
