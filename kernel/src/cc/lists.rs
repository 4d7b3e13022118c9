//! Global clean-LRU / clean-unmapped-LRU / removal lists (spec §3, §4.8).
//!
//! All three lists share one lock. Membership is mutually exclusive with a
//! per-file dirty list (`cc::index`); an entry's `ListKind` records which of
//! the four regimes it currently belongs to, with `Detached` as the empty
//! sentinel state (design note, spec §9).

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::sync::Arc;

use crate::ke::spinlock::SpinLock;

use super::entry::{Entry, ListKind};

struct Lists {
    clean_lru: VecDeque<Arc<Entry>>,
    clean_unmapped_lru: VecDeque<Arc<Entry>>,
    removal: VecDeque<Arc<Entry>>,
}

/// The three global lists, one lock (spec §5: "global list lock").
pub struct GlobalLists {
    inner: SpinLock<Lists>,
}

impl GlobalLists {
    pub fn new() -> Self {
        Self {
            inner: SpinLock::new(Lists {
                clean_lru: VecDeque::new(),
                clean_unmapped_lru: VecDeque::new(),
                removal: VecDeque::new(),
            }),
        }
    }

    /// Place a freshly created or looked-up entry on the clean LRU tail.
    /// Callers are responsible for not doing this for dirty entries.
    pub fn push_clean_tail(&self, entry: &Arc<Entry>) {
        let mut g = self.inner.lock();
        entry.set_list_kind(ListKind::CleanLru);
        g.clean_lru.push_back(entry.clone());
    }

    /// **release_ref** helper: if, under the list lock, the entry really is
    /// detached, unreferenced, and clean, insert it at the clean LRU tail.
    pub fn maybe_reinsert_clean(&self, entry: &Arc<Entry>) {
        let mut g = self.inner.lock();
        if entry.refcount() != 0 {
            return;
        }
        if entry.is_dirty() {
            return;
        }
        if entry.list_kind() != ListKind::Detached {
            return;
        }
        entry.set_list_kind(ListKind::CleanLru);
        g.clean_lru.push_back(entry.clone());
    }

    /// Remove `entry` from whichever of the three lists it is tagged as
    /// being on, if any. Used before moving an entry to the dirty list or
    /// off to the destroy path.
    pub fn remove(&self, entry: &Arc<Entry>) {
        let mut g = self.inner.lock();
        self.remove_locked(&mut g, entry);
    }

    fn remove_locked(&self, g: &mut Lists, entry: &Arc<Entry>) {
        match entry.list_kind() {
            ListKind::CleanLru => remove_by_ptr(&mut g.clean_lru, entry),
            ListKind::CleanUnmappedLru => remove_by_ptr(&mut g.clean_unmapped_lru, entry),
            ListKind::Removal => remove_by_ptr(&mut g.removal, entry),
            ListKind::Detached | ListKind::FileDirty => {}
        }
        entry.set_list_kind(ListKind::Detached);
    }

    pub fn push_removal_tail(&self, entry: &Arc<Entry>) {
        let mut g = self.inner.lock();
        self.remove_locked(&mut g, entry);
        entry.set_list_kind(ListKind::Removal);
        g.removal.push_back(entry.clone());
    }

    pub fn move_to_unmapped(&self, entry: &Arc<Entry>) {
        let mut g = self.inner.lock();
        self.remove_locked(&mut g, entry);
        entry.set_list_kind(ListKind::CleanUnmappedLru);
        g.clean_unmapped_lru.push_back(entry.clone());
    }

    /// Take the whole removal list, leaving it empty. Used by the worker's
    /// "drain removal list" step and by §4.8's list-removal helper.
    pub fn drain_removal(&self) -> VecDeque<Arc<Entry>> {
        let mut g = self.inner.lock();
        for e in g.removal.iter() {
            e.set_list_kind(ListKind::Detached);
        }
        core::mem::take(&mut g.removal)
    }

    pub fn drain_clean_unmapped(&self) -> VecDeque<Arc<Entry>> {
        let mut g = self.inner.lock();
        for e in g.clean_unmapped_lru.iter() {
            e.set_list_kind(ListKind::Detached);
        }
        core::mem::take(&mut g.clean_unmapped_lru)
    }

    pub fn drain_clean(&self) -> VecDeque<Arc<Entry>> {
        let mut g = self.inner.lock();
        for e in g.clean_lru.iter() {
            e.set_list_kind(ListKind::Detached);
        }
        core::mem::take(&mut g.clean_lru)
    }

    /// Re-append leftovers (§4.8 step 3: "re-append any leftovers at end").
    pub fn append_clean(&self, mut leftovers: VecDeque<Arc<Entry>>) {
        let mut g = self.inner.lock();
        for e in leftovers.iter() {
            e.set_list_kind(ListKind::CleanLru);
        }
        g.clean_lru.append(&mut leftovers);
    }

    pub fn append_clean_unmapped(&self, mut leftovers: VecDeque<Arc<Entry>>) {
        let mut g = self.inner.lock();
        for e in leftovers.iter() {
            e.set_list_kind(ListKind::CleanUnmappedLru);
        }
        g.clean_unmapped_lru.append(&mut leftovers);
    }

    pub fn append_removal(&self, mut leftovers: VecDeque<Arc<Entry>>) {
        let mut g = self.inner.lock();
        for e in leftovers.iter() {
            e.set_list_kind(ListKind::Removal);
        }
        g.removal.append(&mut leftovers);
    }

    pub fn clean_lru_is_empty(&self) -> bool {
        self.inner.lock().clean_lru.is_empty()
    }

    pub fn clean_len(&self) -> usize {
        self.inner.lock().clean_lru.len()
    }

    pub fn clean_unmapped_len(&self) -> usize {
        self.inner.lock().clean_unmapped_lru.len()
    }
}

impl Default for GlobalLists {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_by_ptr(list: &mut VecDeque<Arc<Entry>>, entry: &Arc<Entry>) {
    if let Some(pos) = list.iter().position(|e| Arc::ptr_eq(e, entry)) {
        list.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::mock::MockFile;

    fn mk(offset: u64) -> Arc<Entry> {
        let file: Arc<dyn super::super::iface::CacheableFile> = Arc::new(MockFile::new_file());
        Arc::new(Entry::new(file, offset, 0x1000, None))
    }

    #[test]
    fn push_and_remove_round_trips() {
        let lists = GlobalLists::new();
        let e = mk(0);
        lists.push_clean_tail(&e);
        assert_eq!(e.list_kind(), ListKind::CleanLru);
        assert_eq!(lists.clean_len(), 1);
        lists.remove(&e);
        assert_eq!(e.list_kind(), ListKind::Detached);
        assert_eq!(lists.clean_len(), 0);
    }

    #[test]
    fn maybe_reinsert_clean_skips_dirty_and_referenced() {
        let lists = GlobalLists::new();
        let e = mk(0);
        e.add_ref();
        lists.maybe_reinsert_clean(&e);
        assert_eq!(e.list_kind(), ListKind::Detached);
    }

    #[test]
    fn drain_is_empty_afterward() {
        let lists = GlobalLists::new();
        lists.push_clean_tail(&mk(0));
        lists.push_clean_tail(&mk(0x1000));
        let drained = lists.drain_clean();
        assert_eq!(drained.len(), 2);
        assert!(lists.clean_lru_is_empty());
    }
}
