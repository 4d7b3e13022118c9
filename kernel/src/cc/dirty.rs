//! Dirty tracker: `mark_dirty` / `mark_clean` (spec §4.4).

extern crate alloc;

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use super::entry::{Entry, EntryFlags};
use super::index::FileCacheState;
use super::lists::GlobalLists;
use super::pressure::Counters;

/// **mark_dirty(E)**: redirect to the owner, CAS `DIRTY`, and on the 0->1
/// transition update counters, move the entry off any clean list and onto
/// its file's dirty list, and tell the VFS the file object is dirty.
/// Returns whether this call performed the transition.
pub fn mark_dirty(entry: &Arc<Entry>, lists: &GlobalLists, counters: &Counters) -> bool {
    loop {
        let target = entry.owner();
        let state = target.file.cache_state();
        let mut guard = state.state.write();

        // Re-check the backing link: it may have changed while we were
        // acquiring the exclusive lock.
        if !Arc::ptr_eq(&entry.owner(), &target) {
            drop(guard);
            continue;
        }

        if target.is_dirty() {
            return false;
        }

        let cur = target.flags.load(Ordering::Acquire);
        let new = cur | EntryFlags::DIRTY.bits();
        if target
            .flags
            .compare_exchange(cur, new, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            continue;
        }

        counters.dirty_pages.fetch_add(1, Ordering::AcqRel);
        if cur & EntryFlags::MAPPED.bits() != 0 {
            counters.mapped_dirty_pages.fetch_add(1, Ordering::AcqRel);
        }

        lists.remove(&target);
        guard.push_dirty_tail(&target);
        drop(guard);

        target.file.mark_dirty();
        return true;
    }
}

/// **mark_clean(E, move_to_clean_list)**: target must be an owner. CAS
/// clear `DIRTY`; on the 1->0 transition, decrement counters, remove from
/// the file's dirty list, and optionally reinsert at the clean LRU tail.
/// Returns whether this call performed the transition (spec §5: "at-most-
/// one-writer" — the winner here is the one allowed to write the page).
pub fn mark_clean(
    entry: &Arc<Entry>,
    state: &FileCacheState,
    move_to_clean_list: bool,
    lists: &GlobalLists,
    counters: &Counters,
) -> bool {
    if !entry.is_dirty() {
        return false;
    }
    // Invariant 2: DIRTY implies PAGE_OWNER, so this only trips on a bug.
    debug_assert!(entry.is_owner(), "cc: mark_clean target must be an owner");

    let mut guard = state.state.write();
    loop {
        let cur = entry.flags.load(Ordering::Acquire);
        if cur & EntryFlags::DIRTY.bits() == 0 {
            return false;
        }
        let new = cur & !EntryFlags::DIRTY.bits();
        if entry
            .flags
            .compare_exchange(cur, new, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            continue;
        }

        counters.dirty_pages.fetch_sub(1, Ordering::AcqRel);
        if cur & EntryFlags::MAPPED.bits() != 0 {
            counters.mapped_dirty_pages.fetch_sub(1, Ordering::AcqRel);
        }

        guard.remove_dirty(entry);
        drop(guard);

        if move_to_clean_list {
            lists.push_clean_tail(entry);
        }
        return true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::iface::CacheableFile;
    use crate::cc::mock::MockFile;
    use crate::cc::entry::ListKind;

    fn setup() -> (Arc<dyn CacheableFile>, Arc<Entry>, GlobalLists, Counters) {
        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        let entry = Arc::new(Entry::new(file.clone(), 0, 0x1000, None));
        file.cache_state().state.write().tree.insert(0, entry.clone());
        (file, entry, GlobalLists::new(), Counters::new())
    }

    #[test]
    fn mark_dirty_then_clean_round_trips_counters() {
        let (file, entry, lists, counters) = setup();
        assert!(mark_dirty(&entry, &lists, &counters));
        assert!(entry.is_dirty());
        assert_eq!(counters.dirty_pages.load(Ordering::Relaxed), 1);
        assert_eq!(entry.list_kind(), ListKind::FileDirty);

        assert!(!mark_dirty(&entry, &lists, &counters), "fast path on already-dirty");

        let state = file.cache_state();
        assert!(mark_clean(&entry, state, true, &lists, &counters));
        assert!(!entry.is_dirty());
        assert_eq!(counters.dirty_pages.load(Ordering::Relaxed), 0);
        assert_eq!(entry.list_kind(), ListKind::CleanLru);
    }

    #[test]
    fn mark_dirty_redirects_to_backing_owner() {
        let dev_file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_device());
        let owner = Arc::new(Entry::new(dev_file.clone(), 0, 0x1000, None));
        dev_file.cache_state().state.write().tree.insert(0, owner.clone());

        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        let nonowner = Arc::new(Entry::new(file.clone(), 0, 0x1000, None));
        nonowner.flags.fetch_and(!EntryFlags::PAGE_OWNER.bits(), Ordering::AcqRel);
        nonowner.set_backing(Some(owner.clone()));

        let lists = GlobalLists::new();
        let counters = Counters::new();
        assert!(mark_dirty(&nonowner, &lists, &counters));
        assert!(!nonowner.is_dirty());
        assert!(owner.is_dirty());
        assert_eq!(counters.dirty_pages.load(Ordering::Relaxed), 1);
    }
}
