//! Shared list-removal helper (spec §4.8), used by both removal-list
//! draining (the worker) and clean-list eviction (`cc::trim`).

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::dirty::mark_clean;
use super::entry::Entry;
use super::iface::MmInterface;
use super::lists::GlobalLists;
use super::pressure::Counters;
use super::PAGE_SIZE;

/// Drains `source` (already detached from its list by the caller) and, for
/// each candidate, either puts it back (referenced/raced-dirty), tears it
/// down and appends it to the returned destroy list, or leaves it on the
/// leftovers queue if `target` pages have already been reclaimed.
///
/// `timid`: try the file lock once and skip on failure rather than
/// blocking, so this can run on a thread that may already hold a file lock
/// higher in the call stack.
///
/// Returns `(destroy_list, leftovers, owners_reclaimed)`.
pub fn drain_and_reclaim(
    source: VecDeque<Arc<Entry>>,
    lists: &GlobalLists,
    target: Option<usize>,
    timid: bool,
    counters: &Counters,
) -> (Vec<Arc<Entry>>, VecDeque<Arc<Entry>>, usize) {
    let mut destroy = Vec::new();
    let mut leftovers = VecDeque::new();
    let mut reclaimed = 0usize;

    for entry in source {
        if let Some(t) = target {
            if reclaimed >= t {
                leftovers.push_back(entry);
                continue;
            }
        }

        if entry.refcount() > 0 {
            // Referenced: leave detached. `release_ref` will reinsert it.
            continue;
        }
        if entry.is_dirty() {
            // Raced with a dirty-marker: it already lives on the file's
            // dirty list, which will reinsert it onto a clean list later.
            continue;
        }

        entry.add_ref();
        let state = entry.file.cache_state();
        let guard = if timid {
            match state.state.try_write() {
                Some(g) => g,
                None => {
                    entry.release_ref_no_relist();
                    leftovers.push_back(entry);
                    continue;
                }
            }
        } else {
            state.state.write()
        };
        let mut guard = guard;

        if let Some(sections) = entry.file.image_sections() {
            match sections.unmap_image_section_list(entry.offset, Some(PAGE_SIZE as u64), true) {
                Ok(true) => {
                    // Page was found dirty: re-dirty in place, do not evict.
                    // `mark_dirty` places it on the file's dirty list itself.
                    drop(guard);
                    super::dirty::mark_dirty(&entry, lists, counters);
                    entry.release_ref_no_relist();
                    continue;
                }
                Ok(false) => {}
                Err(_) => {
                    // Propagate: roll back, leave the entry for the caller
                    // to put back on whichever list it came from.
                    drop(guard);
                    entry.release_ref_no_relist();
                    leftovers.push_back(entry);
                    continue;
                }
            }
        }

        let was_owner = entry.is_owner();
        mark_clean(&entry, state, false, lists, counters);
        guard.tree.remove(&entry.offset);
        drop(guard);

        // Drop the protective reference taken above without relisting: the
        // entry is leaving circulation for good, not going back on a list.
        entry.release_ref_no_relist();
        destroy.push(entry);
        if was_owner {
            reclaimed += 1;
        }
    }

    (destroy, leftovers, reclaimed)
}

/// Final step for any entry that has left every list for good: an owner
/// has any surviving VA mapping torn down before its frame goes back to MM
/// and its slot in `physical_pages` is released; a non-owner instead drops
/// the reference it held on its backing owner (which may now become
/// reclaimable itself, so that release goes through the normal
/// `release_ref` relisting path rather than `release_ref_no_relist`).
pub fn destroy_entries(destroy: Vec<Arc<Entry>>, mm: &dyn MmInterface, lists: &GlobalLists, counters: &Counters) {
    for entry in destroy {
        counters.entry_count.fetch_sub(1, core::sync::atomic::Ordering::AcqRel);
        if entry.is_owner() {
            if let Some(va) = entry.clear_mapped(counters) {
                mm.unmap_address(va, PAGE_SIZE);
            }
            let phys = entry.phys();
            mm.set_page_cache_entry_for_physical_address(phys, false);
            mm.free_physical_page(phys);
            counters.physical_pages.fetch_sub(1, core::sync::atomic::Ordering::AcqRel);
        } else {
            entry.owner().release_ref(lists);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::iface::CacheableFile;
    use crate::cc::mock::{MockFile, MockMm};

    #[test]
    fn destroy_entries_unmaps_still_mapped_owner_before_freeing() {
        let mm = MockMm::new(1000, 900, 0, 0);
        let lists = GlobalLists::new();
        let counters = Counters::new();

        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        let entry = Arc::new(Entry::new(file, 0, 0x4000, None));
        assert!(entry.set_va(0x7000, &counters));
        counters.physical_pages.fetch_add(1, core::sync::atomic::Ordering::Relaxed);

        destroy_entries(alloc::vec![entry], &mm, &lists, &counters);

        assert_eq!(mm.unmap_calls(), alloc::vec![(0x7000u64, PAGE_SIZE)]);
        assert_eq!(mm.freed_pages(), alloc::vec![0x4000u64]);
        assert_eq!(counters.mapped_pages.load(core::sync::atomic::Ordering::Relaxed), 0);
    }
}
