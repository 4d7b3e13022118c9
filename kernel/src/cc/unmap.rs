//! Unmap (virtual trim) engine: virtual-pressure-driven release of kernel
//! VAs from clean entries, keeping the frames (spec §4.7).

extern crate alloc;

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::entry::Entry;
use super::iface::MmInterface;
use super::lists::GlobalLists;
use super::pressure::{self, Counters};
use super::PAGE_SIZE;

/// **trim_virtual(timid)** (spec §4.7).
pub fn trim_virtual(mm: &dyn MmInterface, lists: &GlobalLists, counters: &Counters, timid: bool) {
    if lists.clean_lru_is_empty() || !pressure::is_too_mapped(mm) {
        return;
    }

    let (trigger, retreat) = pressure::virtual_thresholds(mm.total_virtual_memory());
    let free_virtual = mm.free_virtual_memory();
    let mapped_clean_estimate = lists.clean_len() as u64;

    let mut target = retreat.saturating_sub(free_virtual).min(mapped_clean_estimate);
    if target == 0 && mm.virtual_warning_level().is_some() {
        // Build headroom against fragmentation even with nothing urgent.
        target = retreat.saturating_sub(trigger).min(mapped_clean_estimate);
    }
    if target == 0 {
        return;
    }

    let source = lists.drain_clean();
    let mut leftovers = VecDeque::new();
    let mut collected_vas: Vec<u64> = Vec::new();

    for entry in source {
        if (collected_vas.len() as u64) >= target {
            leftovers.push_back(entry);
            continue;
        }
        if entry.refcount() > 0 {
            // Referenced: leave detached, the ref owner reinserts it.
            continue;
        }
        if entry.is_dirty() {
            // Raced with a dirty-marker: it already moved to a dirty list.
            continue;
        }
        if !entry.is_mapped() {
            lists.move_to_unmapped(&entry);
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

        match remove_va(&entry, counters) {
            Some(va) => {
                drop(guard);
                entry.release_ref_no_relist();
                collected_vas.push(va);
                lists.move_to_unmapped(&entry);
            }
            None => {
                drop(guard);
                entry.release_ref_no_relist();
                leftovers.push_back(entry);
            }
        }
    }

    lists.append_clean(leftovers);

    for (start, len) in coalesce_runs(collected_vas) {
        mm.unmap_address(start, len);
    }
}

/// **remove_va(entry)** (spec §4.7 step 4): succeed only if `refcount == 1
/// ∧ not DIRTY`; for non-owners, also require the backing's `refcount == 1
/// ∧ not DIRTY`. Clears `MAPPED` on the owner and returns the VA that was
/// mapped.
fn remove_va(entry: &Arc<Entry>, counters: &Counters) -> Option<u64> {
    if entry.refcount() != 1 || entry.is_dirty() {
        return None;
    }
    let owner = entry.owner();
    if !Arc::ptr_eq(&owner, entry) {
        if owner.refcount() != 1 || owner.is_dirty() {
            return None;
        }
    }
    owner.clear_mapped(counters)
}

/// Coalesce contiguous virtual addresses into `(start, byte_len)` runs so
/// the caller can issue one unmap per run for locality (spec §4.7 step 5).
fn coalesce_runs(mut vas: Vec<u64>) -> Vec<(u64, usize)> {
    vas.sort_unstable();
    let mut runs = Vec::new();
    let mut iter = vas.into_iter();
    if let Some(first) = iter.next() {
        let mut start = first;
        let mut len = PAGE_SIZE;
        for va in iter {
            if va == start + len as u64 {
                len += PAGE_SIZE;
            } else {
                runs.push((start, len));
                start = va;
                len = PAGE_SIZE;
            }
        }
        runs.push((start, len));
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::mock::{MockFile, MockMm};

    #[test]
    fn coalesce_runs_merges_contiguous() {
        let runs = coalesce_runs(alloc::vec![0x1000, 0x2000, 0x3000, 0x9000]);
        assert_eq!(runs, alloc::vec![(0x1000, 3 * PAGE_SIZE), (0x9000, PAGE_SIZE)]);
    }

    #[test]
    fn trim_virtual_unmaps_and_moves_to_unmapped_lru() {
        let mut mm = MockMm::new(1000, 900, 1_000_000, 100_000);
        mm.virtual_warning = Some(1);
        let lists = GlobalLists::new();
        let counters = Counters::new();

        let file: Arc<dyn super::super::iface::CacheableFile> = Arc::new(MockFile::new_file());
        let e = Arc::new(Entry::new(file.clone(), 0, 0x4000, None));
        file.cache_state().state.write().tree.insert(0, e.clone());
        e.set_va(0xffff_9000_0000_0000, &counters);
        e.release_ref_no_relist();
        lists.push_clean_tail(&e);

        trim_virtual(&mm, &lists, &counters, false);

        assert!(!e.is_mapped());
        assert_eq!(e.list_kind(), crate::cc::entry::ListKind::CleanUnmappedLru);
    }
}
