//! Trim engine: physical pressure-driven eviction of clean entries, plus
//! the MM paging-out request that restores headroom (spec §4.6).

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::Ordering;

use super::entry::Entry;
use super::iface::MmInterface;
use super::lists::GlobalLists;
use super::pressure::{self, Counters};
use super::reclaim::{destroy_entries, drain_and_reclaim};
use super::unmap::trim_virtual;

/// **trim(timid)** (spec §4.6). Evicts clean entries under physical
/// pressure, then always runs the unmap engine and considers asking MM to
/// page out working-set memory. Returns the number of entries destroyed.
pub fn trim(mm: &dyn MmInterface, lists: &GlobalLists, counters: &Counters, timid: bool) -> usize {
    let mut destroy: Vec<Arc<Entry>> = Vec::new();
    let physical_pages = counters.physical_pages.load(Ordering::Acquire);

    if pressure::is_too_big(mm, physical_pages) {
        let total = mm.total_physical_pages();
        let retreat = pressure::physical_retreat(total);
        let minimum = pressure::physical_minimum(total);
        let free = mm.free_physical_pages();

        let mut target = retreat.saturating_sub(free);
        if physical_pages.saturating_sub(target) < minimum {
            target = physical_pages.saturating_sub(minimum);
        }
        let target = target as usize;

        // Colder list first.
        let unmapped_src = lists.drain_clean_unmapped();
        let (mut destroyed, leftovers, reclaimed) =
            drain_and_reclaim(unmapped_src, lists, Some(target), timid, counters);
        lists.append_clean_unmapped(leftovers);
        destroy.append(&mut destroyed);

        let remaining = target.saturating_sub(reclaimed);
        if remaining > 0 {
            let clean_src = lists.drain_clean();
            let (mut destroyed2, leftovers2, _reclaimed2) =
                drain_and_reclaim(clean_src, lists, Some(remaining), timid, counters);
            lists.append_clean(leftovers2);
            destroy.append(&mut destroyed2);
        }
    }

    let destroyed_count = destroy.len();
    destroy_entries(destroy, mm, lists, counters);

    trim_virtual(mm, lists, counters, timid);

    let total = mm.total_physical_pages();
    let minimum_target = pressure::physical_minimum_target(total);
    let physical_pages = counters.physical_pages.load(Ordering::Acquire);
    if physical_pages < minimum_target {
        let _ = mm.request_paging_out(minimum_target - physical_pages);
    }

    destroyed_count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::mock::{MockFile, MockMm};

    fn mk_clean_owner(lists: &GlobalLists, offset: u64, phys: u64) -> Arc<Entry> {
        let file: Arc<dyn super::super::iface::CacheableFile> = Arc::new(MockFile::new_file());
        let e = Arc::new(Entry::new(file.clone(), offset, phys, None));
        file.cache_state().state.write().tree.insert(offset, e.clone());
        e.release_ref_no_relist();
        lists.push_clean_tail(&e);
        e
    }

    #[test]
    fn pressure_driven_trim_respects_minimum_s5() {
        let mm = MockMm::new(1000, 50, 0, 0); // minimum=70, trigger=100, retreat=150
        let lists = GlobalLists::new();
        let counters = Counters::new();
        for i in 0..500u64 {
            mk_clean_owner(&lists, i * 0x1000, 0x100000 + i * 0x1000);
            counters.physical_pages.fetch_add(1, Ordering::Relaxed);
            counters.entry_count.fetch_add(1, Ordering::Relaxed);
        }

        let destroyed = trim(&mm, &lists, &counters, false);

        assert!(destroyed <= 100, "must not free more than retreat - free");
        assert!(counters.physical_pages.load(Ordering::Relaxed) >= 70);
    }

    #[test]
    fn skip_eviction_when_not_too_big() {
        let mm = MockMm::new(1000, 500, 0, 0);
        let lists = GlobalLists::new();
        let counters = Counters::new();
        mk_clean_owner(&lists, 0, 0x5000);
        counters.physical_pages.fetch_add(1, Ordering::Relaxed);

        let destroyed = trim(&mm, &lists, &counters, false);
        assert_eq!(destroyed, 0);
        assert_eq!(lists.clean_len(), 1);
    }
}
