//! Global counters, tunable constants, pressure predicates, and the
//! read-only statistics snapshot.

use core::sync::atomic::{AtomicU64, Ordering};

use super::iface::{CcResult, CcStatus, MmInterface};

/// Flush engine: largest single write-through batch.
pub const FLUSH_MAX: usize = 128 * 1024;
/// Flush engine: how many contiguous clean pages a streak may tolerate
/// before being forced to break a buffer.
pub const MAX_CLEAN_STREAK: u32 = 4;
/// Worker: delay between becoming dirty and the worker waking to clean up.
pub const CLEAN_DELAY_MS: u64 = 5000;
/// Block allocator growth increment (entries per expansion).
pub const BLOCK_ALLOC_EXPANSION: usize = 64;

/// Physical headroom thresholds, as percent of total physical memory.
pub const PHYSICAL_TRIGGER_PERCENT: u64 = 10;
pub const PHYSICAL_RETREAT_PERCENT: u64 = 15;
pub const PHYSICAL_MINIMUM_PERCENT: u64 = 7;
pub const PHYSICAL_MINIMUM_TARGET_PERCENT: u64 = 33;
/// Low-memory clean-page minimum: min(10% of physical, 256).
pub const LOW_MEMORY_CLEAN_MINIMUM_CAP: u64 = 256;

/// Virtual-memory pressure thresholds depend on total VM size.
pub const SMALL_VM_THRESHOLD: u64 = 4 * 1024 * 1024 * 1024;
pub const SMALL_VM_TRIGGER: u64 = 512 * 1024 * 1024;
pub const SMALL_VM_RETREAT: u64 = 896 * 1024 * 1024;
pub const LARGE_VM_TRIGGER: u64 = 1024 * 1024 * 1024;
pub const LARGE_VM_RETREAT: u64 = 3 * 1024 * 1024 * 1024;

/// Too-dirty divisor: dirty is "too much" at half of the ideal size.
pub const TOO_DIRTY_DIVISOR: u64 = 2;

/// Global accounting counters (spec §3 invariant 7). Transient drift of
/// O(concurrency) between flag transitions and these counters is expected;
/// assertions in tests tolerate slack <= 16.
pub struct Counters {
    pub physical_pages: AtomicU64,
    pub mapped_pages: AtomicU64,
    pub dirty_pages: AtomicU64,
    pub mapped_dirty_pages: AtomicU64,
    pub entry_count: AtomicU64,
    pub last_clean_time: AtomicU64,
}

impl Counters {
    pub const fn new() -> Self {
        Self {
            physical_pages: AtomicU64::new(0),
            mapped_pages: AtomicU64::new(0),
            dirty_pages: AtomicU64::new(0),
            mapped_dirty_pages: AtomicU64::new(0),
            entry_count: AtomicU64::new(0),
            last_clean_time: AtomicU64::new(0),
        }
    }
}

/// Versioned, read-only snapshot of cache state (`get_statistics`, §6).
#[derive(Debug, Clone, Copy)]
pub struct CacheStatistics {
    pub version: u32,
    pub entry_count: u64,
    pub trigger: u64,
    pub retreat: u64,
    pub minimum_target: u64,
    pub physical_pages: u64,
    pub dirty_pages: u64,
    pub mapped_pages: u64,
    pub mapped_dirty_pages: u64,
    pub last_clean_time: u64,
}

pub const CACHE_STATISTICS_VERSION: u32 = 1;

/// `trigger = total * 10%`.
pub fn physical_trigger(total_physical: u64) -> u64 {
    total_physical * PHYSICAL_TRIGGER_PERCENT / 100
}

/// `retreat = total * 15%`.
pub fn physical_retreat(total_physical: u64) -> u64 {
    total_physical * PHYSICAL_RETREAT_PERCENT / 100
}

/// `minimum = total * 7%`.
pub fn physical_minimum(total_physical: u64) -> u64 {
    total_physical * PHYSICAL_MINIMUM_PERCENT / 100
}

/// `minimum_target = total * 33%`.
pub fn physical_minimum_target(total_physical: u64) -> u64 {
    total_physical * PHYSICAL_MINIMUM_TARGET_PERCENT / 100
}

pub fn low_memory_clean_minimum(total_physical: u64) -> u64 {
    core::cmp::min(total_physical * 10 / 100, LOW_MEMORY_CLEAN_MINIMUM_CAP)
}

pub fn virtual_thresholds(total_virtual: u64) -> (u64, u64) {
    if total_virtual < SMALL_VM_THRESHOLD {
        (SMALL_VM_TRIGGER, SMALL_VM_RETREAT)
    } else {
        (LARGE_VM_TRIGGER, LARGE_VM_RETREAT)
    }
}

/// **Too big?** `physical_pages > minimum ∧ free_physical < trigger`.
pub fn is_too_big(mm: &dyn MmInterface, physical_pages: u64) -> bool {
    let total = mm.total_physical_pages();
    let minimum = physical_minimum(total);
    let trigger = physical_trigger(total);
    physical_pages > minimum && mm.free_physical_pages() < trigger
}

/// **Too mapped?** `free_virtual < virtual_trigger ∨ MM reports a warning`.
pub fn is_too_mapped(mm: &dyn MmInterface) -> bool {
    let (trigger, _retreat) = virtual_thresholds(mm.total_virtual_memory());
    mm.free_virtual_memory() < trigger || mm.virtual_warning_level().is_some()
}

/// **Too dirty?** `dirty_pages >= ideal_size / 2`, where
/// `ideal_size = physical_pages +/- (free_physical - retreat)`.
pub fn is_too_dirty(mm: &dyn MmInterface, counters: &Counters, is_worker: bool) -> bool {
    if is_worker {
        return false;
    }
    let total = mm.total_physical_pages();
    let retreat = physical_retreat(total);
    let physical_pages = counters.physical_pages.load(Ordering::Acquire);
    let free = mm.free_physical_pages();
    let ideal_size = if free >= retreat {
        physical_pages.saturating_add(free - retreat)
    } else {
        physical_pages.saturating_sub(retreat - free)
    };
    let dirty = counters.dirty_pages.load(Ordering::Acquire);
    dirty >= ideal_size / TOO_DIRTY_DIVISOR
}

/// **get_statistics()** (spec §4.12): rejects a caller built against a
/// different `CacheStatistics` layout before touching any counter.
pub fn snapshot(mm: &dyn MmInterface, counters: &Counters, expected_version: u32) -> CcResult<CacheStatistics> {
    if expected_version != CACHE_STATISTICS_VERSION {
        return Err(CcStatus::InvalidParameter);
    }
    let total = mm.total_physical_pages();
    Ok(CacheStatistics {
        version: CACHE_STATISTICS_VERSION,
        entry_count: counters.entry_count.load(Ordering::Acquire),
        trigger: physical_trigger(total),
        retreat: physical_retreat(total),
        minimum_target: physical_minimum_target(total),
        physical_pages: counters.physical_pages.load(Ordering::Acquire),
        dirty_pages: counters.dirty_pages.load(Ordering::Acquire),
        mapped_pages: counters.mapped_pages.load(Ordering::Acquire),
        mapped_dirty_pages: counters.mapped_dirty_pages.load(Ordering::Acquire),
        last_clean_time: counters.last_clean_time.load(Ordering::Acquire),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::mock::MockMm;

    #[test]
    fn too_big_respects_minimum_and_trigger() {
        let mm = MockMm::new(1000, 50, 0, 0);
        assert!(is_too_big(&mm, 500));
        let mm2 = MockMm::new(1000, 500, 0, 0);
        assert!(!is_too_big(&mm2, 500));
    }

    #[test]
    fn too_mapped_on_warning_even_with_free_virtual() {
        let mut mm = MockMm::new(1000, 500, 10_000_000_000, 9_000_000_000);
        assert!(!is_too_mapped(&mm));
        mm.virtual_warning = Some(1);
        assert!(is_too_mapped(&mm));
    }

    #[test]
    fn worker_is_exempt_from_too_dirty() {
        let mm = MockMm::new(1000, 50, 0, 0);
        let counters = Counters::new();
        counters.dirty_pages.store(900, Ordering::Relaxed);
        assert!(!is_too_dirty(&mm, &counters, true));
    }

    #[test]
    fn snapshot_rejects_mismatched_version() {
        let mm = MockMm::new(1000, 500, 0, 0);
        let counters = Counters::new();
        assert_eq!(snapshot(&mm, &counters, CACHE_STATISTICS_VERSION).unwrap().version, CACHE_STATISTICS_VERSION);
        assert_eq!(snapshot(&mm, &counters, CACHE_STATISTICS_VERSION + 1), Err(CcStatus::InvalidParameter));
    }
}
