//! Cache Manager (cc)
//!
//! The Cache Manager provides a unified page cache shared by the storage
//! stack and the file system: block-device and file entries covering the
//! same on-disk bytes collapse onto one physical frame, a dirty tracker
//! and flush engine provide at-most-one-writer write-back, and a single
//! background worker trims and unmaps under physical/virtual pressure.
//!
//! # Architecture
//!
//! - `entry`: the per-page descriptor (`DIRTY`/`PAGE_OWNER`/`MAPPED` flags,
//!   refcount, backing pointer) shared by every other module here.
//! - `index`: per-file offset-ordered tree + dirty list, behind the file's
//!   own lock.
//! - `lists`: the three global LRU/removal lists, behind one lock.
//! - `link`: the block-device/file frame-sharing protocol.
//! - `dirty`: `mark_dirty`/`mark_clean`.
//! - `flush`: range/whole-file write-back with clean-streak coalescing.
//! - `reclaim`: the list-removal helper shared by `trim` and the worker.
//! - `trim` / `unmap`: physical and virtual pressure-driven eviction.
//! - `evict`: forced eviction on truncate/delete.
//! - `worker`: the CLEAN/DIRTY background-maintenance state machine.
//! - `pressure`: tunables, counters, and the pressure predicates all of the
//!   above consult.
//! - `iface`: the `MmInterface`/`CacheableFile` contracts this module
//!   consumes; `mock` implements them for tests.

extern crate alloc;

pub mod dirty;
pub mod entry;
pub mod evict;
pub mod flush;
pub mod iface;
pub mod index;
pub mod link;
pub mod lists;
#[cfg(test)]
pub mod mock;
pub mod pressure;
pub mod reclaim;
pub mod trim;
pub mod unmap;
pub mod worker;

use alloc::sync::Arc;
use core::sync::atomic::Ordering;

use spin::Once;

use entry::Entry;
use evict::EvictFlags;
use flush::FlushFlags;
use iface::{CacheableFile, CacheableKind, CcResult, CcStatus, IoBuffer, MmInterface, NoVfsFlusher, VfsFlusher};
use lists::GlobalLists;
use pressure::{CacheStatistics, Counters};
use worker::Worker;

/// Cache page size. The cache only ever deals in whole pages.
pub const PAGE_SIZE: usize = crate::mm::PAGE_SIZE;

/// `MmInterface` wired to this kernel's real physical-page allocator.
/// Frames are identity-mapped here (`mm::pfn::mm_allocate_page` hands back
/// `pfn_index * PAGE_SIZE` as a directly dereferenceable pointer), so the
/// VA-mapping side of this adapter is bookkeeping only: there is no
/// separate kernel cache VA allocator to ask for or release an address
/// from. Virtual pressure is instead tracked against a fixed budget this
/// module reserves for cache mappings.
pub struct KernelMm;

/// Virtual address space this module treats as reserved for cache
/// mappings, in the absence of a dedicated kernel cache VA allocator. Used
/// only for `is_too_mapped`'s free/total ratio; it does not bound any real
/// allocation.
const KERNEL_CACHE_VA_BUDGET: u64 = 2 * 1024 * 1024 * 1024;

impl MmInterface for KernelMm {
    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn page_shift(&self) -> usize {
        crate::mm::PAGE_SHIFT
    }

    fn total_physical_pages(&self) -> u64 {
        crate::mm::mm_get_stats().total_pages as u64
    }

    fn free_physical_pages(&self) -> u64 {
        let stats = crate::mm::mm_get_stats();
        (stats.free_pages + stats.zeroed_pages) as u64
    }

    fn total_virtual_memory(&self) -> u64 {
        KERNEL_CACHE_VA_BUDGET
    }

    fn free_virtual_memory(&self) -> u64 {
        let mapped_bytes = CACHE.counters.mapped_pages.load(Ordering::Acquire) * PAGE_SIZE as u64;
        KERNEL_CACHE_VA_BUDGET.saturating_sub(mapped_bytes)
    }

    fn virtual_warning_level(&self) -> Option<u32> {
        None
    }

    fn request_paging_out(&self, _target: u64) -> CcResult<()> {
        Ok(())
    }

    fn free_physical_page(&self, phys: u64) {
        let pfn_index = (phys / PAGE_SIZE as u64) as usize;
        unsafe {
            crate::mm::mm_free_page(pfn_index);
        }
    }

    fn unmap_address(&self, _va: u64, _len: usize) {
        // Identity-mapped: nothing beyond the MAPPED/va bookkeeping the
        // entry itself already cleared.
    }

    fn set_page_cache_entry_for_physical_address(&self, _phys: u64, _present: bool) {}
}

/// The cache orchestrator: the three global lists, the accounting
/// counters, and the one background worker, tied together with the
/// `MmInterface` handle `init()` supplies. A single `'static` instance
/// (`CACHE`) backs every public function in this module.
pub struct Cache {
    lists: GlobalLists,
    counters: Counters,
    worker: Worker,
    mm: Once<Arc<dyn MmInterface>>,
    /// Registered by the VFS once it comes up (`init_vfs_flusher`); reads
    /// as `NoVfsFlusher` before that, since nothing can be dirty before any
    /// file object exists.
    vfs: Once<Arc<dyn VfsFlusher>>,
}

impl Cache {
    const fn new() -> Self {
        Self {
            lists: GlobalLists::new(),
            counters: Counters::new(),
            worker: Worker::new(),
            mm: Once::new(),
            vfs: Once::new(),
        }
    }

    fn mm(&self) -> &dyn MmInterface {
        match self.mm.get() {
            Some(mm) => mm.as_ref(),
            // Every entry point here runs after `cc::init()`; reaching this
            // without it is a boot-order bug, not a recoverable condition.
            None => crate::bugcheck!(crate::ke::bugcheck::codes::CRITICAL_PROCESS_DIED),
        }
    }

    fn vfs(&self) -> &dyn VfsFlusher {
        match self.vfs.get() {
            Some(vfs) => vfs.as_ref(),
            None => &NoVfsFlusher,
        }
    }
}

pub static CACHE: Cache = Cache::new();

/// Bring up the cache manager. Called once during kernel init, with no
/// arguments to wire (matches every other subsystem's `init()` here);
/// `KernelMm` is constructed internally since this module is the only
/// thing that needs it.
pub fn init() {
    CACHE.mm.call_once(|| Arc::new(KernelMm) as Arc<dyn MmInterface>);
    CACHE.worker.init();
    crate::serial_println!("[CC] Cache Manager initialized");
}

/// Register the VFS's `flush_file_objects` entry point (spec §4.9) once the
/// file-system layer has a dirty-file-object list to walk. Safe to skip
/// entirely if no such layer is wired up: the worker then treats every
/// pass's flush step as trivially successful.
pub fn init_vfs_flusher(vfs: Arc<dyn VfsFlusher>) {
    CACHE.vfs.call_once(|| vfs);
}

/// Entry point for the dedicated cache-manager worker thread (spec §4.9:
/// "a single background task"). Zero-argument `fn()` to match
/// `ke::init::create_thread`'s signature; loops forever and never returns.
///
/// # Safety
/// Must only run as the body of a kernel thread created after `cc::init()`.
pub fn worker_thread_entry() {
    unsafe { CACHE.worker.run_forever(CACHE.mm(), CACHE.vfs(), &CACHE.lists, &CACHE.counters) }
}

/// **lookup(file, offset)** (spec §4.2): look up an existing entry without
/// creating one. Takes a reference the caller must release.
pub fn lookup(file: &Arc<dyn CacheableFile>, offset: u64) -> Option<Arc<Entry>> {
    let state = file.cache_state();
    let guard = state.state.read();
    let entry = guard.tree.get(&offset).cloned();
    if let Some(e) = &entry {
        e.add_ref();
    }
    entry
}

/// **create_or_lookup(file, va, phys, offset, link)** (spec §4.2/§6): look
/// up under a read lock first; on a miss, create a new owning entry for
/// `phys`, apply the linking rule (§4.3) against `link` if supplied, attach
/// `va` if the caller already has the page mapped, and insert it, placing
/// it on the clean LRU. Returns the entry with a reference held by the
/// caller, and whether this call created it.
pub fn create_or_lookup(
    file: &Arc<dyn CacheableFile>,
    va: Option<u64>,
    phys: u64,
    offset: u64,
    link: Option<&Arc<Entry>>,
) -> (Arc<Entry>, bool) {
    if let Some(existing) = lookup(file, offset) {
        return (existing, false);
    }

    let state = file.cache_state();
    let mut guard = state.state.write();
    if let Some(existing) = guard.tree.get(&offset) {
        existing.add_ref();
        return (existing.clone(), false);
    }

    // `Entry::new`'s initial refcount of 1 is this call's returned
    // reference; nothing else holds one yet.
    let entry = Arc::new(Entry::new(file.clone(), offset, phys, None));

    if let Some(link) = link {
        let link_kind = link.file.kind();
        let _ = link::apply_link_on_insert(&entry, file.kind(), link, link_kind, &CACHE.counters);
    }

    guard.tree.insert(offset, entry.clone());
    drop(guard);

    CACHE.lists.push_clean_tail(&entry);
    CACHE.counters.entry_count.fetch_add(1, Ordering::AcqRel);
    if entry.is_owner() {
        CACHE.counters.physical_pages.fetch_add(1, Ordering::AcqRel);
    }
    if let Some(va) = va {
        entry.set_va(va, &CACHE.counters);
    }
    (entry, true)
}

/// **create_and_insert(file, va, phys, offset, link)** (spec §4.2/§4.3/§6):
/// like `create_or_lookup`, but the caller already knows no entry exists
/// (e.g. a fresh non-cached read just populated `phys`) and may supply a
/// pre-existing entry on the opposite side of the linking protocol
/// (`link`) to apply at insertion time.
pub fn create_and_insert(
    file: &Arc<dyn CacheableFile>,
    va: Option<u64>,
    phys: u64,
    offset: u64,
    link: Option<&Arc<Entry>>,
) -> CcResult<Arc<Entry>> {
    let entry = Arc::new(Entry::new(file.clone(), offset, phys, None));

    if let Some(link) = link {
        let link_kind = link.file.kind();
        link::apply_link_on_insert(&entry, file.kind(), link, link_kind, &CACHE.counters)?;
    }

    let state = file.cache_state();
    let mut guard = state.state.write();
    guard.tree.insert(offset, entry.clone());
    drop(guard);

    CACHE.lists.push_clean_tail(&entry);
    CACHE.counters.entry_count.fetch_add(1, Ordering::AcqRel);
    if entry.is_owner() {
        CACHE.counters.physical_pages.fetch_add(1, Ordering::AcqRel);
    }
    if let Some(va) = va {
        entry.set_va(va, &CACHE.counters);
    }
    Ok(entry)
}

/// **copy_and_cache_iobuffer(file, file_offset, iobuf)** (spec §6): for the
/// non-cached read/write path, clamp an I/O buffer's page list to what the
/// cache actually has entries for at `file_offset` and hand back how many
/// of its pages line up with live cache entries, so the caller can decide
/// which pages it still needs to fetch from the device itself. The cache
/// never copies page bytes (that crosses into the block I/O path, out of
/// scope here); this is bookkeeping only.
pub fn copy_and_cache_iobuffer(file: &Arc<dyn CacheableFile>, file_offset: u64, iobuf: &IoBuffer) -> usize {
    let state = file.cache_state();
    let guard = state.state.read();
    let mut matched = 0usize;
    for (i, &phys) in iobuf.phys_pages.iter().enumerate() {
        let offset = file_offset + (i * PAGE_SIZE) as u64;
        match guard.tree.get(&offset) {
            Some(entry) if entry.owner().phys() == phys => matched += 1,
            _ => break,
        }
    }
    matched
}

/// **flush(file, offset, size, flags, page_cap)** (spec §4.5).
pub fn flush(
    file: &Arc<dyn CacheableFile>,
    offset: u64,
    size: Option<u64>,
    flags: FlushFlags,
    page_cap: Option<usize>,
) -> CcResult<()> {
    flush::flush(file, offset, size, flags, page_cap, &CACHE.lists, &CACHE.counters)
}

/// **evict(file, offset, flags)** (spec §4.11): drop this file's cached
/// pages at or beyond `offset`, best-effort (referenced entries skipped)
/// unless `flags` includes `EvictFlags::DELETE` (referenced entries are
/// force-removed from the tree and queued on the removal list for the
/// worker to finish later).
pub fn evict(file: &Arc<dyn CacheableFile>, offset: u64, flags: EvictFlags) -> usize {
    evict::evict(file, offset, flags, CACHE.mm(), &CACHE.lists, &CACHE.counters)
}

/// **mark_dirty(entry)** (spec §4.4).
pub fn mark_dirty(entry: &Arc<Entry>) -> bool {
    dirty::mark_dirty(entry, &CACHE.lists, &CACHE.counters)
}

/// **mark_clean(entry, move_to_clean_list)** (spec §4.4).
pub fn mark_clean(entry: &Arc<Entry>, move_to_clean_list: bool) -> bool {
    let state = entry.file.cache_state();
    dirty::mark_clean(entry, state, move_to_clean_list, &CACHE.lists, &CACHE.counters)
}

/// **can_link(entry, file)** (spec §4.3).
pub fn can_link(entry_kind: CacheableKind, file_kind: CacheableKind, file_linkable: bool) -> bool {
    link::can_link(entry_kind, file_kind, file_linkable)
}

/// **link_entries(lower, upper)** (spec §4.3): collapse `upper`'s frame
/// onto `lower`, freeing `upper`'s former frame and unmapping its former VA
/// through `MmInterface` if the collapse actually ran.
pub fn link_entries(lower: &Arc<Entry>, upper: &Arc<Entry>) -> CcResult<()> {
    let lower_kind = lower.file.kind();
    let upper_kind = upper.file.kind();
    let upper_linkable = upper.file.is_linkable_type();
    match link::link_entries(lower, lower_kind, upper, upper_kind, upper_linkable, &CACHE.counters)? {
        link::LinkOutcome::AlreadyLinked => Ok(()),
        link::LinkOutcome::Linked {
            displaced_phys,
            displaced_va,
        } => {
            let mm = CACHE.mm();
            if let Some(va) = displaced_va {
                mm.unmap_address(va, PAGE_SIZE);
            }
            mm.set_page_cache_entry_for_physical_address(displaced_phys, false);
            mm.free_physical_page(displaced_phys);
            CACHE.counters.physical_pages.fetch_sub(1, Ordering::AcqRel);
            Ok(())
        }
    }
}

/// **set_va(entry, va)** (spec §4.1/§6).
pub fn set_va(entry: &Arc<Entry>, va: u64) -> bool {
    entry.set_va(va, &CACHE.counters)
}

/// **get_va(entry)** (spec §4.1/§6).
pub fn get_va(entry: &Arc<Entry>) -> Option<u64> {
    entry.get_va()
}

/// **get_phys(entry)** (spec §6): the physical frame backing this entry,
/// redirecting through the backing owner if it is a non-owner.
pub fn get_phys(entry: &Arc<Entry>) -> u64 {
    entry.owner().phys()
}

/// **get_offset(entry)** (spec §6).
pub fn get_offset(entry: &Arc<Entry>) -> u64 {
    entry.offset
}

/// **is_iobuffer_page_cache_backed(iobuf, phys)** (spec §6): whether `phys`
/// is one of the pages this I/O buffer covers.
pub fn is_iobuffer_page_cache_backed(iobuf: &IoBuffer, phys: u64) -> bool {
    iobuf.contains(phys)
}

/// **is_too_dirty()** (spec §4.9/§6), from the caller's (non-worker)
/// perspective.
pub fn is_too_dirty() -> bool {
    pressure::is_too_dirty(CACHE.mm(), &CACHE.counters, false)
}

/// **schedule_worker()** (spec §4.9): wake the background worker, arming
/// its timer on the CLEAN->DIRTY transition.
pub fn schedule_worker() -> bool {
    CACHE.worker.schedule()
}

/// **trim(timid)** (spec §4.6/§4.7): run one trim pass synchronously
/// (e.g. from a low-memory callback rather than waiting for the worker).
pub fn trim(timid: bool) -> usize {
    trim::trim(CACHE.mm(), &CACHE.lists, &CACHE.counters, timid)
}

/// **get_statistics(expected_version)** (spec §6/§4.12): `InvalidParameter`
/// if the caller was built against a different `CacheStatistics` layout.
pub fn get_statistics(expected_version: u32) -> CcResult<CacheStatistics> {
    pressure::snapshot(CACHE.mm(), &CACHE.counters, expected_version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::MockFile;

    fn setup() -> Arc<dyn CacheableFile> {
        Arc::new(MockFile::new_file())
    }

    #[test]
    fn create_or_lookup_creates_once_then_reuses() {
        let file = setup();
        let (e1, created1) = create_or_lookup(&file, None, 0x4000, 0, None);
        assert!(created1);
        assert_eq!(e1.refcount(), 1); // the call's own returned reference

        let (e2, created2) = create_or_lookup(&file, None, 0x9999, 0, None);
        assert!(!created2);
        assert!(Arc::ptr_eq(&e1, &e2));
    }

    #[test]
    fn create_or_lookup_attaches_supplied_va() {
        let file = setup();
        let (e, created) = create_or_lookup(&file, Some(0xffff_9000_0000_4000), 0x4000, 0, None);
        assert!(created);
        assert!(e.is_mapped());
        assert_eq!(e.get_va(), Some(0xffff_9000_0000_4000));
    }

    #[test]
    fn copy_and_cache_iobuffer_counts_matching_prefix() {
        let file = setup();
        let (e0, _) = create_or_lookup(&file, None, 0x10000, 0, None);
        let (e1, _) = create_or_lookup(&file, None, 0x11000, PAGE_SIZE as u64, None);
        let _ = (&e0, &e1);

        let pages = [0x10000u64, 0x11000u64, 0x22222u64];
        let iobuf = IoBuffer::new(&pages);
        assert_eq!(copy_and_cache_iobuffer(&file, 0, &iobuf), 2);
    }

    #[test]
    fn mark_dirty_then_is_too_dirty_reflects_counters() {
        let file = setup();
        let (e, _) = create_or_lookup(&file, None, 0x4000, 0, None);
        assert!(mark_dirty(&e));
        assert!(e.is_dirty());
    }

    /// R2: `create_or_lookup` with the same `(file, offset)` twice yields
    /// one tree entry and two references, with `created` true exactly
    /// once.
    #[test]
    fn create_or_lookup_is_idempotent_r2() {
        let file = setup();
        let (e1, created1) = create_or_lookup(&file, None, 0x5000, 0x2000, None);
        let (e2, created2) = create_or_lookup(&file, None, 0xdead, 0x2000, None);

        assert!(created1);
        assert!(!created2);
        assert!(Arc::ptr_eq(&e1, &e2));
        assert_eq!(e1.refcount(), 2, "two callers, two references");
        assert_eq!(file.cache_state().state.read().tree.len(), 1);
    }

    /// P9: a read through the cache after a successful `flush` observes
    /// exactly the bytes the writer was asked to persist — the mock's
    /// `perform_non_cached_write` stands in for the block I/O path, and
    /// what it received is what a read-back via the device would return.
    #[test]
    fn read_after_write_observes_flushed_bytes_p9() {
        use flush::FlushFlags;

        let mock = Arc::new(MockFile::new_file());
        let file: Arc<dyn CacheableFile> = mock.clone();
        let (e, _) = create_or_lookup(&file, None, 0x3000, 0, None);
        mock.write_phys(0x3000, b"HELLO-CACHE");

        assert!(mark_dirty(&e));
        flush(&file, 0, None, FlushFlags::empty(), None).unwrap();

        let calls = mock.writer_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 0);
        assert_eq!(&calls[0].1[..11], b"HELLO-CACHE");
        assert!(!e.is_dirty());
    }
}
