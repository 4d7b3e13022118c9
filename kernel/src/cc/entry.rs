//! Cache entry: the per-page descriptor shared by the index, the global
//! lists, and the linking protocol.

extern crate alloc;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use super::iface::CacheableFile;

bitflags::bitflags! {
    /// Per-entry atomic flag bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EntryFlags: u32 {
        /// Content differs from the device; must be written back before eviction.
        const DIRTY = 0x0000_0001;
        /// This entry owns (and will free) its physical frame.
        const PAGE_OWNER = 0x0000_0002;
        /// `va` holds a live kernel mapping of the owner's frame.
        const MAPPED = 0x0000_0004;
    }
}

/// Which of the mutually-exclusive list regimes an entry currently belongs
/// to. "Detached" is the sentinel empty state; transitions are guarded by
/// the global list lock (see `cc::lists`) or the owning file's dirty list
/// lock (see `cc::index`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ListKind {
    Detached = 0,
    CleanLru = 1,
    CleanUnmappedLru = 2,
    Removal = 3,
    FileDirty = 4,
}

/// A cached page and its metadata.
///
/// Invariant 1 (spec): exactly one of `PAGE_OWNER` or `backing.is_some()`
/// holds. Invariant 6: a non-owner's `phys`/`va` mirror its backing entry's.
pub struct Entry {
    /// Owning file-object handle. The cache holds one logical reference
    /// through this `Arc`; it does not itself count toward `refcount`.
    pub file: Arc<dyn CacheableFile>,
    /// File/device offset, page-aligned.
    pub offset: u64,
    /// Physical address of the backing frame, page-aligned.
    phys: AtomicU64,
    /// Kernel virtual address currently mapping `phys`, or 0 if none.
    va: AtomicU64,
    /// Entry whose frame this one shares, if this entry is not an owner.
    backing: spin::Mutex<Option<Arc<Entry>>>,
    /// External reference count. The cache tree itself is not counted.
    refcount: AtomicU32,
    pub flags: AtomicU32,
    pub list_kind: AtomicU32,
}

/// Entries may be referenced concurrently by add_ref/release_ref and from
/// the linking protocol.
const MAX_REFCOUNT: u32 = 4096;

impl Entry {
    pub fn new(file: Arc<dyn CacheableFile>, offset: u64, phys: u64, va: Option<u64>) -> Self {
        Self {
            file,
            offset,
            phys: AtomicU64::new(phys),
            va: AtomicU64::new(va.unwrap_or(0)),
            backing: spin::Mutex::new(None),
            refcount: AtomicU32::new(1),
            flags: AtomicU32::new(EntryFlags::PAGE_OWNER.bits()),
            list_kind: AtomicU32::new(ListKind::Detached as u32),
        }
    }

    pub fn flags(&self) -> EntryFlags {
        EntryFlags::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }

    pub fn is_dirty(&self) -> bool {
        self.flags().contains(EntryFlags::DIRTY)
    }

    pub fn is_owner(&self) -> bool {
        self.flags().contains(EntryFlags::PAGE_OWNER)
    }

    pub fn is_mapped(&self) -> bool {
        self.flags().contains(EntryFlags::MAPPED)
    }

    pub fn refcount(&self) -> u32 {
        self.refcount.load(Ordering::Acquire)
    }

    pub fn list_kind(&self) -> ListKind {
        match self.list_kind.load(Ordering::Acquire) {
            1 => ListKind::CleanLru,
            2 => ListKind::CleanUnmappedLru,
            3 => ListKind::Removal,
            4 => ListKind::FileDirty,
            _ => ListKind::Detached,
        }
    }

    pub fn set_list_kind(&self, kind: ListKind) {
        self.list_kind.store(kind as u32, Ordering::Release);
    }

    pub fn backing(&self) -> Option<Arc<Entry>> {
        self.backing.lock().clone()
    }

    pub fn set_backing(&self, target: Option<Arc<Entry>>) {
        *self.backing.lock() = target;
    }

    /// The entry that actually owns the frame: itself, or its backing.
    pub fn owner(self: &Arc<Self>) -> Arc<Entry> {
        match self.backing() {
            Some(b) => b,
            None => self.clone(),
        }
    }

    pub fn phys(&self) -> u64 {
        self.phys.load(Ordering::Acquire)
    }

    pub fn set_phys(&self, phys: u64) {
        self.phys.store(phys, Ordering::Release);
    }

    fn raw_va(&self) -> u64 {
        self.va.load(Ordering::Acquire)
    }

    fn store_va(&self, va: u64) {
        self.va.store(va, Ordering::Release);
    }

    /// **add_ref(E)**: atomic increment; bounded.
    pub fn add_ref(&self) {
        let prev = self.refcount.fetch_add(1, Ordering::AcqRel);
        debug_assert!(prev < MAX_REFCOUNT, "cc: entry refcount overflow");
    }

    /// **release_ref(E)**: atomic decrement. If this was the last reference
    /// and the entry is detached and clean, insert it at the tail of the
    /// global clean LRU (conditions re-checked under the list lock).
    pub fn release_ref(self: &Arc<Self>, lists: &super::lists::GlobalLists) {
        let prev = self.refcount.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev >= 1, "cc: entry refcount underflow");
        if prev == 1 {
            lists.maybe_reinsert_clean(self);
        }
    }

    /// Drop a reference without considering relisting. Used internally by
    /// the list-removal helper (`cc::reclaim`) to release the protective
    /// reference it took on a candidate that is about to be destroyed, not
    /// returned to circulation.
    pub(super) fn release_ref_no_relist(&self) {
        let prev = self.refcount.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev >= 1, "cc: entry refcount underflow");
    }

    /// **get_va(E)**: if E has no VA but has a backing, lazily copy the
    /// backing's VA. Idempotent: any race stores the same value.
    pub fn get_va(self: &Arc<Self>) -> Option<u64> {
        let mine = self.raw_va();
        if mine != 0 {
            return Some(mine);
        }
        if let Some(backing) = self.backing() {
            let bva = backing.raw_va();
            if bva != 0 {
                self.store_va(bva);
                return Some(bva);
            }
        }
        None
    }

    /// **set_va(E, va)**: attach `va` to E's owner. Returns whether this
    /// call performed the 0->1 attach (vs. observing it already attached).
    pub fn set_va(self: &Arc<Self>, va: u64, counters: &super::pressure::Counters) -> bool {
        let owner = self.owner();
        let mut performed = false;
        loop {
            let cur = owner.flags.load(Ordering::Acquire);
            if cur & EntryFlags::MAPPED.bits() != 0 {
                break;
            }
            let new = cur | EntryFlags::MAPPED.bits();
            if owner
                .flags
                .compare_exchange_weak(cur, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                owner.store_va(va);
                counters.mapped_pages.fetch_add(1, Ordering::AcqRel);
                if cur & EntryFlags::DIRTY.bits() != 0 {
                    counters.mapped_dirty_pages.fetch_add(1, Ordering::AcqRel);
                }
                performed = true;
                break;
            }
        }
        if !core::ptr::eq(owner.as_ref(), self.as_ref()) {
            if let Some(bva) = owner.get_va_raw() {
                self.store_va(bva);
            }
        }
        performed
    }

    fn get_va_raw(&self) -> Option<u64> {
        let v = self.raw_va();
        if v != 0 {
            Some(v)
        } else {
            None
        }
    }

    /// Clear MAPPED on this (must be an owner). Returns the VA that was
    /// mapped, if any.
    pub fn clear_mapped(&self, counters: &super::pressure::Counters) -> Option<u64> {
        loop {
            let cur = self.flags.load(Ordering::Acquire);
            if cur & EntryFlags::MAPPED.bits() == 0 {
                return None;
            }
            let new = cur & !EntryFlags::MAPPED.bits();
            if self
                .flags
                .compare_exchange_weak(cur, new, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                let va = self.raw_va();
                self.store_va(0);
                counters.mapped_pages.fetch_sub(1, Ordering::AcqRel);
                if cur & EntryFlags::DIRTY.bits() != 0 {
                    counters.mapped_dirty_pages.fetch_sub(1, Ordering::AcqRel);
                }
                return if va != 0 { Some(va) } else { None };
            }
        }
    }
}

// `Entry` is shared across cores via `Arc`; the atomics and the
// spin-protected backing pointer make that sound.
unsafe impl Send for Entry {}
unsafe impl Sync for Entry {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::mock::MockFile;
    use crate::cc::pressure::Counters;
    use alloc::sync::Arc;

    fn mk_entry(offset: u64, phys: u64) -> Arc<Entry> {
        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        Arc::new(Entry::new(file, offset, phys, None))
    }

    #[test]
    fn new_entry_is_owner_not_dirty_not_mapped() {
        let e = mk_entry(0, 0x1000);
        assert!(e.is_owner());
        assert!(!e.is_dirty());
        assert!(!e.is_mapped());
        assert_eq!(e.refcount(), 1);
    }

    #[test]
    fn add_release_ref_round_trips() {
        let e = mk_entry(0, 0x1000);
        e.add_ref();
        assert_eq!(e.refcount(), 2);
        let lists = crate::cc::lists::GlobalLists::new();
        e.release_ref(&lists);
        assert_eq!(e.refcount(), 1);
    }

    #[test]
    fn set_va_attaches_once() {
        let e = mk_entry(0, 0x1000);
        let counters = Counters::new();
        assert!(e.set_va(0xffff_8000_0000_1000, &counters));
        assert!(!e.set_va(0xffff_8000_0000_2000, &counters));
        assert!(e.is_mapped());
        assert_eq!(e.get_va(), Some(0xffff_8000_0000_1000));
        assert_eq!(counters.mapped_pages.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn get_va_mirrors_backing_lazily() {
        let owner = mk_entry(0, 0x1000);
        let nonowner = mk_entry(0, 0x1000);
        nonowner.set_backing(Some(owner.clone()));
        let counters = Counters::new();
        owner.set_va(0xffff_8000_0000_3000, &counters);
        assert_eq!(nonowner.get_va(), Some(0xffff_8000_0000_3000));
    }
}
