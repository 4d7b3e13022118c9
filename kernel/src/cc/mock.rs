//! Test doubles for `CacheableFile` and `MmInterface`. Exists only under
//! `#[cfg(test)]` (see `cc::mod`); every other module's unit tests are built
//! against these rather than real VFS/MM objects.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};

use spin::Mutex;

use super::iface::{CacheableFile, CacheableKind, CcResult, CcStatus, VfsFlusher};
use super::index::FileCacheState;
use super::PAGE_SIZE;

static NEXT_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// A `CacheableFile` standing in for either a regular file or the block
/// device backing it, depending on which constructor built it. Physical
/// pages written through `perform_non_cached_write` are read out of an
/// internal byte map populated by the test via `write_phys`; every call is
/// recorded for `writer_calls` to inspect.
pub struct MockFile {
    kind: CacheableKind,
    identity: u64,
    state: FileCacheState,
    size: AtomicU64,
    phys_mem: Mutex<BTreeMap<u64, [u8; PAGE_SIZE]>>,
    writer_log: Mutex<Vec<(u64, Vec<u8>)>>,
}

impl MockFile {
    fn new(kind: CacheableKind) -> Self {
        Self {
            kind,
            identity: NEXT_IDENTITY.fetch_add(1, Ordering::Relaxed),
            state: FileCacheState::new(),
            size: AtomicU64::new(1 << 40),
            phys_mem: Mutex::new(BTreeMap::new()),
            writer_log: Mutex::new(Vec::new()),
        }
    }

    pub fn new_file() -> Self {
        Self::new(CacheableKind::File)
    }

    pub fn new_device() -> Self {
        Self::new(CacheableKind::BlockDevice)
    }

    pub fn set_size(&self, size: u64) {
        self.size.store(size, Ordering::Release);
    }

    /// Seed the simulated physical frame at `phys` with `bytes`, zero-padded
    /// to a full page.
    pub fn write_phys(&self, phys: u64, bytes: &[u8]) {
        let mut page = [0u8; PAGE_SIZE];
        let n = bytes.len().min(PAGE_SIZE);
        page[..n].copy_from_slice(&bytes[..n]);
        self.phys_mem.lock().insert(phys, page);
    }

    /// Every `(offset, bytes)` pair this file object was asked to write
    /// through the non-cached path, in order.
    pub fn writer_calls(&self) -> Vec<(u64, Vec<u8>)> {
        self.writer_log.lock().clone()
    }
}

impl CacheableFile for MockFile {
    fn kind(&self) -> CacheableKind {
        self.kind
    }

    fn cache_state(&self) -> &FileCacheState {
        &self.state
    }

    fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    fn mark_dirty(&self) {}

    fn perform_non_cached_write(&self, offset: u64, pages: &[u64]) -> CcResult<usize> {
        let mem = self.phys_mem.lock();
        let mut bytes = Vec::with_capacity(pages.len() * PAGE_SIZE);
        for phys in pages {
            match mem.get(phys) {
                Some(page) => bytes.extend_from_slice(page),
                None => bytes.extend_from_slice(&[0u8; PAGE_SIZE]),
            }
        }
        drop(mem);
        let len = bytes.len();
        self.writer_log.lock().push((offset, bytes));
        Ok(len)
    }

    fn identity(&self) -> u64 {
        self.identity
    }
}

/// An `MmInterface` with fixed physical/virtual readings a test sets up
/// front. `virtual_warning` is a plain field so a test can flip MM's warning
/// state mid-scenario without going through a setter.
pub struct MockMm {
    total_physical: u64,
    free_physical: u64,
    total_virtual: u64,
    free_virtual: u64,
    pub virtual_warning: Option<u32>,
    paging_out_requests: Mutex<Vec<u64>>,
    unmap_calls: Mutex<Vec<(u64, usize)>>,
    freed_pages: Mutex<Vec<u64>>,
}

impl MockMm {
    pub fn new(total_physical: u64, free_physical: u64, total_virtual: u64, free_virtual: u64) -> Self {
        Self {
            total_physical,
            free_physical,
            total_virtual,
            free_virtual,
            virtual_warning: None,
            paging_out_requests: Mutex::new(Vec::new()),
            unmap_calls: Mutex::new(Vec::new()),
            freed_pages: Mutex::new(Vec::new()),
        }
    }

    pub fn unmap_calls(&self) -> Vec<(u64, usize)> {
        self.unmap_calls.lock().clone()
    }

    pub fn freed_pages(&self) -> Vec<u64> {
        self.freed_pages.lock().clone()
    }
}

impl super::iface::MmInterface for MockMm {
    fn page_size(&self) -> usize {
        PAGE_SIZE
    }

    fn page_shift(&self) -> usize {
        12
    }

    fn total_physical_pages(&self) -> u64 {
        self.total_physical
    }

    fn free_physical_pages(&self) -> u64 {
        self.free_physical
    }

    fn total_virtual_memory(&self) -> u64 {
        self.total_virtual
    }

    fn free_virtual_memory(&self) -> u64 {
        self.free_virtual
    }

    fn virtual_warning_level(&self) -> Option<u32> {
        self.virtual_warning
    }

    fn request_paging_out(&self, target: u64) -> CcResult<()> {
        self.paging_out_requests.lock().push(target);
        Ok(())
    }

    fn free_physical_page(&self, phys: u64) {
        self.freed_pages.lock().push(phys);
    }

    fn unmap_address(&self, va: u64, len: usize) {
        self.unmap_calls.lock().push((va, len));
    }

    fn set_page_cache_entry_for_physical_address(&self, _phys: u64, _present: bool) {}
}

/// A `VfsFlusher` that returns `TryAgain` a configurable number of times
/// before succeeding, so worker tests can exercise the restart loop.
pub struct MockVfs {
    try_again_remaining: AtomicU64,
    calls: AtomicU64,
}

impl MockVfs {
    pub fn new(try_again_count: u64) -> Self {
        Self {
            try_again_remaining: AtomicU64::new(try_again_count),
            calls: AtomicU64::new(0),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

impl VfsFlusher for MockVfs {
    fn flush_file_objects(&self, _offset: u64, _size: u64) -> CcResult<()> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        let remaining = self.try_again_remaining.load(Ordering::Relaxed);
        if remaining > 0 {
            self.try_again_remaining.fetch_sub(1, Ordering::Relaxed);
            Err(CcStatus::TryAgain)
        } else {
            Ok(())
        }
    }
}
