//! External interfaces the cache core consumes. These traits are the whole
//! of the core's contact surface with the memory manager and the VFS
//! file-object layer; both are out of scope for this subsystem and are
//! implemented elsewhere (or, in tests, by `cc::mock`).

extern crate alloc;

use alloc::boxed::Box;

/// Status codes surfaced by the cache core, in the kernel's existing
/// NTSTATUS-style per-subsystem error convention (see `se::gpo::GpoError`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum CcStatus {
    Success = 0,
    /// Frame/entry/buffer allocation failure, or worker creation failure.
    InsufficientResources = 0xC000_0009,
    /// Stats-struct version mismatch.
    InvalidParameter = 0xC000_000D,
    /// VA detach refused because refcount or dirty state makes it unsafe.
    ResourceInUse = 0xC000_0215,
    /// Flush voluntarily aborted so the worker can re-trim before continuing.
    TryAgain = 0xC000_0244,
    /// External write returned fewer bytes than requested.
    DataLengthMismatch = 0xC000_00B4,
    /// Transport error from the non-cached write path, propagated unchanged.
    DeviceError(i32),
}

impl CcStatus {
    pub fn is_success(self) -> bool {
        matches!(self, CcStatus::Success)
    }
}

pub type CcResult<T> = Result<T, CcStatus>;

/// What kind of cacheable object an entry's file belongs to. Drives the
/// linking rule (§4.3): a file kind and the block-device kind representing
/// the same bytes may share one frame; two files or two devices never do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheableKind {
    BlockDevice,
    File,
}

/// A list of image-section (mmap) mappings belonging to one cacheable
/// object, as seen by the out-of-scope MM. The core only ever asks to tear
/// a range of it down.
pub trait ImageSectionList: Send + Sync {
    /// Unmap all image-section mappings in `[offset, offset+size)`
    /// (`size == None` means "to end of file") restricted to page-cache
    /// backed pages if `page_cache_only`. Returns whether any unmapped page
    /// was found dirty (the caller must re-dirty and must not evict it).
    fn unmap_image_section_list(
        &self,
        offset: u64,
        size: Option<u64>,
        page_cache_only: bool,
    ) -> CcResult<bool>;
}

/// The VFS file-object surface the cache core calls back into. Lifetime,
/// locking (beyond the tree lock this module owns), and the dirty-file-set
/// are the caller's responsibility; this is deliberately narrow.
pub trait CacheableFile: Send + Sync {
    fn kind(&self) -> CacheableKind;

    /// The per-file tree/dirty-list/lock this object owns (spec §3: "tree
    /// membership: red-black node in its file's index"). Every cacheable
    /// object embeds one `FileCacheState`; the cache core never allocates
    /// its own.
    fn cache_state(&self) -> &super::index::FileCacheState;

    /// Whether this object participates in caching at all.
    fn is_cacheable(&self) -> bool {
        true
    }

    /// Whether this object's entries may be the target of the linking
    /// protocol (§4.3) — regular files, symlinks, and shared-memory objects
    /// are linkable; anonymous/private mappings are not.
    fn is_linkable_type(&self) -> bool {
        matches!(self.kind(), CacheableKind::File)
    }

    /// Current size in bytes, used to clamp flush writes.
    fn size(&self) -> u64;

    /// Mark the file object itself dirty in the VFS's dirty-file-object
    /// list (out of scope for this module; this is purely a notification).
    fn mark_dirty(&self);

    /// Optimistic counterpart used by a whole-file flush (spec §4.5): tell
    /// the VFS this file object is no longer dirty before the per-page walk
    /// even starts. A no-op for objects that don't track this.
    fn mark_clean_hint(&self) {}

    /// Write the pages at physical addresses `pages`, contiguous bytes
    /// starting at file `offset`, bypassing the cache. The non-cached write
    /// path (out of scope) reads each frame directly — the core never
    /// copies page bytes itself. Returns the number of bytes actually
    /// written.
    fn perform_non_cached_write(&self, offset: u64, pages: &[u64]) -> CcResult<usize>;

    /// Flush the underlying block device's own write cache/journal. Only
    /// meaningful for `CacheableKind::BlockDevice`.
    fn synchronize_block_device(&self) -> CcResult<()> {
        Ok(())
    }

    /// The image-section list for this object, if it has mmap mappings.
    fn image_sections(&self) -> Option<&dyn ImageSectionList> {
        None
    }

    /// Identity for dedup purposes (two `Arc<dyn CacheableFile>` for the
    /// same underlying object must compare equal here).
    fn identity(&self) -> u64;
}

/// The memory-manager surface the cache core consumes: pressure readings,
/// frame (de)allocation, and VA (un)mapping.
pub trait MmInterface: Send + Sync {
    fn page_size(&self) -> usize;
    fn page_shift(&self) -> usize;

    fn total_physical_pages(&self) -> u64;
    fn free_physical_pages(&self) -> u64;

    fn total_virtual_memory(&self) -> u64;
    fn free_virtual_memory(&self) -> u64;
    /// `None` if MM reports no virtual-pressure warning outstanding.
    fn virtual_warning_level(&self) -> Option<u32>;

    /// Ask MM to page out `target` pages of working-set memory to restore
    /// physical headroom.
    fn request_paging_out(&self, target: u64) -> CcResult<()>;

    fn free_physical_page(&self, phys: u64);
    fn unmap_address(&self, va: u64, len: usize);

    /// Record which cache entry currently owns `phys`, for reverse lookup
    /// from a page-fault or reclaim path (out of scope here beyond the
    /// bookkeeping call itself).
    fn set_page_cache_entry_for_physical_address(&self, phys: u64, present: bool);
}

/// The VFS-wide "flush every dirty file object" entry point (spec §4.9's
/// `flush_file_objects(0, 0)`). The dirty-file-object list it walks belongs
/// to the file-object layer, out of scope for this module; the worker only
/// needs to invoke it each pass and react to `TryAgain` by restarting.
pub trait VfsFlusher: Send + Sync {
    fn flush_file_objects(&self, offset: u64, size: u64) -> CcResult<()>;
}

/// Stand-in used until the VFS registers a real flusher (e.g. before
/// `fs::init()` has run). Reports success immediately: nothing is dirty
/// yet if no file object has been opened.
pub struct NoVfsFlusher;

impl VfsFlusher for NoVfsFlusher {
    fn flush_file_objects(&self, _offset: u64, _size: u64) -> CcResult<()> {
        Ok(())
    }
}

/// A boxed writer used purely by tests to observe what the flush engine
/// would have written, standing in for the real block I/O path.
pub type WriteObserver = Box<dyn Fn(u64, &[u8]) + Send + Sync>;

/// An I/O buffer as seen from the non-cached read/write path: a list of
/// physical pages (MDL-style) a caller wants copied into or compared
/// against the cache. Out of scope beyond this narrow shape (spec §1: "the
/// block I/O path that actually writes a buffer to a device").
pub struct IoBuffer<'a> {
    pub phys_pages: &'a [u64],
}

impl<'a> IoBuffer<'a> {
    pub fn new(phys_pages: &'a [u64]) -> Self {
        Self { phys_pages }
    }

    pub fn contains(&self, phys: u64) -> bool {
        self.phys_pages.contains(&phys)
    }
}
