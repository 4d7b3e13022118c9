//! Shared-frame linking protocol between a block-device entry and a file
//! entry representing the same on-disk bytes (spec §4.3).

extern crate alloc;

use alloc::sync::Arc;

use super::entry::{Entry, EntryFlags};
use super::iface::{CacheableKind, CcResult, CcStatus};
use super::pressure::Counters;

/// **can_link(entry, file)**: whether `entry`'s object may be linked to
/// `file`'s object under the linking rule — one side must be a block
/// device, the other a linkable file kind, and they must differ.
pub fn can_link(entry_kind: CacheableKind, file_kind: CacheableKind, file_linkable: bool) -> bool {
    if !file_linkable {
        return false;
    }
    matches!(
        (entry_kind, file_kind),
        (CacheableKind::BlockDevice, CacheableKind::File) | (CacheableKind::File, CacheableKind::BlockDevice)
    )
}

/// Apply the linking rule at insertion time (spec §4.3 "Insertion with
/// link"). `new_entry` was just created for `new_kind`; `link` is the
/// pre-existing entry being linked against. Returns an error only if the
/// preconditions the spec asserts are violated by the caller.
pub fn apply_link_on_insert(
    new_entry: &Arc<Entry>,
    new_kind: CacheableKind,
    link: &Arc<Entry>,
    link_kind: CacheableKind,
    counters: &Counters,
) -> CcResult<()> {
    match (new_kind, link_kind) {
        (CacheableKind::BlockDevice, CacheableKind::File) => {
            // The existing file entry must already own the frame; the new
            // block-device entry takes over ownership.
            debug_assert!(link.is_owner(), "cc: link target must own its frame");
            debug_assert!(!link.is_dirty(), "cc: non-owner must not be dirty at link time");
            transfer_ownership(new_entry, link, counters);
            Ok(())
        }
        (CacheableKind::File, CacheableKind::BlockDevice) => {
            debug_assert!(link.is_owner(), "cc: link target must own its frame");
            // The block device stays owner; the new file entry becomes the
            // non-owner.
            new_entry.clear_mapped(counters);
            new_entry.flags.fetch_and(!EntryFlags::PAGE_OWNER.bits(), core::sync::atomic::Ordering::AcqRel);
            new_entry.set_phys(link.phys());
            new_entry.set_backing(Some(link.clone()));
            link.add_ref();
            Ok(())
        }
        _ => Err(CcStatus::InvalidParameter),
    }
}

fn transfer_ownership(new_owner: &Arc<Entry>, old_owner: &Arc<Entry>, counters: &Counters) {
    // old_owner becomes the non-owner referencing new_owner.
    let was_mapped = old_owner.is_mapped();
    let va = old_owner.clear_mapped(counters);
    old_owner
        .flags
        .fetch_and(!EntryFlags::PAGE_OWNER.bits(), core::sync::atomic::Ordering::AcqRel);
    new_owner.set_phys(old_owner.phys());
    old_owner.set_backing(Some(new_owner.clone()));
    new_owner.add_ref();
    if was_mapped {
        if let Some(va) = va {
            new_owner.set_va(va, counters);
        }
    }
}

/// Outcome of `link_entries`: either the pair was already linked (P8,
/// no-op), or it was just collapsed and the caller must free the displaced
/// frame / unmap its former VA through `MmInterface`.
pub enum LinkOutcome {
    AlreadyLinked,
    Linked {
        displaced_phys: u64,
        displaced_va: Option<u64>,
    },
}

/// **link_entries(lower, upper)** (spec §4.3): collapse two independently
/// owned frames so that `lower` (a block device) becomes the sole owner and
/// `upper` (a file) becomes its non-owner.
///
/// Preconditions: `lower` is a block device, `upper` is a linkable file
/// kind, both own their frames, `lower.refcount == 1`, `upper.refcount >=
/// 1`, `upper` is not dirty. Violating these is a caller bug (asserted, not
/// recoverable — spec §7).
pub fn link_entries(
    lower: &Arc<Entry>,
    lower_kind: CacheableKind,
    upper: &Arc<Entry>,
    upper_kind: CacheableKind,
    upper_linkable: bool,
    counters: &Counters,
) -> CcResult<LinkOutcome> {
    // P8: idempotent if already linked.
    if let Some(existing) = upper.backing() {
        if Arc::ptr_eq(&existing, lower) {
            return Ok(LinkOutcome::AlreadyLinked);
        }
    }

    debug_assert_eq!(lower_kind, CacheableKind::BlockDevice);
    debug_assert_eq!(upper_kind, CacheableKind::File);
    debug_assert!(upper_linkable);
    debug_assert!(lower.is_owner() && upper.is_owner());
    debug_assert_eq!(lower.refcount(), 1);
    debug_assert!(upper.refcount() >= 1);
    debug_assert!(!upper.is_dirty(), "cc: upper must not be dirty at link time");

    // Step 1: unmap any image-section mappings of the lower frame.
    if let Some(sections) = lower.file.image_sections() {
        sections.unmap_image_section_list(lower.offset, Some(super::PAGE_SIZE as u64), true)?;
    }

    // Step 2/3/4: move lower's phys/va to upper's, transfer MAPPED as
    // needed, clear upper's ownership.
    let lower_was_mapped = lower.is_mapped();
    let upper_was_mapped = upper.is_mapped();

    if lower_was_mapped && !upper_was_mapped {
        lower.clear_mapped(counters);
    }

    let displaced_phys = lower.phys();
    let displaced_va = if lower_was_mapped { lower.get_va() } else { None };

    lower.set_phys(upper.phys());

    let upper_va = upper.get_va();
    let upper_was_owner_mapped = upper.is_mapped();
    upper.flags.fetch_and(
        !(EntryFlags::PAGE_OWNER.bits() | EntryFlags::MAPPED.bits()),
        core::sync::atomic::Ordering::AcqRel,
    );
    if upper_was_owner_mapped {
        counters.mapped_pages.fetch_sub(1, core::sync::atomic::Ordering::AcqRel);
        if upper.is_dirty() {
            counters
                .mapped_dirty_pages
                .fetch_sub(1, core::sync::atomic::Ordering::AcqRel);
        }
        if !lower_was_mapped {
            if let Some(va) = upper_va {
                lower.set_va(va, counters);
            }
        }
    }

    // Step 5: take a reference on lower from upper; link them.
    lower.add_ref();
    upper.set_backing(Some(lower.clone()));

    // Step 6: freeing the displaced frame and unmapping its former VA is
    // the caller's job (it holds the `MmInterface` handle) — see
    // `cc::Cache::link_entries`.
    Ok(LinkOutcome::Linked {
        displaced_phys,
        displaced_va,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::mock::{MockFile, MockMm};
    use alloc::sync::Arc;

    #[test]
    fn can_link_requires_opposite_kinds() {
        assert!(can_link(CacheableKind::BlockDevice, CacheableKind::File, true));
        assert!(can_link(CacheableKind::File, CacheableKind::BlockDevice, true));
        assert!(!can_link(CacheableKind::File, CacheableKind::File, true));
        assert!(!can_link(CacheableKind::BlockDevice, CacheableKind::File, false));
    }

    #[test]
    fn link_entries_makes_upper_nonowner_and_idempotent() {
        let _mm = MockMm::new(1000, 900, 0, 0);
        let dev: Arc<dyn super::super::iface::CacheableFile> = Arc::new(MockFile::new_device());
        let file: Arc<dyn super::super::iface::CacheableFile> = Arc::new(MockFile::new_file());
        let lower = Arc::new(Entry::new(dev, 0, 0x5000, None));
        let upper = Arc::new(Entry::new(file, 0, 0x9000, None));
        let counters = Counters::new();

        let first =
            link_entries(&lower, CacheableKind::BlockDevice, &upper, CacheableKind::File, true, &counters)
                .unwrap();
        assert!(matches!(first, LinkOutcome::Linked { .. }));
        assert!(!upper.is_owner());
        assert_eq!(upper.backing().map(|b| Arc::ptr_eq(&b, &lower)), Some(true));
        assert_eq!(lower.refcount(), 2);
        assert_eq!(lower.phys(), upper.phys());

        let second =
            link_entries(&lower, CacheableKind::BlockDevice, &upper, CacheableKind::File, true, &counters)
                .unwrap();
        assert!(matches!(second, LinkOutcome::AlreadyLinked));
        assert_eq!(lower.refcount(), 2, "idempotent call must not mutate");
    }
}
