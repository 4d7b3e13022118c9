//! Flush engine: range/whole-file flush, coalescing, clean-streak tolerance,
//! write-through the block path (spec §4.5).

extern crate alloc;

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::sync::Arc;
use alloc::vec::Vec;

use super::dirty::mark_clean;
use super::entry::Entry;
use super::iface::{CacheableFile, CcResult, CcStatus};
use super::lists::GlobalLists;
use super::pressure::{Counters, MAX_CLEAN_STREAK};
use super::PAGE_SIZE;

pub const FLUSH_MAX: usize = 128 * 1024;

bitflags::bitflags! {
    /// Flags controlling flush behavior (spec §4.5, §6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FlushFlags: u32 {
        /// Include clean entries whose backing owner is still dirty, and
        /// force the write even when nothing transitioned dirty->clean.
        const DATA_SYNCHRONIZED = 0x0000_0001;
    }
}

/// **flush(file, offset, size, flags, page_cap?)** (spec §4.5).
///
/// `size == None` means "to end of file"; `(offset, size) == (0, None)` with
/// no `page_cap` is whole-file mode.
pub fn flush(
    file: &Arc<dyn CacheableFile>,
    offset: u64,
    size: Option<u64>,
    flags: FlushFlags,
    page_cap: Option<usize>,
    lists: &GlobalLists,
    counters: &Counters,
) -> CcResult<()> {
    let whole_file = offset == 0 && size.is_none();
    if whole_file && page_cap.is_none() {
        file.mark_clean_hint();
    }

    if whole_file {
        flush_whole_file(file, flags, page_cap, lists, counters)
    } else {
        flush_range(file, offset, size, flags, page_cap, lists, counters)
    }
}

fn issue(
    file: &Arc<dyn CacheableFile>,
    buf: &mut Vec<Arc<Entry>>,
    buf_bytes: &mut usize,
    flags: FlushFlags,
    lists: &GlobalLists,
    counters: &Counters,
    first_err: &mut Option<CcStatus>,
) {
    if buf.is_empty() {
        return;
    }
    let taken: Vec<Arc<Entry>> = core::mem::take(buf);
    *buf_bytes = 0;
    if let Err(e) = flush_buffer(file, &taken, flags, lists, counters) {
        if first_err.is_none() {
            *first_err = Some(e);
        }
    }
}

/// Ranged mode (spec §4.5): start at `tree.lower_bound(offset)` and step in
/// offset order, skipping non-qualifying clean entries but never stopping
/// the scan early (beyond the range end or page cap).
fn flush_range(
    file: &Arc<dyn CacheableFile>,
    offset: u64,
    size: Option<u64>,
    flags: FlushFlags,
    page_cap: Option<usize>,
    lists: &GlobalLists,
    counters: &Counters,
) -> CcResult<()> {
    let state = file.cache_state();
    let snapshot: Vec<Arc<Entry>> = {
        let guard = state.state.read();
        guard.lower_bound(offset).map(|(_, e)| e.clone()).collect()
    };

    let range_end = size.map(|s| offset.saturating_add(s));

    let mut first_err: Option<CcStatus> = None;
    let mut buf: Vec<Arc<Entry>> = Vec::new();
    let mut buf_bytes: usize = 0;
    let mut next_offset: Option<u64> = None;
    let mut clean_streak: u32 = 0;
    let mut pages_seen: usize = 0;

    for e in snapshot {
        if let Some(end) = range_end {
            if e.offset >= end {
                break;
            }
        }
        if let Some(cap) = page_cap {
            if pages_seen >= cap {
                break;
            }
        }

        let contiguous = next_offset.map_or(true, |n| n == e.offset);
        let is_dirty = e.is_dirty();
        let backing_dirty = e.backing().map(|b| b.is_dirty()).unwrap_or(false);
        let sync_clean_include =
            !is_dirty && flags.contains(FlushFlags::DATA_SYNCHRONIZED) && backing_dirty;

        if is_dirty || sync_clean_include {
            if !contiguous {
                issue(file, &mut buf, &mut buf_bytes, flags, lists, counters, &mut first_err);
            }
            buf.push(e.clone());
            buf_bytes += PAGE_SIZE;
            clean_streak = 0;
            next_offset = Some(e.offset + PAGE_SIZE as u64);
            pages_seen += 1;
        } else {
            let extends_streak = contiguous && clean_streak < MAX_CLEAN_STREAK;
            let is_first_of_pending = buf.is_empty();
            if extends_streak || is_first_of_pending {
                buf.push(e.clone());
                buf_bytes += PAGE_SIZE;
                clean_streak += 1;
                next_offset = Some(e.offset + PAGE_SIZE as u64);
                pages_seen += 1;
            } else {
                // Doesn't extend the streak and isn't the first entry of a
                // pending buffer: skip it, flushing whatever we had first
                // since the contiguous run is broken either way.
                issue(file, &mut buf, &mut buf_bytes, flags, lists, counters, &mut first_err);
                continue;
            }
        }

        if buf_bytes >= FLUSH_MAX {
            issue(file, &mut buf, &mut buf_bytes, flags, lists, counters, &mut first_err);
        }
    }
    issue(file, &mut buf, &mut buf_bytes, flags, lists, counters, &mut first_err);

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Whole-file mode (spec §4.5): take the dirty list under the file lock,
/// move it to a local list, and re-seed iteration by popping the local
/// list's front and stepping through the file's offset tree to pick up
/// contiguous neighbors. Unlike ranged mode this never scans past a run's
/// end looking for the next dirty page — that page gets its own run when
/// it is popped off the local list — which is what avoids rescanning
/// clean entries that aren't adjacent to any dirty one.
fn flush_whole_file(
    file: &Arc<dyn CacheableFile>,
    flags: FlushFlags,
    page_cap: Option<usize>,
    lists: &GlobalLists,
    counters: &Counters,
) -> CcResult<()> {
    let state = file.cache_state();
    let mut dirty_local: VecDeque<Arc<Entry>> = state.state.write().take_dirty_list();

    let tree_snapshot: BTreeMap<u64, Arc<Entry>> = {
        let guard = state.state.read();
        guard.tree.iter().map(|(k, v)| (*k, v.clone())).collect()
    };

    let mut seen: BTreeSet<u64> = BTreeSet::new();
    let mut first_err: Option<CcStatus> = None;
    let mut buf: Vec<Arc<Entry>> = Vec::new();
    let mut buf_bytes: usize = 0;
    let mut pages_seen: usize = 0;

    while let Some(seed) = dirty_local.pop_front() {
        if seen.contains(&seed.offset) {
            continue;
        }
        if let Some(cap) = page_cap {
            if pages_seen >= cap {
                break;
            }
        }

        let mut clean_streak: u32 = 0;
        let mut cursor = seed.offset;
        loop {
            let entry = match tree_snapshot.get(&cursor) {
                Some(e) => e.clone(),
                None => break, // contiguity broken: no entry at this offset
            };
            if let Some(cap) = page_cap {
                if pages_seen >= cap {
                    break;
                }
            }

            let is_dirty = entry.is_dirty();
            let backing_dirty = entry.backing().map(|b| b.is_dirty()).unwrap_or(false);
            let sync_clean_include =
                !is_dirty && flags.contains(FlushFlags::DATA_SYNCHRONIZED) && backing_dirty;

            if is_dirty || sync_clean_include {
                seen.insert(cursor);
                buf.push(entry);
                buf_bytes += PAGE_SIZE;
                clean_streak = 0;
            } else if clean_streak < MAX_CLEAN_STREAK {
                buf.push(entry);
                buf_bytes += PAGE_SIZE;
                clean_streak += 1;
            } else {
                // Streak tolerance exceeded: end this run here rather than
                // rescanning further clean entries looking for the next
                // dirty one.
                break;
            }

            pages_seen += 1;
            cursor += PAGE_SIZE as u64;
            if buf_bytes >= FLUSH_MAX {
                issue(file, &mut buf, &mut buf_bytes, flags, lists, counters, &mut first_err);
            }
        }
        issue(file, &mut buf, &mut buf_bytes, flags, lists, counters, &mut first_err);
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// **flush_buffer(buf, size, flags)** (spec §4.5 "Write").
fn flush_buffer(
    file: &Arc<dyn CacheableFile>,
    buf: &[Arc<Entry>],
    flags: FlushFlags,
    lists: &GlobalLists,
    counters: &Counters,
) -> CcResult<()> {
    let state = file.cache_state();
    let mut live: Vec<Arc<Entry>> = Vec::with_capacity(buf.len());
    {
        let guard = state.state.read();
        for e in buf {
            match guard.tree.get(&e.offset) {
                Some(found) if Arc::ptr_eq(found, e) => live.push(e.clone()),
                _ => break, // evicted mid-flush: end the buffer early
            }
        }
    }
    if live.is_empty() {
        return Ok(());
    }

    let mut was_dirty = false;
    for e in &live {
        let owner = e.owner();
        if mark_clean(&owner, owner.file.cache_state(), true, lists, counters) {
            was_dirty = true;
        }
    }

    let start_offset = live[0].offset;
    let mut size = live.len() * PAGE_SIZE;
    let file_size = file.size();
    if start_offset >= file_size {
        size = 0;
    } else {
        let remaining = (file_size - start_offset) as usize;
        if size > remaining {
            size = remaining;
        }
    }

    if size == 0 {
        return Ok(());
    }
    if !was_dirty && !flags.contains(FlushFlags::DATA_SYNCHRONIZED) {
        // Another flusher already handled these pages.
        return Ok(());
    }

    let phys_pages: Vec<u64> = live.iter().map(|e| e.owner().phys()).collect();
    match file.perform_non_cached_write(start_offset, &phys_pages) {
        Ok(written) if written >= size => {
            if file.kind() == super::iface::CacheableKind::BlockDevice
                && !flags.contains(FlushFlags::DATA_SYNCHRONIZED)
            {
                let _ = file.synchronize_block_device();
            }
            Ok(())
        }
        Ok(written) => {
            redirty_unwritten(&live, written, lists, counters);
            file.mark_dirty();
            Err(CcStatus::DataLengthMismatch)
        }
        Err(e) => {
            redirty_unwritten(&live, 0, lists, counters);
            file.mark_dirty();
            Err(e)
        }
    }
}

fn redirty_unwritten(live: &[Arc<Entry>], written: usize, lists: &GlobalLists, counters: &Counters) {
    let start = live[0].offset;
    let boundary = start + ((written / PAGE_SIZE) as u64) * PAGE_SIZE as u64;
    for e in live {
        if e.offset >= boundary {
            super::dirty::mark_dirty(e, lists, counters);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::index::FileCacheState;
    use crate::cc::mock::MockFile;

    fn insert(file: &Arc<dyn CacheableFile>, offset: u64, phys: u64) -> Arc<Entry> {
        let e = Arc::new(Entry::new(file.clone(), offset, phys, None));
        file.cache_state().state.write().tree.insert(offset, e.clone());
        e
    }

    /// S1, driven through the real public API (`cc::create_or_lookup` with
    /// `va=V`, `cc::mark_dirty`, `cc::flush`) rather than the `insert()`
    /// helper the other tests in this module use to exercise `flush::flush`
    /// in isolation.
    #[test]
    fn single_page_write_flush_s1() {
        let mock = Arc::new(MockFile::new_file());
        let file: Arc<dyn CacheableFile> = mock.clone();
        let va = 0xffff_9000_0000_2000u64;
        let phys = 0x2000u64;

        let (e, created) = crate::cc::create_or_lookup(&file, Some(va), phys, 0, None);
        assert!(created);
        assert!(e.is_mapped());

        mock.write_phys(phys, b"ABCD");
        assert!(crate::cc::mark_dirty(&e));

        crate::cc::flush(&file, 0, None, FlushFlags::empty(), None).unwrap();

        assert!(!e.is_dirty());
        let calls = mock.writer_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, 0);
        assert_eq!(&calls[0].1[0..4], b"ABCD");
    }

    #[test]
    fn clean_streak_coalescing_s2() {
        let mock = Arc::new(MockFile::new_file());
        let file: Arc<dyn CacheableFile> = mock.clone();
        let lists = GlobalLists::new();
        let counters = Counters::new();
        let ps = PAGE_SIZE as u64;

        let e0 = insert(&file, 0, 0x10000);
        let e1 = insert(&file, ps, 0x11000); // clean filler
        let e2 = insert(&file, 2 * ps, 0x12000);
        let e3 = insert(&file, 3 * ps, 0x13000);
        let e4 = insert(&file, 7 * ps, 0x17000);

        for e in [&e0, &e2, &e3, &e4] {
            super::super::dirty::mark_dirty(e, &lists, &counters);
        }
        let _ = &e1;

        flush(&file, 0, None, FlushFlags::empty(), None, &lists, &counters).unwrap();

        let calls = mock.writer_calls();
        assert_eq!(calls.len(), 2, "expected two coalesced writer calls");
        assert_eq!(calls[0].0, 0);
        assert_eq!(calls[0].1.len(), 4 * PAGE_SIZE);
        assert_eq!(calls[1].0, 7 * ps);
        assert_eq!(calls[1].1.len(), PAGE_SIZE);
    }

    #[test]
    fn flush_returns_dirty_list_empty_p7() {
        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        let lists = GlobalLists::new();
        let counters = Counters::new();
        let e = insert(&file, 0, 0x4000);
        super::super::dirty::mark_dirty(&e, &lists, &counters);

        flush(&file, 0, None, FlushFlags::empty(), None, &lists, &counters).unwrap();

        let state: &FileCacheState = file.cache_state();
        assert!(state.state.read().dirty_list.is_empty());
        assert!(!e.is_dirty());
    }
}
