//! Single background worker state machine (spec §4.9): CLEAN/DIRTY, driven
//! by a work timer and woken early by pressure warnings. The state
//! transitions and the maintenance pass itself (`run_pass`) are pure enough
//! to unit-test against `cc::mock`; `KEvent`/`KTimer` wiring is the thin,
//! untestable shell around them (same split the teacher's own dispatcher
//! code keeps between `ke::event`/`ke::timer` primitives and their callers).

extern crate alloc;

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::hal::timer::hal_query_system_time;
use crate::ke::dpc::KDpc;
use crate::ke::event::{EventType, KEvent};
use crate::ke::timer::KTimer;

use super::entry::Entry;
use super::iface::{CcStatus, MmInterface, VfsFlusher};
use super::lists::GlobalLists;
use super::pressure::{Counters, CLEAN_DELAY_MS};
use super::reclaim::{destroy_entries, drain_and_reclaim};
use super::trim::trim;

/// Upper bound on `TRY_AGAIN` restarts within a single pass, so a pass
/// that keeps racing eviction can't spin the worker forever; it simply
/// gets re-scheduled and tries again next tick.
const MAX_TRY_AGAIN_RESTARTS: u32 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum WorkerState {
    Clean = 0,
    Dirty = 1,
}

/// The cache's one background worker. Quiesces to `Clean` and waits on
/// `event` indefinitely; `schedule()` (called from `mark_dirty`/pressure
/// warnings) arms `timer` for `CLEAN_DELAY_MS` and flips it to `Dirty`.
pub struct Worker {
    state: AtomicU32,
    /// Signaled by pressure-warning callbacks, and by `timer`'s DPC, to
    /// wake the worker.
    pub event: KEvent,
    /// Fires `CLEAN_DELAY_MS` after the worker becomes `Dirty`.
    pub timer: KTimer,
    /// Bridges `timer`'s expiry (which fires at DISPATCH_LEVEL) into
    /// signaling `event` so `run_forever`'s wait actually wakes.
    dpc: KDpc,
}

/// `KDpc` routine for `timer`: recovers the `Worker` from `context` and
/// signals its event. Registered once in `Worker::init`.
fn wake_dpc_routine(_dpc: *mut KDpc, context: usize, _arg1: usize, _arg2: usize) {
    let worker = unsafe { &*(context as *const Worker) };
    worker.wake_now();
}

impl Worker {
    pub const fn new() -> Self {
        Self {
            state: AtomicU32::new(WorkerState::Clean as u32),
            event: KEvent::new(),
            timer: KTimer::new(),
            dpc: KDpc::new(),
        }
    }

    pub fn init(&self) {
        unsafe {
            let event = &self.event as *const KEvent as *mut KEvent;
            (*event).init(EventType::Synchronization, false);
        }
        self.timer.init();
        self.dpc.init(wake_dpc_routine, self as *const Worker as usize);
    }

    pub fn state(&self) -> WorkerState {
        match self.state.load(Ordering::Acquire) {
            1 => WorkerState::Dirty,
            _ => WorkerState::Clean,
        }
    }

    /// **schedule()** (spec §4.9): CLEAN -> DIRTY, arming the work timer.
    /// A no-op if already `Dirty`. Returns whether this call performed the
    /// transition.
    pub fn schedule(&self) -> bool {
        let prev = self.state.swap(WorkerState::Dirty as u32, Ordering::AcqRel);
        if prev == WorkerState::Clean as u32 {
            self.arm_timer();
            true
        } else {
            false
        }
    }

    /// Arm the work timer for `CLEAN_DELAY_MS`. Compiled out under test: the
    /// state machine itself is what `cc::worker`'s tests exercise, not the
    /// tick source.
    fn arm_timer(&self) {
        #[cfg(not(test))]
        unsafe {
            self.timer.set(CLEAN_DELAY_MS as u32, 0, Some(&self.dpc));
        }
    }

    /// Wake the worker immediately regardless of state (a pressure-warning
    /// event firing early, per spec §4.9's "woken early by MM warnings").
    pub fn wake_now(&self) {
        unsafe {
            self.event.set();
        }
    }

    /// One maintenance pass (spec §4.9's worker body): record the wake
    /// timestamp, drain the removal list, destroy whatever is reclaimable
    /// from it, run `trim`, then call the VFS flush-all-dirty-files entry
    /// point. A `TryAgain` from the flush step (eviction needs another pass
    /// first) restarts the whole sequence, up to `MAX_TRY_AGAIN_RESTARTS`
    /// times. Returns the number of entries destroyed across every restart.
    pub fn run_pass(&self, mm: &dyn MmInterface, vfs: &dyn VfsFlusher, lists: &GlobalLists, counters: &Counters) -> usize {
        counters.last_clean_time.store(hal_query_system_time(), Ordering::Release);

        let mut total_destroyed = 0usize;
        for _ in 0..MAX_TRY_AGAIN_RESTARTS {
            let removal = lists.drain_removal();
            let (destroy, leftovers, _reclaimed): (Vec<Arc<Entry>>, _, _) =
                drain_and_reclaim(removal, lists, None, false, counters);
            lists.append_removal(leftovers);
            total_destroyed += destroy.len();
            destroy_entries(destroy, mm, lists, counters);

            total_destroyed += trim(mm, lists, counters, false);

            match vfs.flush_file_objects(0, 0) {
                Ok(()) => break,
                Err(CcStatus::TryAgain) => continue,
                Err(_) => break,
            }
        }
        total_destroyed
    }

    /// Decide and apply the next state after a pass (spec §4.9 step "decide
    /// next state"). Returns the state now in effect.
    pub fn advance(&self, counters: &Counters) -> WorkerState {
        let still_dirty = counters.dirty_pages.load(Ordering::Acquire) > 0;
        if still_dirty {
            self.arm_timer();
            self.state.store(WorkerState::Dirty as u32, Ordering::Release);
            WorkerState::Dirty
        } else {
            #[cfg(not(test))]
            unsafe {
                self.timer.cancel();
            }
            self.state.store(WorkerState::Clean as u32, Ordering::Release);
            WorkerState::Clean
        }
    }

    /// The worker thread's body: wait, run a pass, decide the next state,
    /// forever. Not unit-tested (blocks on the scheduler); `run_pass` and
    /// `advance` carry the logic this just sequences.
    ///
    /// # Safety
    /// Must run on a dedicated kernel thread; `KEvent`/`KTimer` waits are
    /// only valid from thread context.
    pub unsafe fn run_forever(&self, mm: &dyn MmInterface, vfs: &dyn VfsFlusher, lists: &GlobalLists, counters: &Counters) -> ! {
        loop {
            self.event.wait();
            self.run_pass(mm, vfs, lists, counters);
            self.advance(counters);
        }
    }
}

impl Default for Worker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cc::dirty::mark_dirty;
    use crate::cc::iface::{CacheableFile, NoVfsFlusher};
    use crate::cc::mock::{MockFile, MockMm, MockVfs};

    #[test]
    fn schedule_is_idempotent_until_advance_clears() {
        let w = Worker::new();
        assert_eq!(w.state(), WorkerState::Clean);
        assert!(w.schedule());
        assert_eq!(w.state(), WorkerState::Dirty);
        assert!(!w.schedule(), "already dirty: no-op");
    }

    #[test]
    fn advance_returns_to_clean_once_no_dirty_pages_remain() {
        let w = Worker::new();
        let counters = Counters::new();
        w.schedule();
        assert_eq!(w.advance(&counters), WorkerState::Clean);

        counters.dirty_pages.store(1, Ordering::Relaxed);
        assert_eq!(w.advance(&counters), WorkerState::Dirty);
    }

    #[test]
    fn run_pass_destroys_removal_list_entries() {
        let w = Worker::new();
        let mm = MockMm::new(1000, 900, 0, 0);
        let lists = GlobalLists::new();
        let counters = Counters::new();

        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        let e = Arc::new(Entry::new(file.clone(), 0, 0x4000, None));
        file.cache_state().state.write().tree.insert(0, e.clone());
        e.release_ref_no_relist();
        lists.push_removal_tail(&e);
        counters.entry_count.fetch_add(1, Ordering::Relaxed);
        counters.physical_pages.fetch_add(1, Ordering::Relaxed);

        let destroyed = w.run_pass(&mm, &NoVfsFlusher, &lists, &counters);

        assert_eq!(destroyed, 1);
        assert!(file.cache_state().state.read().tree.is_empty());
        assert_eq!(counters.physical_pages.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn run_pass_requeues_dirty_removal_entry_instead_of_destroying() {
        let w = Worker::new();
        let mm = MockMm::new(1000, 900, 0, 0);
        let lists = GlobalLists::new();
        let counters = Counters::new();

        let file: Arc<dyn CacheableFile> = Arc::new(MockFile::new_file());
        let e = Arc::new(Entry::new(file.clone(), 0, 0x4000, None));
        file.cache_state().state.write().tree.insert(0, e.clone());
        e.release_ref_no_relist();
        mark_dirty(&e, &lists, &counters);
        lists.push_removal_tail(&e);

        let destroyed = w.run_pass(&mm, &NoVfsFlusher, &lists, &counters);

        assert_eq!(destroyed, 0);
        assert!(e.is_dirty());
        assert!(file.cache_state().state.read().tree.contains_key(&0));
    }

    #[test]
    fn run_pass_restarts_on_try_again_then_settles() {
        let w = Worker::new();
        let mm = MockMm::new(1000, 900, 0, 0);
        let lists = GlobalLists::new();
        let counters = Counters::new();
        let vfs = MockVfs::new(3);

        let destroyed = w.run_pass(&mm, &vfs, &lists, &counters);

        assert_eq!(destroyed, 0);
        assert_eq!(vfs.calls(), 4, "3 TRY_AGAIN restarts plus the final success");
    }

    #[test]
    fn run_pass_records_last_clean_time_on_wake() {
        let w = Worker::new();
        let mm = MockMm::new(1000, 900, 0, 0);
        let lists = GlobalLists::new();
        let counters = Counters::new();
        unsafe { crate::hal::timer::hal_set_system_time(42) };

        w.run_pass(&mm, &NoVfsFlusher, &lists, &counters);

        assert_eq!(counters.last_clean_time.load(Ordering::Relaxed), 42);
    }

    #[test]
    fn run_pass_gives_up_after_max_restarts() {
        let w = Worker::new();
        let mm = MockMm::new(1000, 900, 0, 0);
        let lists = GlobalLists::new();
        let counters = Counters::new();
        let vfs = MockVfs::new(u64::MAX);

        w.run_pass(&mm, &vfs, &lists, &counters);

        assert_eq!(vfs.calls(), MAX_TRY_AGAIN_RESTARTS as u64);
    }
}
