use core::ffi::{c_int, c_void};

/// Opaque scheduler handle for a thread. Valid for as long as the thread
/// is known to the runtime; the sync layer never dereferences it.
pub type ThreadHandle = *mut c_void;

crate::define_service! {
    /// Scheduler, preemption and timer contract consumed by the sync
    /// subsystem.
    ///
    /// # Blocking contract
    ///
    /// `block_current_thread` suspends the calling thread until some party
    /// calls `unblock_thread` on its handle. A wakeup delivered *between*
    /// a caller's predicate check and the block must not be lost: the
    /// runtime records it and the next `block_current_thread` returns
    /// immediately instead of sleeping. Callers re-check their predicate
    /// in a loop, so a stale pending wakeup costs one spin and nothing
    /// else. `unblock_thread` may race the target exiting; the runtime
    /// reports failure for a gone thread instead of faulting.
    ///
    /// # Timer contract
    ///
    /// `timer_arm` schedules an `unblock_thread` for the handle when the
    /// absolute tick deadline is reached; it touches no other state, so
    /// the blocked thread distinguishes a timer wakeup from a real one by
    /// its own flags. `timer_cancel` disarms a pending deadline; a wakeup
    /// already in flight may still be delivered and must be tolerated.
    thread_runtime => ThreadRuntimeServices {
        current_thread() -> ThreadHandle;
        thread_cpu(thread: ThreadHandle) -> u32;
        block_current_thread();
        unblock_thread(thread: ThreadHandle) -> c_int;
        preempt_disable();
        preempt_enable();
        preempt_count() -> u32;
        timer_ticks() -> u64;
        timer_frequency() -> u32;
        timer_arm(thread: ThreadHandle, deadline_tick: u64);
        timer_cancel(thread: ThreadHandle);
    }
}
