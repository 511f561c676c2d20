//! Sleeping FIFO mutex with direct ownership handoff.
//!
//! `unlock` never lets queued waiters re-contend: it pops the oldest
//! waiter and makes it the owner before it runs, so acquisition order is
//! the arrival order. The same handoff step implements [`send_lock`],
//! the transfer operation the condvar's wait-morphing signal path relies
//! on: the designated thread is granted the mutex (immediately if free,
//! in FIFO turn if held) without ever spinning or sleeping on the mutex
//! itself.
//!
//! [`send_lock`]: Mutex::send_lock

use core::ffi::c_void;
use core::ptr;
use core::sync::atomic::{AtomicPtr, Ordering};

use nimbus_lib::kernel_services::thread_runtime;
use nimbus_lib::klog_error;
use nimbus_lib::spinlock::SpinMutex;

use crate::wait::{WaitList, WaitRecord};

struct MutexInner {
    locked: bool,
    /// Threads sleeping on the mutex, oldest first. Non-empty only while
    /// `locked`.
    waiters: WaitList,
}

pub struct Mutex {
    inner: SpinMutex<MutexInner>,
    /// Handle of the holding thread. Written by the granting side on a
    /// handoff and by the acquiring side otherwise; null when free.
    owner: AtomicPtr<c_void>,
}

impl Mutex {
    pub const fn new() -> Self {
        Self {
            inner: SpinMutex::new(MutexInner {
                locked: false,
                waiters: WaitList::new(),
            }),
            owner: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Acquire the mutex, sleeping in FIFO order if it is held.
    pub fn lock(&self) {
        let current = thread_runtime::current_thread();
        let wr = WaitRecord::new(current);
        {
            let mut inner = self.inner.lock();
            if !inner.locked {
                inner.locked = true;
                self.owner.store(current, Ordering::Relaxed);
                return;
            }
            // SAFETY: `wr` lives on this frame until the handoff wake
            // below, and the state lock is held.
            unsafe { inner.waiters.push(&wr as *const WaitRecord as *mut WaitRecord) };
        }
        wr.wait(None);
        // The granting unlock made this thread the owner before waking it.
        debug_assert!(self.owned());
    }

    /// Acquire without sleeping. Returns `true` on success.
    pub fn try_lock(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.locked {
            return false;
        }
        inner.locked = true;
        self.owner
            .store(thread_runtime::current_thread(), Ordering::Relaxed);
        true
    }

    /// Release the mutex. If waiters are queued, ownership passes
    /// directly to the oldest one; otherwise the mutex becomes free.
    ///
    /// Unlocking a mutex the calling thread does not hold is a fatal
    /// usage bug.
    pub fn unlock(&self) {
        let current = thread_runtime::current_thread();
        if self.owner.load(Ordering::Relaxed) != current {
            klog_error!("mutex: unlock by a non-owner thread");
            panic!("mutex: unlock by a thread that does not hold the lock");
        }

        let mut inner = self.inner.lock();
        debug_assert!(inner.locked);
        // SAFETY: list mutation under the state lock.
        let next = unsafe { inner.waiters.pop() };
        if next.is_null() {
            inner.locked = false;
            self.owner.store(ptr::null_mut(), Ordering::Relaxed);
            return;
        }
        // Handoff: the mutex stays locked and `next`'s thread is the
        // owner from here on.
        // SAFETY: `next` was linked, therefore live; detached by us.
        let next_thread = unsafe { (*next).thread() };
        self.owner.store(next_thread, Ordering::Relaxed);
        drop(inner);
        // SAFETY: exclusive wake rights to the record we just detached.
        unsafe { WaitRecord::wake(next) };
    }

    /// Grant the mutex to the thread named by `wr` without it contending.
    ///
    /// If the mutex is free the grant is immediate; if it is held the
    /// record queues in FIFO order and a later [`unlock`](Self::unlock)
    /// grants it. Either way the transfer landing is what sets the
    /// record's woken flag, so the recipient resumes already holding the
    /// mutex and finishes with [`receive_lock`](Self::receive_lock).
    ///
    /// # Safety
    ///
    /// `wr` must point to a live record detached from every list, whose
    /// owning thread waits (or will wait) on it and cannot unwind it
    /// before the wake lands.
    pub unsafe fn send_lock(&self, wr: *mut WaitRecord) {
        let mut inner = self.inner.lock();
        if inner.locked {
            // SAFETY: state lock held; `wr` is live per the caller
            // contract and stays so until its wake.
            unsafe { inner.waiters.push(wr) };
            return;
        }
        debug_assert!(inner.waiters.is_empty());
        inner.locked = true;
        // SAFETY: live per the caller contract.
        let thread = unsafe { (*wr).thread() };
        self.owner.store(thread, Ordering::Relaxed);
        drop(inner);
        // SAFETY: exclusive wake rights per the caller contract.
        unsafe { WaitRecord::wake(wr) };
    }

    /// Record ownership after being handed the mutex by a
    /// [`send_lock`](Self::send_lock) transfer. Never blocks.
    pub fn receive_lock(&self) {
        debug_assert!(self.is_locked());
        self.owner
            .store(thread_runtime::current_thread(), Ordering::Relaxed);
    }

    /// Whether the calling thread holds the mutex.
    pub fn owned(&self) -> bool {
        self.owner.load(Ordering::Relaxed) == thread_runtime::current_thread()
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().locked
    }

    /// Number of threads sleeping on the mutex. O(n) under the state
    /// lock; diagnostics and tests only.
    pub fn waiter_count(&self) -> usize {
        let inner = self.inner.lock();
        // SAFETY: state lock held.
        unsafe { inner.waiters.len() }
    }
}

impl Default for Mutex {
    fn default() -> Self {
        Self::new()
    }
}
