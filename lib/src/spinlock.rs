use core::cell::UnsafeCell;
use core::hint::spin_loop;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicU16, Ordering};

use crate::preempt::PreemptGuard;

/// Spin mutex that disables preemption while held.
///
/// Uses a **ticket lock** internally for FIFO fairness: each acquirer takes
/// a monotonically-increasing ticket and spins until `now_serving` matches.
/// CPUs therefore acquire the lock in the order they requested it, which
/// keeps the short critical sections of the sync subsystem starvation-free
/// under SMP contention.
///
/// Critical sections protected by this lock must be O(1) pointer work; the
/// one sanctioned exception is the condvar timeout path's list unlink,
/// which is O(waiters) and rare.
pub struct SpinMutex<T> {
    /// Monotonically-increasing ticket counter. Each `lock()` call takes
    /// the next ticket via `fetch_add(1)`. Wraps at `u16::MAX` — equality
    /// checks handle wrap-around correctly.
    next_ticket: AtomicU16,
    /// The ticket currently being served. Incremented on unlock. A waiter
    /// spins until `now_serving == my_ticket`.
    now_serving: AtomicU16,
    data: UnsafeCell<T>,
}

// SAFETY: SpinMutex provides exclusive access through ticket-lock
// acquisition with preemption disabled, making it safe to share across
// contexts.
unsafe impl<T: Send> Send for SpinMutex<T> {}
unsafe impl<T: Send> Sync for SpinMutex<T> {}

pub struct SpinMutexGuard<'a, T> {
    mutex: &'a SpinMutex<T>,
    _preempt: PreemptGuard,
}

impl<T> SpinMutex<T> {
    #[inline]
    pub const fn new(data: T) -> Self {
        Self {
            next_ticket: AtomicU16::new(0),
            now_serving: AtomicU16::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Check if the lock is currently held (or has waiters).
    #[inline]
    pub fn is_locked(&self) -> bool {
        let next = self.next_ticket.load(Ordering::Relaxed);
        let serving = self.now_serving.load(Ordering::Relaxed);
        next != serving
    }

    #[inline]
    pub fn lock(&self) -> SpinMutexGuard<'_, T> {
        let preempt = PreemptGuard::new();

        // Take a ticket. fetch_add wraps at u16::MAX → 0; equality checks
        // are wrap-safe so this is correct for any number of acquisitions.
        let my_ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        // Spin until our ticket is being served. The read of `now_serving`
        // is Acquire so that all writes made by the previous holder are
        // visible once we observe our ticket.
        //
        // Proportional backoff: the further away our ticket is from
        // now_serving, the more PAUSE iterations we issue per check. This
        // reduces cache-line traffic when multiple CPUs are queued.
        loop {
            let serving = self.now_serving.load(Ordering::Acquire);
            if serving == my_ticket {
                break;
            }
            let distance = my_ticket.wrapping_sub(serving) as u32;
            for _ in 0..distance.min(64) {
                spin_loop();
            }
        }

        SpinMutexGuard {
            mutex: self,
            _preempt: preempt,
        }
    }

    #[inline]
    pub fn try_lock(&self) -> Option<SpinMutexGuard<'_, T>> {
        let preempt = PreemptGuard::new();

        // Succeed only if the lock is currently free (next_ticket ==
        // now_serving). CAS next_ticket forward by 1; if someone else
        // grabbed a ticket in the meantime the CAS fails and we bail out
        // without waiting.
        let current = self.now_serving.load(Ordering::Relaxed);
        if self
            .next_ticket
            .compare_exchange(
                current,
                current.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
        {
            Some(SpinMutexGuard {
                mutex: self,
                _preempt: preempt,
            })
        } else {
            drop(preempt);
            None
        }
    }
}

impl<'a, T> Deref for SpinMutexGuard<'a, T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: the guard holds the ticket, granting exclusive access.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<'a, T> DerefMut for SpinMutexGuard<'a, T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard holds the ticket, granting exclusive access.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<'a, T> Drop for SpinMutexGuard<'a, T> {
    #[inline]
    fn drop(&mut self) {
        // Advance now_serving to hand the lock to the next waiter in FIFO
        // order. Release ordering publishes our writes to the next holder.
        self.mutex.now_serving.fetch_add(1, Ordering::Release);
        // _preempt drops after this, potentially triggering a deferred
        // reschedule in the hosting kernel.
    }
}
