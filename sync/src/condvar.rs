//! Condition variable with wait morphing.
//!
//! Waiters queue FIFO on an internal spin lock; signallers detach the
//! oldest record (or the whole chain) and, instead of waking the thread
//! to re-contend for the predicate mutex, ask the mutex to transfer
//! ownership straight to it ([`Mutex::send_lock`]). A waiter that returns
//! successfully therefore already holds the user mutex. With the
//! `wait-morphing` feature disabled the classic wake-then-relock path is
//! compiled instead and the remembered user mutex is omitted.
//!
//! The caller owns the predicate: a successful return means "possibly
//! signalled", and the predicate must be re-checked in a loop.

#[cfg(feature = "wait-morphing")]
use core::ptr;
#[cfg(feature = "wait-morphing")]
use core::sync::atomic::{AtomicPtr, Ordering};

#[cfg(feature = "wait-morphing")]
use nimbus_lib::kernel_services::thread_runtime;
use nimbus_lib::spinlock::SpinMutex;
use nimbus_lib::{klog_debug, klog_error};

use crate::mutex::Mutex;
use crate::wait::{WaitList, WaitRecord};

/// `wait` timed out: the deadline passed and the waiter unlinked its own
/// record before any signal claimed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitTimedOut;

pub struct Condvar {
    /// Internal mutex guarding `queue` (and the remembered user mutex).
    /// Held only for O(1) link work, except the rare O(n) timeout unlink.
    lock: SpinMutex<()>,
    queue: WaitList,
    /// The one user mutex every current waiter passed to `wait`. Set on
    /// enqueue, cleared by whichever dequeue empties the FIFO.
    #[cfg(feature = "wait-morphing")]
    user_mutex: AtomicPtr<Mutex>,
}

impl Condvar {
    pub const fn new() -> Self {
        Self {
            lock: SpinMutex::new(()),
            queue: WaitList::new(),
            #[cfg(feature = "wait-morphing")]
            user_mutex: AtomicPtr::new(ptr::null_mut()),
        }
    }

    /// Atomically release `mutex` (which the caller must hold) and block
    /// until signalled or until the absolute tick `deadline` passes.
    /// The mutex is held again on every return path.
    ///
    /// `Ok(())` means a signal (or lock transfer) targeted this waiter —
    /// never a timer. `Err(WaitTimedOut)` means the timer fired and the
    /// waiter won the unlink race.
    pub fn wait(&self, mutex: &Mutex, deadline: Option<u64>) -> Result<(), WaitTimedOut> {
        if !mutex.owned() {
            klog_error!("condvar: wait called without holding the user mutex");
            panic!("condvar: caller must hold the mutex across wait");
        }

        let wr = WaitRecord::for_current_thread();
        let wr_ptr = &wr as *const WaitRecord as *mut WaitRecord;

        {
            let guard = self.lock.lock();
            #[cfg(feature = "wait-morphing")]
            self.remember_user_mutex(mutex);
            // SAFETY: internal lock held; `wr` lives on this frame until
            // it is off the FIFO and any in-flight wake has landed, which
            // the paths below enforce.
            unsafe { self.queue.push(wr_ptr) };
            // Both unlocks happen under the guard, whose preemption
            // disable keeps the waiter from being descheduled while it
            // holds neither lock.
            mutex.unlock();
            drop(guard);
        }

        wr.wait(deadline);

        if !wr.woken() {
            // Timer fired. FIFO membership under the internal mutex is
            // the only authority on who won.
            let removed = {
                let _guard = self.lock.lock();
                // SAFETY: internal lock held.
                let removed = unsafe { self.queue.remove(wr_ptr) };
                #[cfg(feature = "wait-morphing")]
                if removed && self.queue.is_empty() {
                    self.user_mutex.store(ptr::null_mut(), Ordering::Relaxed);
                }
                removed
            };
            if removed {
                mutex.lock();
                return Err(WaitTimedOut);
            }
            // A signaller detached the record first: its wake (or the
            // lock transfer) is in flight. Wait for it so the record
            // cannot unwind while the signaller still holds it, then
            // count the wait as signalled.
            klog_debug!("condvar: timeout lost the race to a signaller");
            wr.wait(None);
        }

        #[cfg(feature = "wait-morphing")]
        mutex.receive_lock();
        #[cfg(not(feature = "wait-morphing"))]
        mutex.lock();
        Ok(())
    }

    /// Wake the oldest waiter, if any. With wait morphing the user mutex
    /// is handed to it directly and the handoff completing is what wakes
    /// the thread.
    pub fn wake_one(&self) {
        // Unlocked fast path: a stale empty read means the waiter had not
        // linked itself yet, i.e. it was not waiting.
        if self.queue.is_empty() {
            return;
        }
        let guard = self.lock.lock();
        // SAFETY: internal lock held.
        let wr = unsafe { self.queue.pop() };
        if wr.is_null() {
            return;
        }
        #[cfg(feature = "wait-morphing")]
        {
            // A non-empty queue always has a remembered mutex: every
            // enqueue stores it and only an emptying dequeue clears it.
            let mtx = self.user_mutex.load(Ordering::Relaxed);
            debug_assert!(!mtx.is_null());
            if self.queue.is_empty() {
                self.user_mutex.store(ptr::null_mut(), Ordering::Relaxed);
            }
            // SAFETY: `wr` was just detached and belongs to us; `mtx` is
            // the mutex every queued waiter passed to `wait`, alive for
            // as long as it has waiters.
            unsafe { (*mtx).send_lock(wr) };
            drop(guard);
        }
        #[cfg(not(feature = "wait-morphing"))]
        {
            drop(guard);
            // SAFETY: exclusive wake rights to the record we detached.
            unsafe { WaitRecord::wake(wr) };
        }
    }

    /// Wake every waiter present when the internal lock is taken. Later
    /// arrivals are not woken.
    pub fn wake_all(&self) {
        if self.queue.is_empty() {
            return;
        }

        #[cfg(feature = "wait-morphing")]
        {
            let (head, mtx) = {
                let _guard = self.lock.lock();
                // SAFETY: internal lock held.
                let head = unsafe { self.queue.take_all() };
                let mtx = self.user_mutex.swap(ptr::null_mut(), Ordering::Relaxed);
                (head, mtx)
            };
            if head.is_null() {
                return;
            }
            debug_assert!(!mtx.is_null());
            // SAFETY: the chain is detached; only this signaller touches
            // it.
            unsafe { Self::transfer_chain(mtx, head) };
        }

        #[cfg(not(feature = "wait-morphing"))]
        {
            let head = {
                let _guard = self.lock.lock();
                // SAFETY: internal lock held.
                unsafe { self.queue.take_all() }
            };
            // SAFETY: the chain is detached; only this signaller touches
            // it.
            unsafe { Self::wake_chain(head) };
        }
    }

    /// Racy observability read: whether any waiter is currently linked.
    pub fn has_waiters(&self) -> bool {
        !self.queue.is_empty()
    }

    /// Number of queued waiters. O(n) under the internal lock;
    /// diagnostics and tests only.
    pub fn waiter_count(&self) -> usize {
        let _guard = self.lock.lock();
        // SAFETY: internal lock held.
        unsafe { self.queue.len() }
    }

    #[cfg(feature = "wait-morphing")]
    fn remember_user_mutex(&self, mutex: &Mutex) {
        let mutex = mutex as *const Mutex as *mut Mutex;
        let prev = self.user_mutex.load(Ordering::Relaxed);
        if prev.is_null() {
            self.user_mutex.store(mutex, Ordering::Relaxed);
        } else if prev != mutex {
            klog_error!("condvar: concurrent waiters passed different user mutexes");
            panic!("condvar: all concurrent waiters must pass the same mutex");
        }
    }

    /// Hand the user mutex to each record of a detached chain in FIFO
    /// order. After each handoff the remainder is scanned and records
    /// whose threads sit on the same CPU are handed off immediately and
    /// spliced out, so transfers that will resume on one CPU land
    /// back-to-back.
    ///
    /// Caller must own the detached chain; `mtx` must outlive the walk.
    #[cfg(feature = "wait-morphing")]
    unsafe fn transfer_chain(mtx: *mut Mutex, head: *mut WaitRecord) {
        let mut wr = head;
        while !wr.is_null() {
            // Read the link and the CPU hint first: after send_lock the
            // record belongs to the mutex queue.
            // SAFETY: detached chain records are live until their wake.
            let mut rest = unsafe { (*wr).next_ptr() };
            let cpu = thread_runtime::thread_cpu(unsafe { (*wr).thread() });
            // SAFETY: exclusive rights to `wr`; caller keeps `mtx` alive.
            unsafe { (*mtx).send_lock(wr) };

            let mut prev: *mut WaitRecord = ptr::null_mut();
            let mut scan = rest;
            while !scan.is_null() {
                // SAFETY: still on our detached chain, therefore live.
                let scan_next = unsafe { (*scan).next_ptr() };
                if thread_runtime::thread_cpu(unsafe { (*scan).thread() }) == cpu {
                    if prev.is_null() {
                        rest = scan_next;
                    } else {
                        // SAFETY: `prev` is on our detached chain.
                        unsafe { (*prev).set_next(scan_next) };
                    }
                    // SAFETY: just spliced out; exclusive rights.
                    unsafe { (*mtx).send_lock(scan) };
                } else {
                    prev = scan;
                }
                scan = scan_next;
            }
            wr = rest;
        }
    }

    /// Wake each record of a detached chain in FIFO order.
    ///
    /// Caller must own the detached chain.
    #[cfg(not(feature = "wait-morphing"))]
    unsafe fn wake_chain(head: *mut WaitRecord) {
        let mut wr = head;
        while !wr.is_null() {
            // SAFETY: detached chain records are live until their wake,
            // and the link must be read before the wake ends our rights.
            let next = unsafe { (*wr).next_ptr() };
            unsafe { WaitRecord::wake(wr) };
            wr = next;
        }
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        debug_assert!(
            self.queue.is_empty(),
            "condvar dropped with waiters still queued"
        );
    }
}
