//! Hosted thread runtime backed by `std::thread`.
//!
//! Implements the `thread_runtime` service contract for test processes:
//!
//! * a fixed table of thread slots — a slot's address is the opaque
//!   [`ThreadHandle`] handed to the sync layer,
//! * blocking maps to `std::thread::park`; waking to `unpark`. The park
//!   token doubles as the pending-wakeup flag the blocking contract
//!   requires, so a wakeup delivered before the block is never lost,
//! * ticks are milliseconds since [`init`]; a detached 1 ms ticker thread
//!   sweeps armed deadlines and unparks due threads, mirroring a timer
//!   interrupt driving a sleep queue,
//! * the CPU a thread "runs on" is a plain per-slot field chosen at spawn
//!   time, which is all the affinity-grouping code observes.

use core::cell::Cell;
use core::ffi::c_int;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use spin::{Mutex, Once};

use crate::clock;
use crate::kernel_services::thread_runtime::{
    self, ThreadHandle, ThreadRuntimeServices,
};

/// Maximum number of concurrently registered host threads.
const MAX_HOST_THREADS: usize = 64;

/// Sentinel deadline meaning "no timer armed".
const TIMER_DISARMED: u64 = u64::MAX;

struct HostThread {
    occupied: AtomicBool,
    cpu: AtomicU32,
    preempt_count: AtomicU32,
    /// Absolute tick deadline, `TIMER_DISARMED` when idle.
    deadline: AtomicU64,
    /// Unpark target. `None` while the slot is free.
    parker: Mutex<Option<Thread>>,
}

impl HostThread {
    const fn new() -> Self {
        Self {
            occupied: AtomicBool::new(false),
            cpu: AtomicU32::new(0),
            preempt_count: AtomicU32::new(0),
            deadline: AtomicU64::new(TIMER_DISARMED),
            parker: Mutex::new(None),
        }
    }
}

static SLOTS: [HostThread; MAX_HOST_THREADS] =
    [const { HostThread::new() }; MAX_HOST_THREADS];

static EPOCH: Once<Instant> = Once::new();
static INIT: Once<()> = Once::new();

std::thread_local! {
    static CURRENT_SLOT: Cell<usize> = const { Cell::new(usize::MAX) };
}

static SERVICES: ThreadRuntimeServices = ThreadRuntimeServices {
    current_thread: host_current_thread,
    thread_cpu: host_thread_cpu,
    block_current_thread: host_block_current_thread,
    unblock_thread: host_unblock_thread,
    preempt_disable: host_preempt_disable,
    preempt_enable: host_preempt_enable,
    preempt_count: host_preempt_count,
    timer_ticks: host_timer_ticks,
    timer_frequency: host_timer_frequency,
    timer_arm: host_timer_arm,
    timer_cancel: host_timer_cancel,
};

/// Bring up the hosted runtime. Idempotent; every test entry point calls
/// it and exactly one registration happens per process.
pub fn init() {
    INIT.call_once(|| {
        EPOCH.call_once(Instant::now);
        thread_runtime::register_thread_runtime_services(&SERVICES);
        crate::klog::klog_register_backend(stderr_backend);
        thread::spawn(ticker_loop);
    });
}

/// Spawn an OS thread registered with the runtime, pinned (as far as the
/// affinity hint is concerned) to `cpu`.
pub fn spawn<T, F>(cpu: u32, f: F) -> thread::JoinHandle<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    init();
    thread::spawn(move || {
        let _reg = Registration::claim(cpu);
        f()
    })
}

/// Register the calling thread for the duration of `f`. Lets a test's
/// main thread participate in the protocol directly.
pub fn with_current<T>(cpu: u32, f: impl FnOnce() -> T) -> T {
    init();
    let _reg = Registration::claim(cpu);
    f()
}

fn stderr_backend(args: fmt::Arguments<'_>) {
    std::eprintln!("{args}");
}

// ---------------------------------------------------------------------------
// Slot registration
// ---------------------------------------------------------------------------

struct Registration {
    idx: usize,
}

impl Registration {
    fn claim(cpu: u32) -> Self {
        for (idx, slot) in SLOTS.iter().enumerate() {
            if slot
                .occupied
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }
            slot.cpu.store(cpu, Ordering::Relaxed);
            slot.preempt_count.store(0, Ordering::Relaxed);
            slot.deadline.store(TIMER_DISARMED, Ordering::Release);
            *slot.parker.lock() = Some(thread::current());
            CURRENT_SLOT.with(|c| c.set(idx));
            return Self { idx };
        }
        panic!("host runtime: all {MAX_HOST_THREADS} thread slots in use");
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let slot = &SLOTS[self.idx];
        CURRENT_SLOT.with(|c| c.set(usize::MAX));
        *slot.parker.lock() = None;
        slot.deadline.store(TIMER_DISARMED, Ordering::Release);
        slot.occupied.store(false, Ordering::Release);
    }
}

fn current_slot() -> Option<&'static HostThread> {
    let idx = CURRENT_SLOT.with(|c| c.get());
    if idx == usize::MAX {
        None
    } else {
        Some(&SLOTS[idx])
    }
}

fn slot_handle(slot: &'static HostThread) -> ThreadHandle {
    slot as *const HostThread as ThreadHandle
}

fn slot_from(handle: ThreadHandle) -> &'static HostThread {
    // SAFETY: handles given out by this runtime are addresses of entries
    // in the static `SLOTS` table, valid for the program lifetime.
    unsafe { &*(handle as *const HostThread) }
}

// ---------------------------------------------------------------------------
// Service implementations
// ---------------------------------------------------------------------------

fn host_current_thread() -> ThreadHandle {
    let slot = current_slot()
        .expect("host runtime: calling thread is not registered (use spawn/with_current)");
    slot_handle(slot)
}

fn host_thread_cpu(thread: ThreadHandle) -> u32 {
    slot_from(thread).cpu.load(Ordering::Relaxed)
}

fn host_block_current_thread() {
    // The park token carries any wakeup delivered since the last park, so
    // an unblock racing the caller's predicate check makes this return
    // immediately instead of sleeping.
    thread::park();
}

fn host_unblock_thread(thread: ThreadHandle) -> c_int {
    match slot_from(thread).parker.lock().as_ref() {
        Some(parked) => {
            parked.unpark();
            0
        }
        None => -1,
    }
}

fn host_preempt_disable() {
    if let Some(slot) = current_slot() {
        slot.preempt_count.fetch_add(1, Ordering::Relaxed);
    }
}

fn host_preempt_enable() {
    if let Some(slot) = current_slot() {
        let prev = slot.preempt_count.fetch_sub(1, Ordering::Relaxed);
        debug_assert!(prev > 0, "preempt_count underflow");
    }
}

fn host_preempt_count() -> u32 {
    match current_slot() {
        Some(slot) => slot.preempt_count.load(Ordering::Relaxed),
        None => 0,
    }
}

fn host_timer_ticks() -> u64 {
    match EPOCH.get() {
        Some(epoch) => epoch.elapsed().as_millis() as u64,
        None => 0,
    }
}

fn host_timer_frequency() -> u32 {
    1000
}

fn host_timer_arm(thread: ThreadHandle, deadline_tick: u64) {
    slot_from(thread).deadline.store(deadline_tick, Ordering::Release);
}

fn host_timer_cancel(thread: ThreadHandle) {
    slot_from(thread).deadline.store(TIMER_DISARMED, Ordering::Release);
}

// ---------------------------------------------------------------------------
// Timer sweep
// ---------------------------------------------------------------------------

fn ticker_loop() {
    loop {
        let now = host_timer_ticks();
        for slot in SLOTS.iter() {
            if !slot.occupied.load(Ordering::Acquire) {
                continue;
            }
            let deadline = slot.deadline.load(Ordering::Acquire);
            if deadline == TIMER_DISARMED || !clock::tick_reached(now, deadline) {
                continue;
            }
            // Disarm exactly once, then deliver the wakeup. A concurrent
            // cancel that wins the exchange suppresses the delivery.
            if slot
                .deadline
                .compare_exchange(deadline, TIMER_DISARMED, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if let Some(parked) = slot.parker.lock().as_ref() {
                    parked.unpark();
                }
            }
        }
        thread::sleep(Duration::from_millis(1));
    }
}
