use core::cell::Cell;
use core::ffi::c_int;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::kernel_services::thread_runtime::{
    self, ThreadHandle, ThreadRuntimeServices,
};
use crate::preempt::{self, PreemptGuard};

crate::define_service! {
    echo => EchoServices {
        double(x: u32) -> u32;
        ping();
    }
}

static PINGS: AtomicU32 = AtomicU32::new(0);

fn do_double(x: u32) -> u32 {
    x * 2
}

fn do_ping() {
    PINGS.fetch_add(1, Ordering::Relaxed);
}

static ECHO: EchoServices = EchoServices {
    double: do_double,
    ping: do_ping,
};

#[test]
fn service_table_registers_and_dispatches() {
    assert!(!is_echo_initialized());
    register_echo_services(&ECHO);
    assert!(is_echo_initialized());
    assert_eq!(double(21), 42);
    ping();
    assert!(PINGS.load(Ordering::Relaxed) >= 1);
}

// ---------------------------------------------------------------------------
// Preemption hooks against a stub runtime
// ---------------------------------------------------------------------------

std::thread_local! {
    static DEPTH: Cell<u32> = const { Cell::new(0) };
}

fn stub_current_thread() -> ThreadHandle {
    core::ptr::null_mut()
}

fn stub_thread_cpu(_thread: ThreadHandle) -> u32 {
    0
}

fn stub_block_current_thread() {}

fn stub_unblock_thread(_thread: ThreadHandle) -> c_int {
    0
}

fn stub_preempt_disable() {
    DEPTH.with(|d| d.set(d.get() + 1));
}

fn stub_preempt_enable() {
    DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
}

fn stub_preempt_count() -> u32 {
    DEPTH.with(|d| d.get())
}

fn stub_timer_ticks() -> u64 {
    0
}

fn stub_timer_frequency() -> u32 {
    0
}

fn stub_timer_arm(_thread: ThreadHandle, _deadline_tick: u64) {}

fn stub_timer_cancel(_thread: ThreadHandle) {}

static STUB_RUNTIME: ThreadRuntimeServices = ThreadRuntimeServices {
    current_thread: stub_current_thread,
    thread_cpu: stub_thread_cpu,
    block_current_thread: stub_block_current_thread,
    unblock_thread: stub_unblock_thread,
    preempt_disable: stub_preempt_disable,
    preempt_enable: stub_preempt_enable,
    preempt_count: stub_preempt_count,
    timer_ticks: stub_timer_ticks,
    timer_frequency: stub_timer_frequency,
    timer_arm: stub_timer_arm,
    timer_cancel: stub_timer_cancel,
};

#[test]
fn preempt_guard_nests_through_the_runtime_hooks() {
    thread_runtime::register_thread_runtime_services(&STUB_RUNTIME);
    assert_eq!(preempt::preempt_count(), 0);

    let outer = PreemptGuard::new();
    let inner = PreemptGuard::new();
    assert_eq!(preempt::preempt_count(), 2);
    assert!(preempt::is_preemption_disabled());

    drop(inner);
    assert_eq!(preempt::preempt_count(), 1);
    drop(outer);
    assert_eq!(preempt::preempt_count(), 0);
    assert!(!preempt::is_preemption_disabled());
}
