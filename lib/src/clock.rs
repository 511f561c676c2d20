//! Tick arithmetic over the runtime's timer.
//!
//! The timer exposes a monotonically-increasing tick counter and its
//! frequency; everything here is derived from those two numbers. Safe to
//! call from any context. Before the thread runtime is registered every
//! accessor returns `0` and deadlines degenerate to "now".

use crate::kernel_services::thread_runtime;

/// Wrap-safe "has `deadline_tick` been reached" comparison. Correct for
/// any pair of ticks less than half the counter range apart.
#[inline]
pub fn tick_reached(now_tick: u64, deadline_tick: u64) -> bool {
    now_tick.wrapping_sub(deadline_tick) < (1u64 << 63)
}

/// Convert a millisecond duration to timer ticks, rounding up so a
/// non-zero wait never becomes a zero-tick deadline.
pub fn ms_to_ticks(ms: u64) -> u64 {
    let freq = timer_frequency() as u64;
    if freq == 0 {
        return ms.max(1);
    }
    let ticks = ms.saturating_mul(freq).saturating_add(999) / 1000;
    ticks.max(1)
}

/// Absolute tick deadline `ms` milliseconds from now.
pub fn deadline_after_ms(ms: u64) -> u64 {
    timer_ticks().wrapping_add(ms_to_ticks(ms))
}

/// System uptime in milliseconds, derived from ticks and frequency.
pub fn uptime_ms() -> u64 {
    let freq = timer_frequency() as u64;
    if freq == 0 {
        return 0;
    }
    timer_ticks().saturating_mul(1000) / freq
}

#[inline]
fn timer_ticks() -> u64 {
    if thread_runtime::is_thread_runtime_initialized() {
        thread_runtime::timer_ticks()
    } else {
        0
    }
}

#[inline]
fn timer_frequency() -> u32 {
    if thread_runtime::is_thread_runtime_initialized() {
        thread_runtime::timer_frequency()
    } else {
        0
    }
}
