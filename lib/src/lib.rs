#![cfg_attr(not(any(test, feature = "testing")), no_std)]

pub mod clock;
pub mod kernel_services;
pub mod klog;
pub mod preempt;
pub mod service_cell;
pub mod service_macro;
pub mod spinlock;

#[cfg(feature = "testing")]
pub mod testing;

#[cfg(test)]
mod klog_tests;
#[cfg(test)]
mod service_tests;
#[cfg(test)]
mod spinlock_tests;

#[doc(hidden)]
pub use paste;

pub use klog::{KlogLevel, klog_get_level, klog_register_backend, klog_set_level};
pub use preempt::{PreemptGuard, is_preemption_disabled, preempt_count};
pub use service_cell::ServiceCell;
pub use spinlock::{SpinMutex, SpinMutexGuard};
