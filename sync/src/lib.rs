//! Sleeping synchronization primitives for the nimbus kernel.
//!
//! The centerpiece is [`Condvar`], a condition variable whose signal path
//! performs **wait morphing**: instead of waking a waiter so it can
//! re-contend for the predicate mutex, the signaller asks the mutex to
//! transfer ownership straight to the waiter, which resumes already
//! holding it. [`Mutex`] is the cooperating sleeping mutex that provides
//! the ownership-transfer operations the condvar consumes.
//!
//! Everything blocks and wakes through the `thread_runtime` service table
//! in `nimbus-lib`; this crate never talks to a scheduler directly.

#![cfg_attr(not(test), no_std)]

pub mod condvar;
pub mod mutex;
pub mod wait;

#[cfg(test)]
mod mutex_tests;

pub use condvar::{Condvar, WaitTimedOut};
pub use mutex::Mutex;
pub use wait::{WaitList, WaitRecord};
