//! Test support.
//!
//! The [`host`] module implements the `thread_runtime` service table on
//! top of OS threads so kernel-shaped code in this tree can be exercised
//! by ordinary `cargo test` runs. Compiled only with the `testing`
//! feature; production kernels register their own table instead.

pub mod host;

pub use host::{init as host_init, spawn, with_current};
