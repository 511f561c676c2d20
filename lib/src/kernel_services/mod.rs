//! Service tables wiring this tree to the hosting kernel.
//!
//! Everything the sync subsystem needs from its environment — scheduler
//! blocking, preemption control, timers — arrives through a table of
//! function pointers registered during bring-up. The subsystem itself has
//! no link-time dependency on any particular scheduler; a production
//! kernel registers its scheduler here, and the hosted test runtime
//! registers a `std::thread`-backed one.

pub mod thread_runtime;
