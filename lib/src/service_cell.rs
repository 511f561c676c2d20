//! One-shot registration cell for kernel service tables.
//!
//! A `ServiceCell` holds a pointer to a `'static` table of function
//! pointers. The hosting runtime registers the table once during bring-up;
//! consumers reach it through the accessors generated by
//! [`define_service!`](crate::define_service). Using a table before
//! registration is a bring-up ordering bug and panics with the service
//! name.

use core::sync::atomic::{AtomicPtr, Ordering};

pub struct ServiceCell<T: 'static> {
    table: AtomicPtr<T>,
}

impl<T: 'static> ServiceCell<T> {
    pub const fn new() -> Self {
        Self {
            table: AtomicPtr::new(core::ptr::null_mut()),
        }
    }

    /// Install `table`. The last registration wins; re-registering with the
    /// same table is a no-op, which lets test processes initialise the
    /// runtime from every entry point.
    pub fn register(&self, table: &'static T) {
        self.table
            .store(table as *const T as *mut T, Ordering::Release);
    }

    pub fn is_registered(&self) -> bool {
        !self.table.load(Ordering::Acquire).is_null()
    }

    pub fn get(&self) -> Option<&'static T> {
        let ptr = self.table.load(Ordering::Acquire);
        if ptr.is_null() {
            return None;
        }
        // SAFETY: `register` only stores pointers derived from `&'static T`,
        // so a non-null load refers to a live table for the program lifetime.
        Some(unsafe { &*ptr })
    }

    /// Like [`get`](Self::get), but a missing registration is fatal.
    pub fn expect(&self, name: &str) -> &'static T {
        match self.get() {
            Some(table) => table,
            None => panic!("kernel service `{name}` used before registration"),
        }
    }
}

impl<T: 'static> Default for ServiceCell<T> {
    fn default() -> Self {
        Self::new()
    }
}
