//! `define_service!` — declarative kernel service tables.
//!
//! Expands a service declaration into:
//!
//! * a `pub struct` of plain function pointers (one field per method),
//! * a private [`ServiceCell`](crate::ServiceCell) holding the registered
//!   table,
//! * `register_<name>_services()`, `<name>_services()` and
//!   `is_<name>_initialized()`,
//! * one `#[inline]` free-function wrapper per method, so call sites read
//!   like ordinary function calls.
//!
//! ```ignore
//! crate::define_service! {
//!     thread_runtime => ThreadRuntimeServices {
//!         current_thread() -> ThreadHandle;
//!         unblock_thread(thread: ThreadHandle) -> c_int;
//!     }
//! }
//! ```

#[macro_export]
macro_rules! define_service {
    (
        $(#[$attr:meta])*
        $name:ident => $table:ident {
            $(
                $method:ident ( $( $arg:ident : $argty:ty ),* $(,)? ) $( -> $ret:ty )? ;
            )*
        }
    ) => {
        $(#[$attr])*
        #[derive(Clone, Copy)]
        pub struct $table {
            $( pub $method: fn( $( $argty ),* ) $( -> $ret )?, )*
        }

        $crate::paste::paste! {
            static [<$name:upper _SERVICES>]: $crate::ServiceCell<$table> =
                $crate::ServiceCell::new();

            /// Install the service table. Called once during runtime bring-up.
            pub fn [<register_ $name _services>](table: &'static $table) {
                [<$name:upper _SERVICES>].register(table);
            }

            pub fn [<$name _services>]() -> &'static $table {
                [<$name:upper _SERVICES>].expect(stringify!($name))
            }

            pub fn [<is_ $name _initialized>]() -> bool {
                [<$name:upper _SERVICES>].is_registered()
            }

            $(
                #[inline(always)]
                pub fn $method( $( $arg: $argty ),* ) $( -> $ret )? {
                    ([<$name _services>]().$method)( $( $arg ),* )
                }
            )*
        }
    };
}
