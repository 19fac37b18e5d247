//! Adapter dispatch macros for reducing code duplication.
//!
//! This module provides declarative macros that forward calls on the
//! [`AnyAdapter`](crate::db::AnyAdapter) enum to the concrete engine adapter.
//! The macros expand at compile time with zero runtime overhead.

/// Macro for generating adapter dispatch match arms.
///
/// Binds the concrete adapter to `$a` in every arm and evaluates `$body`,
/// so adding an engine means adding one variant to the list below.
///
/// # Example
///
/// ```ignore
/// impl_adapter_dispatch!(self, a => a.connect().await)
/// ```
#[macro_export]
macro_rules! impl_adapter_dispatch {
    ($adapter:expr, $a:ident => $body:expr) => {
        match $adapter {
            $crate::db::AnyAdapter::SqlServer($a) => $body,
        }
    };
}

pub use impl_adapter_dispatch;
