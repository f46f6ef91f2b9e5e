//! Crate-internal `error!`, `warn!`, `info!`, `debug!` and `trace!`.
//!
//! Every event is emitted under the [`TARGET`] target so a subscriber can filter the pool and
//! the scanner together (`RUST_LOG=approval_scanner=debug`). Identifiers travel as structured
//! fields (`service_id`, `url`, `latency_ms`, `error`) and the message literal comes last,
//! optionally with format arguments.
//!
//! Without the `tracing` feature each call still borrows its field expressions and discards
//! them, so disabling logging never changes which values are computed.

pub(crate) const TARGET: &str = "approval_scanner";

macro_rules! error {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::error!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(not(feature = "tracing"))]
        $crate::__trace_consume!($($arg)*);
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::warn!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(not(feature = "tracing"))]
        $crate::__trace_consume!($($arg)*);
    }};
}

macro_rules! info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::info!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(not(feature = "tracing"))]
        $crate::__trace_consume!($($arg)*);
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::debug!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(not(feature = "tracing"))]
        $crate::__trace_consume!($($arg)*);
    }};
}

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "tracing")]
        tracing::trace!(target: $crate::logging::TARGET, $($arg)*);
        #[cfg(not(feature = "tracing"))]
        $crate::__trace_consume!($($arg)*);
    }};
}

#[doc(hidden)]
#[macro_export]
#[cfg(not(feature = "tracing"))]
macro_rules! __trace_consume {
    ($field:ident = % $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__trace_consume!($($rest)*); }
    };
    ($field:ident = ? $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__trace_consume!($($rest)*); }
    };
    ($field:ident = $value:expr, $($rest:tt)*) => {
        { let _ = &$value; $crate::__trace_consume!($($rest)*); }
    };
    ($lit:literal $(, $value:expr)* $(,)?) => {
        { $( let _ = &$value; )* }
    };
    () => {};
}
