//! Logging facade.
//!
//! The guard logs through one of two backends, selected by feature flag:
//!
//! | Feature    | Backend         | Default |
//! |------------|-----------------|---------|
//! | `log`      | `log` crate     | yes     |
//! | `tracing`  | `tracing` crate | no      |
//!
//! Enable at most one. With neither enabled the macros expand to nothing.
//!
//! The state machine logs at these levels:
//!
//! - `trace_log!`: per-callback verdicts, settle poll results.
//! - `debug_log!`: listener attach/detach, staged index overrides, rollbacks.
//! - `info_log!`: start/init, accepted or denied navigations.
//! - `warn_log!`: host-timing anomalies, gestures rejected mid-flight.
//! - `error_log!`: failures inside detached confirmation tasks.
//!
//! ```ignore
//! use nav_guard::{debug_log, warn_log};
//!
//! debug_log!("Rolling back {} step(s) to index {}", delta, current);
//! warn_log!("Host did not settle at index {} in time", current);
//! ```

/// Emit a **trace**-level log message.
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::trace!($($arg)*);
        #[cfg(feature = "log")]
        ::log::trace!($($arg)*);
    };
}

/// Emit a **debug**-level log message.
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::debug!($($arg)*);
        #[cfg(feature = "log")]
        ::log::debug!($($arg)*);
    };
}

/// Emit an **info**-level log message.
#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::info!($($arg)*);
        #[cfg(feature = "log")]
        ::log::info!($($arg)*);
    };
}

/// Emit a **warn**-level log message.
#[macro_export]
macro_rules! warn_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::warn!($($arg)*);
        #[cfg(feature = "log")]
        ::log::warn!($($arg)*);
    };
}

/// Emit an **error**-level log message.
///
/// Used for failures that happen in detached tasks and so have no caller to
/// return to.
#[macro_export]
macro_rules! error_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "tracing")]
        ::tracing::error!($($arg)*);
        #[cfg(feature = "log")]
        ::log::error!($($arg)*);
    };
}
