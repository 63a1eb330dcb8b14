//! Error handling for the navigation guard.
//!
//! Two kinds of result come out of a navigation attempt:
//!
//! - [`NavigationOutcome`]: the normal result. A navigation that a hard block
//!   or a callback refuses is `Blocked` or `Denied`. Neither is an error.
//! - [`NavigatorError`]: usage errors (double initialisation, navigating
//!   before `init`, `back()` with nowhere to go) and failures from
//!   collaborators (a callback that errored, a router that failed).
//!
//! Confirmations for clicks and back/forward gestures run as detached tasks.
//! Their errors cannot be returned to a caller. They are logged, then passed to
//! the [`ErrorHook`] installed with
//! [`Navigator::on_error`](crate::Navigator::on_error).
//!
//! # Examples
//!
//! ```
//! use nav_guard::{NavigationOutcome, NavigatorError};
//!
//! let outcome = NavigationOutcome::Denied { url: "/checkout".into() };
//! assert!(!outcome.is_navigated());
//!
//! let err = NavigatorError::NotInitialized;
//! assert_eq!(err.to_string(), "Not initialized");
//! ```

use std::rc::Rc;

/// Outcome of a navigation attempt that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The router was asked to navigate.
    Navigated { url: String },
    /// A before-navigate callback objected.
    Denied { url: String },
    /// At least one prevention was active, so nothing was consulted.
    Blocked,
    /// Another navigation was still awaiting confirmation or rolling back.
    Busy,
}

impl NavigationOutcome {
    /// Check if the router was asked to navigate
    pub fn is_navigated(&self) -> bool {
        matches!(self, NavigationOutcome::Navigated { .. })
    }

    /// Check if a callback denied the navigation
    pub fn is_denied(&self) -> bool {
        matches!(self, NavigationOutcome::Denied { .. })
    }

    /// Check if a prevention blocked the navigation
    pub fn is_blocked(&self) -> bool {
        matches!(self, NavigationOutcome::Blocked)
    }

    /// Target URL, when the attempt got far enough to have one.
    pub fn url(&self) -> Option<&str> {
        match self {
            NavigationOutcome::Navigated { url } | NavigationOutcome::Denied { url } => Some(url),
            _ => None,
        }
    }
}

/// Failure reported by a before-navigate callback.
///
/// A callback error is a bug in the callback. It is never treated as a deny.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    /// Create a callback error with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message the callback reported.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors returned by [`Navigator`](crate::Navigator) operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NavigatorError {
    /// `before_start` was called twice.
    #[error("Already started")]
    AlreadyStarted,

    /// `init` was called twice.
    #[error("Already initialized")]
    AlreadyInitialized,

    /// `goto` or `back` was called before `init`.
    #[error("Not initialized")]
    NotInitialized,

    /// `back()` had no history, no fallback, and no start path.
    #[error("Could not go back")]
    NoFallback,

    /// A before-navigate callback failed.
    #[error("Navigation callback failed: {0}")]
    Callback(#[from] CallbackError),

    /// The external router failed to navigate.
    #[error("Router failed: {message}")]
    Router { message: String },
}

impl NavigatorError {
    /// Usage errors are caller bugs and are never worth retrying.
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            NavigatorError::AlreadyStarted
                | NavigatorError::AlreadyInitialized
                | NavigatorError::NotInitialized
                | NavigatorError::NoFallback
        )
    }
}

/// Convenience alias used across the crate.
pub type Result<T, E = NavigatorError> = std::result::Result<T, E>;

/// Handler for errors raised by detached confirmation tasks.
pub type ErrorHook = Rc<dyn Fn(&NavigatorError)>;
