//! Preventions and before-navigate callbacks.
//!
//! A navigation must pass two checks before it proceeds:
//!
//! | Check | Registered with | Effect |
//! |-------|-----------------|--------|
//! | Hard block | [`InterceptionRegistry::add_prevention`] | refuses outright, nothing else runs |
//! | Soft gate | [`InterceptionRegistry::add_callback`] | every callback is asked; one `false` denies |
//!
//! Callbacks may be asynchronous. They all run concurrently and the gate
//! waits for every one of them. Only an explicit `Some(false)` is an
//! objection: `Some(true)` and `None` both let the navigation through.
//!
//! # Example
//!
//! ```
//! use nav_guard::{callback_fn, NavigationCallback};
//! use std::rc::Rc;
//!
//! let unsaved = true;
//! let confirm: Rc<dyn NavigationCallback> = Rc::new(callback_fn(move |url: &str| {
//!     if unsaved && !url.starts_with("/editor") {
//!         Some(false)
//!     } else {
//!         None
//!     }
//! }));
//! # let _ = confirm;
//! ```

use crate::error::{CallbackError, Result};
use crate::lifecycle::ListenerDemand;
use crate::trace_log;
use futures_util::future::{self, LocalBoxFuture};
use std::future::Future;
use std::rc::Rc;

/// What a callback answered: `Some(false)` objects, anything else does not.
pub type Verdict = Option<bool>;

// ============================================================================
// NavigationCallback trait
// ============================================================================

/// A before-navigate check.
///
/// Receives the candidate URL. Returning `Err` signals a bug in the callback
/// and is surfaced to the caller of the navigation; it does not count as a
/// deny.
///
/// Callbacks are registered by identity: registering the same `Rc` twice
/// updates its confirm-on-close flag instead of adding a second entry.
pub trait NavigationCallback {
    fn check(&self, url: &str) -> LocalBoxFuture<'static, Result<Verdict, CallbackError>>;
}

// ============================================================================
// callback_fn helpers
// ============================================================================

/// Create a callback from a synchronous closure.
pub const fn callback_fn<F>(f: F) -> FnCallback<F>
where
    F: Fn(&str) -> Verdict + 'static,
{
    FnCallback { f }
}

/// Callback created from a synchronous closure.
pub struct FnCallback<F> {
    f: F,
}

impl<F> NavigationCallback for FnCallback<F>
where
    F: Fn(&str) -> Verdict + 'static,
{
    fn check(&self, url: &str) -> LocalBoxFuture<'static, Result<Verdict, CallbackError>> {
        Box::pin(future::ready(Ok((self.f)(url))))
    }
}

/// Create a callback from a closure returning a future.
///
/// ```
/// use nav_guard::{async_callback_fn, CallbackError};
///
/// let confirm = async_callback_fn(|url: String| async move {
///     Ok::<_, CallbackError>(Some(!url.contains("danger")))
/// });
/// # let _ = confirm;
/// ```
pub const fn async_callback_fn<F, Fut>(f: F) -> AsyncFnCallback<F>
where
    F: Fn(String) -> Fut + 'static,
    Fut: Future<Output = Result<Verdict, CallbackError>> + 'static,
{
    AsyncFnCallback { f }
}

/// Callback created from an async closure.
pub struct AsyncFnCallback<F> {
    f: F,
}

impl<F, Fut> NavigationCallback for AsyncFnCallback<F>
where
    F: Fn(String) -> Fut + 'static,
    Fut: Future<Output = Result<Verdict, CallbackError>> + 'static,
{
    fn check(&self, url: &str) -> LocalBoxFuture<'static, Result<Verdict, CallbackError>> {
        Box::pin((self.f)(url.to_string()))
    }
}

// ============================================================================
// InterceptionRegistry
// ============================================================================

/// Identifies one registered prevention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreventionToken(u64);

#[derive(Debug)]
struct Prevention {
    token: PreventionToken,
    confirm_on_close: bool,
}

struct CallbackEntry {
    callback: Rc<dyn NavigationCallback>,
    confirm_on_close: bool,
}

/// The active preventions and callbacks.
#[derive(Default)]
pub struct InterceptionRegistry {
    next_token: u64,
    preventions: Vec<Prevention>,
    callbacks: Vec<CallbackEntry>,
}

impl InterceptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hard block. Structurally identical preventions are still
    /// distinct: each gets its own token.
    pub fn add_prevention(&mut self, confirm_on_close: bool) -> PreventionToken {
        let token = PreventionToken(self.next_token);
        self.next_token += 1;
        self.preventions.push(Prevention {
            token,
            confirm_on_close,
        });
        token
    }

    /// Remove exactly the prevention behind `token`. Returns `false` if it
    /// was already removed.
    pub fn remove_prevention(&mut self, token: PreventionToken) -> bool {
        match self.preventions.iter().position(|p| p.token == token) {
            Some(position) => {
                self.preventions.remove(position);
                true
            }
            None => false,
        }
    }

    /// Register `callback`, or update its flag if this `Rc` is already
    /// registered.
    pub fn add_callback(&mut self, callback: Rc<dyn NavigationCallback>, confirm_on_close: bool) {
        if let Some(entry) = self
            .callbacks
            .iter_mut()
            .find(|entry| Rc::ptr_eq(&entry.callback, &callback))
        {
            entry.confirm_on_close = confirm_on_close;
        } else {
            self.callbacks.push(CallbackEntry {
                callback,
                confirm_on_close,
            });
        }
    }

    /// Remove `callback` by identity. Returns `false` if it was not
    /// registered.
    pub fn remove_callback(&mut self, callback: &Rc<dyn NavigationCallback>) -> bool {
        match self
            .callbacks
            .iter()
            .position(|entry| Rc::ptr_eq(&entry.callback, callback))
        {
            Some(position) => {
                self.callbacks.remove(position);
                true
            }
            None => false,
        }
    }

    /// True iff any prevention exists.
    pub fn has_hard_block(&self) -> bool {
        !self.preventions.is_empty()
    }

    pub fn has_callbacks(&self) -> bool {
        !self.callbacks.is_empty()
    }

    pub fn prevention_count(&self) -> usize {
        self.preventions.len()
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Listener demand derived from the current registrations.
    pub fn demand(&self) -> ListenerDemand {
        ListenerDemand {
            click_intercept: self.has_hard_block() || self.has_callbacks(),
            unload_prompt: self.preventions.iter().any(|p| p.confirm_on_close)
                || self.callbacks.iter().any(|c| c.confirm_on_close),
        }
    }

    /// Start every registered callback for `url`.
    ///
    /// The returned future owns its callbacks, so the registry may change (or
    /// be borrowed elsewhere) while it runs.
    pub fn run_callbacks(&self, url: &str) -> LocalBoxFuture<'static, Result<bool, CallbackError>> {
        let checks: Vec<_> = self
            .callbacks
            .iter()
            .map(|entry| entry.callback.check(url))
            .collect();
        let url = url.to_string();
        Box::pin(async move {
            let verdicts = future::try_join_all(checks).await?;
            trace_log!("Callback verdicts for '{}': {:?}", url, verdicts);
            Ok(!verdicts.contains(&Some(false)))
        })
    }
}

impl std::fmt::Debug for InterceptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptionRegistry")
            .field("preventions", &self.preventions)
            .field("callbacks", &self.callbacks.len())
            .finish_non_exhaustive()
    }
}
