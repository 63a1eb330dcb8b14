//! # nav-guard
//!
//! A navigation guard for single-page applications. It sits between the
//! application router and the host's session history and lets application
//! code:
//!
//! - **block** navigation outright ([`Navigator::prevent_navigation`]),
//! - **confirm** navigation through async callbacks
//!   ([`Navigator::before_navigate`]),
//! - know **how deep** the user is in this tab's history
//!   ([`Navigator::can_go_back`]), even across cancelled, replayed, and
//!   redirected navigations.
//!
//! ## Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`state`] | history entry state and the authoritative `current` index |
//! | [`lifecycle`] | attaches host listeners only while they are needed |
//! | [`guards`] | preventions and before-navigate callbacks |
//! | [`context`] | the [`Navigator`] state machine |
//! | [`host`] | traits for the history stack, router, and event loop |
//! | [`settle`] | timed wait for the host to reach an expected entry |
//!
//! ## Example
//!
//! ```ignore
//! use nav_guard::{callback_fn, Navigator, StartOptions};
//! use std::rc::Rc;
//!
//! let navigator = Navigator::new(history, listeners, scheduler);
//! let after_start = navigator.before_start(StartOptions::new().start_paths(["/"]))?;
//! navigator.init(&page_events, router)?;
//! after_start.finish();
//!
//! let unsaved = navigator.before_navigate(
//!     Rc::new(callback_fn(|_url: &str| Some(confirm_discard()))),
//!     true,
//! );
//! // ...
//! unsaved.dispose();
//! ```

pub mod logging;

pub mod context;
pub mod error;
pub mod guards;
pub mod host;
pub mod lifecycle;
#[cfg(feature = "memory")]
pub mod memory;
pub mod settle;
pub mod state;

pub use context::{
    AfterStart, ClickDisposition, Disposer, Fallback, NavState, Navigator, PopDisposition,
    StartOptions, UNLOAD_PROMPT,
};
pub use error::{CallbackError, ErrorHook, NavigationOutcome, NavigatorError};
pub use guards::{
    async_callback_fn, callback_fn, AsyncFnCallback, FnCallback, InterceptionRegistry,
    NavigationCallback, PreventionToken, Verdict,
};
pub use host::{
    GotoOptions, HistoryStack, HostListeners, LinkClick, ListenerKind, Location, PageEvents,
    PreloadContext, Router, Scheduler,
};
pub use lifecycle::{ListenerDemand, ListenerLifecycle};
#[cfg(feature = "memory")]
pub use memory::{MemoryEntry, MemoryHistory};
pub use settle::{wait_until, Settlement, DEFAULT_SETTLE_TIMEOUT};
pub use state::{HistoryIndexStore, HistoryState, StagedIndex, WatchId};
