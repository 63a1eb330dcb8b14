//! Interfaces to the environment the guard runs in.
//!
//! The guard never owns the session history, the DOM, or the router. It
//! reaches them through these traits:
//!
//! | Trait | Stands for |
//! |-------|------------|
//! | [`HistoryStack`] | the host's session history (push/replace/step) |
//! | [`HostListeners`] | attaching the click and unload listeners |
//! | [`Scheduler`] | the host event loop: tasks, ticks, frames, timers |
//! | [`Router`] | the application router that renders pages |
//! | [`PageEvents`] | "a navigation completed" notifications |
//! | [`PreloadContext`] | the redirect primitive available while preloading |
//!
//! Events flow the other way through [`Navigator`](crate::Navigator) methods:
//! the host calls [`on_popstate`](crate::Navigator::on_popstate),
//! [`on_link_click`](crate::Navigator::on_link_click) and
//! [`on_before_unload`](crate::Navigator::on_before_unload).
//!
//! Everything here is single-threaded; none of the traits require `Send`.

use crate::error::Result;
use crate::state::HistoryState;
use futures_util::future::LocalBoxFuture;
use std::time::Duration;

/// The host's current location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    /// Full URL of the active entry.
    pub href: String,
    /// Path component of `href`.
    pub pathname: String,
}

impl Location {
    /// Build a location from a path-only href, such as `/users/7`.
    pub fn from_path(path: impl Into<String>) -> Self {
        let href = path.into();
        let pathname = href
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string();
        Self { href, pathname }
    }
}

/// The host's session history.
///
/// Methods take `&self`: the host stack is shared, externally mutated state.
/// Implementations must not call back into the navigator synchronously;
/// `step` in particular reports its result later through
/// [`Navigator::on_popstate`](crate::Navigator::on_popstate).
pub trait HistoryStack {
    /// Push a new entry after the active one, discarding forward entries.
    fn push_entry(&self, state: HistoryState, title: &str, url: &str);

    /// Overwrite the active entry.
    fn replace_entry(&self, state: HistoryState, title: &str, url: &str);

    /// Move the active pointer by `delta` entries. Negative is back.
    fn step(&self, delta: isize);

    /// State of the active entry, `None` if it carries no state.
    fn current_entry(&self) -> Option<HistoryState>;

    /// Location of the active entry.
    fn location(&self) -> Location;

    /// Document title, reused when entries are rewritten.
    fn title(&self) -> String {
        String::new()
    }
}

/// The two host listeners the guard installs on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Capture-phase link click interception.
    ClickIntercept,
    /// The "leave this page?" prompt on unload.
    UnloadPrompt,
}

/// Attaches and detaches host listeners.
///
/// The guard only calls `attach` for a detached listener and `detach` for an
/// attached one.
pub trait HostListeners {
    /// Start delivering events of this kind to the navigator.
    fn attach(&self, kind: ListenerKind);

    /// Stop delivering events of this kind.
    fn detach(&self, kind: ListenerKind);
}

/// The host event loop.
pub trait Scheduler {
    /// Run a detached task to completion.
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);

    /// Run `task` on the next macrotask, after the host's pending history
    /// mutation has been applied.
    fn defer(&self, task: Box<dyn FnOnce()>);

    /// Resolve on the next animation frame.
    fn next_frame(&self) -> LocalBoxFuture<'static, ()>;

    /// Resolve after `duration`.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Options understood by [`Router::goto`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GotoOptions {
    /// Skip before-navigate callbacks.
    pub force: bool,
    /// Keep the scroll position.
    pub noscroll: bool,
    /// Replace the active entry instead of pushing.
    pub replace_state: bool,
    /// Extra state merged into the new entry.
    pub state: Option<serde_json::Map<String, serde_json::Value>>,
}

impl GotoOptions {
    /// Default options: push, scroll, gated by callbacks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bypass callback gating.
    pub fn force(mut self) -> Self {
        self.force = true;
        self
    }

    /// Keep the scroll position.
    pub fn noscroll(mut self) -> Self {
        self.noscroll = true;
        self
    }

    /// Replace the active entry.
    pub fn replace_state(mut self) -> Self {
        self.replace_state = true;
        self
    }

    /// Merge `state` into the new entry.
    pub fn with_state(mut self, state: serde_json::Map<String, serde_json::Value>) -> Self {
        self.state = Some(state);
        self
    }
}

/// The application router.
pub trait Router {
    /// Navigate to `url`. Resolves once the navigation has been applied.
    fn goto(&self, url: &str, options: &GotoOptions) -> LocalBoxFuture<'static, Result<()>>;
}

/// Source of "a navigation completed" notifications.
pub trait PageEvents {
    /// Register `callback` to run once per completed navigation.
    fn subscribe(&self, callback: Box<dyn Fn()>);
}

/// Redirect primitive available while a page preloads.
pub trait PreloadContext {
    /// Redirect to `path` with an HTTP-style status code.
    fn redirect(&self, status_code: u16, path: &str);
}

/// A click delivered by the capture-phase click listener.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClick {
    /// Mouse button, `0` for the primary button.
    pub button: i16,
    pub meta_key: bool,
    pub ctrl_key: bool,
    pub shift_key: bool,
    pub alt_key: bool,
    /// Resolved `href` of the closest enclosing anchor, if any.
    pub href: Option<String>,
    /// The anchor carries a `download` attribute.
    pub download: bool,
}

impl LinkClick {
    /// A plain primary-button click on an anchor pointing at `href`.
    pub fn anchor(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Self::default()
        }
    }

    /// Href of a plain click on a regular anchor, `None` for anything the
    /// guard should leave to the host.
    pub fn navigable_href(&self) -> Option<&str> {
        if self.button != 0 || self.meta_key || self.ctrl_key || self.shift_key || self.alt_key {
            return None;
        }
        if self.download {
            return None;
        }
        self.href.as_deref().filter(|href| !href.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_from_path() {
        let location = Location::from_path("/users/7?tab=posts#top");
        assert_eq!(location.pathname, "/users/7");
        assert_eq!(location.href, "/users/7?tab=posts#top");
    }

    #[test]
    fn test_plain_click_is_navigable() {
        let click = LinkClick::anchor("/about");
        assert_eq!(click.navigable_href(), Some("/about"));
    }

    #[test]
    fn test_modified_clicks_are_not_navigable() {
        let mut click = LinkClick::anchor("/about");
        click.ctrl_key = true;
        assert_eq!(click.navigable_href(), None);

        let mut click = LinkClick::anchor("/about");
        click.button = 1;
        assert_eq!(click.navigable_href(), None);

        let mut click = LinkClick::anchor("/report.pdf");
        click.download = true;
        assert_eq!(click.navigable_href(), None);

        assert_eq!(LinkClick::default().navigable_href(), None);
    }

    #[test]
    fn test_goto_options_builder() {
        let opts = GotoOptions::new().force().replace_state();
        assert!(opts.force);
        assert!(opts.replace_state);
        assert!(!opts.noscroll);
        assert!(opts.state.is_none());
    }
}
