//! In-process history stack.
//!
//! [`MemoryHistory`] behaves like a browser's session history: `push_entry`
//! drops forward entries, `replace_entry` overwrites in place, and `step`
//! moves the pointer and queues a popstate event instead of delivering it
//! synchronously. The owner forwards queued events with
//! [`dispatch_pending`](MemoryHistory::dispatch_pending), which stands in for
//! the host's event loop delivering them.
//!
//! ```
//! use nav_guard::{HistoryStack, HistoryState, MemoryHistory};
//!
//! let history = MemoryHistory::new("/");
//! history.push_entry(HistoryState::indexed(1), "", "/users");
//! history.step(-1);
//! assert_eq!(history.location().href, "/");
//! assert_eq!(history.pending_events(), 1);
//! ```

use crate::context::{Navigator, PopDisposition};
use crate::host::{HistoryStack, Location};
use crate::state::HistoryState;
use crate::trace_log;
use std::cell::RefCell;
use std::collections::VecDeque;

/// One entry of a [`MemoryHistory`].
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryEntry {
    pub state: Option<HistoryState>,
    pub title: String,
    pub url: String,
}

#[derive(Debug)]
struct Inner {
    entries: Vec<MemoryEntry>,
    position: usize,
    events: VecDeque<Option<HistoryState>>,
    steps: Vec<isize>,
}

/// A session history held in memory.
#[derive(Debug)]
pub struct MemoryHistory {
    inner: RefCell<Inner>,
}

impl MemoryHistory {
    /// A history with a single, stateless entry at `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_entry(None, url)
    }

    /// A history with a single entry at `url` carrying `state`.
    pub fn with_entry(state: Option<HistoryState>, url: impl Into<String>) -> Self {
        Self {
            inner: RefCell::new(Inner {
                entries: vec![MemoryEntry {
                    state,
                    title: String::new(),
                    url: url.into(),
                }],
                position: 0,
                events: VecDeque::new(),
                steps: Vec::new(),
            }),
        }
    }

    /// Snapshot of every entry, oldest first.
    pub fn entries(&self) -> Vec<MemoryEntry> {
        self.inner.borrow().entries.clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Position of the active entry.
    pub fn position(&self) -> usize {
        self.inner.borrow().position
    }

    /// Every `step` delta requested so far, in order.
    pub fn steps(&self) -> Vec<isize> {
        self.inner.borrow().steps.clone()
    }

    /// Popstate events waiting to be delivered.
    pub fn pending_events(&self) -> usize {
        self.inner.borrow().events.len()
    }

    /// Simulate the user pressing back.
    pub fn user_back(&self) {
        self.step(-1);
    }

    /// Simulate the user pressing forward.
    pub fn user_forward(&self) {
        self.step(1);
    }

    /// Deliver the oldest queued popstate event to `navigator`.
    pub fn dispatch_next(&self, navigator: &Navigator) -> Option<PopDisposition> {
        let event = self.inner.borrow_mut().events.pop_front()?;
        Some(navigator.on_popstate(event.as_ref()))
    }

    /// Deliver queued popstate events to `navigator`, oldest first.
    ///
    /// Events queued while delivering (a rollback step, for instance) are
    /// delivered in the same call. Returns the number delivered.
    pub fn dispatch_pending(&self, navigator: &Navigator) -> usize {
        let mut delivered = 0;
        while self.dispatch_next(navigator).is_some() {
            delivered += 1;
        }
        delivered
    }
}

impl HistoryStack for MemoryHistory {
    fn push_entry(&self, state: HistoryState, title: &str, url: &str) {
        let mut inner = self.inner.borrow_mut();
        let keep = inner.position + 1;
        inner.entries.truncate(keep);
        inner.entries.push(MemoryEntry {
            state: Some(state),
            title: title.to_string(),
            url: url.to_string(),
        });
        inner.position = keep;
    }

    fn replace_entry(&self, state: HistoryState, title: &str, url: &str) {
        let mut inner = self.inner.borrow_mut();
        let position = inner.position;
        inner.entries[position] = MemoryEntry {
            state: Some(state),
            title: title.to_string(),
            url: url.to_string(),
        };
    }

    fn step(&self, delta: isize) {
        let mut inner = self.inner.borrow_mut();
        inner.steps.push(delta);
        let Some(target) = inner.position.checked_add_signed(delta) else {
            return;
        };
        if delta == 0 || target >= inner.entries.len() {
            return;
        }
        trace_log!("Memory history stepping {} to position {}", delta, target);
        inner.position = target;
        let state = inner.entries[target].state.clone();
        inner.events.push_back(state);
    }

    fn current_entry(&self) -> Option<HistoryState> {
        let inner = self.inner.borrow();
        inner.entries[inner.position].state.clone()
    }

    fn location(&self) -> Location {
        let inner = self.inner.borrow();
        Location::from_path(inner.entries[inner.position].url.clone())
    }

    fn title(&self) -> String {
        let inner = self.inner.borrow();
        inner.entries[inner.position].title.clone()
    }
}
