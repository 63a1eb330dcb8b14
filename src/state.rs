//! History entries and the authoritative history index.
//!
//! Every entry the guard touches carries its position in the host stack under
//! the key `"i"`, next to whatever extra state the application stored there:
//!
//! ```text
//! {"i": 2, "scroll": 480}
//! ```
//!
//! [`HistoryIndexStore`] owns the single `current` index and is the only
//! place that reads or assigns that key. An index of `0` is a real index;
//! absence is always `None`.

use crate::host::HistoryStack;
use crate::{debug_log, trace_log};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// HistoryState
// ============================================================================

/// State stored in one host history entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryState {
    #[serde(rename = "i", default, skip_serializing_if = "Option::is_none")]
    index: Option<usize>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl HistoryState {
    /// Empty state with no index.
    pub fn new() -> Self {
        Self::default()
    }

    /// State carrying only an index.
    pub fn indexed(index: usize) -> Self {
        Self {
            index: Some(index),
            extra: Map::new(),
        }
    }

    /// Same state with `index` set.
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Same state with `extra` merged over the existing bag.
    pub fn with_extra(mut self, extra: Map<String, Value>) -> Self {
        self.merge(extra);
        self
    }

    /// Index stored in this entry, if any.
    pub fn index(&self) -> Option<usize> {
        self.index
    }

    /// The application's extra state.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Merge `extra` over the existing bag. The index is never touched.
    pub fn merge(&mut self, extra: Map<String, Value>) {
        for (key, value) in extra {
            if key != "i" {
                self.extra.insert(key, value);
            }
        }
    }
}

// ============================================================================
// StagedIndex
// ============================================================================

/// A one-shot override for the next index assignment.
///
/// Staged by paths that know the next organic entry is not a simple `+1`
/// step: replace navigations, redirects, and accepted back/forward gestures.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedIndex {
    pub index: usize,
    pub extra: Option<Map<String, Value>>,
}

impl StagedIndex {
    pub fn new(index: usize) -> Self {
        Self { index, extra: None }
    }

    pub fn with_extra(index: usize, extra: Option<Map<String, Value>>) -> Self {
        Self { index, extra }
    }
}

// ============================================================================
// HistoryIndexStore
// ============================================================================

/// Holds `current`, the index of the entry the application believes is
/// active, plus the staged override.
///
/// Mutators that move `current` return `Some(can_go_back)` so the owner can
/// republish the derived signal once it has released its borrows.
#[derive(Debug, Default)]
pub struct HistoryIndexStore {
    current: usize,
    staged: Option<StagedIndex>,
}

impl HistoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last reconciled index.
    pub fn current(&self) -> usize {
        self.current
    }

    /// `current > 0`.
    pub fn can_go_back(&self) -> bool {
        self.current > 0
    }

    /// The pending override, if one is staged.
    pub fn staged(&self) -> Option<&StagedIndex> {
        self.staged.as_ref()
    }

    /// Stage an override, replacing any earlier one.
    pub fn stage(&mut self, staged: StagedIndex) {
        debug_log!("Staging index override {}", staged.index);
        self.staged = Some(staged);
    }

    /// Index stored in the host's active entry.
    pub fn host_index(&self, history: &dyn HistoryStack) -> Option<usize> {
        history.current_entry().and_then(|state| state.index)
    }

    /// Whether the host's active entry is the one at `current`.
    pub fn host_is_at_current(&self, history: &dyn HistoryStack) -> bool {
        self.host_index(history) == Some(self.current)
    }

    /// Move `current` directly.
    pub fn set_current(&mut self, index: usize) -> Option<bool> {
        self.current = index;
        Some(self.can_go_back())
    }

    /// The host's active entry carries `index`; adopt it.
    ///
    /// The staged override is cleared: it was meant for an unindexed entry.
    pub fn on_settled_entry(&mut self, index: usize) -> Option<bool> {
        trace_log!("Host settled at index {}", index);
        self.staged = None;
        self.set_current(index)
    }

    /// The host's active entry has no index; assign one.
    ///
    /// Uses the staged override when present, else `current + 1`. The staged
    /// override is cleared in both cases. Returns the entry state to write
    /// back to the host and the republish signal.
    pub fn on_unindexed_entry(&mut self, entry: Option<HistoryState>) -> (HistoryState, Option<bool>) {
        let mut state = entry.unwrap_or_default();
        let index = match self.staged.take() {
            Some(StagedIndex { index, extra }) => {
                if let Some(extra) = extra {
                    state.merge(extra);
                }
                index
            }
            None => self.current + 1,
        };
        debug_log!("Assigning index {} to unindexed entry", index);
        state.index = Some(index);
        let signal = self.set_current(index);
        (state, signal)
    }

    /// Reconcile `current` with the host's active entry after a completed
    /// navigation. Returns the state to write back when the entry had no
    /// index.
    pub fn reconcile(&mut self, entry: Option<HistoryState>) -> (Option<HistoryState>, Option<bool>) {
        let index = entry.as_ref().and_then(HistoryState::index);
        match index {
            Some(index) => (None, self.on_settled_entry(index)),
            None => {
                let (state, signal) = self.on_unindexed_entry(entry);
                (Some(state), signal)
            }
        }
    }
}

// ============================================================================
// CanGoBack watchers
// ============================================================================

/// Handle returned by [`Navigator::watch_can_go_back`](crate::Navigator::watch_can_go_back).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(u64);

type Watcher = Rc<dyn Fn(bool)>;

/// Observers of the derived `can_go_back` signal.
///
/// Observers are only told about changes.
#[derive(Default)]
pub(crate) struct CanGoBackWatchers {
    next_id: u64,
    last: bool,
    watchers: Vec<(WatchId, Watcher)>,
}

impl CanGoBackWatchers {
    /// Register `watcher`; it is called immediately with `value`.
    pub(crate) fn watch(cell: &RefCell<Self>, value: bool, watcher: Watcher) -> WatchId {
        let id = {
            let mut this = cell.borrow_mut();
            let id = WatchId(this.next_id);
            this.next_id += 1;
            this.last = value;
            this.watchers.push((id, Rc::clone(&watcher)));
            id
        };
        watcher(value);
        id
    }

    pub(crate) fn unwatch(&mut self, id: WatchId) -> bool {
        let before = self.watchers.len();
        self.watchers.retain(|(watch_id, _)| *watch_id != id);
        before != self.watchers.len()
    }

    /// Notify every watcher if `value` differs from the last published value.
    ///
    /// Watchers run after the borrow is released, so they may call back into
    /// the navigator.
    pub(crate) fn publish(cell: &RefCell<Self>, value: bool) {
        let watchers: Vec<Watcher> = {
            let mut this = cell.borrow_mut();
            if this.last == value {
                return;
            }
            this.last = value;
            this.watchers.iter().map(|(_, w)| Rc::clone(w)).collect()
        };
        trace_log!("Publishing can_go_back = {} to {} watcher(s)", value, watchers.len());
        for watcher in watchers {
            watcher(value);
        }
    }
}
