//! Host listener lifecycle.
//!
//! The guard needs two host listeners, and only while something depends on
//! them:
//!
//! | Listener | Attached while |
//! |----------|----------------|
//! | [`ClickIntercept`](ListenerKind::ClickIntercept) | any prevention or callback is registered |
//! | [`UnloadPrompt`](ListenerKind::UnloadPrompt) | any prevention or callback asks to confirm on close |
//!
//! The two conditions are evaluated independently after every registry
//! mutation. Attaching an attached listener, or detaching a detached one, does
//! nothing.

use crate::debug_log;
use crate::host::{HostListeners, ListenerKind};
use std::rc::Rc;

/// What the registry currently needs from the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerDemand {
    pub click_intercept: bool,
    pub unload_prompt: bool,
}

/// Tracks which host listeners are attached and keeps them in line with the
/// registry's demand.
pub struct ListenerLifecycle {
    host: Rc<dyn HostListeners>,
    click_intercept: bool,
    unload_prompt: bool,
}

impl ListenerLifecycle {
    pub fn new(host: Rc<dyn HostListeners>) -> Self {
        Self {
            host,
            click_intercept: false,
            unload_prompt: false,
        }
    }

    pub fn is_attached(&self, kind: ListenerKind) -> bool {
        match kind {
            ListenerKind::ClickIntercept => self.click_intercept,
            ListenerKind::UnloadPrompt => self.unload_prompt,
        }
    }

    /// Attach or detach each listener so it matches `demand`.
    pub fn reconcile(&mut self, demand: ListenerDemand) {
        self.set(ListenerKind::ClickIntercept, demand.click_intercept);
        self.set(ListenerKind::UnloadPrompt, demand.unload_prompt);
    }

    fn set(&mut self, kind: ListenerKind, wanted: bool) {
        let attached = match kind {
            ListenerKind::ClickIntercept => &mut self.click_intercept,
            ListenerKind::UnloadPrompt => &mut self.unload_prompt,
        };
        if *attached == wanted {
            return;
        }
        *attached = wanted;
        if wanted {
            debug_log!("Attaching {:?} listener", kind);
            self.host.attach(kind);
        } else {
            debug_log!("Detaching {:?} listener", kind);
            self.host.detach(kind);
        }
    }
}

impl std::fmt::Debug for ListenerLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerLifecycle")
            .field("click_intercept", &self.click_intercept)
            .field("unload_prompt", &self.unload_prompt)
            .finish_non_exhaustive()
    }
}
