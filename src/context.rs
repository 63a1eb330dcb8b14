//! The navigation orchestrator.
//!
//! [`Navigator`] sits between the application router and the host history.
//! Every navigation attempt passes through it:
//!
//! | Source | Entry point | Gate |
//! |--------|-------------|------|
//! | link click | [`on_link_click`](Navigator::on_link_click) | hard block, then callbacks |
//! | programmatic | [`goto`](Navigator::goto) | hard block, then callbacks unless forced |
//! | programmatic back | [`back`](Navigator::back) | hard block |
//! | back/forward gesture | [`on_popstate`](Navigator::on_popstate) | rollback, settle, callbacks, replay |
//!
//! # States
//!
//! ```text
//!            click / goto                     gesture
//!  Idle ─────────────────────┐   Idle ──► RollingBack ──► Settling ─┐
//!   ▲                        ▼                                      ▼
//!   └──── approve / deny ── AwaitingConfirmation ◄──────────────────┘
//! ```
//!
//! Only one navigation may be in flight. A click arriving while another
//! navigation awaits confirmation is swallowed, a `goto` returns
//! [`NavigationOutcome::Busy`], and a gesture is rolled back and dropped.
//!
//! # Setup
//!
//! ```ignore
//! let navigator = Navigator::new(history, listeners, scheduler);
//! let after_start = navigator.before_start(StartOptions::new().start_paths(["/home"]))?;
//! navigator.init(&page_events, router)?;
//! // ... first render ...
//! after_start.finish();
//! ```

use crate::error::{ErrorHook, NavigationOutcome, NavigatorError, Result};
use crate::guards::{InterceptionRegistry, NavigationCallback, PreventionToken};
use crate::host::{
    GotoOptions, HistoryStack, HostListeners, LinkClick, ListenerKind, PageEvents, PreloadContext,
    Router, Scheduler,
};
use crate::lifecycle::ListenerLifecycle;
use crate::settle::{wait_until, Settlement, DEFAULT_SETTLE_TIMEOUT};
use crate::state::{CanGoBackWatchers, HistoryIndexStore, HistoryState, StagedIndex, WatchId};
use crate::{debug_log, error_log, info_log, trace_log, warn_log};
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::time::Duration;

/// Text returned by [`Navigator::on_before_unload`] while the prompt is armed.
pub const UNLOAD_PROMPT: &str = "Navigation prevented";

// ============================================================================
// Public types
// ============================================================================

/// Where the orchestrator is in handling a navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NavState {
    /// Nothing in flight.
    #[default]
    Idle,
    /// Waiting for before-navigate callbacks.
    AwaitingConfirmation,
    /// Undoing a gesture the host already applied.
    RollingBack,
    /// Waiting for the host to report the restored position.
    Settling,
}

/// Options for [`Navigator::before_start`].
///
/// # Example
///
/// ```
/// use nav_guard::StartOptions;
///
/// let options = StartOptions::new()
///     .start_paths(["/home", "/"])
///     .always_confirm_on_close(true);
/// assert_eq!(options.start_paths, vec!["/home", "/"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Paths a user may land on directly. Landing anywhere else prepends
    /// the first one as a synthetic previous entry.
    pub start_paths: Vec<String>,
    /// Arm the unload prompt for every prevention and callback.
    pub always_confirm_on_close: bool,
}

impl StartOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn always_confirm_on_close(mut self, always: bool) -> Self {
        self.always_confirm_on_close = always;
        self
    }
}

/// Where [`Navigator::back`] goes when there is no history.
pub enum Fallback {
    Path(String),
    /// Called only if the fallback is actually needed.
    Supplier(Box<dyn FnOnce() -> String>),
}

impl Fallback {
    pub fn supplier(f: impl FnOnce() -> String + 'static) -> Self {
        Self::Supplier(Box::new(f))
    }

    fn resolve(self) -> String {
        match self {
            Fallback::Path(path) => path,
            Fallback::Supplier(f) => f(),
        }
    }
}

impl From<&str> for Fallback {
    fn from(path: &str) -> Self {
        Self::Path(path.to_string())
    }
}

impl From<String> for Fallback {
    fn from(path: String) -> Self {
        Self::Path(path)
    }
}

impl std::fmt::Debug for Fallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fallback::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Fallback::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

/// What [`Navigator::on_link_click`] did with a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDisposition {
    /// Leave the click to the host.
    PassThrough,
    /// Cancel the host's default action. The navigation, if approved,
    /// happens through the router.
    Intercepted,
}

/// What [`Navigator::on_popstate`] did with a popstate event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopDisposition {
    /// The entry carried no index; page reconciliation will handle it.
    Ignored,
    /// The gesture was accepted and `current` moved to `index`.
    Accepted { index: usize },
    /// The host is already at `current`; stop propagation and do nothing.
    Suppressed,
    /// The gesture was undone with a `delta`-step move. `confirming` is set
    /// when callbacks will decide whether to replay it.
    RolledBack { delta: isize, confirming: bool },
}

/// Finalizer returned by [`Navigator::before_start`].
///
/// Call [`finish`](AfterStart::finish) after the first render. It rewrites
/// the initial entry with its index on the next tick and settles `current`
/// on that index.
#[must_use = "the initial entry keeps no index until `finish` is called"]
pub struct AfterStart {
    shared: Weak<Shared>,
    state: HistoryState,
}

impl AfterStart {
    /// State the initial entry will be rewritten with.
    pub fn state(&self) -> &HistoryState {
        &self.state
    }

    pub fn finish(self) {
        let AfterStart { shared, state } = self;
        let Some(scheduler) = shared.upgrade().map(|strong| Rc::clone(&strong.scheduler)) else {
            return;
        };
        scheduler.defer(Box::new(move || {
            let Some(shared) = shared.upgrade() else {
                return;
            };
            let history = &shared.history;
            let title = history.title();
            let href = history.location().href;
            debug_log!("Normalising initial entry at '{}' to index {:?}", href, state.index());
            let index = state.index();
            history.replace_entry(state, &title, &href);
            if let Some(index) = index {
                let signal = shared.guard.borrow_mut().store.on_settled_entry(index);
                Navigator { shared }.publish(signal);
            }
        }));
    }
}

impl std::fmt::Debug for AfterStart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AfterStart")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

enum Registration {
    Prevention(PreventionToken),
    Callback(Rc<dyn NavigationCallback>),
}

/// Removes one prevention or callback. Disposing twice does nothing.
#[must_use = "dropping a Disposer leaves the registration active forever"]
pub struct Disposer {
    shared: Weak<Shared>,
    registration: Registration,
    disposed: Cell<bool>,
}

impl Disposer {
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut guard = shared.guard.borrow_mut();
        let removed = match &self.registration {
            Registration::Prevention(token) => guard.registry.remove_prevention(*token),
            Registration::Callback(callback) => guard.registry.remove_callback(callback),
        };
        if removed {
            guard.sync_listeners();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.registration {
            Registration::Prevention(_) => "prevention",
            Registration::Callback(_) => "callback",
        };
        f.debug_struct("Disposer")
            .field("kind", &kind)
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

// ============================================================================
// Shared state
// ============================================================================

/// Marks the next popstate at `index` as caused by our own replay.
///
/// `serial` tells successive replays to the same index apart, so an expiring
/// token never clears a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ExpectedPop {
    index: usize,
    serial: u64,
}

struct GuardState {
    store: HistoryIndexStore,
    registry: InterceptionRegistry,
    listeners: ListenerLifecycle,
    phase: NavState,
    expected_pop: Option<ExpectedPop>,
    replays: u64,
    started: bool,
    initialized: bool,
    start_paths: Vec<String>,
    always_confirm_on_close: bool,
}

impl GuardState {
    fn sync_listeners(&mut self) {
        let demand = self.registry.demand();
        self.listeners.reconcile(demand);
    }

    /// Consume the replay token. Any popstate consumes it; only one carrying
    /// the expected index counts as self-inflicted.
    fn take_expected(&mut self, index: usize) -> bool {
        matches!(self.expected_pop.take(), Some(expected) if expected.index == index)
    }

    fn expect_pop(&mut self, index: usize) -> ExpectedPop {
        self.replays += 1;
        let expected = ExpectedPop {
            index,
            serial: self.replays,
        };
        self.expected_pop = Some(expected);
        expected
    }
}

/// Returns the navigator to `Idle` if a confirmation is abandoned before it
/// decides, e.g. when the awaiting future is dropped.
struct PhaseScope {
    shared: Rc<Shared>,
    armed: bool,
}

impl PhaseScope {
    fn new(shared: &Rc<Shared>) -> Self {
        Self {
            shared: Rc::clone(shared),
            armed: true,
        }
    }

    /// The confirmation decided; go back to `Idle` now.
    fn release(mut self) {
        self.armed = false;
        self.shared.guard.borrow_mut().phase = NavState::Idle;
    }
}

impl Drop for PhaseScope {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut guard) = self.shared.guard.try_borrow_mut() {
            debug_log!("Confirmation abandoned in {:?}, resetting to Idle", guard.phase);
            guard.phase = NavState::Idle;
        }
    }
}

struct Shared {
    history: Rc<dyn HistoryStack>,
    scheduler: Rc<dyn Scheduler>,
    settle_timeout: Cell<Duration>,
    guard: RefCell<GuardState>,
    watchers: RefCell<CanGoBackWatchers>,
    router: RefCell<Option<Rc<dyn Router>>>,
    error_hook: RefCell<Option<ErrorHook>>,
}

// ============================================================================
// Navigator
// ============================================================================

/// One navigation guard instance.
///
/// Cloning is cheap and yields a handle to the same instance. Independent
/// instances share nothing.
#[derive(Clone)]
pub struct Navigator {
    shared: Rc<Shared>,
}

impl Navigator {
    pub fn new(
        history: Rc<dyn HistoryStack>,
        listeners: Rc<dyn HostListeners>,
        scheduler: Rc<dyn Scheduler>,
    ) -> Self {
        Self {
            shared: Rc::new(Shared {
                history,
                scheduler,
                settle_timeout: Cell::new(DEFAULT_SETTLE_TIMEOUT),
                guard: RefCell::new(GuardState {
                    store: HistoryIndexStore::new(),
                    registry: InterceptionRegistry::new(),
                    listeners: ListenerLifecycle::new(listeners),
                    phase: NavState::Idle,
                    expected_pop: None,
                    replays: 0,
                    started: false,
                    initialized: false,
                    start_paths: Vec::new(),
                    always_confirm_on_close: false,
                }),
                watchers: RefCell::new(CanGoBackWatchers::default()),
                router: RefCell::new(None),
                error_hook: RefCell::new(None),
            }),
        }
    }

    /// Override how long a rolled-back gesture waits for the host to settle.
    pub fn with_settle_timeout(self, timeout: Duration) -> Self {
        self.shared.settle_timeout.set(timeout);
        self
    }

    /// Receive errors from detached confirmation tasks.
    pub fn on_error(&self, hook: impl Fn(&NavigatorError) + 'static) {
        *self.shared.error_hook.borrow_mut() = Some(Rc::new(hook));
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Assign the initial entry its index.
    ///
    /// If the host entry already has an index (a reload), it is adopted. If
    /// the user landed somewhere other than a start path, the first start
    /// path is prepended as index 0 and the landing page becomes index 1.
    /// Otherwise the landing page is index 0.
    pub fn before_start(&self, options: StartOptions) -> Result<AfterStart> {
        let history = &self.shared.history;
        let (state, signal) = {
            let mut guard = self.shared.guard.borrow_mut();
            if guard.started {
                return Err(NavigatorError::AlreadyStarted);
            }
            guard.started = true;
            guard.always_confirm_on_close = options.always_confirm_on_close;
            guard.start_paths = options.start_paths;

            let entry = history.current_entry();
            let pathname = history.location().pathname;
            let landing = guard
                .start_paths
                .first()
                .filter(|first| !first.is_empty() && !guard.start_paths.contains(&pathname))
                .cloned();
            match (entry.as_ref().and_then(HistoryState::index), landing) {
                (Some(index), _) => {
                    let signal = guard.store.set_current(index);
                    (entry.unwrap_or_default(), signal)
                }
                (None, Some(first)) => {
                    info_log!("Landed on '{}', prepending start path '{}'", pathname, first);
                    prepend(history.as_ref(), &first, None);
                    let index = guard.store.current() + 1;
                    let signal = guard.store.set_current(index);
                    (entry.unwrap_or_default().with_index(index), signal)
                }
                (None, None) => {
                    // The first render may reconcile before `finish` runs.
                    guard.store.stage(StagedIndex::new(0));
                    (entry.unwrap_or_default().with_index(0), None)
                }
            }
        };
        self.publish(signal);
        info_log!("Navigation guard started at index {}", self.current_index());

        Ok(AfterStart {
            shared: Rc::downgrade(&self.shared),
            state,
        })
    }

    /// Wire the router and start reconciling after every completed
    /// navigation.
    pub fn init(&self, page: &dyn PageEvents, router: Rc<dyn Router>) -> Result<()> {
        {
            let mut guard = self.shared.guard.borrow_mut();
            if guard.initialized {
                return Err(NavigatorError::AlreadyInitialized);
            }
            guard.initialized = true;
        }
        *self.shared.router.borrow_mut() = Some(router);

        let weak = Rc::downgrade(&self.shared);
        page.subscribe(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                Navigator { shared }.reconcile();
            }
        }));
        info_log!("Navigation guard initialized");
        Ok(())
    }

    fn reconcile(&self) {
        let history = &self.shared.history;
        let entry = history.current_entry();
        let (write_back, signal) = self.shared.guard.borrow_mut().store.reconcile(entry);
        if let Some(state) = write_back {
            history.replace_entry(state, &history.title(), &history.location().href);
        }
        self.publish(signal);
    }

    // ========================================================================
    // Registrations
    // ========================================================================

    /// Hard-block navigation until the returned disposer runs.
    pub fn prevent_navigation(&self, confirm_on_close: bool) -> Disposer {
        let token = {
            let mut guard = self.shared.guard.borrow_mut();
            let confirm = confirm_on_close || guard.always_confirm_on_close;
            let token = guard.registry.add_prevention(confirm);
            guard.sync_listeners();
            token
        };
        debug_log!("Prevention added");
        Disposer {
            shared: Rc::downgrade(&self.shared),
            registration: Registration::Prevention(token),
            disposed: Cell::new(false),
        }
    }

    /// Ask `callback` before every navigation until the returned disposer
    /// runs. Registering the same `Rc` again only updates its flag.
    pub fn before_navigate(
        &self,
        callback: Rc<dyn NavigationCallback>,
        confirm_on_close: bool,
    ) -> Disposer {
        {
            let mut guard = self.shared.guard.borrow_mut();
            let confirm = confirm_on_close || guard.always_confirm_on_close;
            guard.registry.add_callback(Rc::clone(&callback), confirm);
            guard.sync_listeners();
        }
        Disposer {
            shared: Rc::downgrade(&self.shared),
            registration: Registration::Callback(callback),
            disposed: Cell::new(false),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn current_index(&self) -> usize {
        self.shared.guard.borrow().store.current()
    }

    pub fn can_go_back(&self) -> bool {
        self.shared.guard.borrow().store.can_go_back()
    }

    /// Observe `can_go_back`. `watcher` runs now and on every change.
    pub fn watch_can_go_back(&self, watcher: impl Fn(bool) + 'static) -> WatchId {
        let value = self.can_go_back();
        CanGoBackWatchers::watch(&self.shared.watchers, value, Rc::new(watcher))
    }

    pub fn unwatch(&self, id: WatchId) -> bool {
        self.shared.watchers.borrow_mut().unwatch(id)
    }

    pub fn nav_state(&self) -> NavState {
        self.shared.guard.borrow().phase
    }

    pub fn is_listener_attached(&self, kind: ListenerKind) -> bool {
        self.shared.guard.borrow().listeners.is_attached(kind)
    }

    /// The pending index override, if any.
    pub fn staged_index(&self) -> Option<usize> {
        self.shared.guard.borrow().store.staged().map(|staged| staged.index)
    }

    // ========================================================================
    // Programmatic navigation
    // ========================================================================

    /// Navigate to `url` through the router.
    ///
    /// A hard block makes this a no-op. Unless `options.force` is set,
    /// callbacks are consulted first.
    pub async fn goto(&self, url: &str, options: GotoOptions) -> Result<NavigationOutcome> {
        let gate = {
            let mut guard = self.shared.guard.borrow_mut();
            if guard.registry.has_hard_block() {
                debug_log!("goto('{}') blocked by prevention", url);
                return Ok(NavigationOutcome::Blocked);
            }
            if self.shared.router.borrow().is_none() {
                return Err(NavigatorError::NotInitialized);
            }
            if options.force {
                None
            } else if guard.phase != NavState::Idle {
                warn_log!("goto('{}') rejected: navigation already in flight", url);
                return Ok(NavigationOutcome::Busy);
            } else if guard.registry.has_callbacks() {
                guard.phase = NavState::AwaitingConfirmation;
                Some(guard.registry.run_callbacks(url))
            } else {
                None
            }
        };

        if let Some(gate) = gate {
            let scope = PhaseScope::new(&self.shared);
            let approved = gate.await;
            scope.release();
            if !approved? {
                info_log!("Navigation to '{}' denied", url);
                return Ok(NavigationOutcome::Denied {
                    url: url.to_string(),
                });
            }
        }
        self.navigate_forced(url, options.force()).await
    }

    async fn navigate_forced(&self, url: &str, options: GotoOptions) -> Result<NavigationOutcome> {
        let router = self
            .shared
            .router
            .borrow()
            .clone()
            .ok_or(NavigatorError::NotInitialized)?;
        if options.replace_state {
            let mut guard = self.shared.guard.borrow_mut();
            let current = guard.store.current();
            guard
                .store
                .stage(StagedIndex::with_extra(current, options.state.clone()));
        }
        info_log!("Navigating to '{}'", url);
        router.goto(url, &options).await?;
        Ok(NavigationOutcome::Navigated {
            url: url.to_string(),
        })
    }

    /// Go back one entry.
    ///
    /// With no history, a fallback entry is synthesised at index 0 from
    /// `fallback`, else from the first start path. The step itself runs on
    /// the next tick.
    pub fn back(&self, fallback: Option<Fallback>) -> Result<()> {
        let start_path = {
            let guard = self.shared.guard.borrow();
            if guard.registry.has_hard_block() {
                debug_log!("back() blocked by prevention");
                return Ok(());
            }
            if self.shared.router.borrow().is_none() {
                return Err(NavigatorError::NotInitialized);
            }
            if guard.store.can_go_back() {
                None
            } else {
                Some(guard.start_paths.first().cloned())
            }
        };

        let history = Rc::clone(&self.shared.history);
        if let Some(start_path) = start_path {
            let path = fallback
                .map(Fallback::resolve)
                .or(start_path)
                .ok_or(NavigatorError::NoFallback)?;
            info_log!("No history to go back to, prepending fallback '{}'", path);
            let extra = history.current_entry().map(|state| state.extra().clone());
            prepend(history.as_ref(), &path, extra);
            let signal = self.shared.guard.borrow_mut().store.set_current(1);
            self.publish(signal);
        }

        self.shared.scheduler.defer(Box::new(move || history.step(-1)));
        Ok(())
    }

    /// Redirect during preload, keeping the current index for the entry the
    /// redirect produces.
    pub fn redirect(&self, preload: &dyn PreloadContext, status_code: u16, path: &str) {
        {
            let mut guard = self.shared.guard.borrow_mut();
            let current = guard.store.current();
            guard.store.stage(StagedIndex::new(current));
        }
        debug_log!("Redirecting ({}) to '{}'", status_code, path);
        preload.redirect(status_code, path);
    }

    /// Merge `partial` into the active entry's extra state.
    pub fn set_state(&self, partial: Map<String, Value>) {
        let history = &self.shared.history;
        let state = history.current_entry().unwrap_or_default().with_extra(partial);
        history.replace_entry(state, &history.title(), &history.location().href);
    }

    // ========================================================================
    // Host events
    // ========================================================================

    /// Handle a click from the capture-phase click listener.
    pub fn on_link_click(&self, click: &LinkClick) -> ClickDisposition {
        let Some(href) = click.navigable_href() else {
            return ClickDisposition::PassThrough;
        };
        if href == self.shared.history.location().href {
            return ClickDisposition::PassThrough;
        }

        let gate = {
            let mut guard = self.shared.guard.borrow_mut();
            if guard.registry.has_hard_block() {
                info_log!("Click to '{}' swallowed by prevention", href);
                return ClickDisposition::Intercepted;
            }
            if !guard.registry.has_callbacks() {
                return ClickDisposition::PassThrough;
            }
            if guard.phase != NavState::Idle {
                warn_log!("Click to '{}' swallowed: navigation already in flight", href);
                return ClickDisposition::Intercepted;
            }
            guard.phase = NavState::AwaitingConfirmation;
            guard.registry.run_callbacks(href)
        };

        let navigator = self.clone();
        let url = href.to_string();
        let scope = PhaseScope::new(&self.shared);
        self.shared.scheduler.spawn(Box::pin(async move {
            let approved = gate.await;
            scope.release();
            let result = match approved {
                Ok(true) => navigator
                    .navigate_forced(&url, GotoOptions::new().force())
                    .await
                    .map(|_| ()),
                Ok(false) => {
                    info_log!("Navigation to '{}' denied", url);
                    Ok(())
                }
                Err(err) => Err(err.into()),
            };
            if let Err(err) = result {
                navigator.report(&err);
            }
        }));
        ClickDisposition::Intercepted
    }

    /// Handle the host's "active entry changed" event.
    pub fn on_popstate(&self, entry: Option<&HistoryState>) -> PopDisposition {
        let Some(index) = entry.and_then(HistoryState::index) else {
            return PopDisposition::Ignored;
        };

        let (delta, confirm) = {
            let mut guard = self.shared.guard.borrow_mut();
            let self_inflicted = guard.take_expected(index);
            let hard_block = guard.registry.has_hard_block();

            if !hard_block && (self_inflicted || !guard.registry.has_callbacks()) {
                guard.store.stage(StagedIndex::new(index));
                let signal = guard.store.set_current(index);
                drop(guard);
                trace_log!("Accepted popstate to index {}", index);
                self.publish(signal);
                return PopDisposition::Accepted { index };
            }

            let current = guard.store.current();
            let delta = signed(current) - signed(index);
            if delta == 0 {
                return PopDisposition::Suppressed;
            }

            let confirm = !hard_block && guard.phase == NavState::Idle;
            if confirm {
                guard.phase = NavState::RollingBack;
            } else if !hard_block {
                warn_log!("Gesture to index {} dropped: navigation already in flight", index);
            }
            (delta, confirm)
        };

        let href = self.shared.history.location().href;
        debug_log!("Rolling back {} step(s) from index {}", delta, index);
        self.shared.history.step(delta);
        if !confirm {
            return PopDisposition::RolledBack {
                delta,
                confirming: false,
            };
        }

        self.set_phase(NavState::Settling);
        let navigator = self.clone();
        let scope = PhaseScope::new(&self.shared);
        self.shared.scheduler.spawn(Box::pin(async move {
            if let Err(err) = navigator.confirm_gesture(scope, href, index, delta).await {
                navigator.report(&err);
            }
        }));
        PopDisposition::RolledBack {
            delta,
            confirming: true,
        }
    }

    async fn confirm_gesture(
        &self,
        scope: PhaseScope,
        href: String,
        index: usize,
        delta: isize,
    ) -> Result<()> {
        let shared = Rc::clone(&self.shared);
        let timeout = self.shared.settle_timeout.get();
        let settlement = wait_until(
            self.shared.scheduler.as_ref(),
            || {
                shared
                    .guard
                    .borrow()
                    .store
                    .host_is_at_current(shared.history.as_ref())
            },
            timeout,
        )
        .await;
        if settlement == Settlement::TimedOut {
            warn_log!(
                "Host did not return to index {} in time, confirming anyway",
                self.current_index()
            );
        }

        let gate = {
            let mut guard = self.shared.guard.borrow_mut();
            guard.phase = NavState::AwaitingConfirmation;
            guard.registry.run_callbacks(&href)
        };
        let approved = gate.await;
        scope.release();

        if !approved? {
            info_log!("Gesture to '{}' denied", href);
            return Ok(());
        }

        debug_log!("Replaying {} step(s) to index {}", -delta, index);
        let expected = self.shared.guard.borrow_mut().expect_pop(index);
        self.shared.history.step(-delta);

        // Expire the token if the host never reports the replay.
        let consumed = wait_until(
            self.shared.scheduler.as_ref(),
            || shared.guard.borrow().expected_pop != Some(expected),
            timeout,
        )
        .await;
        if !consumed.is_reached() {
            let mut guard = self.shared.guard.borrow_mut();
            if guard.expected_pop == Some(expected) {
                warn_log!("Replay to index {} was never reported, expiring it", index);
                guard.expected_pop = None;
            }
        }
        Ok(())
    }

    /// Prompt text while the unload prompt is armed.
    pub fn on_before_unload(&self) -> Option<&'static str> {
        self.is_listener_attached(ListenerKind::UnloadPrompt)
            .then_some(UNLOAD_PROMPT)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn set_phase(&self, phase: NavState) {
        self.shared.guard.borrow_mut().phase = phase;
    }

    fn publish(&self, signal: Option<bool>) {
        if let Some(value) = signal {
            CanGoBackWatchers::publish(&self.shared.watchers, value);
        }
    }

    fn report(&self, err: &NavigatorError) {
        error_log!("Navigation failed: {}", err);
        let hook = self.shared.error_hook.borrow().clone();
        if let Some(hook) = hook {
            hook(err);
        }
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.shared.guard.borrow();
        f.debug_struct("Navigator")
            .field("current", &guard.store.current())
            .field("phase", &guard.phase)
            .field("registry", &guard.registry)
            .field("listeners", &guard.listeners)
            .finish_non_exhaustive()
    }
}

/// Rewrite the active entry as index 0 at `path` and push the original
/// location back on top as index 1.
fn prepend(history: &dyn HistoryStack, path: &str, extra: Option<Map<String, Value>>) {
    let href = history.location().href;
    let title = history.title();
    history.replace_entry(HistoryState::indexed(0), "", path);
    let mut top = HistoryState::indexed(1);
    if let Some(extra) = extra {
        top.merge(extra);
    }
    history.push_entry(top, &title, &href);
}

fn signed(index: usize) -> isize {
    isize::try_from(index).unwrap_or(isize::MAX)
}
