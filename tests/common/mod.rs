//! Test fixtures for navigator tests
//!
//! Provides a tokio-backed scheduler, recording fakes for the router, page
//! events and host listeners, and a `Harness` wiring them to a
//! `MemoryHistory`.

#![allow(dead_code)]

use futures_util::future::{self, LocalBoxFuture};
use nav_guard::*;
use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration;

/// Run `f` on a current-thread runtime with paused time inside a `LocalSet`.
pub fn run_local<F: Future>(f: F) -> F::Output {
    init_logger();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime");
    tokio::task::LocalSet::new().block_on(&runtime, f)
}

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Host fakes
// ============================================================================

pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }

    fn defer(&self, task: Box<dyn FnOnce()>) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            task();
        });
    }

    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(Duration::from_millis(16)))
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

#[derive(Default)]
pub struct RecordingListeners {
    pub calls: RefCell<Vec<(ListenerKind, bool)>>,
}

impl RecordingListeners {
    /// Whether the host currently has `kind` attached, judged from the calls.
    pub fn attached(&self, kind: ListenerKind) -> bool {
        self.calls
            .borrow()
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map_or(false, |(_, attached)| *attached)
    }
}

impl HostListeners for RecordingListeners {
    fn attach(&self, kind: ListenerKind) {
        self.calls.borrow_mut().push((kind, true));
    }

    fn detach(&self, kind: ListenerKind) {
        self.calls.borrow_mut().push((kind, false));
    }
}

#[derive(Default)]
pub struct TestPage {
    subscribers: RefCell<Vec<Box<dyn Fn()>>>,
}

impl TestPage {
    /// Signal a completed navigation.
    pub fn emit(&self) {
        for subscriber in self.subscribers.borrow().iter() {
            subscriber();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl PageEvents for TestPage {
    fn subscribe(&self, callback: Box<dyn Fn()>) {
        self.subscribers.borrow_mut().push(callback);
    }
}

/// Router that pushes (or replaces) an unindexed entry, then signals the page.
pub struct TestRouter {
    history: Rc<MemoryHistory>,
    page: Rc<TestPage>,
    pub calls: RefCell<Vec<(String, GotoOptions)>>,
    pub fail_next: Cell<bool>,
}

impl TestRouter {
    pub fn urls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(url, _)| url.clone()).collect()
    }
}

impl Router for TestRouter {
    fn goto(&self, url: &str, options: &GotoOptions) -> LocalBoxFuture<'static, Result<(), NavigatorError>> {
        self.calls.borrow_mut().push((url.to_string(), options.clone()));
        if self.fail_next.replace(false) {
            return Box::pin(future::ready(Err(NavigatorError::Router {
                message: format!("cannot load {url}"),
            })));
        }

        let state = HistoryState::new().with_extra(options.state.clone().unwrap_or_default());
        if options.replace_state {
            self.history.replace_entry(state, "", url);
        } else {
            self.history.push_entry(state, "", url);
        }
        self.page.emit();
        Box::pin(future::ready(Ok(())))
    }
}

#[derive(Default)]
pub struct TestPreload {
    pub redirects: RefCell<Vec<(u16, String)>>,
}

impl PreloadContext for TestPreload {
    fn redirect(&self, status_code: u16, path: &str) {
        self.redirects.borrow_mut().push((status_code, path.to_string()));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub history: Rc<MemoryHistory>,
    pub listeners: Rc<RecordingListeners>,
    pub page: Rc<TestPage>,
    pub router: Rc<TestRouter>,
    pub navigator: Navigator,
}

impl Harness {
    pub fn new(url: &str) -> Self {
        Self::with_history(MemoryHistory::new(url))
    }

    pub fn with_history(history: MemoryHistory) -> Self {
        let history = Rc::new(history);
        let listeners = Rc::new(RecordingListeners::default());
        let page = Rc::new(TestPage::default());
        let router = Rc::new(TestRouter {
            history: Rc::clone(&history),
            page: Rc::clone(&page),
            calls: RefCell::new(Vec::new()),
            fail_next: Cell::new(false),
        });
        let navigator = Navigator::new(history.clone(), listeners.clone(), Rc::new(TokioScheduler));
        Self {
            history,
            listeners,
            page,
            router,
            navigator,
        }
    }

    /// `before_start`, `init`, first render, `finish`, as an application
    /// would at boot.
    pub fn boot(&self, options: StartOptions) {
        let after_start = self.navigator.before_start(options).expect("start");
        self.navigator
            .init(self.page.as_ref(), self.router.clone())
            .expect("init");
        self.page.emit();
        after_start.finish();
    }

    /// Deliver queued popstate events. Accepted ones are followed by a page
    /// signal, as a router rendering the popped entry would emit.
    pub fn deliver(&self) -> Vec<PopDisposition> {
        let mut delivered = Vec::new();
        while let Some(disposition) = self.history.dispatch_next(&self.navigator) {
            if matches!(disposition, PopDisposition::Accepted { .. }) {
                self.page.emit();
            }
            delivered.push(disposition);
        }
        delivered
    }

    /// Let deferred work and detached tasks run, delivering popstate events
    /// between rounds.
    pub async fn settle(&self) -> Vec<PopDisposition> {
        let mut delivered = Vec::new();
        for _ in 0..40 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            delivered.extend(self.deliver());
        }
        delivered
    }

    /// Boot at `/` and navigate to each of `paths`, leaving the navigator at
    /// index `paths.len()`.
    pub async fn boot_and_visit(&self, paths: &[&str]) {
        self.boot(StartOptions::default());
        self.settle().await;
        for path in paths {
            let outcome = self
                .navigator
                .goto(path, GotoOptions::new())
                .await
                .expect("goto");
            assert!(outcome.is_navigated());
        }
    }

    pub fn host_index(&self) -> Option<usize> {
        self.history.current_entry().and_then(|state| state.index())
    }
}

/// A callback that records every URL it is asked about and answers `verdict`.
pub fn recording_callback(verdict: Verdict) -> (Rc<dyn NavigationCallback>, Rc<RefCell<Vec<String>>>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let callback: Rc<dyn NavigationCallback> = Rc::new(callback_fn(move |url: &str| {
        log.borrow_mut().push(url.to_string());
        verdict
    }));
    (callback, seen)
}
