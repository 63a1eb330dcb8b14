//! Waiting for the host to settle.
//!
//! After a rollback the host applies its step asynchronously. The guard must
//! not run callbacks until the host is back where the guard expects it, but it
//! must not hang if the host never gets there either. [`wait_until`] races a
//! per-frame poll of a condition against a deadline.

use crate::host::Scheduler;
use crate::trace_log;
use futures_util::future::{self, Either};
use std::time::Duration;

/// Deadline used by the navigator when none is configured.
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_millis(300);

/// How a [`wait_until`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The condition held.
    Reached,
    /// The deadline passed first.
    TimedOut,
}

impl Settlement {
    pub fn is_reached(self) -> bool {
        matches!(self, Settlement::Reached)
    }
}

/// Resolve once `condition` holds, checking on every animation frame, or once
/// `timeout` elapses, whichever comes first.
///
/// The condition is checked after each frame, not before the first one: the
/// host never applies a step within the same task that requested it.
pub async fn wait_until<C>(scheduler: &dyn Scheduler, mut condition: C, timeout: Duration) -> Settlement
where
    C: FnMut() -> bool,
{
    let poll = async {
        let mut frames = 0_u32;
        loop {
            scheduler.next_frame().await;
            frames += 1;
            if condition() {
                trace_log!("Settled after {} frame(s)", frames);
                return;
            }
        }
    };
    let deadline = scheduler.sleep(timeout);

    futures_util::pin_mut!(poll);
    match future::select(poll, deadline).await {
        Either::Left(((), _)) => Settlement::Reached,
        Either::Right(((), _)) => Settlement::TimedOut,
    }
}
