// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Polling primitives.
//!
//! - [`PollSlot`]: single-value handoff between a producer (e.g. a file
//!   reader task) and the connector's `read`. A producer only deposits while
//!   a reader is waiting and the slot is empty, so at most one poll is
//!   outstanding and no datum is delivered twice.
//! - [`AdaptiveInterval`]: fixed interval plus a one-shot override for the
//!   next cycle.
//! - [`spawn_poller`]: the background poll loop with a cooperative stop
//!   signal and a bounded join.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Sleep granularity of producers waiting for a reader.
pub const WAIT_GRANULARITY: Duration = Duration::from_millis(50);

/// Default bound for joining a stopped poll loop.
pub const DEFAULT_STOP_BOUND: Duration = Duration::from_millis(200);

// =============================================================================
// PollSlot
// =============================================================================

#[derive(Debug)]
struct SlotState<T> {
    value: Option<T>,
    polling: bool,
    closed: bool,
}

/// Single-value handoff slot.
#[derive(Debug)]
pub struct PollSlot<T> {
    state: Mutex<SlotState<T>>,
    changed: Notify,
    readers: tokio::sync::Mutex<()>,
}

impl<T: Send> PollSlot<T> {
    /// Creates an open, empty slot.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SlotState {
                value: None,
                polling: false,
                closed: false,
            }),
            changed: Notify::new(),
            readers: tokio::sync::Mutex::new(()),
        }
    }

    /// Waits up to `timeout` for a value.
    ///
    /// Concurrent callers queue up; only one is polling at a time. Returns
    /// `None` on timeout or once the slot is closed.
    pub async fn take(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let _reader = tokio::time::timeout_at(deadline, self.readers.lock()).await.ok()?;

        {
            let mut state = self.state.lock();
            if let Some(value) = state.value.take() {
                return Some(value);
            }
            if state.closed {
                return None;
            }
            state.polling = true;
        }
        let _polling = PollingGuard { slot: self };
        self.changed.notify_waiters();

        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(value) = state.value.take() {
                    return Some(value);
                }
                if state.closed {
                    return None;
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return None;
            }
        }
    }

    /// Hands `value` to the next polling reader.
    ///
    /// Waits until a reader is polling and the slot is empty. Returns `false`
    /// if the slot was closed first; the value is dropped then.
    pub async fn offer(&self, value: T) -> bool {
        let mut value = value;
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.try_offer(value) {
                Ok(()) => return true,
                Err(_) if self.is_closed() => return false,
                Err(rejected) => value = rejected,
            }

            let _ = tokio::time::timeout(WAIT_GRANULARITY, notified).await;
        }
    }

    /// Deposits `value` if a reader is polling and the slot is empty.
    ///
    /// Hands the value back otherwise, including when closed.
    pub fn try_offer(&self, value: T) -> Result<(), T> {
        let mut state = self.state.lock();
        if state.closed || !state.polling || state.value.is_some() {
            return Err(value);
        }
        state.value = Some(value);
        drop(state);
        self.changed.notify_waiters();
        Ok(())
    }

    /// Waits until the slot changes or `max` elapses.
    pub async fn wait_for_change(&self, max: Duration) {
        let _ = tokio::time::timeout(max, self.changed.notified()).await;
    }

    /// Returns `true` while a reader is waiting.
    pub fn is_polling(&self) -> bool {
        self.state.lock().polling
    }

    /// Closes the slot, releasing waiting readers and producers.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.changed.notify_waiters();
    }

    /// Returns `true` once closed.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }
}

impl<T: Send> Default for PollSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

struct PollingGuard<'a, T> {
    slot: &'a PollSlot<T>,
}

impl<T> Drop for PollingGuard<'_, T> {
    fn drop(&mut self) {
        // A value deposited after the reader gave up stays for the next take.
        self.slot.state.lock().polling = false;
    }
}

// =============================================================================
// AdaptiveInterval
// =============================================================================

#[derive(Debug)]
struct IntervalState {
    fixed: Duration,
    next: Option<Duration>,
}

/// Poll pacing: a fixed interval with a one-shot override.
#[derive(Debug)]
pub struct AdaptiveInterval {
    state: Mutex<IntervalState>,
}

impl AdaptiveInterval {
    /// Creates a pacer with the given fixed interval.
    pub fn new(fixed: Duration) -> Self {
        Self {
            state: Mutex::new(IntervalState { fixed, next: None }),
        }
    }

    /// Returns the fixed interval.
    pub fn fixed(&self) -> Duration {
        self.state.lock().fixed
    }

    /// Replaces the fixed interval.
    pub fn set_fixed(&self, fixed: Duration) {
        self.state.lock().fixed = fixed;
    }

    /// Overrides the delay of the next cycle only.
    pub fn override_next(&self, delay: Duration) {
        self.state.lock().next = Some(delay);
    }

    /// Returns the delay before the next cycle, consuming any override.
    pub fn next_delay(&self) -> Duration {
        let mut state = self.state.lock();
        state.next.take().unwrap_or(state.fixed)
    }
}

// =============================================================================
// Poll loop
// =============================================================================

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct PollerHandle {
    name: String,
    stop: Arc<Notify>,
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Spawns a poll loop running `cycle` now and then after each
/// `pacing.next_delay()`, until stopped.
///
/// A stop signal interrupts both a running cycle and the pause between
/// cycles.
pub fn spawn_poller<F, Fut>(name: impl Into<String>, pacing: Arc<AdaptiveInterval>, mut cycle: F) -> PollerHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let name = name.into();
    let stop = Arc::new(Notify::new());
    let running = Arc::new(AtomicBool::new(true));

    let task_name = name.clone();
    let task_stop = stop.clone();
    let task_running = running.clone();

    let handle = tokio::spawn(async move {
        info!(
            connector = %task_name,
            interval_ms = pacing.fixed().as_millis() as u64,
            "Poll loop started"
        );

        while task_running.load(Ordering::SeqCst) {
            tokio::select! {
                _ = task_stop.notified() => break,
                _ = cycle() => {}
            }

            if !task_running.load(Ordering::SeqCst) {
                break;
            }

            let delay = pacing.next_delay();
            tokio::select! {
                _ = task_stop.notified() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        task_running.store(false, Ordering::SeqCst);
        info!(connector = %task_name, "Poll loop stopped");
    });

    PollerHandle {
        name,
        stop,
        running,
        handle,
    }
}

impl PollerHandle {
    /// Signals the loop to stop without waiting.
    pub fn signal_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.stop.notify_one();
    }

    /// Stops the loop and waits at most `bound` for it to exit.
    ///
    /// The task is aborted if it does not exit in time. Returns `true` if it
    /// exited on its own.
    pub async fn stop(self, bound: Duration) -> bool {
        self.signal_stop();
        let abort = self.handle.abort_handle();

        match tokio::time::timeout(bound, self.handle).await {
            Ok(_) => {
                debug!(connector = %self.name, "Poll loop joined");
                true
            }
            Err(_) => {
                warn!(
                    connector = %self.name,
                    bound_ms = bound.as_millis() as u64,
                    "Poll loop did not stop in time, aborting"
                );
                abort.abort();
                false
            }
        }
    }

    /// Returns `true` while the loop has not been stopped.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns `true` once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

// =============================================================================
// Tests
// =============================================================================
