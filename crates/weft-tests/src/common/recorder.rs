// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Recording reception callback.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::Instant;

use weft_core::ReceptionCallback;

struct Recorded<T> {
    records: Mutex<Vec<(Instant, T)>>,
    changed: Notify,
}

/// Callback keeping every received record with its arrival time.
///
/// Clones share the same recording.
pub struct RecordingCallback<T> {
    inner: Arc<Recorded<T>>,
}

impl<T> Clone for RecordingCallback<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> RecordingCallback<T> {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Recorded {
                records: Mutex::new(Vec::new()),
                changed: Notify::new(),
            }),
        }
    }

    /// Returns the records received so far, in arrival order.
    pub fn records(&self) -> Vec<T> {
        self.inner.records.lock().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Returns the arrival instants.
    pub fn arrivals(&self) -> Vec<Instant> {
        self.inner.records.lock().iter().map(|(at, _)| *at).collect()
    }

    /// Returns the number of records received.
    pub fn len(&self) -> usize {
        self.inner.records.lock().len()
    }

    /// Returns `true` if nothing was received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits until at least `count` records arrived or `timeout` elapsed.
    ///
    /// Returns the records received by then.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<T> {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.inner.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.len() >= count {
                break;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                break;
            }
        }
        self.records()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for RecordingCallback<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> ReceptionCallback<T> for RecordingCallback<T> {
    fn received(&self, data: T) {
        self.inner.records.lock().push((Instant::now(), data));
        self.inner.changed.notify_waiters();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_returns_on_count() {
        let recorder = RecordingCallback::<u32>::new();
        let producer = recorder.clone();
        tokio::spawn(async move {
            for i in 0..3 {
                tokio::time::sleep(Duration::from_millis(5)).await;
                producer.received(i);
            }
        });

        let records = recorder.wait_for(3, Duration::from_secs(2)).await;
        assert_eq!(records, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let recorder = RecordingCallback::<u32>::new();
        let records = recorder.wait_for(1, Duration::from_millis(20)).await;
        assert!(records.is_empty());
    }
}
