// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Connector metrics.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Point-in-time view of a connector's counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectorMetricsSnapshot {
    /// Payloads received from the backend (push or poll).
    pub received: u64,
    /// Records delivered to at least the callback stage.
    pub dispatched: u64,
    /// Failed translations.
    pub translation_failures: u64,
    /// Payloads dropped because no adapter was responsible.
    pub dropped: u64,
    /// Completed poll cycles.
    pub poll_cycles: u64,
    /// Poll cycles that ended by timeout.
    pub poll_timeouts: u64,
    /// Poll cycles that failed with a backend error.
    pub poll_errors: u64,
    /// Successful writes.
    pub writes: u64,
    /// Failed writes.
    pub write_failures: u64,
    /// Last delivery to callbacks.
    pub last_delivery: Option<DateTime<Utc>>,
}

/// Counters of one connector.
#[derive(Debug, Default)]
pub struct ConnectorMetrics {
    received: AtomicU64,
    dispatched: AtomicU64,
    translation_failures: AtomicU64,
    dropped: AtomicU64,
    poll_cycles: AtomicU64,
    poll_timeouts: AtomicU64,
    poll_errors: AtomicU64,
    writes: AtomicU64,
    write_failures: AtomicU64,
    last_delivery: RwLock<Option<DateTime<Utc>>>,
}

impl ConnectorMetrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        *self.last_delivery.write() = Some(Utc::now());
    }

    pub(crate) fn record_translation_failure(&self) {
        self.translation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll_cycle(&self) {
        self.poll_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll_timeout(&self) {
        self.poll_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_poll_error(&self) {
        self.poll_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self, ok: bool) {
        if ok {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a snapshot of all counters.
    pub fn snapshot(&self) -> ConnectorMetricsSnapshot {
        ConnectorMetricsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            translation_failures: self.translation_failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            poll_cycles: self.poll_cycles.load(Ordering::Relaxed),
            poll_timeouts: self.poll_timeouts.load(Ordering::Relaxed),
            poll_errors: self.poll_errors.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            last_delivery: *self.last_delivery.read(),
        }
    }
}
