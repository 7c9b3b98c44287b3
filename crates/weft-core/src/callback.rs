// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reception callbacks.
//!
//! Callbacks receive translated records. Several callbacks may be registered
//! on one connector, each optionally restricted to one channel.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::error;

/// Receives translated records from a connector.
///
/// Implemented for every `Fn(T) + Send + Sync` closure.
///
/// Callbacks run on the connector's delivery path while it holds the
/// dispatch lock. They must not call `disconnect` or `dispose` on the same
/// connector: both wait for the running delivery and never return. A
/// callback that panics is logged and skipped; later callbacks and records
/// are still delivered.
pub trait ReceptionCallback<T>: Send + Sync {
    /// Called once per delivered record, in production order.
    fn received(&self, data: T);

    /// Name of the record type this callback accepts.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl<T, F> ReceptionCallback<T> for F
where
    F: Fn(T) + Send + Sync,
{
    fn received(&self, data: T) {
        self(data)
    }
}

/// Handle identifying a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

impl fmt::Display for CallbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "callback-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CallbackFilter {
    All,
    Channel(String),
}

impl CallbackFilter {
    fn accepts(&self, channel: Option<&str>) -> bool {
        match self {
            CallbackFilter::All => true,
            CallbackFilter::Channel(name) => channel == Some(name.as_str()),
        }
    }
}

struct Entry<T> {
    id: CallbackId,
    filter: CallbackFilter,
    callback: Arc<dyn ReceptionCallback<T>>,
}

/// Registered callbacks of one connector.
pub struct CallbackRegistry<T> {
    entries: RwLock<Vec<Entry<T>>>,
    next_id: AtomicU64,
}

impl<T: Clone> CallbackRegistry<T> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert(&self, filter: CallbackFilter, callback: Arc<dyn ReceptionCallback<T>>) -> CallbackId {
        let id = CallbackId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push(Entry { id, filter, callback });
        id
    }

    /// Adds a callback receiving every record.
    pub fn add(&self, callback: Arc<dyn ReceptionCallback<T>>) -> CallbackId {
        self.insert(CallbackFilter::All, callback)
    }

    /// Adds a callback receiving only records from `channel`.
    pub fn add_for_channel(
        &self,
        channel: impl Into<String>,
        callback: Arc<dyn ReceptionCallback<T>>,
    ) -> CallbackId {
        self.insert(CallbackFilter::Channel(channel.into()), callback)
    }

    /// Removes a callback. Returns `false` if it was not registered.
    pub fn remove(&self, id: CallbackId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    /// Delivers `data` to all callbacks accepting `channel`.
    ///
    /// Callbacks run outside the registry lock, so they may add or remove
    /// callbacks. Returns the number of callbacks invoked.
    pub fn dispatch(&self, channel: Option<&str>, data: &T) -> usize {
        let targets: Vec<Arc<dyn ReceptionCallback<T>>> = self
            .entries
            .read()
            .iter()
            .filter(|e| e.filter.accepts(channel))
            .map(|e| e.callback.clone())
            .collect();

        for callback in &targets {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback.received(data.clone())));
            if let Err(panic) = outcome {
                error!(
                    callback = callback.type_name(),
                    panic = panic_message(panic.as_ref()),
                    "Reception callback panicked"
                );
            }
        }
        targets.len()
    }

    /// Returns the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl<T: Clone> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_closure_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback = move |v: i32| sink.lock().push(v);

        callback.received(4);
        assert_eq!(*seen.lock(), vec![4]);
        assert_eq!(ReceptionCallback::<i32>::type_name(&callback), "i32");
    }

    #[test]
    fn test_dispatch_by_channel() {
        let registry: CallbackRegistry<String> = CallbackRegistry::new();
        let all = Arc::new(Mutex::new(Vec::new()));
        let only_a = Arc::new(Mutex::new(Vec::new()));

        let sink = all.clone();
        registry.add(Arc::new(move |v: String| sink.lock().push(v)));
        let sink = only_a.clone();
        let id = registry.add_for_channel("a", Arc::new(move |v: String| sink.lock().push(v)));

        assert_eq!(registry.dispatch(Some("a"), &"x".to_string()), 2);
        assert_eq!(registry.dispatch(Some("b"), &"y".to_string()), 1);
        assert_eq!(registry.dispatch(None, &"z".to_string()), 1);

        assert_eq!(*all.lock(), vec!["x", "y", "z"]);
        assert_eq!(*only_a.lock(), vec!["x"]);

        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_panicking_callback_does_not_stop_dispatch() {
        let registry: CallbackRegistry<String> = CallbackRegistry::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        registry.add(Arc::new(|v: String| {
            if v == "boom" {
                panic!("cannot handle {}", v);
            }
        }));
        let sink = seen.clone();
        registry.add(Arc::new(move |v: String| sink.lock().push(v)));

        assert_eq!(registry.dispatch(None, &"boom".to_string()), 2);
        assert_eq!(registry.dispatch(None, &"fine".to_string()), 2);
        assert_eq!(*seen.lock(), vec!["boom", "fine"]);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "unknown panic");
    }
}
