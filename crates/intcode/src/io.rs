//! Instance I/O.
//!
//! - `InputQueue`: FIFO with a single consumer (the owning engine). An empty
//!   queue suspends the reader until a producer supplies a value.
//! - `OutputStream`: append-only log plus an ordered subscriber list. The
//!   value is appended before any subscriber is notified.
//!
//! Both are cheap `Clone` handles over shared state.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // Every critical section leaves the data consistent, so a poisoned lock
    // is still usable.
    m.lock().unwrap_or_else(|e| e.into_inner())
}

// ── Input ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct InputQueue {
    inner: Arc<InputInner>,
}

#[derive(Default)]
struct InputInner {
    queue: Mutex<VecDeque<i64>>,
    ready: Notify,
}

impl InputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append values in argument order and wake a suspended reader.
    pub fn supply(&self, values: &[i64]) {
        if values.is_empty() {
            return;
        }
        lock(&self.inner.queue).extend(values.iter().copied());
        tracing::trace!(count = values.len(), "input supplied");
        self.inner.ready.notify_one();
    }

    pub fn push(&self, value: i64) {
        self.supply(&[value]);
    }

    /// Pop the front value without waiting.
    pub fn try_recv(&self) -> Option<i64> {
        lock(&self.inner.queue).pop_front()
    }

    /// Pop the front value, suspending until one is available.
    ///
    /// Only the owning engine reads, so there is at most one waiter.
    pub async fn recv(&self) -> i64 {
        loop {
            if let Some(v) = self.try_recv() {
                return v;
            }
            // A supply between the check above and this await leaves a
            // stored permit, so the wake-up is not lost.
            self.inner.ready.notified().await;
        }
    }

    pub fn pending(&self) -> usize {
        lock(&self.inner.queue).len()
    }
}

impl std::fmt::Debug for InputQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputQueue")
            .field("pending", &self.pending())
            .finish()
    }
}

// ── Output ───────────────────────────────────────────────────────

type Callback = Box<dyn FnMut(i64, usize) + Send>;

#[derive(Clone, Default)]
pub struct OutputStream {
    inner: Arc<OutputInner>,
}

#[derive(Default)]
struct OutputInner {
    values: Mutex<Vec<i64>>,
    subscribers: Mutex<Subscribers>,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    list: Vec<(u64, Callback)>,
}

/// Handle returned by [`OutputStream::subscribe`]. Dropping it keeps the
/// subscription; call [`Subscription::unsubscribe`] to remove it.
pub struct Subscription {
    id: u64,
    stream: OutputStream,
}

impl Subscription {
    /// Remove the callback. Returns false if it was already gone.
    pub fn unsubscribe(self) -> bool {
        let mut subs = lock(&self.stream.inner.subscribers);
        let before = subs.list.len();
        subs.list.retain(|(id, _)| *id != self.id);
        subs.list.len() != before
    }
}

impl OutputStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback(value, index)` for every future append.
    /// Callbacks must not subscribe or unsubscribe on the same stream.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: FnMut(i64, usize) + Send + 'static,
    {
        let mut subs = lock(&self.inner.subscribers);
        let id = subs.next_id;
        subs.next_id += 1;
        subs.list.push((id, Box::new(callback)));
        Subscription {
            id,
            stream: self.clone(),
        }
    }

    /// Append `value`, then notify subscribers in registration order.
    /// Returns the value's 0-based index in the stream.
    pub fn emit(&self, value: i64) -> usize {
        let index = {
            let mut values = lock(&self.inner.values);
            values.push(value);
            values.len() - 1
        };
        tracing::trace!(value, index, "output");
        let mut subs = lock(&self.inner.subscribers);
        for (_, cb) in subs.list.iter_mut() {
            cb(value, index);
        }
        index
    }

    pub fn values(&self) -> Vec<i64> {
        lock(&self.inner.values).clone()
    }

    pub fn last(&self) -> Option<i64> {
        lock(&self.inner.values).last().copied()
    }

    pub fn len(&self) -> usize {
        lock(&self.inner.values).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.subscribers).list.len()
    }
}

impl std::fmt::Debug for OutputStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputStream")
            .field("values", &self.values())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
