//! # Work queue module
//!
//! A deduplicating FIFO of resource keys with rate-limited re-enqueue and
//! in-flight tracking (C3). Guarantees: at-most-once
//! concurrent processing per key; no key is lost while being processed.
//!
//! The rate limiter's delayed re-add is grounded on
//! `kube-runtime::scheduler`'s debounce-via-`tokio_util::time::DelayQueue`
//! pattern -- the nearest in-pack implementation of delayed, deduplicated
//! delivery -- adapted here from stream debouncing to client-go-style
//! exponential backoff.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    fmt::Debug,
    hash::Hash,
    sync::Arc,
    time::Duration,
};

use futures::future::poll_fn;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_util::time::DelayQueue;
use tracing::trace;

// -----------------------------------------------------------------------------
// Constants

pub const BASE_BACKOFF: Duration = Duration::from_millis(5);
pub const MAX_BACKOFF: Duration = Duration::from_secs(1000);

// -----------------------------------------------------------------------------
// Inner state

struct Inner<K> {
    pending: VecDeque<K>,
    pending_set: HashSet<K>,
    processing: HashSet<K>,
    dirty: HashSet<K>,
    failures: HashMap<K, u32>,
    shutting_down: bool,
}

impl<K> Inner<K>
where
    K: Eq + Hash + Clone,
{
    fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            pending_set: HashSet::new(),
            processing: HashSet::new(),
            dirty: HashSet::new(),
            failures: HashMap::new(),
            shutting_down: false,
        }
    }

    fn add(&mut self, key: K) {
        if self.processing.contains(&key) {
            self.dirty.insert(key);
            return;
        }

        if self.pending_set.insert(key.clone()) {
            self.pending.push_back(key);
        }
    }
}

// -----------------------------------------------------------------------------
// WorkQueue

/// Client-go-style work queue. Cheap to clone: every clone shares the
/// same backing state.
pub struct WorkQueue<K> {
    inner: Arc<Mutex<Inner<K>>>,
    notify: Arc<Notify>,
    schedule: mpsc::UnboundedSender<(K, Duration)>,
}

impl<K> Clone for WorkQueue<K> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            notify: self.notify.clone(),
            schedule: self.schedule.clone(),
        }
    }
}

impl<K> WorkQueue<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    pub fn new() -> Self {
        let inner = Arc::new(Mutex::new(Inner::new()));
        let notify = Arc::new(Notify::new());
        let (schedule_tx, schedule_rx) = mpsc::unbounded_channel();

        tokio::spawn(Self::run_delay_loop(
            inner.clone(),
            notify.clone(),
            schedule_rx,
        ));

        Self {
            inner,
            notify,
            schedule: schedule_tx,
        }
    }

    /// Background fiber owning the `DelayQueue`: receives scheduling
    /// requests from `add_rate_limited` and re-adds a key to `pending`
    /// once its backoff expires.
    async fn run_delay_loop(
        inner: Arc<Mutex<Inner<K>>>,
        notify: Arc<Notify>,
        mut requests: mpsc::UnboundedReceiver<(K, Duration)>,
    ) {
        let mut delay_queue: DelayQueue<K> = DelayQueue::new();

        loop {
            tokio::select! {
                request = requests.recv() => {
                    match request {
                        Some((key, delay)) => {
                            delay_queue.insert(key, delay);
                        }
                        None => return,
                    }
                }
                expired = poll_fn(|cx| delay_queue.poll_expired(cx)), if !delay_queue.is_empty() => {
                    if let Some(entry) = expired {
                        let key = entry.into_inner();
                        trace!(key = ?key, "rate-limited backoff elapsed, re-enqueueing key");

                        let mut guard = inner.lock().await;
                        guard.add(key);
                        drop(guard);
                        notify.notify_one();
                    }
                }
            }
        }
    }

    /// Insert `key` at the tail of pending, or mark it dirty if it is
    /// currently being processed.
    pub async fn add(&self, key: K) {
        let mut guard = self.inner.lock().await;
        guard.add(key);
        drop(guard);
        self.notify.notify_one();
    }

    /// Block until a key is available or the queue has been shut down
    /// and drained. Returns `None` only in the latter case.
    ///
    /// Registers the `Notified` future as a waiter *before* checking
    /// state, so a concurrent `shutdown()` or `add()` that lands between
    /// our state check and our await is never missed --
    /// `notify_waiters()` only wakes waiters already registered when it
    /// is called.
    pub async fn get(&self) -> Option<K> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut guard = self.inner.lock().await;

                if let Some(key) = guard.pending.pop_front() {
                    guard.pending_set.remove(&key);
                    guard.processing.insert(key.clone());
                    return Some(key);
                }

                if guard.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Mark `key` as no longer being processed. If it was marked dirty
    /// while processing, it is guaranteed to be re-added exactly once.
    pub async fn done(&self, key: &K) {
        let mut guard = self.inner.lock().await;
        guard.processing.remove(key);

        if guard.dirty.remove(key) {
            guard.add(key.clone());
            drop(guard);
            self.notify.notify_one();
        }
    }

    /// Schedule a delayed re-add with exponential backoff based on the
    /// cumulative failure count for `key`.
    pub async fn add_rate_limited(&self, key: K) {
        let delay = {
            let mut guard = self.inner.lock().await;
            let count = guard.failures.entry(key.clone()).or_insert(0);
            *count += 1;
            backoff_for(*count)
        };

        if self.schedule.send((key, delay)).is_err() {
            trace!("work queue delay loop has shut down, dropping rate-limited re-add");
        }
    }

    /// Reset the backoff counter for `key`.
    pub async fn forget(&self, key: &K) {
        let mut guard = self.inner.lock().await;
        guard.failures.remove(key);
    }

    /// Terminal: subsequent `get` calls return `None` once pending is
    /// drained.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        guard.shutting_down = true;
        drop(guard);
        self.notify.notify_waiters();
    }

    /// Current pending-queue depth, sampled by the informer for the
    /// `neutree_core_queue_depth` gauge.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

impl<K> Default for WorkQueue<K>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

/// `min(base * 2^(k-1), cap)`, k = 1-indexed consecutive failure count.
fn backoff_for(failure_count: u32) -> Duration {
    let shift = failure_count.saturating_sub(1).min(31);
    let scaled = BASE_BACKOFF.saturating_mul(1u32.checked_shl(shift).unwrap_or(u32::MAX));
    scaled.min(MAX_BACKOFF)
}
