//! Per-key debouncing of asynchronous actions
//!
//! Each key owns at most one pending timer. Calling [`Debouncer::call`] again
//! for the same key aborts the pending timer and starts a fresh delay, so a
//! burst of calls results in one action run, timed from the last call.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::debug;

type Action<K> = Arc<dyn Fn(K) -> BoxFuture<'static, ()> + Send + Sync>;

struct Pending {
    generation: u64,
    handle: JoinHandle<()>,
}

struct Timers<K> {
    pending: HashMap<K, Pending>,
    next_generation: u64,
    disposed: bool,
}

pub struct Debouncer<K> {
    delay: Duration,
    action: Action<K>,
    timers: Arc<Mutex<Timers<K>>>,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    pub fn new<F, Fut>(delay: Duration, action: F) -> Self
    where
        F: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            delay,
            action: Arc::new(move |key| action(key).boxed()),
            timers: Arc::new(Mutex::new(Timers {
                pending: HashMap::new(),
                next_generation: 0,
                disposed: false,
            })),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule the action for `key`, replacing any pending run for it.
    ///
    /// Must be called from within a tokio runtime. Does nothing once the
    /// debouncer has been disposed.
    pub fn call(&self, key: K) {
        // The lock is held until the new entry is inserted so the spawned
        // timer cannot observe the table before its own registration.
        let mut timers = lock(&self.timers);
        if timers.disposed {
            debug!("Debouncer disposed, ignoring call");
            return;
        }

        timers.next_generation += 1;
        let generation = timers.next_generation;
        let handle = tokio::spawn(Self::run_after_delay(
            self.delay,
            key.clone(),
            generation,
            self.timers.clone(),
            self.action.clone(),
        ));

        if let Some(previous) = timers.pending.insert(key, Pending { generation, handle }) {
            previous.handle.abort();
        }
    }

    async fn run_after_delay(
        delay: Duration,
        key: K,
        generation: u64,
        timers: Arc<Mutex<Timers<K>>>,
        action: Action<K>,
    ) {
        sleep(delay).await;

        let current = {
            let mut timers = lock(&timers);
            let current = timers
                .pending
                .get(&key)
                .is_some_and(|pending| pending.generation == generation);
            if current {
                timers.pending.remove(&key);
            }
            current
        };

        // Bookkeeping for this key is gone before the action runs, so a
        // failing action cannot leave a stale entry behind.
        if current {
            action(key).await;
        }
    }

    /// Number of keys with a pending run
    pub fn pending(&self) -> usize {
        lock(&self.timers).pending.len()
    }

    /// Cancel every pending run and ignore all later calls
    pub fn dispose(&self) {
        let mut timers = lock(&self.timers);
        timers.disposed = true;
        let cancelled = timers.pending.len();
        for (_, pending) in timers.pending.drain() {
            pending.handle.abort();
        }
        if cancelled > 0 {
            debug!("Cancelled {} pending debounced runs", cancelled);
        }
    }

    pub fn is_disposed(&self) -> bool {
        lock(&self.timers).disposed
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        let mut timers = lock(&self.timers);
        timers.disposed = true;
        for (_, pending) in timers.pending.drain() {
            pending.handle.abort();
        }
    }
}

fn lock<K>(timers: &Mutex<Timers<K>>) -> MutexGuard<'_, Timers<K>> {
    timers.lock().unwrap_or_else(PoisonError::into_inner)
}
