// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name-addressed message routing
//!
//! The router owns a name->endpoint registry and a work-stealing
//! [`TaskPool`] of [`Message`]. `post` enqueues onto the pool and returns;
//! a pool worker performs the lookup and hands the message to the
//! destination's endpoint, which enqueues onto that handler's own inbox.
//! The registry lock is therefore held only for the lookup, never across
//! user code.
//!
//! Delivery failure modes are silent by design (no dead-letter channel):
//! unknown destinations and endpoints whose handler has gone away are
//! dropped, counted in [`RouterMetrics`], and logged at `debug`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::config;
use crate::handler::Endpoint;
use crate::message::Message;
use crate::runtime::TaskPool;

#[inline]
fn recover_read<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::debug!("[router] {} lock poisoned, recovering", context);
            poisoned.into_inner()
        }
    }
}

#[inline]
fn recover_write<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::debug!("[router] {} lock poisoned, recovering", context);
            poisoned.into_inner()
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Routing counters updated with relaxed atomics; consumers only need
/// monotonic snapshots for observability.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    /// Messages accepted by `post`.
    pub posted: AtomicU64,
    /// Messages handed to a destination endpoint.
    pub dispatched: AtomicU64,
    /// Messages dropped because no handler was registered under `to`.
    pub dropped_unknown: AtomicU64,
    /// Messages dropped because the registered handler was already gone.
    pub dropped_stale: AtomicU64,
}

impl RouterMetrics {
    /// Current (posted, dispatched, dropped_unknown, dropped_stale).
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.posted.load(Ordering::Relaxed),
            self.dispatched.load(Ordering::Relaxed),
            self.dropped_unknown.load(Ordering::Relaxed),
            self.dropped_stale.load(Ordering::Relaxed),
        )
    }
}

// ============================================================================
// Router
// ============================================================================

struct RouterState {
    handlers: RwLock<HashMap<String, Weak<dyn Endpoint>>>,
    metrics: RouterMetrics,
}

impl RouterState {
    /// Pool worker callback: look up the destination under the shared lock,
    /// release it, then enqueue onto the destination's inbox. The lock is
    /// released first because dropping the upgraded endpoint here may run
    /// the inbox destructor, which calls back into `unregister`.
    fn dispatch(&self, message: Message) {
        let endpoint = {
            let handlers = recover_read(&self.handlers, "handlers");
            match handlers.get(&message.to) {
                Some(weak) => {
                    let endpoint = weak.upgrade();
                    if endpoint.is_none() {
                        self.metrics.dropped_stale.fetch_add(1, Ordering::Relaxed);
                        log::debug!(
                            "[router] drop: handler '{}' destroyed without unregister",
                            message.to
                        );
                    }
                    endpoint
                }
                None => {
                    self.metrics.dropped_unknown.fetch_add(1, Ordering::Relaxed);
                    log::debug!("[router] drop: no handler registered for '{}'", message.to);
                    None
                }
            }
        };

        if let Some(endpoint) = endpoint {
            self.metrics.dispatched.fetch_add(1, Ordering::Relaxed);
            endpoint.post(message);
        }
    }
}

/// Asynchronous name->handler message router.
///
/// Usually shared as `Arc<Router>`; [`Router::global`] provides the lazily
/// constructed process-wide instance for applications that want the
/// singleton shape.
pub struct Router {
    state: Arc<RouterState>,
    pool: TaskPool<Message>,
}

impl Router {
    /// Router with one dispatch worker per hardware thread.
    #[must_use]
    pub fn new() -> Self {
        Self::with_workers(config::dispatch_workers())
    }

    /// Router with an explicit dispatch worker count (clamped to >= 1).
    #[must_use]
    pub fn with_workers(worker_count: usize) -> Self {
        let state = Arc::new(RouterState {
            handlers: RwLock::new(HashMap::new()),
            metrics: RouterMetrics::default(),
        });

        let dispatch_state = Arc::clone(&state);
        let pool = TaskPool::new(worker_count, move |message| dispatch_state.dispatch(message));

        Self { state, pool }
    }

    /// Process-wide router, constructed on first use.
    ///
    /// Never torn down; prefer an owned `Arc<Router>` threaded through
    /// application startup when shutdown ordering matters.
    pub fn global() -> &'static Arc<Router> {
        static GLOBAL: OnceLock<Arc<Router>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Router::new()))
    }

    /// Register an endpoint under `name`.
    ///
    /// First writer wins: a duplicate registration is a silent no-op and
    /// returns `false`. The router keeps only a weak reference; the caller
    /// keeps the endpoint alive and unregisters it before dropping it.
    pub fn register(&self, name: impl Into<String>, endpoint: Weak<dyn Endpoint>) -> bool {
        let name = name.into();
        let mut handlers = recover_write(&self.state.handlers, "handlers");
        match handlers.entry(name) {
            std::collections::hash_map::Entry::Occupied(entry) => {
                log::debug!("[router] duplicate register for '{}' ignored", entry.key());
                false
            }
            std::collections::hash_map::Entry::Vacant(entry) => {
                log::debug!("[router] registered '{}'", entry.key());
                entry.insert(endpoint);
                true
            }
        }
    }

    /// Remove the registration for `name`, if any.
    ///
    /// After this returns, no further message is delivered to the handler.
    pub fn unregister(&self, name: &str) {
        let mut handlers = recover_write(&self.state.handlers, "handlers");
        if handlers.remove(name).is_some() {
            log::debug!("[router] unregistered '{}'", name);
        }
    }

    #[must_use]
    pub fn registered(&self, name: &str) -> bool {
        recover_read(&self.state.handlers, "handlers").contains_key(name)
    }

    /// Enqueue a message for asynchronous dispatch to `message.to`.
    ///
    /// Never blocks on the registry. Returns before the destination handler
    /// runs.
    pub fn post(&self, message: Message) {
        self.state.metrics.posted.fetch_add(1, Ordering::Relaxed);
        self.pool.post(message);
    }

    /// Stop the dispatch pool and join its workers.
    ///
    /// Pending messages still queued in the pool are drained through
    /// dispatch first. Must not be called from a handler callback.
    pub fn stop(&self) {
        self.pool.stop();
    }

    #[must_use]
    pub fn metrics(&self) -> &RouterMetrics {
        &self.state.metrics
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::{Duration, Instant};

    struct Recorder {
        seen: Mutex<Vec<Message>>,
    }

    impl Recorder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
            })
        }

        fn count(&self) -> usize {
            self.seen.lock().len()
        }
    }

    impl Endpoint for Recorder {
        fn post(&self, message: Message) {
            self.seen.lock().push(message);
        }
    }

    fn wait_until(deadline: Duration, predicate: impl Fn() -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < deadline {
            if predicate() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        predicate()
    }

    fn addressed(to: &str, id: u16) -> Message {
        let mut message = Message::new(id);
        message.to = to.to_owned();
        message
    }

    #[test]
    fn test_post_reaches_registered_endpoint() {
        let router = Router::with_workers(2);
        let recorder = Recorder::new();
        router.register("sink", Arc::downgrade(&recorder) as Weak<dyn Endpoint>);

        for id in 0..10 {
            router.post(addressed("sink", id));
        }

        assert!(wait_until(Duration::from_secs(1), || recorder.count() == 10));
        let (posted, dispatched, unknown, stale) = router.metrics().snapshot();
        assert_eq!(posted, 10);
        assert_eq!(dispatched, 10);
        assert_eq!((unknown, stale), (0, 0));
    }

    #[test]
    fn test_unknown_destination_dropped_silently() {
        let router = Router::with_workers(1);
        let recorder = Recorder::new();
        router.register("real", Arc::downgrade(&recorder) as Weak<dyn Endpoint>);

        router.post(addressed("ghost", 1));
        router.post(addressed("real", 2));

        assert!(wait_until(Duration::from_secs(1), || recorder.count() == 1));
        let (_, _, unknown, _) = router.metrics().snapshot();
        assert_eq!(unknown, 1);
    }

    #[test]
    fn test_duplicate_register_keeps_first() {
        let router = Router::with_workers(1);
        let first = Recorder::new();
        let second = Recorder::new();

        assert!(router.register("name", Arc::downgrade(&first) as Weak<dyn Endpoint>));
        assert!(!router.register("name", Arc::downgrade(&second) as Weak<dyn Endpoint>));

        router.post(addressed("name", 7));

        assert!(wait_until(Duration::from_secs(1), || first.count() == 1));
        assert_eq!(second.count(), 0);
    }

    #[test]
    fn test_unregister_stops_delivery() {
        let router = Router::with_workers(1);
        let recorder = Recorder::new();
        router.register("sink", Arc::downgrade(&recorder) as Weak<dyn Endpoint>);

        router.post(addressed("sink", 1));
        assert!(wait_until(Duration::from_secs(1), || recorder.count() == 1));

        router.unregister("sink");
        assert!(!router.registered("sink"));

        router.post(addressed("sink", 2));
        router.stop();
        assert_eq!(recorder.count(), 1);
    }

    #[test]
    fn test_dangling_endpoint_counted_as_stale() {
        let router = Router::with_workers(1);
        let recorder = Recorder::new();
        router.register("leaky", Arc::downgrade(&recorder) as Weak<dyn Endpoint>);
        drop(recorder);

        router.post(addressed("leaky", 1));
        router.stop();

        let (_, _, _, stale) = router.metrics().snapshot();
        assert_eq!(stale, 1);
    }
}
