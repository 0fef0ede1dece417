// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Stoppable concurrent FIFO with blocking and non-blocking ends.
//!
//! A mutex guards the queue, a condvar signals non-empty. The `try_*`
//! variants use `try_lock` and never block, so a producer on a hot path can
//! probe a contended mailbox and move on. `Stopped` is terminal: pushes are
//! dropped, blocked consumers wake and drain what is left.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

struct Inner<T> {
    queue: VecDeque<T>,
    stopped: bool,
}

/// Concurrent FIFO of `T` with a terminal stopped state.
pub struct Mailbox<T> {
    inner: Mutex<Inner<T>>,
    ready: Condvar,
}

impl<T> Mailbox<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                queue: VecDeque::new(),
                stopped: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Append a value and wake at most one waiter.
    ///
    /// After [`Mailbox::stop`] the value is silently dropped; late producers
    /// must not depend on delivery.
    pub fn push(&self, value: T) {
        {
            let mut inner = self.inner.lock();
            if inner.stopped {
                return;
            }
            inner.queue.push_back(value);
        }
        self.ready.notify_one();
    }

    /// Non-blocking append.
    ///
    /// Fails and returns the value when the mailbox lock is contended or the
    /// mailbox is stopped.
    pub fn try_push(&self, value: T) -> Result<(), T> {
        match self.inner.try_lock() {
            Some(mut inner) => {
                if inner.stopped {
                    return Err(value);
                }
                inner.queue.push_back(value);
                drop(inner);
                self.ready.notify_one();
                Ok(())
            }
            None => Err(value),
        }
    }

    /// Block until a value is available or the mailbox stops.
    ///
    /// Returns `None` only when stopped and drained.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        while inner.queue.is_empty() && !inner.stopped {
            self.ready.wait(&mut inner);
        }
        inner.queue.pop_front()
    }

    /// Non-blocking head removal; `None` when empty or contended.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.try_lock()?.queue.pop_front()
    }

    /// Transition to stopped and wake every waiter. Irreversible.
    pub fn stop(&self) {
        {
            let mut inner = self.inner.lock();
            inner.stopped = true;
        }
        self.ready.notify_all();
    }

    /// Discard all pending values without changing state.
    pub fn clear(&self) {
        self.inner.lock().queue.clear();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.inner.lock().stopped
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let mailbox = Mailbox::new();
        mailbox.push(1);
        mailbox.push(2);
        mailbox.push(3);

        assert_eq!(mailbox.pop(), Some(1));
        assert_eq!(mailbox.try_pop(), Some(2));
        assert_eq!(mailbox.pop(), Some(3));
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let mailbox = Arc::new(Mailbox::new());
        let producer = Arc::clone(&mailbox);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push(7u32);
        });

        let start = std::time::Instant::now();
        assert_eq!(mailbox.pop(), Some(7));
        assert!(start.elapsed() >= Duration::from_millis(10));

        handle.join().expect("producer should not panic");
    }

    #[test]
    fn test_stop_wakes_blocked_consumer() {
        let mailbox: Arc<Mailbox<u32>> = Arc::new(Mailbox::new());
        let stopper = Arc::clone(&mailbox);

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            stopper.stop();
        });

        assert_eq!(mailbox.pop(), None);
        handle.join().expect("stopper should not panic");
    }

    #[test]
    fn test_stop_drains_before_none() {
        let mailbox = Mailbox::new();
        mailbox.push(1);
        mailbox.push(2);
        mailbox.stop();

        assert_eq!(mailbox.pop(), Some(1));
        assert_eq!(mailbox.pop(), Some(2));
        assert_eq!(mailbox.pop(), None);
    }

    #[test]
    fn test_push_after_stop_drops() {
        let mailbox = Mailbox::new();
        mailbox.stop();
        mailbox.push(1);

        assert!(mailbox.is_empty());
        assert!(mailbox.try_push(2).is_err());
        assert_eq!(mailbox.pop(), None);
    }

    #[test]
    fn test_try_pop_empty_is_none() {
        let mailbox: Mailbox<u32> = Mailbox::new();
        assert_eq!(mailbox.try_pop(), None);
    }

    #[test]
    fn test_clear_keeps_state() {
        let mailbox = Mailbox::new();
        mailbox.push(1);
        mailbox.push(2);
        mailbox.clear();

        assert!(mailbox.is_empty());
        assert!(!mailbox.is_stopped());

        mailbox.push(3);
        assert_eq!(mailbox.pop(), Some(3));
    }
}
