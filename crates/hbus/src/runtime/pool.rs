// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Work-stealing task pool and its single-worker specialization.
//!
//! [`TaskPool`] owns one mailbox per worker. Producers advance an atomic
//! round-robin cursor and place each task into the first non-contended
//! mailbox starting from the hint; workers sweep all mailboxes with
//! `try_pop` (own mailbox first) and fall back to a blocking `pop` on their
//! own. The result is steady-state stealing with producer affinity.
//!
//! [`TaskPool`] preserves no cross-mailbox ordering. [`Looper`] (one
//! mailbox, one worker) preserves strict FIFO and backs every per-handler
//! inbox.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use super::mailbox::Mailbox;

// ============================================================================
// Task pool
// ============================================================================

/// Bounded-staff work-stealing pool executing one callback over `T`.
pub struct TaskPool<T> {
    mailboxes: Arc<Vec<Mailbox<T>>>,
    cursor: AtomicUsize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Send + 'static> TaskPool<T> {
    /// Spawn `worker_count` workers (clamped to at least one), each bound to
    /// its own mailbox, all running `callback`.
    pub fn new<F>(worker_count: usize, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let count = worker_count.max(1);
        let mailboxes: Arc<Vec<Mailbox<T>>> = Arc::new((0..count).map(|_| Mailbox::new()).collect());
        let callback = Arc::new(callback);

        let workers = (0..count)
            .map(|index| {
                let mailboxes = Arc::clone(&mailboxes);
                let callback = Arc::clone(&callback);
                thread::spawn(move || worker_loop(index, &mailboxes, callback.as_ref()))
            })
            .collect();

        Self {
            mailboxes,
            cursor: AtomicUsize::new(0),
            workers: Mutex::new(workers),
        }
    }
}

impl<T> TaskPool<T> {
    /// Schedule a task.
    ///
    /// Lock-free on the cursor; blocks only when every mailbox is contended,
    /// in which case the hinted mailbox takes a blocking push. After
    /// [`TaskPool::stop`] the task is silently dropped.
    pub fn post(&self, value: T) {
        let count = self.mailboxes.len();

        // Atomic modulo advance of the round-robin hint.
        let mut index = self.cursor.load(Ordering::Relaxed);
        loop {
            let next = if index + 1 == count { 0 } else { index + 1 };
            match self
                .cursor
                .compare_exchange_weak(index, next, Ordering::Release, Ordering::Relaxed)
            {
                Ok(_) => break,
                Err(current) => index = current,
            }
        }

        // First non-contended mailbox in rotating order wins.
        let mut value = value;
        for offset in 0..count {
            let slot = (index + offset) % count;
            match self.mailboxes[slot].try_push(value) {
                Ok(()) => return,
                Err(back) => value = back,
            }
        }

        self.mailboxes[index].push(value);
    }

    /// Stop every mailbox and join the workers.
    ///
    /// Workers finish the task in hand and drain their own mailbox before
    /// exiting; tasks still queued elsewhere are picked up by their owning
    /// worker. Must not be called from inside a pool callback.
    pub fn stop(&self) {
        for mailbox in self.mailboxes.iter() {
            mailbox.stop();
        }

        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock();
            workers.drain(..).collect()
        };
        for handle in handles {
            if handle.join().is_err() {
                log::warn!("[pool] worker panicked during shutdown");
            }
        }
    }

    /// Discard every queued task without stopping.
    pub fn clear(&self) {
        for mailbox in self.mailboxes.iter() {
            mailbox.clear();
        }
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.mailboxes.len()
    }
}

impl<T> Drop for TaskPool<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Per-worker loop: sweep all mailboxes starting from our own, then block
/// on our own until stopped and drained.
fn worker_loop<T, F>(index: usize, mailboxes: &[Mailbox<T>], callback: &F)
where
    F: Fn(T),
{
    let count = mailboxes.len();
    loop {
        // Steal sweep, rotated so local index 0 is our mailbox.
        for offset in 0..count {
            let slot = (index + offset) % count;
            if let Some(value) = mailboxes[slot].try_pop() {
                callback(value);
            }
        }

        match mailboxes[index].pop() {
            Some(value) => callback(value),
            None => break,
        }
    }
}

// ============================================================================
// Looper
// ============================================================================

/// Single-mailbox, single-worker pool: strict FIFO from post order to
/// callback order. This is the per-handler inbox primitive.
pub struct Looper<T> {
    mailbox: Arc<Mailbox<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Looper<T> {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(T) + Send + 'static,
    {
        let mailbox = Arc::new(Mailbox::new());
        let worker_mailbox = Arc::clone(&mailbox);
        let worker = thread::spawn(move || {
            while let Some(value) = worker_mailbox.pop() {
                callback(value);
            }
        });

        Self {
            mailbox,
            worker: Mutex::new(Some(worker)),
        }
    }
}

impl<T> Looper<T> {
    /// Direct enqueue: no cursor, no stealing.
    pub fn post(&self, value: T) {
        self.mailbox.push(value);
    }

    /// Stop the mailbox and join the worker after it drains.
    ///
    /// Must not be called from inside the looper's own callback.
    pub fn stop(&self) {
        self.mailbox.stop();
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::warn!("[pool] looper worker panicked during shutdown");
            }
        }
    }

    /// Discard queued tasks without stopping.
    pub fn clear(&self) {
        self.mailbox.clear();
    }
}

impl<T> Drop for Looper<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
