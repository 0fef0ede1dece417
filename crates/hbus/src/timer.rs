// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fixed-tick periodic message scheduler
//!
//! A dedicated thread advances a tick counter every
//! [`TICK_INTERVAL`](crate::config::TICK_INTERVAL) and, for every schedule
//! entry whose phase matches (`tick % period == offset`), posts a message
//! `{id: message_id, to: handler_id}` through the router.
//!
//! The sleep between ticks is drift-corrected: the loop compares real
//! elapsed time against `tick x interval` and shortens the next sleep by the
//! accumulated error, so a late tick catches up instead of shifting every
//! subsequent tick. An error beyond
//! [`CLOCK_JUMP_LIMIT`](crate::config::CLOCK_JUMP_LIMIT) is treated as a
//! suspend or clock-adjust event: the tick counter resets and schedules
//! re-phase from the new epoch.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::{CLOCK_JUMP_LIMIT, TICK_INTERVAL};
use crate::message::Message;
use crate::router::Router;

#[inline]
fn recover_read<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::debug!("[timer] {} lock poisoned, recovering", context);
            poisoned.into_inner()
        }
    }
}

#[inline]
fn recover_write<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::debug!("[timer] {} lock poisoned, recovering", context);
            poisoned.into_inner()
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Rejected schedule registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    /// Period shorter than one tick (this includes zero).
    PeriodTooShort { period: Duration },
    /// Period does not fit the 32-bit tick multiple.
    PeriodTooLong { period: Duration },
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScheduleError::PeriodTooShort { period } => {
                write!(
                    f,
                    "period {:?} is shorter than one {:?} tick",
                    period, TICK_INTERVAL
                )
            }
            ScheduleError::PeriodTooLong { period } => {
                write!(f, "period {:?} exceeds the supported range", period)
            }
        }
    }
}

impl std::error::Error for ScheduleError {}

// ============================================================================
// Schedule
// ============================================================================

/// One periodic emission: fire when `tick % period == offset`.
struct Schedule {
    handler_id: String,
    message_id: u16,
    /// Period in ticks, never zero.
    period: u32,
    /// Phase captured from the tick counter at registration.
    offset: u32,
}

/// Timer counters (relaxed, observability only).
#[derive(Debug, Default)]
pub struct TimerMetrics {
    pub ticks: AtomicU64,
    pub fired: AtomicU64,
    pub resyncs: AtomicU64,
}

impl TimerMetrics {
    /// Current (ticks, fired, resyncs).
    #[must_use]
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.ticks.load(Ordering::Relaxed),
            self.fired.load(Ordering::Relaxed),
            self.resyncs.load(Ordering::Relaxed),
        )
    }
}

struct TimerShared {
    schedule: RwLock<Vec<Schedule>>,
    tick: AtomicU64,
    done: AtomicBool,
    metrics: TimerMetrics,
    router: Arc<Router>,
}

// ============================================================================
// Timer
// ============================================================================

/// Periodic scheduler bound to one router.
///
/// Construct with [`Timer::spawn`] for an owned instance, or use
/// [`Timer::global`] for the process-wide instance bound to
/// [`Router::global`]. Stop the timer before stopping the router it posts
/// to.
pub struct Timer {
    shared: Arc<TimerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Timer {
    /// Start the tick thread, posting through `router`.
    #[must_use]
    pub fn spawn(router: Arc<Router>) -> Self {
        let shared = Arc::new(TimerShared {
            schedule: RwLock::new(Vec::new()),
            tick: AtomicU64::new(0),
            done: AtomicBool::new(false),
            metrics: TimerMetrics::default(),
            router,
        });

        let loop_shared = Arc::clone(&shared);
        let worker = thread::spawn(move || tick_loop(&loop_shared));

        Self {
            shared,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Process-wide timer bound to [`Router::global`], started on first use.
    pub fn global() -> &'static Timer {
        static GLOBAL: OnceLock<Timer> = OnceLock::new();
        GLOBAL.get_or_init(|| Timer::spawn(Arc::clone(Router::global())))
    }

    /// Schedule a periodic message `{id: message_id, to: handler_id}`.
    ///
    /// The period is floor-divided into ticks; the phase is set from the
    /// current tick, so the first emission lands one period after
    /// registration.
    pub fn register(
        &self,
        handler_id: impl Into<String>,
        message_id: u16,
        period: Duration,
    ) -> Result<(), ScheduleError> {
        let ticks = period.as_millis() / TICK_INTERVAL.as_millis();
        if ticks == 0 {
            return Err(ScheduleError::PeriodTooShort { period });
        }
        let period_ticks =
            u32::try_from(ticks).map_err(|_| ScheduleError::PeriodTooLong { period })?;

        let tick = self.shared.tick.load(Ordering::Relaxed);
        let entry = Schedule {
            handler_id: handler_id.into(),
            message_id,
            period: period_ticks,
            offset: (tick % u64::from(period_ticks)) as u32,
        };

        log::debug!(
            "[timer] registered '{}' id={} every {} tick(s), offset {}",
            entry.handler_id,
            entry.message_id,
            entry.period,
            entry.offset
        );
        recover_write(&self.shared.schedule, "schedule").push(entry);

        Ok(())
    }

    /// Remove every schedule entry for `handler_id`.
    pub fn unregister(&self, handler_id: &str) {
        recover_write(&self.shared.schedule, "schedule")
            .retain(|entry| entry.handler_id != handler_id);
    }

    /// Remove the schedule entries matching `(handler_id, message_id)`.
    pub fn unregister_message(&self, handler_id: &str, message_id: u16) {
        recover_write(&self.shared.schedule, "schedule")
            .retain(|entry| entry.handler_id != handler_id || entry.message_id != message_id);
    }

    /// Number of live schedule entries.
    #[must_use]
    pub fn scheduled(&self) -> usize {
        recover_read(&self.shared.schedule, "schedule").len()
    }

    /// Current tick count (resets on clock-jump resynchronization).
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.shared.tick.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn metrics(&self) -> &TimerMetrics {
        &self.shared.metrics
    }

    /// Stop the tick thread and join it. The last tick in flight completes.
    pub fn stop(&self) {
        self.shared.done.store(true, Ordering::Relaxed);
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                log::warn!("[timer] tick thread panicked during shutdown");
            }
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Tick loop
// ============================================================================

/// Signed drift between real elapsed time and the ideal tick schedule, in
/// nanoseconds. Positive means the loop is running late.
#[inline]
fn drift_ns(elapsed: Duration, tick: u64) -> i128 {
    elapsed.as_nanos() as i128 - i128::from(tick) * TICK_INTERVAL.as_nanos() as i128
}

/// A drift beyond the jump limit in either direction means the host slept
/// or the clock was adjusted; catching up tick-by-tick would be wrong.
#[inline]
fn resync_due(error_ns: i128) -> bool {
    error_ns.unsigned_abs() > CLOCK_JUMP_LIMIT.as_nanos()
}

fn tick_loop(shared: &TimerShared) {
    let mut start = Instant::now();

    while !shared.done.load(Ordering::Relaxed) {
        let tick = shared.tick.fetch_add(1, Ordering::Relaxed) + 1;
        shared.metrics.ticks.fetch_add(1, Ordering::Relaxed);

        {
            let schedule = recover_read(&shared.schedule, "schedule");
            for entry in schedule.iter() {
                if tick % u64::from(entry.period) == u64::from(entry.offset) {
                    let mut message = Message::new(entry.message_id);
                    message.to.clone_from(&entry.handler_id);

                    shared.metrics.fired.fetch_add(1, Ordering::Relaxed);
                    shared.router.post(message);
                }
            }
        }

        let mut error_ns = drift_ns(start.elapsed(), tick);
        if resync_due(error_ns) {
            log::debug!(
                "[timer] clock jump detected ({} ms off), resynchronizing",
                error_ns / 1_000_000
            );
            shared.tick.store(0, Ordering::Release);
            shared.metrics.resyncs.fetch_add(1, Ordering::Relaxed);
            start = Instant::now();
            error_ns = 0;
        }

        let interval_ns = TICK_INTERVAL.as_nanos() as i128;
        if error_ns < interval_ns {
            thread::sleep(Duration::from_nanos((interval_ns - error_ns) as u64));
        }
    }
}
