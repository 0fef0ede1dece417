// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HBUS Global Configuration - Single Source of Truth
//!
//! This module centralizes the runtime constants of the bus.
//! **NEVER hardcode elsewhere!**

use std::thread;
use std::time::Duration;

/// Fixed tick granularity of the periodic scheduler.
///
/// Every schedule period is expressed as a whole number of ticks; periods
/// shorter than one tick are rejected at registration.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Accumulated drift beyond which the scheduler assumes a suspend or
/// clock-adjust event and resynchronizes (tick counter reset, new epoch).
pub const CLOCK_JUMP_LIMIT: Duration = Duration::from_secs(10);

/// Body slots reserved by `Message::new` before the first push.
pub const DEFAULT_BODY_CAPACITY: usize = 10;

/// Maximum number of body items a message may carry on the wire.
///
/// The serialized item count is a single byte; longer bodies are rejected
/// by the encoder.
pub const MAX_BODY_ITEMS: usize = 0xFF;

/// Worker count for the router's dispatch pool.
///
/// One worker per hardware thread, never less than one.
#[must_use]
pub fn dispatch_workers() -> usize {
    thread::available_parallelism().map_or(1, usize::from)
}
