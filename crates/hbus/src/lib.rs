// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # HBUS - In-process typed-message bus
//!
//! Named handlers register with a central [`Router`]; any producer posts a
//! structured [`Message`] addressed to a handler by name; the router
//! dispatches asynchronously on a work-stealing pool, and each handler
//! drains its own single-worker inbox in FIFO order. A [`Timer`] thread
//! injects periodic messages on behalf of registered handlers.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use hbus::{Inbox, Message, Router, Timer};
//!
//! let router = Arc::new(Router::new());
//!
//! // A handler is a callback draining its own inbox, one message at a time.
//! let _sensor = Inbox::register(&router, "sensor", Arc::new(|mut msg: Message| {
//!     if msg.id == 9 {
//!         println!("sample requested");
//!     } else {
//!         let value: u32 = msg.pop();
//!         println!("got {value}");
//!     }
//! }));
//!
//! // Anyone can post to it by name; delivery is asynchronous.
//! let mut msg = Message::new(1).with(42u32);
//! msg.to = "sensor".into();
//! router.post(msg);
//!
//! // Ask the timer to post message id 9 to "sensor" every 200 ms.
//! let timer = Timer::spawn(Arc::clone(&router));
//! timer.register("sensor", 9, Duration::from_millis(200)).unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! producer -> Router::post -> [ dispatch TaskPool: N workers, stealing ]
//!                                     | name lookup (shared lock)
//!                                     v
//!                             Inbox (Looper: 1 worker, strict FIFO)
//!                                     |
//!                                     v
//!                             Handler::on_message
//!
//! Timer (1 thread, 100 ms ticks) ----^ posts {id, to} via the Router
//! ```
//!
//! The split is deliberate: the dispatch pool provides fan-out parallelism
//! and preserves no global order; per-handler FIFO comes from the
//! single-worker inbox.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Addressed envelope over a stack of typed [`Item`]s |
//! | [`Router`] | Name->handler registry plus asynchronous dispatch pool |
//! | [`Inbox`] | Per-handler mailbox worker, registered by name |
//! | [`Handler`] | User callback invoked on the inbox worker |
//! | [`Timer`] | Fixed-tick periodic message scheduler |
//! | [`TaskPool`] / [`Looper`] | The underlying task fabric |
//!
//! Messages serialize to a self-describing big-endian wire form
//! ([`message::wire`]); addresses stay in-process and are not serialized.

/// Runtime constants (tick interval, worker derivation, body limits).
pub mod config;
/// Handler capability and the Looper-backed inbox.
pub mod handler;
/// Typed message value model and binary codec.
pub mod message;
/// Name-addressed asynchronous routing.
pub mod router;
/// Concurrent task fabric (mailbox, task pool, looper).
pub mod runtime;
/// Fixed-tick periodic message scheduler.
pub mod timer;

pub use handler::{Endpoint, Handler, Inbox};
pub use message::wire::{WireError, WireResult};
pub use message::{Item, Message};
pub use router::{Router, RouterMetrics};
pub use runtime::{Looper, Mailbox, TaskPool};
pub use timer::{ScheduleError, Timer, TimerMetrics};
