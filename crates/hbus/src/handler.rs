// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handler capability and the Looper-backed inbox.
//!
//! The router only ever sees the narrow [`Endpoint`] capability (a single
//! `post` method). [`Inbox`] is the standard implementation: it owns a
//! [`Looper`] whose worker invokes the user's [`Handler`] callback, so each
//! handler processes its messages on its own thread, in post order,
//! decoupled from every producer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::message::Message;
use crate::router::Router;
use crate::runtime::Looper;

/// User-side message callback.
///
/// Implemented by handler types, or use any `Fn(Message)` closure.
pub trait Handler: Send + Sync + 'static {
    fn on_message(&self, message: Message);
}

impl<F> Handler for F
where
    F: Fn(Message) + Send + Sync + 'static,
{
    fn on_message(&self, message: Message) {
        self(message)
    }
}

/// Narrow dispatch capability stored by the router.
///
/// `post` enqueues and returns; it must not call back into the router.
pub trait Endpoint: Send + Sync {
    fn post(&self, message: Message);
}

/// Per-handler inbox: a [`Looper`] worker draining messages into a
/// [`Handler`] in strict FIFO order.
///
/// The inbox keeps a back reference to the router it registered with and
/// unregisters itself on drop, so the registration can never outlive the
/// mailbox. The router in turn holds only a weak reference; dropping the
/// last `Arc<Inbox>` tears the worker down.
pub struct Inbox {
    name: String,
    looper: Looper<Message>,
    router: Weak<Router>,
    /// Whether this inbox won the registration for `name`; a loser of the
    /// first-writer-wins race must not unregister the winner on drop.
    owns_registration: AtomicBool,
}

impl Inbox {
    /// Spawn a worker for `handler` and register it with `router` under
    /// `name`.
    ///
    /// Registration is first-writer-wins: when the name is already taken the
    /// inbox still spawns but receives nothing until the holder goes away.
    pub fn register(
        router: &Arc<Router>,
        name: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> Arc<Inbox> {
        let name = name.into();
        let looper = Looper::new(move |message| handler.on_message(message));
        let inbox = Arc::new(Inbox {
            name: name.clone(),
            looper,
            router: Arc::downgrade(router),
            owns_registration: AtomicBool::new(false),
        });

        let won = router.register(name, Arc::downgrade(&inbox) as Weak<dyn Endpoint>);
        inbox.owns_registration.store(won, Ordering::Relaxed);

        inbox
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Discard queued messages without stopping the worker.
    pub fn clear(&self) {
        self.looper.clear();
    }
}

impl Endpoint for Inbox {
    fn post(&self, message: Message) {
        self.looper.post(message);
    }
}

impl Drop for Inbox {
    fn drop(&mut self) {
        if self.owns_registration.load(Ordering::Relaxed) {
            if let Some(router) = self.router.upgrade() {
                router.unregister(&self.name);
            }
        }
        self.looper.stop();
    }
}
