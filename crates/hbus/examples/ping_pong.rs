// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Two chat clients exchanging messages through the bus, plus a periodic
//! timer message.
//!
//! Run with: cargo run --example ping_pong

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use hbus::{Inbox, Message, Router, Timer};

/// Application message ids.
const CHAT: u16 = 1;
const TICK: u16 = 9;

/// A named participant: registers under `id`, prints whatever arrives on
/// its own worker.
struct Client {
    id: String,
    router: Arc<Router>,
    _inbox: Arc<Inbox>,
}

impl Client {
    fn new(router: &Arc<Router>, id: &str) -> Self {
        let name = id.to_owned();
        let inbox = Inbox::register(
            router,
            id,
            Arc::new(move |mut message: Message| match message.id {
                TICK => println!("[{}] tick", name),
                _ => {
                    let chat: String = message.pop();
                    println!("{} -> {} : {}", message.from, message.to, chat);
                }
            }),
        );

        Self {
            id: id.to_owned(),
            router: Arc::clone(router),
            _inbox: inbox,
        }
    }

    fn send(&self, dst: &str, chat: &str) {
        let mut message = Message::new(CHAT).with(chat);
        message.from.clone_from(&self.id);
        message.to = dst.to_owned();

        self.router.post(message);
    }
}

fn main() {
    let router = Arc::new(Router::new());
    let timer = Timer::spawn(Arc::clone(&router));

    let alice = Client::new(&router, "alice");
    let bob = Client::new(&router, "bob");

    timer
        .register("alice", TICK, Duration::from_millis(300))
        .expect("period is valid");

    alice.send("bob", "ping");
    bob.send("alice", "pong");

    for round in 0..3 {
        alice.send("bob", &format!("round {}", round));
        thread::sleep(Duration::from_millis(250));
    }

    thread::sleep(Duration::from_millis(500));

    timer.stop();
    router.stop();
}
