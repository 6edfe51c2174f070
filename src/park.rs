// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Cross-thread hand-off into a single-threaded [`crate::Scheduler`].
//!
//! A thread-safe inbox a scheduler's own thread can block on, and that any
//! other thread can push work into. A `no_std` runtime would busy-wait with
//! `spin` here; Crouton targets `std`, so it blocks on a
//! `parking_lot::Condvar` instead, the idiomatic `std` shape of the same
//! "park/unpark" primitive.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::scheduler::TaskId;

/// A message dropped into a scheduler's inbox from a foreign thread.
pub(crate) enum Message {
    /// Re-schedule the task with this id.
    Wake(TaskId),
    /// Run this closure on the scheduler's own thread (`onEventLoop`).
    Run(Box<dyn FnOnce() + Send + 'static>),
}

#[derive(Default)]
struct Inner {
    queue: Mutex<Vec<Message>>,
    condvar: Condvar,
}

/// The cross-thread-safe half of a scheduler: a `Sync` handle any thread can
/// post [`Message`]s into.
#[derive(Clone)]
pub(crate) struct Parker {
    inner: Arc<Inner>,
}

impl Parker {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(Inner::default()),
        }
    }

    /// Posts a message into the inbox and wakes the parked scheduler thread,
    /// if any. Safe to call from any thread, including the scheduler's own.
    pub(crate) fn post(&self, msg: Message) {
        self.inner.queue.lock().push(msg);
        self.inner.condvar.notify_one();
    }

    /// Drains all currently queued messages without blocking.
    pub(crate) fn drain(&self) -> Vec<Message> {
        std::mem::take(&mut *self.inner.queue.lock())
    }

    /// Blocks the calling (scheduler) thread until a message arrives, or
    /// forever if `deadline` is `None`.
    pub(crate) fn park(&self, deadline: Option<Instant>) {
        let mut queue = self.inner.queue.lock();
        if !queue.is_empty() {
            return;
        }
        match deadline {
            None => self.inner.condvar.wait(&mut queue),
            Some(when) => {
                let now = Instant::now();
                if when > now {
                    self.inner
                        .condvar
                        .wait_for(&mut queue, when - now);
                }
            }
        };
    }
}

/// Never blocks longer than this even with no deadline and no activity, as a
/// defensive bound against a lost wakeup stalling an embedded event loop
/// forever.
pub(crate) const MAX_PARK: Duration = Duration::from_secs(60);
