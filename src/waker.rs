// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The `Waker` a task is polled with, and the one-shot-per-suspension
//! dispatch logic that backs [`crate::Suspension`].
//!
//! Built on `futures::task::ArcWake` rather than a hand-rolled
//! `RawWakerVTable`: a type-erased, intrusively-refcounted task handle needs
//! the raw vtable, but Crouton's tasks are plain `Rc`s looked up by id, so
//! the safe `ArcWake` adapter `futures` provides is the idiomatic fit and
//! keeps this crate free of `unsafe`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::ThreadId;

use futures::task::{self, ArcWake};

use crate::park::{Message, Parker};
use crate::scheduler::TaskId;

/// Backs exactly one suspend/resume cycle of one task.
///
/// A fresh [`TaskWaker`] is minted every time a task is polled (see
/// `task.rs`), so `woken` coalesces repeated wake-ups *within that single
/// parked period* — matching §4.2's `Parked -> Woken -> Consumed` state
/// machine and §8's "wakeUp is observed exactly once" property. Once the
/// task has been re-polled, a stale clone calling `wake()` again finds
/// `woken` already set and is correctly a no-op.
pub(crate) struct TaskWaker {
    pub(crate) task_id: TaskId,
    pub(crate) owner_thread: ThreadId,
    pub(crate) parker: Parker,
    woken: AtomicBool,
}

impl TaskWaker {
    pub(crate) fn new(task_id: TaskId, owner_thread: ThreadId, parker: Parker) -> Arc<Self> {
        Arc::new(Self {
            task_id,
            owner_thread,
            parker,
            woken: AtomicBool::new(false),
        })
    }

    pub(crate) fn into_waker(self: Arc<Self>) -> std::task::Waker {
        task::waker(self)
    }
}

impl ArcWake for TaskWaker {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        if arc_self.woken.swap(true, Ordering::AcqRel) {
            tracing::trace!(task = ?arc_self.task_id, "redundant wake-up ignored");
            return;
        }

        if std::thread::current().id() == arc_self.owner_thread {
            crate::scheduler::schedule_local(arc_self.task_id);
        } else {
            tracing::trace!(task = ?arc_self.task_id, "cross-thread wake-up, posting to event loop");
            arc_self
                .parker
                .post(Message::Wake(arc_self.task_id));
        }
    }
}
