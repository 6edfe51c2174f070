// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The per-thread scheduler and its event loop (§4.1).
//!
//! Exactly one [`Scheduler`] exists per OS thread, created lazily on first
//! use and reachable only from that thread -- a "global registry maps
//! thread identity -> scheduler" design is, on `std`, simply
//! `thread_local!`. Multi-threaded work-stealing is out of scope per §1 and
//! is not carried forward.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use std::thread::{self, ThreadId};
use std::time::Instant;

use crate::park::{Message, Parker, MAX_PARK};
use crate::suspension::Suspension;
use crate::timer::Timer;
use crate::waker::TaskWaker;

/// Stable, thread-safe identifier for a spawned task.
///
/// Per the Design Notes ("model this as a relation with lookup by stable
/// handle... rather than a raw pointer"), wake-ups crossing a thread
/// boundary carry this plain `u64` rather than a `Rc` (which is not `Send`);
/// the scheduler resolves it back to the live task on its own thread.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskId(u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task#{}", self.0)
    }
}

pub(crate) struct TaskSlot {
    pub(crate) name: Option<&'static str>,
    pub(crate) future: RefCell<Pin<Box<dyn Future<Output = ()>>>>,
}

struct Inner {
    owner_thread: ThreadId,
    next_id: Cell<u64>,
    ready: RefCell<VecDeque<TaskId>>,
    tasks: RefCell<HashMap<TaskId, Rc<TaskSlot>>>,
    parker: Parker,
    timer: Timer,
    stopped: Cell<bool>,
}

/// A per-thread cooperative scheduler.
///
/// Cheap to clone (an `Rc` of the shared state); clones all refer to the
/// same scheduler and must stay on its owning thread. For a clonable,
/// `Send` handle usable from other threads, see [`SchedulerHandle`].
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<Inner>,
}

thread_local! {
    static CURRENT: RefCell<Option<Scheduler>> = const { RefCell::new(None) };
}

impl Scheduler {
    fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                owner_thread: thread::current().id(),
                next_id: Cell::new(0),
                ready: RefCell::new(VecDeque::new()),
                tasks: RefCell::new(HashMap::new()),
                parker: Parker::new(),
                timer: Timer::new(),
                stopped: Cell::new(false),
            }),
        }
    }

    /// Returns the current thread's scheduler, creating one on first use.
    pub fn current() -> Self {
        CURRENT.with(|cell| {
            let mut slot = cell.borrow_mut();
            if slot.is_none() {
                *slot = Some(Scheduler::new());
            }
            slot.as_ref().unwrap().clone()
        })
    }

    /// A `Send + Sync` handle that can be moved to other threads to reach
    /// back into this scheduler via [`SchedulerHandle::on_event_loop`].
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            parker: self.inner.parker.clone(),
        }
    }

    pub(crate) fn timer(&self) -> &Timer {
        &self.inner.timer
    }

    fn next_id(&self) -> TaskId {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        TaskId(id)
    }

    /// Appends a task to the ready queue. Safe only from the scheduler's
    /// own thread (§4.1).
    pub(crate) fn schedule(&self, id: TaskId) {
        debug_assert_eq!(
            thread::current().id(),
            self.inner.owner_thread,
            "Scheduler::schedule called from a foreign thread"
        );
        self.inner.ready.borrow_mut().push_back(id);
    }

    pub(crate) fn register_task(&self, slot: Rc<TaskSlot>) -> TaskId {
        let id = self.next_id();
        self.inner.tasks.borrow_mut().insert(id, slot);
        self.schedule(id);
        id
    }

    /// Hands out a [`Suspension`] tied to the task currently being polled
    /// within `cx`.
    pub fn suspend(cx: &mut Context<'_>) -> Suspension {
        Suspension::from_waker(cx.waker().clone())
    }

    /// Diagnostic: asserts no tasks remain on this scheduler.
    ///
    /// # Panics
    ///
    /// Panics if any task is still registered (spawned but not completed).
    pub fn assert_empty(&self) {
        let tasks = self.inner.tasks.borrow();
        assert!(
            tasks.is_empty(),
            "scheduler has {} leaked task(s) remaining",
            tasks.len()
        );
    }

    /// Drives the event loop: drains the ready queue in FIFO order, then
    /// polls for one round of I/O (here: cross-thread wake-ups and timer
    /// expiry), repeating until `predicate` is true or there is no more
    /// work to do.
    pub fn run_until(&self, mut predicate: impl FnMut() -> bool) {
        loop {
            if predicate() || self.inner.stopped.get() {
                return;
            }

            if self.tick() {
                continue;
            }

            if predicate() || self.inner.stopped.get() {
                return;
            }

            let expired = self.inner.timer.turn();
            if expired > 0 {
                continue;
            }

            let deadline = self
                .inner
                .timer
                .next_deadline()
                .map(|d| d.min(Instant::now() + MAX_PARK));
            self.inner.parker.park(deadline);
            self.drain_external();
        }
    }

    /// Runs one iteration: drains any cross-thread messages, then polls
    /// every task that was ready at the *start* of this iteration (fairness
    /// against starvation of I/O, §4.1/§5). Returns `true` if any task ran.
    fn tick(&self) -> bool {
        self.drain_external();

        let batch: Vec<TaskId> = self.inner.ready.borrow_mut().drain(..).collect();
        if batch.is_empty() {
            return false;
        }

        for id in batch {
            self.poll_task(id);
        }
        true
    }

    fn drain_external(&self) {
        for msg in self.inner.parker.drain() {
            match msg {
                Message::Wake(id) => self.inner.ready.borrow_mut().push_back(id),
                Message::Run(f) => f(),
            }
        }
    }

    fn poll_task(&self, id: TaskId) {
        let Some(slot) = self.inner.tasks.borrow().get(&id).cloned() else {
            // Already completed and removed (e.g. a coalesced wake arrived
            // after completion); nothing to do.
            return;
        };

        let waker = TaskWaker::new(id, self.inner.owner_thread, self.inner.parker.clone())
            .into_waker();
        let mut cx = Context::from_waker(&waker);

        let poll = slot.future.borrow_mut().as_mut().poll(&mut cx);

        if poll.is_ready() {
            tracing::trace!(task = %id, name = ?slot.name, "task completed");
            self.inner.tasks.borrow_mut().remove(&id);
        }
    }

    /// Blocks the current thread, driving the scheduler, until `future`
    /// resolves, returning its output. Used by [`crate::process::run_main`]
    /// and by tests.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        let mut future = Box::pin(future);
        let mut output = None;

        // block_on's own polling loop is itself a "task": give it a waker
        // backed by the same park/wake machinery so that wake-ups reaching
        // it (rather than a spawned task) still make progress.
        let id = self.next_id();

        loop {
            if output.is_some() {
                break;
            }

            let waker =
                TaskWaker::new(id, self.inner.owner_thread, self.inner.parker.clone())
                    .into_waker();
            let mut cx = Context::from_waker(&waker);

            if let Poll::Ready(value) = future.as_mut().poll(&mut cx) {
                output = Some(value);
                break;
            }

            if self.tick() {
                continue;
            }

            let expired = self.inner.timer.turn();
            if expired > 0 {
                continue;
            }

            let deadline = self
                .inner
                .timer
                .next_deadline()
                .map(|d| d.min(Instant::now() + MAX_PARK));
            self.inner.parker.park(deadline);
            self.drain_external();
        }

        output.expect("block_on loop exited without a value")
    }

    /// Signals [`Self::run_until`] to stop as soon as possible.
    pub fn stop(&self) {
        self.inner.stopped.set(true);
    }
}

/// Pushes `id` onto the current thread's ready queue.
///
/// Called only from [`crate::waker::TaskWaker`] when it determines the wake
/// happened on the scheduler's own thread.
pub(crate) fn schedule_local(id: TaskId) {
    Scheduler::current().schedule(id);
}

/// A `Send + Sync` handle back into a specific [`Scheduler`], usable from
/// any thread.
///
/// This is the *only* thread-safe entry point into a scheduler from a
/// foreign thread (§5): platform callback threads (a DNS resolver thread, a
/// `Blocker`'s producer) must marshal through it rather than touching
/// scheduler state directly.
#[derive(Clone)]
pub struct SchedulerHandle {
    parker: Parker,
}

impl SchedulerHandle {
    /// Posts `f` for execution on the scheduler's own thread. Safe to call
    /// from any thread, including the scheduler's own (in which case `f`
    /// still runs on the next event-loop iteration, not inline).
    pub fn on_event_loop(&self, f: impl FnOnce() + Send + 'static) {
        self.parker.post(Message::Run(Box::new(f)));
    }
}
