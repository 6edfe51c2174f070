// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A cross-thread, single-result rendezvous (§4.6).
//!
//! `Blocker<T>` is the cross-thread counterpart to
//! [`crate::cocondition::CoCondition`]: exactly one producer, on any thread
//! (a worker thread, a platform callback), hands a value to exactly one
//! awaiting consumer task. No separate hand-off through
//! [`crate::scheduler::SchedulerHandle::on_event_loop`] is required: the
//! `Waker` registered by the consumer's poll already dispatches correctly
//! whether `set_value` is called same-thread or cross-thread (it is a
//! [`crate::waker::TaskWaker`] under the hood, which detects the case and
//! posts across the `Parker` when needed).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;

enum State<T> {
    Empty,
    Waiting(Waker),
    Ready(T),
    Taken,
}

struct Inner<T> {
    state: Mutex<State<T>>,
}

/// A `Send + Sync` rendezvous point for handing a single value from a
/// foreign thread to one awaiting Crouton task.
pub struct Blocker<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Blocker<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Blocker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Blocker<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State::Empty),
            }),
        }
    }

    /// Delivers `value` to the awaiting consumer, waking it if it is
    /// already parked. Safe to call from any thread, at most once; a second
    /// call panics (§4.6's single-producer contract mirrors §4.3's
    /// single-result `FutureState`).
    pub fn set_value(&self, value: T) {
        let mut state = self.inner.state.lock();
        let waker = match std::mem::replace(&mut *state, State::Ready(value)) {
            State::Empty => None,
            State::Waiting(waker) => Some(waker),
            State::Ready(_) | State::Taken => {
                panic!("Blocker::set_value called more than once")
            }
        };
        drop(state);
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Awaits the value set by [`Self::set_value`].
    pub fn wait(&self) -> BlockerWait<'_, T> {
        BlockerWait { blocker: self }
    }

    /// Returns the `Blocker` to `Empty`, ready to accept another
    /// `set_value`/`wait` cycle (§4.6: "each `Blocker` accepts exactly one
    /// notification per cycle; `reset()` prepares it for reuse").
    ///
    /// # Panics
    ///
    /// Panics if a waiter is currently parked: resetting out from under a
    /// pending `wait()` would leave it parked forever.
    pub fn reset(&self) {
        let mut state = self.inner.state.lock();
        assert!(
            !matches!(*state, State::Waiting(_)),
            "Blocker::reset called while a task is still waiting"
        );
        *state = State::Empty;
    }
}

/// Future returned by [`Blocker::wait`].
#[must_use = "futures do nothing unless `.await`ed or `polled`"]
pub struct BlockerWait<'a, T> {
    blocker: &'a Blocker<T>,
}

impl<T> Future for BlockerWait<'_, T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let mut state = self.blocker.inner.state.lock();
        match &mut *state {
            State::Ready(_) => {
                let State::Ready(value) = std::mem::replace(&mut *state, State::Taken) else {
                    unreachable!()
                };
                Poll::Ready(value)
            }
            State::Taken => panic!("Blocker polled again after its value was already taken"),
            State::Empty => {
                *state = State::Waiting(cx.waker().clone());
                Poll::Pending
            }
            State::Waiting(waker) => {
                if !waker.will_wake(cx.waker()) {
                    *waker = cx.waker().clone();
                }
                Poll::Pending
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use std::time::Duration;

    #[test]
    fn resolves_once_value_is_set() {
        let sched = Scheduler::current();
        let blocker = Blocker::<u32>::new();
        blocker.set_value(5);
        let v = sched.block_on(blocker.wait());
        assert_eq!(v, 5);
    }

    #[test]
    fn wakes_a_task_waiting_before_the_value_arrives() {
        let sched = Scheduler::current();
        let blocker = Blocker::<u32>::new();

        crate::task::spawn_on(&sched, {
            let blocker = blocker.clone();
            async move {
                crate::task::yield_now().await;
                blocker.set_value(11);
            }
        });

        let v = sched.block_on(blocker.wait());
        assert_eq!(v, 11);
    }

    #[test]
    fn cross_thread_producer_wakes_waiting_consumer() {
        let sched = Scheduler::current();
        let blocker = Blocker::<&'static str>::new();
        let producer = blocker.clone();

        let join = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            producer.set_value("from another thread");
        });

        let v = sched.block_on(blocker.wait());
        assert_eq!(v, "from another thread");
        join.join().unwrap();
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn double_set_value_panics() {
        let blocker = Blocker::<u32>::new();
        blocker.set_value(1);
        blocker.set_value(2);
    }

    #[test]
    fn reset_allows_a_second_cycle() {
        let sched = Scheduler::current();
        let blocker = Blocker::<u32>::new();

        blocker.set_value(1);
        assert_eq!(sched.block_on(blocker.wait()), 1);

        blocker.reset();
        blocker.set_value(2);
        assert_eq!(sched.block_on(blocker.wait()), 2);
    }

    #[test]
    #[should_panic(expected = "still waiting")]
    fn reset_while_waiting_panics() {
        let blocker = Blocker::<u32>::new();
        {
            let mut state = blocker.inner.state.lock();
            *state = State::Waiting(futures::task::noop_waker());
        }
        blocker.reset();
    }
}
