// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A demand-driven asynchronous sequence (§4.5).
//!
//! Unlike [`crate::task::spawn`], a `Generator`'s body makes progress only
//! while a consumer is polling [`Generator::next`]: the body's coroutine
//! frame is driven directly by `next`'s poll rather than registered with the
//! scheduler as an independent task, so it provably does nothing between
//! calls (§4.5, §8.1's Fibonacci scenario). The body may itself `.await`
//! other Crouton awaitables -- a [`crate::timer::sleep`], a
//! [`crate::cocondition::CoCondition`] -- because the real [`Context`]
//! handed to `next` is forwarded straight through to the body's poll.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

/// The producer handle passed into a generator's body closure.
///
/// Cloneable so a body can stash it (e.g. pass it into a helper function)
/// without fighting the borrow checker.
pub struct Yielder<T> {
    slot: Rc<RefCell<Option<T>>>,
}

impl<T> Clone for Yielder<T> {
    fn clone(&self) -> Self {
        Self {
            slot: self.slot.clone(),
        }
    }
}

impl<T> Yielder<T> {
    /// Suspends the body and hands `value` to the waiting consumer. Resumes
    /// the next time [`Generator::next`] is polled.
    pub async fn yield_value(&self, value: T) {
        debug_assert!(
            self.slot.borrow().is_none(),
            "yield_value called while a previous value is still unconsumed"
        );
        *self.slot.borrow_mut() = Some(value);
        YieldPoint { yielded: false }.await
    }
}

struct YieldPoint {
    yielded: bool,
}

impl Future for YieldPoint {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        Poll::Pending
    }
}

/// A demand-driven sequence of values of type `T`.
///
/// Construct with [`Generator::new`], passing a closure that receives a
/// [`Yielder<T>`] and returns the body `async` block. Consume with
/// repeated calls to [`Generator::next`] until it resolves to `None`.
pub struct Generator<T> {
    body: Pin<Box<dyn Future<Output = ()>>>,
    slot: Rc<RefCell<Option<T>>>,
    finished: bool,
}

impl<T: 'static> Generator<T> {
    pub fn new<F, Fut>(body: F) -> Self
    where
        F: FnOnce(Yielder<T>) -> Fut,
        Fut: Future<Output = ()> + 'static,
    {
        let slot = Rc::new(RefCell::new(None));
        let yielder = Yielder { slot: slot.clone() };
        Self {
            body: Box::pin(body(yielder)),
            slot,
            finished: false,
        }
    }

    fn poll_next(&mut self, cx: &mut Context<'_>) -> Poll<Option<T>> {
        if self.finished {
            return Poll::Ready(None);
        }

        let poll = self.body.as_mut().poll(cx);

        if let Some(value) = self.slot.borrow_mut().take() {
            return Poll::Ready(Some(value));
        }

        match poll {
            Poll::Ready(()) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }

    /// Resumes the body until it yields its next value, or returns `None`
    /// once the body has run to completion. A `Generator` that has returned
    /// `None` once continues to return `None` forever (§4.5).
    pub async fn next(&mut self) -> Option<T> {
        std::future::poll_fn(|cx| self.poll_next(cx)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use std::time::Duration;

    #[test]
    fn yields_values_in_order() {
        let sched = Scheduler::current();
        let mut gen = Generator::new(|y| async move {
            y.yield_value(1).await;
            y.yield_value(2).await;
            y.yield_value(3).await;
        });

        let values = sched.block_on(async {
            let mut out = Vec::new();
            while let Some(v) = gen.next().await {
                out.push(v);
            }
            out
        });
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn exhausted_generator_keeps_returning_none() {
        let sched = Scheduler::current();
        let mut gen = Generator::new(|y: Yielder<u32>| async move {
            y.yield_value(1).await;
        });
        sched.block_on(async {
            assert_eq!(gen.next().await, Some(1));
            assert_eq!(gen.next().await, None);
            assert_eq!(gen.next().await, None);
        });
    }

    #[test]
    fn body_may_await_a_sleep_between_yields() {
        let sched = Scheduler::current();
        let mut gen = Generator::new(|y| async move {
            y.yield_value("a").await;
            crate::timer::sleep(Duration::from_millis(20)).await;
            y.yield_value("b").await;
        });
        let begin = std::time::Instant::now();
        let values = sched.block_on(async {
            let mut out = Vec::new();
            while let Some(v) = gen.next().await {
                out.push(v);
            }
            out
        });
        assert_eq!(values, vec!["a", "b"]);
        assert!(begin.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn fibonacci_sequence() {
        let sched = Scheduler::current();
        let mut gen = Generator::new(|y| async move {
            let (mut a, mut b) = (0u64, 1u64);
            loop {
                y.yield_value(a).await;
                let next = a + b;
                a = b;
                b = next;
            }
        });
        let first_eight = sched.block_on(async {
            let mut out = Vec::new();
            for _ in 0..8 {
                out.push(gen.next().await.unwrap());
            }
            out
        });
        assert_eq!(first_eight, vec![0, 1, 1, 2, 3, 5, 8, 13]);
    }
}
