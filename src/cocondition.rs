// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A same-thread, FIFO condition variable for cooperative tasks (§4.6).
//!
//! Built directly on [`crate::list::WaitList`], the same owned-node waiter
//! queue the timer uses. Unlike a cross-thread condvar, `CoCondition` is not
//! `Send`/`Sync`: waiters and notifiers always run on the scheduler that
//! owns the `CoCondition`, so no locking beyond a `RefCell` is needed.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::list::{Token, WaitList};

/// A FIFO wait queue for same-thread cooperative tasks.
///
/// Tasks calling [`CoCondition::wait`] are resumed in the order they
/// subscribed, never reordered by [`CoCondition::notify_one`]/
/// [`CoCondition::notify_all`] (§4.6, §8.4's fairness scenario).
#[derive(Default)]
pub struct CoCondition {
    waiters: RefCell<WaitList>,
}

impl CoCondition {
    pub fn new() -> Self {
        Self {
            waiters: RefCell::new(WaitList::new()),
        }
    }

    /// The number of tasks currently parked in [`Self::wait`].
    pub fn waiter_count(&self) -> usize {
        self.waiters.borrow().len()
    }

    /// Suspends the calling task until the next matching `notify_one` or any
    /// `notify_all`.
    pub fn wait(&self) -> Wait<'_> {
        Wait {
            condition: self,
            token: None,
        }
    }

    /// Wakes the longest-waiting task, if any. Returns whether a waiter was
    /// woken.
    pub fn notify_one(&self) -> bool {
        self.waiters.borrow_mut().notify_one()
    }

    /// Wakes every waiting task, in FIFO order. Returns the number woken.
    pub fn notify_all(&self) -> usize {
        self.waiters.borrow_mut().notify_all()
    }
}

/// The future returned by [`CoCondition::wait`].
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Wait<'a> {
    condition: &'a CoCondition,
    token: Option<Token>,
}

impl Future for Wait<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        match self.token {
            None => {
                let token = self
                    .condition
                    .waiters
                    .borrow_mut()
                    .push(cx.waker().clone());
                self.token = Some(token);
                Poll::Pending
            }
            Some(_token) => {
                // The only way this future is polled a second time is that
                // `notify_one`/`notify_all` called our registered waker,
                // which also pops us from the list -- so being polled again
                // at all means it is our turn.
                Poll::Ready(())
            }
        }
    }
}

impl Drop for Wait<'_> {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            self.condition.waiters.borrow_mut().remove(token);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use std::cell::RefCell as StdRefCell;
    use std::rc::Rc;

    #[test]
    fn notify_one_wakes_a_single_waiter() {
        let sched = Scheduler::current();
        let cond = Rc::new(CoCondition::new());
        let order = Rc::new(StdRefCell::new(Vec::new()));

        for i in 0..2 {
            let cond = cond.clone();
            let order = order.clone();
            crate::task::spawn_on(&sched, async move {
                cond.wait().await;
                order.borrow_mut().push(i);
            });
        }

        sched.run_until(|| false);
        assert_eq!(cond.waiter_count(), 2);

        cond.notify_one();
        sched.run_until(|| false);
        assert_eq!(*order.borrow(), vec![0]);
        assert_eq!(cond.waiter_count(), 1);
    }

    #[test]
    fn notifications_are_first_in_first_out() {
        let sched = Scheduler::current();
        let cond = Rc::new(CoCondition::new());
        let order = Rc::new(StdRefCell::new(Vec::new()));

        for i in 0..3 {
            let cond = cond.clone();
            let order = order.clone();
            crate::task::spawn_on(&sched, async move {
                cond.wait().await;
                order.borrow_mut().push(i);
            });
        }
        sched.run_until(|| false);

        cond.notify_one();
        sched.run_until(|| false);
        cond.notify_one();
        sched.run_until(|| false);
        cond.notify_one();
        sched.run_until(|| false);

        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn notify_all_wakes_every_waiter() {
        let sched = Scheduler::current();
        let cond = Rc::new(CoCondition::new());
        let woken = Rc::new(StdRefCell::new(0));

        for _ in 0..4 {
            let cond = cond.clone();
            let woken = woken.clone();
            crate::task::spawn_on(&sched, async move {
                cond.wait().await;
                *woken.borrow_mut() += 1;
            });
        }
        sched.run_until(|| false);

        assert_eq!(cond.notify_all(), 4);
        sched.run_until(|| false);
        assert_eq!(*woken.borrow(), 4);
    }

    #[test]
    fn dropped_wait_removes_itself_without_disturbing_others() {
        let sched = Scheduler::current();
        let cond = CoCondition::new();

        sched.block_on(async {
            let fut = cond.wait();
            futures::pin_mut!(fut);
            let _ = futures::poll!(fut.as_mut());
            drop(fut);
        });

        assert_eq!(cond.waiter_count(), 0);
    }
}
