// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A detached, fire-and-forget suspendable computation (§4.4).
//!
//! Crouton's `Task` has no observable return value and no `JoinHandle`
//! (§4.4: "a top-level suspendable function with no observable return
//! value", "a Task completing with an error logs the error (no propagation
//! path exists)"). A heavyweight intrusive, atomically refcounted,
//! vtable-erased task handle would exist to support joining and
//! cross-thread work-stealing, neither of which applies here (see
//! DESIGN.md); a spawned future here is just an `Rc<RefCell<Pin<Box<dyn
//! Future<Output = ()>>>>>` registered with the current scheduler.

use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use pin_project::pin_project;

use crate::scheduler::{Scheduler, TaskId, TaskSlot};

/// Spawns `future` onto the current thread's scheduler.
///
/// The task starts running the next time the scheduler's ready queue is
/// drained (spawning schedules it eagerly, per §4.4).
pub fn spawn(future: impl Future<Output = ()> + 'static) -> TaskId {
    spawn_on(&Scheduler::current(), future)
}

/// Spawns `future` with a debug name, surfaced in `tracing` events.
pub fn spawn_named(name: &'static str, future: impl Future<Output = ()> + 'static) -> TaskId {
    spawn_on_named(&Scheduler::current(), Some(name), future)
}

pub(crate) fn spawn_on(scheduler: &Scheduler, future: impl Future<Output = ()> + 'static) -> TaskId {
    spawn_on_named(scheduler, None, future)
}

fn spawn_on_named(
    scheduler: &Scheduler,
    name: Option<&'static str>,
    future: impl Future<Output = ()> + 'static,
) -> TaskId {
    let slot = Rc::new(TaskSlot {
        name,
        future: std::cell::RefCell::new(Box::pin(FuturePanicGuard { inner: future, name })),
    });
    scheduler.register_task(slot)
}

/// Wraps a spawned future so that a panic inside it is caught, logged at
/// `error` level (§7 "an unhandled Future error at task completion is
/// logged at critical level"), and terminates only that task rather than
/// unwinding across the event loop boundary (§3).
#[pin_project]
struct FuturePanicGuard<F> {
    #[pin]
    inner: F,
    name: Option<&'static str>,
}

impl<F: Future<Output = ()>> Future for FuturePanicGuard<F> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let this = self.project();
        let name = *this.name;
        let inner = this.inner;

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| inner.poll(cx)));
        match result {
            Ok(poll) => poll,
            Err(payload) => {
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "task panicked".to_string());
                tracing::error!(task.name = ?name, "{msg}");
                Poll::Ready(())
            }
        }
    }
}

/// Yields control back to the scheduler once, then resumes. Useful for
/// cooperative fairness within a long-running task and used by tests to
/// exercise the ready queue's FIFO ordering.
pub async fn yield_now() {
    struct YieldNow {
        yielded: bool,
    }

    impl Future for YieldNow {
        type Output = ();

        fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
            if self.yielded {
                return Poll::Ready(());
            }
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }

    YieldNow { yielded: false }.await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc as StdRc;

    #[test]
    fn panicking_task_does_not_abort_scheduler() {
        let sched = Scheduler::current();
        let ran_after = StdRc::new(Cell::new(false));
        let ran_after2 = ran_after.clone();

        spawn_on(&sched, async { panic!("boom") });
        spawn_on(&sched, async move { ran_after2.set(true) });

        sched.run_until(|| false);
        assert!(ran_after.get());
    }

    #[test]
    fn yield_now_reschedules() {
        let sched = Scheduler::current();
        let steps = StdRc::new(std::cell::RefCell::new(Vec::new()));
        let s = steps.clone();
        spawn_on(&sched, async move {
            s.borrow_mut().push(1);
            yield_now().await;
            s.borrow_mut().push(2);
        });
        sched.run_until(|| false);
        assert_eq!(*steps.borrow(), vec![1, 2]);
    }
}
