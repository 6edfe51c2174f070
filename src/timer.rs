// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! One-shot and periodic delays resolved by the event loop (§4.7).
//!
//! A timer wheel turned once per worker tick is the usual shape for this
//! (`time/timer.rs`, `executor.rs`'s `Worker::tick`/`Worker::block_on`).
//! Crouton keeps that same "turn once per event-loop iteration" shape but
//! replaces the wheel with a `BinaryHeap` of armed deadlines — the owned-node
//! equivalent licensed by the same Design Notes allowance used for
//! [`crate::list::WaitList`]; a scheduler's timer load is small enough that
//! a heap's `O(log n)` per operation is not a concern.

use std::cell::RefCell;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use crate::scheduler::Scheduler;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
struct Deadline(Instant);

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.cmp(&other.0)
    }
}
impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct Armed {
    deadline: Deadline,
    waker: Option<Waker>,
    fired: bool,
}

/// Per-scheduler registry of armed timers, turned once per event-loop
/// iteration.
#[derive(Default)]
pub(crate) struct Timer {
    heap: RefCell<BinaryHeap<Reverse<(Deadline, u64)>>>,
    entries: RefCell<std::collections::HashMap<u64, Armed>>,
    next_id: std::cell::Cell<u64>,
}

impl Timer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn arm(&self, deadline: Instant) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().insert(
            id,
            Armed {
                deadline: Deadline(deadline),
                waker: None,
                fired: false,
            },
        );
        self.heap.borrow_mut().push(Reverse((Deadline(deadline), id)));
        id
    }

    fn register_waker(&self, id: u64, waker: &Waker) -> bool {
        let mut entries = self.entries.borrow_mut();
        let Some(entry) = entries.get_mut(&id) else {
            return true; // cancelled/already fired and removed
        };
        if entry.fired {
            return true;
        }
        if !entry.waker.as_ref().is_some_and(|w| w.will_wake(waker)) {
            entry.waker = Some(waker.clone());
        }
        false
    }

    fn disarm(&self, id: u64) {
        self.entries.borrow_mut().remove(&id);
        // Stale heap entries are skipped lazily in `turn`.
    }

    fn is_fired(&self, id: u64) -> bool {
        self.entries
            .borrow()
            .get(&id)
            .map(|e| e.fired)
            .unwrap_or(true)
    }

    /// Expires every timer whose deadline has passed, waking their tasks.
    /// Returns the number expired.
    pub(crate) fn turn(&self) -> usize {
        let now = Instant::now();
        let mut expired = 0;
        loop {
            let due = {
                let heap = self.heap.borrow();
                matches!(heap.peek(), Some(Reverse((d, _))) if d.0 <= now)
            };
            if !due {
                break;
            }
            let Reverse((_, id)) = self.heap.borrow_mut().pop().unwrap();
            let waker = {
                let mut entries = self.entries.borrow_mut();
                let Some(entry) = entries.get_mut(&id) else {
                    continue; // disarmed
                };
                entry.fired = true;
                entry.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
            expired += 1;
        }
        expired
    }

    /// The earliest deadline still armed, if any.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.heap.borrow().peek().map(|Reverse((d, _))| d.0)
    }
}

/// Future returned by [`sleep`] and [`sleep_until`].
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Sleep {
    scheduler: Scheduler,
    id: Option<u64>,
    deadline: Instant,
}

impl Sleep {
    fn new(scheduler: Scheduler, deadline: Instant) -> Self {
        Self {
            scheduler,
            id: None,
            deadline,
        }
    }
}

impl Future for Sleep {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let timer = self.scheduler.timer();
        let id = match self.id {
            Some(id) => id,
            None => {
                let id = timer.arm(self.deadline);
                self.id = Some(id);
                id
            }
        };

        if timer.register_waker(id, cx.waker()) {
            return Poll::Ready(());
        }
        Poll::Pending
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        if let Some(id) = self.id {
            if !self.scheduler.timer().is_fired(id) {
                self.scheduler.timer().disarm(id);
            }
        }
    }
}

/// Waits until `duration` has elapsed, on the current scheduler.
pub fn sleep(duration: Duration) -> Sleep {
    let scheduler = Scheduler::current();
    let deadline = Instant::now() + duration;
    Sleep::new(scheduler, deadline)
}

/// Waits until `deadline` (an absolute [`Instant`]) has been reached.
pub fn sleep_until(deadline: Instant) -> Sleep {
    Sleep::new(Scheduler::current(), deadline)
}

/// A self-deleting fire-and-forget timer: schedules `f` to run after
/// `duration` and cannot be cancelled (§4.7).
pub fn after(duration: Duration, f: impl FnOnce() + 'static) {
    crate::task::spawn(async move {
        sleep(duration).await;
        f();
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;

    #[test]
    fn sleep_resolves_after_duration() {
        let sched = Scheduler::current();
        let begin = Instant::now();
        sched.block_on(async {
            sleep(Duration::from_millis(30)).await;
        });
        assert!(begin.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn dropped_sleep_does_not_panic_timer() {
        let sched = Scheduler::current();
        sched.block_on(async {
            {
                let _s = sleep(Duration::from_secs(5));
                // dropped immediately without being polled to completion
            }
            sleep(Duration::from_millis(5)).await;
        });
    }
}
