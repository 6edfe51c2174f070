// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! One-shot awaitable result slots with chaining (§4.3).

use std::cell::RefCell;
use std::fmt;
use std::future::Future as StdFuture;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::Error;

enum Slot<T> {
    Empty,
    Ready(Result<T, Error>),
    Taken,
}

struct Inner<T> {
    slot: Slot<T>,
    waiter: Option<Waker>,
}

/// A one-shot result slot: `Empty`, `Ok(T)`, or `Err(Error)` (§3).
///
/// Shared by reference between the producer ([`Promise`]) and a single
/// consumer ([`Future`]). At most one waiter may be registered at a time;
/// a second concurrent `.await` is a contract error (§4.3, §8).
pub struct FutureState<T> {
    inner: Rc<RefCell<Inner<T>>>,
}

impl<T> Clone for FutureState<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for FutureState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FutureState<T> {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                slot: Slot::Empty,
                waiter: None,
            })),
        }
    }

    /// Constructs a state that is already resolved with `value`.
    pub fn ready(value: Result<T, Error>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                slot: Slot::Ready(value),
                waiter: None,
            })),
        }
    }

    pub fn has_result(&self) -> bool {
        !matches!(self.inner.borrow().slot, Slot::Empty)
    }

    /// Resolves the state. Idempotent in name only: a second call is a
    /// contract error and panics, matching §4.3 ("a second `setResult` is
    /// rejected -- a diagnostic failure, not silent").
    fn set_result(&self, value: Result<T, Error>) {
        let mut inner = self.inner.borrow_mut();
        assert!(
            matches!(inner.slot, Slot::Empty),
            "FutureState::set_result called twice"
        );
        inner.slot = Slot::Ready(value);
        if let Some(waker) = inner.waiter.take() {
            waker.wake();
        }
    }
}

/// The producer side of a [`FutureState`].
///
/// Constructed together with its paired [`Future`] via [`Promise::new`].
pub struct Promise<T> {
    state: FutureState<T>,
}

impl<T> Promise<T> {
    /// Creates a fresh promise/future pair.
    pub fn new() -> (Self, Future<T>) {
        let state = FutureState::new();
        (
            Self {
                state: state.clone(),
            },
            Future { state },
        )
    }

    pub fn set_result(self, value: T) {
        self.state.set_result(Ok(value));
    }

    pub fn set_error(self, err: Error) {
        self.state.set_result(Err(err));
    }
}

/// A move-only, awaitable handle to a [`FutureState`].
///
/// Implements [`std::future::Future`] directly so it composes with native
/// `.await`, satisfying both error-surfacing styles named in §4.3: `?` on
/// the `Result` it resolves to (the "result style"), or [`Future::result`]
/// for callers that want panics instead of `Result`-threading (the
/// "exception style"). A `Future` whose value is already present resolves
/// without suspending (§3).
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Future<T> {
    state: FutureState<T>,
}

impl<T> Future<T> {
    /// Wraps an already-resolved value; awaiting it never suspends.
    pub fn ready(value: T) -> Self {
        Self {
            state: FutureState::ready(Ok(value)),
        }
    }

    pub fn from_error(err: Error) -> Self {
        Self {
            state: FutureState::ready(Err(err)),
        }
    }

    pub fn has_result(&self) -> bool {
        self.state.has_result()
    }

    /// Chains a continuation that runs once this future resolves, itself
    /// producing the next future in the chain (§4.3).
    pub fn then<U, Fut>(self, continuation: impl FnOnce(Result<T, Error>) -> Fut + 'static) -> Future<U>
    where
        Fut: StdFuture<Output = Result<U, Error>> + 'static,
        T: 'static,
        U: 'static,
    {
        let (promise, future) = Promise::new();
        crate::task::spawn(async move {
            let result = self.await;
            match continuation(result).await {
                Ok(v) => promise.set_result(v),
                Err(e) => promise.set_error(e),
            }
        });
        future
    }

    /// Awaits the value, panicking with the error's `Display` text if the
    /// future resolved to an error -- the "raise" style named in §4.3 for
    /// callers that treat failure as unrecoverable.
    pub async fn result(self) -> T {
        match self.await {
            Ok(v) => v,
            Err(e) => panic!("Future resolved to an error: {e}"),
        }
    }
}

impl<T> StdFuture for Future<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.state.inner.borrow_mut();

        if let Slot::Ready(_) = inner.slot {
            let Slot::Ready(value) = std::mem::replace(&mut inner.slot, Slot::Taken) else {
                unreachable!()
            };
            return Poll::Ready(value);
        }

        assert!(
            inner.waiter.is_none()
                || inner
                    .waiter
                    .as_ref()
                    .is_some_and(|w| w.will_wake(cx.waker())),
            "at most one waiter may be registered on a FutureState at a time"
        );
        inner.waiter = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl<T> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future")
            .field("has_result", &self.has_result())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;

    #[test]
    fn ready_future_does_not_suspend() {
        let sched = Scheduler::current();
        let v = sched.block_on(Future::ready(42));
        assert_eq!(v, Ok(42));
    }

    #[test]
    fn promise_resolves_future() {
        let sched = Scheduler::current();
        let (promise, future) = Promise::<u32>::new();
        promise.set_result(7);
        let v = sched.block_on(future);
        assert_eq!(v, Ok(7));
    }

    #[test]
    fn promise_resolves_after_await_begins() {
        let sched = Scheduler::current();
        let (promise, future) = Promise::<u32>::new();
        crate::task::spawn_on(&sched, async move {
            promise.set_result(9);
        });
        let v = sched.block_on(future);
        assert_eq!(v, Ok(9));
    }

    #[test]
    #[should_panic(expected = "set_result called twice")]
    fn double_set_result_panics() {
        let (promise, _future) = Promise::<u32>::new();
        promise.state.set_result(Ok(1));
        promise.state.set_result(Ok(2));
    }

    #[test]
    fn then_chains_continuation() {
        let sched = Scheduler::current();
        let (promise, future) = Promise::<u32>::new();
        promise.set_result(10);
        let chained = future.then(|r| async move { Ok::<_, Error>(r.unwrap() * 2) });
        let v = sched.block_on(chained);
        assert_eq!(v, Ok(20));
    }
}
