// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;
use std::task::Waker;

/// The scheduler's promise to resume exactly one parked task, once.
///
/// Created by [`crate::Scheduler::suspend`] (or, equivalently, by cloning a
/// [`std::task::Context`]'s `Waker` inside a hand-written `Future::poll`
/// impl). `wake_up` is thread-safe: holders may call it from any thread,
/// exactly once; redundant calls are ignored (§4.2).
#[must_use = "a Suspension does nothing until wake_up is called"]
pub struct Suspension(Waker);

impl Suspension {
    pub(crate) fn from_waker(waker: Waker) -> Self {
        Self(waker)
    }

    /// Resumes the parked task. Consumes the handle: after this call the
    /// `Suspension` pointer is invalidated, matching §4.2's
    /// `Woken -> Consumed` transition.
    pub fn wake_up(self) {
        self.0.wake();
    }

    /// Like [`Self::wake_up`], but does not consume the handle. Useful when
    /// the same `Suspension` must be retried (e.g. after a spurious
    /// wake-up); still idempotent.
    pub fn wake_by_ref(&self) {
        self.0.wake_by_ref();
    }

    /// The raw `Waker` backing this suspension, for code that needs to hand
    /// it to a foreign (non-Crouton) async API.
    pub fn into_waker(self) -> Waker {
        self.0
    }
}

impl fmt::Debug for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suspension").finish_non_exhaustive()
    }
}

impl Clone for Suspension {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}
