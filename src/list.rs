// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A FIFO queue of waiting tasks.
//!
//! The original design (§9 Design Notes) stores waiters in an intrusive
//! doubly-linked list to avoid allocation in the hot path. Crouton is
//! `std`-only and single-threaded for same-thread waiters, so the Design
//! Notes' allowance applies: "a functionally equivalent owned-node list is
//! acceptable if allocation cost is not a concern." `WaitList` is that
//! owned-node list, implemented as a `VecDeque` of waiter slots addressed by
//! a stable token so that a cancelled waiter (a dropped future) can remove
//! itself without disturbing FIFO order for the rest.

use std::collections::VecDeque;
use std::task::Waker;

/// A stable handle into a [`WaitList`], returned by [`WaitList::push`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Token(u64);

struct Slot {
    token: Token,
    waker: Option<Waker>,
}

/// FIFO list of parked wakers, in subscription order.
#[derive(Default)]
pub struct WaitList {
    slots: VecDeque<Slot>,
    next_token: u64,
}

impl WaitList {
    pub fn new() -> Self {
        Self {
            slots: VecDeque::new(),
            next_token: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Subscribes a new waiter at the tail of the list, returning a token
    /// that can later be used to update its waker or remove it.
    pub fn push(&mut self, waker: Waker) -> Token {
        let token = Token(self.next_token);
        self.next_token += 1;
        self.slots.push_back(Slot {
            token,
            waker: Some(waker),
        });
        token
    }

    /// Updates the waker stored for `token`, if it is still queued.
    pub fn update(&mut self, token: Token, waker: &Waker) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.token == token) {
            if !slot
                .waker
                .as_ref()
                .is_some_and(|existing| existing.will_wake(waker))
            {
                slot.waker = Some(waker.clone());
            }
        }
    }

    /// Removes `token` from the list without waking it (used when a waiting
    /// future is dropped/cancelled before being notified).
    pub fn remove(&mut self, token: Token) {
        self.slots.retain(|s| s.token != token);
    }

    /// Wakes and removes the waiter at the head of the list, if any.
    pub fn notify_one(&mut self) -> bool {
        if let Some(slot) = self.slots.pop_front() {
            if let Some(waker) = slot.waker {
                waker.wake();
            }
            true
        } else {
            false
        }
    }

    /// Wakes and removes every waiter, in FIFO (subscription) order.
    pub fn notify_all(&mut self) -> usize {
        let mut count = 0;
        while self.notify_one() {
            count += 1;
        }
        count
    }
}
