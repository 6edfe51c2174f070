// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! An in-memory, same-process [`Stream`] pair.
//!
//! A loopback transport used to exercise the stream contract (round-trip
//! read/write, half-close) without a concrete socket backend, since
//! transport backends stay external per §1/§4.9.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

use crate::error::Error;
use crate::stream::{Buffer, NotReentrant, ReentrancyGuard, Stream};

struct Shared {
    buffer: RefCell<VecDeque<u8>>,
    read_waker: RefCell<Option<Waker>>,
    write_closed: Cell<bool>,
    closed: Cell<bool>,
    read_reentrancy: NotReentrant,
    read_guard: RefCell<Option<ReentrancyGuard>>,
    write_reentrancy: NotReentrant,
}

impl Shared {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            buffer: RefCell::new(VecDeque::new()),
            read_waker: RefCell::new(None),
            write_closed: Cell::new(false),
            closed: Cell::new(false),
            read_reentrancy: NotReentrant::new(),
            read_guard: RefCell::new(None),
            write_reentrancy: NotReentrant::new(),
        })
    }

    fn wake_reader(&self) {
        if let Some(waker) = self.read_waker.borrow_mut().take() {
            waker.wake();
        }
    }

    /// Registers `waker` as the sole outstanding read/peek, claiming the
    /// re-entrancy guard on the first poll of a new operation. A second,
    /// distinct task polling while one is already pending panics (§4.8,
    /// §8.5's re-entrancy scenario); the same task's own continuation polls
    /// (matched by `will_wake`) pass through.
    fn claim_read(&self, waker: &Waker) {
        let mut existing = self.read_waker.borrow_mut();
        match existing.as_ref() {
            Some(current) if !current.will_wake(waker) => {
                panic!("re-entrant call into an in-flight stream operation");
            }
            Some(_) => {}
            None => *self.read_guard.borrow_mut() = Some(self.read_reentrancy.enter()),
        }
        *existing = Some(waker.clone());
    }

    fn release_read(&self) {
        self.read_waker.borrow_mut().take();
        self.read_guard.borrow_mut().take();
    }
}

/// One end of an in-memory duplex byte stream. Create a connected pair
/// with [`Pipe::new_pair`].
pub struct Pipe {
    read_buf: Rc<Shared>,
    write_buf: Rc<Shared>,
}

impl Pipe {
    /// Creates two `Pipe`s wired to each other: bytes written to one are
    /// read from the other.
    pub fn new_pair() -> (Pipe, Pipe) {
        let a_to_b = Shared::new();
        let b_to_a = Shared::new();
        (
            Pipe {
                read_buf: b_to_a.clone(),
                write_buf: a_to_b.clone(),
            },
            Pipe {
                read_buf: a_to_b,
                write_buf: b_to_a,
            },
        )
    }
}

impl Stream for Pipe {
    fn is_open(&self) -> bool {
        !self.read_buf.closed.get()
    }

    fn poll_open(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        let this = self.get_mut();
        this.read_buf.closed.set(true);
        this.write_buf.write_closed.set(true);
        this.write_buf.wake_reader();
        Poll::Ready(Ok(()))
    }

    fn poll_close_write(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        let this = self.get_mut();
        this.write_buf.write_closed.set(true);
        this.write_buf.wake_reader();
        Poll::Ready(Ok(()))
    }

    fn poll_read_no_copy(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        max_len: usize,
    ) -> Poll<Result<Buffer, Error>> {
        let this = self.get_mut();
        if this.read_buf.closed.get() {
            this.read_buf.release_read();
            return Poll::Ready(Err(Error::disconnected()));
        }

        let mut buf = this.read_buf.buffer.borrow_mut();
        if buf.is_empty() {
            if this.read_buf.write_closed.get() {
                drop(buf);
                this.read_buf.release_read();
                return Poll::Ready(Ok(Buffer::from_vec(Vec::new())));
            }
            drop(buf);
            this.read_buf.claim_read(cx.waker());
            return Poll::Pending;
        }

        let n = max_len.min(buf.len());
        let chunk: Vec<u8> = buf.drain(..n).collect();
        drop(buf);
        this.read_buf.release_read();
        Poll::Ready(Ok(Buffer::from_vec(chunk)))
    }

    fn poll_peek_no_copy(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Buffer, Error>> {
        let this = self.get_mut();
        if this.read_buf.closed.get() {
            this.read_buf.release_read();
            return Poll::Ready(Err(Error::disconnected()));
        }

        let buf = this.read_buf.buffer.borrow();
        if buf.is_empty() {
            if this.read_buf.write_closed.get() {
                drop(buf);
                this.read_buf.release_read();
                return Poll::Ready(Ok(Buffer::from_vec(Vec::new())));
            }
            drop(buf);
            this.read_buf.claim_read(cx.waker());
            return Poll::Pending;
        }
        let result = Buffer::from_vec(buf.iter().copied().collect());
        drop(buf);
        this.read_buf.release_read();
        Poll::Ready(Ok(result))
    }

    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, data: &[u8]) -> Poll<Result<usize, Error>> {
        let this = self.get_mut();
        let _guard = this.write_buf.write_reentrancy.enter();
        if this.write_buf.write_closed.get() || this.write_buf.closed.get() {
            return Poll::Ready(Err(Error::disconnected()));
        }
        this.write_buf.buffer.borrow_mut().extend(data.iter().copied());
        this.write_buf.wake_reader();
        Poll::Ready(Ok(data.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Scheduler;
    use crate::stream::StreamExt;

    #[test]
    fn round_trip_write_then_read() {
        let sched = Scheduler::current();
        let (mut a, mut b) = Pipe::new_pair();
        sched.block_on(async {
            a.write_all(b"hello").await.unwrap();
            let got = b.read(16).await.unwrap();
            assert_eq!(got, b"hello");
        });
    }

    #[test]
    fn read_blocks_until_a_write_arrives() {
        let sched = Scheduler::current();
        let (mut a, mut b) = Pipe::new_pair();
        sched.block_on(async {
            crate::task::spawn(async move {
                crate::task::yield_now().await;
                a.write_all(b"later").await.unwrap();
            });
            let got = b.read(16).await.unwrap();
            assert_eq!(got, b"later");
        });
    }

    #[test]
    fn half_close_signals_end_of_data_to_peer() {
        let sched = Scheduler::current();
        let (mut a, mut b) = Pipe::new_pair();
        sched.block_on(async {
            a.write_all(b"x").await.unwrap();
            a.close_write().await.unwrap();
            let first = b.read(16).await.unwrap();
            assert_eq!(first, b"x");
            let eof = b.read(16).await.unwrap();
            assert!(eof.is_empty());
        });
    }

    #[test]
    fn peek_does_not_consume() {
        let sched = Scheduler::current();
        let (mut a, mut b) = Pipe::new_pair();
        sched.block_on(async {
            a.write_all(b"peekme").await.unwrap();
            crate::task::yield_now().await;
            let peeked = std::future::poll_fn(|cx| {
                Pin::new(&mut b).poll_peek_no_copy(cx)
            })
            .await
            .unwrap();
            assert_eq!(peeked.as_slice(), b"peekme");
            let read = b.read(16).await.unwrap();
            assert_eq!(read, b"peekme");
        });
    }

    #[test]
    fn is_open_reflects_close() {
        let (mut a, b) = Pipe::new_pair();
        assert!(a.is_open());
        assert!(b.is_open());
        let sched = Scheduler::current();
        sched.block_on(async {
            a.close().await.unwrap();
        });
        assert!(!a.is_open());
    }

    #[test]
    #[should_panic(expected = "re-entrant")]
    fn concurrent_reads_on_the_same_pipe_panic() {
        // Two tasks sharing a single `Pipe` behind interior mutability, each
        // taking only a transient `borrow_mut()` per poll -- the realistic
        // shape of "two readers on the same stream", since a bare `&mut Pipe`
        // can't itself be borrowed twice at once.
        let sched = Scheduler::current();
        let (_a, b) = Pipe::new_pair();
        let b = Rc::new(RefCell::new(b));

        sched.block_on(async {
            let b1 = b.clone();
            let first = std::future::poll_fn(move |cx| {
                Pin::new(&mut *b1.borrow_mut()).poll_read_no_copy(cx, 16)
            });
            futures::pin_mut!(first);
            // Poll once so the pipe registers this as the outstanding read.
            assert!(futures::poll!(first.as_mut()).is_pending());

            // A distinct task polling concurrently carries a distinct waker,
            // so this trips the re-entrancy guard rather than being treated
            // as a continuation of `first`.
            let waker = futures::task::noop_waker();
            let mut cx = Context::from_waker(&waker);
            let _ = Pin::new(&mut *b.borrow_mut()).poll_read_no_copy(&mut cx, 16);
        });
    }
}
