// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! End-to-end scenarios exercising the runtime the way an embedding
//! application would: scheduler, generator, cross-thread blocker,
//! cooperative condition variable, stream re-entrancy, and half-close, all
//! running together rather than in isolated unit tests.

use std::rc::Rc;
use std::time::{Duration, Instant};

use crouton::blocker::Blocker;
use crouton::cocondition::CoCondition;
use crouton::generator::Generator;
use crouton::pipe::Pipe;
use crouton::scheduler::Scheduler;
use crouton::stream::StreamExt;
use crouton::task;

/// A Generator yields the first 11 Fibonacci numbers, sleeping 100ms
/// between each yield; the consumer collects exactly those values and the
/// whole run takes at least a second of wall clock.
#[test]
fn fibonacci_generator_interleaved_with_sleeps() {
    let sched = Scheduler::current();
    let begin = Instant::now();

    let mut gen = Generator::new(|y| async move {
        let (mut a, mut b) = (1u64, 1u64);
        loop {
            y.yield_value(a).await;
            crouton::timer::sleep(Duration::from_millis(100)).await;
            let next = a + b;
            a = b;
            b = next;
        }
    });

    let values = sched.block_on(async {
        let mut out = Vec::new();
        for _ in 0..11 {
            out.push(gen.next().await.unwrap());
        }
        out
    });

    assert_eq!(values, vec![1, 1, 2, 3, 5, 8, 13, 21, 34, 55, 89]);
    assert!(begin.elapsed() >= Duration::from_millis(1000));
}

/// A platform thread sleeps, then hands a value to a `Blocker`; the
/// awaiting task observes it with no wake-up lost.
#[test]
fn blocker_receives_value_from_another_thread() {
    let sched = Scheduler::current();
    let blocker = Blocker::<i32>::new();
    let producer = blocker.clone();

    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        producer.set_value(42);
    });

    let received = sched.block_on(blocker.wait());
    assert_eq!(received, 42);
    handle.join().unwrap();
}

/// Three tasks await one `CoCondition` in order; three `notify_one` calls
/// resume them in the same order they subscribed.
#[test]
fn cocondition_notifies_in_subscription_order() {
    let sched = Scheduler::current();
    let cond = Rc::new(CoCondition::new());
    let order = Rc::new(std::cell::RefCell::new(Vec::new()));

    for label in ["A", "B", "C"] {
        let cond = cond.clone();
        let order = order.clone();
        task::spawn(async move {
            cond.wait().await;
            order.borrow_mut().push(label);
        });
    }
    sched.run_until(|| false);
    assert_eq!(cond.waiter_count(), 3);

    for _ in 0..3 {
        cond.notify_one();
        sched.run_until(|| false);
    }

    assert_eq!(*order.borrow(), vec!["A", "B", "C"]);
}

/// Issuing a second `poll_read_no_copy` while the first is still pending is
/// a contract violation, detected rather than silently racing.
#[test]
fn second_concurrent_read_on_a_stream_is_rejected() {
    use crouton::stream::NotReentrant;

    let guard = NotReentrant::new();
    let _first = guard.enter();

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| guard.enter()));
    assert!(result.is_err(), "a second concurrent read must be rejected");
}

/// Peer A half-closes its write side; peer B reads to EOF, writes a reply,
/// A reads the reply, then both close cleanly (closing twice is a no-op).
#[test]
fn half_close_then_reply_then_clean_shutdown() {
    let sched = Scheduler::current();
    let (mut a, mut b) = Pipe::new_pair();

    sched.block_on(async {
        a.write_all(b"request").await.unwrap();
        a.close_write().await.unwrap();

        let request = b.read_all().await.unwrap();
        assert_eq!(request, "request");

        b.write_all(b"0123456789").await.unwrap();

        let reply = a.read_exactly(10).await.unwrap();
        assert_eq!(reply, b"0123456789");

        a.close().await.unwrap();
        a.close().await.unwrap(); // idempotent: closing twice is safe
        b.close().await.unwrap();
    });
}

/// A round-trip through a loopback pipe returns exactly the bytes written.
#[test]
fn loopback_round_trip_preserves_bytes_exactly() {
    let sched = Scheduler::current();
    let (mut a, mut b) = Pipe::new_pair();
    let payload: Vec<u8> = (0u8..=255).collect();

    sched.block_on(async {
        a.write_all(&payload).await.unwrap();
        a.close_write().await.unwrap();
        let got = b.read_exactly(payload.len()).await.unwrap();
        assert_eq!(got, payload);
    });
}
