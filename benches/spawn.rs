// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use criterion::{criterion_group, criterion_main, Criterion};
use crouton::Scheduler;

fn spawn_10k(c: &mut Criterion) {
    const TASKS: usize = 10_000;

    c.bench_function("spawn_10k_single_threaded", |b| {
        b.iter(|| {
            let sched = Scheduler::current();
            for _ in 0..TASKS {
                crouton::task::spawn(async {});
            }
            sched.run_until(|| false);
        });
    });
}

fn yield_10k(c: &mut Criterion) {
    const PINGS: usize = 10_000;

    c.bench_function("yield_10k_single_threaded", |b| {
        b.iter(|| {
            let sched = Scheduler::current();
            sched.block_on(async {
                for _ in 0..PINGS {
                    crouton::task::yield_now().await;
                }
            });
        });
    });
}

criterion_group!(spawn, spawn_10k, yield_10k);
criterion_main!(spawn);
