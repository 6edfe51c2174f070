// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The top-level process entry point (§6).
//!
//! A process entry point and command-line arguments are part of the
//! runtime's outer surface; this module supplies the minimal, idiomatic
//! version: a trivial argument sequence and a `run_main` that owns the
//! top-level [`crate::Scheduler`] the way a long-running executor's
//! embedding binary owns its top-level executor in `main`.

use std::collections::VecDeque;
use std::future::Future;

use crate::error::Error;
use crate::scheduler::Scheduler;

/// A trivial, consumable view over `argv`.
pub struct Args {
    items: VecDeque<String>,
}

impl Args {
    /// Collects the process's real command-line arguments (argv\[0\]
    /// included).
    pub fn from_env() -> Self {
        Self {
            items: std::env::args().collect(),
        }
    }

    pub fn from_vec(items: Vec<String>) -> Self {
        Self {
            items: items.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// The next argument, without consuming it.
    pub fn first(&self) -> Option<&str> {
        self.items.front().map(String::as_str)
    }

    /// Removes and returns the next argument.
    pub fn pop_first(&mut self) -> Option<String> {
        self.items.pop_front()
    }

    /// Removes the first occurrence of `flag` anywhere in the remaining
    /// arguments, returning whether it was present.
    pub fn pop_flag(&mut self, flag: &str) -> bool {
        if let Some(pos) = self.items.iter().position(|a| a == flag) {
            self.items.remove(pos);
            true
        } else {
            false
        }
    }
}

/// Runs `main` to completion on a fresh top-level [`Scheduler`], the way a
/// Crouton-based process's `main` function is expected to (§6, §7).
///
/// `main` receives the real process [`Args`] and resolves to the process
/// exit code (§6: "`fn` returns a `Future<int>`, the resolved value is the
/// process exit code"). An unhandled top-level error is logged at `error`
/// level and mapped to exit code `1` (§7 "User-visible behavior") rather than
/// propagated. In debug builds, asserts no tasks leaked past the end of
/// `main` (the Design Notes' "diagnostic, not silently leak tasks").
pub fn run_main<F, Fut>(main: F) -> i32
where
    F: FnOnce(Args) -> Fut,
    Fut: Future<Output = Result<i32, Error>>,
{
    let scheduler = Scheduler::current();
    let result = scheduler.block_on(main(Args::from_env()));

    let code = match result {
        Ok(code) => code,
        Err(err) => {
            tracing::error!(error = %err, "unhandled error at top level");
            1
        }
    };

    #[cfg(debug_assertions)]
    scheduler.assert_empty();

    code
}
