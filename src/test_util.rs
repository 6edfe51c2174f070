// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Test-only helpers (ambient, test tooling). Not part of the public API.
//!
//! Crouton's [`crate::timer::Timer`] reads the real monotonic clock directly
//! rather than through an injectable trait object, so this module's
//! [`Clock`] is a standalone double for tests that only need
//! ordering/elapsed-duration semantics, not a drop-in replacement wired into
//! the scheduler.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// A manually advanceable stand-in for a monotonic clock.
pub struct Clock {
    anchor: Instant,
    offset: Cell<Duration>,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            anchor: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    /// The clock's current reading.
    pub fn now(&self) -> Instant {
        self.anchor + self.offset.get()
    }

    /// Moves the clock forward by `duration` without sleeping the thread.
    pub fn advance(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs a `tracing` subscriber for the duration of the calling test,
/// via the usual `tracing_subscriber::fmt()...set_default()` pattern.
/// Returns a guard; output is captured only while it is held.
pub fn init_test_logging() -> tracing::subscriber::DefaultGuard {
    tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .set_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_now_forward() {
        let clock = Clock::new();
        let before = clock.now();
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now(), before + Duration::from_secs(5));
    }
}
