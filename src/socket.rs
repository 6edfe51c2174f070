// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The transport-backend seam (§4.9, §6).
//!
//! Concrete socket/HTTP/TLS backends are explicitly out of scope (§1): a
//! real implementation would bind this crate's [`crate::stream::Stream`]
//! contract to libuv, `Network.framework`, LwIP, mbedTLS, or similar,
//! depending on target. This module defines only the consumption-side
//! contract the rest of the runtime relies on, plus [`crate::pipe::Pipe`]
//! as the one backend this crate ships for tests and demos.

use std::time::Duration;

use crate::error::Error;
use crate::stream::Stream;

/// Per-connection socket tuning, mirroring the original's constructor
/// parameters.
#[derive(Copy, Clone, Debug, Default)]
pub struct SocketOptions {
    /// Disables Nagle's algorithm when `true`.
    pub no_delay: bool,
    /// TCP keep-alive probe interval; `Duration::ZERO` disables keep-alive
    /// (§6: "`keepAlive: seconds (0 = disabled)`").
    pub keep_alive: Duration,
}

impl SocketOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_delay(mut self, value: bool) -> Self {
        self.no_delay = value;
        self
    }

    /// Sets the keep-alive probe interval. Pass `Duration::ZERO` to disable
    /// keep-alive.
    pub fn keep_alive(mut self, interval: Duration) -> Self {
        self.keep_alive = interval;
        self
    }

    pub fn keep_alive_enabled(&self) -> bool {
        !self.keep_alive.is_zero()
    }
}

/// A source of connected [`Stream`]s, implemented by a concrete transport
/// backend.
///
/// Not implemented in this crate beyond [`crate::pipe::Pipe`]-backed test
/// doubles: a real `StreamFactory` would resolve a hostname, open a socket,
/// and optionally negotiate TLS before the returned `Stream` is usable.
pub trait StreamFactory {
    /// Opens a new connection, optionally wrapped in TLS.
    fn new_socket(
        &self,
        host: &str,
        port: u16,
        use_tls: bool,
        options: SocketOptions,
    ) -> Result<Box<dyn Stream>, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_builder_sets_fields() {
        let opts = SocketOptions::new()
            .no_delay(true)
            .keep_alive(Duration::from_secs(30));
        assert!(opts.no_delay);
        assert_eq!(opts.keep_alive, Duration::from_secs(30));
        assert!(opts.keep_alive_enabled());
    }

    #[test]
    fn default_options_are_conservative() {
        let opts = SocketOptions::default();
        assert!(!opts.no_delay);
        assert_eq!(opts.keep_alive, Duration::ZERO);
        assert!(!opts.keep_alive_enabled());
    }
}
