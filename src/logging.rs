// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Process-wide `tracing` setup.
//!
//! Mirrors the usual
//! `tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env())`
//! harness-initialization pattern, additionally honoring `CROUTON_LOG`
//! (falling back to `RUST_LOG`), `CLICOLOR_FORCE`, and `TERM=dumb` per §6.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber for a Crouton-based process.
///
/// Reads the filter directives from `CROUTON_LOG`, falling back to
/// `RUST_LOG`, defaulting to `info` if neither is set. Call once, near the
/// start of `main`.
pub fn init() {
    let filter = std::env::var("CROUTON_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    let ansi = should_use_color();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_ansi(ansi)
        .try_init();
}

/// `CLICOLOR_FORCE` (any non-empty value) forces color on; otherwise
/// `TERM=dumb` forces it off. Absent either, defer to the terminal.
fn should_use_color() -> bool {
    if std::env::var("CLICOLOR_FORCE").is_ok_and(|v| !v.is_empty()) {
        return true;
    }
    if std::env::var("TERM").as_deref() == Ok("dumb") {
        return false;
    }
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}
