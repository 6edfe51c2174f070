// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::fmt;

/// The domain an [`Error`] originated from.
///
/// `noerror` from the original design is represented by the absence of an
/// `Error` (i.e. `Result::Ok`), not by a distinguished variant here.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Domain {
    /// Errors raised by the runtime itself (scheduler, task, sync primitives).
    Runtime,
    /// Errors from the underlying platform I/O backend (sockets, files).
    PlatformIo,
    /// DNS resolution failures.
    Dns,
    /// TLS handshake / record-layer failures.
    Tls,
    /// HTTP protocol errors.
    Http,
    /// Errors raised by application code, not the runtime.
    Application,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Domain::Runtime => "runtime",
            Domain::PlatformIo => "platform-io",
            Domain::Dns => "dns",
            Domain::Tls => "tls",
            Domain::Http => "http",
            Domain::Application => "application",
        })
    }
}

/// A tagged error: a domain, an integer code, and an optional human-readable
/// message.
///
/// Errors are values: they travel through [`crate::Future`]s as the `Err`
/// variant of their result and never unwind across the event loop boundary
/// uncaught (§7).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Error {
    domain: Domain,
    code: i32,
    message: Option<String>,
}

// Well-known runtime-domain codes (§7 "Cancellation").
const CODE_DISCONNECTED: i32 = 1;
const CODE_CANCELLED: i32 = 2;
const CODE_UNIMPLEMENTED: i32 = 3;
const CODE_END_OF_DATA: i32 = 4;
const CODE_TIMEOUT: i32 = 5;

impl Error {
    /// Constructs a new error in `domain` with `code` and no message.
    pub fn new(domain: Domain, code: i32) -> Self {
        Self {
            domain,
            code,
            message: None,
        }
    }

    /// Constructs a new error with an explanatory message.
    pub fn with_message(domain: Domain, code: i32, message: impl Into<String>) -> Self {
        Self {
            domain,
            code,
            message: Some(message.into()),
        }
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn code(&self) -> i32 {
        self.code
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// The peer closed the connection, or the stream was closed locally
    /// while an operation was in flight.
    pub fn disconnected() -> Self {
        Self::new(Domain::Runtime, CODE_DISCONNECTED)
    }

    /// A task or in-flight operation was cancelled.
    pub fn cancelled() -> Self {
        Self::new(Domain::Runtime, CODE_CANCELLED)
    }

    /// The operation is not implemented on this platform (e.g. half-close
    /// on ESP32, per §9's Open Questions).
    pub fn unimplemented() -> Self {
        Self::new(Domain::Runtime, CODE_UNIMPLEMENTED)
    }

    /// The stream hit end-of-data where more was expected (`readExactly`,
    /// `readUntil`).
    pub fn end_of_data() -> Self {
        Self::new(Domain::Runtime, CODE_END_OF_DATA)
    }

    /// A composed timeout (racing a [`crate::timer::Timer`] against an
    /// operation) elapsed first.
    pub fn timeout() -> Self {
        Self::new(Domain::Runtime, CODE_TIMEOUT)
    }

    pub fn is_disconnected(&self) -> bool {
        self.domain == Domain::Runtime && self.code == CODE_DISCONNECTED
    }

    pub fn is_cancelled(&self) -> bool {
        self.domain == Domain::Runtime && self.code == CODE_CANCELLED
    }

    pub fn is_end_of_data(&self) -> bool {
        self.domain == Domain::Runtime && self.code == CODE_END_OF_DATA
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(msg) => write!(f, "{} error {}: {msg}", self.domain, self.code),
            None => write!(f, "{} error {}", self.domain, self.code),
        }
    }
}

impl std::error::Error for Error {}
