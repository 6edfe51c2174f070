// Copyright 2025. Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The byte-stream contract and its derived, ergonomic operations (§4.8,
//! §4.10, §6).
//!
//! [`Stream`] is the poll-based core every transport backend implements --
//! plain `Read`/`Write`-shaped poll traits rather than `async-trait`, which
//! buys nothing here that `poll_fn` doesn't already give for free.
//! [`StreamExt`] layers the ergonomic `async fn`s application code actually
//! calls (`read`, `read_string`, `read_exactly`, `read_until`, `read_all`,
//! `generate`) on top, built with [`std::future::poll_fn`].
//!
//! `readAll()` delegates to `readString(SIZE_MAX)`; [`StreamExt::read_all`]
//! mirrors that by delegating to [`StreamExt::read_string`] with
//! `usize::MAX`. The `write(string)` overload is [`StreamExt::write_str`].

use std::cell::Cell;
use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use crate::error::Error;
use crate::generator::Generator;

/// An immutable, reference-counted chunk of bytes returned by the
/// no-copy read/peek operations.
///
/// Cloning is O(1): backed by an `Rc<Vec<u8>>`, favoring cheap-to-share
/// buffers over deep copies on the hot path.
#[derive(Clone)]
pub struct Buffer {
    data: Rc<Vec<u8>>,
}

impl Buffer {
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data: Rc::new(data) }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A fixed-capacity pool of reusable byte buffers (§4.10).
///
/// Stream backends that read in fixed-size chunks (a socket's receive
/// buffer) acquire a slab from the pool instead of allocating fresh memory
/// on every read, and return it with [`PooledBuffer`]'s `Drop`.
pub struct BufferPool {
    slab_size: usize,
    capacity: usize,
    allocated: Cell<usize>,
    free: std::cell::RefCell<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new(slab_size: usize, capacity: usize) -> Self {
        Self {
            slab_size,
            capacity,
            allocated: Cell::new(0),
            free: std::cell::RefCell::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn slab_size(&self) -> usize {
        self.slab_size
    }

    /// The number of slabs currently checked out (not sitting free).
    pub fn in_use(&self) -> usize {
        self.allocated.get() - self.free.borrow().len()
    }

    /// Checks out a slab, allocating a new one if the pool is not yet at
    /// capacity and none are free. Returns `None` if the pool is exhausted.
    pub fn acquire(self: &Rc<Self>) -> Option<PooledBuffer> {
        let mut free = self.free.borrow_mut();
        let buf = if let Some(buf) = free.pop() {
            buf
        } else if self.allocated.get() < self.capacity {
            self.allocated.set(self.allocated.get() + 1);
            vec![0u8; self.slab_size]
        } else {
            return None;
        };
        drop(free);
        Some(PooledBuffer {
            pool: self.clone(),
            data: Some(buf),
        })
    }
}

/// A slab checked out from a [`BufferPool`]; returned to the pool on drop.
pub struct PooledBuffer {
    pool: Rc<BufferPool>,
    data: Option<Vec<u8>>,
}

impl std::ops::Deref for PooledBuffer {
    type Target = Vec<u8>;
    fn deref(&self) -> &Vec<u8> {
        self.data.as_ref().unwrap()
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        self.data.as_mut().unwrap()
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        if let Some(mut buf) = self.data.take() {
            buf.clear();
            buf.resize(self.pool.slab_size, 0);
            self.pool.free.borrow_mut().push(buf);
        }
    }
}

/// A scoped guard detecting overlapping calls into the same logical stream
/// operation (§4.8, §5, §8.5's re-entrancy scenario).
///
/// A stream has exactly one outstanding read and one outstanding write at a
/// time; calling `read` again before the first resolves is a programming
/// error in the caller, not a recoverable I/O condition, so this panics
/// rather than returning an `Error`. The held flag lives behind an `Rc` so
/// the returned guard is `'static` and can be stashed across a `Poll::Pending`
/// boundary (see `pipe.rs`), not just held within a single function scope.
#[derive(Clone, Default)]
pub struct NotReentrant {
    busy: Rc<Cell<bool>>,
}

impl NotReentrant {
    pub fn new() -> Self {
        Self { busy: Rc::new(Cell::new(false)) }
    }

    /// # Panics
    ///
    /// Panics if another guard for this instance is already held.
    pub fn enter(&self) -> ReentrancyGuard {
        assert!(
            !self.busy.replace(true),
            "re-entrant call into an in-flight stream operation"
        );
        ReentrancyGuard { flag: self.busy.clone() }
    }
}

/// RAII guard returned by [`NotReentrant::enter`].
pub struct ReentrancyGuard {
    flag: Rc<Cell<bool>>,
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

/// The poll-based contract every stream backend (a socket, a pipe, a TLS
/// wrapper) implements (§4.8).
///
/// Backends that have nothing to do for a given step (e.g. an in-memory
/// pipe's `poll_open`) simply return `Poll::Ready(Ok(()))` immediately.
pub trait Stream {
    /// Whether the stream is currently open (§4.8's core observer set).
    ///
    /// A plain synchronous query, not a poll-based operation: "is this open
    /// right now" never has a pending state to suspend on.
    fn is_open(&self) -> bool;

    /// Establishes the underlying connection/handle.
    fn poll_open(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Error>>;

    /// Closes both directions and releases any underlying resource.
    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Error>>;

    /// Half-closes the write direction, leaving reads possible (§4.8, §9
    /// Open Questions: not every backend can implement this -- see
    /// `Error::unimplemented`).
    fn poll_close_write(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Error>>;

    /// Reads up to `max_len` bytes without copying, consuming them from the
    /// stream. An empty [`Buffer`] means end-of-data.
    fn poll_read_no_copy(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        max_len: usize,
    ) -> Poll<Result<Buffer, Error>>;

    /// Like [`Self::poll_read_no_copy`], but does not consume the bytes: a
    /// subsequent read observes the same data again.
    fn poll_peek_no_copy(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<Buffer, Error>>;

    /// Writes as much of `data` as can be accepted without blocking,
    /// returning the number of bytes consumed.
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, data: &[u8]) -> Poll<Result<usize, Error>>;
}

/// Ergonomic `async fn` operations derived from [`Stream`]'s poll-based
/// core, available on every `Stream` implementor via blanket impl.
pub trait StreamExt: Stream {
    fn open(&mut self) -> impl Future<Output = Result<(), Error>> + '_
    where
        Self: Unpin,
    {
        poll_fn(move |cx| Pin::new(&mut *self).poll_open(cx))
    }

    fn close(&mut self) -> impl Future<Output = Result<(), Error>> + '_
    where
        Self: Unpin,
    {
        poll_fn(move |cx| Pin::new(&mut *self).poll_close(cx))
    }

    fn close_write(&mut self) -> impl Future<Output = Result<(), Error>> + '_
    where
        Self: Unpin,
    {
        poll_fn(move |cx| Pin::new(&mut *self).poll_close_write(cx))
    }

    /// Reads up to `max_len` bytes, copying them into an owned `Vec<u8>`. An
    /// empty result means end-of-data.
    fn read(&mut self, max_len: usize) -> impl Future<Output = Result<Vec<u8>, Error>> + '_
    where
        Self: Unpin,
    {
        async move {
            let buf = poll_fn(move |cx| Pin::new(&mut *self).poll_read_no_copy(cx, max_len)).await?;
            Ok(buf.as_slice().to_vec())
        }
    }

    /// Reads `max_len` bytes, decoded as UTF-8 (replacing invalid
    /// sequences), looping over short reads like [`Self::read_exactly`] --
    /// except that hitting end-of-data early is not an error: the original
    /// `readString` "always reads the full number of bytes unless it hits
    /// EOF", and `readAll` relies on that to mean "read until EOF".
    fn read_string(&mut self, max_len: usize) -> impl Future<Output = Result<String, Error>> + '_
    where
        Self: Unpin,
    {
        async move {
            let mut out = Vec::new();
            while out.len() < max_len {
                let chunk = self.read(max_len - out.len()).await?;
                if chunk.is_empty() {
                    break;
                }
                out.extend_from_slice(&chunk);
            }
            Ok(String::from_utf8_lossy(&out).into_owned())
        }
    }

    /// Reads exactly `len` bytes, looping over short reads. Resolves to
    /// `Error::end_of_data` if the stream closes before `len` bytes arrive.
    fn read_exactly(&mut self, len: usize) -> impl Future<Output = Result<Vec<u8>, Error>> + '_
    where
        Self: Unpin,
    {
        async move {
            let mut out = Vec::with_capacity(len);
            while out.len() < len {
                let chunk = self.read(len - out.len()).await?;
                if chunk.is_empty() {
                    return Err(Error::end_of_data());
                }
                out.extend_from_slice(&chunk);
            }
            Ok(out)
        }
    }

    /// Reads until `delimiter` is found (inclusive) or the stream ends,
    /// scanning at most `max_len` bytes. Resolves to `Error::end_of_data` if
    /// the stream closes or `max_len` is reached before the delimiter is
    /// found.
    fn read_until(
        &mut self,
        delimiter: u8,
        max_len: usize,
    ) -> impl Future<Output = Result<Vec<u8>, Error>> + '_
    where
        Self: Unpin,
    {
        async move {
            let mut out = Vec::new();
            while out.len() < max_len {
                let chunk = self.read(1).await?;
                if chunk.is_empty() {
                    return Err(Error::end_of_data());
                }
                let byte = chunk[0];
                out.push(byte);
                if byte == delimiter {
                    return Ok(out);
                }
            }
            Err(Error::end_of_data())
        }
    }

    /// Reads until end-of-data, decoded as UTF-8. Delegates to
    /// [`Self::read_string`] with `usize::MAX`, matching the original's
    /// `readAll() -> readString(SIZE_MAX)`.
    fn read_all(&mut self) -> impl Future<Output = Result<String, Error>> + '_
    where
        Self: Unpin,
    {
        self.read_string(usize::MAX)
    }

    fn write<'a>(&'a mut self, data: &'a [u8]) -> impl Future<Output = Result<usize, Error>> + 'a
    where
        Self: Unpin,
    {
        poll_fn(move |cx| Pin::new(&mut *self).poll_write(cx, data))
    }

    /// Writes the full contents of `data`, looping over partial writes.
    fn write_all<'a>(&'a mut self, data: &'a [u8]) -> impl Future<Output = Result<(), Error>> + 'a
    where
        Self: Unpin,
    {
        async move {
            let mut written = 0;
            while written < data.len() {
                written += self.write(&data[written..]).await?;
            }
            Ok(())
        }
    }

    /// Writes a UTF-8 string in full -- a convenience overload of
    /// [`Self::write_all`].
    fn write_str<'a>(&'a mut self, data: &'a str) -> impl Future<Output = Result<(), Error>> + 'a
    where
        Self: Unpin,
    {
        self.write_all(data.as_bytes())
    }
}

impl<S: Stream + ?Sized> StreamExt for S {}

/// Turns a stream into a [`Generator`] of fixed-size chunks, stopping at
/// end-of-data. Supplements the core contract with the "async sequence of
/// chunks" consumption style named alongside `Generator` in §4.5/§4.8.
pub fn generate<S>(mut stream: S, chunk_len: usize) -> Generator<Vec<u8>>
where
    S: Stream + Unpin + 'static,
{
    Generator::new(move |y| async move {
        loop {
            let chunk = match stream.read(chunk_len).await {
                Ok(chunk) => chunk,
                Err(_) => return,
            };
            if chunk.is_empty() {
                return;
            }
            y.yield_value(chunk).await;
        }
    })
}
