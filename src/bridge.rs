//! Bridges between tokio and hyper 1.x.
//!
//! [`TokioIo`] adapts tokio's I/O traits to hyper's, and [`HandleExecutor`]
//! lets hyper spawn connection work onto an explicit
//! [`tokio::runtime::Handle`] instead of whatever runtime happens to be
//! ambient. The client threads a single handle through both, so every task
//! it creates lands on the runtime the caller supplied.

use std::io::Error;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::task::{Context, Poll};

use hyper::rt::{Executor, Read, Write};
use tokio::runtime::Handle;

/// Convert Tokio I/O traits to their Hyper-1.x counterparts.
#[derive(Debug)]
#[pin_project::pin_project]
pub struct TokioIo<T> {
    #[pin]
    inner: T,
}

impl<T> TokioIo<T> {
    /// Create a new Tokio I/O wrapper around the given I/O object.
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

impl<T> Deref for TokioIo<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<T> DerefMut for TokioIo<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl<T> Read for TokioIo<T>
where
    T: tokio::io::AsyncRead,
{
    #[allow(unsafe_code)]
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        mut buf: hyper::rt::ReadBufCursor<'_>,
    ) -> Poll<Result<(), Error>> {
        let n = unsafe {
            // Safety: the cursor's unfilled region is valid for writes; we
            // only advance by the number of bytes tokio reports as filled.
            let mut tbuf = tokio::io::ReadBuf::uninit(buf.as_mut());
            match tokio::io::AsyncRead::poll_read(self.project().inner, cx, &mut tbuf) {
                Poll::Ready(Ok(())) => tbuf.filled().len(),
                other => return other,
            }
        };

        unsafe {
            // Safety: `n` bytes were initialized by the read above.
            buf.advance(n);
        }
        Poll::Ready(Ok(()))
    }
}

impl<T> Write for TokioIo<T>
where
    T: tokio::io::AsyncWrite,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, Error>> {
        tokio::io::AsyncWrite::poll_write(self.project().inner, cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        tokio::io::AsyncWrite::poll_flush(self.project().inner, cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        tokio::io::AsyncWrite::poll_shutdown(self.project().inner, cx)
    }

    fn is_write_vectored(&self) -> bool {
        tokio::io::AsyncWrite::is_write_vectored(&self.inner)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[std::io::IoSlice<'_>],
    ) -> Poll<Result<usize, Error>> {
        tokio::io::AsyncWrite::poll_write_vectored(self.project().inner, cx, bufs)
    }
}

/// An executor that spawns futures onto an explicit runtime handle.
///
/// The handle is borrowed capacity: this type submits work to it and nothing
/// more. Shutting the runtime down remains the owner's job.
#[derive(Debug, Clone)]
pub struct HandleExecutor {
    handle: Handle,
}

impl HandleExecutor {
    /// Create a new executor around the given runtime handle.
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// The runtime handle work is submitted to.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl<F> Executor<F> for HandleExecutor
where
    F: std::future::Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, future: F) {
        self.handle.spawn(future);
    }
}
