//! Byte bodies for outbound requests and inbound responses.
//!
//! [`Body`] braids the payload shapes this client deals with behind a single
//! [`http_body::Body`] implementation: nothing, a fully buffered payload, or
//! a streaming [`hyper::body::Incoming`] read off a live connection.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use http_body::Body as _;
use http_body::{Frame, SizeHint};
use http_body_util::Full;

use crate::BoxError;

/// A request or response payload.
///
/// Outbound bodies are created from [`Bytes`], [`String`], [`&'static str`](str)
/// or [`Vec<u8>`] via [`From`], or with [`Body::empty`]. Inbound bodies wrap
/// the streaming half of a hyper connection and are consumed exactly once by
/// the decoding machinery.
#[derive(Debug)]
#[pin_project::pin_project]
pub struct Body {
    #[pin]
    inner: InnerBody,
}

#[pin_project::pin_project(project = InnerBodyProj)]
enum InnerBody {
    Empty,
    Full(#[pin] Full<Bytes>),
    Incoming(#[pin] hyper::body::Incoming),
}

impl fmt::Debug for InnerBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InnerBody::Empty => f.write_str("Empty"),
            InnerBody::Full(_) => f.write_str("Full"),
            InnerBody::Incoming(_) => f.write_str("Incoming"),
        }
    }
}

impl Body {
    /// Create a new empty body.
    pub fn empty() -> Self {
        Self {
            inner: InnerBody::Empty,
        }
    }

    /// Create a new body from something which can be converted into [`Bytes`].
    pub fn full<D>(data: D) -> Self
    where
        D: Into<Bytes>,
    {
        Self {
            inner: InnerBody::Full(Full::new(data.into())),
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<hyper::body::Incoming> for Body {
    fn from(body: hyper::body::Incoming) -> Self {
        Self {
            inner: InnerBody::Incoming(body),
        }
    }
}

impl From<Bytes> for Body {
    fn from(body: Bytes) -> Self {
        Self::full(body)
    }
}

impl From<String> for Body {
    fn from(body: String) -> Self {
        Self::full(body)
    }
}

impl From<&'static str> for Body {
    fn from(body: &'static str) -> Self {
        Self::full(body)
    }
}

impl From<Vec<u8>> for Body {
    fn from(body: Vec<u8>) -> Self {
        Self::full(body)
    }
}

impl http_body::Body for Body {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        match self.project().inner.project() {
            InnerBodyProj::Empty => Poll::Ready(None),
            InnerBodyProj::Full(body) => body
                .poll_frame(cx)
                .map(|frame| frame.map(|result| result.map_err(Into::into))),
            InnerBodyProj::Incoming(body) => body
                .poll_frame(cx)
                .map(|frame| frame.map(|result| result.map_err(Into::into))),
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.inner {
            InnerBody::Empty => true,
            InnerBody::Full(body) => http_body::Body::is_end_stream(body),
            InnerBody::Incoming(body) => http_body::Body::is_end_stream(body),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match &self.inner {
            InnerBody::Empty => SizeHint::with_exact(0),
            InnerBody::Full(body) => http_body::Body::size_hint(body),
            InnerBody::Incoming(body) => http_body::Body::size_hint(body),
        }
    }
}
