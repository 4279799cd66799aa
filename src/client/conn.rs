//! HTTP connection handling.
//!
//! The protocol half of the connection path: [`HttpConnector`] takes the
//! byte stream a [`Transport`] produced, performs the HTTP/1.1 handshake
//! (delegated to hyper - this crate carries no wire parser), and hands back
//! an [`HttpConnection`] that can carry a request exchange. The connection
//! driver future is spawned onto the injected runtime handle, so I/O
//! progress never depends on what the dispatch task does next.

use std::fmt;

use futures_core::future::BoxFuture;
use http::Uri;
use hyper::body::Incoming;
use hyper::rt::Executor as _;
use tokio::runtime::Handle;
use tracing::trace;

use super::transport::{Transport, TransportError};
use crate::body::Body;
use crate::bridge::{HandleExecutor, TokioIo};

/// An established connection carrying exactly one request exchange.
///
/// Sending consumes the connection: without pooling there is nothing further
/// a connection could be used for, and the response body stream stays valid
/// because its driver task outlives this handle.
pub trait Connection: Send + Sized {
    /// Send a request, resolving to the raw response with a streaming body.
    fn send_request(
        self,
        request: http::Request<Body>,
    ) -> BoxFuture<'static, Result<http::Response<Incoming>, TransportError>>;
}

/// Opens transport streams and completes the HTTP/1.1 handshake over them.
#[derive(Clone)]
pub struct HttpConnector<T> {
    transport: T,
    builder: hyper::client::conn::http1::Builder,
    executor: HandleExecutor,
}

impl<T> fmt::Debug for HttpConnector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnector").finish()
    }
}

impl<T> HttpConnector<T>
where
    T: Transport,
{
    /// Create a connector over the given transport. Connection drivers are
    /// spawned on `handle`.
    pub fn new(transport: T, handle: Handle) -> Self {
        Self {
            transport,
            builder: hyper::client::conn::http1::Builder::new(),
            executor: HandleExecutor::new(handle),
        }
    }

    /// Connect to the target of `uri` and complete the protocol handshake.
    pub async fn connect(&self, uri: Uri) -> Result<HttpConnection, TransportError> {
        let stream = self.transport.connect(uri).await?;

        trace!("handshake h1");
        let (sender, conn) = self
            .builder
            .handshake::<_, Body>(TokioIo::new(stream))
            .await
            .map_err(TransportError::msg("handshake error"))?;

        self.executor.execute(async move {
            if let Err(err) = conn.await {
                if err.is_user() {
                    tracing::error!(%err, "connection driver error");
                } else {
                    tracing::debug!(%err, "connection driver error");
                }
            }
        });
        trace!("handshake complete");

        Ok(HttpConnection { sender })
    }
}

/// An established HTTP/1.1 connection.
pub struct HttpConnection {
    sender: hyper::client::conn::http1::SendRequest<Body>,
}

impl fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConnection").finish()
    }
}

impl Connection for HttpConnection {
    fn send_request(
        mut self,
        request: http::Request<Body>,
    ) -> BoxFuture<'static, Result<http::Response<Incoming>, TransportError>> {
        Box::pin(async move {
            // The sender buffers the first request, so this is safe to call
            // straight after the handshake, before the driver's first poll.
            // The sender itself stays alive until the response head arrives;
            // the body stream is driven by the connection task after that.
            self.sender
                .send_request(request)
                .await
                .map_err(TransportError::msg("send request error"))
        })
    }
}
