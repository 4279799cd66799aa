//! The request dispatcher.
//!
//! [`Client`] runs requests against a [`Transport`] and decodes the results.
//! Three dispatch shapes are offered:
//!
//! - [`send`][Client::send] blocks the calling thread until the response is
//!   decoded or a timeout fires;
//! - [`send_async`][Client::send_async] returns a [`PendingResponse`]
//!   immediately, resolved on the injected runtime handle;
//! - [`send_many`][Client::send_many] fans a batch out concurrently and
//!   returns one pending response per request, in input order.
//!
//! Each dispatched request is an independent task: a timeout or failure in
//! one never cancels or delays its siblings. The client submits work to the
//! configured runtime handle but does not own it - shutting the runtime
//! down, with a bounded drain of outstanding work, is the caller's
//! responsibility.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::FutureExt as _;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, debug_span, trace, Instrument};

pub mod conn;
pub mod transport;

use self::conn::{Connection as _, HttpConnector};
use self::transport::{TcpTransport, TlsTransport, Transport};
use crate::body::Body;
use crate::decode::{Decoder, RawBody};
use crate::error::Error;
use crate::request::Request;
use crate::response::Response;
use crate::tls::TrustPolicy;

/// Dispatch configuration: the injected execution resource plus the two
/// timeout knobs.
///
/// The handle is borrowed capacity. The client submits dispatch and
/// connection-driver tasks to it and nothing else; it never resizes the
/// runtime or shuts it down.
#[derive(Debug, Clone)]
pub struct Config {
    handle: Handle,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl Config {
    /// Configuration with default timeouts: 10 seconds to connect, 30
    /// seconds per request.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Set the connection establishment timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the default per-request timeout. A timeout set on an individual
    /// request takes precedence.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// The runtime handle dispatch work is submitted to.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// The connection establishment timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// The default per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

/// An HTTP client dispatching requests over a pluggable transport.
pub struct Client<T = TlsTransport<TcpTransport>> {
    connector: HttpConnector<T>,
    config: Config,
}

impl<T> fmt::Debug for Client<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client").finish()
    }
}

impl<T> Clone for Client<T>
where
    T: Clone,
{
    fn clone(&self) -> Self {
        Self {
            connector: self.connector.clone(),
            config: self.config.clone(),
        }
    }
}

impl Client<TlsTransport<TcpTransport>> {
    /// A client over TCP with TLS upgrading for `https` targets, validating
    /// peers according to `trust`.
    pub fn new(trust: &TrustPolicy, config: Config) -> Self {
        Self::with_transport(TlsTransport::new(trust), config)
    }
}

impl<T> Client<T>
where
    T: Transport,
{
    /// A client over a custom transport.
    pub fn with_transport(transport: T, config: Config) -> Self {
        let connector = HttpConnector::new(transport, config.handle().clone());
        Self { connector, config }
    }

    /// Dispatch a request and block until the decoded response (or failure)
    /// is available.
    ///
    /// # Panics
    ///
    /// Panics if called from within an async context; use
    /// [`send_async`][Client::send_async] there.
    pub fn send<D>(&self, request: Request, decoder: D) -> Result<Response<D::Item>, Error>
    where
        D: Decoder + Send + 'static,
        D::Item: Send + 'static,
    {
        self.config.handle.block_on(dispatch(
            self.connector.clone(),
            self.config.clone(),
            request,
            decoder,
        ))
    }

    /// Dispatch a request without blocking.
    ///
    /// The returned [`PendingResponse`] resolves on the configured runtime
    /// handle. Dropping it detaches the in-flight request rather than
    /// cancelling it.
    pub fn send_async<D>(&self, request: Request, decoder: D) -> PendingResponse<D::Item>
    where
        T: Sync,
        D: Decoder + Send + Sync + 'static,
        D::Item: Send + 'static,
    {
        let handle = self.config.handle.spawn(dispatch(
            self.connector.clone(),
            self.config.clone(),
            request,
            decoder,
        ));
        PendingResponse { handle }
    }

    /// Dispatch a batch of requests concurrently.
    ///
    /// Returns one pending response per request, positionally matched to the
    /// input. Completion order is unordered - requests race - and a failure
    /// or timeout in one request never cancels the others. The caller is
    /// expected to await all returned handles (for example with a join-all).
    pub fn send_many<I, D>(&self, requests: I, decoder: D) -> Vec<PendingResponse<D::Item>>
    where
        T: Sync,
        I: IntoIterator<Item = Request>,
        D: Decoder + Clone + Send + Sync + 'static,
        D::Item: Send + 'static,
    {
        requests
            .into_iter()
            .map(|request| self.send_async(request, decoder.clone()))
            .collect()
    }
}

/// A response that has been dispatched but not yet resolved.
///
/// Awaiting it observes completion; the request itself is driven by the
/// runtime the client was configured with.
pub struct PendingResponse<T> {
    handle: JoinHandle<Result<Response<T>, Error>>,
}

impl<T> fmt::Debug for PendingResponse<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingResponse").finish()
    }
}

impl<T> Future for PendingResponse<T> {
    type Output = Result<Response<T>, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.handle.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(err)) => Poll::Ready(Err(Error::Join(err))),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Run one request to completion: connect, exchange, decode.
async fn dispatch<T, D>(
    connector: HttpConnector<T>,
    config: Config,
    request: Request,
    decoder: D,
) -> Result<Response<D::Item>, Error>
where
    T: Transport,
    D: Decoder,
{
    let span = debug_span!("dispatch", method = %request.method(), uri = %request.uri());
    async move {
        let timeout = request.timeout().unwrap_or(config.request_timeout);
        let target = request.uri().clone();
        let wire = request.into_wire()?;

        trace!("connecting");
        let connection =
            tokio::time::timeout(config.connect_timeout, connector.connect(target))
                .await
                .map_err(|_| Error::ConnectTimeout {
                    timeout: config.connect_timeout,
                })??;

        let exchange = async {
            trace!("awaiting headers");
            let response = connection.send_request(wire).await?;
            let (parts, incoming) = response.into_parts();

            trace!(status = %parts.status, "decoding");
            let body = RawBody::new(Body::from(incoming)).decode(&decoder).await?;
            Ok::<_, Error>(Response::new(parts.status, parts.headers, body))
        };

        let response = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::RequestTimeout { timeout })??;

        debug!(status = %response.status(), "complete");
        Ok(response)
    }
    .instrument(span)
    .await
}
