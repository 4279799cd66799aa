//! Transports for establishing client connections.
//!
//! A transport is responsible for producing a byte stream to the target of a
//! URI; everything above it (handshake, request exchange, decoding) is
//! transport-agnostic. Transports are [`tower::Service`]s over [`Uri`], and
//! anything satisfying that shape plugs in via the [`Transport`] trait -
//! tests exercise timeout behavior with a transport that simply never
//! resolves.
//!
//! [`TcpTransport`] dials plain TCP. [`TlsTransport`] wraps another
//! transport and upgrades `https` connections according to a
//! [`TrustPolicy`], passing `http` connections through untouched.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use http::Uri;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tower::util::Oneshot;
use tower::ServiceExt as _;
use tracing::{trace, warn};

use crate::tls::TrustPolicy;
use crate::BoxError;

type BoxFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Error type for transport failures.
#[derive(Debug, Error)]
pub struct TransportError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub(crate) fn new<S>(message: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn msg<S, E>(message: S) -> impl FnOnce(E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        move |error| Self {
            message: message.into(),
            source: Some(error.into()),
        }
    }

    pub(crate) fn build<S, E>(message: S, error: E) -> Self
    where
        S: Into<String>,
        E: Into<BoxError>,
    {
        Self {
            message: message.into(),
            source: Some(error.into()),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref source) = self.source {
            write!(f, "{}: {}", self.message, source)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

/// A capability to establish a byte stream to the target of a URI.
///
/// Blanket-implemented for every cloneable [`tower::Service`] over [`Uri`]
/// whose response is an async byte stream and whose error is
/// [`TransportError`]; custom transports only need the `Service` impl.
pub trait Transport: Clone + Send + Sized + 'static {
    /// The byte stream this transport produces.
    type IO: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// The future returned by [`connect`][Transport::connect].
    type Future: Future<Output = Result<Self::IO, TransportError>> + Send + 'static;

    /// Open a connection to the target of `uri`.
    fn connect(&self, uri: Uri) -> Self::Future;
}

impl<S, IO> Transport for S
where
    S: tower::Service<Uri, Response = IO, Error = TransportError> + Clone + Send + Sized + 'static,
    S::Future: Send + 'static,
    IO: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type IO = IO;
    type Future = Oneshot<S, Uri>;

    fn connect(&self, uri: Uri) -> Self::Future {
        self.clone().oneshot(uri)
    }
}

/// Configuration for TCP connections.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// Whether to disable Nagle's algorithm.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self { nodelay: true }
    }
}

/// A transport that dials plain TCP, resolving the URI's host through the
/// system resolver and deriving default ports from the scheme.
#[derive(Debug, Clone, Default)]
pub struct TcpTransport {
    config: Arc<TcpConfig>,
}

impl TcpTransport {
    /// Create a TCP transport with the given configuration.
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl tower::Service<Uri> for TcpTransport {
    type Response = TcpStream;
    type Error = TransportError;
    type Future = BoxFuture<'static, TcpStream, TransportError>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let config = self.config.clone();

        Box::pin(async move {
            let (host, port) = get_host_and_port(&uri)?;

            let stream = TcpStream::connect((&*host, port))
                .await
                .map_err(TransportError::msg("tcp connect error"))?;

            if config.nodelay {
                if let Err(err) = stream.set_nodelay(true) {
                    warn!("tcp set_nodelay error: {}", err);
                }
            }

            if let Ok(peer_addr) = stream.peer_addr() {
                trace!(peer.addr = %peer_addr, "tcp connected");
            } else {
                trace!("tcp connected");
            }

            Ok(stream)
        })
    }
}

/// A transport that upgrades `https` connections to TLS.
///
/// Wraps an inner transport; `http` URIs pass through as plain streams. The
/// TLS configuration is lowered once from the [`TrustPolicy`] at
/// construction and shared across connections.
#[derive(Debug, Clone)]
pub struct TlsTransport<T = TcpTransport> {
    inner: T,
    tls: Arc<ClientConfig>,
}

impl TlsTransport<TcpTransport> {
    /// A TLS transport over plain TCP with the given trust policy.
    pub fn new(trust: &TrustPolicy) -> Self {
        Self::layer(TcpTransport::default(), trust)
    }
}

impl<T> TlsTransport<T> {
    /// Wrap an arbitrary inner transport with TLS upgrading.
    pub fn layer(inner: T, trust: &TrustPolicy) -> Self {
        Self {
            inner,
            tls: Arc::new(trust.client_config()),
        }
    }
}

impl<T, IO> tower::Service<Uri> for TlsTransport<T>
where
    T: tower::Service<Uri, Response = IO, Error = TransportError> + Clone + Send + 'static,
    T::Future: Send + 'static,
    IO: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    type Response = MaybeTls<IO>;
    type Error = TransportError;
    type Future = BoxFuture<'static, MaybeTls<IO>, TransportError>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let use_tls = uri.scheme_str() == Some("https");
        let domain = uri
            .host()
            .map(|host| host.trim_start_matches('[').trim_end_matches(']').to_owned());
        let tls = self.tls.clone();
        let conn = self.inner.call(uri);

        Box::pin(async move {
            let stream = conn.await?;

            if !use_tls {
                return Ok(MaybeTls::from(stream));
            }

            let host = domain.ok_or_else(|| TransportError::new("missing host in uri"))?;
            let domain =
                ServerName::try_from(host).map_err(TransportError::msg("invalid server name"))?;

            trace!(server = ?domain, "tls handshake");
            let stream = tokio_rustls::TlsConnector::from(tls)
                .connect(domain, stream)
                .await
                .map_err(TransportError::msg("tls handshake error"))?;

            Ok(MaybeTls::from(stream))
        })
    }
}

/// Dispatching wrapper for plain and TLS-upgraded streams.
///
/// Effectively implements enum-dispatch for [`AsyncRead`] and [`AsyncWrite`]
/// so one transport type can serve both `http` and `https` targets.
#[derive(Debug)]
#[pin_project::pin_project]
pub struct MaybeTls<IO> {
    #[pin]
    inner: MaybeTlsInner<IO>,
}

#[derive(Debug)]
#[pin_project::pin_project(project = MaybeTlsProj)]
enum MaybeTlsInner<IO> {
    Plain(#[pin] IO),
    Tls(#[pin] tokio_rustls::client::TlsStream<IO>),
}

impl<IO> From<IO> for MaybeTls<IO> {
    fn from(stream: IO) -> Self {
        Self {
            inner: MaybeTlsInner::Plain(stream),
        }
    }
}

impl<IO> From<tokio_rustls::client::TlsStream<IO>> for MaybeTls<IO> {
    fn from(stream: tokio_rustls::client::TlsStream<IO>) -> Self {
        Self {
            inner: MaybeTlsInner::Tls(stream),
        }
    }
}

macro_rules! dispatch {
    ($driver:ident.$method:ident($($args:expr),*)) => {
        match $driver.project().inner.project() {
            MaybeTlsProj::Plain(stream) => stream.$method($($args),*),
            MaybeTlsProj::Tls(stream) => stream.$method($($args),*),
        }
    };
}

impl<IO> AsyncRead for MaybeTls<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        dispatch!(self.poll_read(cx, buf))
    }
}

impl<IO> AsyncWrite for MaybeTls<IO>
where
    IO: AsyncRead + AsyncWrite + Unpin,
{
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<Result<usize, std::io::Error>> {
        dispatch!(self.poll_write(cx, buf))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), std::io::Error>> {
        dispatch!(self.poll_flush(cx))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<(), std::io::Error>> {
        dispatch!(self.poll_shutdown(cx))
    }
}

fn get_host_and_port(uri: &Uri) -> Result<(Box<str>, u16), TransportError> {
    let host = uri
        .host()
        .ok_or_else(|| TransportError::new("missing host in uri"))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = match uri.port_u16() {
        Some(port) => port,
        None => match uri.scheme_str() {
            Some("http") => 80,
            Some("https") => 443,
            _ => return Err(TransportError::new("missing port in uri")),
        },
    };

    Ok((host.into(), port))
}
