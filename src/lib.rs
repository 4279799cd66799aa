//! Courier
//!
//! A configurable HTTP client core. Requests go out over a pluggable
//! [`Transport`][client::transport::Transport], response bodies come back
//! through a streaming [`Decoder`][decode::Decoder], and many requests can be
//! dispatched concurrently onto a caller-supplied [`tokio`] runtime handle.
//!
//! The pieces compose in layers:
//!
//! 1. A [`Request`] is built and validated up front; nothing touches the
//!    network until dispatch.
//! 2. The [`Client`] connects through its transport (TCP, optionally upgraded
//!    to TLS according to a [`TrustPolicy`]), performs the HTTP/1.1 handshake
//!    and sends the request.
//! 3. Once response headers arrive, the body stream is drained and handed to
//!    the chosen decoder on the dispatch task, yielding a typed
//!    [`Response<T>`][Response].
//!
//! The runtime handle in [`client::Config`] is borrowed, never owned: the
//! client submits work to it but will not resize or shut it down. Whoever
//! owns the runtime is responsible for draining it with a bounded wait (for
//! example [`tokio::runtime::Runtime::shutdown_timeout`]) once all pending
//! responses have been awaited.

pub mod body;
pub use body::Body;
pub mod bridge;
pub mod client;
pub use client::{Client, Config, PendingResponse};
pub mod decode;
pub mod error;
pub use error::Error;
pub mod request;
pub use request::Request;
pub mod response;
pub use response::Response;
pub mod tls;
pub use tls::TrustPolicy;

/// Type-erased error used at component boundaries.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
