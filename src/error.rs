//! Error taxonomy for the dispatch path.
//!
//! Every failure a request can hit is a distinct variant, so callers can
//! branch on the kind (retry, abort, fall back) without string matching.
//! Construction failures ([`Error::InvalidUri`], [`Error::InvalidHeader`])
//! are reported before anything touches the network. Trust-store
//! construction has its own error type, [`crate::tls::TrustStoreError`].

use std::time::Duration;

use thiserror::Error;

use crate::client::transport::TransportError;
use crate::BoxError;

/// Error produced while building or dispatching a request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The request URI could not be parsed, or could not be lowered to its
    /// wire form (origin-form plus Host header).
    #[error("invalid uri {uri:?}: {source}")]
    InvalidUri {
        /// The offending URI as supplied.
        uri: String,
        /// Underlying parse failure.
        #[source]
        source: BoxError,
    },

    /// A header name or value supplied at request construction was malformed.
    #[error("invalid header {name:?}: {source}")]
    InvalidHeader {
        /// The offending header name as supplied.
        name: String,
        /// Underlying parse failure.
        #[source]
        source: BoxError,
    },

    /// The transport did not produce a connection within the connect timeout.
    #[error("connect timed out after {timeout:?}")]
    ConnectTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// The exchange did not complete within the per-request timeout.
    #[error("request timed out after {timeout:?}")]
    RequestTimeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Failure in the transport or protocol layer, below decoding.
    #[error("transport: {0}")]
    Transport(#[from] TransportError),

    /// The response body did not match the decoder's expected shape.
    #[error("decode failed after {bytes} bytes: {source}")]
    Decode {
        /// Number of body bytes consumed before the failure was reported.
        bytes: usize,
        /// Underlying parse failure.
        #[source]
        source: BoxError,
    },

    /// A dispatched task was cancelled or panicked before completing.
    #[error("dispatch task failed")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    /// True if this error is one of the two timeout kinds.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Error::ConnectTimeout { .. } | Error::RequestTimeout { .. }
        )
    }
}
