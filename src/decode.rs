//! Streaming body decoders.
//!
//! A [`Decoder`] is a pure conversion from a buffered payload to a typed
//! value; it carries no knowledge of which task produced the bytes.
//! [`RawBody`] is the single-consumption handle around the response stream:
//! it appears once headers are available, and decoding happens on demand on
//! the dispatch task - never on the connection driver that performs the
//! actual I/O, so a slow parse cannot stall other in-flight requests.
//!
//! Consuming a stream twice is not expressible: [`RawBody::decode`] takes
//! the handle by value.

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use http_body_util::BodyExt as _;
use serde::de::DeserializeOwned;

use crate::body::Body;
use crate::client::transport::TransportError;
use crate::error::Error;
use crate::BoxError;

/// A pure conversion from a response payload to a typed value.
pub trait Decoder {
    /// The value this decoder produces.
    type Item;

    /// Convert the fully buffered payload into the target value.
    fn decode(&self, src: Bytes) -> Result<Self::Item, BoxError>;
}

/// Decodes the payload as UTF-8 text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Text;

impl Decoder for Text {
    type Item = String;

    fn decode(&self, src: Bytes) -> Result<Self::Item, BoxError> {
        let text = std::str::from_utf8(&src)?;
        Ok(text.to_owned())
    }
}

/// Passes the raw payload bytes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Decoder for Raw {
    type Item = Bytes;

    fn decode(&self, src: Bytes) -> Result<Self::Item, BoxError> {
        Ok(src)
    }
}

/// Drains and discards the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discard;

impl Decoder for Discard {
    type Item = ();

    fn decode(&self, _src: Bytes) -> Result<Self::Item, BoxError> {
        Ok(())
    }
}

/// Decodes the payload as JSON into `T`.
///
/// Parse failures carry serde_json's position information (line and column)
/// through the error source chain.
pub struct Json<T> {
    target: PhantomData<fn() -> T>,
}

impl<T> Json<T> {
    /// Create a JSON decoder targeting `T`.
    pub fn new() -> Self {
        Self {
            target: PhantomData,
        }
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Json<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Json<T> {}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Json")
    }
}

impl<T> Decoder for Json<T>
where
    T: DeserializeOwned,
{
    type Item = T;

    fn decode(&self, src: Bytes) -> Result<Self::Item, BoxError> {
        serde_json::from_slice(&src).map_err(Into::into)
    }
}

/// The not-yet-decoded response stream, available once headers have arrived.
///
/// The stream is fully drained and released whether decoding succeeds or
/// fails; the underlying connection is never left holding half a body.
#[derive(Debug)]
pub struct RawBody {
    body: Body,
}

impl RawBody {
    /// Wrap a response stream.
    pub fn new(body: Body) -> Self {
        Self { body }
    }

    /// Drain the stream, then run the decoder over the buffered payload.
    ///
    /// A failure while reading the stream surfaces as [`Error::Transport`];
    /// a payload that does not match the decoder's expected shape surfaces
    /// as [`Error::Decode`] with the number of bytes consumed.
    pub async fn decode<D>(self, decoder: &D) -> Result<D::Item, Error>
    where
        D: Decoder,
    {
        let collected = self
            .body
            .collect()
            .await
            .map_err(|err| TransportError::build("reading response body", err))?;
        let payload = collected.to_bytes();
        let bytes = payload.len();

        decoder
            .decode(payload)
            .map_err(|source| Error::Decode { bytes, source })
    }
}
