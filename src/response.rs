//! Decoded response values.

use http::header::HeaderMap;
use http::StatusCode;

/// An immutable response whose body has already been decoded to `T`.
///
/// The body type is fixed by the decoder chosen at dispatch time. Header
/// lookups match names case-insensitively and return values in the order the
/// peer sent them.
#[derive(Debug)]
pub struct Response<T> {
    status: StatusCode,
    headers: HeaderMap,
    body: T,
}

impl<T> Response<T> {
    /// Assemble a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: T) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// The response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers, in wire order.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// All values for the given header name, in wire order.
    ///
    /// Matching is case-insensitive. Returns an empty list for absent
    /// headers, names that are not valid header names, and values that are
    /// not valid UTF-8.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get_all(name)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .collect()
    }

    /// A reference to the decoded body.
    pub fn body(&self) -> &T {
        &self.body
    }

    /// Consume the response, returning the decoded body.
    pub fn into_body(self) -> T {
        self.body
    }

    /// Consume the response, returning status, headers and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, T) {
        (self.status, self.headers, self.body)
    }
}
