//! Outbound request values.
//!
//! A [`Request`] is immutable once built. All validation happens in
//! [`Builder::build`], so an invalid URI or header never reaches the
//! network: construction fails with [`Error::InvalidUri`] or
//! [`Error::InvalidHeader`] instead.

use std::time::Duration;

use http::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use http::uri::PathAndQuery;
use http::{Method, Uri};

use crate::body::Body;
use crate::error::Error;

/// An immutable outbound HTTP request.
///
/// Headers form an ordered multimap: appending the same name twice keeps
/// both values, in insertion order, and lookups match names
/// case-insensitively. An optional per-request timeout overrides the
/// client-wide default at dispatch time.
#[derive(Debug)]
pub struct Request {
    uri: Uri,
    method: Method,
    headers: HeaderMap,
    body: Body,
    timeout: Option<Duration>,
}

impl Request {
    /// Start building a request for the given URI, defaulting to `GET`.
    pub fn builder<U>(uri: U) -> Builder
    where
        U: AsRef<str>,
    {
        Builder::new(Method::GET, uri)
    }

    /// Start building a `GET` request for the given URI.
    pub fn get<U>(uri: U) -> Builder
    where
        U: AsRef<str>,
    {
        Builder::new(Method::GET, uri)
    }

    /// Start building a `POST` request for the given URI with the given body.
    pub fn post<U, B>(uri: U, body: B) -> Builder
    where
        U: AsRef<str>,
        B: Into<Body>,
    {
        Builder::new(Method::POST, uri).body(body)
    }

    /// The target URI.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The request headers, in insertion order.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The per-request timeout, if one was set.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Lower this request to its wire form: origin-form request target plus
    /// a Host header derived from the URI (unless one was supplied).
    pub(crate) fn into_wire(self) -> Result<http::Request<Body>, Error> {
        let authority = self
            .uri
            .authority()
            .ok_or_else(|| Error::InvalidUri {
                uri: self.uri.to_string(),
                source: "missing authority".into(),
            })?
            .clone();

        let host = HeaderValue::from_str(authority.as_str()).map_err(|err| Error::InvalidUri {
            uri: self.uri.to_string(),
            source: err.into(),
        })?;

        let path_and_query = self
            .uri
            .path_and_query()
            .cloned()
            .unwrap_or_else(|| PathAndQuery::from_static("/"));
        let mut parts = http::uri::Parts::default();
        parts.path_and_query = Some(path_and_query);
        let target = Uri::from_parts(parts).map_err(|err| Error::InvalidUri {
            uri: self.uri.to_string(),
            source: err.into(),
        })?;

        let mut headers = HeaderMap::with_capacity(self.headers.len() + 1);
        if !self.headers.contains_key(HOST) {
            headers.insert(HOST, host);
        }
        headers.extend(self.headers);

        let mut request = http::Request::new(self.body);
        *request.method_mut() = self.method;
        *request.uri_mut() = target;
        *request.headers_mut() = headers;
        Ok(request)
    }
}

/// Builder for [`Request`].
///
/// Nothing is validated until [`build`][Builder::build]; the builder just
/// accumulates raw parts so callers can chain freely.
#[derive(Debug)]
pub struct Builder {
    uri: String,
    method: Method,
    headers: Vec<(String, String)>,
    body: Body,
    timeout: Option<Duration>,
}

impl Builder {
    fn new<U>(method: Method, uri: U) -> Self
    where
        U: AsRef<str>,
    {
        Self {
            uri: uri.as_ref().to_owned(),
            method,
            headers: Vec::new(),
            body: Body::empty(),
            timeout: None,
        }
    }

    /// Set the request method.
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Append a header. Repeated names are kept, in insertion order.
    pub fn header<K, V>(mut self, name: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn body<B>(mut self, body: B) -> Self
    where
        B: Into<Body>,
    {
        self.body = body.into();
        self
    }

    /// Set a per-request timeout, overriding the client-wide default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validate the accumulated parts and produce an immutable [`Request`].
    pub fn build(self) -> Result<Request, Error> {
        let uri: Uri = self.uri.parse().map_err(|err: http::uri::InvalidUri| {
            Error::InvalidUri {
                uri: self.uri.clone(),
                source: err.into(),
            }
        })?;

        if uri.host().is_none() {
            return Err(Error::InvalidUri {
                uri: self.uri,
                source: "missing host".into(),
            });
        }

        let mut headers = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in self.headers {
            let parsed_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|err| Error::InvalidHeader {
                    name: name.clone(),
                    source: err.into(),
                })?;
            let parsed_value =
                HeaderValue::from_str(&value).map_err(|err| Error::InvalidHeader {
                    name: name.clone(),
                    source: err.into(),
                })?;
            headers.append(parsed_name, parsed_value);
        }

        Ok(Request {
            uri,
            method: self.method,
            headers,
            body: self.body,
            timeout: self.timeout,
        })
    }
}
