use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;

pub const HEADER_REQUEST_ID: &str = "x-cos-request-id";
pub const HEADER_CRC64: &str = "x-cos-hash-crc64ecma";
pub const HEADER_SECURITY_TOKEN: &str = "x-cos-security-token";
pub const HEADER_COPY_SOURCE: &str = "x-cos-copy-source";
pub const HEADER_COPY_SOURCE_RANGE: &str = "x-cos-copy-source-range";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// A request body that can be replayed from its start on every attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    /// `length` bytes of a local file starting at `offset`.
    File {
        path:   PathBuf,
        offset: u64,
        length: u64,
    },
}

impl RequestBody {
    pub fn len(&self) -> u64 {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(bytes) => bytes.len() as u64,
            RequestBody::File { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self { RequestBody::Bytes(bytes) }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self { RequestBody::Bytes(Bytes::from(text)) }
}

/// One logical service operation, before signing and host rewriting.
#[derive(Debug, Clone)]
pub struct CosRequest {
    pub method:       Method,
    /// Default domain of the bucket.
    pub host:         String,
    /// Absolute, already-encoded path.
    pub path:         String,
    pub headers:      BTreeMap<String, String>,
    pub params:       BTreeMap<String, String>,
    pub body:         RequestBody,
    /// Treat an `<Error>` body under a success status as a failure.
    pub check_body:   bool,
    /// Overrides the configured receive timeout.
    pub recv_timeout: Option<Duration>,
}

impl CosRequest {
    pub fn new(method: Method, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            host: host.into(),
            path: path.into(),
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            body: RequestBody::Empty,
            check_body: false,
            recv_timeout: None,
        }
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers.extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn check_body(mut self) -> Self {
        self.check_body = true;
        self
    }

    #[must_use]
    pub fn recv_timeout(mut self, timeout: Duration) -> Self {
        self.recv_timeout = Some(timeout);
        self
    }
}

/// A received response. Header names are lowercase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CosResponse {
    pub status:  u16,
    pub headers: BTreeMap<String, String>,
    pub body:    Bytes,
}

impl CosResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .or_else(|| self.headers.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn request_id(&self) -> Option<&str> { self.header(HEADER_REQUEST_ID).filter(|id| !id.is_empty()) }

    /// `ETag` with surrounding quotes removed.
    pub fn etag(&self) -> Option<&str> { self.header("etag").map(|e| e.trim_matches('"')) }

    pub fn content_length(&self) -> Option<u64> { self.header("content-length").and_then(|v| v.trim().parse().ok()) }

    pub fn crc64(&self) -> Option<u64> { self.header(HEADER_CRC64).and_then(|v| v.trim().parse().ok()) }
}
