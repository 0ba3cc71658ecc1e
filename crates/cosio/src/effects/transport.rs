use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use crate::data::{CosResponse, Method, RequestBody};

/// A fully signed request, ready for the wire.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method:  Method,
    /// `scheme://host/path`, without the query string.
    pub url:     String,
    pub params:  BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body:    RequestBody,
    /// Receive timeout for the whole exchange.
    pub timeout: Duration,
}

/// Asynchronous HTTP transport abstraction.
///
/// Implementations perform exactly one exchange per call: no retries and no
/// status interpretation. Any status the server answers with is an `Ok`;
/// `Err` means no HTTP status was obtained at all.
///
/// # Implementations
///
/// - [`ReqwestTransport`]: Production implementation using `reqwest`
/// - Mock implementations for testing
pub trait Transport: Send + Sync + 'static {
    /// Error type for failed exchanges.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Send one request and collect the whole response.
    ///
    /// A [`RequestBody::File`] must be read from its recorded offset on every
    /// call so a retried request replays the same bytes.
    fn send(&self, request: HttpRequest) -> impl Future<Output = Result<CosResponse, Self::Error>> + Send;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::io::{self, SeekFrom};

    use tokio::io::{AsyncReadExt, AsyncSeekExt};
    use tokio_util::io::ReaderStream;

    use super::*;
    use crate::data::CosConfig;
    use crate::error::{CosError, Result};

    #[derive(Debug, thiserror::Error)]
    pub enum ReqwestTransportError {
        #[error(transparent)]
        Http(#[from] reqwest::Error),
        #[error("reading request body: {0}")]
        Body(#[from] io::Error),
    }

    /// Production transport using reqwest.
    #[derive(Debug, Clone)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        /// Build a client honoring the connect timeout and TLS settings of `config`.
        pub fn new(config: &CosConfig) -> Result<Self> {
            let mut builder = reqwest::Client::builder()
                .connect_timeout(config.connect_timeout())
                .danger_accept_invalid_certs(!config.verify_cert);

            if let Some(ca) = &config.ca_location {
                let pem = std::fs::read(ca)?;
                let cert = reqwest::Certificate::from_pem(&pem)
                    .map_err(|e| CosError::Configuration(format!("invalid CA bundle {}: {e}", ca.display())))?;
                builder = builder.add_root_certificate(cert);
            }

            let client = builder
                .build()
                .map_err(|e| CosError::Configuration(format!("building HTTP client: {e}")))?;
            Ok(Self { client })
        }

        pub fn from_client(client: reqwest::Client) -> Self { Self { client } }
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Put => reqwest::Method::PUT,
            Method::Post => reqwest::Method::POST,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    impl Transport for ReqwestTransport {
        type Error = ReqwestTransportError;

        async fn send(&self, request: HttpRequest) -> std::result::Result<CosResponse, Self::Error> {
            let mut builder = self
                .client
                .request(method(request.method), &request.url)
                .query(&request.params)
                .timeout(request.timeout);

            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            builder = match request.body {
                RequestBody::Empty => builder,
                RequestBody::Bytes(bytes) => builder.body(bytes),
                RequestBody::File { path, offset, length } => {
                    let mut file = tokio::fs::File::open(&path).await?;
                    file.seek(SeekFrom::Start(offset)).await?;
                    let stream = ReaderStream::new(file.take(length));
                    builder.body(reqwest::Body::wrap_stream(stream))
                }
            };

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value.to_str().ok().map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
                })
                .collect();
            let body = response.bytes().await?;

            Ok(CosResponse { status, headers, body })
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::{ReqwestTransport, ReqwestTransportError};
