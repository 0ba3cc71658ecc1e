use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cosio_sign::{CosSigner, Credentials, RequestSigner, SignRequest};
use tracing::{debug, info, warn};

use crate::core::{Disposition, backup_host, classify, is_default_domain, object_url, should_fail_over, xml};
use crate::data::{CosConfig, CosRequest, CosResponse, DomainPolicy, HEADER_SECURITY_TOKEN, Method, RetryPolicy};
use crate::effects::transport::{HttpRequest, Transport};
use crate::error::{CosError, Result};

/// Signs, sends and retries every request the client makes.
///
/// Each attempt is signed afresh, so a retry after a long backoff still
/// carries a valid signature, and is sent to the current domain, which may
/// switch to the backup domain between attempts.
pub struct RequestExecutor<T> {
    transport:    T,
    signer:       Arc<dyn RequestSigner>,
    credentials:  Credentials,
    retry:        RetryPolicy,
    domain:       DomainPolicy,
    scheme:       &'static str,
    recv_timeout: Duration,
    sign_expire:  Duration,
}

impl<T> fmt::Debug for RequestExecutor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("credentials", &self.credentials)
            .field("retry", &self.retry)
            .field("domain", &self.domain)
            .field("scheme", &self.scheme)
            .field("recv_timeout", &self.recv_timeout)
            .field("sign_expire", &self.sign_expire)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T, config: &CosConfig) -> Self {
        Self {
            transport,
            signer: Arc::new(CosSigner),
            credentials: config.credentials(),
            retry: config.retry_policy(),
            domain: config.domain_policy(),
            scheme: config.scheme(),
            recv_timeout: config.recv_timeout(),
            sign_expire: config.sign_expire(),
        }
    }

    #[must_use]
    pub fn with_signer(mut self, signer: impl RequestSigner + 'static) -> Self {
        self.signer = Arc::new(signer);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn transport(&self) -> &T { &self.transport }

    pub fn retry_policy(&self) -> &RetryPolicy { &self.retry }

    pub fn recv_timeout(&self) -> Duration { self.recv_timeout }

    /// The domain requests for `default_host` are actually sent to.
    pub fn effective_host(&self, default_host: &str) -> String {
        self.domain.fixed_host.clone().unwrap_or_else(|| default_host.to_string())
    }

    pub fn scheme(&self) -> &'static str { self.scheme }

    pub fn session_token(&self) -> Option<&str> { self.credentials.session_token.as_deref() }

    /// Signature token valid from now for `valid_for`.
    pub fn authorize(
        &self,
        method: Method,
        path: &str,
        headers: &BTreeMap<String, String>,
        params: &BTreeMap<String, String>,
        valid_for: Duration,
    ) -> Result<String> {
        let sign_request = SignRequest::new(method.as_str(), path, headers, params).valid_for(valid_for.as_secs());
        self.signer
            .sign(&self.credentials, &sign_request)
            .ok_or_else(|| CosError::Configuration("cannot sign request: secret id or secret key is empty".into()))
    }

    /// Execute with retries; success is decided by status alone.
    pub async fn execute(&self, request: &CosRequest) -> Result<CosResponse> {
        self.execute_verified(request, |_| Ok(())).await
    }

    /// Execute with retries, additionally requiring `verify` to accept the
    /// response. A retryable verification error consumes an attempt like a
    /// transient failure; any other error is returned at once.
    pub async fn execute_verified<F>(&self, request: &CosRequest, verify: F) -> Result<CosResponse>
    where
        F: Fn(&CosResponse) -> Result<()> + Send + Sync,
    {
        let mut host = self.effective_host(&request.host);
        let mut last_error = None;

        for attempt in 0..=self.retry.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.retry.delay(attempt - 1)).await;
            }

            let error = match self.send_once(request, &host).await {
                Ok(response) => match verify(&response) {
                    Ok(()) => return Ok(response),
                    Err(e) if e.is_retryable() => e,
                    Err(e) => return Err(e),
                },
                Err(e) if e.is_retryable() => e,
                Err(e) => return Err(e),
            };

            warn!(
                method = %request.method,
                path = %request.path,
                host = %host,
                attempt,
                error = %error,
                "request attempt failed"
            );

            let status = match &error {
                CosError::Transient(service) => Some(Some(service.status)),
                CosError::Transport { .. } => Some(None),
                _ => None,
            };
            if let Some(status) = status
                && is_default_domain(&host)
                && should_fail_over(
                    &self.domain,
                    status,
                    error.request_id().is_some(),
                    attempt,
                    self.retry.max_retries,
                )
            {
                let backup = backup_host(&host);
                info!(from = %host, to = %backup, "switching to backup domain");
                host = backup;
            }

            last_error = Some(error);
        }

        Err(last_error.unwrap_or_else(|| CosError::Transport { message: "no attempt was made".into() }))
    }

    async fn send_once(&self, request: &CosRequest, host: &str) -> Result<CosResponse> {
        let mut headers = request.headers.clone();
        set_header(&mut headers, "Host", host.to_string());
        if let Some(token) = &self.credentials.session_token {
            set_header(&mut headers, HEADER_SECURITY_TOKEN, token.clone());
        }
        if matches!(request.method, Method::Put | Method::Post) && !has_header(&headers, "content-length") {
            headers.insert("Content-Length".into(), request.body.len().to_string());
        }

        let token = self.authorize(request.method, &request.path, &headers, &request.params, self.sign_expire)?;
        headers.insert("Authorization".into(), token);

        let http = HttpRequest {
            method: request.method,
            url: object_url(self.scheme, host, &request.path),
            params: request.params.clone(),
            headers,
            body: request.body.clone(),
            timeout: request.recv_timeout.unwrap_or(self.recv_timeout),
        };

        debug!(method = %request.method, url = %http.url, "sending request");
        let response = self
            .transport
            .send(http)
            .await
            .map_err(|e| CosError::Transport { message: e.to_string() })?;

        check_response(request, response)
    }
}

fn has_header(headers: &BTreeMap<String, String>, name: &str) -> bool {
    headers.keys().any(|k| k.eq_ignore_ascii_case(name))
}

/// Insert `name`, replacing any differently-cased spelling of it.
fn set_header(headers: &mut BTreeMap<String, String>, name: &str, value: String) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(name));
    headers.insert(name.to_string(), value);
}

fn check_response(request: &CosRequest, response: CosResponse) -> Result<CosResponse> {
    let success_status = (200..300).contains(&response.status);
    let error_doc = if request.check_body || !success_status {
        xml::parse_error_document(&response.body)
    } else {
        None
    };
    let body_error = success_status && error_doc.is_some();
    let has_request_id = response.request_id().is_some()
        || error_doc.as_ref().is_some_and(|doc| doc.request_id.as_deref().is_some_and(|id| !id.is_empty()));

    let disposition = classify(response.status, body_error, has_request_id);
    if disposition == Disposition::Success {
        return Ok(response);
    }

    let mut service = error_doc.unwrap_or_default().into_service_error(response.status, response.request_id());
    if service.message.is_empty() {
        service.message = format!("{} {} returned status {}", request.method, request.path, response.status);
    }
    Err(match disposition {
        Disposition::Reject => CosError::Client(service),
        _ => CosError::Transient(service),
    })
}
