use std::collections::BTreeMap;
use std::time::Duration;

use crate::core::{object_path, object_url};
use crate::data::{HEADER_SECURITY_TOKEN, Method};
use crate::effects::client::CosClient;
use crate::effects::transport::Transport;
use crate::error::Result;

impl<T: Transport> CosClient<T> {
    /// A URL granting `method` on `key` to anyone holding it, for `expires`.
    ///
    /// Only the `host` header is signed, so the URL works from any HTTP client.
    /// It always targets the configured domain, never the backup one.
    pub fn presigned_url(
        &self,
        bucket: &str,
        key: &str,
        method: Method,
        expires: Duration,
        params: &BTreeMap<String, String>,
    ) -> Result<String> {
        let executor = self.executor();
        let host = executor.effective_host(&self.config().host(bucket));
        let path = object_path(key);

        let headers = BTreeMap::from([("host".to_string(), host.clone())]);
        let token = executor.authorize(method, &path, &headers, params, expires)?;

        let mut query: Vec<String> = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        query.push(token);
        if let Some(session_token) = executor.session_token() {
            query.push(format!("{HEADER_SECURITY_TOKEN}={}", urlencoding::encode(session_token)));
        }

        Ok(format!("{}?{}", object_url(executor.scheme(), &host, &path), query.join("&")))
    }
}
