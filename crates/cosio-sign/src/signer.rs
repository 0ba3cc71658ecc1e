use std::collections::BTreeMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha1::{Digest, Sha1};
use urlencoding::encode;

use crate::Credentials;

type HmacSha1 = Hmac<Sha1>;

/// Headers other than `x-cos*` that take part in the signature.
const SIGNED_HEADERS: &[&str] = &[
    "host",
    "content-type",
    "content-md5",
    "content-disposition",
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "range",
];

pub fn is_signable_header(name: &str) -> bool {
    SIGNED_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
        || name.get(..5).is_some_and(|prefix| prefix.eq_ignore_ascii_case("x-cos"))
}

/// Everything a signature covers.
#[derive(Debug, Clone)]
pub struct SignRequest<'a> {
    pub method:           &'a str,
    pub path:             &'a str,
    pub headers:          &'a BTreeMap<String, String>,
    pub params:           &'a BTreeMap<String, String>,
    /// Header names left out of the signature even when signable.
    pub excluded_headers: &'a [&'a str],
    pub valid_from:       i64,
    pub valid_until:      i64,
}

impl<'a> SignRequest<'a> {
    /// A request valid from now for 60 seconds.
    pub fn new(
        method: &'a str,
        path: &'a str,
        headers: &'a BTreeMap<String, String>,
        params: &'a BTreeMap<String, String>,
    ) -> Self {
        let now = Utc::now().timestamp();
        Self {
            method,
            path,
            headers,
            params,
            excluded_headers: &[],
            valid_from: now,
            valid_until: now + 60,
        }
    }

    #[must_use]
    pub fn valid_between(mut self, from: i64, until: i64) -> Self {
        self.valid_from = from;
        self.valid_until = until;
        self
    }

    #[must_use]
    pub fn valid_for(mut self, seconds: u64) -> Self {
        self.valid_until = self.valid_from.saturating_add(i64::try_from(seconds).unwrap_or(i64::MAX));
        self
    }

    #[must_use]
    pub fn excluding(mut self, headers: &'a [&'a str]) -> Self {
        self.excluded_headers = headers;
        self
    }
}

/// Produces an authorization token for a request.
///
/// Returns `None` when no token can be produced (missing credentials); callers
/// treat that as a configuration error and never put the request on the wire.
pub trait RequestSigner: Send + Sync {
    fn sign(&self, credentials: &Credentials, request: &SignRequest<'_>) -> Option<String>;
}

/// The COS `q-sign-algorithm=sha1` scheme.
#[derive(Debug, Clone, Copy, Default)]
pub struct CosSigner;

impl RequestSigner for CosSigner {
    fn sign(&self, credentials: &Credentials, request: &SignRequest<'_>) -> Option<String> {
        if !credentials.is_complete() {
            return None;
        }

        let key_time = format!("{};{}", request.valid_from, request.valid_until);

        let params = canonical_pairs(request.params.iter(), true);
        let headers = canonical_pairs(
            request.headers.iter().filter(|(name, _)| {
                is_signable_header(name)
                    && !request.excluded_headers.iter().any(|ex| name.eq_ignore_ascii_case(ex))
            }),
            false,
        );

        let uri = if request.path.is_empty() { "/" } else { request.path };
        let format_string = format!(
            "{}\n{}\n{}\n{}\n",
            request.method.to_ascii_lowercase(),
            uri,
            join_pairs(&params),
            join_pairs(&headers)
        );
        let string_to_sign = format!("sha1\n{key_time}\n{}\n", hex::encode(Sha1::digest(format_string.as_bytes())));

        let sign_key = hmac_sha1_hex(credentials.secret_key.as_bytes(), &key_time)?;
        let signature = hmac_sha1_hex(sign_key.as_bytes(), &string_to_sign)?;

        Some(format!(
            "q-sign-algorithm=sha1&q-ak={}&q-sign-time={key_time}&q-key-time={key_time}&q-header-list={}&q-url-param-list={}&q-signature={signature}",
            credentials.secret_id,
            join_keys(&headers),
            join_keys(&params),
        ))
    }
}

/// Lowercased, url-encoded and sorted `(key, value)` pairs.
fn canonical_pairs<'a>(
    pairs: impl Iterator<Item = (&'a String, &'a String)>,
    encode_key: bool,
) -> BTreeMap<String, String> {
    pairs
        .map(|(k, v)| {
            let key = if encode_key { encode(k).into_owned() } else { k.clone() };
            (key.to_ascii_lowercase(), encode(v).into_owned())
        })
        .collect()
}

fn join_pairs(pairs: &BTreeMap<String, String>) -> String {
    pairs.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>().join("&")
}

fn join_keys(pairs: &BTreeMap<String, String>) -> String {
    pairs.keys().map(String::as_str).collect::<Vec<_>>().join(";")
}

fn hmac_sha1_hex(key: &[u8], message: &str) -> Option<String> {
    let mut mac = HmacSha1::new_from_slice(key).ok()?;
    mac.update(message.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn field<'a>(token: &'a str, name: &str) -> &'a str {
        token
            .split('&')
            .find_map(|kv| kv.strip_prefix(&format!("{name}=")))
            .unwrap()
    }

    #[test]
    fn test_signable_headers() {
        assert!(is_signable_header("Host"));
        assert!(is_signable_header("content-length"));
        assert!(is_signable_header("x-cos-meta-owner"));
        assert!(is_signable_header("X-COS-Security-Token"));
        assert!(!is_signable_header("user-agent"));
        assert!(!is_signable_header("x-co"));
    }

    #[test]
    fn test_missing_credentials_yield_no_token() {
        let headers = map(&[]);
        let params = map(&[]);
        let request = SignRequest::new("GET", "/k", &headers, &params);
        assert!(CosSigner.sign(&Credentials::new("", "key"), &request).is_none());
        assert!(CosSigner.sign(&Credentials::new("id", ""), &request).is_none());
    }

    #[test]
    fn test_token_lists_are_sorted_lowercased() {
        let headers = map(&[
            ("Host", "b-1.cos.ap-guangzhou.myqcloud.com"),
            ("x-cos-meta-A", "1"),
            ("User-Agent", "cosio"),
            ("Content-Length", "5"),
        ]);
        let params = map(&[("uploadId", "abc"), ("partNumber", "3")]);
        let request = SignRequest::new("PUT", "/obj", &headers, &params).valid_between(10, 70);
        let token = CosSigner.sign(&Credentials::new("id", "key"), &request).unwrap();

        assert_eq!(field(&token, "q-sign-algorithm"), "sha1");
        assert_eq!(field(&token, "q-ak"), "id");
        assert_eq!(field(&token, "q-sign-time"), "10;70");
        assert_eq!(field(&token, "q-key-time"), "10;70");
        assert_eq!(field(&token, "q-header-list"), "content-length;host;x-cos-meta-a");
        assert_eq!(field(&token, "q-url-param-list"), "partnumber;uploadid");
        assert_eq!(field(&token, "q-signature").len(), 40);
    }

    #[test]
    fn test_excluded_headers_leave_the_signature() {
        let headers = map(&[("Host", "h"), ("Content-Type", "text/plain")]);
        let params = map(&[]);
        let excluded = ["content-type"];
        let request = SignRequest::new("GET", "/", &headers, &params).excluding(&excluded);
        let token = CosSigner.sign(&Credentials::new("id", "key"), &request).unwrap();
        assert_eq!(field(&token, "q-header-list"), "host");
    }

    #[test]
    fn test_signature_is_deterministic_and_input_sensitive() {
        let headers = map(&[("host", "h")]);
        let params = map(&[]);
        let creds = Credentials::new("id", "key");
        let a = CosSigner.sign(&creds, &SignRequest::new("GET", "/a", &headers, &params).valid_between(1, 2));
        let b = CosSigner.sign(&creds, &SignRequest::new("GET", "/a", &headers, &params).valid_between(1, 2));
        let c = CosSigner.sign(&creds, &SignRequest::new("GET", "/b", &headers, &params).valid_between(1, 2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_canonical_pairs_encode_values() {
        let params = map(&[("a", "a "), ("B", " b")]);
        let pairs = canonical_pairs(params.iter(), true);
        assert_eq!(join_pairs(&pairs), "a=a%20&b=%20b");
        assert_eq!(join_keys(&pairs), "a;b");
    }

    #[test]
    fn test_valid_for_extends_window() {
        let headers = map(&[]);
        let params = map(&[]);
        let request = SignRequest::new("GET", "/", &headers, &params).valid_between(100, 100).valid_for(30);
        assert_eq!(request.valid_until, 130);
    }
}
