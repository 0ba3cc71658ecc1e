//! Request signing for the COS object-storage protocol.
//!
//! The signature is an HMAC-SHA1 chain over a canonical request string:
//!
//! ```text
//! sign_key       = hex(hmac_sha1(secret_key, "{start};{end}"))
//! format_string  = "{method}\n{uri}\n{params}\n{headers}\n"
//! string_to_sign = "sha1\n{start};{end}\n{hex(sha1(format_string))}\n"
//! signature      = hex(hmac_sha1(sign_key, string_to_sign))
//! ```
//!
//! Only signable headers participate: `host`, the `content-*` family,
//! `transfer-encoding`, `range` and anything prefixed `x-cos`.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use cosio_sign::{CosSigner, Credentials, RequestSigner, SignRequest};
//!
//! let credentials = Credentials::new("AKIDexample", "secret");
//! let mut headers = BTreeMap::new();
//! headers.insert("Host".to_string(), "examplebucket-1250000000.cos.ap-beijing.myqcloud.com".to_string());
//! let params = BTreeMap::new();
//!
//! let request = SignRequest::new("PUT", "/exampleobject", &headers, &params).valid_between(1_700_000_000, 1_700_000_060);
//! let token = CosSigner.sign(&credentials, &request).unwrap();
//! assert!(token.starts_with("q-sign-algorithm=sha1&q-ak=AKIDexample&q-sign-time=1700000000;1700000060"));
//! ```

pub use self::credentials::Credentials;
pub use self::signer::{CosSigner, RequestSigner, SignRequest, is_signable_header};

mod credentials;
mod signer;
