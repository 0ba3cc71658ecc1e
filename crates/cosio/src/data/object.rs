use std::collections::BTreeMap;

use crate::core::object_path;
use crate::data::{CosConfig, CosResponse, CosResult};
use crate::error::{CosError, Result};

/// Metadata from a HEAD request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_length: u64,
    /// ETag without quotes.
    pub etag:           Option<String>,
    pub crc64:          Option<u64>,
    pub content_type:   Option<String>,
    pub last_modified:  Option<String>,
    pub request_id:     Option<String>,
    pub headers:        BTreeMap<String, String>,
}

impl ObjectMeta {
    pub fn from_response(response: &CosResponse) -> Result<Self> {
        let content_length = response
            .content_length()
            .ok_or_else(|| CosError::Decode("HEAD response without a usable Content-Length".into()))?;
        Ok(Self {
            content_length,
            etag: response.etag().map(str::to_string),
            crc64: response.crc64(),
            content_type: response.header("content-type").map(str::to_string),
            last_modified: response.header("last-modified").map(str::to_string),
            request_id: response.request_id().map(str::to_string),
            headers: response.headers.clone(),
        })
    }

    /// User metadata (`x-cos-meta-*`) with the prefix stripped.
    pub fn user_metadata(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .filter_map(|(k, v)| k.strip_prefix("x-cos-meta-").map(|name| (name.to_string(), v.clone())))
            .collect()
    }
}

/// Headers applied when an object (or a multipart session) is created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type:           Option<String>,
    pub storage_class:          Option<String>,
    pub server_side_encryption: Option<String>,
    /// Stored as `x-cos-meta-<name>`.
    pub metadata:               BTreeMap<String, String>,
    pub headers:                BTreeMap<String, String>,
}

impl PutOptions {
    #[must_use]
    pub fn content_type(mut self, value: impl Into<String>) -> Self {
        self.content_type = Some(value.into());
        self
    }

    #[must_use]
    pub fn storage_class(mut self, value: impl Into<String>) -> Self {
        self.storage_class = Some(value.into());
        self
    }

    #[must_use]
    pub fn server_side_encryption(mut self, value: impl Into<String>) -> Self {
        self.server_side_encryption = Some(value.into());
        self
    }

    #[must_use]
    pub fn meta(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn to_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        if let Some(v) = &self.content_type {
            headers.insert("Content-Type".into(), v.clone());
        }
        if let Some(v) = &self.storage_class {
            headers.insert("x-cos-storage-class".into(), v.clone());
        }
        if let Some(v) = &self.server_side_encryption {
            headers.insert("x-cos-server-side-encryption".into(), v.clone());
        }
        for (name, value) in &self.metadata {
            headers.insert(format!("x-cos-meta-{name}"), value.clone());
        }
        headers
    }
}

/// The source object of a server-side copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopySource {
    pub bucket: String,
    /// Region of the source bucket; the configured region when `None`.
    pub region: Option<String>,
    pub key:    String,
}

impl CopySource {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), region: None, key: key.into() }
    }

    #[must_use]
    pub fn in_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn region<'a>(&'a self, config: &'a CosConfig) -> &'a str { self.region.as_deref().unwrap_or(&config.region) }

    pub fn host(&self, config: &CosConfig) -> String { config.host_in(self.region(config), &self.bucket) }

    /// Value of the `x-cos-copy-source` header.
    pub fn header_value(&self, config: &CosConfig) -> String { format!("{}{}", self.host(config), object_path(&self.key)) }
}

/// Result of a successful single-shot write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOutcome {
    pub etag:       Option<String>,
    pub crc64:      Option<u64>,
    pub request_id: Option<String>,
}

/// Result of a finished transfer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutcome {
    /// ETag of the resulting object, when the service reported one.
    pub etag:          Option<String>,
    pub upload_id:     Option<String>,
    /// Parts adopted from an interrupted session without being re-sent.
    pub resumed_parts: usize,
    pub bytes:         u64,
    pub result:        CosResult,
}
