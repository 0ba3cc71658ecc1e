use std::path::Path;

use bytes::Bytes;
use cosio_verify::{Crc64Hasher, Fingerprint, FingerprintKind};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

use crate::core::xml;
use crate::data::{CopySource, CosResponse, HEADER_COPY_SOURCE, Method, ObjectMeta, PutOptions, PutOutcome, RequestBody};
use crate::effects::client::CosClient;
use crate::effects::digest::file_fingerprint;
use crate::effects::handle::TransferHandle;
use crate::effects::stream_copy::copy_with_handle;
use crate::effects::transport::Transport;
use crate::error::{CosError, Result};

impl<T: Transport> CosClient<T> {
    pub async fn head_object(&self, bucket: &str, key: &str) -> Result<ObjectMeta> {
        let request = self.object_request(Method::Head, bucket, key);
        let response = self.executor().execute(&request).await?;
        ObjectMeta::from_response(&response)
    }

    /// HEAD the source of a copy, which may live in another region.
    pub(crate) async fn head_source(&self, source: &CopySource) -> Result<ObjectMeta> {
        let mut request = self.object_request(Method::Head, &source.bucket, &source.key);
        request.host = source.host(self.config());
        let response = self.executor().execute(&request).await?;
        ObjectMeta::from_response(&response)
    }

    /// Read a whole object into memory.
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let request = self.object_request(Method::Get, bucket, key);
        let response = self.executor().execute_verified(&request, check_body_length).await?;
        Ok(response.body)
    }

    /// Read a whole object into a local file, truncating it first.
    ///
    /// With a handle, the body is streamed through it in chunks so progress is
    /// reported and cancellation is honored. Returns the number of bytes written.
    #[instrument(skip(self, path, handle), fields(path = %path.display()))]
    pub async fn get_object_to_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        handle: Option<&TransferHandle>,
    ) -> Result<u64> {
        let request = self.object_request(Method::Get, bucket, key);
        let response = self.executor().execute_verified(&request, check_body_length).await?;

        let mut file = tokio::fs::File::create(path).await?;
        let written = match handle {
            Some(handle) => {
                handle.set_total_size(response.body.len() as u64);
                copy_with_handle(&mut &response.body[..], &mut file, handle).await?
            }
            None => {
                file.write_all(&response.body).await?;
                file.flush().await?;
                response.body.len() as u64
            }
        };
        debug!(written, "object stored");
        Ok(written)
    }

    pub async fn put_object(&self, bucket: &str, key: &str, data: Bytes, options: &PutOptions) -> Result<PutOutcome> {
        let expected = self.crc64_enabled().then(|| Crc64Hasher::checksum(&data));
        let request = self.object_request(Method::Put, bucket, key).headers(options.to_headers()).body(data);
        let response = self
            .executor()
            .execute_verified(&request, |response| check_reported_crc64(expected, response))
            .await?;
        Ok(put_outcome(&response))
    }

    /// Upload a local file in one request. The body is re-read from disk on
    /// every attempt.
    #[instrument(skip(self, path, options), fields(path = %path.display()))]
    pub async fn put_object_from_file(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        options: &PutOptions,
    ) -> Result<PutOutcome> {
        let length = tokio::fs::metadata(path).await?.len();
        let expected = if self.crc64_enabled() {
            match file_fingerprint(path, 0, length, FingerprintKind::Crc64).await? {
                Fingerprint::Crc64(value) => Some(value),
                Fingerprint::Md5(_) => None,
            }
        } else {
            None
        };

        let body = RequestBody::File { path: path.to_path_buf(), offset: 0, length };
        let request = self.object_request(Method::Put, bucket, key).headers(options.to_headers()).body(body);
        let response = self
            .executor()
            .execute_verified(&request, |response| check_reported_crc64(expected, response))
            .await?;
        Ok(put_outcome(&response))
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let request = self.object_request(Method::Delete, bucket, key);
        self.executor().execute(&request).await?;
        Ok(())
    }

    /// Server-side copy of a whole object in one request.
    pub async fn put_object_copy(
        &self,
        bucket: &str,
        key: &str,
        source: &CopySource,
        options: &PutOptions,
    ) -> Result<PutOutcome> {
        let request = self
            .object_request(Method::Put, bucket, key)
            .headers(options.to_headers())
            .header(HEADER_COPY_SOURCE, source.header_value(self.config()))
            .check_body();
        let response = self
            .executor()
            .execute_verified(&request, |response| xml::from_xml::<xml::CopyResult>(&response.body).map(|_| ()))
            .await?;

        let result: xml::CopyResult = xml::from_xml(&response.body)?;
        let etag = result.etag.trim_matches('"');
        Ok(PutOutcome {
            etag:       (!etag.is_empty()).then(|| etag.to_string()).or_else(|| response.etag().map(str::to_string)),
            crc64:      result.crc64.and_then(|v| v.trim().parse().ok()).or_else(|| response.crc64()),
            request_id: response.request_id().map(str::to_string),
        })
    }

    fn crc64_enabled(&self) -> bool { self.config().fingerprint_kind() == FingerprintKind::Crc64 }
}

fn put_outcome(response: &CosResponse) -> PutOutcome {
    PutOutcome {
        etag:       response.etag().map(str::to_string),
        crc64:      response.crc64(),
        request_id: response.request_id().map(str::to_string),
    }
}

/// Reject a body shorter or longer than its declared Content-Length.
fn check_body_length(response: &CosResponse) -> Result<()> {
    match response.content_length() {
        Some(expected) if expected != response.body.len() as u64 => Err(CosError::LengthMismatch {
            context: "object body".into(),
            expected,
            actual: response.body.len() as u64,
        }),
        _ => Ok(()),
    }
}

/// Compare a locally computed CRC64 with the one the service reports, when both exist.
fn check_reported_crc64(expected: Option<u64>, response: &CosResponse) -> Result<()> {
    match (expected, response.crc64()) {
        (Some(expected), Some(actual)) if expected != actual => Err(CosError::ChecksumMismatch {
            context:  "object body".into(),
            expected: expected.to_string(),
            actual:   actual.to_string(),
        }),
        _ => Ok(()),
    }
}
