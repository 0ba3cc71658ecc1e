use bytes::Bytes;
use tracing::{debug, warn};

use crate::core::{Segment, xml};
use crate::data::{CopySource, Method, PartRecord, PutOptions, PutOutcome};
use crate::effects::client::CosClient;
use crate::effects::transport::Transport;
use crate::error::{CosError, Result};

/// Page size requested from the part listing.
const LIST_PARTS_PAGE: u32 = 1000;

impl<T: Transport> CosClient<T> {
    /// Open a multipart session and return its upload id.
    pub async fn initiate_multipart_upload(&self, bucket: &str, key: &str, options: &PutOptions) -> Result<String> {
        let request = self
            .object_request(Method::Post, bucket, key)
            .param("uploads", "")
            .headers(options.to_headers());
        let response = self.executor().execute(&request).await?;

        let result: xml::InitiateMultipartUploadResult = xml::from_xml(&response.body)?;
        if result.upload_id.is_empty() {
            return Err(CosError::Decode("initiate multipart upload returned no UploadId".into()));
        }
        debug!(bucket, key, upload_id = %result.upload_id, "multipart session opened");
        Ok(result.upload_id)
    }

    /// Upload one part. The returned record has offset zero; its position in
    /// the object is known only to the caller.
    pub async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Bytes,
    ) -> Result<PartRecord> {
        if data.is_empty() {
            return Err(CosError::InvalidArgument(format!("part {part_number} has an empty body")));
        }
        self.part_task(bucket, key)
            .in_session(upload_id)
            .upload_part(part_number, 0, data)
            .await
    }

    /// Copy `segment` of `source` into part `segment.part_number()`.
    pub async fn upload_part_copy(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        source: &CopySource,
        segment: Segment,
    ) -> Result<PartRecord> {
        self.part_task(bucket, key)
            .in_session(upload_id)
            .copy_range(&source.header_value(self.config()), segment)
            .await
    }

    /// Assemble the session's parts into the final object.
    ///
    /// Parts are listed in ascending part-number order whatever order they are
    /// given in. The request waits twice the normal receive timeout and an
    /// `<Error>` body under a success status counts as a failure.
    pub async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[PartRecord],
    ) -> Result<PutOutcome> {
        let mut parts: Vec<_> = parts
            .iter()
            .map(|p| xml::CompletedPart { part_number: p.part_number, etag: p.etag.clone() })
            .collect();
        parts.sort_by_key(|p| p.part_number);
        let body = xml::CompleteMultipartUpload { parts }.to_xml()?;

        let request = self
            .object_request(Method::Post, bucket, key)
            .param("uploadId", upload_id)
            .header("Content-Type", "application/xml")
            .body(body)
            .recv_timeout(self.executor().recv_timeout() * 2)
            .check_body();
        let response = self.executor().execute(&request).await?;

        let etag = match xml::from_xml::<xml::CompleteMultipartUploadResult>(&response.body) {
            Ok(result) if !result.etag.is_empty() => Some(result.etag.trim_matches('"').to_string()),
            Ok(_) => response.etag().map(str::to_string),
            Err(e) => {
                warn!(bucket, key, upload_id, error = %e, "unreadable completion result");
                response.etag().map(str::to_string)
            }
        };
        Ok(PutOutcome {
            etag,
            crc64: response.crc64(),
            request_id: response.request_id().map(str::to_string),
        })
    }

    /// Discard a session and the parts stored under it.
    pub async fn abort_multipart_upload(&self, bucket: &str, key: &str, upload_id: &str) -> Result<()> {
        let request = self.object_request(Method::Delete, bucket, key).param("uploadId", upload_id);
        self.executor().execute(&request).await?;
        debug!(bucket, key, upload_id, "multipart session aborted");
        Ok(())
    }

    /// One page of a session's parts, starting after `part_number_marker`.
    pub async fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: Option<&str>,
        max_parts: Option<u32>,
    ) -> Result<xml::ListPartsResult> {
        let mut request = self.object_request(Method::Get, bucket, key).param("uploadId", upload_id);
        if let Some(marker) = part_number_marker.filter(|m| !m.is_empty()) {
            request = request.param("part-number-marker", marker);
        }
        if let Some(max) = max_parts {
            request = request.param("max-parts", max.to_string());
        }
        let response = self.executor().execute(&request).await?;
        xml::from_xml(&response.body)
    }

    /// Every part of a session, following pagination to the end.
    pub async fn list_all_parts(&self, bucket: &str, key: &str, upload_id: &str) -> Result<Vec<xml::ListedPart>> {
        let mut parts = Vec::new();
        let mut marker = String::new();
        loop {
            let page = self
                .list_parts(bucket, key, upload_id, Some(&marker), Some(LIST_PARTS_PAGE))
                .await?;
            parts.extend(page.parts);
            if !page.is_truncated {
                return Ok(parts);
            }
            if page.next_part_number_marker.is_empty() || page.next_part_number_marker == marker {
                return Err(CosError::Decode(format!(
                    "part listing of {upload_id} is truncated but its marker does not advance"
                )));
            }
            marker = page.next_part_number_marker;
        }
    }

    /// One page of the bucket's unfinished sessions.
    pub async fn list_multipart_uploads(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        key_marker: Option<&str>,
        upload_id_marker: Option<&str>,
    ) -> Result<xml::ListMultipartUploadsResult> {
        let mut request = self.object_request(Method::Get, bucket, "").param("uploads", "");
        let optional = [("prefix", prefix), ("key-marker", key_marker), ("upload-id-marker", upload_id_marker)];
        for (name, value) in optional {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                request = request.param(name, value);
            }
        }
        let response = self.executor().execute(&request).await?;
        xml::from_xml(&response.body)
    }

    /// Unfinished sessions for exactly `key`, newest first.
    pub async fn list_uploads_for_key(&self, bucket: &str, key: &str) -> Result<Vec<xml::MultipartUpload>> {
        let mut uploads = Vec::new();
        let mut key_marker = String::new();
        let mut upload_id_marker = String::new();
        loop {
            let page = self
                .list_multipart_uploads(bucket, Some(key), Some(&key_marker), Some(&upload_id_marker))
                .await?;
            uploads.extend(page.uploads.into_iter().filter(|u| u.key == key));
            if !page.is_truncated {
                break;
            }
            if page.next_key_marker == key_marker && page.next_upload_id_marker == upload_id_marker {
                return Err(CosError::Decode("upload listing is truncated but its markers do not advance".into()));
            }
            key_marker = page.next_key_marker;
            upload_id_marker = page.next_upload_id_marker;
        }
        uploads.sort_by(|a, b| b.initiated.cmp(&a.initiated));
        Ok(uploads)
    }
}
