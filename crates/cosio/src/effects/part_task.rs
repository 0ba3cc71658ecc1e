use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use cosio_verify::{Fingerprint, FingerprintKind, VerificationError};

use crate::core::{Segment, object_path, xml};
use crate::data::{
    CosRequest, CosResponse, HEADER_COPY_SOURCE, HEADER_COPY_SOURCE_RANGE, HEADER_CRC64, Method, PartRecord,
};
use crate::effects::executor::RequestExecutor;
use crate::effects::transport::Transport;
use crate::error::{CosError, Result};

/// A ranged GET that finished, with the buffer it was read into.
#[derive(Debug)]
pub struct DownloadedRange {
    pub segment:       Segment,
    pub bytes_written: u64,
    /// Holds exactly `bytes_written` bytes of the object starting at `segment.start`.
    pub buffer:        BytesMut,
}

/// The unit of work of a transfer: one part upload, one ranged download or
/// one part copy against a single object.
///
/// Every call runs through the executor's retry loop; a task never retries a
/// rejected (4xx) request.
pub struct PartTask<T> {
    executor:    Arc<RequestExecutor<T>>,
    host:        String,
    path:        String,
    upload_id:   Option<String>,
    fingerprint: FingerprintKind,
}

impl<T> Clone for PartTask<T> {
    fn clone(&self) -> Self {
        Self {
            executor:    Arc::clone(&self.executor),
            host:        self.host.clone(),
            path:        self.path.clone(),
            upload_id:   self.upload_id.clone(),
            fingerprint: self.fingerprint,
        }
    }
}

impl<T> fmt::Debug for PartTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartTask")
            .field("host", &self.host)
            .field("path", &self.path)
            .field("upload_id", &self.upload_id)
            .field("fingerprint", &self.fingerprint)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> PartTask<T> {
    /// `host` is the default domain of the object's bucket.
    pub fn new(executor: Arc<RequestExecutor<T>>, host: impl Into<String>, key: &str) -> Self {
        Self {
            executor,
            host: host.into(),
            path: object_path(key),
            upload_id: None,
            fingerprint: FingerprintKind::default(),
        }
    }

    #[must_use]
    pub fn in_session(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }

    #[must_use]
    pub fn fingerprint(mut self, kind: FingerprintKind) -> Self {
        self.fingerprint = kind;
        self
    }

    fn session(&self) -> Result<&str> {
        self.upload_id
            .as_deref()
            .ok_or_else(|| CosError::InvalidArgument("part task has no multipart session".into()))
    }

    fn part_request(&self, part_number: u32) -> Result<CosRequest> {
        Ok(CosRequest::new(Method::Put, &self.host, &self.path)
            .param("partNumber", part_number.to_string())
            .param("uploadId", self.session()?))
    }

    /// Upload `data` as part `part_number` and verify the service stored
    /// exactly these bytes.
    pub async fn upload_part(&self, part_number: u32, offset: u64, data: Bytes) -> Result<PartRecord> {
        let size = data.len() as u64;
        let expected = Fingerprint::compute(self.fingerprint, &data);
        let request = self.part_request(part_number)?.body(data);

        let response = self
            .executor
            .execute_verified(&request, |response| verify_part(part_number, &expected, response))
            .await?;

        Ok(PartRecord {
            part_number,
            etag: response.etag().unwrap_or_default().to_string(),
            size,
            offset,
        })
    }

    /// Read `segment` of the object into `buffer`, replacing its contents.
    /// At most `buffer.capacity()` bytes are kept.
    pub async fn download_range(&self, segment: Segment, mut buffer: BytesMut) -> Result<DownloadedRange> {
        let request = CosRequest::new(Method::Get, &self.host, &self.path).header("Range", segment.range_header());
        let response = self
            .executor
            .execute_verified(&request, |response| range_payload(segment, response).map(|_| ()))
            .await?;

        let payload = range_payload(segment, &response)?;
        // Never grow the slot past the capacity it was handed out with.
        let len = payload.len().min(buffer.capacity());
        buffer.clear();
        buffer.extend_from_slice(&payload[..len]);
        Ok(DownloadedRange {
            segment,
            bytes_written: len as u64,
            buffer,
        })
    }

    /// Copy `segment` of `copy_source` (an `x-cos-copy-source` value) into
    /// part `segment.part_number()` of the session.
    pub async fn copy_range(&self, copy_source: &str, segment: Segment) -> Result<PartRecord> {
        let part_number = segment.part_number();
        let request = self
            .part_request(part_number)?
            .header(HEADER_COPY_SOURCE, copy_source)
            .header(HEADER_COPY_SOURCE_RANGE, segment.range_header())
            .check_body();

        let response = self
            .executor
            .execute_verified(&request, |response| copy_etag(part_number, response).map(|_| ()))
            .await?;

        Ok(PartRecord {
            part_number,
            etag: copy_etag(part_number, &response)?,
            size: segment.len(),
            offset: segment.start,
        })
    }
}

fn verify_part(part_number: u32, expected: &Fingerprint, response: &CosResponse) -> Result<()> {
    let context = || format!("part {part_number}");
    let etag = response
        .etag()
        .filter(|etag| !etag.is_empty())
        .ok_or_else(|| CosError::Decode(format!("{} response has no ETag", context())))?;

    let reported = match expected.kind() {
        FingerprintKind::Crc64 => response.header(HEADER_CRC64),
        FingerprintKind::Md5 => Some(etag),
    };
    let Some(reported) = reported else {
        return Err(CosError::ChecksumMismatch {
            context:  context(),
            expected: expected.to_string(),
            actual:   "<missing>".into(),
        });
    };

    expected.verify(reported).map_err(|e| match e {
        VerificationError::Mismatch { expected, actual } => CosError::ChecksumMismatch {
            context: context(),
            expected,
            actual,
        },
        other => CosError::Decode(format!("{}: {other}", context())),
    })
}

/// The bytes of `segment` carried by a ranged GET response.
///
/// A `200` carrying the whole object is sliced down to the segment; a body
/// longer than the segment is truncated; a shorter one is a length mismatch.
fn range_payload(segment: Segment, response: &CosResponse) -> Result<&[u8]> {
    let body = &response.body[..];
    let payload = match response.status {
        206 => body,
        200 if body.len() as u64 >= segment.end => &body[segment.start as usize..],
        200 => body,
        status => {
            return Err(CosError::Decode(format!("ranged read answered with status {status}")));
        }
    };

    let wanted = segment.len();
    if (payload.len() as u64) < wanted {
        return Err(CosError::LengthMismatch {
            context:  format!("range {}", segment.range_header()),
            expected: wanted,
            actual:   payload.len() as u64,
        });
    }
    Ok(&payload[..wanted as usize])
}

fn copy_etag(part_number: u32, response: &CosResponse) -> Result<String> {
    let result: xml::CopyResult = xml::from_xml(&response.body)?;
    let etag = result.etag.trim_matches('"');
    if etag.is_empty() {
        return Err(CosError::Decode(format!("copy of part {part_number} returned no ETag")));
    }
    Ok(etag.to_string())
}
