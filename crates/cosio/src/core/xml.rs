//! XML documents exchanged with the object service.

use serde::{Deserialize, Serialize};

use crate::error::{CosError, Result, ServiceError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ErrorDocument {
    pub code:       String,
    pub message:    String,
    pub resource:   Option<String>,
    pub request_id: Option<String>,
    pub trace_id:   Option<String>,
}

impl ErrorDocument {
    pub fn into_service_error(self, status: u16, header_request_id: Option<&str>) -> ServiceError {
        ServiceError {
            status,
            code: self.code,
            message: self.message,
            request_id: header_request_id.map(str::to_string).or(self.request_id),
            trace_id: self.trace_id,
            resource: self.resource,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct InitiateMultipartUploadResult {
    pub bucket:    String,
    pub key:       String,
    pub upload_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompleteMultipartUpload {
    #[serde(rename = "Part")]
    pub parts: Vec<CompletedPart>,
}

impl CompleteMultipartUpload {
    pub fn to_xml(&self) -> Result<String> {
        quick_xml::se::to_string_with_root("CompleteMultipartUpload", self)
            .map_err(|e| CosError::Decode(format!("encode complete request: {e}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompleteMultipartUploadResult {
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Bucket")]
    pub bucket: String,
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "ETag")]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "LastModified")]
    pub last_modified: String,
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "Size")]
    pub size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListPartsResult {
    pub bucket:                  String,
    pub key:                     String,
    pub upload_id:               String,
    pub part_number_marker:      String,
    pub next_part_number_marker: String,
    pub max_parts:               String,
    pub is_truncated:            bool,
    #[serde(rename = "Part")]
    pub parts:                   Vec<ListedPart>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MultipartUpload {
    pub key:           String,
    pub upload_id:     String,
    pub storage_class: String,
    pub initiated:     String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ListMultipartUploadsResult {
    pub bucket:                String,
    pub prefix:                String,
    pub key_marker:            String,
    pub upload_id_marker:      String,
    pub next_key_marker:       String,
    pub next_upload_id_marker: String,
    pub is_truncated:          bool,
    #[serde(rename = "Upload")]
    pub uploads:               Vec<MultipartUpload>,
}

/// Body of both `CopyObjectResult` and `CopyPartResult`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CopyResult {
    #[serde(rename = "ETag")]
    pub etag: String,
    #[serde(rename = "LastModified")]
    pub last_modified: String,
    #[serde(rename = "CRC64")]
    pub crc64: Option<String>,
}

pub fn from_xml<T: for<'de> Deserialize<'de>>(body: &[u8]) -> Result<T> {
    let text = std::str::from_utf8(body).map_err(|e| CosError::Decode(format!("response is not UTF-8: {e}")))?;
    Ok(quick_xml::de::from_str(text)?)
}

/// Parse `body` as an `<Error>` document. Any other root element yields `None`.
pub fn parse_error_document(body: &[u8]) -> Option<ErrorDocument> {
    let text = std::str::from_utf8(body).ok()?.trim_start();
    let text = match text.strip_prefix("<?xml") {
        Some(rest) => rest.split_once("?>")?.1.trim_start(),
        None => text,
    };
    if !(text.starts_with("<Error>") || text.starts_with("<Error ")) {
        return None;
    }
    quick_xml::de::from_str(text).ok()
}
