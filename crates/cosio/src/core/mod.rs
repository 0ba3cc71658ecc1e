//! Pure transformations: retry and fail-over decisions, part planning,
//! host resolution and the XML documents of the multipart protocol.

mod host;
mod retry;
mod segment;
pub mod xml;

pub use host::{backup_host, default_host, is_default_domain, object_path, object_url};
pub use retry::{Disposition, classify, is_redirect, retry_delay, should_fail_over};
pub use segment::{Segment, fixed_segments, plan_parts};
pub use xml::{CompleteMultipartUploadResult, ListMultipartUploadsResult, ListPartsResult, ListedPart, MultipartUpload};
