//! Object-storage client for COS with a concurrent, resumable multipart
//! transfer engine.
//!
//! # Architecture
//!
//! This crate follows the three-layer pattern:
//! - `data` - Immutable configuration and value types
//! - `core` - Pure transformations: retry and fail-over decisions, part plans, XML
//! - `effects` - I/O behind the [`Transport`] trait
//!
//! # Key Features
//!
//! - **Verified parts**: every uploaded part is checked against the CRC64 or MD5 the service reports
//! - **Resumable uploads**: interrupted sessions are adopted only when every part matches the local file
//! - **Bounded concurrency**: parts run in waves of at most `pool` tasks with reusable buffers
//! - **Cooperative cancellation**: a canceled upload keeps its session for a later resume or abort
//!
//! # Example
//!
//! ```no_run
//! use cosio::{CosClient, CosConfig, PutOptions, TransferHandle};
//!
//! # async fn run() -> cosio::Result<()> {
//! let config = CosConfig::load("cos.toml")?;
//! let client = CosClient::from_config(config)?;
//! let manager = client.transfer_manager();
//!
//! let handle = TransferHandle::new("media-1250000000", "videos/intro.mp4")
//!     .local_path("intro.mp4")
//!     .on_progress(|done, total| println!("{done}/{total}"));
//! let outcome = manager.upload(&handle, &PutOptions::default()).await?;
//! println!("stored with etag {:?}", outcome.etag);
//! # Ok(())
//! # }
//! ```

mod core;
mod data;
mod effects;
mod error;

pub use self::core::{
    CompleteMultipartUploadResult, ListMultipartUploadsResult, ListPartsResult, ListedPart, MultipartUpload, Segment,
    backup_host, default_host, fixed_segments, object_path, plan_parts, retry_delay,
};
pub use data::{
    Backoff, CopySource, CosConfig, CosRequest, CosResponse, CosResult, DomainPolicy, GIB, HEADER_COPY_SOURCE,
    HEADER_COPY_SOURCE_RANGE, HEADER_CRC64, HEADER_REQUEST_ID, HEADER_SECURITY_TOKEN, KIB, MAX_PART_NUMBER, MIB,
    Method, ObjectMeta, PartRecord, PutOptions, PutOutcome, RequestBody, ResumeTable, RetryPolicy, TransferOutcome,
    TransferState, UploadSession,
};
pub use effects::{
    CosClient, DoneCallback, DownloadedRange, HttpRequest, PartTask, ProgressCallback, RequestExecutor,
    TransferHandle, TransferManager, Transport, copy_with_handle, file_fingerprint,
};
#[cfg(feature = "reqwest")]
pub use effects::{ReqwestTransport, ReqwestTransportError};
pub use error::{CosError, Result, ServiceError};

pub use cosio_sign::{CosSigner, Credentials, RequestSigner, SignRequest};
pub use cosio_verify::{Fingerprint, FingerprintKind};
