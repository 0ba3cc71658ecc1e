//! Immutable configuration and value types.

mod config;
mod object;
mod part;
mod request;
mod result;
mod state;

pub use config::{Backoff, CosConfig, DomainPolicy, GIB, KIB, MAX_PART_NUMBER, MIB, RetryPolicy};
pub use object::{CopySource, ObjectMeta, PutOptions, PutOutcome, TransferOutcome};
pub use part::{PartRecord, ResumeTable, UploadSession, total_size};
pub use request::{
    CosRequest, CosResponse, HEADER_COPY_SOURCE, HEADER_COPY_SOURCE_RANGE, HEADER_CRC64, HEADER_REQUEST_ID,
    HEADER_SECURITY_TOKEN, Method, RequestBody,
};
pub use result::CosResult;
pub use state::TransferState;
