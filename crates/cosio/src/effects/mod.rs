//! I/O: the transport seam, the retrying executor, part tasks, transfer
//! handles and the client operations built on them.

mod client;
mod digest;
mod executor;
mod handle;
mod multipart;
mod object;
mod part_task;
mod presign;
mod stream_copy;
mod transfer;
mod transport;

pub use client::CosClient;
pub use digest::file_fingerprint;
pub use executor::RequestExecutor;
pub use handle::{DoneCallback, ProgressCallback, TransferHandle};
pub use part_task::{DownloadedRange, PartTask};
pub use stream_copy::copy_with_handle;
pub use transfer::TransferManager;
#[cfg(feature = "reqwest")]
pub use transport::{ReqwestTransport, ReqwestTransportError};
pub use transport::{HttpRequest, Transport};
