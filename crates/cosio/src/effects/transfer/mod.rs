//! Multipart transfers: resumable upload, sliced download and server-side copy.
//!
//! Each transfer runs its parts in waves of at most `pool` spawned tasks. A
//! wave is joined completely before its results are inspected, and only the
//! coordinator touches the part records and the resume table.

mod copy;
mod download;
mod resume;
mod upload;

use std::io::SeekFrom;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::core::Segment;
use crate::data::{CosResult, PartRecord, TransferOutcome, TransferState, UploadSession, total_size};
use crate::effects::client::CosClient;
use crate::effects::handle::TransferHandle;
use crate::effects::transport::Transport;
use crate::error::{CosError, Result};

/// Runs uploads, downloads and copies against one client.
pub struct TransferManager<T> {
    client: CosClient<T>,
}

impl<T> Clone for TransferManager<T> {
    fn clone(&self) -> Self { Self { client: self.client.clone() } }
}

impl<T> std::fmt::Debug for TransferManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferManager").field("client", &self.client).finish()
    }
}

impl<T: Transport> TransferManager<T> {
    pub fn new(client: CosClient<T>) -> Self { Self { client } }

    pub fn client(&self) -> &CosClient<T> { &self.client }

    /// Abort the session a canceled upload left behind and mark the handle
    /// `Aborted`.
    pub async fn abort_canceled(&self, handle: &TransferHandle) -> Result<()> {
        if handle.status() != TransferState::Canceled {
            return Err(CosError::InvalidArgument(format!(
                "only a canceled transfer can be aborted, this one is {}",
                handle.status()
            )));
        }
        let upload_id = handle
            .upload_id()
            .ok_or_else(|| CosError::InvalidArgument("canceled transfer has no multipart session".into()))?;

        self.client
            .abort_multipart_upload(handle.bucket(), handle.key(), &upload_id)
            .await?;
        handle.update_status(TransferState::Aborted, Some(CosResult::success(204, None)));
        Ok(())
    }

    /// Move `handle` into `InProgress`. A handle that already reached a
    /// terminal state is refused and left as it is.
    fn begin(&self, handle: &TransferHandle) -> Result<()> {
        let status = handle.status();
        if status.is_terminal() {
            return Err(CosError::InvalidArgument(format!(
                "transfer handle already finished as {status}, start a new one to resume"
            )));
        }
        handle.update_status(TransferState::InProgress, None);
        Ok(())
    }

    /// Move `handle` into the terminal state matching `result`.
    fn finish(&self, handle: &TransferHandle, result: Result<TransferOutcome>) -> Result<TransferOutcome> {
        match &result {
            Ok(outcome) => {
                handle.update_status(TransferState::Completed, Some(outcome.result.clone()));
            }
            Err(e) if e.is_canceled() => {
                debug!(bucket = handle.bucket(), key = handle.key(), "transfer canceled");
                handle.update_status(TransferState::Canceled, Some(CosResult::failure(e)));
            }
            Err(e) => {
                warn!(bucket = handle.bucket(), key = handle.key(), error = %e, "transfer failed");
                handle.update_status(TransferState::Failed, Some(CosResult::failure(e)));
            }
        }
        result
    }

    /// Best-effort abort of a session whose transfer failed.
    async fn abort_quietly(&self, session: &UploadSession) {
        if let Err(e) = self
            .client
            .abort_multipart_upload(&session.bucket, &session.key, &session.upload_id)
            .await
        {
            warn!(upload_id = %session.upload_id, error = %e, "could not abort multipart session");
        }
    }

    /// Settle a session after its parts ran: complete it when every part
    /// succeeded, abort it on failure unless the failure is a cancellation.
    ///
    /// A cancel that lands during the last wave still wins; the session is
    /// kept with all of its parts instead of being completed.
    async fn settle(
        &self,
        handle: &TransferHandle,
        session: &UploadSession,
        parts: Result<Vec<PartRecord>>,
        resumed_parts: usize,
    ) -> Result<TransferOutcome> {
        let records = match parts {
            Ok(records) => records,
            Err(e) if e.is_canceled() => return Err(e),
            Err(e) => {
                self.abort_quietly(session).await;
                return Err(e);
            }
        };
        if !handle.should_continue() {
            return Err(CosError::Canceled);
        }

        let assembled = total_size(&records);
        if assembled != session.total_size {
            self.abort_quietly(session).await;
            return Err(CosError::LengthMismatch {
                context:  format!("parts of {}", session.upload_id),
                expected: session.total_size,
                actual:   assembled,
            });
        }

        match self
            .client
            .complete_multipart_upload(&session.bucket, &session.key, &session.upload_id, &records)
            .await
        {
            Ok(put) => Ok(TransferOutcome {
                etag: put.etag,
                upload_id: Some(session.upload_id.clone()),
                resumed_parts,
                bytes: session.total_size,
                result: CosResult::success(200, put.request_id),
            }),
            Err(e) => {
                self.abort_quietly(session).await;
                Err(e)
            }
        }
    }
}

/// Join every task of a wave; results come back in slot order.
///
/// Fails with the error of the lowest failing slot. A panicked task counts as
/// a failure ranked after every slot.
async fn join_wave<R: Send + 'static>(mut set: JoinSet<(usize, Result<R>)>) -> Result<Vec<(usize, R)>> {
    let mut done = Vec::with_capacity(set.len());
    let mut failure: Option<(usize, CosError)> = None;

    while let Some(joined) = set.join_next().await {
        let (slot, result) = match joined {
            Ok(output) => output,
            Err(e) => (usize::MAX, Err(CosError::TaskPanicked(e.to_string()))),
        };
        match result {
            Ok(value) => done.push((slot, value)),
            Err(e) => {
                if failure.as_ref().is_none_or(|(first, _)| slot < *first) {
                    failure = Some((slot, e));
                }
            }
        }
    }

    if let Some((_, e)) = failure {
        return Err(e);
    }
    done.sort_by_key(|(slot, _)| *slot);
    Ok(done)
}

/// Per-transfer part buffers, one slot per pool worker.
///
/// Upload slots hand out frozen views of their storage and take it back on
/// the next fill once the previous wave has dropped its views. Download slots
/// are lent to the task and handed back with its result.
#[derive(Debug)]
struct BufferArena {
    slots: Vec<BytesMut>,
}

impl BufferArena {
    fn new(pool: usize, slot_size: usize) -> Self {
        Self {
            slots: (0..pool).map(|_| BytesMut::with_capacity(slot_size)).collect(),
        }
    }

    /// Read `segment` of `source` into `slot`.
    async fn fill<R>(&mut self, slot: usize, source: &mut R, segment: Segment) -> Result<Bytes>
    where
        R: AsyncRead + AsyncSeek + Unpin,
    {
        let buffer = &mut self.slots[slot];
        buffer.clear();
        buffer.resize(segment.len() as usize, 0);
        source.seek(SeekFrom::Start(segment.start)).await?;
        source.read_exact(&mut buffer[..]).await?;
        Ok(buffer.split().freeze())
    }

    fn take(&mut self, slot: usize) -> BytesMut { std::mem::take(&mut self.slots[slot]) }

    fn put(&mut self, slot: usize, buffer: BytesMut) { self.slots[slot] = buffer; }
}

/// Tasks per wave: the configured pool, never more than there are parts.
fn pool_size(configured: usize, parts: usize) -> usize { configured.min(parts).max(1) }

/// Spawn the transfer built by `run` and return the handle it reports to.
fn spawn_transfer<F>(handle: Arc<TransferHandle>, run: impl FnOnce(Arc<TransferHandle>) -> F) -> Arc<TransferHandle>
where
    F: std::future::Future<Output = Result<TransferOutcome>> + Send + 'static,
{
    tokio::spawn(run(Arc::clone(&handle)));
    handle
}
