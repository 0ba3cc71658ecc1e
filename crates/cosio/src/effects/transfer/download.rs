use std::io::SeekFrom;
use std::sync::Arc;

use cosio_verify::{Fingerprint, FingerprintKind};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use super::{BufferArena, TransferManager, join_wave, pool_size, spawn_transfer};
use crate::core::fixed_segments;
use crate::data::{CosResult, TransferOutcome};
use crate::effects::digest::file_fingerprint;
use crate::effects::handle::TransferHandle;
use crate::effects::transport::Transport;
use crate::error::{CosError, Result};

impl<T: Transport> TransferManager<T> {
    /// Download the handle's object into its local path with concurrent
    /// ranged reads.
    ///
    /// The file is pre-sized and every range is written at its own offset. A
    /// failed download leaves the partial file in place.
    #[instrument(skip_all, fields(bucket = handle.bucket(), key = handle.key()))]
    pub async fn download(&self, handle: &TransferHandle) -> Result<TransferOutcome> {
        self.begin(handle)?;
        let result = self.run_download(handle).await;
        self.finish(handle, result)
    }

    /// Start [`download`](TransferManager::download) in the background.
    pub fn start_download(&self, handle: TransferHandle) -> Arc<TransferHandle> {
        let manager = self.clone();
        spawn_transfer(Arc::new(handle), move |handle| async move { manager.download(&handle).await })
    }

    async fn run_download(&self, handle: &TransferHandle) -> Result<TransferOutcome> {
        let path = handle
            .path()
            .ok_or_else(|| CosError::InvalidArgument("download needs a local path".into()))?;
        let client = self.client();
        let config = client.shared_config();

        let meta = client.head_object(handle.bucket(), handle.key()).await?;
        let total = meta.content_length;
        handle.set_total_size(total);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .await?;
        file.set_len(total).await?;

        let plan = fixed_segments(total, config.download_slice_size)?;
        let pool = pool_size(config.download_pool_size, plan.len());
        let mut arena = BufferArena::new(pool, config.download_slice_size.min(total) as usize);
        let task = client.part_task(handle.bucket(), handle.key());
        info!(bytes = total, slices = plan.len(), pool, "downloading");

        let mut written = 0u64;
        for wave in plan.chunks(pool) {
            if !handle.should_continue() {
                return Err(CosError::Canceled);
            }
            let mut set = JoinSet::new();
            for (slot, segment) in wave.iter().copied().enumerate() {
                let buffer = arena.take(slot);
                let task = task.clone();
                set.spawn(async move { (slot, task.download_range(segment, buffer).await) });
            }

            for (slot, range) in join_wave(set).await? {
                file.seek(SeekFrom::Start(range.segment.start)).await?;
                file.write_all(&range.buffer).await?;
                written += range.bytes_written;
                handle.update_progress(range.bytes_written);
                arena.put(slot, range.buffer);
            }
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if written != total {
            return Err(CosError::LengthMismatch {
                context:  format!("download of {}", handle.key()),
                expected: total,
                actual:   written,
            });
        }

        if config.check_crc64
            && let Some(expected) = meta.crc64
        {
            let actual = file_fingerprint(path, 0, total, FingerprintKind::Crc64).await?;
            if actual != Fingerprint::Crc64(expected) {
                return Err(CosError::ChecksumMismatch {
                    context:  format!("download of {}", handle.key()),
                    expected: expected.to_string(),
                    actual:   actual.to_string(),
                });
            }
            debug!(crc64 = expected, "download verified");
        }

        Ok(TransferOutcome {
            etag: meta.etag,
            bytes: written,
            result: CosResult::success(200, meta.request_id),
            ..TransferOutcome::default()
        })
    }
}
