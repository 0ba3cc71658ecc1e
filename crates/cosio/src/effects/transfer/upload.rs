use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use super::{BufferArena, TransferManager, join_wave, pool_size, spawn_transfer};
use crate::core::{Segment, plan_parts};
use crate::data::{CosResult, PartRecord, PutOptions, ResumeTable, TransferOutcome, UploadSession};
use crate::effects::handle::TransferHandle;
use crate::effects::transport::Transport;
use crate::error::{CosError, Result};

impl<T: Transport> TransferManager<T> {
    /// Upload the handle's local file to its bucket and key.
    ///
    /// Large files go through a multipart session, resuming a compatible
    /// interrupted one when resumable uploads are enabled. The handle ends in
    /// `Completed`, `Failed` or `Canceled`; a canceled session is kept so the
    /// upload can be resumed or [aborted](TransferManager::abort_canceled).
    /// Resuming takes a fresh handle; one that already finished is refused.
    #[instrument(skip_all, fields(bucket = handle.bucket(), key = handle.key()))]
    pub async fn upload(&self, handle: &TransferHandle, options: &PutOptions) -> Result<TransferOutcome> {
        self.begin(handle)?;
        let result = self.run_upload(handle, options).await;
        self.finish(handle, result)
    }

    /// Start [`upload`](TransferManager::upload) in the background.
    pub fn start_upload(&self, handle: TransferHandle, options: PutOptions) -> Arc<TransferHandle> {
        let manager = self.clone();
        spawn_transfer(Arc::new(handle), move |handle| async move { manager.upload(&handle, &options).await })
    }

    async fn run_upload(&self, handle: &TransferHandle, options: &PutOptions) -> Result<TransferOutcome> {
        let path = handle
            .path()
            .ok_or_else(|| CosError::InvalidArgument("upload needs a local path".into()))?;
        let total = tokio::fs::metadata(path).await?.len();
        handle.set_total_size(total);

        let client = self.client();
        if total == 0 {
            let put = client
                .put_object(handle.bucket(), handle.key(), Bytes::new(), options)
                .await?;
            return Ok(TransferOutcome {
                etag: put.etag,
                result: CosResult::success(200, put.request_id),
                ..TransferOutcome::default()
            });
        }

        let config = client.shared_config();
        let plan = plan_parts(total, config.upload_part_size)?;
        if !handle.should_continue() {
            return Err(CosError::Canceled);
        }

        let resumed = if config.resumable_upload {
            self.find_resumable(handle.bucket(), handle.key(), path, &plan).await
        } else {
            None
        };
        let (upload_id, table) = match resumed {
            Some(found) => found,
            None => {
                let id = client
                    .initiate_multipart_upload(handle.bucket(), handle.key(), options)
                    .await?;
                (id, ResumeTable::new())
            }
        };
        handle.set_upload_id(&upload_id);

        let session = UploadSession {
            bucket: handle.bucket().to_string(),
            key: handle.key().to_string(),
            upload_id,
            part_size: config.upload_part_size,
            total_size: total,
        };
        info!(upload_id = %session.upload_id, parts = plan.len(), resumed = table.len(), "uploading");

        let parts = self.upload_parts(handle, &session, path, &plan, &table).await;
        self.settle(handle, &session, parts, table.len()).await
    }

    async fn upload_parts(
        &self,
        handle: &TransferHandle,
        session: &UploadSession,
        path: &Path,
        plan: &[Segment],
        table: &ResumeTable,
    ) -> Result<Vec<PartRecord>> {
        let mut records = Vec::with_capacity(plan.len());
        let mut pending = Vec::with_capacity(plan.len());
        for segment in plan {
            match table.get(segment.part_number()) {
                Some(etag) => {
                    records.push(PartRecord {
                        part_number: segment.part_number(),
                        etag: etag.to_string(),
                        size: segment.len(),
                        offset: segment.start,
                    });
                    handle.update_progress(segment.len());
                }
                None => pending.push(*segment),
            }
        }

        let pool = pool_size(self.client().config().upload_pool_size, pending.len());
        let mut arena = BufferArena::new(pool, session.part_size.min(session.total_size) as usize);
        let mut file = tokio::fs::File::open(path).await?;
        let task = self
            .client()
            .part_task(&session.bucket, &session.key)
            .in_session(&session.upload_id);

        for wave in pending.chunks(pool) {
            if !handle.should_continue() {
                return Err(CosError::Canceled);
            }
            let mut set = JoinSet::new();
            for (slot, segment) in wave.iter().copied().enumerate() {
                let data = arena.fill(slot, &mut file, segment).await?;
                let task = task.clone();
                set.spawn(async move { (slot, task.upload_part(segment.part_number(), segment.start, data).await) });
            }

            for (_, record) in join_wave(set).await? {
                debug!(part = record.part_number, etag = %record.etag, "part uploaded");
                handle.update_progress(record.size);
                records.push(record);
            }
        }

        records.sort_by_key(|r| r.part_number);
        Ok(records)
    }
}
