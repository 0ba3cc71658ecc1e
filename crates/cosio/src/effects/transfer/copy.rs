use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument};

use super::{TransferManager, join_wave, pool_size, spawn_transfer};
use crate::core::{Segment, plan_parts};
use crate::data::{CopySource, CosResult, PartRecord, PutOptions, TransferOutcome, UploadSession};
use crate::effects::handle::TransferHandle;
use crate::effects::transport::Transport;
use crate::error::{CosError, Result};

impl<T: Transport> TransferManager<T> {
    /// Copy `source` to the handle's bucket and key on the service side.
    ///
    /// Same-region objects up to the copy threshold take a single request;
    /// anything larger or cross-region is copied part by part into a new
    /// multipart session.
    #[instrument(skip_all, fields(bucket = handle.bucket(), key = handle.key(), source = %source.key))]
    pub async fn copy(
        &self,
        handle: &TransferHandle,
        source: &CopySource,
        options: &PutOptions,
    ) -> Result<TransferOutcome> {
        self.begin(handle)?;
        let result = self.run_copy(handle, source, options).await;
        self.finish(handle, result)
    }

    /// Start [`copy`](TransferManager::copy) in the background.
    pub fn start_copy(&self, handle: TransferHandle, source: CopySource, options: PutOptions) -> Arc<TransferHandle> {
        let manager = self.clone();
        spawn_transfer(Arc::new(handle), move |handle| async move {
            manager.copy(&handle, &source, &options).await
        })
    }

    async fn run_copy(
        &self,
        handle: &TransferHandle,
        source: &CopySource,
        options: &PutOptions,
    ) -> Result<TransferOutcome> {
        let client = self.client();
        let config = client.shared_config();

        let meta = client.head_source(source).await?;
        let total = meta.content_length;
        handle.set_total_size(total);

        let same_region = source.region(&config) == config.region;
        if total == 0 || (same_region && total <= config.copy_threshold) {
            debug!(bytes = total, "single-request copy");
            let put = client
                .put_object_copy(handle.bucket(), handle.key(), source, options)
                .await?;
            handle.update_progress(total);
            return Ok(TransferOutcome {
                etag: put.etag,
                bytes: total,
                result: CosResult::success(200, put.request_id),
                ..TransferOutcome::default()
            });
        }

        let plan = plan_parts(total, config.upload_copy_part_size)?;
        if !handle.should_continue() {
            return Err(CosError::Canceled);
        }
        let upload_id = client
            .initiate_multipart_upload(handle.bucket(), handle.key(), options)
            .await?;
        handle.set_upload_id(&upload_id);

        let session = UploadSession {
            bucket: handle.bucket().to_string(),
            key: handle.key().to_string(),
            upload_id,
            part_size: config.upload_copy_part_size,
            total_size: total,
        };
        info!(upload_id = %session.upload_id, parts = plan.len(), "copying in parts");

        let copy_source = source.header_value(&config);
        let parts = self.copy_parts(handle, &session, &copy_source, &plan).await;
        self.settle(handle, &session, parts, 0).await
    }

    async fn copy_parts(
        &self,
        handle: &TransferHandle,
        session: &UploadSession,
        copy_source: &str,
        plan: &[Segment],
    ) -> Result<Vec<PartRecord>> {
        let pool = pool_size(self.client().config().upload_pool_size, plan.len());
        let task = self
            .client()
            .part_task(&session.bucket, &session.key)
            .in_session(&session.upload_id);
        let copy_source: Arc<str> = Arc::from(copy_source);
        let mut records = Vec::with_capacity(plan.len());

        for wave in plan.chunks(pool) {
            if !handle.should_continue() {
                return Err(CosError::Canceled);
            }
            let mut set = JoinSet::new();
            for (slot, segment) in wave.iter().copied().enumerate() {
                let task = task.clone();
                let copy_source = Arc::clone(&copy_source);
                set.spawn(async move { (slot, task.copy_range(&copy_source, segment).await) });
            }

            for (_, record) in join_wave(set).await? {
                handle.update_progress(record.size);
                records.push(record);
            }
        }
        Ok(records)
    }
}
