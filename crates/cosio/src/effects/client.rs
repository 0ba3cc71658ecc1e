use std::fmt;
use std::sync::Arc;

use crate::core::object_path;
use crate::data::{CosConfig, CosRequest, Method};
use crate::effects::executor::RequestExecutor;
use crate::effects::part_task::PartTask;
use crate::effects::transfer::TransferManager;
use crate::effects::transport::Transport;
use crate::error::Result;

/// Entry point: single-shot object operations, multipart primitives and
/// presigned URLs over one shared [`RequestExecutor`].
///
/// Cloning is cheap; clones share the executor and configuration.
pub struct CosClient<T> {
    executor: Arc<RequestExecutor<T>>,
    config:   Arc<CosConfig>,
}

impl<T> Clone for CosClient<T> {
    fn clone(&self) -> Self {
        Self {
            executor: Arc::clone(&self.executor),
            config:   Arc::clone(&self.config),
        }
    }
}

impl<T> fmt::Debug for CosClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosClient")
            .field("region", &self.config.region)
            .field("executor", &self.executor)
            .finish()
    }
}

impl<T: Transport> CosClient<T> {
    /// Normalizes `config` and builds the executor over `transport`.
    pub fn new(config: CosConfig, transport: T) -> Result<Self> {
        let config = config.normalized()?;
        let executor = RequestExecutor::new(transport, &config);
        Ok(Self::with_executor(config, executor))
    }

    /// Use a pre-built executor, e.g. one with a custom signer.
    pub fn with_executor(config: CosConfig, executor: RequestExecutor<T>) -> Self {
        Self {
            executor: Arc::new(executor),
            config:   Arc::new(config),
        }
    }

    pub fn config(&self) -> &CosConfig { &self.config }

    pub fn executor(&self) -> &Arc<RequestExecutor<T>> { &self.executor }

    pub fn transfer_manager(&self) -> TransferManager<T> { TransferManager::new(self.clone()) }

    pub(crate) fn shared_config(&self) -> Arc<CosConfig> { Arc::clone(&self.config) }

    /// A request for `key` addressed to the default domain of `bucket`.
    pub(crate) fn object_request(&self, method: Method, bucket: &str, key: &str) -> CosRequest {
        CosRequest::new(method, self.config.host(bucket), object_path(key))
    }

    pub(crate) fn part_task(&self, bucket: &str, key: &str) -> PartTask<T> {
        PartTask::new(Arc::clone(&self.executor), self.config.host(bucket), key)
            .fingerprint(self.config.fingerprint_kind())
    }
}

#[cfg(feature = "reqwest")]
impl CosClient<crate::effects::transport::ReqwestTransport> {
    /// Build a client over a reqwest transport configured from `config`.
    pub fn from_config(config: CosConfig) -> Result<Self> {
        let config = config.normalized()?;
        let transport = crate::effects::transport::ReqwestTransport::new(&config)?;
        Self::new(config, transport)
    }
}
