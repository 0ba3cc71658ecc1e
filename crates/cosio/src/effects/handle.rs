use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::data::{CosResult, TransferState};

/// Invoked with `(transferred, total)` after every progress update.
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Invoked once when the transfer enters a terminal state, before the
/// state is published. The target state is passed explicitly.
pub type DoneCallback = Arc<dyn Fn(&TransferHandle, TransferState) + Send + Sync>;

#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    transferred: u64,
    total:       u64,
}

/// Shared, observable state of one transfer.
///
/// The coordinator drives it; callers watch progress, cancel, and wait for a
/// terminal state. Progress and status are guarded independently so progress
/// updates never contend with state transitions.
pub struct TransferHandle {
    bucket:      String,
    key:         String,
    local_path:  Option<PathBuf>,
    progress:    Mutex<Progress>,
    status:      watch::Sender<TransferState>,
    transition:  Mutex<()>,
    canceled:    AtomicBool,
    upload_id:   Mutex<Option<String>>,
    result:      Mutex<Option<CosResult>>,
    on_progress: Option<ProgressCallback>,
    on_done:     Option<DoneCallback>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

impl TransferHandle {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        let (status, _) = watch::channel(TransferState::NotStarted);
        Self {
            bucket: bucket.into(),
            key: key.into(),
            local_path: None,
            progress: Mutex::default(),
            status,
            transition: Mutex::new(()),
            canceled: AtomicBool::new(false),
            upload_id: Mutex::new(None),
            result: Mutex::new(None),
            on_progress: None,
            on_done: None,
        }
    }

    #[must_use]
    pub fn local_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn total_size(self, total: u64) -> Self {
        self.set_total_size(total);
        self
    }

    #[must_use]
    pub fn on_progress(mut self, callback: impl Fn(u64, u64) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn on_done(mut self, callback: impl Fn(&TransferHandle, TransferState) + Send + Sync + 'static) -> Self {
        self.on_done = Some(Arc::new(callback));
        self
    }

    pub fn bucket(&self) -> &str { &self.bucket }

    pub fn key(&self) -> &str { &self.key }

    pub fn path(&self) -> Option<&Path> { self.local_path.as_deref() }

    pub fn total(&self) -> u64 { lock(&self.progress).total }

    pub fn set_total_size(&self, total: u64) {
        let mut progress = lock(&self.progress);
        progress.total = total.max(progress.transferred);
    }

    /// Bytes transferred so far; never decreases and never exceeds the total.
    pub fn progress(&self) -> u64 { lock(&self.progress).transferred }

    pub fn update_progress(&self, delta: u64) {
        let snapshot = {
            let mut progress = lock(&self.progress);
            progress.transferred = progress.transferred.saturating_add(delta).min(progress.total);
            *progress
        };
        if let Some(callback) = &self.on_progress {
            callback(snapshot.transferred, snapshot.total);
        }
    }

    pub fn status(&self) -> TransferState { *self.status.borrow() }

    pub fn status_string(&self) -> &'static str { self.status().as_str() }

    /// Move to `next` if the transition is legal; returns whether it was applied.
    ///
    /// Entering a terminal state stores `result` (when given) and runs the
    /// done callback before waiters observe the new state. The callback must
    /// not call `update_status` itself.
    pub fn update_status(&self, next: TransferState, result: Option<CosResult>) -> bool {
        let _transition = lock(&self.transition);
        let current = self.status();
        if !current.can_transition_to(next) {
            debug!(bucket = %self.bucket, key = %self.key, %current, %next, "ignoring illegal transition");
            return false;
        }

        if next.is_terminal() && next != current {
            if let Some(result) = result {
                *lock(&self.result) = Some(result);
            }
            if let Some(callback) = &self.on_done {
                callback(self, next);
            }
        }

        self.status.send_replace(next);
        true
    }

    /// Ask the transfer to stop at its next chunk, part or wave boundary.
    pub fn cancel(&self) { self.canceled.store(true, Ordering::SeqCst); }

    pub fn should_continue(&self) -> bool { !self.canceled.load(Ordering::SeqCst) }

    /// Wait until the transfer reaches a terminal state and return it.
    pub async fn wait_until_finish(&self) -> TransferState {
        let mut receiver = self.status.subscribe();
        match receiver.wait_for(|state| state.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.status(),
        }
    }

    pub fn upload_id(&self) -> Option<String> { lock(&self.upload_id).clone() }

    pub fn set_upload_id(&self, upload_id: impl Into<String>) { *lock(&self.upload_id) = Some(upload_id.into()); }

    /// Final result, available once a terminal state has been entered.
    pub fn result(&self) -> Option<CosResult> { lock(&self.result).clone() }
}

impl fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferHandle")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("local_path", &self.local_path)
            .field("progress", &self.progress())
            .field("total", &self.total())
            .field("status", &self.status())
            .field("on_progress", &self.on_progress.as_ref().map(|_| "{ ... }"))
            .field("on_done", &self.on_done.as_ref().map(|_| "{ ... }"))
            .finish()
    }
}
