use std::path::Path;

use cosio_verify::FingerprintKind;
use tracing::{debug, info, warn};

use super::TransferManager;
use crate::core::{Segment, xml};
use crate::data::ResumeTable;
use crate::effects::digest::file_fingerprint;
use crate::effects::transport::Transport;
use crate::error::Result;

impl<T: Transport> TransferManager<T> {
    /// Find an interrupted session for `key` whose parts all match the
    /// local file, newest session first.
    ///
    /// A candidate is adopted only when every listed part is a part of `plan`
    /// with the planned size and the MD5 of its local range equals its ETag.
    /// Listing failures are treated as "nothing to resume".
    pub(super) async fn find_resumable(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        plan: &[Segment],
    ) -> Option<(String, ResumeTable)> {
        let uploads = match self.client().list_uploads_for_key(bucket, key).await {
            Ok(uploads) => uploads,
            Err(e) => {
                warn!(bucket, key, error = %e, "cannot list multipart sessions, starting a new one");
                return None;
            }
        };

        for upload in uploads {
            let parts = match self.client().list_all_parts(bucket, key, &upload.upload_id).await {
                Ok(parts) => parts,
                Err(e) => {
                    warn!(upload_id = %upload.upload_id, error = %e, "cannot list parts of session");
                    continue;
                }
            };
            match reconcile(path, plan, &parts).await {
                Ok(Some(table)) => {
                    info!(upload_id = %upload.upload_id, parts = table.len(), "resuming multipart session");
                    return Some((upload.upload_id, table));
                }
                Ok(None) => debug!(upload_id = %upload.upload_id, "session does not match local file"),
                Err(e) => warn!(upload_id = %upload.upload_id, error = %e, "cannot verify session against local file"),
            }
        }
        None
    }
}

/// Verify `parts` against the local file; `None` when any part disagrees.
async fn reconcile(path: &Path, plan: &[Segment], parts: &[xml::ListedPart]) -> Result<Option<ResumeTable>> {
    let mut table = ResumeTable::new();
    for part in parts {
        let Some(segment) = plan_segment(plan, part.part_number) else {
            debug!(part = part.part_number, "part number outside the plan");
            return Ok(None);
        };
        if part.size != segment.len() {
            debug!(part = part.part_number, remote = part.size, local = segment.len(), "part size differs");
            return Ok(None);
        }

        let etag = part.etag.trim_matches('"');
        let local = file_fingerprint(path, segment.start, segment.len(), FingerprintKind::Md5).await?;
        if local.verify(etag).is_err() {
            debug!(part = part.part_number, "part content differs");
            return Ok(None);
        }
        table.insert(part.part_number, etag);
    }
    Ok(Some(table))
}

fn plan_segment(plan: &[Segment], part_number: u32) -> Option<Segment> {
    let index = usize::try_from(part_number.checked_sub(1)?).ok()?;
    plan.get(index).copied()
}
