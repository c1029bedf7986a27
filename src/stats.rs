use serde::Serialize;

use crate::error::StoreResult;
use crate::model::{Upload, UploadStatus};
use crate::store::UploadStore;

pub const RECENT_UPLOADS: usize = 5;

/// Aggregate counters over every recorded upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStats {
    pub total_files: usize,
    /// Sum of `total_rows` across uploads, whatever their status.
    pub total_records: usize,
    pub completed_uploads: usize,
    pub failed_uploads: usize,
    pub somatometria_records: usize,
    pub recent_uploads: Vec<Upload>,
}

pub fn compute<S: UploadStore + ?Sized>(store: &S) -> StoreResult<UploadStats> {
    let uploads = store.list_uploads(None)?;
    let mut stats = summarize(&uploads);
    stats.somatometria_records = store.count_somatometria()?;
    Ok(stats)
}

/// Summarizes uploads already ordered newest first.
pub fn summarize(uploads: &[Upload]) -> UploadStats {
    let count_status = |status: UploadStatus| uploads.iter().filter(|u| u.status == status).count();
    UploadStats {
        total_files: uploads.len(),
        total_records: uploads.iter().map(|u| u.total_rows).sum(),
        completed_uploads: count_status(UploadStatus::Completed),
        failed_uploads: count_status(UploadStatus::Error),
        somatometria_records: 0,
        recent_uploads: uploads.iter().take(RECENT_UPLOADS).cloned().collect(),
    }
}
