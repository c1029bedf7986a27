//! Records persisted by an [`UploadStore`](crate::store::UploadStore).

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::RowData;
use crate::inference::ColumnType;
use crate::somatometria::SomatometriaFields;

pub type UploadId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl UploadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Processing => "processing",
            UploadStatus::Completed => "completed",
            UploadStatus::Error => "error",
        }
    }

    /// Lifecycle is `pending → processing → (completed | error)`.
    pub fn can_transition_to(self, next: UploadStatus) -> bool {
        matches!(
            (self, next),
            (UploadStatus::Pending, UploadStatus::Processing)
                | (UploadStatus::Processing, UploadStatus::Completed)
                | (UploadStatus::Processing, UploadStatus::Error)
        )
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(UploadStatus::Pending),
            "processing" => Ok(UploadStatus::Processing),
            "completed" => Ok(UploadStatus::Completed),
            "error" => Ok(UploadStatus::Error),
            other => Err(anyhow!("Unknown upload status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upload {
    pub id: UploadId,
    pub original_filename: String,
    pub table_name: String,
    pub file_size: u64,
    pub status: UploadStatus,
    pub error_message: Option<String>,
    pub total_rows: usize,
    pub total_columns: usize,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUpload {
    pub original_filename: String,
    pub table_name: String,
    pub file_size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub id: u64,
    pub upload_id: UploadId,
    pub table_name: String,
    pub column_name: String,
    pub column_type: ColumnType,
    pub column_position: usize,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewColumn {
    pub upload_id: UploadId,
    pub table_name: String,
    pub column_name: String,
    pub column_type: ColumnType,
    pub column_position: usize,
    pub is_nullable: bool,
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericRow {
    pub id: u64,
    pub upload_id: UploadId,
    pub table_name: String,
    pub row_index: usize,
    pub row_data: RowData,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRow {
    pub upload_id: UploadId,
    pub table_name: String,
    pub row_index: usize,
    pub row_data: RowData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SomatometriaRecord {
    pub id: u64,
    pub upload_id: UploadId,
    #[serde(flatten)]
    pub fields: SomatometriaFields,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_follow_lifecycle() {
        use UploadStatus::*;
        assert!(Pending.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Completed));
        assert!(Processing.can_transition_to(Error));
        assert!(!Pending.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Error));
        assert!(!Error.can_transition_to(Processing));
        assert!(!Processing.can_transition_to(Processing));
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            UploadStatus::Pending,
            UploadStatus::Processing,
            UploadStatus::Completed,
            UploadStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<UploadStatus>().unwrap(), status);
        }
        assert_eq!(
            serde_json::to_string(&UploadStatus::Completed).unwrap(),
            "\"completed\""
        );
        assert!("done".parse::<UploadStatus>().is_err());
    }
}
