//! Upload record store: the persistence boundary of the ingestion pipeline.
//!
//! [`UploadStore`] exposes create/read/update operations over uploads, column
//! definitions, generic rows and somatometria records. Two implementations
//! share the same table logic ([`tables::Tables`]):
//!
//! - [`MemoryStore`] keeps everything in process memory.
//! - [`JsonStore`] persists to a directory: `uploads.json` is rewritten
//!   atomically on every upload change, immutable records are appended to
//!   `columns.jsonl`, `rows.jsonl` and `somatometria.jsonl`.
//!
//! Both take `&self` and serialize access through a mutex, so a store can be
//! shared by independent ingestion runs. `JsonStore` also takes an exclusive
//! lock on `store.lock`, so processes sharing a directory see each other's
//! writes and never hand out the same id.

mod json;
mod memory;
mod tables;

pub use json::JsonStore;
pub use memory::MemoryStore;

use crate::error::StoreResult;
use crate::model::{
    ColumnDefinition, GenericRow, NewColumn, NewRow, NewUpload, SomatometriaRecord, Upload,
    UploadId, UploadStatus,
};
use crate::somatometria::SomatometriaFields;

pub trait UploadStore: Send + Sync {
    /// Creates an upload in `pending` with a freshly assigned id.
    fn create_upload(&self, upload: NewUpload) -> StoreResult<Upload>;

    /// Moves an upload along its lifecycle. Completion stamps `completed_at`;
    /// an error message, when given, is recorded alongside the status.
    fn set_status(
        &self,
        id: UploadId,
        status: UploadStatus,
        error_message: Option<&str>,
    ) -> StoreResult<Upload>;

    fn set_counts(&self, id: UploadId, total_rows: usize, total_columns: usize)
    -> StoreResult<()>;

    fn set_table_name(&self, id: UploadId, table_name: &str) -> StoreResult<()>;

    fn create_column(&self, column: NewColumn) -> StoreResult<ColumnDefinition>;

    fn create_row(&self, row: NewRow) -> StoreResult<GenericRow>;

    fn create_somatometria(
        &self,
        upload_id: UploadId,
        fields: SomatometriaFields,
    ) -> StoreResult<SomatometriaRecord>;

    /// Uploads ordered newest first.
    fn list_uploads(&self, limit: Option<usize>) -> StoreResult<Vec<Upload>>;

    fn get_upload(&self, id: UploadId) -> StoreResult<Option<Upload>>;

    /// Column definitions of one upload ordered by position.
    fn list_columns(&self, upload_id: UploadId) -> StoreResult<Vec<ColumnDefinition>>;

    /// Generic rows of one upload ordered by row index.
    fn list_rows(&self, upload_id: UploadId, limit: usize) -> StoreResult<Vec<GenericRow>>;

    fn list_rows_by_table(&self, table_name: &str, limit: usize) -> StoreResult<Vec<GenericRow>>;

    /// Somatometria records ordered newest first.
    fn list_somatometria(&self, limit: usize) -> StoreResult<Vec<SomatometriaRecord>>;

    fn count_somatometria(&self) -> StoreResult<usize>;

    /// Deletes every record and restarts id assignment.
    fn clear(&self) -> StoreResult<()>;
}
