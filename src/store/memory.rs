use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use super::UploadStore;
use super::tables::Tables;
use crate::error::{StoreError, StoreResult};
use crate::model::{
    ColumnDefinition, GenericRow, NewColumn, NewRow, NewUpload, SomatometriaRecord, Upload,
    UploadId, UploadStatus,
};
use crate::somatometria::SomatometriaFields;

/// Process-local store; contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl UploadStore for MemoryStore {
    fn create_upload(&self, upload: NewUpload) -> StoreResult<Upload> {
        Ok(self.lock()?.insert_upload(upload, Utc::now()))
    }

    fn set_status(
        &self,
        id: UploadId,
        status: UploadStatus,
        error_message: Option<&str>,
    ) -> StoreResult<Upload> {
        self.lock()?.set_status(id, status, error_message, Utc::now())
    }

    fn set_counts(
        &self,
        id: UploadId,
        total_rows: usize,
        total_columns: usize,
    ) -> StoreResult<()> {
        self.lock()?.set_counts(id, total_rows, total_columns)
    }

    fn set_table_name(&self, id: UploadId, table_name: &str) -> StoreResult<()> {
        self.lock()?.set_table_name(id, table_name)
    }

    fn create_column(&self, column: NewColumn) -> StoreResult<ColumnDefinition> {
        self.lock()?.insert_column(column, Utc::now())
    }

    fn create_row(&self, row: NewRow) -> StoreResult<GenericRow> {
        self.lock()?.insert_row(row, Utc::now())
    }

    fn create_somatometria(
        &self,
        upload_id: UploadId,
        fields: SomatometriaFields,
    ) -> StoreResult<SomatometriaRecord> {
        self.lock()?
            .insert_somatometria(upload_id, fields, Utc::now())
    }

    fn list_uploads(&self, limit: Option<usize>) -> StoreResult<Vec<Upload>> {
        Ok(self.lock()?.list_uploads(limit))
    }

    fn get_upload(&self, id: UploadId) -> StoreResult<Option<Upload>> {
        Ok(self.lock()?.get_upload(id))
    }

    fn list_columns(&self, upload_id: UploadId) -> StoreResult<Vec<ColumnDefinition>> {
        Ok(self.lock()?.list_columns(upload_id))
    }

    fn list_rows(&self, upload_id: UploadId, limit: usize) -> StoreResult<Vec<GenericRow>> {
        Ok(self.lock()?.list_rows(upload_id, limit))
    }

    fn list_rows_by_table(&self, table_name: &str, limit: usize) -> StoreResult<Vec<GenericRow>> {
        Ok(self.lock()?.list_rows_by_table(table_name, limit))
    }

    fn list_somatometria(&self, limit: usize) -> StoreResult<Vec<SomatometriaRecord>> {
        Ok(self.lock()?.list_somatometria(limit))
    }

    fn count_somatometria(&self) -> StoreResult<usize> {
        Ok(self.lock()?.count_somatometria())
    }

    fn clear(&self) -> StoreResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}
