use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::{StoreError, StoreResult};
use crate::model::{
    ColumnDefinition, GenericRow, NewColumn, NewRow, NewUpload, SomatometriaRecord, Upload,
    UploadId, UploadStatus,
};
use crate::somatometria::SomatometriaFields;

/// Per-upload record counts, used to keep positions contiguous and layouts exclusive.
#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    columns: usize,
    rows: usize,
    records: usize,
}

impl Progress {
    fn is_generic(&self) -> bool {
        self.columns > 0 || self.rows > 0
    }
}

/// In-memory tables shared by the store implementations.
#[derive(Debug, Default, Clone)]
pub(crate) struct Tables {
    pub(crate) uploads: Vec<Upload>,
    pub(crate) columns: Vec<ColumnDefinition>,
    pub(crate) rows: Vec<GenericRow>,
    pub(crate) somatometria: Vec<SomatometriaRecord>,
    progress: HashMap<UploadId, Progress>,
}

impl Tables {
    pub(crate) fn from_parts(
        uploads: Vec<Upload>,
        columns: Vec<ColumnDefinition>,
        rows: Vec<GenericRow>,
        somatometria: Vec<SomatometriaRecord>,
    ) -> Self {
        let mut tables = Self {
            uploads,
            ..Self::default()
        };
        tables.absorb_columns(columns);
        tables.absorb_rows(rows);
        tables.absorb_somatometria(somatometria);
        tables
    }

    pub(crate) fn replace_uploads(&mut self, uploads: Vec<Upload>) {
        self.uploads = uploads;
    }

    /// Adds column definitions written elsewhere, keeping progress in step.
    pub(crate) fn absorb_columns(&mut self, columns: Vec<ColumnDefinition>) {
        for column in columns {
            let entry = self.progress.entry(column.upload_id).or_default();
            entry.columns = entry.columns.max(column.column_position);
            self.columns.push(column);
        }
    }

    pub(crate) fn absorb_rows(&mut self, rows: Vec<GenericRow>) {
        for row in rows {
            let entry = self.progress.entry(row.upload_id).or_default();
            entry.rows = entry.rows.max(row.row_index);
            self.rows.push(row);
        }
    }

    pub(crate) fn absorb_somatometria(&mut self, records: Vec<SomatometriaRecord>) {
        for record in records {
            self.progress.entry(record.upload_id).or_default().records += 1;
            self.somatometria.push(record);
        }
    }

    fn next_upload_id(&self) -> UploadId {
        self.uploads.iter().map(|u| u.id).max().unwrap_or(0) + 1
    }

    fn upload_mut(&mut self, id: UploadId) -> StoreResult<&mut Upload> {
        self.uploads
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or(StoreError::UploadNotFound(id))
    }

    fn ensure_upload(&self, id: UploadId) -> StoreResult<()> {
        if self.uploads.iter().any(|u| u.id == id) {
            Ok(())
        } else {
            Err(StoreError::UploadNotFound(id))
        }
    }

    pub(crate) fn insert_upload(&mut self, new: NewUpload, now: DateTime<Utc>) -> Upload {
        let upload = Upload {
            id: self.next_upload_id(),
            original_filename: new.original_filename,
            table_name: new.table_name,
            file_size: new.file_size,
            status: UploadStatus::Pending,
            error_message: None,
            total_rows: 0,
            total_columns: 0,
            created_at: now,
            completed_at: None,
        };
        self.uploads.push(upload.clone());
        upload
    }

    pub(crate) fn set_status(
        &mut self,
        id: UploadId,
        status: UploadStatus,
        error_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Upload> {
        let upload = self.upload_mut(id)?;
        if !upload.status.can_transition_to(status) {
            return Err(StoreError::InvalidTransition {
                id,
                from: upload.status,
                to: status,
            });
        }
        upload.status = status;
        if status == UploadStatus::Completed {
            upload.completed_at = Some(now);
        }
        if let Some(message) = error_message {
            upload.error_message = Some(message.to_string());
        }
        Ok(upload.clone())
    }

    pub(crate) fn set_counts(
        &mut self,
        id: UploadId,
        total_rows: usize,
        total_columns: usize,
    ) -> StoreResult<()> {
        let upload = self.upload_mut(id)?;
        upload.total_rows = total_rows;
        upload.total_columns = total_columns;
        Ok(())
    }

    pub(crate) fn set_table_name(&mut self, id: UploadId, table_name: &str) -> StoreResult<()> {
        self.upload_mut(id)?.table_name = table_name.to_string();
        Ok(())
    }

    pub(crate) fn insert_column(
        &mut self,
        new: NewColumn,
        now: DateTime<Utc>,
    ) -> StoreResult<ColumnDefinition> {
        self.ensure_upload(new.upload_id)?;
        let progress = self.progress.get(&new.upload_id).copied().unwrap_or_default();
        if progress.records > 0 {
            return Err(StoreError::LayoutConflict(new.upload_id));
        }
        let expected = progress.columns + 1;
        if new.column_position != expected {
            return Err(StoreError::OutOfOrder {
                id: new.upload_id,
                kind: "column position",
                expected,
                got: new.column_position,
            });
        }
        let column = ColumnDefinition {
            id: self.columns.last().map_or(0, |c| c.id) + 1,
            upload_id: new.upload_id,
            table_name: new.table_name,
            column_name: new.column_name,
            column_type: new.column_type,
            column_position: new.column_position,
            is_nullable: new.is_nullable,
            default_value: new.default_value,
            created_at: now,
        };
        self.columns.push(column.clone());
        self.progress.entry(column.upload_id).or_default().columns = expected;
        Ok(column)
    }

    pub(crate) fn insert_row(&mut self, new: NewRow, now: DateTime<Utc>) -> StoreResult<GenericRow> {
        self.ensure_upload(new.upload_id)?;
        let progress = self.progress.get(&new.upload_id).copied().unwrap_or_default();
        if progress.records > 0 {
            return Err(StoreError::LayoutConflict(new.upload_id));
        }
        let expected = progress.rows + 1;
        if new.row_index != expected {
            return Err(StoreError::OutOfOrder {
                id: new.upload_id,
                kind: "row index",
                expected,
                got: new.row_index,
            });
        }
        let row = GenericRow {
            id: self.rows.last().map_or(0, |r| r.id) + 1,
            upload_id: new.upload_id,
            table_name: new.table_name,
            row_index: new.row_index,
            row_data: new.row_data,
            created_at: now,
        };
        self.rows.push(row.clone());
        self.progress.entry(row.upload_id).or_default().rows = expected;
        Ok(row)
    }

    pub(crate) fn insert_somatometria(
        &mut self,
        upload_id: UploadId,
        fields: SomatometriaFields,
        now: DateTime<Utc>,
    ) -> StoreResult<SomatometriaRecord> {
        self.ensure_upload(upload_id)?;
        let generic = self
            .progress
            .get(&upload_id)
            .is_some_and(Progress::is_generic);
        if generic {
            return Err(StoreError::LayoutConflict(upload_id));
        }
        let record = SomatometriaRecord {
            id: self.somatometria.last().map_or(0, |r| r.id) + 1,
            upload_id,
            fields,
            created_at: now,
        };
        self.somatometria.push(record.clone());
        self.progress.entry(upload_id).or_default().records += 1;
        Ok(record)
    }

    pub(crate) fn list_uploads(&self, limit: Option<usize>) -> Vec<Upload> {
        let mut uploads = self.uploads.clone();
        uploads.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        if let Some(limit) = limit {
            uploads.truncate(limit);
        }
        uploads
    }

    pub(crate) fn get_upload(&self, id: UploadId) -> Option<Upload> {
        self.uploads.iter().find(|u| u.id == id).cloned()
    }

    pub(crate) fn list_columns(&self, upload_id: UploadId) -> Vec<ColumnDefinition> {
        let mut columns = self
            .columns
            .iter()
            .filter(|c| c.upload_id == upload_id)
            .cloned()
            .collect::<Vec<_>>();
        columns.sort_by_key(|c| c.column_position);
        columns
    }

    pub(crate) fn list_rows(&self, upload_id: UploadId, limit: usize) -> Vec<GenericRow> {
        let mut rows = self
            .rows
            .iter()
            .filter(|r| r.upload_id == upload_id)
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by_key(|r| r.row_index);
        rows.truncate(limit);
        rows
    }

    pub(crate) fn list_rows_by_table(&self, table_name: &str, limit: usize) -> Vec<GenericRow> {
        self.rows
            .iter()
            .filter(|r| r.table_name == table_name)
            .take(limit)
            .cloned()
            .collect()
    }

    pub(crate) fn list_somatometria(&self, limit: usize) -> Vec<SomatometriaRecord> {
        let mut records = self.somatometria.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records.truncate(limit);
        records
    }

    pub(crate) fn count_somatometria(&self) -> usize {
        self.somatometria.len()
    }

    pub(crate) fn clear(&mut self) {
        *self = Tables::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    use crate::data::RowData;
    use crate::inference::ColumnType;

    fn new_upload(name: &str) -> NewUpload {
        NewUpload {
            original_filename: name.to_string(),
            table_name: format!("{name}_1"),
            file_size: 10,
        }
    }

    fn new_column(upload_id: UploadId, position: usize) -> NewColumn {
        NewColumn {
            upload_id,
            table_name: "t".into(),
            column_name: format!("c{position}"),
            column_type: ColumnType::Integer,
            column_position: position,
            is_nullable: true,
            default_value: None,
        }
    }

    #[test]
    fn upload_ids_are_sequential_and_listing_is_newest_first() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let first = tables.insert_upload(new_upload("a"), now);
        let second = tables.insert_upload(new_upload("b"), now + Duration::seconds(1));
        assert_eq!((first.id, second.id), (1, 2));
        assert_eq!(first.status, UploadStatus::Pending);

        let listed = tables.list_uploads(None);
        assert_eq!(listed.iter().map(|u| u.id).collect::<Vec<_>>(), vec![2, 1]);
        assert_eq!(tables.list_uploads(Some(1)).len(), 1);
    }

    #[test]
    fn set_status_rejects_skipped_states_and_stamps_completion() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let upload = tables.insert_upload(new_upload("a"), now);
        let err = tables
            .set_status(upload.id, UploadStatus::Completed, None, now)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        tables
            .set_status(upload.id, UploadStatus::Processing, None, now)
            .unwrap();
        let done = tables
            .set_status(upload.id, UploadStatus::Completed, None, now)
            .unwrap();
        assert_eq!(done.completed_at, Some(now));
        assert_eq!(done.error_message, None);
    }

    #[test]
    fn columns_must_arrive_in_contiguous_positions() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let upload = tables.insert_upload(new_upload("a"), now);
        tables.insert_column(new_column(upload.id, 1), now).unwrap();
        let err = tables.insert_column(new_column(upload.id, 3), now).unwrap_err();
        assert!(matches!(
            err,
            StoreError::OutOfOrder {
                expected: 2,
                got: 3,
                ..
            }
        ));
    }

    #[test]
    fn upload_layouts_are_exclusive() {
        let mut tables = Tables::default();
        let now = Utc::now();
        let upload = tables.insert_upload(new_upload("a"), now);
        tables
            .insert_row(
                NewRow {
                    upload_id: upload.id,
                    table_name: "t".into(),
                    row_index: 1,
                    row_data: RowData::new(),
                },
                now,
            )
            .unwrap();
        let err = tables
            .insert_somatometria(upload.id, SomatometriaFields::default(), now)
            .unwrap_err();
        assert!(matches!(err, StoreError::LayoutConflict(1)));
    }

    #[test]
    fn records_for_unknown_uploads_are_rejected() {
        let mut tables = Tables::default();
        let err = tables.insert_column(new_column(7, 1), Utc::now()).unwrap_err();
        assert!(matches!(err, StoreError::UploadNotFound(7)));
    }

    #[test]
    fn clear_restarts_ids() {
        let mut tables = Tables::default();
        let now = Utc::now();
        tables.insert_upload(new_upload("a"), now);
        tables.insert_upload(new_upload("b"), now);
        tables.clear();
        assert!(tables.list_uploads(None).is_empty());
        assert_eq!(tables.insert_upload(new_upload("c"), now).id, 1);
    }
}
