//! The ingestion run: staged file in, persisted records and a final status out.
//!
//! ```text
//! pending ─► processing ─► parse ─► classify ─┬─► somatometria records ─┐
//!                                             └─► columns + generic rows ┴─► completed
//!                              any failure ───────────────────────────────► error
//! ```
//!
//! The run is strictly sequential: columns and rows are written one at a time
//! in file order, which keeps positions and row indices contiguous. Nothing is
//! rolled back when a later write fails. The staged file is owned by the run
//! and removed on every exit path.

use std::path::Path;

use chrono::Utc;
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use serde::Serialize;

use crate::classify::{RecordKind, classify_headers};
use crate::data::RowData;
use crate::error::IngestError;
use crate::inference::infer_column_type;
use crate::intake::StagedUpload;
use crate::io_utils::resolve_input_delimiter;
use crate::model::{NewColumn, NewRow, NewUpload, Upload, UploadId, UploadStatus};
use crate::naming::{storage_keys, table_name_for};
use crate::parse::{ParsedCsv, read_csv_file};
use crate::somatometria::{SOMATOMETRIA_TABLE, SomatometriaFields, map_row_with, resolve_columns};
use crate::store::UploadStore;

#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Explicit delimiter; resolved from the original file name when absent.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

/// Summary returned to the submitter of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub success: bool,
    pub upload_id: UploadId,
    pub table_name: String,
    pub kind: RecordKind,
    pub rows_processed: usize,
    pub columns_created: usize,
    pub columns: Vec<String>,
}

/// An ingestion failure together with the upload it was recorded against.
#[derive(Debug)]
pub struct IngestFailure {
    pub upload_id: Option<UploadId>,
    pub error: IngestError,
}

impl std::fmt::Display for IngestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.upload_id {
            Some(id) => write!(f, "upload {id} failed"),
            None => write!(f, "upload could not be recorded"),
        }
    }
}

impl std::error::Error for IngestFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// Runs one staged upload through the pipeline.
pub fn ingest<S: UploadStore + ?Sized>(
    store: &S,
    staged: StagedUpload,
    options: IngestOptions,
) -> Result<IngestReport, IngestFailure> {
    let table_name = table_name_for(staged.original_filename(), Utc::now().timestamp_millis());
    let upload = store
        .create_upload(NewUpload {
            original_filename: staged.original_filename().to_string(),
            table_name,
            file_size: staged.size(),
        })
        .map_err(|err| IngestFailure {
            upload_id: None,
            error: err.into(),
        })?;
    info!(
        "Upload {} created for '{}' ({} bytes)",
        upload.id, upload.original_filename, upload.file_size
    );

    let outcome = store
        .set_status(upload.id, UploadStatus::Processing, None)
        .map_err(IngestError::from)
        .and_then(|upload| {
            let delimiter =
                resolve_input_delimiter(Path::new(staged.original_filename()), options.delimiter);
            let parsed = read_csv_file(staged.path(), delimiter, options.encoding);
            if let Err(err) = staged.discard() {
                warn!("Failed to remove staged file for upload {}: {err}", upload.id);
            }
            process(store, &upload, parsed?)
        });

    match outcome {
        Ok(report) => Ok(report),
        Err(error) => {
            warn!("Upload {} failed: {error}", upload.id);
            let message = error.to_string();
            if let Err(status_err) =
                store.set_status(upload.id, UploadStatus::Error, Some(&message))
            {
                warn!(
                    "Could not record failure for upload {}: {status_err}",
                    upload.id
                );
            }
            Err(IngestFailure {
                upload_id: Some(upload.id),
                error,
            })
        }
    }
}

fn process<S: UploadStore + ?Sized>(
    store: &S,
    upload: &Upload,
    parsed: ParsedCsv,
) -> Result<IngestReport, IngestError> {
    if parsed.is_empty() {
        return Err(IngestError::EmptyFile);
    }
    let keys = storage_keys(&parsed.headers);
    let kind = classify_headers(&parsed.headers);
    debug!(
        "Upload {} parsed {} row(s) with headers {:?}",
        upload.id,
        parsed.row_count(),
        parsed.headers
    );

    let table_name = match kind {
        RecordKind::Somatometria => {
            info!(
                "Upload {} matches the somatometria layout; storing typed records",
                upload.id
            );
            store_somatometria(store, upload.id, &parsed)?;
            store.set_table_name(upload.id, SOMATOMETRIA_TABLE)?;
            SOMATOMETRIA_TABLE.to_string()
        }
        RecordKind::Generic => {
            store_generic(store, upload, &keys, &parsed)?;
            upload.table_name.clone()
        }
    };

    let rows = parsed.row_count();
    let columns = parsed.column_count();
    store.set_counts(upload.id, rows, columns)?;
    store.set_status(upload.id, UploadStatus::Completed, None)?;
    info!(
        "Upload {} completed: {} row(s), {} column(s) into '{}'",
        upload.id, rows, columns, table_name
    );

    Ok(IngestReport {
        success: true,
        upload_id: upload.id,
        table_name,
        kind,
        rows_processed: rows,
        columns_created: columns,
        columns: keys,
    })
}

fn store_somatometria<S: UploadStore + ?Sized>(
    store: &S,
    upload_id: UploadId,
    parsed: &ParsedCsv,
) -> Result<(), IngestError> {
    let plan = resolve_columns(&parsed.headers);
    debug!(
        "Upload {} resolved {} somatometria field(s)",
        upload_id,
        plan.len()
    );
    for row in &parsed.rows {
        let mapped = map_row_with(&plan, row);
        store.create_somatometria(upload_id, SomatometriaFields::from(&mapped))?;
    }
    Ok(())
}

fn store_generic<S: UploadStore + ?Sized>(
    store: &S,
    upload: &Upload,
    keys: &[String],
    parsed: &ParsedCsv,
) -> Result<(), IngestError> {
    for (idx, key) in keys.iter().enumerate() {
        let column_type = infer_column_type(parsed.column_values(idx));
        let is_nullable = parsed.column_values(idx).any(|v| v.trim().is_empty());
        debug!("Upload {} column '{}' inferred as {}", upload.id, key, column_type);
        store.create_column(NewColumn {
            upload_id: upload.id,
            table_name: upload.table_name.clone(),
            column_name: key.clone(),
            column_type,
            column_position: idx + 1,
            is_nullable,
            default_value: None,
        })?;
    }

    for (idx, row) in parsed.rows.iter().enumerate() {
        let row_data = RowData::from_pairs(keys.iter().cloned().zip(row.iter().cloned()));
        store.create_row(NewRow {
            upload_id: upload.id,
            table_name: upload.table_name.clone(),
            row_index: idx + 1,
            row_data,
        })?;
    }
    Ok(())
}
