//! Command handlers behind the CLI surface.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use log::info;
use serde::Serialize;

use crate::cli::{IngestArgs, OutputArgs, RowsArgs, ShowArgs, SomatometriaArgs, UploadsArgs};
use crate::intake::{IntakeLimits, StagedUpload, staging_dir_for};
use crate::io_utils;
use crate::model::{ColumnDefinition, GenericRow, SomatometriaRecord, Upload};
use crate::pipeline::{self, IngestOptions};
use crate::somatometria::FIELD_DICTIONARY;
use crate::stats;
use crate::store::UploadStore;
use crate::table;

pub fn ingest<S: UploadStore + ?Sized>(store: &S, store_root: &Path, args: &IngestArgs) -> Result<()> {
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    let staged = StagedUpload::from_path(
        &args.file,
        args.content_type.as_deref(),
        &staging_dir_for(store_root),
        IntakeLimits {
            max_bytes: args.max_bytes,
        },
    )
    .with_context(|| format!("Rejected upload {:?}", args.file))?;
    info!(
        "Ingesting '{}' ({} bytes)",
        staged.original_filename(),
        staged.size()
    );
    let report = pipeline::ingest(
        store,
        staged,
        IngestOptions {
            delimiter: args.delimiter,
            encoding,
        },
    )
    .with_context(|| format!("Ingesting {:?}", args.file))?;
    print_json(&report)
}

pub fn uploads<S: UploadStore + ?Sized>(store: &S, args: &UploadsArgs) -> Result<()> {
    let uploads = store.list_uploads(Some(args.limit))?;
    if args.output.table {
        print_uploads(&uploads);
        Ok(())
    } else {
        print_json(&uploads)
    }
}

#[derive(Debug, Serialize)]
struct UploadDetail {
    upload: Upload,
    columns: Vec<ColumnDefinition>,
    rows: Vec<GenericRow>,
}

pub fn show<S: UploadStore + ?Sized>(store: &S, args: &ShowArgs) -> Result<()> {
    let upload = store
        .get_upload(args.id)?
        .ok_or_else(|| anyhow!("Upload {} not found", args.id))?;
    let columns = store.list_columns(upload.id)?;
    let rows = store.list_rows(upload.id, args.limit)?;
    if !args.output.table {
        return print_json(&UploadDetail {
            upload,
            columns,
            rows,
        });
    }

    print_uploads(std::slice::from_ref(&upload));
    if !columns.is_empty() {
        println!();
        let cells = columns
            .iter()
            .map(|c| {
                vec![
                    c.column_position.to_string(),
                    c.column_name.clone(),
                    c.column_type.tag(),
                    c.is_nullable.to_string(),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(&["position", "name", "type", "nullable"], &cells);
    }
    if !rows.is_empty() {
        println!();
        let headers = columns.iter().map(|c| c.column_name.as_str()).collect::<Vec<_>>();
        print_rows(&headers, &rows);
    }
    Ok(())
}

pub fn rows<S: UploadStore + ?Sized>(store: &S, args: &RowsArgs) -> Result<()> {
    let rows = store.list_rows_by_table(&args.table_name, args.limit)?;
    if !args.output.table {
        return print_json(&rows);
    }
    let headers = rows
        .first()
        .map(|row| row.row_data.keys().collect::<Vec<_>>())
        .unwrap_or_default();
    print_rows(&headers, &rows);
    Ok(())
}

pub fn somatometria<S: UploadStore + ?Sized>(store: &S, args: &SomatometriaArgs) -> Result<()> {
    let records = store.list_somatometria(args.limit)?;
    if !args.output.table {
        return print_json(&records);
    }
    let mut headers = vec!["id", "upload_id"];
    headers.extend(FIELD_DICTIONARY.iter().map(|spec| spec.target));
    let cells = records
        .iter()
        .map(somatometria_cells)
        .collect::<Result<Vec<_>>>()?;
    table::print_table(&headers, &cells);
    Ok(())
}

pub fn stats<S: UploadStore + ?Sized>(store: &S, args: &OutputArgs) -> Result<()> {
    let stats = stats::compute(store)?;
    if !args.table {
        return print_json(&stats);
    }
    let cells = [
        ("total_files", stats.total_files),
        ("total_records", stats.total_records),
        ("completed_uploads", stats.completed_uploads),
        ("failed_uploads", stats.failed_uploads),
        ("somatometria_records", stats.somatometria_records),
    ]
    .into_iter()
    .map(|(name, value)| vec![name.to_string(), value.to_string()])
    .collect::<Vec<_>>();
    table::print_table(&["metric", "value"], &cells);
    if !stats.recent_uploads.is_empty() {
        println!();
        print_uploads(&stats.recent_uploads);
    }
    Ok(())
}

pub fn clear<S: UploadStore + ?Sized>(store: &S) -> Result<()> {
    store.clear().context("Clearing store")?;
    info!("Store cleared");
    print_json(&serde_json::json!({ "success": true }))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    serde_json::to_writer_pretty(&mut handle, value).context("Writing JSON output")?;
    writeln!(handle)?;
    Ok(())
}

fn print_uploads(uploads: &[Upload]) {
    let cells = uploads
        .iter()
        .map(|u| {
            vec![
                u.id.to_string(),
                u.original_filename.clone(),
                u.table_name.clone(),
                u.status.to_string(),
                u.total_rows.to_string(),
                u.total_columns.to_string(),
                u.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                u.error_message.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(
        &["id", "file", "table", "status", "rows", "columns", "created", "error"],
        &cells,
    );
}

fn print_rows(headers: &[&str], rows: &[GenericRow]) {
    let mut all_headers = vec!["row"];
    all_headers.extend_from_slice(headers);
    let cells = rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.row_index.to_string()];
            cells.extend(
                headers
                    .iter()
                    .map(|key| row.row_data.get(key).unwrap_or_default().to_string()),
            );
            cells
        })
        .collect::<Vec<_>>();
    table::print_table(&all_headers, &cells);
}

fn somatometria_cells(record: &SomatometriaRecord) -> Result<Vec<String>> {
    let fields = serde_json::to_value(&record.fields)?;
    let mut cells = vec![record.id.to_string(), record.upload_id.to_string()];
    cells.extend(FIELD_DICTIONARY.iter().map(|spec| match &fields[spec.target] {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(text) => text.clone(),
        other => other.to_string(),
    }));
    Ok(cells)
}
