use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use chrono::Utc;
use fs4::fs_std::FileExt;
use log::{debug, warn};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tempfile::NamedTempFile;

use super::UploadStore;
use super::tables::Tables;
use crate::error::{StoreError, StoreResult};
use crate::model::{
    ColumnDefinition, GenericRow, NewColumn, NewRow, NewUpload, SomatometriaRecord, Upload,
    UploadId, UploadStatus,
};
use crate::somatometria::SomatometriaFields;

pub const UPLOADS_FILE: &str = "uploads.json";
pub const COLUMNS_FILE: &str = "columns.jsonl";
pub const ROWS_FILE: &str = "rows.jsonl";
pub const SOMATOMETRIA_FILE: &str = "somatometria.jsonl";
pub const LOCK_FILE: &str = "store.lock";

/// Contents of `uploads.json`. `epoch` changes whenever the store is cleared.
#[derive(Debug, Default, Deserialize)]
struct UploadsDocument {
    epoch: u64,
    uploads: Vec<Upload>,
}

#[derive(Serialize)]
struct UploadsDocumentRef<'a> {
    epoch: u64,
    uploads: &'a [Upload],
}

/// How far this handle has read each append-only file.
#[derive(Debug, Default, Clone, Copy)]
struct Offsets {
    columns: u64,
    rows: u64,
    somatometria: u64,
}

#[derive(Debug)]
struct State {
    epoch: u64,
    offsets: Offsets,
    tables: Tables,
}

/// Directory-backed store.
///
/// Upload records change over their lifecycle and live in one JSON document
/// that is replaced atomically on every change. Columns, rows and somatometria
/// records never change after creation and are appended as JSON lines.
///
/// Several processes may share one directory. Every operation holds an
/// exclusive lock on `store.lock` and first catches up with what other
/// handles wrote: the upload document is re-read and only the new tail of
/// each JSON-lines file is parsed.
#[derive(Debug)]
pub struct JsonStore {
    root: PathBuf,
    state: Mutex<State>,
}

/// Exclusive advisory lock on the store directory, released on drop.
struct DirLock {
    file: File,
}

impl DirLock {
    fn acquire(root: &Path) -> StoreResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(root.join(LOCK_FILE))?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }
}

impl Drop for DirLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            warn!("Failed to release store lock: {err}");
        }
    }
}

impl JsonStore {
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        let state = {
            let _lock = DirLock::acquire(&root)?;
            load_state(&root)?
        };
        debug!(
            "Opened store {:?}: {} upload(s), {} column(s), {} row(s), {} somatometria record(s)",
            root,
            state.tables.uploads.len(),
            state.tables.columns.len(),
            state.tables.rows.len(),
            state.tables.somatometria.len()
        );
        Ok(Self {
            root,
            state: Mutex::new(state),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Runs `op` under the directory lock against an up-to-date view.
    fn locked<T>(&self, op: impl FnOnce(&mut State) -> StoreResult<T>) -> StoreResult<T> {
        let mut state = self.state.lock().map_err(|_| StoreError::Poisoned)?;
        let _lock = DirLock::acquire(&self.root)?;
        self.refresh(&mut state)?;
        op(&mut state)
    }

    fn refresh(&self, state: &mut State) -> StoreResult<()> {
        let document: UploadsDocument = read_document(&self.root.join(UPLOADS_FILE))?;
        if document.epoch != state.epoch {
            debug!("Store {:?} was cleared elsewhere; reloading", self.root);
            *state = load_state(&self.root)?;
            return Ok(());
        }
        state.tables.replace_uploads(document.uploads);

        let (columns, offset) = read_lines(&self.root.join(COLUMNS_FILE), state.offsets.columns)?;
        state.offsets.columns = offset;
        state.tables.absorb_columns(columns);
        let (rows, offset) = read_lines(&self.root.join(ROWS_FILE), state.offsets.rows)?;
        state.offsets.rows = offset;
        state.tables.absorb_rows(rows);
        let (records, offset) =
            read_lines(&self.root.join(SOMATOMETRIA_FILE), state.offsets.somatometria)?;
        state.offsets.somatometria = offset;
        state.tables.absorb_somatometria(records);
        Ok(())
    }

    fn write_uploads(&self, state: &State) -> StoreResult<()> {
        let mut staged = NamedTempFile::new_in(&self.root)?;
        {
            let mut writer = BufWriter::new(staged.as_file_mut());
            let document = UploadsDocumentRef {
                epoch: state.epoch,
                uploads: &state.tables.uploads,
            };
            serde_json::to_writer_pretty(&mut writer, &document)?;
            writer.flush()?;
        }
        staged
            .persist(self.root.join(UPLOADS_FILE))
            .map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }

    /// Appends one record and returns the new end offset of the file.
    fn append<T: Serialize>(&self, file: &str, record: &T, offset: u64) -> StoreResult<u64> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(file))?;
        handle.write_all(&line)?;
        Ok(offset + line.len() as u64)
    }
}

fn load_state(root: &Path) -> StoreResult<State> {
    let document: UploadsDocument = read_document(&root.join(UPLOADS_FILE))?;
    let (columns, columns_end) = read_lines(&root.join(COLUMNS_FILE), 0)?;
    let (rows, rows_end) = read_lines(&root.join(ROWS_FILE), 0)?;
    let (somatometria, somatometria_end) = read_lines(&root.join(SOMATOMETRIA_FILE), 0)?;
    Ok(State {
        epoch: document.epoch,
        offsets: Offsets {
            columns: columns_end,
            rows: rows_end,
            somatometria: somatometria_end,
        },
        tables: Tables::from_parts(document.uploads, columns, rows, somatometria),
    })
}

fn read_document(path: &Path) -> StoreResult<UploadsDocument> {
    if !path.exists() {
        return Ok(UploadsDocument::default());
    }
    let reader = BufReader::new(File::open(path)?);
    serde_json::from_reader(reader)
        .map_err(|err| StoreError::Backend(format!("Parsing {path:?}: {err}")))
}

/// Reads the records appended after `offset`; returns them with the new end offset.
fn read_lines<T: DeserializeOwned>(path: &Path, offset: u64) -> StoreResult<(Vec<T>, u64)> {
    if !path.exists() {
        return Ok((Vec::new(), 0));
    }
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut reader = BufReader::new(file);
    let mut records = Vec::new();
    let mut end = offset;
    let mut line = String::new();
    let mut line_no = 0usize;
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        end += read as u64;
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|err| {
            StoreError::Backend(format!("Parsing {path:?} line {line_no} after byte {offset}: {err}"))
        })?;
        records.push(record);
    }
    Ok((records, end))
}

impl UploadStore for JsonStore {
    fn create_upload(&self, upload: NewUpload) -> StoreResult<Upload> {
        self.locked(|state| {
            let created = state.tables.insert_upload(upload, Utc::now());
            self.write_uploads(state)?;
            Ok(created)
        })
    }

    fn set_status(
        &self,
        id: UploadId,
        status: UploadStatus,
        error_message: Option<&str>,
    ) -> StoreResult<Upload> {
        self.locked(|state| {
            let updated = state
                .tables
                .set_status(id, status, error_message, Utc::now())?;
            self.write_uploads(state)?;
            Ok(updated)
        })
    }

    fn set_counts(
        &self,
        id: UploadId,
        total_rows: usize,
        total_columns: usize,
    ) -> StoreResult<()> {
        self.locked(|state| {
            state.tables.set_counts(id, total_rows, total_columns)?;
            self.write_uploads(state)
        })
    }

    fn set_table_name(&self, id: UploadId, table_name: &str) -> StoreResult<()> {
        self.locked(|state| {
            state.tables.set_table_name(id, table_name)?;
            self.write_uploads(state)
        })
    }

    fn create_column(&self, column: NewColumn) -> StoreResult<ColumnDefinition> {
        self.locked(|state| {
            let created = state.tables.insert_column(column, Utc::now())?;
            state.offsets.columns = self.append(COLUMNS_FILE, &created, state.offsets.columns)?;
            Ok(created)
        })
    }

    fn create_row(&self, row: NewRow) -> StoreResult<GenericRow> {
        self.locked(|state| {
            let created = state.tables.insert_row(row, Utc::now())?;
            state.offsets.rows = self.append(ROWS_FILE, &created, state.offsets.rows)?;
            Ok(created)
        })
    }

    fn create_somatometria(
        &self,
        upload_id: UploadId,
        fields: SomatometriaFields,
    ) -> StoreResult<SomatometriaRecord> {
        self.locked(|state| {
            let created = state
                .tables
                .insert_somatometria(upload_id, fields, Utc::now())?;
            state.offsets.somatometria =
                self.append(SOMATOMETRIA_FILE, &created, state.offsets.somatometria)?;
            Ok(created)
        })
    }

    fn list_uploads(&self, limit: Option<usize>) -> StoreResult<Vec<Upload>> {
        self.locked(|state| Ok(state.tables.list_uploads(limit)))
    }

    fn get_upload(&self, id: UploadId) -> StoreResult<Option<Upload>> {
        self.locked(|state| Ok(state.tables.get_upload(id)))
    }

    fn list_columns(&self, upload_id: UploadId) -> StoreResult<Vec<ColumnDefinition>> {
        self.locked(|state| Ok(state.tables.list_columns(upload_id)))
    }

    fn list_rows(&self, upload_id: UploadId, limit: usize) -> StoreResult<Vec<GenericRow>> {
        self.locked(|state| Ok(state.tables.list_rows(upload_id, limit)))
    }

    fn list_rows_by_table(&self, table_name: &str, limit: usize) -> StoreResult<Vec<GenericRow>> {
        self.locked(|state| Ok(state.tables.list_rows_by_table(table_name, limit)))
    }

    fn list_somatometria(&self, limit: usize) -> StoreResult<Vec<SomatometriaRecord>> {
        self.locked(|state| Ok(state.tables.list_somatometria(limit)))
    }

    fn count_somatometria(&self) -> StoreResult<usize> {
        self.locked(|state| Ok(state.tables.count_somatometria()))
    }

    fn clear(&self) -> StoreResult<()> {
        self.locked(|state| {
            state.tables.clear();
            state.epoch = state.epoch.wrapping_add(1);
            state.offsets = Offsets::default();
            for file in [COLUMNS_FILE, ROWS_FILE, SOMATOMETRIA_FILE] {
                File::create(self.root.join(file))?;
            }
            self.write_uploads(state)
        })
    }
}
