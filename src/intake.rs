//! Submission checks and staging of uploaded files.
//!
//! A submission is accepted when its name ends in `.csv` (any case) or it is
//! declared as `text/csv`, and when it is no larger than the configured limit.
//! Accepted files are copied into a staging directory; the staged copy is a
//! [`TempPath`] that is deleted as soon as the [`StagedUpload`] is dropped.

use std::{
    fs::{self, File},
    io::{self, Read},
    path::{Path, PathBuf},
};

use log::debug;
use tempfile::{Builder, TempPath};

use crate::error::IntakeError;

/// Default maximum accepted file size: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub const CSV_CONTENT_TYPE: &str = "text/csv";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeLimits {
    pub max_bytes: u64,
}

impl Default for IntakeLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

/// A submitted file copied into the staging area.
#[derive(Debug)]
pub struct StagedUpload {
    original_filename: String,
    size: u64,
    path: TempPath,
}

impl StagedUpload {
    /// Validates a file on disk and stages a copy of it under `staging_dir`.
    pub fn from_path(
        source: &Path,
        content_type: Option<&str>,
        staging_dir: &Path,
        limits: IntakeLimits,
    ) -> Result<Self, IntakeError> {
        let original_filename = source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        check_type(&original_filename, content_type)?;
        let size = fs::metadata(source)?.len();
        check_size(size, limits)?;
        let file = File::open(source)?;
        Self::stage(original_filename, file, staging_dir, limits)
    }

    /// Validates and stages an in-memory or streamed submission.
    pub fn from_reader<R: Read>(
        original_filename: &str,
        content_type: Option<&str>,
        reader: R,
        staging_dir: &Path,
        limits: IntakeLimits,
    ) -> Result<Self, IntakeError> {
        check_type(original_filename, content_type)?;
        Self::stage(original_filename.to_string(), reader, staging_dir, limits)
    }

    fn stage<R: Read>(
        original_filename: String,
        reader: R,
        staging_dir: &Path,
        limits: IntakeLimits,
    ) -> Result<Self, IntakeError> {
        fs::create_dir_all(staging_dir)?;
        let mut staged = Builder::new()
            .prefix("upload-")
            .suffix(".csv")
            .tempfile_in(staging_dir)?;
        // One byte past the limit is enough to know the submission is too large.
        let mut bounded = reader.take(limits.max_bytes.saturating_add(1));
        let size = io::copy(&mut bounded, staged.as_file_mut())?;
        check_size(size, limits)?;
        let path = staged.into_temp_path();
        debug!(
            "Staged '{}' ({} bytes) at {:?}",
            original_filename, size, path
        );
        Ok(Self {
            original_filename,
            size,
            path,
        })
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Deletes the staged copy now, reporting any failure.
    pub fn discard(self) -> io::Result<()> {
        self.path.close()
    }
}

fn check_type(filename: &str, content_type: Option<&str>) -> Result<(), IntakeError> {
    let declared_csv = content_type
        .map(|ct| ct.split(';').next().unwrap_or("").trim())
        .is_some_and(|ct| ct.eq_ignore_ascii_case(CSV_CONTENT_TYPE));
    let named_csv = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if declared_csv || named_csv {
        Ok(())
    } else {
        Err(IntakeError::UnsupportedType {
            filename: filename.to_string(),
        })
    }
}

fn check_size(size: u64, limits: IntakeLimits) -> Result<(), IntakeError> {
    if size > limits.max_bytes {
        Err(IntakeError::TooLarge {
            size,
            limit: limits.max_bytes,
        })
    } else {
        Ok(())
    }
}

/// Staging directory used inside a store root.
pub fn staging_dir_for(store_root: &Path) -> PathBuf {
    store_root.join("uploads")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn accepts_csv_by_extension_or_content_type() {
        assert!(check_type("people.CSV", None).is_ok());
        assert!(check_type("people.txt", Some("text/csv; charset=utf-8")).is_ok());
        assert!(matches!(
            check_type("people.xlsx", Some("application/vnd.ms-excel")),
            Err(IntakeError::UnsupportedType { .. })
        ));
        assert!(check_type("csv", None).is_err());
    }

    #[test]
    fn rejects_oversized_streams() {
        let dir = tempdir().expect("temp dir");
        let limits = IntakeLimits { max_bytes: 8 };
        let err = StagedUpload::from_reader("big.csv", None, &b"a,b\n1,2\n3,4\n"[..], dir.path(), limits)
            .unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { size: 9, limit: 8 }));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn staged_copy_is_removed_on_drop() {
        let dir = tempdir().expect("temp dir");
        let staged = StagedUpload::from_reader(
            "small.csv",
            None,
            &b"a\n1\n"[..],
            dir.path(),
            IntakeLimits::default(),
        )
        .expect("stage");
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert_eq!(staged.size(), 4);
        assert_eq!(staged.original_filename(), "small.csv");
        drop(staged);
        assert!(!path.exists());
    }

    #[test]
    fn from_path_checks_size_before_copying() {
        let dir = tempdir().expect("temp dir");
        let source = dir.path().join("input.csv");
        fs::write(&source, "id\n1\n2\n").unwrap();
        let staging = dir.path().join("staging");
        let err = StagedUpload::from_path(&source, None, &staging, IntakeLimits { max_bytes: 3 })
            .unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { size: 7, .. }));
        assert!(!staging.exists());
    }
}
