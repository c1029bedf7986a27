#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use csv_ingest::intake::{IntakeLimits, StagedUpload, staging_dir_for};
use tempfile::{TempDir, tempdir};

pub const SOMATOMETRIA_CSV: &str = "\
No. Control,CURP,Nombre,Apellido Paterno,Apellido Materno,Grupo,Edad,Sexo,Peso,Estatura,Temperatura,IMC
A001,ABCD010101HDFXXX01,Ana,Lopez,Diaz,3B,20,F,\"55,5\",1.62,36.5,21.1
A002,ABCD020202HDFXXX02,Luis,Perez,,3B,abc,M,70,1.75,,22.9
";

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory used as the record store root.
    pub fn store_dir(&self) -> PathBuf {
        self.path().join("store")
    }

    /// Directory where staged uploads land for this workspace's store.
    pub fn staging_dir(&self) -> PathBuf {
        staging_dir_for(&self.store_dir())
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Stages `contents` as a submission named `name`.
    pub fn stage(&self, name: &str, contents: &str) -> StagedUpload {
        StagedUpload::from_reader(
            name,
            None,
            contents.as_bytes(),
            &self.staging_dir(),
            IntakeLimits::default(),
        )
        .expect("stage upload")
    }

    /// Number of staged files currently left behind.
    pub fn staged_file_count(&self) -> usize {
        match fs::read_dir(self.staging_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }
}
