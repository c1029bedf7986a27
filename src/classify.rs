//! Header-based detection of the somatometria record layout.

use serde::{Deserialize, Serialize};

use crate::naming::{loosely_matches, normalize_column_name};

/// Field-name fragments expected in a somatometria export.
pub const SOMATOMETRIA_FRAGMENTS: &[&str] = &[
    "no_control",
    "curp",
    "nombre",
    "paterno",
    "materno",
    "grupo",
    "edad",
    "certificacion_medica",
    "sexo",
    "peso",
    "perimetro",
    "estatura",
];

/// Minimum number of matched fragments for a file to be treated as somatometria.
pub const SOMATOMETRIA_THRESHOLD: usize = 6;

/// Storage layout chosen for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Generic,
    Somatometria,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Generic => "generic",
            RecordKind::Somatometria => "somatometria",
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts how many reference fragments are matched by at least one header.
pub fn matched_fragments<S: AsRef<str>>(headers: &[S], fragments: &[&str]) -> usize {
    let normalized = headers
        .iter()
        .map(|h| normalize_column_name(h.as_ref()))
        .collect::<Vec<_>>();
    fragments
        .iter()
        .filter(|fragment| {
            normalized
                .iter()
                .any(|header| loosely_matches(header, fragment))
        })
        .count()
}

/// Classifies a file by its original (un-normalized) headers.
pub fn classify_headers<S: AsRef<str>>(headers: &[S]) -> RecordKind {
    if matched_fragments(headers, SOMATOMETRIA_FRAGMENTS) >= SOMATOMETRIA_THRESHOLD {
        RecordKind::Somatometria
    } else {
        RecordKind::Generic
    }
}
