use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::intake::DEFAULT_MAX_UPLOAD_BYTES;
use crate::model::UploadId;

pub const DEFAULT_STORE_DIR: &str = ".csv-ingest";

#[derive(Debug, Parser)]
#[command(author, version, about = "Ingest CSV uploads into a typed record store", long_about = None)]
pub struct Cli {
    /// Directory holding the record store
    #[arg(long, global = true, env = "CSV_INGEST_STORE", default_value = DEFAULT_STORE_DIR)]
    pub store: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Ingest a CSV file, inferring its columns or mapping it to somatometria records
    Ingest(IngestArgs),
    /// List uploads, newest first
    Uploads(UploadsArgs),
    /// Show one upload with its column definitions and first rows
    Show(ShowArgs),
    /// List generic rows stored under a table name
    Rows(RowsArgs),
    /// List somatometria records, newest first
    Somatometria(SomatometriaArgs),
    /// Print aggregate upload statistics
    Stats(OutputArgs),
    /// Remove every upload and record from the store
    Clear,
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// CSV file to upload
    pub file: PathBuf,
    /// Maximum accepted file size in bytes
    #[arg(long = "max-bytes", default_value_t = DEFAULT_MAX_UPLOAD_BYTES)]
    pub max_bytes: u64,
    /// Declared content type; `text/csv` admits files without a .csv extension
    #[arg(long = "content-type")]
    pub content_type: Option<String>,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    /// Render a text table instead of JSON
    #[arg(long)]
    pub table: bool,
}

#[derive(Debug, Args)]
pub struct UploadsArgs {
    /// Maximum number of uploads to list
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Upload identifier
    pub id: UploadId,
    /// Maximum number of rows to include
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct RowsArgs {
    /// Table name tag assigned at ingestion
    pub table_name: String,
    /// Maximum number of rows to list
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct SomatometriaArgs {
    /// Maximum number of records to list
    #[arg(long, default_value_t = 100)]
    pub limit: usize,
    #[command(flatten)]
    pub output: OutputArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
