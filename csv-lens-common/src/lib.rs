pub mod config;
pub use config::{Config, ExportConfig, FrequencyMode, InputConfig, ProfilingConfig};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvLensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("unsupported encoding label: {0}")]
    Encoding(String),
    #[error("column not found in header: {0}")]
    UnknownColumn(String),
    #[error("cannot merge profiles built from different schemas")]
    SchemaMismatch,
    #[error("header of {path} does not match the first input")]
    HeaderMismatch { path: String },
    #[error("column {column} exceeded {limit} distinct values in exact mode")]
    CardinalityExceeded { column: String, limit: usize },
    #[error("input has no header row: {0}")]
    EmptyInput(String),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CsvLensError>;
