use std::path::PathBuf;

use thiserror::Error;

/// Structural failures. Any of these aborts the run.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed input at line {line}: {message}")]
    Format { line: u64, message: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EtlError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EtlError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Field-level failures. The normalizer turns these into missing values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("empty value")]
    Empty,

    #[error("not a number: {0:?}")]
    Number(String),

    #[error("not a MM/DD/YYYY date: {0:?}")]
    Date(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
