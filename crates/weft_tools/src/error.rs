use std::path::PathBuf;
use thiserror::Error;

/// Failures of the `weft` tool
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("cannot encode tables: {0}")]
    Encode(serde_json::Error),

    #[error("{path}: {source}")]
    Grammar {
        path: PathBuf,
        source: weft::GrammarError,
    },
}
