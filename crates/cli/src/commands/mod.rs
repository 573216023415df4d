//! CLI subcommands.
//!
//! Record files are JSON. Output goes to `--output` when given, otherwise to
//! stdout; logs always go to stderr.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub mod conflicts;
pub mod merge;
pub mod sync;

/// Errors reading or writing command files.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Failed to write output: {0}")]
    Write(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Read and decode a JSON file.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, FileError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| FileError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    serde_json::from_str(&content).map_err(|source| FileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write pretty JSON to `output`, or to stdout when no path is given.
pub async fn write_json<T: Serialize>(output: Option<&Path>, value: &T) -> Result<(), FileError> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            tokio::fs::write(path, json).await?;
            tracing::info!(path = %path.display(), "Wrote output");
        }
        None => write_stdout(&json)?,
    }
    Ok(())
}

/// Write text to stdout followed by a newline.
pub fn write_stdout(text: &str) -> Result<(), std::io::Error> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{text}")?;
    stdout.flush()
}
