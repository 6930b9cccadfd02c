//! Batch input and output: canonical action JSON, wallet lists, score tables.

use std::fs;
use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::normalize::CanonicalAction;
use crate::score::ScoreRecord;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid output path: {0}")]
    InvalidPath(String),
}

/// Reads a pre-collected canonical-action array, the alternative input to
/// re-deriving actions from raw feeds.
pub fn load_canonical_actions(path: &Path) -> Result<Vec<CanonicalAction>, ExportError> {
    let bytes = fs::read(path)?;
    let actions: Vec<CanonicalAction> = serde_json::from_slice(&bytes)?;

    info!(
        component = "export",
        event = "export.actions.loaded",
        path = %path.display(),
        action_count = actions.len()
    );

    Ok(actions)
}

pub fn write_canonical_actions(
    path: &Path,
    actions: &[CanonicalAction],
) -> Result<(), ExportError> {
    let bytes = serde_json::to_vec_pretty(actions)?;
    write_atomic(path, &bytes)?;

    info!(
        component = "export",
        event = "export.actions.written",
        path = %path.display(),
        action_count = actions.len()
    );

    Ok(())
}

/// Reads wallet addresses from the first column of a headered CSV. Blank
/// cells are dropped; address well-formedness is the caller's concern.
pub fn load_wallet_list(path: &Path) -> Result<Vec<String>, ExportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)?;

    let mut wallets = Vec::new();
    for record in reader.records() {
        let record = record?;
        if let Some(field) = record.get(0) {
            let trimmed = field.trim();
            if !trimmed.is_empty() {
                wallets.push(trimmed.to_string());
            }
        }
    }

    info!(
        component = "export",
        event = "export.wallets.loaded",
        path = %path.display(),
        wallet_count = wallets.len()
    );

    Ok(wallets)
}

/// Persists the two-column score table, `wallet,credit_score`.
pub fn write_score_csv(path: &Path, records: &[ScoreRecord]) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|err| ExportError::Io(err.into_error()))?;
    write_atomic(path, &bytes)?;

    info!(
        component = "export",
        event = "export.scores.written",
        path = %path.display(),
        record_count = records.len()
    );

    Ok(())
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), ExportError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| ExportError::InvalidPath(path.display().to_string()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}
