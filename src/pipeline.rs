use std::path::{Path, PathBuf};

use rusqlite::Connection;
use tracing::{error, info, warn};

use crate::archive::archive_batch;
use crate::dedup::dedup;
use crate::error::{FblrError, Result};
use crate::filters::apply_filters;
use crate::models::{FileTag, IngestionBatch};
use crate::normalize::normalize;
use crate::report::{decode_report, parse_report};
use crate::settings::Settings;
use crate::store::merge_batch;

/// Row counts at each pipeline stage for one processed file.
#[derive(Debug)]
pub struct IngestReport {
    pub file_name: String,
    pub parsed: usize,
    pub valid: usize,
    pub unique: usize,
    pub merged: usize,
    pub archive_path: PathBuf,
}

/// Relocate a fully handled file to its terminal area. Copy-then-delete, the
/// way the backing object store moves objects.
fn move_to_final_state(settings: &Settings, path: &Path, state: &str) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| FblrError::InvalidFileName(path.display().to_string()))?;
    let dir = settings.final_state_dir(state);
    std::fs::create_dir_all(&dir)?;
    let destination = dir.join(file_name);
    std::fs::copy(path, &destination)?;
    std::fs::remove_file(path)?;
    info!(from = %path.display(), to = %destination.display(), "file moved to {state} area");
    Ok(destination)
}

fn run_stages(settings: &Settings, conn: &mut Connection, path: &Path) -> Result<IngestReport> {
    // Name validation happens before any read, so a misnamed file fails
    // without touching its contents.
    let tag = FileTag::from_path(path)?;

    let bytes = std::fs::read(path)?;
    let text = decode_report(bytes);
    let table = parse_report(&text)?;
    let parsed = table.rows.len();
    info!(file = %tag.file_name, rows = parsed, "report parsed");

    let records = normalize(&table)?;
    let valid = apply_filters(records);
    info!(file = %tag.file_name, rows = valid.len(), "business rules applied");

    let valid_count = valid.len();
    let unique = dedup(valid)?;
    info!(file = %tag.file_name, rows = unique.len(), "batch deduplicated");

    let batch = IngestionBatch {
        tag,
        records: unique,
    };
    let outcome = merge_batch(conn, &batch)?;
    info!(
        file = %batch.tag.file_name,
        staged = outcome.staged,
        merged = outcome.merged,
        "batch reconciled into the store"
    );

    let archive_path = archive_batch(settings, &batch)?;
    info!(file = %batch.tag.file_name, archive = %archive_path.display(), "batch archived");

    Ok(IngestReport {
        file_name: batch.tag.file_name.clone(),
        parsed,
        valid: valid_count,
        unique: batch.records.len(),
        merged: outcome.merged,
        archive_path,
    })
}

/// Run the full pipeline for one file and route it to its terminal area.
///
/// The merge is the sole store write and is transactional, so a failure at
/// any stage leaves the store unmodified for this file; the file lands in
/// the error area and the error is re-raised for the caller's retry policy.
pub fn process_file(settings: &Settings, conn: &mut Connection, path: &Path) -> Result<IngestReport> {
    info!(file = %path.display(), "ingestion started");
    match run_stages(settings, conn, path) {
        Ok(report) => {
            move_to_final_state(settings, path, "processed")?;
            info!(file = %report.file_name, merged = report.merged, "ingestion finished");
            Ok(report)
        }
        Err(e) => {
            error!(file = %path.display(), error = %e, "ingestion failed");
            if let Err(move_err) = move_to_final_state(settings, path, "error") {
                warn!(file = %path.display(), error = %move_err, "could not move file to error area");
            }
            Err(e)
        }
    }
}
