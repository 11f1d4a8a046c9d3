use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::{ExtractState, IngestionBatch, LedgerRecord};
use crate::settings::Settings;
use crate::store;

/// Deterministic partitioned location for one batch snapshot, keyed by the
/// file's embedded date, source system, database and extract state.
pub fn archive_key(settings: &Settings, file_date: NaiveDate, state: ExtractState) -> PathBuf {
    let file_name = format!("{}-{}.csv", file_date.format("%Y%m%d"), state.key());
    PathBuf::from(&settings.data_dir)
        .join("semi-treated")
        .join(&settings.system_name)
        .join(&settings.database)
        .join(state.key())
        .join(file_date.format("%Y").to_string())
        .join(file_date.format("%m").to_string())
        .join(file_date.format("%d").to_string())
        .join(file_name)
}

fn number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn date(value: Option<NaiveDate>) -> String {
    value
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn snapshot_row(record: &LedgerRecord, batch: &IngestionBatch) -> Vec<String> {
    vec![
        text(&record.key_unique),
        text(&record.st),
        number(record.conta),
        text(&record.no_doc),
        number(record.itm),
        text(&record.tip),
        date(record.data_doc),
        date(record.vencliquid),
        date(record.compensac),
        date(record.data_base),
        date(record.entrado_em),
        number(record.mont_em_mi),
        number(record.datr),
        number(record.are),
        number(record.conta_do_razao),
        number(record.doccompens),
        text(&record.no_id_fiscal_1),
        text(&record.texto),
        text(&record.chvrefer_3),
        record
            .tipo_de_cliente
            .map(|t| t.as_str().to_string())
            .unwrap_or_default(),
        batch.tag.file_name.clone(),
        batch.tag.file_date.format("%Y-%m-%d").to_string(),
        batch.tag.processing_date.format("%Y-%m-%d").to_string(),
    ]
}

/// Write the audit snapshot of a merged batch: one file per batch, all store
/// columns, under the partitioned archive key.
pub fn archive_batch(settings: &Settings, batch: &IngestionBatch) -> Result<PathBuf> {
    let path = archive_key(settings, batch.tag.file_date, batch.tag.state);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut writer = csv::Writer::from_path(&path)?;
    writer.write_record(store::COLUMNS)?;
    for record in &batch.records {
        writer.write_record(snapshot_row(record, batch))?;
    }
    writer.flush()?;
    Ok(path)
}
