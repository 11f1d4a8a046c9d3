use std::path::Path;

use rusqlite::{Connection, ToSql};

use crate::error::{FblrError, Result};
use crate::filters::NEGATIVE_ADJUSTMENT_TYPES;
use crate::models::{IngestionBatch, LedgerRecord};

pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS receivables (
    key_unique TEXT PRIMARY KEY NOT NULL,
    st TEXT,
    conta REAL,
    no_doc_ TEXT,
    itm REAL,
    tip TEXT,
    data_doc_ TEXT,
    vencliquid TEXT,
    compensac_ TEXT,
    data_base TEXT,
    entrado_em TEXT,
    mont_em_mi REAL,
    datr REAL,
    are REAL,
    conta_do_razao REAL,
    doccompens REAL,
    no_id_fiscal_1 TEXT,
    texto TEXT,
    chvrefer_3 TEXT,
    tipo_de_cliente TEXT,
    file_name TEXT NOT NULL,
    file_date TEXT NOT NULL,
    processing_date TEXT NOT NULL
);
";

/// Store columns, key first. Dates are ISO text so lexicographic compare is
/// date compare.
pub const COLUMNS: &[&str] = &[
    "key_unique",
    "st",
    "conta",
    "no_doc_",
    "itm",
    "tip",
    "data_doc_",
    "vencliquid",
    "compensac_",
    "data_base",
    "entrado_em",
    "mont_em_mi",
    "datr",
    "are",
    "conta_do_razao",
    "doccompens",
    "no_id_fiscal_1",
    "texto",
    "chvrefer_3",
    "tipo_de_cliente",
    "file_name",
    "file_date",
    "processing_date",
];

pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

#[derive(Debug)]
pub struct MergeOutcome {
    /// Rows written to the staging area.
    pub staged: usize,
    /// Rows the reconcile statement inserted or updated.
    pub merged: usize,
}

#[derive(Debug)]
pub struct StoreStatus {
    pub rows: i64,
    pub files: i64,
    pub latest_file_date: Option<String>,
}

pub fn status(conn: &Connection) -> Result<StoreStatus> {
    let (rows, files, latest_file_date) = conn.query_row(
        "SELECT count(*), count(DISTINCT file_name), max(file_date) FROM receivables",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;
    Ok(StoreStatus {
        rows,
        files,
        latest_file_date,
    })
}

fn iso(date: Option<chrono::NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}

fn record_params<'a>(
    record: &'a LedgerRecord,
    batch: &'a IngestionBatch,
    dates: &'a [Option<String>; 5],
) -> Vec<Box<dyn ToSql + 'a>> {
    vec![
        Box::new(&record.key_unique),
        Box::new(&record.st),
        Box::new(record.conta),
        Box::new(&record.no_doc),
        Box::new(record.itm),
        Box::new(&record.tip),
        Box::new(&dates[0]),
        Box::new(&dates[1]),
        Box::new(&dates[2]),
        Box::new(&dates[3]),
        Box::new(&dates[4]),
        Box::new(record.mont_em_mi),
        Box::new(record.datr),
        Box::new(record.are),
        Box::new(record.conta_do_razao),
        Box::new(record.doccompens),
        Box::new(&record.no_id_fiscal_1),
        Box::new(&record.texto),
        Box::new(&record.chvrefer_3),
        Box::new(record.tipo_de_cliente.map(|t| t.as_str())),
        Box::new(&batch.tag.file_name),
        Box::new(batch.tag.file_date.format("%Y-%m-%d").to_string()),
        Box::new(batch.tag.processing_date.format("%Y-%m-%d").to_string()),
    ]
}

/// Stage the batch and reconcile it against the durable store in one
/// transaction.
///
/// Insert-or-update is keyed on `key_unique`; an existing row is only
/// overwritten when the incoming file_date is at least as new as the stored
/// one, so re-delivered or out-of-order files can never regress the store.
/// Settled rows (clearing document in the settled-counterparty number range)
/// are excluded from the merge source unless they are negative adjustments
/// of an allowed document type; this write-path rule is deliberately
/// narrower than the amount filter and lives only here.
pub fn merge_batch(conn: &mut Connection, batch: &IngestionBatch) -> Result<MergeOutcome> {
    merge_batch_inner(conn, batch).map_err(|e| FblrError::Merge(e.to_string()))
}

fn merge_batch_inner(
    conn: &mut Connection,
    batch: &IngestionBatch,
) -> rusqlite::Result<MergeOutcome> {
    let column_list = COLUMNS.join(", ");
    let placeholders = (1..=COLUMNS.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let update_list = COLUMNS
        .iter()
        .filter(|c| **c != "key_unique")
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    let allow_list = NEGATIVE_ADJUSTMENT_TYPES
        .iter()
        .map(|t| format!("'{t}'"))
        .collect::<Vec<_>>()
        .join(", ");

    let tx = conn.transaction()?;

    tx.execute_batch(&format!(
        "DROP TABLE IF EXISTS temp.staging;
         CREATE TEMP TABLE staging AS SELECT {column_list} FROM receivables WHERE 0;"
    ))?;

    let mut staged = 0usize;
    {
        let mut stmt = tx.prepare(&format!(
            "INSERT INTO staging ({column_list}) VALUES ({placeholders})"
        ))?;
        for record in &batch.records {
            let dates = [
                iso(record.data_doc),
                iso(record.vencliquid),
                iso(record.compensac),
                iso(record.data_base),
                iso(record.entrado_em),
            ];
            let params = record_params(record, batch, &dates);
            let refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            staged += stmt.execute(refs.as_slice())?;
        }
    }

    let merged = tx.execute(
        &format!(
            "INSERT INTO receivables ({column_list})
             SELECT {column_list} FROM staging
             WHERE doccompens IS NULL
                OR CAST(CAST(doccompens AS INTEGER) AS TEXT) NOT LIKE '9%'
                OR (tip IN ({allow_list}) AND mont_em_mi < 0)
             ON CONFLICT(key_unique) DO UPDATE SET {update_list}
             WHERE excluded.file_date >= receivables.file_date"
        ),
        [],
    )?;

    tx.execute_batch("DROP TABLE temp.staging;")?;
    tx.commit()?;

    Ok(MergeOutcome { staged, merged })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientType, ExtractState, FileTag};
    use chrono::NaiveDate;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        init_db(&conn).unwrap();
        (dir, conn)
    }

    fn tag(file_date: &str) -> FileTag {
        FileTag {
            file_name: format!("CISP_ABERTO_{}_.txt", file_date.replace('-', "_")),
            file_date: NaiveDate::parse_from_str(file_date, "%Y-%m-%d").unwrap(),
            state: ExtractState::ReceivablesDebit,
            processing_date: NaiveDate::from_ymd_opt(2023, 3, 10).unwrap(),
        }
    }

    fn record(key: &str, amount: f64) -> LedgerRecord {
        LedgerRecord {
            key_unique: Some(key.to_string()),
            conta: Some(12345.0),
            no_doc: Some("2000000123".to_string()),
            itm: Some(1.0),
            tip: Some("RV".to_string()),
            data_doc: NaiveDate::from_ymd_opt(2023, 3, 1),
            vencliquid: NaiveDate::from_ymd_opt(2023, 3, 5),
            mont_em_mi: Some(amount),
            no_id_fiscal_1: Some("12345678000199".to_string()),
            texto: Some("MARCH INVOICE".to_string()),
            tipo_de_cliente: Some(ClientType::Cnpj),
            ..Default::default()
        }
    }

    fn batch(file_date: &str, records: Vec<LedgerRecord>) -> IngestionBatch {
        IngestionBatch {
            tag: tag(file_date),
            records,
        }
    }

    fn row_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT count(*) FROM receivables", [], |r| r.get(0))
            .unwrap()
    }

    fn stored_amount(conn: &Connection, key: &str) -> f64 {
        conn.query_row(
            "SELECT mont_em_mi FROM receivables WHERE key_unique = ?1",
            [key],
            |r| r.get(0),
        )
        .unwrap()
    }

    #[test]
    fn test_merge_inserts_new_keys() {
        let (_dir, mut conn) = test_db();
        let outcome = merge_batch(&mut conn, &batch("2023-03-01", vec![record("k1", 100.0)])).unwrap();
        assert_eq!(outcome.staged, 1);
        assert_eq!(outcome.merged, 1);
        assert_eq!(row_count(&conn), 1);
        assert_eq!(stored_amount(&conn, "k1"), 100.0);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let (_dir, mut conn) = test_db();
        let b = batch("2023-03-01", vec![record("k1", 100.0)]);
        merge_batch(&mut conn, &b).unwrap();
        merge_batch(&mut conn, &b).unwrap();
        assert_eq!(row_count(&conn), 1);
        assert_eq!(stored_amount(&conn, "k1"), 100.0);
    }

    #[test]
    fn test_merge_newer_file_overwrites() {
        let (_dir, mut conn) = test_db();
        merge_batch(&mut conn, &batch("2023-03-01", vec![record("k1", 100.0)])).unwrap();
        merge_batch(&mut conn, &batch("2023-03-08", vec![record("k1", 250.0)])).unwrap();
        assert_eq!(row_count(&conn), 1);
        assert_eq!(stored_amount(&conn, "k1"), 250.0);
    }

    #[test]
    fn test_merge_older_file_never_regresses() {
        let (_dir, mut conn) = test_db();
        merge_batch(&mut conn, &batch("2023-03-08", vec![record("k1", 250.0)])).unwrap();
        merge_batch(&mut conn, &batch("2023-03-01", vec![record("k1", 100.0)])).unwrap();
        assert_eq!(row_count(&conn), 1);
        assert_eq!(stored_amount(&conn, "k1"), 250.0);
        let file_date: String = conn
            .query_row(
                "SELECT file_date FROM receivables WHERE key_unique = 'k1'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(file_date, "2023-03-08");
    }

    #[test]
    fn test_settled_rows_never_reach_the_store() {
        let (_dir, mut conn) = test_db();
        let mut settled = record("k1", 100.0);
        settled.doccompens = Some(9000000123.0);
        let outcome = merge_batch(&mut conn, &batch("2023-03-01", vec![settled])).unwrap();
        assert_eq!(outcome.staged, 1);
        assert_eq!(outcome.merged, 0);
        assert_eq!(row_count(&conn), 0);
    }

    #[test]
    fn test_cleared_by_other_counterparty_is_merged() {
        let (_dir, mut conn) = test_db();
        let mut cleared = record("k1", 100.0);
        cleared.doccompens = Some(2000000123.0);
        merge_batch(&mut conn, &batch("2023-03-01", vec![cleared])).unwrap();
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn test_settled_negative_adjustment_is_merged() {
        let (_dir, mut conn) = test_db();
        let mut adjustment = record("k1", -50.0);
        adjustment.doccompens = Some(9000000123.0);
        adjustment.tip = Some("Y4".to_string());
        merge_batch(&mut conn, &batch("2023-03-01", vec![adjustment])).unwrap();
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn test_merge_failure_leaves_store_untouched() {
        let (_dir, mut conn) = test_db();
        merge_batch(&mut conn, &batch("2023-03-01", vec![record("k1", 100.0)])).unwrap();
        // a record without a key violates the primary key NOT NULL constraint
        let mut keyless = record("k2", 10.0);
        keyless.key_unique = None;
        let err = merge_batch(&mut conn, &batch("2023-03-02", vec![keyless])).unwrap_err();
        assert!(matches!(err, FblrError::Merge(_)));
        assert_eq!(row_count(&conn), 1);
    }

    #[test]
    fn test_status_counts() {
        let (_dir, mut conn) = test_db();
        merge_batch(&mut conn, &batch("2023-03-01", vec![record("k1", 100.0)])).unwrap();
        merge_batch(&mut conn, &batch("2023-03-08", vec![record("k2", 20.0)])).unwrap();
        let s = status(&conn).unwrap();
        assert_eq!(s.rows, 2);
        assert_eq!(s.files, 2);
        assert_eq!(s.latest_file_date.as_deref(), Some("2023-03-08"));
    }
}
