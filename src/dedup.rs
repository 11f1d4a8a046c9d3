use std::collections::HashSet;

use crate::error::{FblrError, Result};
use crate::models::LedgerRecord;

fn numeric_component(value: Option<f64>, name: &str) -> Result<i64> {
    value
        .map(|v| v as i64)
        .ok_or_else(|| FblrError::MalformedReport(format!("row has no {name} for key derivation")))
}

fn document_component(value: Option<&str>) -> Result<i64> {
    value
        .and_then(|v| v.trim().parse::<i64>().ok())
        .ok_or_else(|| {
            FblrError::MalformedReport(
                "row has no integral document number for key derivation".to_string(),
            )
        })
}

/// Derive the stable identity of a ledger line: account, document number and
/// item, each in canonical integer form (filler and leading zeros dropped).
pub fn derive_key(r: &LedgerRecord) -> Result<String> {
    let conta = numeric_component(r.conta, "account")?;
    let no_doc = document_component(r.no_doc.as_deref())?;
    let itm = numeric_component(r.itm, "item")?;
    Ok(format!("{conta}_{no_doc}_{itm}"))
}

/// Tag every surviving row with its unique key, then keep exactly one row
/// per key: the one with the latest document date. The sort is stable, so
/// ties resolve to the earliest original position.
pub fn dedup(mut records: Vec<LedgerRecord>) -> Result<Vec<LedgerRecord>> {
    for record in &mut records {
        record.key_unique = Some(derive_key(record)?);
    }
    records.sort_by(|a, b| b.data_doc.cmp(&a.data_doc));

    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.key_unique.clone().unwrap_or_default()));
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(no_doc: &str, day: u32) -> LedgerRecord {
        LedgerRecord {
            conta: Some(12345.0),
            no_doc: Some(no_doc.to_string()),
            itm: Some(1.0),
            data_doc: NaiveDate::from_ymd_opt(2023, 3, day),
            ..Default::default()
        }
    }

    #[test]
    fn test_derive_key_canonical_integers() {
        let mut r = record("0002000000123", 1);
        r.conta = Some(12345.0);
        assert_eq!(derive_key(&r).unwrap(), "12345_2000000123_1");
    }

    #[test]
    fn test_derive_key_requires_components() {
        let mut r = record("2000000123", 1);
        r.itm = None;
        assert!(matches!(
            derive_key(&r).unwrap_err(),
            FblrError::MalformedReport(_)
        ));
        let mut r = record("ABC", 1);
        r.no_doc = Some("ABC".to_string());
        assert!(derive_key(&r).is_err());
    }

    #[test]
    fn test_dedup_keeps_latest_document_date() {
        let older = record("2000000123", 1);
        let newer = record("2000000123", 9);
        let out = dedup(vec![older.clone(), newer.clone()]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data_doc, newer.data_doc);

        // same outcome regardless of input order
        let out = dedup(vec![newer.clone(), older]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].data_doc, newer.data_doc);
    }

    #[test]
    fn test_dedup_tie_keeps_first_occurrence() {
        let mut a = record("2000000123", 1);
        a.texto = Some("first".to_string());
        let mut b = record("2000000123", 1);
        b.texto = Some("second".to_string());
        let out = dedup(vec![a, b]).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].texto.as_deref(), Some("first"));
    }

    #[test]
    fn test_dedup_distinct_keys_survive() {
        let out = dedup(vec![
            record("2000000123", 1),
            record("2000000124", 1),
        ])
        .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_dedup_sets_key_on_every_row() {
        let out = dedup(vec![record("2000000123", 1)]).unwrap();
        assert_eq!(out[0].key_unique.as_deref(), Some("12345_2000000123_1"));
    }
}
