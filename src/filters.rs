use crate::models::{ClientType, LedgerRecord};

/// Account numbers at or below this are control/summary accounts.
const MIN_ACCOUNT: f64 = 9999.0;
/// Amounts below this are noise unless the document type allows them.
const MIN_AMOUNT: f64 = 10.0;
/// Document types whose negative amounts are legitimate adjustments.
pub const NEGATIVE_ADJUSTMENT_TYPES: &[&str] = &["Y4", "X4", "DZ"];
/// Free-text marker for records in a disallowed debtor category.
const EXCLUDED_TEXT_MARKER: &str = "deudor";

pub fn account_ok(r: &LedgerRecord) -> bool {
    r.conta.map_or(false, |c| c > MIN_ACCOUNT)
}

pub fn fiscal_id_ok(r: &LedgerRecord) -> bool {
    r.no_id_fiscal_1.is_some()
}

pub fn amount_ok(r: &LedgerRecord) -> bool {
    let Some(amount) = r.mont_em_mi else {
        return false;
    };
    let adjustment_type = r
        .tip
        .as_deref()
        .map_or(false, |t| NEGATIVE_ADJUSTMENT_TYPES.contains(&t));
    amount >= MIN_AMOUNT || (adjustment_type && amount < 0.0)
}

pub fn texto_ok(r: &LedgerRecord) -> bool {
    r.texto
        .as_deref()
        .map_or(true, |t| !t.to_lowercase().contains(EXCLUDED_TEXT_MARKER))
}

pub fn dates_ok(r: &LedgerRecord) -> bool {
    match (r.vencliquid, r.data_doc) {
        (Some(due), Some(doc)) => due >= doc,
        _ => false,
    }
}

pub fn client_type_ok(r: &LedgerRecord) -> bool {
    r.tipo_de_cliente == Some(ClientType::Cnpj)
}

/// Apply the business-validity rules in their declared order. The chain is
/// pure; deduplication runs after it, never inside it.
pub fn apply_filters(records: Vec<LedgerRecord>) -> Vec<LedgerRecord> {
    records
        .into_iter()
        .filter(account_ok)
        .filter(fiscal_id_ok)
        .filter(amount_ok)
        .filter(texto_ok)
        .filter(dates_ok)
        .filter(client_type_ok)
        .collect()
}
