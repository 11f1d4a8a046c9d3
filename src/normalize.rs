use std::collections::HashMap;

use chrono::NaiveDate;

use crate::error::{FblrError, Result};
use crate::models::{ClientType, LedgerRecord};
use crate::report::ReportTable;

/// Fiscal-identifier lengths above this are corporate registrations.
const CORPORATE_ID_LEN: usize = 11;

/// Fold the Latin-1 letters the source system emits down to ASCII.
fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'Á' | 'À' | 'Â' | 'Ã' | 'Ä' => 'A',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'É' | 'È' | 'Ê' | 'Ë' => 'E',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'Í' | 'Ì' | 'Î' | 'Ï' => 'I',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' | 'º' => 'o',
            'Ó' | 'Ò' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'Ú' | 'Ù' | 'Û' | 'Ü' => 'U',
            'ç' => 'c',
            'Ç' => 'C',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ª' => 'a',
            other => other,
        })
        .collect()
}

/// Rename a source column to the stable internal identifier: diacritics
/// folded, lowercased, spaces/dots/colons mapped to underscores, slashes
/// removed. Blank header cells (the pipe-framing placeholders) become
/// `unnamed__<index>`.
pub fn normalize_column_name(name: &str, index: usize) -> String {
    if name.trim().is_empty() {
        return format!("unnamed__{index}");
    }
    fold_diacritics(name)
        .trim()
        .to_lowercase()
        .replace(' ', "_")
        .replace('.', "_")
        .replace('/', "")
        .replace(':', "_")
}

/// Parse a source-encoded number: `.` is a thousands separator, `,` the
/// decimal point, and a trailing `-` marks a negative value. Whitespace and
/// `*` filler are stripped first; an empty result is null.
pub fn parse_sap_number(raw: &str) -> Result<Option<f64>> {
    let cleaned = raw.trim().replace('*', "");
    let converted = cleaned.replace('.', "").replace(',', ".");
    if converted.is_empty() {
        return Ok(None);
    }
    let (digits, negative) = match converted.strip_suffix('-') {
        Some(rest) => (rest, true),
        None => (converted.as_str(), false),
    };
    let value: f64 = digits.parse().map_err(|_| {
        FblrError::MalformedReport(format!("not a source-format number: {raw:?}"))
    })?;
    Ok(Some(if negative { -value } else { value }))
}

/// Parse a `day.month.year` date; a blank field is null, not a sentinel.
pub fn parse_sap_date(raw: &str) -> Result<Option<NaiveDate>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%d.%m.%Y")
        .map(Some)
        .map_err(|_| FblrError::MalformedReport(format!("not a source-format date: {raw:?}")))
}

/// Derive the client classification from the fiscal identifier's length.
pub fn classify_fiscal_id(id: Option<&str>) -> Option<ClientType> {
    id.map(|v| {
        if v.chars().count() > CORPORATE_ID_LEN {
            ClientType::Cnpj
        } else {
            ClientType::Cpf
        }
    })
}

fn non_empty(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

struct ColumnView<'a> {
    index: &'a HashMap<String, usize>,
    row: &'a [String],
}

impl<'a> ColumnView<'a> {
    fn field(&self, name: &str) -> &'a str {
        self.index
            .get(name)
            .and_then(|&i| self.row.get(i))
            .map(|s| s.as_str())
            .unwrap_or("")
    }
}

const DECLARED_COLUMNS: &[&str] = &[
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
    "no_id_fiscal_1",
    "texto",
    "chvrefer_3",
    "doccompens",
];

/// Turn the raw parse into typed ledger records. Placeholder columns are
/// dropped by not being mapped; unknown extra columns are ignored.
pub fn normalize(table: &ReportTable) -> Result<Vec<LedgerRecord>> {
    let mut index = HashMap::new();
    for (i, name) in table.columns.iter().enumerate() {
        index.insert(normalize_column_name(name, i), i);
    }
    for required in DECLARED_COLUMNS {
        if !index.contains_key(*required) {
            return Err(FblrError::MalformedReport(format!(
                "report is missing the '{required}' column"
            )));
        }
    }

    let mut records = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let view = ColumnView { index: &index, row };
        let no_id_fiscal_1 = non_empty(view.field("no_id_fiscal_1"));
        let tipo_de_cliente = classify_fiscal_id(no_id_fiscal_1.as_deref());
        records.push(LedgerRecord {
            st: non_empty(view.field("st")),
            conta: parse_sap_number(view.field("conta"))?,
            no_doc: non_empty(view.field("no_doc_")),
            itm: parse_sap_number(view.field("itm"))?,
            tip: non_empty(view.field("tip")),
            data_doc: parse_sap_date(view.field("data_doc_"))?,
            vencliquid: parse_sap_date(view.field("vencliquid"))?,
            compensac: parse_sap_date(view.field("compensac_"))?,
            data_base: parse_sap_date(view.field("data_base"))?,
            entrado_em: parse_sap_date(view.field("entrado_em"))?,
            mont_em_mi: parse_sap_number(view.field("mont_em_mi"))?,
            datr: parse_sap_number(view.field("datr"))?,
            are: parse_sap_number(view.field("are"))?,
            conta_do_razao: parse_sap_number(view.field("conta_do_razao"))?,
            doccompens: parse_sap_number(view.field("doccompens"))?,
            no_id_fiscal_1,
            texto: non_empty(view.field("texto")),
            chvrefer_3: non_empty(view.field("chvrefer_3")),
            tipo_de_cliente,
            key_unique: None,
        });
    }
    Ok(records)
}
