use std::path::Path;

use chrono::{Local, NaiveDate};
use regex::Regex;

use crate::error::{FblrError, Result};

/// Debit/credit classification carried in the extract's file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractState {
    ReceivablesDebit,
    ReceivablesCredit,
}

impl ExtractState {
    pub fn key(&self) -> &'static str {
        match self {
            Self::ReceivablesDebit => "receivables-debit",
            Self::ReceivablesCredit => "receivables-credit",
        }
    }
}

/// Client classification derived from the fiscal identifier's length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    Cnpj,
    Cpf,
}

impl ClientType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cnpj => "CNPJ",
            Self::Cpf => "CPF",
        }
    }
}

/// One normalized ledger line item. Field names follow the normalized
/// column names the rename rule produces from the source report header.
#[derive(Debug, Clone, Default)]
pub struct LedgerRecord {
    pub st: Option<String>,
    pub conta: Option<f64>,
    pub no_doc: Option<String>,
    pub itm: Option<f64>,
    pub tip: Option<String>,
    pub data_doc: Option<NaiveDate>,
    pub vencliquid: Option<NaiveDate>,
    pub compensac: Option<NaiveDate>,
    pub data_base: Option<NaiveDate>,
    pub entrado_em: Option<NaiveDate>,
    pub mont_em_mi: Option<f64>,
    pub datr: Option<f64>,
    pub are: Option<f64>,
    pub conta_do_razao: Option<f64>,
    pub doccompens: Option<f64>,
    pub no_id_fiscal_1: Option<String>,
    pub texto: Option<String>,
    pub chvrefer_3: Option<String>,
    pub tipo_de_cliente: Option<ClientType>,
    pub key_unique: Option<String>,
}

/// Metadata lifted from an arriving file's name before any parsing.
#[derive(Debug, Clone)]
pub struct FileTag {
    pub file_name: String,
    pub file_date: NaiveDate,
    pub state: ExtractState,
    pub processing_date: NaiveDate,
}

impl FileTag {
    /// Validates the file name: it must carry a state token (ABERTO or
    /// COMPENSADO) and an embedded DD_MM_YYYY date, e.g.
    /// `CISP_COMPENSADO_16_12_2020_.txt`.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| FblrError::InvalidFileName(path.display().to_string()))?
            .to_string();

        let state = if file_name.contains("ABERTO") {
            ExtractState::ReceivablesDebit
        } else if file_name.contains("COMPENSADO") {
            ExtractState::ReceivablesCredit
        } else {
            return Err(FblrError::InvalidFileName(format!(
                "{file_name}: expected a COMPENSADO or ABERTO token (e.g. CISP_COMPENSADO_16_12_2020_.txt)"
            )));
        };

        let date_re = Regex::new(r"\d{2}_\d{2}_\d{4}").expect("valid regex");
        let date_text = date_re
            .find(&file_name)
            .ok_or_else(|| {
                FblrError::InvalidFileName(format!(
                    "{file_name}: expected an embedded DD_MM_YYYY date"
                ))
            })?
            .as_str();
        let file_date = NaiveDate::parse_from_str(date_text, "%d_%m_%Y").map_err(|_| {
            FblrError::InvalidFileName(format!("{file_name}: {date_text} is not a valid date"))
        })?;

        Ok(Self {
            file_name,
            file_date,
            state,
            processing_date: Local::now().date_naive(),
        })
    }
}

/// The records produced from one file, ready for merge and archival.
#[derive(Debug)]
pub struct IngestionBatch {
    pub tag: FileTag,
    pub records: Vec<LedgerRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_file_tag_from_valid_name() {
        let tag =
            FileTag::from_path(&PathBuf::from("inbox/CISP_COMPENSADO_16_12_2020_.txt")).unwrap();
        assert_eq!(tag.state, ExtractState::ReceivablesCredit);
        assert_eq!(tag.file_date, NaiveDate::from_ymd_opt(2020, 12, 16).unwrap());
        assert_eq!(tag.file_name, "CISP_COMPENSADO_16_12_2020_.txt");
    }

    #[test]
    fn test_file_tag_debit_state() {
        let tag = FileTag::from_path(&PathBuf::from("CISP_ABERTO_01_03_2023_.txt")).unwrap();
        assert_eq!(tag.state, ExtractState::ReceivablesDebit);
    }

    #[test]
    fn test_file_tag_missing_state_token() {
        let err = FileTag::from_path(&PathBuf::from("CISP_16_12_2020_.txt")).unwrap_err();
        assert!(matches!(err, FblrError::InvalidFileName(_)));
    }

    #[test]
    fn test_file_tag_missing_date() {
        let err = FileTag::from_path(&PathBuf::from("CISP_ABERTO_.txt")).unwrap_err();
        assert!(matches!(err, FblrError::InvalidFileName(_)));
    }

    #[test]
    fn test_file_tag_rejects_impossible_date() {
        let err = FileTag::from_path(&PathBuf::from("CISP_ABERTO_99_99_2020_.txt")).unwrap_err();
        assert!(matches!(err, FblrError::InvalidFileName(_)));
    }
}
