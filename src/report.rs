use crate::error::{FblrError, Result};

/// Leading column signature that identifies the header row.
const HEADER_SIGNATURE: &str = "|   St|";
/// Row-leader token shared by all data rows.
const ROW_LEADER: &str = "| ";
/// Label of the free-text column that is not reliably pipe-delimited.
const FREE_TEXT_LABEL: &str = "Texto";

/// Raw parse result: the report's declared header columns and one string
/// field per column per data row. Typing happens in the normalizer.
#[derive(Debug)]
pub struct ReportTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Character-offset span of the free-text column, computed once from the
/// header. The report is column-aligned, so the span holds for every row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeTextSpan {
    pub start: usize,
    pub end: usize,
}

impl FreeTextSpan {
    fn from_header(header: &str) -> Result<Self> {
        let label_at = header.find(FREE_TEXT_LABEL).ok_or_else(|| {
            FblrError::MalformedReport(format!(
                "header has no '{FREE_TEXT_LABEL}' column"
            ))
        })?;
        let pipe_rel = header[label_at..].find('|').ok_or_else(|| {
            FblrError::MalformedReport(format!(
                "'{FREE_TEXT_LABEL}' column is not closed by a delimiter"
            ))
        })?;
        let start = header[..label_at].chars().count();
        let end = start + header[label_at..label_at + pipe_rel].chars().count();
        Ok(Self { start, end })
    }
}

/// Decode the raw file: UTF-8 first, then a Latin-1-compatible single-byte
/// fallback (Windows-1252) for reports exported from older systems. The
/// fallback maps every byte value, so decoding is total.
pub fn decode_report(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

/// Shield the free-text span from the delimiter split by re-emitting it as a
/// quoted field. A row too short to cover the span means header and row
/// alignment have drifted, which must fail loudly.
fn shield_free_text(row: &str, span: FreeTextSpan) -> Result<String> {
    let chars: Vec<char> = row.chars().collect();
    if chars.len() < span.end {
        return Err(FblrError::MalformedReport(format!(
            "data row is shorter than the free-text span (len {} < {})",
            chars.len(),
            span.end
        )));
    }
    let mut shielded = String::with_capacity(row.len() + 2);
    shielded.extend(&chars[..span.start]);
    shielded.push('"');
    shielded.extend(&chars[span.start..span.end]);
    shielded.push('"');
    shielded.extend(&chars[span.end..]);
    Ok(shielded)
}

/// Parse the decoded report text into its declared columns and data rows.
///
/// The header is the first line carrying the fixed leading column signature;
/// data rows are the lines starting with the row-leader token. Every field
/// stays a string here so identifier-like columns lose nothing.
pub fn parse_report(text: &str) -> Result<ReportTable> {
    let lines: Vec<&str> = text.lines().map(|l| l.trim_end()).collect();

    let header = lines
        .iter()
        .find(|l| l.starts_with(HEADER_SIGNATURE))
        .copied()
        .ok_or_else(|| {
            FblrError::MalformedReport("no header row found in the file".to_string())
        })?;

    let span = FreeTextSpan::from_header(header)?;

    let mut shielded_rows = Vec::new();
    for line in &lines {
        if line.starts_with(ROW_LEADER) && !line.starts_with(HEADER_SIGNATURE) {
            shielded_rows.push(shield_free_text(line, span)?);
        }
    }
    if shielded_rows.is_empty() {
        return Err(FblrError::MalformedReport(
            "report contains no data rows".to_string(),
        ));
    }

    let mut table_text = String::from(header);
    for row in &shielded_rows {
        table_text.push('\n');
        table_text.push_str(row);
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'|')
        .has_headers(false)
        .flexible(true)
        .from_reader(table_text.as_bytes());

    let mut records = rdr.records();
    let columns: Vec<String> = records
        .next()
        .ok_or_else(|| FblrError::MalformedReport("empty report".to_string()))??
        .iter()
        .map(|c| c.trim().to_string())
        .collect();

    let mut rows = Vec::with_capacity(shielded_rows.len());
    for result in records {
        let record = result?;
        if record.len() != columns.len() {
            return Err(FblrError::MalformedReport(format!(
                "data row has {} fields, expected {}",
                record.len(),
                columns.len()
            )));
        }
        rows.push(record.iter().map(|f| f.trim().to_string()).collect());
    }

    Ok(ReportTable { columns, rows })
}
