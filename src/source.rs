use crate::cell::{CellValue, Column, MISMATCH_FIELDS_KEY, Row};
use crate::error::SourceError;
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::io::Read;
use std::path::Path;
use tokio::{fs, task};

/// Columns plus rows, as produced by a report query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportDocument {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl ReportDocument {
    pub fn flagged_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| row.mismatch().fields().is_some_and(|set| !set.is_empty()))
            .count()
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct RawDocument {
    pub(crate) columns: Vec<Column>,
    #[serde(default)]
    pub(crate) data: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Csv,
    CsvGz,
}

impl SourceFormat {
    pub fn from_path(path: &Path) -> Result<Self, SourceError> {
        if path.as_os_str().is_empty() {
            return Err(SourceError::EmptyPath);
        }
        let name = path.to_string_lossy().to_ascii_lowercase();
        if name.ends_with(".csv.gz") {
            Ok(Self::CsvGz)
        } else if name.ends_with(".csv") {
            Ok(Self::Csv)
        } else if name.ends_with(".json") {
            Ok(Self::Json)
        } else {
            Err(SourceError::UnsupportedFormat(path.display().to_string()))
        }
    }
}

pub async fn load_report(path: &Path) -> Result<ReportDocument> {
    let format = SourceFormat::from_path(path)?;
    let bytes = fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let document = task::spawn_blocking(move || parse_source(format, &bytes))
        .await
        .context("failed to join report parser")?
        .with_context(|| format!("failed to parse report {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        columns = document.columns.len(),
        rows = document.rows.len(),
        "loaded report document"
    );
    Ok(document)
}

pub fn parse_source(format: SourceFormat, bytes: &[u8]) -> Result<ReportDocument, SourceError> {
    match format {
        SourceFormat::Json => parse_json(bytes),
        SourceFormat::Csv => parse_csv(bytes),
        SourceFormat::CsvGz => parse_csv(GzDecoder::new(bytes)),
    }
}

pub fn parse_json(bytes: &[u8]) -> Result<ReportDocument, SourceError> {
    let raw: RawDocument = serde_json::from_slice(bytes)?;
    if raw.columns.is_empty() {
        return Err(SourceError::NoColumns);
    }
    if let Some(position) = raw.columns.iter().position(|c| c.fieldname.trim().is_empty()) {
        return Err(SourceError::InvalidDocument(format!(
            "column {} has an empty fieldname",
            position + 1
        )));
    }

    let rows = raw
        .data
        .iter()
        .enumerate()
        .map(|(index, record)| json_row(index, record))
        .collect();

    Ok(ReportDocument {
        columns: raw.columns,
        rows,
    })
}

fn json_row(index: usize, record: &Map<String, Value>) -> Row {
    let mut row = Row::new();
    for (field, value) in record {
        if field != MISMATCH_FIELDS_KEY {
            row.insert(field.as_str(), CellValue::from_json(value));
        }
    }

    match record.get(MISMATCH_FIELDS_KEY) {
        None | Some(Value::Null) => {}
        Some(Value::Array(items)) => {
            let names: Option<Vec<&str>> = items.iter().map(Value::as_str).collect();
            match names {
                Some(names) => row.flag_mismatches(names),
                None => mark_malformed(&mut row, index, "array contains non-string entries"),
            }
        }
        Some(other) => {
            let reason = format!("expected an array of field names, found {}", json_kind(other));
            mark_malformed(&mut row, index, &reason);
        }
    }
    row
}

fn mark_malformed(row: &mut Row, index: usize, reason: &str) {
    tracing::warn!(row = index + 1, reason, "malformed mismatch set; row renders unflagged");
    row.mark_malformed(reason);
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Parse a CSV report: the header gives the columns, an optional
/// `_mismatch_fields` column holds `;`-separated flagged field names.
pub fn parse_csv<R: Read>(reader: R) -> Result<ReportDocument, SourceError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let idx_mismatch = headers.iter().position(|h| h == MISMATCH_FIELDS_KEY);
    let fields: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| Some(*idx) != idx_mismatch)
        .map(|(idx, header)| (idx, header.trim().to_string()))
        .collect();
    if fields.is_empty() {
        return Err(SourceError::NoColumns);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row = Row::new();
        for (idx, field) in &fields {
            let raw = record.get(*idx).unwrap_or("");
            row.insert(field.as_str(), CellValue::from_csv_field(raw));
        }
        let flagged = idx_mismatch
            .and_then(|idx| record.get(idx))
            .map(split_field_list)
            .unwrap_or_default();
        if !flagged.is_empty() {
            row.flag_mismatches(flagged);
        }
        rows.push(row);
    }

    let columns = fields.into_iter().map(|(_, field)| Column::data(field)).collect();
    Ok(ReportDocument { columns, rows })
}

fn split_field_list(raw: &str) -> Vec<&str> {
    raw.split(';')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{FieldType, MismatchFlags};
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    const REPORT_JSON: &str = r#"{
        "columns": [
            {"fieldname": "employee", "label": "Employee"},
            {"fieldname": "over_time", "label": "Over Time", "fieldtype": "Float"}
        ],
        "data": [
            {"employee": "E1", "over_time": "5.5", "_mismatch_fields": ["over_time", "ghost"]},
            {"employee": "E2", "over_time": 5.5, "_mismatch_fields": []},
            {"employee": "E3", "over_time": null},
            {"employee": "E4", "over_time": 1, "_mismatch_fields": "over_time"},
            {"employee": "E5", "over_time": 1, "_mismatch_fields": [1, 2]}
        ]
    }"#;

    #[test]
    fn test_parse_json_reads_mismatch_sets() {
        let document = parse_json(REPORT_JSON.as_bytes()).unwrap();
        assert_eq!(document.columns.len(), 2);
        assert_eq!(document.columns[1].fieldtype, FieldType::Float);
        assert_eq!(document.rows.len(), 5);

        let first = &document.rows[0];
        assert!(first.is_flagged("over_time"));
        assert!(!first.has_field("_mismatch_fields"));
        assert_eq!(
            first.mismatch().fields().unwrap().sorted_fields(),
            vec!["over_time"]
        );

        assert!(matches!(document.rows[1].mismatch(), MismatchFlags::Fields(set) if set.is_empty()));
        assert_eq!(document.rows[2].mismatch(), &MismatchFlags::Absent);
        assert_eq!(document.rows[2].get("over_time"), Some(&CellValue::Null));
        assert!(matches!(document.rows[3].mismatch(), MismatchFlags::Malformed(_)));
        assert!(matches!(document.rows[4].mismatch(), MismatchFlags::Malformed(_)));
        assert_eq!(document.flagged_rows(), 1);
    }

    #[test]
    fn test_parse_json_rejects_missing_columns() {
        let result = parse_json(br#"{"columns": [], "data": []}"#);
        assert!(matches!(result, Err(SourceError::NoColumns)));
        let result = parse_json(br#"{"columns": [{"fieldname": " "}]}"#);
        assert!(matches!(result, Err(SourceError::InvalidDocument(_))));
        assert!(matches!(parse_json(b"[]"), Err(SourceError::Json(_))));
    }

    #[test]
    fn test_parse_csv_splits_mismatch_column() {
        let data = "employee,over_time,_mismatch_fields\nE1,5.5,over_time; employee\nE2,,\n";
        let document = parse_csv(data.as_bytes()).unwrap();
        assert_eq!(
            document
                .columns
                .iter()
                .map(Column::fieldname)
                .collect::<Vec<_>>(),
            vec!["employee", "over_time"]
        );
        assert!(document.rows[0].is_flagged("employee"));
        assert!(document.rows[0].is_flagged("over_time"));
        assert_eq!(document.rows[1].mismatch(), &MismatchFlags::Absent);
        assert_eq!(document.rows[1].get("over_time"), Some(&CellValue::Null));
    }

    #[test]
    fn test_parse_gzipped_csv() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"shift\nA\nB\n").unwrap();
        let bytes = encoder.finish().unwrap();
        let document = parse_source(SourceFormat::CsvGz, &bytes).unwrap();
        assert_eq!(document.rows.len(), 2);
        assert_eq!(document.rows[1].get("shift"), Some(&CellValue::from("B")));
    }

    #[test]
    fn test_format_from_path() {
        assert!(matches!(
            SourceFormat::from_path(Path::new("")),
            Err(SourceError::EmptyPath)
        ));
        assert_eq!(
            SourceFormat::from_path(Path::new("out/report.CSV.gz")).unwrap(),
            SourceFormat::CsvGz
        );
        assert_eq!(
            SourceFormat::from_path(Path::new("report.json")).unwrap(),
            SourceFormat::Json
        );
        assert!(matches!(
            SourceFormat::from_path(Path::new("report.xlsx")),
            Err(SourceError::UnsupportedFormat(_))
        ));
    }
}
