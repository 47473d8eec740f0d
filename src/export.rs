use crate::cell::{Column, MISMATCH_FIELDS_KEY, Row};
use crate::grid::Grid;
use crate::source::{RawDocument, ReportDocument};
use anyhow::{Context, Result};
use csv::Writer;
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::fs;

pub async fn write_output_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    fs::write(path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    Ok(())
}

/// Write the grid as CSV, or as `<path>.gz` when `archive` is set.
/// Returns the path actually written.
pub async fn save_grid_csv(
    path: &Path,
    grid: &Grid<'_>,
    rows: &[Row],
    archive: bool,
) -> Result<PathBuf> {
    let serialized = serialize_grid_csv(grid, rows)?;
    if archive {
        let target = archive_path(path);
        let compressed = gzip_bytes(&serialized)?;
        write_output_file(&target, &compressed).await?;
        Ok(target)
    } else {
        write_output_file(path, &serialized).await?;
        Ok(path.to_path_buf())
    }
}

pub async fn save_document_json(path: &Path, document: &ReportDocument) -> Result<()> {
    let serialized = serialize_document_json(document)?;
    write_output_file(path, &serialized).await
}

/// Plain cell text per column plus a `_mismatch_fields` column, so the output
/// loads back as a CSV report source.
pub fn serialize_grid_csv(grid: &Grid<'_>, rows: &[Row]) -> Result<Vec<u8>> {
    let mut writer = Writer::from_writer(Vec::new());
    let mut header: Vec<&str> = grid.columns().iter().map(Column::fieldname).collect();
    header.push(MISMATCH_FIELDS_KEY);
    writer
        .write_record(&header)
        .context("failed to write report CSV header")?;

    for row in rows {
        let mut record: Vec<String> = grid
            .columns()
            .iter()
            .map(|column| grid.cell_text(row, column))
            .collect();
        record.push(
            row.mismatch()
                .fields()
                .map(|set| set.sorted_fields().join(";"))
                .unwrap_or_default(),
        );
        writer
            .write_record(&record)
            .context("failed to serialize report row")?;
    }
    finalize_writer(writer, "report CSV writer")
}

pub fn serialize_document_json(document: &ReportDocument) -> Result<Vec<u8>> {
    let raw = RawDocument {
        columns: document.columns.clone(),
        data: document.rows.iter().map(row_to_json).collect(),
    };
    serde_json::to_vec_pretty(&raw).context("failed to serialize report document")
}

fn row_to_json(row: &Row) -> Map<String, Value> {
    let mut record: Map<String, Value> = row
        .fields()
        .map(|(field, value)| {
            let json = serde_json::to_value(value).unwrap_or(Value::Null);
            (field.to_string(), json)
        })
        .collect();
    if let Some(set) = row.mismatch().fields() {
        let names = set
            .sorted_fields()
            .into_iter()
            .map(|name| Value::String(name.to_string()))
            .collect();
        record.insert(MISMATCH_FIELDS_KEY.to_string(), Value::Array(names));
    }
    record
}

pub fn archive_path(path: &Path) -> PathBuf {
    let mut archived = path.as_os_str().to_owned();
    archived.push(".gz");
    PathBuf::from(archived)
}

pub fn gzip_bytes(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(bytes)
        .context("failed to compress CSV output")?;
    encoder.finish().context("failed to finalize gzip stream")
}

fn finalize_writer(mut writer: Writer<Vec<u8>>, label: &str) -> Result<Vec<u8>> {
    writer
        .flush()
        .with_context(|| format!("failed to flush {label}"))?;
    writer
        .into_inner()
        .with_context(|| format!("failed to finalize {label}"))
}
