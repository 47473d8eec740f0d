//! Overtime reconciliation: compares an imported overtime sheet against the
//! attendance records held by the system and flags rows that disagree.

use crate::cell::{CellValue, Column, FieldType, Row};
use crate::error::SourceError;
use crate::formatting::{parse_number, round_half_away};
use crate::source::ReportDocument;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use rustc_hash::FxHashMap;
use std::io::Read;
use std::path::Path;
use tokio::{fs, task};

/// Largest overtime difference still treated as equal.
pub const MISMATCH_TOLERANCE: f64 = 0.0001;

pub const IMPORT_OVERTIME_FIELD: &str = "import_overtime";
pub const SYSTEM_OVERTIME_FIELD: &str = "system_overtime";

const EMPLOYEE_ALIASES: [&str; 3] = ["employee", "employee_id", "emp"];
const DATE_ALIASES: [&str; 2] = ["attendance_date", "date"];
const IMPORT_OVERTIME_ALIASES: [&str; 3] = ["over_time", "overtime", "ot"];
const SYSTEM_OVERTIME_ALIASES: [&str; 4] = [
    "custom_over_time",
    "over_time",
    "overtime_hours",
    "overtime_hours_in_seconds",
];
const SYSTEM_BRANCH_ALIASES: [&str; 2] = ["custom_branch", "branch"];
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d-%m-%Y", "%d/%m/%Y", "%Y/%m/%d"];

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedOvertime {
    pub employee: String,
    pub attendance_date: String,
    pub over_time: f64,
    pub shift: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub employee: String,
    pub attendance_date: String,
    pub over_time: f64,
    pub shift: Option<String>,
    pub branch: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Branch used for imported rows that name none.
    pub default_branch: Option<String>,
}

pub fn overtime_columns() -> Vec<Column> {
    vec![
        Column::new("branch", "Branch", FieldType::Data),
        Column::new("employee", "Employee", FieldType::Data),
        Column::new("attendance_date", "Date", FieldType::Date),
        Column::new(IMPORT_OVERTIME_FIELD, "Imported OT", FieldType::Float),
        Column::new(SYSTEM_OVERTIME_FIELD, "System OT", FieldType::Float),
        Column::new("shift", "Shift", FieldType::Data),
        Column::new("mismatch", "Mismatch", FieldType::Data),
    ]
}

pub async fn load_reconciliation(
    imported_path: &Path,
    system_path: &Path,
    options: &ReconcileOptions,
) -> Result<ReportDocument> {
    if imported_path.as_os_str().is_empty() {
        return Err(SourceError::EmptyPath.into());
    }
    let imported_bytes = fs::read(imported_path)
        .await
        .with_context(|| format!("failed to read {}", imported_path.display()))?;
    let system_bytes = fs::read(system_path)
        .await
        .with_context(|| format!("failed to read {}", system_path.display()))?;

    let (imported, attendance) = task::spawn_blocking(move || {
        let imported = read_imported(imported_bytes.as_slice())
            .context("failed to parse imported overtime sheet")?;
        let attendance = read_attendance(system_bytes.as_slice())
            .context("failed to parse attendance records")?;
        Ok::<_, anyhow::Error>((imported, attendance))
    })
    .await
    .context("failed to join reconciliation parser")??;

    Ok(reconcile(&imported, &attendance, options))
}

pub fn reconcile(
    imported: &[ImportedOvertime],
    attendance: &[AttendanceRecord],
    options: &ReconcileOptions,
) -> ReportDocument {
    let mut index: FxHashMap<(&str, &str), &AttendanceRecord> = FxHashMap::default();
    for record in attendance {
        index
            .entry((record.employee.as_str(), record.attendance_date.as_str()))
            .or_insert(record);
    }

    let mut mismatched = 0;
    let rows: Vec<Row> = imported
        .iter()
        .map(|entry| {
            let system = index
                .get(&(entry.employee.as_str(), entry.attendance_date.as_str()))
                .copied();
            let system_ot = system.map_or(0.0, |record| record.over_time);
            let mismatch = (entry.over_time - system_ot).abs() > MISMATCH_TOLERANCE;
            if mismatch {
                mismatched += 1;
            }

            let branch = entry
                .branch
                .clone()
                .or_else(|| options.default_branch.clone())
                .or_else(|| system.and_then(|record| record.branch.clone()))
                .unwrap_or_default();
            let shift = entry
                .shift
                .clone()
                .or_else(|| system.and_then(|record| record.shift.clone()))
                .unwrap_or_default();

            let row = Row::new()
                .with_value("branch", branch)
                .with_value("employee", entry.employee.as_str())
                .with_value("attendance_date", entry.attendance_date.as_str())
                .with_value(IMPORT_OVERTIME_FIELD, entry.over_time)
                .with_value(SYSTEM_OVERTIME_FIELD, system_ot)
                .with_value("shift", shift)
                .with_value("mismatch", if mismatch { "Yes" } else { "No" });

            if mismatch && system.is_some() {
                row.with_mismatches([IMPORT_OVERTIME_FIELD, SYSTEM_OVERTIME_FIELD])
            } else {
                row
            }
        })
        .collect();

    tracing::info!(rows = rows.len(), mismatched, "reconciled overtime");

    ReportDocument {
        columns: overtime_columns(),
        rows,
    }
}

pub fn read_imported<R: Read>(reader: R) -> Result<Vec<ImportedOvertime>, SourceError> {
    let mut reader = csv_reader(reader);
    let headers = HeaderIndex::new(reader.headers()?);
    let idx_employee = headers.require(&EMPLOYEE_ALIASES, "employee")?;
    let idx_date = headers.require(&DATE_ALIASES, "attendance_date")?;
    let idx_over_time = headers.positions(&IMPORT_OVERTIME_ALIASES);
    let idx_shift = headers.positions(&["shift"]);
    let idx_branch = headers.positions(&["branch"]);

    let mut entries = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let employee = first_value(&record, &idx_employee);
        let date = first_value(&record, &idx_date);
        let (Some(employee), Some(date)) = (employee, date) else {
            tracing::warn!(line = line + 2, "skipping imported row without employee or date");
            continue;
        };
        entries.push(ImportedOvertime {
            employee,
            attendance_date: normalize_date(&date),
            over_time: first_value(&record, &idx_over_time)
                .map_or(0.0, |raw| parse_overtime(&raw)),
            shift: first_value(&record, &idx_shift),
            branch: first_value(&record, &idx_branch),
        });
    }
    Ok(entries)
}

pub fn read_attendance<R: Read>(reader: R) -> Result<Vec<AttendanceRecord>, SourceError> {
    let mut reader = csv_reader(reader);
    let headers = HeaderIndex::new(reader.headers()?);
    let idx_employee = headers.require(&["employee"], "employee")?;
    let idx_date = headers.require(&DATE_ALIASES, "attendance_date")?;
    // The first overtime column the sheet carries wins, even when it is empty.
    let idx_over_time = headers.positions(&SYSTEM_OVERTIME_ALIASES).into_iter().next();
    let idx_shift = headers.positions(&["shift"]);
    let idx_branch = headers.positions(&SYSTEM_BRANCH_ALIASES);

    let mut records = Vec::new();
    for record in reader.records() {
        let record = record?;
        let employee = first_value(&record, &idx_employee);
        let date = first_value(&record, &idx_date);
        let (Some(employee), Some(date)) = (employee, date) else {
            continue;
        };
        let over_time = idx_over_time
            .and_then(|idx| record.get(idx))
            .and_then(|raw| parse_number(raw).ok())
            .unwrap_or(0.0);
        records.push(AttendanceRecord {
            employee,
            attendance_date: normalize_date(&date),
            over_time,
            shift: first_value(&record, &idx_shift),
            branch: first_value(&record, &idx_branch),
        });
    }
    Ok(records)
}

/// Imported overtime cell: blank or unparseable reads as zero, anything else
/// is rounded to two decimals.
pub fn parse_overtime(raw: &str) -> f64 {
    if raw.trim().is_empty() {
        return 0.0;
    }
    parse_number(raw)
        .ok()
        .and_then(|value| round_half_away(value, 2).parse::<f64>().ok())
        .unwrap_or(0.0)
}

pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase().replace(' ', "_")
}

/// Bring a date to ISO form when it matches a known layout; otherwise keep it.
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(trimmed, format).ok())
        .map_or_else(|| trimmed.to_string(), |date| date.format("%Y-%m-%d").to_string())
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader)
}

struct HeaderIndex(FxHashMap<String, usize>);

impl HeaderIndex {
    fn new(headers: &StringRecord) -> Self {
        let mut index = FxHashMap::default();
        for (idx, header) in headers.iter().enumerate() {
            index.entry(normalize_header(header)).or_insert(idx);
        }
        Self(index)
    }

    fn positions(&self, aliases: &[&str]) -> Vec<usize> {
        aliases
            .iter()
            .filter_map(|alias| self.0.get(*alias).copied())
            .collect()
    }

    fn require(&self, aliases: &[&str], name: &str) -> Result<Vec<usize>, SourceError> {
        let positions = self.positions(aliases);
        if positions.is_empty() {
            Err(SourceError::MissingColumn(name.to_string()))
        } else {
            Ok(positions)
        }
    }
}

fn first_value(record: &StringRecord, positions: &[usize]) -> Option<String> {
    positions
        .iter()
        .filter_map(|&idx| record.get(idx))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::MismatchFlags;

    fn imported(employee: &str, over_time: f64) -> ImportedOvertime {
        ImportedOvertime {
            employee: employee.to_string(),
            attendance_date: "2025-07-17".to_string(),
            over_time,
            shift: None,
            branch: None,
        }
    }

    fn attendance(employee: &str, over_time: f64) -> AttendanceRecord {
        AttendanceRecord {
            employee: employee.to_string(),
            attendance_date: "2025-07-17".to_string(),
            over_time,
            shift: Some("N".to_string()),
            branch: Some("North".to_string()),
        }
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header("  Employee ID "), "employee_id");
        assert_eq!(normalize_header("Over Time"), "over_time");
    }

    #[test]
    fn test_parse_overtime() {
        assert!(parse_overtime("").abs() < f64::EPSILON);
        assert!((parse_overtime("4.5") - 4.5).abs() < f64::EPSILON);
        assert!((parse_overtime("4.305") - 4.31).abs() < f64::EPSILON);
        assert!(parse_overtime("four").abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_date() {
        assert_eq!(normalize_date("17/07/2025"), "2025-07-17");
        assert_eq!(normalize_date(" 2025-07-17 "), "2025-07-17");
        assert_eq!(normalize_date("July 17"), "July 17");
    }

    #[test]
    fn test_read_imported_uses_aliases() {
        let data = "Employee ID,Date,OT,Shift\nE1,17/07/2025,4.5,A\nE2,2025-07-18,,\n,2025-07-18,1,\n";
        let entries = read_imported(data.as_bytes()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].employee, "E1");
        assert_eq!(entries[0].attendance_date, "2025-07-17");
        assert!((entries[0].over_time - 4.5).abs() < f64::EPSILON);
        assert_eq!(entries[0].shift.as_deref(), Some("A"));
        assert!(entries[1].over_time.abs() < f64::EPSILON);
        assert_eq!(entries[1].shift, None);
    }

    #[test]
    fn test_read_imported_requires_employee() {
        let result = read_imported("date,ot\n2025-07-17,1\n".as_bytes());
        assert!(matches!(result, Err(SourceError::MissingColumn(name)) if name == "employee"));
    }

    #[test]
    fn test_read_attendance_prefers_custom_overtime() {
        let data = "employee,attendance_date,over_time,custom_over_time,custom_branch\nE1,2025-07-17,9,2.5,South\n";
        let records = read_attendance(data.as_bytes()).unwrap();
        assert!((records[0].over_time - 2.5).abs() < f64::EPSILON);
        assert_eq!(records[0].branch.as_deref(), Some("South"));
    }

    #[test]
    fn test_matching_overtime_is_not_flagged() {
        let document = reconcile(
            &[imported("E1", 2.0)],
            &[attendance("E1", 2.0)],
            &ReconcileOptions::default(),
        );
        let row = &document.rows[0];
        assert_eq!(row.get("mismatch"), Some(&CellValue::from("No")));
        assert_eq!(row.mismatch(), &MismatchFlags::Absent);
        assert_eq!(row.get("branch"), Some(&CellValue::from("North")));
        assert_eq!(row.get("shift"), Some(&CellValue::from("N")));
    }

    #[test]
    fn test_differing_overtime_flags_both_fields() {
        let document = reconcile(
            &[imported("E1", 3.0)],
            &[attendance("E1", 2.0)],
            &ReconcileOptions::default(),
        );
        let row = &document.rows[0];
        assert_eq!(row.get("mismatch"), Some(&CellValue::from("Yes")));
        assert!(row.is_flagged(IMPORT_OVERTIME_FIELD));
        assert!(row.is_flagged(SYSTEM_OVERTIME_FIELD));
        assert!(!row.is_flagged("employee"));
    }

    #[test]
    fn test_missing_system_record_is_not_flagged() {
        let options = ReconcileOptions {
            default_branch: Some("HQ".to_string()),
        };
        let document = reconcile(&[imported("E9", 1.5)], &[attendance("E1", 2.0)], &options);
        let row = &document.rows[0];
        assert_eq!(row.get("mismatch"), Some(&CellValue::from("Yes")));
        assert_eq!(row.get(SYSTEM_OVERTIME_FIELD), Some(&CellValue::Number(0.0)));
        assert_eq!(row.get("branch"), Some(&CellValue::from("HQ")));
        assert_eq!(row.mismatch(), &MismatchFlags::Absent);
    }

    #[test]
    fn test_tolerance() {
        let document = reconcile(
            &[imported("E1", 2.000_05)],
            &[attendance("E1", 2.0)],
            &ReconcileOptions::default(),
        );
        assert_eq!(document.rows[0].get("mismatch"), Some(&CellValue::from("No")));
    }
}
