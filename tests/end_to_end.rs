use cellflag::cell::CellValue;
use cellflag::export::save_grid_csv;
use cellflag::grid::{Grid, RenderOptions};
use cellflag::highlight::HighlightStyle;
use cellflag::reconcile::{ReconcileOptions, load_reconciliation};
use cellflag::report::{HtmlReportContext, render_html_report};
use cellflag::source::{load_report, parse_json};
use chrono::Local;
use std::path::PathBuf;

const OVERTIME_REPORT: &str = r#"{
    "columns": [
        {"fieldname": "employee", "label": "Employee"},
        {"fieldname": "over_time", "label": "Over Time", "fieldtype": "Float"}
    ],
    "data": [
        {"employee": "HR-EMP-00001", "over_time": "5.5", "_mismatch_fields": ["over_time"]},
        {"employee": "HR-EMP-00002", "over_time": "5.5", "_mismatch_fields": []},
        {"employee": "HR-EMP-00003", "over_time": 2.675, "_mismatch_fields": "over_time"}
    ]
}"#;

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cellflag-{name}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn test_flagged_decimal_is_formatted_then_wrapped() {
    let document = parse_json(OVERTIME_REPORT.as_bytes()).unwrap();
    let grid = Grid::new(&document.columns, &RenderOptions::default()).unwrap();
    let over_time = &document.columns[1];

    let flagged = grid.render_cell(&document.rows[0], over_time);
    assert!(flagged.contains("5.50"));
    assert!(flagged.starts_with("<div class=\"mismatch mismatch-bg\""));

    assert_eq!(grid.render_cell(&document.rows[1], over_time), "5.50");
    // Malformed set: baseline only.
    assert_eq!(grid.render_cell(&document.rows[2], over_time), "2.68");
    assert_eq!(
        grid.render_cell(&document.rows[0], &document.columns[0]),
        "HR-EMP-00001"
    );
}

#[test]
fn test_text_style_report_page() {
    let document = parse_json(OVERTIME_REPORT.as_bytes()).unwrap();
    let options = RenderOptions {
        style: HighlightStyle::Text,
        color: Some("#AA0000".to_string()),
        ..RenderOptions::default()
    };
    let grid = Grid::new(&document.columns, &options).unwrap();
    let generated_at = Local::now();
    let html = render_html_report(&HtmlReportContext {
        title: "Overtime",
        source_label: "overtime.json",
        generated_at: &generated_at,
        grid: &grid,
        rows: &document.rows,
        full_output: true,
        minify: false,
    });
    assert!(html.contains("color:#aa0000;font-weight:bold;"));
    assert!(!html.contains("background-color:#aa0000"));
    assert!(html.contains("Highlight: text (#aa0000)"));
}

#[tokio::test]
async fn test_json_source_exports_csv_that_reloads() {
    let dir = scratch_dir("export");
    let source = dir.join("overtime.json");
    tokio::fs::write(&source, OVERTIME_REPORT).await.unwrap();

    let document = load_report(&source).await.unwrap();
    assert_eq!(document.rows.len(), 3);
    assert_eq!(document.flagged_rows(), 1);

    let grid = Grid::new(&document.columns, &RenderOptions::default()).unwrap();
    let written = save_grid_csv(&dir.join("report.csv"), &grid, &document.rows, true)
        .await
        .unwrap();
    assert_eq!(written, dir.join("report.csv.gz"));

    let reloaded = load_report(&written).await.unwrap();
    assert_eq!(reloaded.rows.len(), 3);
    assert!(reloaded.rows[0].is_flagged("over_time"));
    assert!(!reloaded.rows[1].is_flagged("over_time"));
    assert_eq!(
        reloaded.rows[2].get("over_time"),
        Some(&CellValue::from("2.68"))
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_reconciliation_flags_only_matched_mismatches() {
    let dir = scratch_dir("reconcile");
    let imported = dir.join("imported.csv");
    let system = dir.join("attendance.csv");
    tokio::fs::write(
        &imported,
        "Employee,Attendance Date,Over Time,Shift\n\
         E1,2024-03-01,2,Day\n\
         E2,01-03-2024,1.5,\n\
         E3,2024-03-01,4,Night\n",
    )
    .await
    .unwrap();
    tokio::fs::write(
        &system,
        "employee,attendance_date,custom_over_time,shift,custom_branch\n\
         E1,2024-03-01,2.00004,Day,North\n\
         E2,2024-03-01,3,Evening,South\n",
    )
    .await
    .unwrap();

    let options = ReconcileOptions {
        default_branch: None,
    };
    let document = load_reconciliation(&imported, &system, &options)
        .await
        .unwrap();
    assert_eq!(document.rows.len(), 3);

    let equal = &document.rows[0];
    assert_eq!(equal.get("mismatch"), Some(&CellValue::from("No")));
    assert!(!equal.is_flagged("import_overtime"));

    let differing = &document.rows[1];
    assert_eq!(differing.get("mismatch"), Some(&CellValue::from("Yes")));
    assert!(differing.is_flagged("import_overtime"));
    assert!(differing.is_flagged("system_overtime"));
    assert_eq!(differing.get("shift"), Some(&CellValue::from("Evening")));
    assert_eq!(differing.get("branch"), Some(&CellValue::from("South")));

    let unmatched = &document.rows[2];
    assert_eq!(unmatched.get("mismatch"), Some(&CellValue::from("Yes")));
    assert!(!unmatched.is_flagged("import_overtime"));

    let grid = Grid::new(&document.columns, &RenderOptions::default()).unwrap();
    let system_column = &document.columns[4];
    assert!(grid.render_cell(differing, system_column).contains("3.00"));
    assert_eq!(grid.render_cell(unmatched, system_column), "0.00");

    let _ = std::fs::remove_dir_all(&dir);
}
