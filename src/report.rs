use crate::cell::Row;
use crate::export::write_output_file;
use crate::grid::{Grid, RenderedRow};
use anyhow::Result;
use chrono::{DateTime, Local};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use minify_html::Cfg;
use std::path::Path;

/// Rows shown when the full table is not requested.
pub const COMPACT_ROW_LIMIT: usize = 25;

pub struct HtmlReportContext<'a> {
    pub title: &'a str,
    pub source_label: &'a str,
    pub generated_at: &'a DateTime<Local>,
    pub grid: &'a Grid<'a>,
    pub rows: &'a [Row],
    pub full_output: bool,
    pub minify: bool,
}

pub async fn save_html_report(output_path: &Path, context: &HtmlReportContext<'_>) -> Result<()> {
    let html = render_html_report(context);
    let bytes = if context.minify {
        minify_report(&html)
    } else {
        html.into_bytes()
    };
    write_output_file(output_path, &bytes).await
}

pub fn render_html_report(context: &HtmlReportContext<'_>) -> String {
    let rendered = context.grid.render_rows(context.rows);
    let total = rendered.len();
    let shown = if context.full_output {
        total
    } else {
        total.min(COMPACT_ROW_LIMIT)
    };
    let flagged_rows = rendered.iter().filter(|row| row.flagged > 0).count();
    let flagged_cells: usize = rendered.iter().map(|row| row.flagged).sum();
    let coverage = if shown == total {
        format!("Showing all {total} rows")
    } else {
        format!("Showing first {shown} of {total} rows")
    };
    let generated_at = context
        .generated_at
        .format("%Y-%m-%d %H:%M:%S %Z")
        .to_string();
    let cards = [
        ("Rows", total),
        ("Flagged rows", flagged_rows),
        ("Flagged cells", flagged_cells),
        ("Columns", context.grid.columns().len()),
    ];

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                meta name="color-scheme" content="light";
                title { (context.title) }
                style { (PreEscaped(REPORT_STYLE)) }
            }
            body {
                div.page {
                    header.hero {
                        div.pill { "cellflag v" (env!("CARGO_PKG_VERSION")) }
                        h1 { (context.title) }
                        p.subtitle {
                            "Cells that disagree with the reference data are highlighted."
                        }
                        div.meta {
                            div {
                                span.label { "Generated" }
                                span.value.mono { (generated_at) }
                            }
                            div {
                                span.label { "Source" }
                                span.value.mono { (context.source_label) }
                            }
                            div {
                                span.label { "Coverage" }
                                span.value.mono { (coverage) }
                            }
                        }
                    }
                    section.cards {
                        @for (label, value) in cards {
                            div.card {
                                div."card-label" { (label) }
                                div."card-value" { (value) }
                            }
                        }
                    }
                    section."table-section" {
                        div."section-header" {
                            h2 { "Report" }
                            @if shown < total {
                                div.hint { "Run with --full-output to include every row." }
                            }
                        }
                        div."table-wrap" {
                            (render_table(context.grid, &rendered[..shown]))
                        }
                    }
                    footer.footer {
                        "Highlight: " (context.grid.highlighter().style().name())
                        " (" (context.grid.highlighter().color()) ")"
                    }
                }
            }
        }
    }
    .into_string()
}

fn render_table(grid: &Grid<'_>, rows: &[RenderedRow]) -> Markup {
    let numeric: Vec<bool> = grid
        .columns()
        .iter()
        .map(|column| grid.is_numeric(column))
        .collect();
    html! {
        table {
            thead {
                tr {
                    @for column in grid.columns() {
                        th { (column.label()) }
                    }
                }
            }
            tbody {
                @if rows.is_empty() {
                    tr {
                        td.muted colspan=(grid.columns().len()) { "No rows." }
                    }
                }
                @for row in rows {
                    tr.flagged[row.flagged > 0] {
                        @for (cell, is_numeric) in row.cells.iter().zip(&numeric) {
                            td.num[*is_numeric] { (PreEscaped(cell)) }
                        }
                    }
                }
            }
        }
    }
}

fn minify_report(html: &str) -> Vec<u8> {
    let cfg = Cfg {
        minify_css: true,
        ..Cfg::default()
    };
    minify_html::minify(html.as_bytes(), &cfg)
}

const REPORT_STYLE: &str = r"
:root {
  color-scheme: light;
  --bg-top: #f6f3ec;
  --bg-bottom: #efe7db;
  --ink: #1f1b16;
  --muted: #6b635b;
  --card: #ffffff;
  --accent-cool: #3d405b;
  --border: #e2d6c6;
  --shadow: 0 24px 60px rgba(28, 25, 23, 0.12);
}

* {
  box-sizing: border-box;
}

body {
  margin: 0;
  font-family: 'Segoe UI', sans-serif;
  color: var(--ink);
  background: linear-gradient(150deg, var(--bg-top), var(--bg-bottom));
}

.page {
  max-width: 1200px;
  margin: 0 auto;
  padding: 48px 24px 64px;
}

.hero {
  background: linear-gradient(120deg, #ffffff, #fdf4ef);
  border: 1px solid var(--border);
  border-radius: 24px;
  padding: 32px 36px;
  box-shadow: var(--shadow);
}

.pill {
  display: inline-flex;
  padding: 6px 14px;
  border-radius: 999px;
  background: rgba(61, 64, 91, 0.12);
  color: var(--accent-cool);
  font-size: 13px;
  font-weight: 600;
  text-transform: uppercase;
  letter-spacing: 0.08em;
}

h1 {
  font-family: Georgia, serif;
  font-size: clamp(2rem, 4vw, 2.8rem);
  margin: 16px 0 8px;
}

.subtitle {
  margin: 0 0 16px;
  color: var(--muted);
}

.meta {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(220px, 1fr));
  gap: 12px;
}

.label,
.card-label {
  display: block;
  font-size: 12px;
  text-transform: uppercase;
  letter-spacing: 0.1em;
  color: var(--muted);
  margin-bottom: 4px;
}

.value {
  font-weight: 600;
}

.mono,
.num {
  font-family: ui-monospace, monospace;
}

.cards {
  display: grid;
  grid-template-columns: repeat(auto-fit, minmax(180px, 1fr));
  gap: 16px;
  margin: 28px 0;
}

.card {
  background: var(--card);
  border-radius: 18px;
  padding: 18px 20px;
  border: 1px solid var(--border);
}

.card-value {
  font-size: 26px;
  font-weight: 600;
  color: var(--accent-cool);
}

.section-header h2 {
  margin: 0 0 6px;
  font-family: Georgia, serif;
}

.hint,
.muted {
  color: var(--muted);
  font-size: 13px;
}

.table-wrap {
  border-radius: 20px;
  overflow: auto;
  border: 1px solid var(--border);
  background: var(--card);
  box-shadow: var(--shadow);
  max-height: 75vh;
}

table {
  width: 100%;
  border-collapse: collapse;
}

thead th {
  position: sticky;
  top: 0;
  background: var(--accent-cool);
  color: #f8fafc;
  text-align: left;
  font-size: 12px;
  text-transform: uppercase;
  letter-spacing: 0.08em;
  padding: 14px 16px;
}

tbody td {
  padding: 12px 16px;
  border-bottom: 1px solid rgba(226, 214, 198, 0.6);
  font-size: 14px;
}

tbody tr.flagged {
  box-shadow: inset 4px 0 0 #c62828;
}

.num {
  text-align: right;
  font-variant-numeric: tabular-nums;
}

.mismatch {
  margin: -12px -16px;
  padding: 12px 16px;
}

.footer {
  margin-top: 28px;
  color: var(--muted);
  font-size: 13px;
  text-align: center;
}
";
