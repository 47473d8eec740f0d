use crate::cell::Row;
use crate::grid::Grid;
use crate::highlight::HighlightStyle;
use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use std::path::Path;

const COMPACT_ROW_LIMIT: usize = 10;
const MAX_CELL_WIDTH: usize = 24;

pub struct SummaryPaths<'a> {
    pub html: Option<&'a Path>,
    pub csv: Option<&'a Path>,
    pub json: Option<&'a Path>,
}

pub struct SummaryContext<'a> {
    pub source_label: &'a str,
    pub run_started_at: &'a DateTime<Local>,
    pub paths: SummaryPaths<'a>,
    pub grid: &'a Grid<'a>,
    pub rows: &'a [Row],
    pub full_output: bool,
}

pub fn print_summary(context: &SummaryContext<'_>) {
    println!();
    print_summary_header(context);
    print_summary_paths(&context.paths);
    println!();
    println!("{}", "Report".bold().bright_magenta());
    let table_width = print_report_table(context.grid, context.rows, context.full_output);
    if table_width > 0 {
        let divider = "=".repeat(table_width);
        println!("{}", divider.bright_cyan());
    }
}

fn print_summary_header(context: &SummaryContext<'_>) {
    let flagged_rows = context
        .rows
        .iter()
        .filter(|row| {
            context
                .grid
                .columns()
                .iter()
                .any(|column| row.is_flagged(column.fieldname()))
        })
        .count();
    println!(
        "{}",
        "====================== cellflag report ======================"
            .bold()
            .bright_cyan()
    );
    println!(
        "{} {}",
        "Run started".bright_yellow().bold(),
        context
            .run_started_at
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string()
            .bright_white()
    );
    println!(
        "{} {}",
        "Source".bright_yellow().bold(),
        context.source_label.bright_white()
    );
    println!(
        "{} {} | {} | {}",
        "Rows".bright_yellow().bold(),
        format!("Total: {}", context.rows.len()).bright_white(),
        format!("Flagged: {flagged_rows}").bright_white(),
        format!("Columns: {}", context.grid.columns().len()).bright_white()
    );
}

fn print_summary_paths(paths: &SummaryPaths<'_>) {
    print_path_line("HTML Report", paths.html, "not saved (use --save-html)");
    print_path_line("CSV Export", paths.csv, "not saved (use --save-csv)");
    if paths.json.is_some() {
        print_path_line("JSON Document", paths.json, "");
    }
}

fn print_path_line(label: &str, path: Option<&Path>, hint: &str) {
    let label_colored = label.bright_yellow().bold();
    match path {
        Some(path) => println!(
            "{} {}",
            label_colored,
            format!("{}", path.display()).bright_white()
        ),
        None => println!("{} {}", label_colored, hint.bright_black()),
    }
}

fn print_report_table(grid: &Grid<'_>, rows: &[Row], full_output: bool) -> usize {
    if rows.is_empty() {
        let message = "No rows in report.";
        println!("{}", message.bright_black());
        return message.len();
    }

    let shown = if full_output {
        rows.len()
    } else {
        rows.len().min(COMPACT_ROW_LIMIT)
    };
    let cells: Vec<Vec<String>> = rows[..shown]
        .iter()
        .map(|row| {
            grid.columns()
                .iter()
                .map(|column| grid.cell_text(row, column))
                .collect()
        })
        .collect();
    let labels: Vec<&str> = grid.columns().iter().map(|column| column.label()).collect();
    let widths = column_widths(&labels, &cells);

    let header = labels
        .iter()
        .zip(&widths)
        .map(|(label, width)| fit_cell(label, *width))
        .collect::<Vec<_>>()
        .join(" | ");
    let separator = widths
        .iter()
        .map(|width| "-".repeat(*width))
        .collect::<Vec<_>>()
        .join("-+-");
    let mut max_width = header.chars().count().max(separator.len());
    println!("{}", header.bold().bright_white());
    println!("{}", separator.bright_black());

    let style = grid.highlighter().style();
    for (row, texts) in rows.iter().zip(&cells) {
        let line: Vec<String> = grid
            .columns()
            .iter()
            .zip(texts)
            .zip(&widths)
            .map(|((column, text), width)| {
                let fitted = fit_cell(text, *width);
                paint_cell(&fitted, row.is_flagged(column.fieldname()), style).to_string()
            })
            .collect();
        println!("{}", line.join(" | "));
    }

    if rows.len() > shown {
        let message = format!(
            "... {} more rows (use --full-output to display all).",
            rows.len() - shown
        );
        max_width = max_width.max(message.len());
        println!("{}", message.bright_black());
    }

    max_width
}

fn paint_cell(text: &str, flagged: bool, style: HighlightStyle) -> ColoredString {
    match (flagged, style) {
        (false, _) => text.bright_green(),
        (true, HighlightStyle::Background) => text.black().on_bright_red(),
        (true, HighlightStyle::Text) => text.bright_red().bold(),
    }
}

fn column_widths(labels: &[&str], cells: &[Vec<String>]) -> Vec<usize> {
    labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let widest_cell = cells
                .iter()
                .filter_map(|row| row.get(idx))
                .map(|text| text.chars().count())
                .max()
                .unwrap_or(0);
            label.chars().count().max(widest_cell).min(MAX_CELL_WIDTH)
        })
        .collect()
}

/// Pad `text` to `width` characters, truncating with an ellipsis when longer.
fn fit_cell(text: &str, width: usize) -> String {
    let length = text.chars().count();
    if length <= width {
        format!("{text:<width$}")
    } else {
        let mut truncated: String = text.chars().take(width.saturating_sub(1)).collect();
        truncated.push('…');
        truncated
    }
}
