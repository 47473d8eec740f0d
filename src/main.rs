use anyhow::{Context, Result};
use cellflag::cli::{Cli, Commands, OutputArgs, ReconcileArgs, RenderArgs, RenderOptionArgs};
use cellflag::export::{save_document_json, save_grid_csv};
use cellflag::grid::Grid;
use cellflag::progress::{ProgressState, Stage, run_with_spinner};
use cellflag::reconcile::{ReconcileOptions, load_reconciliation};
use cellflag::report::{HtmlReportContext, save_html_report};
use cellflag::source::{ReportDocument, load_report};
use cellflag::summary::{SummaryContext, SummaryPaths, print_summary};
use chrono::{DateTime, Local};
use clap::Parser;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const RECONCILE_TITLE: &str = "Overtime Mismatch Report";

/// Everything one report run needs once its document is loaded.
struct Publication<'a> {
    title: String,
    source_label: String,
    render: &'a RenderOptionArgs,
    output: &'a OutputArgs,
    json_path: Option<&'a Path>,
    run_started_at: DateTime<Local>,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    colored::control::set_override(true);

    let cli = Cli::parse();
    match cli.command {
        Commands::Render(args) => run_render(&args).await,
        Commands::Reconcile(args) => run_reconcile(&args).await,
        Commands::Completions {
            shell,
            output_dir,
            install,
        } => cellflag::cli::generate_completions(shell, output_dir, install),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_render(args: &RenderArgs) -> Result<()> {
    let run_started_at = Local::now();
    let progress = ProgressState::new(!args.output.no_progress, true);
    let source_label = args.source.display().to_string();
    let document = run_with_spinner(
        &progress,
        Stage::Load,
        &source_label,
        load_report(&args.source),
    )
    .await?;

    let title = args.source.file_stem().map_or_else(
        || "Report".to_string(),
        |stem| format!("Report: {}", stem.to_string_lossy()),
    );
    publish(
        &progress,
        &document,
        &Publication {
            title,
            source_label,
            render: &args.render,
            output: &args.output,
            json_path: None,
            run_started_at,
        },
    )
    .await
}

async fn run_reconcile(args: &ReconcileArgs) -> Result<()> {
    let run_started_at = Local::now();
    let progress = ProgressState::new(!args.output.no_progress, true);
    let source_label = format!(
        "{} vs {}",
        args.imported.display(),
        args.system.display()
    );
    let options = ReconcileOptions {
        default_branch: args.branch.clone(),
    };
    let document = run_with_spinner(
        &progress,
        Stage::Load,
        &source_label,
        load_reconciliation(&args.imported, &args.system, &options),
    )
    .await?;

    publish(
        &progress,
        &document,
        &Publication {
            title: RECONCILE_TITLE.to_string(),
            source_label,
            render: &args.render,
            output: &args.output,
            json_path: args.save_json.as_deref(),
            run_started_at,
        },
    )
    .await
}

async fn publish(
    progress: &ProgressState,
    document: &ReportDocument,
    publication: &Publication<'_>,
) -> Result<()> {
    let options = publication.render.to_options();
    let grid = Grid::new(&document.columns, &options).context("invalid render options")?;
    let output = publication.output;

    let csv_path = run_with_spinner(progress, Stage::Save, "outputs", async {
        if let Some(path) = output.save_html.as_deref() {
            let context = HtmlReportContext {
                title: &publication.title,
                source_label: &publication.source_label,
                generated_at: &publication.run_started_at,
                grid: &grid,
                rows: &document.rows,
                full_output: output.full_output,
                minify: output.minify_html,
            };
            save_html_report(path, &context).await?;
        }
        let csv_path: Option<PathBuf> = match output.save_csv.as_deref() {
            Some(path) => Some(save_grid_csv(path, &grid, &document.rows, output.archive_csv).await?),
            None => None,
        };
        if let Some(path) = publication.json_path {
            save_document_json(path, document).await?;
        }
        Ok(csv_path)
    })
    .await?;
    progress.clear();

    tracing::info!(
        rows = document.rows.len(),
        flagged_rows = document.flagged_rows(),
        "report published"
    );
    print_summary(&SummaryContext {
        source_label: &publication.source_label,
        run_started_at: &publication.run_started_at,
        paths: SummaryPaths {
            html: output.save_html.as_deref(),
            csv: csv_path.as_deref(),
            json: publication.json_path,
        },
        grid: &grid,
        rows: &document.rows,
        full_output: output.full_output,
    });

    Ok(())
}
