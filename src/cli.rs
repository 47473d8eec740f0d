use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate, generate_to};

use crate::formatting::DEFAULT_PRECISION;
use crate::grid::RenderOptions;
use crate::highlight::HighlightStyle;

pub const DEFAULT_HTML_PATH: &str = "data/output/report.html";
pub const DEFAULT_CSV_PATH: &str = "data/output/report.csv";
pub const DEFAULT_JSON_PATH: &str = "data/output/reconciliation.json";
pub const MAX_PRECISION: u8 = 12;

pub const SAVE_HTML_HELP: &str = "Save the HTML report to the given file (defaults to data/output/report.html when no path is provided).";
pub const SAVE_CSV_HELP: &str = "Save the rendered grid to the given CSV file (defaults to data/output/report.csv when no path is provided). Use --archive-csv to store a .gz instead.";
pub const SAVE_JSON_HELP: &str = "Save the reconciled document as JSON, loadable by `cellflag render` (defaults to data/output/reconciliation.json when no path is provided).";
pub const ARCHIVE_CSV_HELP: &str = "Archive the saved CSV output into a .gz file.";
pub const COLOR_HELP: &str = "CSS colour for flagged cells: #rgb, #rrggbb or a colour name. Defaults depend on --style.";
pub const DECIMAL_FIELD_HELP: &str = "Format this field as a fixed-precision decimal even if its column type is not numeric. Repeatable.";

#[derive(Debug, Parser)]
#[command(
    name = "cellflag",
    about = "Render tabular reports with mismatched cells highlighted and decimals normalised to a fixed precision.",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Render a JSON or CSV report document.
    Render(RenderArgs),
    /// Compare an imported overtime sheet with attendance records and render the result.
    Reconcile(ReconcileArgs),
    /// Generate shell completion scripts, optionally installing them for the current user.
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for.")]
        shell: Shell,
        #[arg(
            long,
            value_name = "DIR",
            help = "Directory to write the completion script to."
        )]
        output_dir: Option<PathBuf>,
        #[arg(
            long,
            help = "Install the completion script into the default location for the selected shell."
        )]
        install: bool,
    },
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    #[arg(
        value_name = "SOURCE",
        help = "Report document to render (.json, .csv or .csv.gz)."
    )]
    pub source: PathBuf,
    #[command(flatten)]
    pub render: RenderOptionArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    #[arg(long, value_name = "FILE", help = "Imported overtime sheet (CSV).")]
    pub imported: PathBuf,
    #[arg(long, value_name = "FILE", help = "System attendance records (CSV).")]
    pub system: PathBuf,
    #[arg(
        long,
        value_name = "NAME",
        help = "Branch used for imported rows that do not name one."
    )]
    pub branch: Option<String>,
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_JSON_PATH,
        help = SAVE_JSON_HELP
    )]
    pub save_json: Option<PathBuf>,
    #[command(flatten)]
    pub render: RenderOptionArgs,
    #[command(flatten)]
    pub output: OutputArgs,
}

#[derive(Debug, Args)]
pub struct RenderOptionArgs {
    #[arg(
        long,
        value_enum,
        default_value = "background",
        help = "How flagged cells are emphasised."
    )]
    pub style: HighlightStyle,
    #[arg(long, value_name = "CSS", help = COLOR_HELP)]
    pub color: Option<String>,
    #[arg(
        long,
        value_name = "DIGITS",
        default_value_t = default_precision(),
        value_parser = clap::value_parser!(u8).range(0..=12),
        help = "Digits after the decimal point for numeric cells."
    )]
    pub precision: u8,
    #[arg(long = "decimal-field", value_name = "FIELD", help = DECIMAL_FIELD_HELP)]
    pub decimal_fields: Vec<String>,
}

impl RenderOptionArgs {
    pub fn to_options(&self) -> RenderOptions {
        RenderOptions {
            style: self.style,
            color: self.color.clone(),
            precision: usize::from(self.precision),
            decimal_fields: self.decimal_fields.clone(),
        }
    }
}

#[derive(Debug, Args)]
pub struct OutputArgs {
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_HTML_PATH,
        help = SAVE_HTML_HELP
    )]
    pub save_html: Option<PathBuf>,
    #[arg(
        long,
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = DEFAULT_CSV_PATH,
        help = SAVE_CSV_HELP
    )]
    pub save_csv: Option<PathBuf>,
    #[arg(long, help = ARCHIVE_CSV_HELP)]
    pub archive_csv: bool,
    #[arg(long, help = "Minify the saved HTML report.")]
    pub minify_html: bool,
    #[arg(
        long,
        help = "Print and save every row instead of the abbreviated table."
    )]
    pub full_output: bool,
    #[arg(long, help = "Disable progress spinner output.")]
    pub no_progress: bool,
}

fn default_precision() -> u8 {
    u8::try_from(DEFAULT_PRECISION).unwrap_or(MAX_PRECISION)
}

pub fn generate_completions(
    shell: Shell,
    output_dir: Option<PathBuf>,
    install: bool,
) -> Result<()> {
    let mut command = Cli::command();
    let bin_name = command.get_name().to_string();

    let target_dir = if let Some(dir) = output_dir {
        Some(dir)
    } else if install {
        Some(default_install_dir(shell)?)
    } else {
        None
    };

    if let Some(dir) = target_dir {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create completion directory {}", dir.display()))?;
        let path = generate_to(shell, &mut command, bin_name, &dir)
            .context("failed to write completion file")?;
        println!("Installed {shell:?} completions to {}", path.display());
    } else {
        let mut stdout = io::stdout().lock();
        generate(shell, &mut command, bin_name, &mut stdout);
        stdout
            .flush()
            .context("failed to flush completion output")?;
    }

    Ok(())
}

fn default_install_dir(shell: Shell) -> Result<PathBuf> {
    let home = std::env::var_os("HOME").ok_or_else(|| {
        anyhow!("HOME environment variable is not set; use --output-dir to specify a path")
    })?;
    let mut path = PathBuf::from(home);

    match shell {
        Shell::Bash => path.push(".local/share/bash-completion/completions"),
        Shell::Elvish => path.push(".elvish/lib/completions"),
        Shell::Fish => path.push(".config/fish/completions"),
        Shell::PowerShell => path.push(".local/share/powershell/Scripts"),
        Shell::Zsh => path.push(".local/share/zsh/site-functions"),
        other => {
            return Err(anyhow!(
                "no default install location for {other:?}; specify --output-dir"
            ));
        }
    }
    Ok(path)
}
