use anyhow::Result;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::future::Future;
use std::time::Duration;

const SPINNER_TICKS_COLORED: [&str; 8] = [
    "\x1b[1;91m⠁\x1b[0m",
    "\x1b[1;91m⠂\x1b[0m",
    "\x1b[1;91m⠄\x1b[0m",
    "\x1b[1;91m⡀\x1b[0m",
    "\x1b[1;91m⢀\x1b[0m",
    "\x1b[1;91m⠠\x1b[0m",
    "\x1b[1;91m⠐\x1b[0m",
    "\x1b[1;91m⠈\x1b[0m",
];
const SPINNER_TICKS_PLAIN: [&str; 8] = ["⠁", "⠂", "⠄", "⡀", "⢀", "⠠", "⠐", "⠈"];
const SPINNER_TICKS_ASCII: &str = "|/-\\";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    Save,
}

impl Stage {
    const TOTAL: u8 = 2;

    const fn index(self) -> u8 {
        match self {
            Self::Load => 1,
            Self::Save => 2,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Load => "Load",
            Self::Save => "Save",
        }
    }
}

/// Spinner host. A disabled state runs stages without drawing anything.
pub struct ProgressState {
    multi: Option<MultiProgress>,
    style: ProgressStyle,
}

impl ProgressState {
    pub fn new(enabled: bool, use_color: bool) -> Self {
        let multi = enabled.then(|| {
            let multi = MultiProgress::new();
            multi.set_draw_target(ProgressDrawTarget::stderr_with_hz(15));
            multi
        });
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        let style = if is_dumb_term() {
            style.tick_chars(SPINNER_TICKS_ASCII)
        } else if use_color {
            style.tick_strings(&SPINNER_TICKS_COLORED)
        } else {
            style.tick_strings(&SPINNER_TICKS_PLAIN)
        };
        Self { multi, style }
    }

    fn spinner(&self, message: String) -> Option<ProgressBar> {
        let multi = self.multi.as_ref()?;
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_style(self.style.clone());
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    }

    pub fn clear(&self) {
        if let Some(multi) = &self.multi {
            let _ = multi.clear();
        }
    }
}

fn is_dumb_term() -> bool {
    std::env::var("TERM").is_ok_and(|term| term.eq_ignore_ascii_case("dumb"))
}

fn format_stage_message(stage: Stage, label: &str) -> String {
    let prefix = format!("[{}/{}]", stage.index(), Stage::TOTAL);
    format!(
        "{} {}: {}",
        prefix.bright_yellow().bold(),
        stage.label().bright_cyan().bold(),
        label.bright_white().bold()
    )
}

pub async fn run_with_spinner<T>(
    progress: &ProgressState,
    stage: Stage,
    label: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    let Some(bar) = progress.spinner(format_stage_message(stage, label)) else {
        return fut.await;
    };
    let result = fut.await;
    let outcome = if result.is_ok() {
        "done".bright_green().bold()
    } else {
        "failed".bright_red().bold()
    };
    bar.finish_with_message(format!("{} {outcome}", format_stage_message(stage, label)));
    result
}
