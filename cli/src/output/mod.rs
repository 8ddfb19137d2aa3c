//! Terminal output for `gantry` commands.
//!
//! [`OutputContext`] builds styled lines as strings and the `emit` methods
//! write them, so renderers are testable without capturing stdout. JSON mode
//! bypasses all of this through [`json`].

pub mod human;
pub mod json;
pub mod styles;

use std::io::IsTerminal as _;

use gantry_common::{JobReport, SetupStage};
use owo_colors::OwoColorize as _;
pub use human::HumanRenderer;
pub use styles::Styles;

/// How a line reads, which picks its marker and stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// The job finished or handed on to the next one.
    Done,
    /// Nothing failed but the server still needs a later run.
    Pending,
    /// The job returned an error. Written to stderr, even when quiet.
    Failed,
    Note,
}

impl Tone {
    fn marker(self) -> &'static str {
        match self {
            Self::Done => "✓",
            Self::Pending => "⚠",
            Self::Failed => "✗",
            Self::Note => "ℹ",
        }
    }

    /// Tone of one worker report. Outcome labels are the ones the provision
    /// command writes into `JobReport::outcome`.
    #[must_use]
    pub fn of_report(report: &JobReport) -> Self {
        if report.error.is_some() {
            return Self::Failed;
        }
        match report.outcome.as_str() {
            "completed" | "started" | "rescheduled" => Self::Done,
            _ => Self::Pending,
        }
    }
}

/// Styling and verbosity shared by every human-readable code path.
pub struct OutputContext {
    pub styles: Styles,
    /// Suppresses everything but [`Tone::Failed`] lines.
    pub quiet: bool,
}

impl OutputContext {
    /// Colors are on only for a terminal without `--no-color` or `NO_COLOR`.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let use_colors =
            !no_color && std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err();

        let mut styles = Styles::default();
        if use_colors {
            styles.colorize();
        }
        Self { styles, quiet }
    }

    #[must_use]
    pub fn line(&self, tone: Tone, msg: &str) -> String {
        format!("  {} {msg}", tone.marker().style(self.styles.tone(tone)))
    }

    #[must_use]
    pub fn section(&self, title: &str) -> String {
        format!("  {}", title.style(self.styles.header))
    }

    /// `key` dimmed, then `value`.
    #[must_use]
    pub fn field(&self, key: &str, value: &str) -> String {
        format!("  {}  {value}", key.style(self.styles.dim))
    }

    /// A setup checkpoint, colored by how far setup got.
    #[must_use]
    pub fn stage(&self, stage: SetupStage) -> String {
        let style = match stage {
            SetupStage::NotStarted => self.styles.dim,
            SetupStage::Complete => self.styles.done,
            _ => self.styles.pending,
        };
        stage.style(style).to_string()
    }

    /// Write one `tone` line: failures to stderr, the rest to stdout.
    pub fn emit(&self, tone: Tone, msg: &str) {
        if tone == Tone::Failed {
            eprintln!("{}", self.line(tone, msg));
        } else if !self.quiet {
            println!("{}", self.line(tone, msg));
        }
    }

    /// Write prebuilt stdout lines. Suppressed when `quiet`.
    pub fn emit_lines(&self, lines: &[String]) {
        if self.quiet {
            return;
        }
        for line in lines {
            println!("{line}");
        }
    }
}
