//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

use crate::output::Tone;

/// Stylesheet for terminal output. Plain until [`Styles::colorize`] runs.
#[derive(Default, Clone)]
pub struct Styles {
    /// Finished work and a completed setup (green)
    pub done: Style,
    /// Work left for a later run (yellow)
    pub pending: Style,
    /// Failed jobs (red)
    pub failed: Style,
    /// Neutral notes (blue)
    pub note: Style,
    /// Keys, timestamps and an untouched stage
    pub dim: Style,
    /// Section titles
    pub header: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.done = Style::new().green();
        self.pending = Style::new().yellow();
        self.failed = Style::new().red();
        self.note = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.header = Style::new().bold().cyan();
    }

    /// Style of the marker in front of a `tone` line.
    #[must_use]
    pub fn tone(&self, tone: Tone) -> Style {
        match tone {
            Tone::Done => self.done,
            Tone::Pending => self.pending,
            Tone::Failed => self.failed,
            Tone::Note => self.note,
        }
    }
}
