//! Human-readable rendering of server status and worker reports.

use gantry_common::{JobReport, ServerStatus};

use crate::output::{OutputContext, Tone};

/// Renders gantry's status and report types through an [`OutputContext`].
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Lines describing one server's provisioning state.
    #[must_use]
    pub fn status_lines(&self, status: &ServerStatus) -> Vec<String> {
        let ctx = self.ctx;
        let mut lines = vec![
            ctx.section(&format!("Server {} ({})", status.server_id, status.name)),
            ctx.field("Flavour:", &status.flavour),
            ctx.field("Stage:", &ctx.stage(status.stage)),
            ctx.field("SSH port:", &status.ssh_port.to_string()),
        ];
        lines.push(if status.done_setup {
            ctx.line(Tone::Done, "First-time setup complete")
        } else {
            ctx.line(Tone::Pending, "First-time setup not complete")
        });
        if status.in_progress {
            lines.push(ctx.line(Tone::Note, "An operation is in progress"));
        }
        if !status.pending_keys.is_empty() {
            lines.push(ctx.line(
                Tone::Note,
                &format!("Pending SSH keys: {}", status.pending_keys.join(", ")),
            ));
        }

        if !status.recent_log.is_empty() {
            lines.push(String::new());
            lines.push(ctx.section("Recent log:"));
            for entry in &status.recent_log {
                lines.push(ctx.field(
                    &entry.at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    &entry.message,
                ));
            }
        }
        lines
    }

    pub fn render_status(&self, status: &ServerStatus) {
        self.ctx.emit_lines(&self.status_lines(status));
    }

    /// One summary line per handled job, e.g.
    /// `provision server 10 (attempt 2): rescheduled`.
    #[must_use]
    pub fn report_line(report: &JobReport) -> String {
        let attempt = report
            .attempt
            .map(|n| format!(" (attempt {n})"))
            .unwrap_or_default();
        let line = format!(
            "{} server {}{attempt}: {}",
            report.job, report.server_id, report.outcome
        );
        match &report.error {
            Some(err) => format!("{line}: {err}"),
            None => line,
        }
    }

    /// Render the jobs a provisioning worker handled.
    pub fn render_reports(&self, reports: &[JobReport]) {
        for report in reports {
            self.ctx.emit(Tone::of_report(report), &Self::report_line(report));
        }
    }
}
