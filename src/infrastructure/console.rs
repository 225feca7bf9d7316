/// Terminal presentation adapter
/// Implements OperatorConsole with console styling and dialoguer prompts

use crate::domain::repositories::OperatorConsole;
use console::{style, Term};
use dialoguer::{theme::ColorfulTheme, Confirm};

const RULE: &str = "───────────────────────────────────────────";
const PROGRESS_WIDTH: usize = 20;

pub struct TerminalConsole {
    term: Term,
    theme: ColorfulTheme,
    /// Answer every prompt with "yes" without asking
    assume_yes: bool,
}

impl TerminalConsole {
    pub fn new(assume_yes: bool) -> Self {
        Self {
            term: Term::stdout(),
            theme: ColorfulTheme::default(),
            assume_yes,
        }
    }

    fn line(&self, text: &str) {
        // Presentation only; a closed stdout must not abort an operation.
        let _ = self.term.write_line(text);
    }

    fn key_values(&self, rows: &[(&str, String)]) {
        let width = rows.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
        for (key, value) in rows {
            self.line(&format!(
                "  {:<width$}  {}",
                format!("{}:", key),
                style(value).green(),
                width = width + 1
            ));
        }
    }
}

/// `[#########-----------]  45%`
fn progress_bar(percent: u8) -> String {
    let percent = percent.min(100) as usize;
    let filled = percent * PROGRESS_WIDTH / 100;
    format!(
        "[{}{}] {:>3}%",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled),
        percent
    )
}

impl OperatorConsole for TerminalConsole {
    fn header(&self, title: &str, subtitle: Option<&str>) {
        self.line("");
        self.line(&format!("  {}", style(title).bold().cyan()));
        if let Some(subtitle) = subtitle {
            self.line(&format!("  {}", style(subtitle).dim()));
        }
        self.line(&format!("  {}", RULE));
    }

    fn section(&self, title: &str) {
        self.line("");
        self.line(&format!("{} {}", style("▸").cyan(), style(title).bold()));
    }

    fn step(&self, message: &str) {
        self.line(&format!("  {} {}", style("→").dim(), message));
    }

    fn success(&self, message: &str) {
        self.line(&format!("  {} {}", style("✓").green(), message));
    }

    fn table(&self, title: Option<&str>, rows: &[(&str, String)]) {
        self.line("");
        if let Some(title) = title {
            self.line(&format!("  {}", style(title).bold()));
            self.line(&format!("  {}", RULE));
        }
        self.key_values(rows);
    }

    fn summary(&self, operation: &str, status: &str, details: &[(&str, String)]) {
        self.line("");
        self.line(&format!(
            "  {} {}",
            style(operation).bold(),
            style(status).green().bold()
        ));
        self.line(&format!("  {}", RULE));
        self.key_values(details);
        self.line("");
    }

    fn progress(&self, label: &str, percent: u8) {
        self.line(&format!("  {} {}", label, progress_bar(percent)));
    }

    fn confirm(&self, question: &str) -> bool {
        if self.assume_yes {
            tracing::debug!("Assuming yes: {}", question);
            return true;
        }

        match Confirm::with_theme(&self.theme)
            .with_prompt(question)
            .default(false)
            .interact()
        {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!("Could not prompt for confirmation, treating as no: {}", e);
                false
            }
        }
    }
}
