//! Terminal-backed display provider

use super::styling::StyleManager;
use super::{BusyIndicator, DisplayProvider};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::IsTerminal;
use std::time::Duration;

/// Writes results to stdout and errors to stderr
pub struct LiveDisplayProvider {
    styling: StyleManager,
    spinners: bool,
}

impl LiveDisplayProvider {
    pub fn new() -> Self {
        Self {
            styling: StyleManager::detect(),
            spinners: std::io::stderr().is_terminal(),
        }
    }
}

impl Default for LiveDisplayProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayProvider for LiveDisplayProvider {
    fn success(&self, message: &str) {
        println!("{}", self.styling.format_success(message));
    }

    fn error(&self, message: &str) {
        eprintln!("{}", self.styling.format_error(message));
    }

    fn warning(&self, message: &str) {
        eprintln!("{}", self.styling.format_warning(message));
    }

    fn info(&self, message: &str) {
        println!("{}", self.styling.format_info(message));
    }

    fn message(&self, text: &str) {
        println!("{text}");
    }

    fn emphasis(&self, text: &str) {
        println!("{}", self.styling.emphasis(text));
    }

    fn subtle(&self, text: &str) {
        println!("{}", self.styling.subtle(text));
    }

    fn section(&self, title: &str) {
        println!();
        println!("{}", self.styling.emphasis(title));
    }

    fn properties(&self, rows: &[(&str, &str)]) {
        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        for (label, value) in rows {
            println!("{:<width$}  {value}", format!("{label}:"), width = width + 1);
        }
    }

    fn busy(&self, message: &str) -> Box<dyn BusyIndicator> {
        let bar = if self.spinners {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
                bar.set_style(style);
            }
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        bar.set_message(message.to_string());
        Box::new(Spinner { bar })
    }
}

struct Spinner {
    bar: ProgressBar,
}

impl BusyIndicator for Spinner {
    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
        }
    }
}
