//! Semantic colours and symbols on top of `console`

use console::Style;

/// Symbols, with an ASCII fallback for terminals without unicode
#[derive(Debug, Clone, Copy)]
struct Symbols {
    success: &'static str,
    error: &'static str,
    warning: &'static str,
    info: &'static str,
    bullet: &'static str,
}

const UNICODE: Symbols = Symbols {
    success: "✓",
    error: "✗",
    warning: "!",
    info: "·",
    bullet: "•",
};

const ASCII: Symbols = Symbols {
    success: "+",
    error: "x",
    warning: "!",
    info: "-",
    bullet: "*",
};

#[derive(Debug, Clone)]
pub struct StyleManager {
    color: bool,
    symbols: Symbols,
}

impl StyleManager {
    pub fn new(color: bool, unicode: bool) -> Self {
        Self {
            color,
            symbols: if unicode { UNICODE } else { ASCII },
        }
    }

    /// Detect colour and unicode support of stdout
    pub fn detect() -> Self {
        let term = console::Term::stdout();
        Self::new(
            console::colors_enabled() && term.is_term(),
            term.features().wants_emoji(),
        )
    }

    pub fn plain() -> Self {
        Self::new(false, false)
    }

    fn paint(&self, style: Style, text: &str) -> String {
        if self.color {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn format_success(&self, message: &str) -> String {
        format!("{} {message}", self.paint(Style::new().green(), self.symbols.success))
    }

    pub fn format_error(&self, message: &str) -> String {
        format!("{} {message}", self.paint(Style::new().red().bold(), self.symbols.error))
    }

    pub fn format_warning(&self, message: &str) -> String {
        format!("{} {message}", self.paint(Style::new().yellow(), self.symbols.warning))
    }

    pub fn format_info(&self, message: &str) -> String {
        format!("{} {message}", self.paint(Style::new().cyan(), self.symbols.info))
    }

    pub fn emphasis(&self, text: &str) -> String {
        self.paint(Style::new().bold(), text)
    }

    pub fn subtle(&self, text: &str) -> String {
        self.paint(Style::new().dim(), text)
    }

    pub fn bullet(&self) -> &'static str {
        self.symbols.bullet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_styles_have_no_escape_codes() {
        let styling = StyleManager::plain();
        assert_eq!(styling.format_success("saved"), "+ saved");
        assert_eq!(styling.format_error("failed"), "x failed");
        assert_eq!(styling.emphasis("title"), "title");
    }

    #[test]
    fn test_colored_styles_wrap_symbols() {
        let styling = StyleManager::new(true, true);
        let rendered = styling.format_success("saved");
        assert!(rendered.contains('\u{1b}'));
        assert!(rendered.contains('✓'));
        assert!(rendered.ends_with(" saved"));
    }
}
