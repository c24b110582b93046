//! User-facing output
//!
//! Command results and status lines go through [`DisplayProvider`] so
//! handlers can be tested without a terminal. Diagnostics go through
//! `tracing` instead.

pub mod live;
pub mod mock;
pub mod styling;

pub use live::LiveDisplayProvider;
pub use mock::{DisplayCall, MockDisplayProvider};
pub use styling::StyleManager;

/// Semantic output operations
pub trait DisplayProvider {
    /// `✓ message`
    fn success(&self, message: &str);

    /// `✗ message`, on stderr
    fn error(&self, message: &str);

    /// `! message`
    fn warning(&self, message: &str);

    /// `· message`
    fn info(&self, message: &str);

    /// Plain line
    fn message(&self, text: &str);

    fn emphasis(&self, text: &str);

    fn subtle(&self, text: &str);

    /// Heading for a block of output
    fn section(&self, title: &str);

    /// Aligned `Label: value` lines
    fn properties(&self, rows: &[(&str, &str)]);

    /// Start a busy indicator; it stops when the returned value is dropped
    fn busy(&self, message: &str) -> Box<dyn BusyIndicator>;
}

/// Handle to a running busy indicator
pub trait BusyIndicator {
    fn finish(&self);
}
