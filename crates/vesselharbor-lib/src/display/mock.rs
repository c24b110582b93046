//! Recording display provider for tests

use super::{BusyIndicator, DisplayProvider};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Success(String),
    Error(String),
    Warning(String),
    Info(String),
    Message(String),
    Emphasis(String),
    Subtle(String),
    Section(String),
    Properties(Vec<(String, String)>),
    BusyStarted(String),
    BusyFinished,
}

/// Records every call for later assertions
#[derive(Clone, Default)]
pub struct MockDisplayProvider {
    calls: Arc<Mutex<Vec<DisplayCall>>>,
}

impl MockDisplayProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: DisplayCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    pub fn get_calls(&self) -> Vec<DisplayCall> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.clear();
        }
    }

    pub fn has_call(&self, expected: &DisplayCall) -> bool {
        self.get_calls().contains(expected)
    }

    /// Every plain `message` line, in order
    pub fn messages(&self) -> Vec<String> {
        self.get_calls()
            .into_iter()
            .filter_map(|call| match call {
                DisplayCall::Message(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Every line shown via `error`
    pub fn errors(&self) -> Vec<String> {
        self.get_calls()
            .into_iter()
            .filter_map(|call| match call {
                DisplayCall::Error(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// All recorded text, one entry per call, for substring assertions
    pub fn transcript(&self) -> String {
        self.get_calls()
            .iter()
            .map(|call| match call {
                DisplayCall::Success(text)
                | DisplayCall::Error(text)
                | DisplayCall::Warning(text)
                | DisplayCall::Info(text)
                | DisplayCall::Message(text)
                | DisplayCall::Emphasis(text)
                | DisplayCall::Subtle(text)
                | DisplayCall::Section(text)
                | DisplayCall::BusyStarted(text) => text.clone(),
                DisplayCall::Properties(rows) => rows
                    .iter()
                    .map(|(label, value)| format!("{label}: {value}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                DisplayCall::BusyFinished => String::new(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl DisplayProvider for MockDisplayProvider {
    fn success(&self, message: &str) {
        self.record(DisplayCall::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.record(DisplayCall::Error(message.to_string()));
    }

    fn warning(&self, message: &str) {
        self.record(DisplayCall::Warning(message.to_string()));
    }

    fn info(&self, message: &str) {
        self.record(DisplayCall::Info(message.to_string()));
    }

    fn message(&self, text: &str) {
        self.record(DisplayCall::Message(text.to_string()));
    }

    fn emphasis(&self, text: &str) {
        self.record(DisplayCall::Emphasis(text.to_string()));
    }

    fn subtle(&self, text: &str) {
        self.record(DisplayCall::Subtle(text.to_string()));
    }

    fn section(&self, title: &str) {
        self.record(DisplayCall::Section(title.to_string()));
    }

    fn properties(&self, rows: &[(&str, &str)]) {
        self.record(DisplayCall::Properties(
            rows.iter()
                .map(|(label, value)| (label.to_string(), value.to_string()))
                .collect(),
        ));
    }

    fn busy(&self, message: &str) -> Box<dyn BusyIndicator> {
        self.record(DisplayCall::BusyStarted(message.to_string()));
        Box::new(MockBusy {
            calls: Arc::clone(&self.calls),
        })
    }
}

struct MockBusy {
    calls: Arc<Mutex<Vec<DisplayCall>>>,
}

impl BusyIndicator for MockBusy {
    fn finish(&self) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(DisplayCall::BusyFinished);
        }
    }
}
