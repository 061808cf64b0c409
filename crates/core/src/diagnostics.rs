//! Non-fatal problems collected while scanning providers.

use std::fmt;

use tracing::warn;

/// A single human-readable problem reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Name of the component that reported the problem.
    pub source: String,
    /// Description of what went wrong.
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.source, self.message)
    }
}

/// Ordered collection of diagnostics gathered during one catalog load.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    /// Create an empty diagnostics list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a problem and emit it as a warning.
    pub fn report(&mut self, source: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(source, "{message}");
        self.entries.push(Diagnostic {
            source: source.to_string(),
            message,
        });
    }

    /// Record an error chain as a single diagnostic.
    pub fn report_error(&mut self, source: &str, err: &anyhow::Error) {
        self.report(source, format!("{err:#}"));
    }

    /// Number of recorded diagnostics.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no problems were reported.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over recorded diagnostics in report order.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    /// Diagnostics reported by a given source.
    pub fn from_source<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a Diagnostic> + 'a {
        self.entries.iter().filter(move |entry| entry.source == source)
    }
}
