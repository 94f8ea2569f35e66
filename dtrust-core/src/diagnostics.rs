//! Named fallback outcomes
//!
//! Collectors never fail. Whenever one skips an input, truncates a walk or
//! swallows a collaborator failure it records a [`Diagnostic`] so the report
//! states exactly which parts are partial.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Which fallback path was taken
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Input absent; contributes no signal
    Missing,
    /// Input present but unparseable at some granularity; that part was skipped
    Malformed,
    /// Entry limit or deadline reached; result is partial
    Exhausted,
    /// A pluggable collaborator failed; its contribution is empty
    ProbeFailed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    /// Collector that recorded the outcome (`repos.apt`, `shadow`, ...)
    pub collector: String,
    pub kind: DiagnosticKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub detail: String,
}

/// Per-scan sink for diagnostics
///
/// Owned by whoever drives the collectors; collectors only borrow it.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn missing(&mut self, collector: &str, path: &Path, detail: impl Into<String>) {
        let detail = detail.into();
        debug!(collector, path = %path.display(), "{}", detail);
        self.push(collector, DiagnosticKind::Missing, Some(path), detail);
    }

    pub fn malformed(&mut self, collector: &str, path: &Path, detail: impl Into<String>) {
        let detail = detail.into();
        debug!(collector, path = %path.display(), "Skipping malformed input: {}", detail);
        self.push(collector, DiagnosticKind::Malformed, Some(path), detail);
    }

    pub fn exhausted(&mut self, collector: &str, path: &Path, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(collector, path = %path.display(), "Result truncated: {}", detail);
        self.push(collector, DiagnosticKind::Exhausted, Some(path), detail);
    }

    pub fn probe_failed(&mut self, collector: &str, detail: impl Into<String>) {
        let detail = detail.into();
        warn!(collector, "Probe failed, contributing no findings: {}", detail);
        self.push(collector, DiagnosticKind::ProbeFailed, None, detail);
    }

    fn push(&mut self, collector: &str, kind: DiagnosticKind, path: Option<&Path>, detail: String) {
        self.entries.push(Diagnostic {
            collector: collector.to_string(),
            kind,
            path: path.map(Path::to_path_buf),
            detail,
        });
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries.iter().filter(|d| d.kind == kind).count()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
