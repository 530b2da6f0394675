//! Outcome of a refresh pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to one source during a refresh pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,

    /// Cache entries written. Zero when the source failed outright.
    pub entries: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub elapsed_ms: u64,
}

impl SourceOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-source outcomes of a combined refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceOutcome>,
}

impl RefreshReport {
    /// Sources that refreshed successfully.
    pub fn succeeded(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources.iter().filter(|s| s.is_ok())
    }

    /// Sources that failed.
    pub fn failed(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources.iter().filter(|s| !s.is_ok())
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// True when no source failed.
    pub fn is_complete(&self) -> bool {
        self.failed_count() == 0
    }

    /// Total cache entries written across sources.
    pub fn entries_written(&self) -> usize {
        self.sources.iter().map(|s| s.entries).sum()
    }

    /// `name: error` for every failed source, joined by `; `.
    pub fn failure_summary(&self) -> String {
        self.failed()
            .map(|s| format!("{}: {}", s.source, s.error.as_deref().unwrap_or_default()))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
