//! Emergency reporting when no selector resolves.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::error;

use crate::resolver::SelectorAttempt;

#[derive(Clone, Debug, Serialize)]
pub struct EmergencyReport {
    pub url: String,
    pub action: String,
    pub attempts: Vec<SelectorAttempt>,
    pub outline: Vec<String>,
    pub at: DateTime<Utc>,
}

impl EmergencyReport {
    pub fn new(
        url: impl Into<String>,
        action: impl Into<String>,
        attempts: Vec<SelectorAttempt>,
        outline: Vec<String>,
    ) -> Self {
        Self {
            url: url.into(),
            action: action.into(),
            attempts,
            outline,
            at: Utc::now(),
        }
    }

    pub fn selectors(&self) -> Vec<&str> {
        self.attempts.iter().map(|a| a.selector.as_str()).collect()
    }
}

/// Fire-and-forget upload hook. Implementations must not block or fail.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, report: EmergencyReport);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LogDiagnostics;

impl DiagnosticSink for LogDiagnostics {
    fn report(&self, report: EmergencyReport) {
        let payload = serde_json::to_string(&report).unwrap_or_default();
        error!(
            target: "content-script",
            url = %report.url,
            action = %report.action,
            tried = ?report.selectors(),
            outline_len = report.outline.len(),
            %payload,
            "no input element found; emergency report filed"
        );
    }
}

/// Keeps reports in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    reports: Mutex<Vec<EmergencyReport>>,
}

impl RecordingDiagnostics {
    pub fn reports(&self) -> Vec<EmergencyReport> {
        self.reports.lock().clone()
    }
}

impl DiagnosticSink for RecordingDiagnostics {
    fn report(&self, report: EmergencyReport) {
        self.reports.lock().push(report);
    }
}
