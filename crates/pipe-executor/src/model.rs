use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use synapse_core_types::RunId;

/// Pipe source value meaning "whatever page is in front".
pub const CURRENT_SOURCE: &str = "current";

const TEMPLATE_CONTEXT_CHARS: usize = 200;

/// A configured route from one chat surface to another.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipeDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source: String,
    pub target: String,
    pub transform_prompt: String,
    #[serde(default)]
    pub is_thinking_mode: bool,
    #[serde(default)]
    pub auto_submit: bool,
}

impl PipeDef {
    pub fn reads_current(&self) -> bool {
        self.source == CURRENT_SOURCE
    }

    /// Local transform used when the pipe is not in thinking mode.
    pub fn template_text(&self, context: &str) -> String {
        let excerpt: String = context.chars().take(TEMPLATE_CONTEXT_CHARS).collect();
        format!(
            "[PIPE OUTPUT from {}]\n\nTask: {}\n\nContext:\n{}...\n\n(Simulated Transformed Content Ready for Injection)",
            self.source, self.transform_prompt, excerpt
        )
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeStatus {
    #[default]
    Idle,
    Running,
    Success,
    Error,
}

impl PipeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipeStatus::Success | PipeStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipeStatus::Idle => "IDLE",
            PipeStatus::Running => "RUNNING",
            PipeStatus::Success => "SUCCESS",
            PipeStatus::Error => "ERROR",
        }
    }
}

impl fmt::Display for PipeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub line: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.at.format("%H:%M:%S%.3f"), self.line)
    }
}

/// One execution of a pipe.
#[derive(Clone, Debug, Serialize)]
pub struct PipeRun {
    pub id: RunId,
    pub pipe_id: String,
    pub source_platform: String,
    pub target_platform: String,
    pub status: PipeStatus,
    pub log: Vec<LogEntry>,
}

impl PipeRun {
    pub fn new(id: RunId, pipe: &PipeDef) -> Self {
        Self {
            id,
            pipe_id: pipe.id.clone(),
            source_platform: pipe.source.clone(),
            target_platform: pipe.target.clone(),
            status: PipeStatus::Running,
            log: Vec::new(),
        }
    }

    pub fn lines(&self) -> Vec<&str> {
        self.log.iter().map(|entry| entry.line.as_str()).collect()
    }
}

/// What the execution console shows. The last run's log stays visible after
/// the console returns to IDLE.
#[derive(Clone, Debug, Default, Serialize)]
pub struct PipeConsole {
    pub status: PipeStatus,
    pub running_pipe: Option<String>,
    pub last_run: Option<PipeRun>,
}

impl PipeConsole {
    pub fn lines(&self) -> Vec<&str> {
        self.last_run
            .as_ref()
            .map(PipeRun::lines)
            .unwrap_or_default()
    }

    pub fn is_busy(&self) -> bool {
        self.running_pipe.is_some()
    }
}

/// Staged delays that make progress observable, plus the settle window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageTimings {
    pub extract: Duration,
    pub transform: Duration,
    pub switch: Duration,
    pub settle: Duration,
    /// Upper bound on the external transform call. `None` waits indefinitely.
    pub transform_timeout: Option<Duration>,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            extract: Duration::from_millis(600),
            transform: Duration::from_millis(400),
            switch: Duration::from_millis(500),
            settle: Duration::from_millis(3000),
            transform_timeout: None,
        }
    }
}
