use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Install,
    Remove,
    Start,
    Stop,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OperationKind::Install => "install",
            OperationKind::Remove => "remove",
            OperationKind::Start => "start",
            OperationKind::Stop => "stop",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Point-in-time view of an operation, returned by `GET /api/operations/:id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationSnapshot {
    pub id: String,
    pub module: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Error,
}

/// Discriminated union of SSE payloads emitted per operation. Each variant's
/// name is also used as the SSE `event:` field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationEvent {
    Progress {
        percent: u8,
        message: String,
    },
    Task {
        name: String,
        status: TaskStatus,
    },
    Log {
        level: LogLevel,
        line: String,
    },
    Complete {
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        duration_ms: u64,
    },
}

impl OperationEvent {
    /// Name used for the SSE `event:` line.
    pub fn event_name(&self) -> &'static str {
        match self {
            OperationEvent::Progress { .. } => "progress",
            OperationEvent::Task { .. } => "task",
            OperationEvent::Log { .. } => "log",
            OperationEvent::Complete { .. } => "complete",
        }
    }
}
