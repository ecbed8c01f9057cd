//! Normalized event types shared between adapters and the Vigil engine.
//!
//! This crate is shared by the engine and the editor-specific adapters
//! (Claude Code hooks, Codex notify wrappers, OpenCode plugins) to prevent
//! schema drift. The engine remains the authority on interpretation, but
//! adapters reuse the same types to emit well-formed events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle events an assistant adapter can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ToolStart,
    ToolEnd,
    TurnEnd,
    Error,
    Waiting,
    SessionStart,
    SessionEnd,
    Custom,
}

/// Captured output of a completed tool call. All fields default so adapters
/// that cannot observe a stream still produce a valid envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ToolOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub interrupted: bool,
}

/// One normalized assistant lifecycle event. Consumed once, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Map<String, Value>,
    #[serde(default)]
    pub tool_output: Option<ToolOutput>,
    #[serde(default)]
    pub model_name: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    /// Free-text payload for `Error` and `Custom` events.
    #[serde(default)]
    pub detail: Option<String>,
}

/// Per-session snapshot from the discovery feed, written by adapters for
/// sessions other than the caller's own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    #[serde(default)]
    pub last_state: Option<String>,
    #[serde(default)]
    pub last_detail: Option<String>,
    pub last_update_at: DateTime<Utc>,
    #[serde(default)]
    pub stopped: bool,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub model_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub code: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl Event {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.kind {
            EventKind::ToolStart | EventKind::ToolEnd => {
                require_string(&self.session_id, "session_id")?;
                require_string(&self.tool_name, "tool_name")?;
            }
            EventKind::TurnEnd
            | EventKind::Waiting
            | EventKind::SessionStart
            | EventKind::SessionEnd => {
                require_string(&self.session_id, "session_id")?;
            }
            EventKind::Error | EventKind::Custom => {}
        }
        Ok(())
    }
}

/// Parses and validates an event payload in one step.
pub fn parse_event(params: Value) -> Result<Event, ValidationError> {
    let event: Event = serde_json::from_value(params).map_err(|err| {
        ValidationError::new(
            "invalid_params",
            format!("event payload is invalid JSON: {}", err),
        )
    })?;
    event.validate()?;
    Ok(event)
}

fn require_string(value: &Option<String>, field: &str) -> Result<(), ValidationError> {
    if let Some(candidate) = value {
        if !candidate.trim().is_empty() {
            return Ok(());
        }
    }
    Err(ValidationError::new(
        "missing_field",
        format!("{} is required", field),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_event(kind: EventKind) -> Event {
        Event {
            kind,
            recorded_at: "2026-01-30T12:00:00Z".parse().unwrap(),
            session_id: Some("session-1".to_string()),
            tool_name: Some("Bash".to_string()),
            tool_input: Map::new(),
            tool_output: None,
            model_name: None,
            cwd: Some("/repo".to_string()),
            detail: None,
        }
    }

    #[test]
    fn validates_tool_event() {
        let event = base_event(EventKind::ToolStart);
        assert!(event.validate().is_ok());
    }

    #[test]
    fn tool_event_requires_tool_name() {
        let mut event = base_event(EventKind::ToolEnd);
        event.tool_name = None;
        assert!(event.validate().is_err());
    }

    #[test]
    fn rejects_missing_session_id() {
        let mut event = base_event(EventKind::SessionStart);
        event.session_id = Some("  ".to_string());
        assert!(event.validate().is_err());
    }

    #[test]
    fn error_event_needs_no_session() {
        let mut event = base_event(EventKind::Error);
        event.session_id = None;
        event.tool_name = None;
        assert!(event.validate().is_ok());
    }

    #[test]
    fn parse_event_rejects_bad_payload() {
        let err = parse_event(serde_json::json!({"kind": "tool_start"})).unwrap_err();
        assert_eq!(err.code, "invalid_params");
    }

    #[test]
    fn parse_event_accepts_minimal_payload() {
        let event = parse_event(serde_json::json!({
            "kind": "session_end",
            "recorded_at": "2026-01-30T12:00:00Z",
            "session_id": "session-1"
        }))
        .unwrap();
        assert_eq!(event.kind, EventKind::SessionEnd);
        assert!(event.tool_input.is_empty());
    }

    #[test]
    fn snapshot_tolerates_missing_optionals() {
        let snapshot: SessionSnapshot = serde_json::from_value(serde_json::json!({
            "session_id": "session-2",
            "last_update_at": "2026-01-30T12:00:00Z"
        }))
        .unwrap();
        assert!(!snapshot.stopped);
        assert!(snapshot.last_state.is_none());
    }
}
