//! Best-effort readers for the adapter-written feed files.
//!
//! Adapters append normalized events to `events.jsonl` and drop one
//! snapshot JSON per session under `sessions/`. Both readers tolerate
//! partial writes and garbage lines; the engine only ever sees valid
//! payloads.

use std::path::Path;

use fs_err as fs;
use tracing::debug;

use vigil_protocol::{parse_event, Event, SessionSnapshot};

/// Most recent valid event in the feed file, if any.
pub fn read_latest_event(path: &Path) -> Option<Event> {
    let contents = fs::read_to_string(path).ok()?;
    contents
        .lines()
        .rev()
        .filter(|line| !line.trim().is_empty())
        .find_map(|line| match serde_json::from_str(line) {
            Ok(value) => match parse_event(value) {
                Ok(event) => Some(event),
                Err(err) => {
                    debug!(%err, "Skipping invalid event line");
                    None
                }
            },
            Err(_) => {
                // A torn tail line from a concurrent append; skip it.
                None
            }
        })
}

/// All valid events in the feed file, oldest first.
pub fn read_events(path: &Path) -> Vec<Event> {
    let Ok(contents) = fs::read_to_string(path) else {
        return Vec::new();
    };
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| serde_json::from_str(line).ok())
        .filter_map(|value| parse_event(value).ok())
        .collect()
}

/// Loads every parseable session snapshot from the discovery directory.
/// A missing directory just means no other sessions are running.
pub fn load_session_snapshots(dir: &Path) -> Vec<SessionSnapshot> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut snapshots = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
            continue;
        }
        let Ok(contents) = fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<SessionSnapshot>(&contents) {
            Ok(snapshot) => snapshots.push(snapshot),
            Err(err) => debug!(?path, %err, "Skipping unreadable session snapshot"),
        }
    }
    snapshots
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn event_line(kind: &str, session: &str, offset_ms: i64) -> String {
        format!(
            r#"{{"kind":"{}","recorded_at":"2026-01-31T00:00:{:02}Z","session_id":"{}"}}"#,
            kind,
            offset_ms / 1000,
            session
        )
    }

    #[test]
    fn latest_event_skips_torn_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "{}", event_line("session_start", "s1", 1_000)).unwrap();
        writeln!(file, "{}", event_line("waiting", "s1", 2_000)).unwrap();
        write!(file, r#"{{"kind":"waiting","recorded"#).unwrap();
        drop(file);

        let event = read_latest_event(&path).expect("valid event before the torn line");
        assert_eq!(event.session_id.as_deref(), Some("s1"));
        assert_eq!(event.recorded_at.to_rfc3339(), "2026-01-31T00:00:02+00:00");
    }

    #[test]
    fn missing_feed_file_yields_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_latest_event(&dir.path().join("absent.jsonl")).is_none());
        assert!(read_events(&dir.path().join("absent.jsonl")).is_empty());
    }

    #[test]
    fn read_events_keeps_order_and_drops_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(file, "{}", event_line("session_start", "s1", 1_000)).unwrap();
        writeln!(file, "not json at all").unwrap();
        writeln!(file, "{}", event_line("turn_end", "s1", 3_000)).unwrap();
        drop(file);

        let events = read_events(&path);
        assert_eq!(events.len(), 2);
        assert!(events[0].recorded_at < events[1].recorded_at);
    }

    #[test]
    fn snapshots_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("s2.json"),
            r#"{"session_id":"s2","last_state":"coding","last_update_at":"2026-01-31T00:00:00Z"}"#,
        )
        .unwrap();
        fs::write(dir.path().join("junk.json"), "{{{{").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let snapshots = load_session_snapshots(dir.path());
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].session_id, "s2");
        assert_eq!(snapshots[0].last_state.as_deref(), Some("coding"));
    }

    #[test]
    fn missing_snapshot_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_session_snapshots(&dir.path().join("absent")).is_empty());
    }
}
