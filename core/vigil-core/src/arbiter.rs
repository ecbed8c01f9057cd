//! Multi-session ownership arbitration.
//!
//! Exactly one session owns the primary display at a time; every other
//! live session is tracked as a secondary with its own `DisplayState`.
//! Ownership moves only when the current primary has plausibly gone away
//! (stopped, or silent past the staleness window) or a new session
//! explicitly announces itself. All timing is soft: decisions compare
//! stored timestamps against a passed-in `now`.

use std::collections::{HashMap, HashSet};
use std::mem;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use vigil_protocol::SessionSnapshot;

use crate::display::DisplayState;
use crate::state::SemanticState;

/// A silent primary loses ownership to a newcomer after this long.
pub const PRIMARY_STALE_MS: i64 = 120_000;
/// Stopped secondaries linger briefly so their exit is visible.
pub const STOPPED_LINGER_MS: i64 = 10_000;
/// Active secondaries with no updates are presumed dead after this long.
pub const SECONDARY_ACTIVE_TIMEOUT_MS: i64 = 120_000;
/// A secondary resting on a completion face is pruned sooner.
pub const SECONDARY_OUTCOME_LINGER_MS: i64 = 5_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    Primary,
    Secondary,
}

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub cwd: Option<String>,
    pub model_name: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_update_at: DateTime<Utc>,
    pub stopped: bool,
    pub stopped_at: Option<DateTime<Utc>>,
    pub display: DisplayState,
    /// Seeded from a snapshot feed rather than live events. Feed records
    /// vanish when a later feed pass no longer lists them.
    pub from_feed: bool,
}

#[derive(Debug)]
pub struct SessionArbiter {
    primary_id: Option<String>,
    primary: DisplayState,
    primary_cwd: Option<String>,
    primary_model: Option<String>,
    last_primary_update_at: DateTime<Utc>,
    secondaries: HashMap<String, SessionRecord>,
}

impl SessionArbiter {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            primary_id: None,
            primary: DisplayState::new(now),
            primary_cwd: None,
            primary_model: None,
            last_primary_update_at: now,
            secondaries: HashMap::new(),
        }
    }

    pub fn primary_id(&self) -> Option<&str> {
        self.primary_id.as_deref()
    }

    pub fn primary(&self) -> &DisplayState {
        &self.primary
    }

    pub fn primary_cwd(&self) -> Option<&str> {
        self.primary_cwd.as_deref()
    }

    pub fn primary_model(&self) -> Option<&str> {
        self.primary_model.as_deref()
    }

    pub fn secondaries(&self) -> impl Iterator<Item = &SessionRecord> {
        self.secondaries.values()
    }

    pub fn secondary(&self, session_id: &str) -> Option<&SessionRecord> {
        self.secondaries.get(session_id)
    }

    /// Routes an event's session to a role, adopting or demoting as the
    /// ownership rules dictate. Call before applying the event's state.
    pub fn observe(
        &mut self,
        session_id: &str,
        cwd: Option<&str>,
        model_name: Option<&str>,
        announced: bool,
        now: DateTime<Utc>,
    ) -> SessionRole {
        match &self.primary_id {
            None => {
                info!(session_id, "Adopting first session as primary");
                self.primary_id = Some(session_id.to_string());
                self.note_primary_meta(cwd, model_name);
                self.last_primary_update_at = now;
                return SessionRole::Primary;
            }
            Some(current) if current == session_id => {
                self.note_primary_meta(cwd, model_name);
                self.last_primary_update_at = now;
                return SessionRole::Primary;
            }
            Some(_) => {}
        }

        let primary_silent_ms = now
            .signed_duration_since(self.last_primary_update_at)
            .num_milliseconds();
        let takeover =
            announced || self.primary.stopped() || primary_silent_ms >= PRIMARY_STALE_MS;

        if takeover {
            self.adopt(session_id, cwd, model_name, now);
            return SessionRole::Primary;
        }

        self.upsert_secondary(session_id, cwd, model_name, false, now);
        SessionRole::Secondary
    }

    /// Swaps ownership: the outgoing primary keeps its display as a
    /// secondary record, and the incoming session's display (if it was
    /// already tracked) moves into the primary slot.
    fn adopt(
        &mut self,
        session_id: &str,
        cwd: Option<&str>,
        model_name: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let (incoming_display, incoming_cwd, incoming_model) =
            match self.secondaries.remove(session_id) {
                Some(record) => (record.display, record.cwd, record.model_name),
                None => (DisplayState::new(now), None, None),
            };

        let outgoing_display = mem::replace(&mut self.primary, incoming_display);
        let outgoing_cwd = mem::replace(&mut self.primary_cwd, incoming_cwd);
        let outgoing_model = mem::replace(&mut self.primary_model, incoming_model);
        if let Some(old_id) = self.primary_id.replace(session_id.to_string()) {
            info!(
                old_primary = %old_id,
                new_primary = session_id,
                "Primary session ownership transferred"
            );
            let stopped = outgoing_display.stopped();
            self.secondaries.insert(
                old_id.clone(),
                SessionRecord {
                    session_id: old_id,
                    cwd: outgoing_cwd,
                    model_name: outgoing_model,
                    first_seen_at: self.last_primary_update_at,
                    last_update_at: self.last_primary_update_at,
                    stopped,
                    stopped_at: if stopped { Some(now) } else { None },
                    display: outgoing_display,
                    from_feed: false,
                },
            );
        }
        self.note_primary_meta(cwd, model_name);
        self.last_primary_update_at = now;
    }

    fn note_primary_meta(&mut self, cwd: Option<&str>, model_name: Option<&str>) {
        if let Some(cwd) = cwd {
            self.primary_cwd = Some(cwd.to_string());
        }
        if let Some(model) = model_name {
            self.primary_model = Some(model.to_string());
        }
    }

    fn upsert_secondary(
        &mut self,
        session_id: &str,
        cwd: Option<&str>,
        model_name: Option<&str>,
        from_feed: bool,
        now: DateTime<Utc>,
    ) -> &mut SessionRecord {
        let record = self
            .secondaries
            .entry(session_id.to_string())
            .or_insert_with(|| {
                debug!(session_id, "Tracking new secondary session");
                SessionRecord {
                    session_id: session_id.to_string(),
                    cwd: None,
                    model_name: None,
                    first_seen_at: now,
                    last_update_at: now,
                    stopped: false,
                    stopped_at: None,
                    display: DisplayState::with_initial(
                        SemanticState::Spawning,
                        "new session",
                        now,
                    ),
                    from_feed,
                }
            });
        record.last_update_at = now;
        if let Some(cwd) = cwd {
            record.cwd = Some(cwd.to_string());
        }
        if let Some(model) = model_name {
            record.model_name = Some(model.to_string());
        }
        record
    }

    /// Mutable display for a session, wherever it currently lives.
    pub fn display_mut(&mut self, session_id: &str) -> Option<&mut DisplayState> {
        if self.primary_id.as_deref() == Some(session_id) {
            return Some(&mut self.primary);
        }
        self.secondaries
            .get_mut(session_id)
            .map(|record| &mut record.display)
    }

    /// Marks a session as stopped without removing it; the sweep decides
    /// when it disappears.
    pub fn mark_stopped(&mut self, session_id: &str, now: DateTime<Utc>) {
        if self.primary_id.as_deref() == Some(session_id) {
            self.primary.set_stopped(true);
            return;
        }
        if let Some(record) = self.secondaries.get_mut(session_id) {
            record.stopped = true;
            record.stopped_at = Some(now);
            record.display.set_stopped(true);
        }
    }

    /// Merges a snapshot feed: sessions in the feed are upserted, and
    /// feed-sourced records absent from this pass are dropped. Live-event
    /// records are never pruned here.
    pub fn reconcile(&mut self, snapshots: &[SessionSnapshot], now: DateTime<Utc>) {
        let seen: HashSet<&str> = snapshots
            .iter()
            .map(|snapshot| snapshot.session_id.as_str())
            .collect();

        for snapshot in snapshots {
            if self.primary_id.as_deref() == Some(snapshot.session_id.as_str()) {
                continue;
            }
            let is_new = !self.secondaries.contains_key(&snapshot.session_id);
            let live_last_update = self
                .secondaries
                .get(&snapshot.session_id)
                .map(|record| record.last_update_at);
            let record = self.upsert_secondary(
                &snapshot.session_id,
                snapshot.cwd.as_deref(),
                snapshot.model_name.as_deref(),
                true,
                now,
            );
            // A feed snapshot may lag behind live events; freshness only
            // ever moves forward or a lagging feed would get a live
            // session swept.
            record.last_update_at = match live_last_update {
                Some(live) => live.max(snapshot.last_update_at),
                None => snapshot.last_update_at,
            };
            if is_new {
                if let Some(state) = snapshot
                    .last_state
                    .as_deref()
                    .and_then(SemanticState::from_str)
                {
                    let detail = snapshot.last_detail.as_deref().unwrap_or("");
                    record.display.set_state(state, detail, now);
                }
            }
            if snapshot.stopped && !record.stopped {
                record.stopped = true;
                record.stopped_at = Some(now);
                record.display.set_stopped(true);
            }
        }

        self.secondaries.retain(|id, record| {
            let keep = !record.from_feed || seen.contains(id.as_str());
            if !keep {
                debug!(session_id = %id, "Dropping session no longer in feed");
            }
            keep
        });
    }

    /// Advances every display and prunes dead secondaries. The primary is
    /// never pruned; it only loses ownership through `observe`.
    pub fn tick_all(&mut self, now: DateTime<Utc>) {
        self.primary.tick(now);
        for record in self.secondaries.values_mut() {
            record.display.tick(now);
        }
        self.sweep(now);
    }

    fn sweep(&mut self, now: DateTime<Utc>) {
        self.secondaries.retain(|id, record| {
            let silent_ms = now
                .signed_duration_since(record.last_update_at)
                .num_milliseconds();

            if record.stopped {
                let linger_since = record.stopped_at.unwrap_or(record.last_update_at);
                let lingered = now.signed_duration_since(linger_since).num_milliseconds();
                if lingered >= STOPPED_LINGER_MS {
                    debug!(session_id = %id, "Pruning stopped session");
                    return false;
                }
                return true;
            }

            if record.display.presented().is_outcome()
                && silent_ms >= SECONDARY_OUTCOME_LINGER_MS
            {
                debug!(session_id = %id, "Pruning finished session");
                return false;
            }

            if silent_ms >= SECONDARY_ACTIVE_TIMEOUT_MS {
                debug!(session_id = %id, "Pruning silent session");
                return false;
            }

            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn at(offset_ms: i64) -> DateTime<Utc> {
        let base: DateTime<Utc> = "2026-01-31T00:00:00Z".parse().unwrap();
        base + Duration::milliseconds(offset_ms)
    }

    #[test]
    fn first_session_becomes_primary() {
        let mut arbiter = SessionArbiter::new(at(0));
        let role = arbiter.observe("s1", Some("/work"), None, false, at(10));
        assert_eq!(role, SessionRole::Primary);
        assert_eq!(arbiter.primary_id(), Some("s1"));
    }

    #[test]
    fn second_session_stays_secondary_while_primary_is_live() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        let role = arbiter.observe("s2", None, None, false, at(20));
        assert_eq!(role, SessionRole::Secondary);
        assert_eq!(arbiter.primary_id(), Some("s1"));
        let record = arbiter.secondary("s2").expect("tracked");
        assert_eq!(record.display.presented(), SemanticState::Spawning);
    }

    #[test]
    fn announced_session_takes_over() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        let role = arbiter.observe("s2", None, None, true, at(20));
        assert_eq!(role, SessionRole::Primary);
        assert_eq!(arbiter.primary_id(), Some("s2"));
        // The deposed primary is still visible as a secondary.
        assert!(arbiter.secondary("s1").is_some());
    }

    #[test]
    fn stale_primary_loses_ownership() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        let role = arbiter.observe("s2", None, None, false, at(10 + PRIMARY_STALE_MS));
        assert_eq!(role, SessionRole::Primary);
        assert_eq!(arbiter.primary_id(), Some("s2"));
    }

    #[test]
    fn stopped_primary_loses_ownership() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        arbiter.mark_stopped("s1", at(20));
        let role = arbiter.observe("s2", None, None, false, at(30));
        assert_eq!(role, SessionRole::Primary);
    }

    #[test]
    fn takeover_migrates_secondary_display() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        arbiter.observe("s2", None, None, false, at(20));
        arbiter
            .display_mut("s2")
            .unwrap()
            .set_state(SemanticState::Coding, "editing lib.rs", at(2_100));
        arbiter.observe("s2", None, None, true, at(2_200));
        assert_eq!(arbiter.primary().presented(), SemanticState::Coding);
        assert_eq!(arbiter.primary().detail(), "editing lib.rs");
        assert!(arbiter.secondary("s2").is_none());
    }

    #[test]
    fn stopped_secondary_lingers_then_vanishes() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        arbiter.observe("s2", None, None, false, at(20));
        arbiter.mark_stopped("s2", at(1_000));
        arbiter.tick_all(at(1_000 + STOPPED_LINGER_MS - 1));
        assert!(arbiter.secondary("s2").is_some());
        arbiter.tick_all(at(1_000 + STOPPED_LINGER_MS));
        assert!(arbiter.secondary("s2").is_none());
    }

    #[test]
    fn finished_secondary_is_pruned_after_outcome_linger() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        arbiter.observe("s2", None, None, false, at(20));
        arbiter
            .display_mut("s2")
            .unwrap()
            .set_state(SemanticState::Happy, "subagent finished", at(2_100));
        arbiter.tick_all(at(2_100));
        assert!(arbiter.secondary("s2").is_some());
        arbiter.tick_all(at(20 + SECONDARY_OUTCOME_LINGER_MS));
        assert!(arbiter.secondary("s2").is_none());
    }

    #[test]
    fn silent_secondary_is_pruned_after_timeout() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        arbiter.observe("s2", None, None, false, at(20));
        arbiter
            .display_mut("s2")
            .unwrap()
            .set_state(SemanticState::Executing, "make", at(30));
        arbiter.tick_all(at(20 + SECONDARY_ACTIVE_TIMEOUT_MS - 1_000));
        assert!(arbiter.secondary("s2").is_some());
        arbiter.tick_all(at(20 + SECONDARY_ACTIVE_TIMEOUT_MS));
        assert!(arbiter.secondary("s2").is_none());
    }

    #[test]
    fn primary_is_never_pruned() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        arbiter.mark_stopped("s1", at(20));
        arbiter.tick_all(at(1_000_000));
        assert_eq!(arbiter.primary_id(), Some("s1"));
    }

    #[test]
    fn reconcile_seeds_and_prunes_feed_sessions() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));

        let snapshot = SessionSnapshot {
            session_id: "s2".to_string(),
            last_state: Some("coding".to_string()),
            last_detail: Some("editing main.rs".to_string()),
            last_update_at: at(50),
            stopped: false,
            cwd: Some("/work".to_string()),
            model_name: None,
        };
        arbiter.reconcile(&[snapshot.clone()], at(100));
        let record = arbiter.secondary("s2").expect("seeded from feed");
        assert!(record.from_feed);
        assert_eq!(record.display.presented(), SemanticState::Coding);
        assert_eq!(record.cwd.as_deref(), Some("/work"));

        // Next pass no longer lists s2; it disappears.
        arbiter.reconcile(&[], at(200));
        assert!(arbiter.secondary("s2").is_none());
    }

    #[test]
    fn lagging_feed_snapshot_does_not_rewind_live_freshness() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        // s2 speaks via live events at t=100s...
        arbiter.observe("s2", None, None, false, at(100_000));

        // ...then a stale feed pass reports it as last seen at t=0.
        let snapshot = SessionSnapshot {
            session_id: "s2".to_string(),
            last_state: None,
            last_detail: None,
            last_update_at: at(0),
            stopped: false,
            cwd: None,
            model_name: None,
        };
        arbiter.reconcile(&[snapshot], at(101_000));

        // 21s after its last live event the session is nowhere near the
        // activity timeout and must survive the sweep.
        arbiter.tick_all(at(121_000));
        assert!(arbiter.secondary("s2").is_some());
    }

    #[test]
    fn reconcile_never_touches_live_event_sessions() {
        let mut arbiter = SessionArbiter::new(at(0));
        arbiter.observe("s1", None, None, false, at(10));
        arbiter.observe("s2", None, None, false, at(20));
        arbiter.reconcile(&[], at(100));
        assert!(arbiter.secondary("s2").is_some());
    }
}
