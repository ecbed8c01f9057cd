//! The event-driven engine: one struct owning arbitration, classification,
//! display state, and streak accounting.
//!
//! `handle_event` is the single ingest path; `tick` is the single timer
//! path. Both take the caller's clock so the whole engine is replayable
//! from a recorded event log.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, warn};

use vigil_protocol::{Event, EventKind, SessionSnapshot, ToolOutput};

use crate::arbiter::{SessionArbiter, SessionRecord};
use crate::classify::detail::glitch;
use crate::classify::{classify_end, classify_start, touched_file, DiffInfo};
use crate::display::DisplayState;
use crate::state::SemanticState;
use crate::streak::{self, StreakStats};

/// Idle gaps longer than this do not count toward daily active time.
const ACTIVE_GAP_CAP_MS: i64 = 120_000;

pub struct VigilEngine {
    arbiter: SessionArbiter,
    stats: StreakStats,
    rng: StdRng,
    recent_diff: Option<DiffInfo>,
    last_event_at: Option<DateTime<Utc>>,
}

impl VigilEngine {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_stats(StreakStats::default(), now)
    }

    /// Resumes from persisted stats (see `config`).
    pub fn with_stats(stats: StreakStats, now: DateTime<Utc>) -> Self {
        Self {
            arbiter: SessionArbiter::new(now),
            stats,
            rng: StdRng::from_entropy(),
            recent_diff: None,
            last_event_at: None,
        }
    }

    /// Deterministic variant for tests; glitch flavor depends on the seed.
    pub fn with_seed(seed: u64, now: DateTime<Utc>) -> Self {
        let mut engine = Self::new(now);
        engine.rng = StdRng::seed_from_u64(seed);
        engine
    }

    pub fn stats(&self) -> &StreakStats {
        &self.stats
    }

    pub fn into_stats(self) -> StreakStats {
        self.stats
    }

    pub fn primary(&self) -> &DisplayState {
        self.arbiter.primary()
    }

    pub fn primary_session_id(&self) -> Option<&str> {
        self.arbiter.primary_id()
    }

    pub fn secondaries(&self) -> impl Iterator<Item = &SessionRecord> {
        self.arbiter.secondaries()
    }

    /// Line delta of the most recent successful edit, for renderers.
    pub fn recent_diff(&self) -> Option<DiffInfo> {
        self.recent_diff
    }

    /// Ingests one normalized event. Invalid events are logged and dropped;
    /// a malformed adapter must never wedge the engine.
    pub fn handle_event(&mut self, event: &Event) {
        if let Err(err) = event.validate() {
            warn!(%err, kind = ?event.kind, "Dropping invalid event");
            return;
        }
        let now = event.recorded_at;
        self.accumulate_active_time(now);

        match event.kind {
            EventKind::SessionStart => {
                let session_id = event.session_id.as_deref().unwrap_or_default();
                self.arbiter.observe(
                    session_id,
                    event.cwd.as_deref(),
                    event.model_name.as_deref(),
                    true,
                    now,
                );
                streak::touch_daily(&mut self.stats, now, true, 0);
                if let Some(display) = self.arbiter.display_mut(session_id) {
                    display.set_stopped(false);
                    display.set_state(SemanticState::Starting, "booting up", now);
                }
            }
            EventKind::ToolStart => {
                let session_id = event.session_id.as_deref().unwrap_or_default();
                self.arbiter.observe(
                    session_id,
                    event.cwd.as_deref(),
                    event.model_name.as_deref(),
                    false,
                    now,
                );
                let result = classify_start(
                    event.tool_name.as_deref().unwrap_or_default(),
                    &event.tool_input,
                );
                if let Some(file) = touched_file(
                    event.tool_name.as_deref().unwrap_or_default(),
                    &event.tool_input,
                ) {
                    streak::record_file_touch(&mut self.stats, &file);
                }
                if let Some(display) = self.arbiter.display_mut(session_id) {
                    display.set_stopped(false);
                    display.set_state(result.state, &result.detail, now);
                }
            }
            EventKind::ToolEnd => {
                let session_id = event.session_id.as_deref().unwrap_or_default();
                self.arbiter.observe(
                    session_id,
                    event.cwd.as_deref(),
                    event.model_name.as_deref(),
                    false,
                    now,
                );
                let empty_output = ToolOutput::default();
                let output = event.tool_output.as_ref().unwrap_or(&empty_output);
                let result = classify_end(
                    event.tool_name.as_deref().unwrap_or_default(),
                    &event.tool_input,
                    output,
                    output.is_error,
                );
                let is_error = matches!(
                    result.state,
                    SemanticState::Error | SemanticState::Ratelimited
                );
                streak::update_streak(&mut self.stats, is_error, now);
                if let Some(diff) = result.diff_info {
                    self.recent_diff = Some(diff);
                }
                let detail = if result.state == SemanticState::Error {
                    glitch(&result.detail, &mut self.rng)
                } else {
                    result.detail.clone()
                };
                if let Some(display) = self.arbiter.display_mut(session_id) {
                    display.set_state(result.state, &detail, now);
                }
            }
            EventKind::TurnEnd => {
                let session_id = event.session_id.as_deref().unwrap_or_default();
                self.arbiter.observe(
                    session_id,
                    event.cwd.as_deref(),
                    event.model_name.as_deref(),
                    false,
                    now,
                );
                if let Some(display) = self.arbiter.display_mut(session_id) {
                    display.set_state(SemanticState::Responding, "wrapping up", now);
                    display.set_stopped(true);
                }
            }
            EventKind::Waiting => {
                let session_id = event.session_id.as_deref().unwrap_or_default();
                self.arbiter.observe(
                    session_id,
                    event.cwd.as_deref(),
                    event.model_name.as_deref(),
                    false,
                    now,
                );
                if let Some(display) = self.arbiter.display_mut(session_id) {
                    display.set_state(SemanticState::Waiting, "waiting for you", now);
                }
            }
            EventKind::Error => {
                let detail = event.detail.as_deref().unwrap_or("something went wrong");
                let detail = glitch(detail, &mut self.rng);
                match event.session_id.as_deref() {
                    Some(session_id) => {
                        self.arbiter.observe(
                            session_id,
                            event.cwd.as_deref(),
                            event.model_name.as_deref(),
                            false,
                            now,
                        );
                        if let Some(display) = self.arbiter.display_mut(session_id) {
                            display.set_state(SemanticState::Error, &detail, now);
                        }
                    }
                    // Session-less errors land on whoever owns the display.
                    None => {
                        if let Some(primary_id) = self.arbiter.primary_id().map(str::to_string) {
                            if let Some(display) = self.arbiter.display_mut(&primary_id) {
                                display.set_state(SemanticState::Error, &detail, now);
                            }
                        }
                    }
                }
            }
            EventKind::SessionEnd => {
                let session_id = event.session_id.as_deref().unwrap_or_default();
                self.arbiter.mark_stopped(session_id, now);
            }
            EventKind::Custom => {
                debug!(detail = ?event.detail, "Ignoring custom event");
            }
        }
    }

    /// Advances all timers: display degradation, session GC, milestone
    /// expiry. Call once per render frame.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.arbiter.tick_all(now);
        streak::expire_milestone(&mut self.stats, now);
    }

    /// Merges the cross-session discovery feed.
    pub fn reconcile(&mut self, snapshots: &[SessionSnapshot], now: DateTime<Utc>) {
        self.arbiter.reconcile(snapshots, now);
    }

    fn accumulate_active_time(&mut self, now: DateTime<Utc>) {
        if let Some(last) = self.last_event_at {
            let gap = now.signed_duration_since(last).num_milliseconds();
            if gap > 0 && gap <= ACTIVE_GAP_CAP_MS {
                streak::touch_daily(&mut self.stats, now, false, gap);
            }
        }
        self.last_event_at = Some(now);
    }
}
