//! Per-entity presentation state machine.
//!
//! One `DisplayState` exists for the primary session and one per visible
//! orbital session. All transitions funnel through `set_state`, which
//! enforces minimum dwell times and priority-based preemption; `tick`
//! drains the pending buffer and applies soft timeouts by comparing
//! wall-clock timestamps against a passed-in `now`. There are no OS
//! timers, so a delayed or repeated tick is harmless.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::state::SemanticState;

/// Floor before a completion face may be replaced by the next tool call.
pub const COMPLETION_MIN_SHOW_MS: i64 = 500;
/// Baseline dwell for states without a dedicated entry.
pub const DEFAULT_DWELL_MS: i64 = 1_000;
/// Timeline ring-buffer capacity.
pub const TIMELINE_CAP: usize = 200;

/// Caffeinated detector: at least this many transitions...
pub const CAFFEINE_MIN_TRANSITIONS: usize = 5;
/// ...within this trailing window...
pub const CAFFEINE_WINDOW_MS: i64 = 10_000;
/// ...tracked over the most recent transitions.
pub const CAFFEINE_HISTORY: usize = 20;

/// Auto-degradation timeouts, measured from the last state change.
pub const STARTING_TO_IDLE_MS: i64 = 8_000;
pub const OUTCOME_LINGER_MS: i64 = 5_000;
pub const THINKING_TO_IDLE_ACTIVE_MS: i64 = 120_000;
pub const THINKING_TO_IDLE_STOPPED_MS: i64 = 10_000;
pub const ACTIVE_DEGRADE_MS: i64 = 30_000;
pub const IDLE_TO_SLEEP_MS: i64 = 300_000;

/// Minimum visible duration per state. Total: anything unlisted gets the
/// baseline.
pub fn dwell_ms(state: SemanticState) -> i64 {
    match state {
        SemanticState::Coding => 6_000,
        SemanticState::Error | SemanticState::Ratelimited => 5_000,
        SemanticState::Happy | SemanticState::Proud => 4_000,
        SemanticState::Testing | SemanticState::Installing => 4_000,
        SemanticState::Satisfied | SemanticState::Relieved => 3_000,
        SemanticState::Committing | SemanticState::Reviewing => 3_000,
        SemanticState::Subagent | SemanticState::Caffeinated => 3_000,
        SemanticState::Executing | SemanticState::Reading | SemanticState::Searching => 2_000,
        SemanticState::Responding | SemanticState::Starting | SemanticState::Spawning => 2_000,
        SemanticState::Waiting => 1_500,
        _ => DEFAULT_DWELL_MS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub state: SemanticState,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingState {
    state: SemanticState,
    detail: String,
}

#[derive(Debug, Clone)]
pub struct DisplayState {
    presented: SemanticState,
    detail: String,
    pending: Option<PendingState>,
    last_change_at: DateTime<Utc>,
    min_display_until: DateTime<Utc>,
    stopped: bool,
    timeline: VecDeque<TimelineEntry>,
    transition_times: VecDeque<DateTime<Utc>>,
    pre_caffeine: Option<(SemanticState, String)>,
}

impl DisplayState {
    /// A fresh primary display, booting up.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self::with_initial(SemanticState::Starting, "booting up", now)
    }

    /// A display seeded with a known state (orbital sessions start here).
    /// The seed is not a transition, so it carries no dwell lock.
    pub fn with_initial(state: SemanticState, detail: &str, now: DateTime<Utc>) -> Self {
        let mut timeline = VecDeque::with_capacity(TIMELINE_CAP);
        timeline.push_back(TimelineEntry { state, at: now });
        Self {
            presented: state,
            detail: detail.to_string(),
            pending: None,
            last_change_at: now,
            min_display_until: now,
            stopped: false,
            timeline,
            transition_times: VecDeque::with_capacity(CAFFEINE_HISTORY),
            pre_caffeine: None,
        }
    }

    pub fn presented(&self) -> SemanticState {
        self.presented
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn last_change_at(&self) -> DateTime<Utc> {
        self.last_change_at
    }

    pub fn stopped(&self) -> bool {
        self.stopped
    }

    pub fn set_stopped(&mut self, stopped: bool) {
        self.stopped = stopped;
    }

    pub fn timeline(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.timeline.iter()
    }

    /// Requests a transition. May apply immediately, buffer as pending, or
    /// refresh in place; `presented` changes only through this path.
    pub fn set_state(&mut self, new_state: SemanticState, detail: &str, now: DateTime<Utc>) {
        if new_state == self.presented {
            // Refresh only: dwell, pending, and timeline are untouched.
            self.detail = detail.to_string();
            self.last_change_at = now;
            return;
        }

        // Critical feedback ignores the dwell lock entirely.
        if matches!(new_state, SemanticState::Error | SemanticState::Ratelimited) {
            self.apply(new_state, detail, now);
            return;
        }

        // New work preempts passive states, but a completion face gets a
        // short floor so a fast next tool call cannot swallow it.
        if new_state.is_work() && self.presented.is_interruptible() {
            if self.presented.is_outcome()
                && elapsed_ms(self.last_change_at, now) < COMPLETION_MIN_SHOW_MS
            {
                self.buffer_pending(new_state, detail);
                return;
            }
            self.apply(new_state, detail, now);
            return;
        }

        let locked = now < self.min_display_until;

        // Completion faces wait for the active tool's dwell to clear.
        if new_state.is_outcome() && self.presented.is_work() && locked {
            self.buffer_pending(new_state, detail);
            return;
        }

        if locked {
            self.buffer_pending(new_state, detail);
            return;
        }

        self.apply(new_state, detail, now);
    }

    /// Advances timers. Evaluated every frame in a fixed order: drain
    /// pending, caffeinated detector, then auto-degradation (which the
    /// dwell lock also blocks).
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let Some(pending) = self.pending.clone() {
            if now >= self.min_display_until {
                self.set_state(pending.state, &pending.detail, now);
            } else if pending.state.is_work()
                && self.presented.is_outcome()
                && elapsed_ms(self.last_change_at, now) >= COMPLETION_MIN_SHOW_MS
            {
                // Early flush: buffered work over a reward face that has
                // had its minimum showing.
                self.set_state(pending.state, &pending.detail, now);
            }
        }

        self.update_caffeine(now);

        if now < self.min_display_until {
            return;
        }

        let idle = elapsed_ms(self.last_change_at, now);
        match self.presented {
            SemanticState::Starting if idle >= STARTING_TO_IDLE_MS => {
                self.set_state(SemanticState::Idle, "", now);
            }
            SemanticState::Starting => {}
            SemanticState::Responding if self.stopped => {
                self.set_state(SemanticState::Happy, "all done", now);
            }
            state if state.is_outcome() && idle >= OUTCOME_LINGER_MS => {
                self.degrade(now);
            }
            state if state.is_outcome() => {}
            SemanticState::Thinking => {
                let limit = if self.stopped {
                    THINKING_TO_IDLE_STOPPED_MS
                } else {
                    THINKING_TO_IDLE_ACTIVE_MS
                };
                if idle >= limit {
                    self.set_state(SemanticState::Idle, "", now);
                }
            }
            SemanticState::Idle if idle >= IDLE_TO_SLEEP_MS => {
                self.set_state(SemanticState::Sleeping, "zzz", now);
            }
            SemanticState::Idle | SemanticState::Sleeping => {}
            _ if idle >= ACTIVE_DEGRADE_MS => {
                self.degrade(now);
            }
            _ => {}
        }
    }

    fn degrade(&mut self, now: DateTime<Utc>) {
        if self.stopped {
            self.set_state(SemanticState::Idle, "", now);
        } else {
            self.set_state(SemanticState::Thinking, "mulling it over", now);
        }
    }

    fn update_caffeine(&mut self, now: DateTime<Utc>) {
        let recent = self
            .transition_times
            .iter()
            .filter(|at| elapsed_ms(**at, now) <= CAFFEINE_WINDOW_MS)
            .count();

        if self.presented == SemanticState::Caffeinated {
            if recent < CAFFEINE_MIN_TRANSITIONS {
                // Restore through set_state so a buffered error still wins.
                match self.pre_caffeine.take() {
                    Some((state, detail)) => self.set_state(state, &detail, now),
                    None => self.set_state(SemanticState::Thinking, "", now),
                }
            }
            return;
        }

        let excluded = matches!(
            self.presented,
            SemanticState::Idle
                | SemanticState::Sleeping
                | SemanticState::Error
                | SemanticState::Ratelimited
        ) || self.presented.is_outcome();

        if recent >= CAFFEINE_MIN_TRANSITIONS && !excluded {
            self.pre_caffeine = Some((self.presented, self.detail.clone()));
            self.force_state(SemanticState::Caffeinated, "wired on tool calls", now);
        }
    }

    /// Applies unconditionally while keeping dwell bookkeeping, preserving
    /// any dramatic pending request (an error is never dropped).
    fn force_state(&mut self, state: SemanticState, detail: &str, now: DateTime<Utc>) {
        let saved = self.pending.take();
        self.apply(state, detail, now);
        self.pending = saved.filter(|pending| {
            matches!(
                pending.state,
                SemanticState::Error | SemanticState::Ratelimited
            ) || pending.state.is_outcome()
        });
    }

    fn buffer_pending(&mut self, state: SemanticState, detail: &str) {
        let new_is_dramatic = matches!(state, SemanticState::Error | SemanticState::Ratelimited);
        let protected = match &self.pending {
            Some(pending)
                if matches!(
                    pending.state,
                    SemanticState::Error | SemanticState::Ratelimited
                ) && !new_is_dramatic =>
            {
                true
            }
            // A buffered reward face is only displaced by something dramatic
            // or another reward; mundane requests lose.
            Some(pending)
                if pending.state.is_outcome() && !new_is_dramatic && !state.is_outcome() =>
            {
                true
            }
            _ => false,
        };
        if !protected {
            self.pending = Some(PendingState {
                state,
                detail: detail.to_string(),
            });
        }
    }

    fn apply(&mut self, state: SemanticState, detail: &str, now: DateTime<Utc>) {
        // Leaving caffeinated by any ordinary path invalidates the saved
        // restore target; only a fresh episode may set a new one.
        if state != SemanticState::Caffeinated {
            self.pre_caffeine = None;
        }
        self.presented = state;
        self.detail = detail.to_string();
        self.last_change_at = now;
        self.min_display_until = now + Duration::milliseconds(dwell_ms(state));
        self.pending = None;
        self.timeline.push_back(TimelineEntry { state, at: now });
        if self.timeline.len() > TIMELINE_CAP {
            self.timeline.pop_front();
        }
        self.transition_times.push_back(now);
        if self.transition_times.len() > CAFFEINE_HISTORY {
            self.transition_times.pop_front();
        }
    }
}

fn elapsed_ms(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    now.signed_duration_since(since).num_milliseconds()
}
