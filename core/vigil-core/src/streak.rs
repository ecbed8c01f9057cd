//! Consecutive-success streak tracking across tool calls.
//!
//! `StreakStats` is the one process-wide aggregate: read-modify-write on
//! every classified tool outcome. Updates are pure functions over an
//! explicit `&mut StreakStats` and a passed-in `now`, so tests need no
//! process-wide fixtures. Persistence lives in `config`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Streak lengths that earn a milestone banner. Exact-match only.
pub const STREAK_MILESTONES: &[u32] = &[10, 25, 50, 100, 200, 500];

/// How long a milestone stays visible before self-expiring.
pub const MILESTONE_DISPLAY_MS: i64 = 30_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DailyStats {
    /// UTC date in YYYY-MM-DD; counters reset when it rolls over.
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub session_count: u32,
    #[serde(default)]
    pub cumulative_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub value: u32,
    #[serde(rename = "type")]
    pub kind: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StreakStats {
    #[serde(default)]
    pub streak: u32,
    #[serde(default)]
    pub best_streak: u32,
    /// Length of the streak lost at the most recent reset.
    #[serde(default)]
    pub broken_streak: u32,
    #[serde(default)]
    pub broken_streak_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_tool_calls: u64,
    #[serde(default)]
    pub total_errors: u64,
    #[serde(default)]
    pub daily: DailyStats,
    /// Basename -> touch count for edited and read files.
    #[serde(default)]
    pub frequent_files: HashMap<String, u32>,
    #[serde(default)]
    pub recent_milestone: Option<Milestone>,
}

/// Applies one classified tool outcome to the aggregate.
pub fn update_streak(stats: &mut StreakStats, is_error: bool, now: DateTime<Utc>) {
    stats.total_tool_calls += 1;
    if is_error {
        stats.broken_streak = stats.streak;
        stats.broken_streak_at = Some(now);
        stats.total_errors += 1;
        stats.streak = 0;
        return;
    }

    stats.streak += 1;
    stats.best_streak = stats.best_streak.max(stats.streak);
    if STREAK_MILESTONES.contains(&stats.streak) {
        debug!(streak = stats.streak, "Streak milestone reached");
        stats.recent_milestone = Some(Milestone {
            value: stats.streak,
            kind: "streak".to_string(),
            at: now,
        });
    }
}

/// Clears an expired milestone banner. Safe to call every tick.
pub fn expire_milestone(stats: &mut StreakStats, now: DateTime<Utc>) {
    if let Some(milestone) = &stats.recent_milestone {
        if now.signed_duration_since(milestone.at).num_milliseconds() >= MILESTONE_DISPLAY_MS {
            stats.recent_milestone = None;
        }
    }
}

/// Counts a file touch (edit or read) by basename.
pub fn record_file_touch(stats: &mut StreakStats, basename: &str) {
    if basename.is_empty() {
        return;
    }
    *stats
        .frequent_files
        .entry(basename.to_string())
        .or_insert(0) += 1;
}

/// Rolls the daily aggregate forward, resetting on a UTC date change.
/// `session_started` bumps the day's session count; `delta_ms` adds
/// active time.
pub fn touch_daily(stats: &mut StreakStats, now: DateTime<Utc>, session_started: bool, delta_ms: i64) {
    let today = now.format("%Y-%m-%d").to_string();
    if stats.daily.date != today {
        stats.daily = DailyStats {
            date: today,
            session_count: 0,
            cumulative_ms: 0,
        };
    }
    if session_started {
        stats.daily.session_count += 1;
    }
    stats.daily.cumulative_ms += delta_ms.max(0);
}
