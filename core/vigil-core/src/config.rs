//! On-disk layout and persistence under `~/.vigil`.
//!
//! Loading is best-effort: a missing or corrupt stats file means a fresh
//! start, never a crash. Saving reports errors so callers can log them.

use std::path::PathBuf;

use fs_err as fs;
use tracing::debug;

use crate::error::{Result, VigilError};
use crate::streak::StreakStats;

pub const VIGIL_DIR_NAME: &str = ".vigil";
pub const STREAK_FILE_NAME: &str = "streak.json";
/// Event feed written by adapters, one JSON event per line.
pub const EVENTS_FILE_NAME: &str = "events.jsonl";
/// Per-session snapshot files for cross-session discovery.
pub const SESSIONS_DIR_NAME: &str = "sessions";

pub fn vigil_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or(VigilError::HomeDirNotFound)?;
    Ok(home.join(VIGIL_DIR_NAME))
}

pub fn streak_path() -> Result<PathBuf> {
    Ok(vigil_dir()?.join(STREAK_FILE_NAME))
}

pub fn events_path() -> Result<PathBuf> {
    Ok(vigil_dir()?.join(EVENTS_FILE_NAME))
}

pub fn sessions_dir() -> Result<PathBuf> {
    Ok(vigil_dir()?.join(SESSIONS_DIR_NAME))
}

/// Loads persisted streak stats, or `None` when absent or unreadable.
pub fn load_streak_stats() -> Option<StreakStats> {
    let path = streak_path().ok()?;
    let contents = fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(stats) => Some(stats),
        Err(err) => {
            debug!(?path, %err, "Ignoring unreadable streak stats");
            None
        }
    }
}

/// Writes streak stats, creating `~/.vigil` on first use.
pub fn save_streak_stats(stats: &StreakStats) -> Result<()> {
    let dir = vigil_dir()?;
    fs::create_dir_all(&dir).map_err(|e| VigilError::io("creating vigil dir", e))?;
    let path = dir.join(STREAK_FILE_NAME);
    let json = serde_json::to_string_pretty(stats)
        .map_err(|e| VigilError::json("serializing streak stats", e))?;
    fs::write(&path, json).map_err(|e| VigilError::io("writing streak stats", e))?;
    Ok(())
}
