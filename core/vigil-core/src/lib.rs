//! Core engine for Vigil: turns raw assistant lifecycle events into a
//! stable "what is it doing right now" display.
//!
//! The pipeline is pure and clock-explicit end to end:
//!
//! - `classify` maps tool starts and completions to semantic states
//! - `display` enforces dwell times, preemption, and auto-degradation
//! - `arbiter` decides which session owns the primary display
//! - `streak` keeps the consecutive-success accounting
//! - `engine` wires it all behind one `handle_event`/`tick` surface
//!
//! Nothing here spawns threads or reads clocks; hosts feed events and tick
//! on their own schedule, which also makes every behavior replayable.

pub mod arbiter;
pub mod classify;
pub mod config;
pub mod display;
pub mod engine;
pub mod error;
pub mod state;
pub mod store;
pub mod streak;

pub use arbiter::{SessionArbiter, SessionRecord, SessionRole};
pub use classify::{classify_end, classify_start, ClassificationResult, DiffInfo};
pub use display::{DisplayState, TimelineEntry};
pub use engine::VigilEngine;
pub use error::{Result, VigilError};
pub use state::SemanticState;
pub use streak::{StreakStats, STREAK_MILESTONES};

pub use vigil_protocol::{Event, EventKind, SessionSnapshot, ToolOutput};
