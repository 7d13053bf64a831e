//! Core domain types for the Stride interval running program.
//!
//! This module defines the fundamental types used throughout the system:
//! - Segments and their activity kinds
//! - Live workout state owned by the timing engine
//! - Discrete workout events observed by the host
//! - Journal records for completed workouts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

// ============================================================================
// Segment Types
// ============================================================================

/// Activity performed during one segment of a workout
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    WarmUp,
    Walk,
    Run,
    CoolDown,
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ActivityType::WarmUp => "Warm-up",
            ActivityType::Walk => "Walk",
            ActivityType::Run => "Run",
            ActivityType::CoolDown => "Cool-down",
        };
        f.write_str(label)
    }
}

/// One timed interval of a single activity within a workout day
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    pub duration_seconds: u32,
    pub activity: ActivityType,
    pub position: usize,
}

// ============================================================================
// Workout State
// ============================================================================

/// Phase of the live workout state machine
///
/// Completion and stop are transitions back to `Idle`, observed through the
/// event stream rather than as resting phases.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkoutPhase {
    #[default]
    Idle,
    Preparing,
    Running,
    Paused,
}

impl WorkoutPhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, WorkoutPhase::Idle)
    }

    pub fn is_preparing(&self) -> bool {
        matches!(self, WorkoutPhase::Preparing)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, WorkoutPhase::Running)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, WorkoutPhase::Paused)
    }

    /// A workout exists (any phase other than `Idle`).
    pub fn is_active(&self) -> bool {
        !self.is_idle()
    }
}

/// Live workout state, owned exclusively by the timing engine.
///
/// Exactly one instance exists per running workout; the engine replaces it
/// wholesale on stop or completion. Wall-clock anchors combine with the
/// paused-time accumulators to derive remaining time, so correctness does not
/// depend on tick delivery.
#[derive(Clone, Debug)]
pub struct WorkoutState {
    pub phase: WorkoutPhase,
    pub session_id: Option<Uuid>,
    pub week: u32,
    pub day: u32,
    pub countdown_seconds_remaining: u32,
    pub segments: Arc<[Segment]>,
    pub current_segment_index: usize,
    pub remaining_seconds_in_segment: u32,
    pub elapsed_seconds_total: u64,
    pub total_seconds_planned: u64,
    pub has_started_any_segment: bool,
    pub(crate) generation: u64,
    pub(crate) completion_recorded: bool,
    pub(crate) workout_started_at: Option<Instant>,
    pub(crate) segment_started_at: Option<Instant>,
    pub(crate) paused_in_segment: Duration,
    pub(crate) paused_total: Duration,
    pub(crate) pause_started_at: Option<Instant>,
}

impl WorkoutState {
    /// Empty state between workouts.
    pub(crate) fn idle(generation: u64) -> Self {
        Self {
            phase: WorkoutPhase::Idle,
            session_id: None,
            week: 0,
            day: 0,
            countdown_seconds_remaining: 0,
            segments: Arc::from(Vec::new()),
            current_segment_index: 0,
            remaining_seconds_in_segment: 0,
            elapsed_seconds_total: 0,
            total_seconds_planned: 0,
            has_started_any_segment: false,
            generation,
            completion_recorded: false,
            workout_started_at: None,
            segment_started_at: None,
            paused_in_segment: Duration::ZERO,
            paused_total: Duration::ZERO,
            pause_started_at: None,
        }
    }

    /// Fresh state for a workout entering the pre-workout countdown.
    pub(crate) fn preparing(
        week: u32,
        day: u32,
        segments: Arc<[Segment]>,
        countdown_seconds: u32,
        generation: u64,
    ) -> Self {
        let total: u64 = segments.iter().map(|s| s.duration_seconds as u64).sum();
        let first_duration = segments.first().map(|s| s.duration_seconds).unwrap_or(0);
        Self {
            phase: WorkoutPhase::Preparing,
            session_id: Some(Uuid::new_v4()),
            week,
            day,
            countdown_seconds_remaining: countdown_seconds,
            segments,
            current_segment_index: 0,
            remaining_seconds_in_segment: first_duration,
            elapsed_seconds_total: 0,
            total_seconds_planned: total,
            has_started_any_segment: false,
            generation,
            completion_recorded: false,
            workout_started_at: None,
            segment_started_at: None,
            paused_in_segment: Duration::ZERO,
            paused_total: Duration::ZERO,
            pause_started_at: None,
        }
    }

    pub fn current_segment(&self) -> Option<Segment> {
        self.segments.get(self.current_segment_index).copied()
    }

    /// Transition out of the countdown into the first segment.
    pub(crate) fn begin_first_segment(&mut self, now: Instant) {
        self.phase = WorkoutPhase::Running;
        self.has_started_any_segment = true;
        self.countdown_seconds_remaining = 0;
        self.workout_started_at = Some(now);
        self.segment_started_at = Some(now);
        self.paused_in_segment = Duration::ZERO;
        self.paused_total = Duration::ZERO;
        if let Some(seg) = self.current_segment() {
            self.remaining_seconds_in_segment = seg.duration_seconds;
        }
    }

    /// Move to the next segment, resetting the per-segment anchors.
    pub(crate) fn advance_segment(&mut self, now: Instant) {
        self.current_segment_index += 1;
        self.segment_started_at = Some(now);
        self.paused_in_segment = Duration::ZERO;
        if let Some(seg) = self.current_segment() {
            self.remaining_seconds_in_segment = seg.duration_seconds;
        }
    }

    pub(crate) fn begin_pause(&mut self, now: Instant) {
        self.phase = WorkoutPhase::Paused;
        self.pause_started_at = Some(now);
    }

    pub(crate) fn end_pause(&mut self, now: Instant) {
        if let Some(pause_start) = self.pause_started_at.take() {
            let paused = now.duration_since(pause_start);
            self.paused_in_segment += paused;
            self.paused_total += paused;
        }
        self.phase = WorkoutPhase::Running;
    }

    /// While paused, the clock is frozen at the pause instant.
    fn effective_now(&self, now: Instant) -> Instant {
        self.pause_started_at.unwrap_or(now)
    }

    /// Wall-clock time spent in the current segment, net of pauses.
    pub fn segment_elapsed(&self, now: Instant) -> Duration {
        match self.segment_started_at {
            Some(started) => self
                .effective_now(now)
                .duration_since(started)
                .saturating_sub(self.paused_in_segment),
            None => Duration::ZERO,
        }
    }

    /// Wall-clock time spent in the whole workout, net of pauses.
    pub fn workout_elapsed(&self, now: Instant) -> Duration {
        match self.workout_started_at {
            Some(started) => self
                .effective_now(now)
                .duration_since(started)
                .saturating_sub(self.paused_total),
            None => Duration::ZERO,
        }
    }

    /// Recompute the published bookkeeping from the wall-clock anchors.
    ///
    /// Remaining time is always derived this way, never decremented per tick.
    pub(crate) fn sync_from_clock(&mut self, now: Instant) {
        let Some(seg) = self.current_segment() else {
            return;
        };
        let duration_ms = seg.duration_seconds as u64 * 1000;
        let elapsed_ms = self.segment_elapsed(now).as_millis() as u64;
        let remaining_ms = duration_ms.saturating_sub(elapsed_ms);
        self.remaining_seconds_in_segment = remaining_ms.div_ceil(1000) as u32;
        self.elapsed_seconds_total = self.workout_elapsed(now).as_secs();
    }

    /// The current segment's allotted time has fully elapsed.
    pub(crate) fn segment_time_up(&self, now: Instant) -> bool {
        match self.current_segment() {
            Some(seg) => {
                self.segment_elapsed(now) >= Duration::from_secs(seg.duration_seconds as u64)
            }
            None => false,
        }
    }
}

// ============================================================================
// Workout Events
// ============================================================================

/// Discrete occurrences emitted by the timing engine, in causal order.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkoutEvent {
    CountdownTick {
        seconds_remaining: u32,
    },
    CountdownFinished,
    SegmentStarted {
        index: usize,
        activity: ActivityType,
        duration_seconds: u32,
    },
    SegmentCompleted {
        index: usize,
        activity: ActivityType,
    },
    WorkoutPaused,
    WorkoutResumed,
    /// `genuine` is false when the workout was finished before any segment
    /// actually started (for example during the countdown).
    WorkoutFinished {
        week: u32,
        day: u32,
        genuine: bool,
    },
    WorkoutStopped,
    WorkoutError {
        message: String,
    },
}

// ============================================================================
// Journal Records
// ============================================================================

/// A finished workout as recorded in the on-device journal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutRecord {
    pub id: Uuid,
    pub week: u32,
    pub day: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub planned_seconds: u64,
    pub elapsed_seconds: u64,
}
