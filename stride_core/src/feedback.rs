//! Output mapping for the notification and haptic collaborators.
//!
//! The engine never drives outputs directly; adapters subscribe to its state
//! and event streams and render them through these pure functions.

use crate::types::{ActivityType, WorkoutEvent, WorkoutPhase, WorkoutState};

/// Haptic pulse pattern keyed by what just happened
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HapticPattern {
    /// Brief attention pulse (end of countdown).
    Short,
    /// One pulse: a non-running segment begins.
    Single,
    /// Two pulses: a running segment begins, or the workout is done.
    Double,
}

impl HapticPattern {
    pub fn pulses(&self) -> u32 {
        match self {
            HapticPattern::Short | HapticPattern::Single => 1,
            HapticPattern::Double => 2,
        }
    }
}

/// Haptic cue for an event, if the event carries one.
pub fn haptic_for_event(event: &WorkoutEvent) -> Option<HapticPattern> {
    match event {
        WorkoutEvent::CountdownFinished => Some(HapticPattern::Short),
        WorkoutEvent::SegmentStarted { activity, .. } => Some(match activity {
            ActivityType::Run => HapticPattern::Double,
            _ => HapticPattern::Single,
        }),
        WorkoutEvent::WorkoutFinished { genuine: true, .. } => Some(HapticPattern::Double),
        _ => None,
    }
}

pub fn format_mmss(total_seconds: u32) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

/// Persistent status text for the current workout state.
pub fn status_line(state: &WorkoutState) -> String {
    match state.phase {
        WorkoutPhase::Idle => "No workout in progress".to_string(),
        WorkoutPhase::Preparing => format!(
            "Week {} Day {}: starting in {}",
            state.week, state.day, state.countdown_seconds_remaining
        ),
        WorkoutPhase::Running | WorkoutPhase::Paused => {
            let paused = if state.phase.is_paused() {
                " (paused)"
            } else {
                ""
            };
            match state.current_segment() {
                Some(seg) => format!(
                    "Week {} Day {}: {} ({}/{}) {} remaining{}",
                    state.week,
                    state.day,
                    seg.activity,
                    state.current_segment_index + 1,
                    state.segments.len(),
                    format_mmss(state.remaining_seconds_in_segment),
                    paused
                ),
                None => format!("Week {} Day {}{}", state.week, state.day, paused),
            }
        }
    }
}

/// One-line rendering of an event for a discrete notification, if the event
/// warrants one.
pub fn event_message(event: &WorkoutEvent) -> Option<String> {
    match event {
        WorkoutEvent::CountdownTick { seconds_remaining } => {
            Some(format!("Starting in {}...", seconds_remaining))
        }
        WorkoutEvent::CountdownFinished => Some("Go!".to_string()),
        WorkoutEvent::SegmentStarted {
            activity,
            duration_seconds,
            ..
        } => Some(format!("{} for {}", activity, format_mmss(*duration_seconds))),
        WorkoutEvent::SegmentCompleted { activity, .. } => Some(format!("{} done", activity)),
        WorkoutEvent::WorkoutPaused => Some("Workout paused".to_string()),
        WorkoutEvent::WorkoutResumed => Some("Workout resumed".to_string()),
        WorkoutEvent::WorkoutFinished { genuine, .. } => Some(if *genuine {
            "Workout complete. Great run!".to_string()
        } else {
            "Workout finished".to_string()
        }),
        WorkoutEvent::WorkoutStopped => Some("Workout stopped".to_string()),
        WorkoutEvent::WorkoutError { message } => Some(message.clone()),
    }
}
