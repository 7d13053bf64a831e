//! Segment compiler: expands a day's raw duration list into typed segments.
//!
//! The derivation rule is positional: the first entry is the warm-up, the
//! last entry is the cool-down, and interior entries alternate starting with
//! a run at odd indices. A single-entry day compiles to one warm-up segment
//! (the position-0 rule wins over the tail rule).

use crate::types::{ActivityType, Segment};

/// Compile a resolved duration list into ordered segments.
///
/// Pure function of its input; an empty list yields an empty sequence.
pub fn compile_segments(durations: &[u32]) -> Vec<Segment> {
    let len = durations.len();
    durations
        .iter()
        .enumerate()
        .map(|(position, &duration_seconds)| Segment {
            duration_seconds,
            activity: activity_for_position(position, len),
            position,
        })
        .collect()
}

/// Total planned time across a compiled segment list.
pub fn total_seconds(segments: &[Segment]) -> u64 {
    segments.iter().map(|s| s.duration_seconds as u64).sum()
}

fn activity_for_position(position: usize, len: usize) -> ActivityType {
    if position == 0 {
        ActivityType::WarmUp
    } else if position == len - 1 {
        ActivityType::CoolDown
    } else if position % 2 == 1 {
        ActivityType::Run
    } else {
        ActivityType::Walk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list_compiles_to_empty() {
        assert!(compile_segments(&[]).is_empty());
    }

    #[test]
    fn test_single_entry_is_warm_up() {
        let segments = compile_segments(&[300]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].activity, ActivityType::WarmUp);
        assert_eq!(segments[0].duration_seconds, 300);
        assert_eq!(segments[0].position, 0);
    }

    #[test]
    fn test_positional_rule() {
        let segments = compile_segments(&[60, 90, 90, 60]);
        let activities: Vec<_> = segments.iter().map(|s| s.activity).collect();
        assert_eq!(
            activities,
            vec![
                ActivityType::WarmUp,
                ActivityType::Run,
                ActivityType::Walk,
                ActivityType::CoolDown,
            ]
        );
    }

    #[test]
    fn test_interior_alternation_over_longer_day() {
        // 5-min warm-up, 8 x (run + walk), 5-min cool-down
        let mut durations = vec![300];
        for _ in 0..8 {
            durations.push(60);
            durations.push(90);
        }
        durations.push(300);

        let segments = compile_segments(&durations);
        assert_eq!(segments.first().map(|s| s.activity), Some(ActivityType::WarmUp));
        assert_eq!(segments.last().map(|s| s.activity), Some(ActivityType::CoolDown));
        for seg in &segments[1..segments.len() - 1] {
            let expected = if seg.position % 2 == 1 {
                ActivityType::Run
            } else {
                ActivityType::Walk
            };
            assert_eq!(seg.activity, expected, "position {}", seg.position);
        }
    }

    #[test]
    fn test_two_entry_day_has_no_interior() {
        let segments = compile_segments(&[120, 120]);
        assert_eq!(segments[0].activity, ActivityType::WarmUp);
        assert_eq!(segments[1].activity, ActivityType::CoolDown);
    }

    #[test]
    fn test_total_seconds() {
        let segments = compile_segments(&[60, 90, 90, 60]);
        assert_eq!(total_seconds(&segments), 300);
    }

    #[test]
    fn test_determinism() {
        let a = compile_segments(&[60, 90, 90, 60]);
        let b = compile_segments(&[60, 90, 90, 60]);
        assert_eq!(a, b);
    }
}
