//! Workout timing engine: the live workout state machine.
//!
//! One engine owns one `WorkoutState` at a time. Commands (start, pause,
//! resume, skip, stop, finish) are serialized through a single-owner mutex;
//! a driver task runs the countdown and segment ticks, and an independent
//! watchdog re-validates elapsed time against the wall clock. Remaining time
//! is always derived from wall-clock anchors, so descheduling the tick tasks
//! for an arbitrary interval cannot corrupt the timeline.
//!
//! Invalid transition requests (pausing while idle, resuming while running)
//! are silently ignored rather than errored, so UI races stay harmless.

use crate::ledger;
use crate::segments::compile_segments;
use crate::types::{Segment, WorkoutEvent, WorkoutState};
use crate::{Error, Program, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Timing parameters for the engine
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Pre-workout countdown length, one tick per second.
    pub countdown_seconds: u32,
    /// Display-update cadence while a segment runs. Correctness never
    /// depends on this; it only bounds how stale the published state can be.
    pub tick_interval: Duration,
    /// Cadence of the independent elapsed-time re-validation.
    pub watchdog_interval: Duration,
    /// Deviation between tracked and wall-clock elapsed time beyond which
    /// the watchdog forces a resync.
    pub drift_tolerance: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            countdown_seconds: 5,
            tick_interval: Duration::from_millis(100),
            watchdog_interval: Duration::from_secs(1),
            drift_tolerance: Duration::from_secs(2),
        }
    }
}

/// Handle to the workout timing engine; cheap to clone.
#[derive(Clone)]
pub struct WorkoutEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    program: Arc<Program>,
    ledger_path: PathBuf,
    config: EngineConfig,
    /// The single authoritative workout state. Every mutation happens under
    /// this lock, after re-checking the generation stamp.
    state: Mutex<WorkoutState>,
    /// Serializes the public command surface.
    ops: Mutex<()>,
    state_tx: watch::Sender<WorkoutState>,
    event_tx: broadcast::Sender<WorkoutEvent>,
    timer: Mutex<Option<JoinHandle<()>>>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every start/stop/finish; ticks from a superseded phase see a
    /// stale stamp under the state lock and never mutate.
    generation: AtomicU64,
    persist_expected: AtomicU64,
    persist_seq: watch::Sender<u64>,
}

impl WorkoutEngine {
    pub fn new(program: Arc<Program>, ledger_path: impl Into<PathBuf>, config: EngineConfig) -> Self {
        let (state_tx, _) = watch::channel(WorkoutState::idle(0));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (persist_seq, _) = watch::channel(0);
        Self {
            inner: Arc::new(EngineInner {
                program,
                ledger_path: ledger_path.into(),
                config,
                state: Mutex::new(WorkoutState::idle(0)),
                ops: Mutex::new(()),
                state_tx,
                event_tx,
                timer: Mutex::new(None),
                watchdog: Mutex::new(None),
                generation: AtomicU64::new(0),
                persist_expected: AtomicU64::new(0),
                persist_seq,
            }),
        }
    }

    /// Latest-value workout state stream; replays the current state on
    /// subscribe.
    pub fn subscribe_state(&self) -> watch::Receiver<WorkoutState> {
        self.inner.state_tx.subscribe()
    }

    /// Discrete workout event stream, in causal order.
    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkoutEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Current state with the clock-derived fields brought up to date.
    pub async fn snapshot(&self) -> WorkoutState {
        let mut st = self.inner.state.lock().await;
        if st.phase.is_running() {
            st.sync_from_clock(Instant::now());
        }
        st.clone()
    }

    /// Begin a workout for the given program day.
    ///
    /// Any workout already in progress is fully stopped first; two timer
    /// phases never overlap. Fails with `NoSegments` (state stays `Idle`, a
    /// `WorkoutError` event is emitted) when the day resolves to nothing.
    pub async fn start(&self, week: u32, day: u32) -> Result<()> {
        let _ops = self.inner.ops.lock().await;
        self.stop_current().await;

        let durations = self.inner.program.resolved_day(week, day).unwrap_or(&[]);
        let segments: Arc<[Segment]> = compile_segments(durations).into();
        if segments.is_empty() {
            let err = Error::NoSegments { week, day };
            self.inner.emit(WorkoutEvent::WorkoutError {
                message: err.to_string(),
            });
            return Err(err);
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut st = self.inner.state.lock().await;
            *st = WorkoutState::preparing(
                week,
                day,
                segments,
                self.inner.config.countdown_seconds,
                generation,
            );
            self.inner.publish(&st);
        }

        tracing::info!("Starting workout: week {} day {}", week, day);
        self.spawn_driver(generation).await;
        self.spawn_watchdog(generation).await;
        Ok(())
    }

    /// Pause the running segment. No-op unless running.
    pub async fn pause(&self) {
        let _ops = self.inner.ops.lock().await;
        {
            let mut st = self.inner.state.lock().await;
            if !st.phase.is_running() {
                return;
            }
            let now = Instant::now();
            st.sync_from_clock(now);
            st.begin_pause(now);
            self.inner.publish(&st);
            self.inner.emit(WorkoutEvent::WorkoutPaused);
        }
        // Pausing stops the timer loop outright; resume restarts it.
        self.cancel_tasks().await;
    }

    /// Resume a paused segment. No-op unless paused.
    pub async fn resume(&self) {
        let _ops = self.inner.ops.lock().await;
        let generation = {
            let mut st = self.inner.state.lock().await;
            if !st.phase.is_paused() {
                return;
            }
            st.end_pause(Instant::now());
            st.sync_from_clock(Instant::now());
            self.inner.publish(&st);
            self.inner.emit(WorkoutEvent::WorkoutResumed);
            st.generation
        };
        self.spawn_driver(generation).await;
        self.spawn_watchdog(generation).await;
    }

    /// Complete the current segment immediately, exactly as if its time had
    /// elapsed. On the final segment this takes the normal finish path.
    /// No-op unless running.
    pub async fn skip(&self) {
        let _ops = self.inner.ops.lock().await;
        let finished = {
            let mut st = self.inner.state.lock().await;
            if !st.phase.is_running() {
                return;
            }
            let now = Instant::now();
            if self.inner.complete_current_segment(&mut st, now) {
                self.inner.finish_locked(&mut st);
                true
            } else {
                false
            }
        };
        if finished {
            self.cancel_tasks().await;
        }
    }

    /// Hard abort: cancel all timers, reset to `Idle`, emit `WorkoutStopped`.
    /// Never writes the progress ledger. No-op when idle.
    pub async fn stop(&self) {
        let _ops = self.inner.ops.lock().await;
        self.stop_current().await;
    }

    /// Finish the workout now, regardless of remaining segments.
    ///
    /// Writes the progress ledger exactly once per workout; the write runs on
    /// a blocking thread so the caller's finished transition never waits on
    /// storage. No-op when idle.
    pub async fn finish(&self) {
        let _ops = self.inner.ops.lock().await;
        {
            let mut st = self.inner.state.lock().await;
            if st.phase.is_idle() {
                return;
            }
            self.inner.finish_locked(&mut st);
        }
        self.cancel_tasks().await;
    }

    /// Wait until all progress writes issued so far have landed.
    ///
    /// Hosts call this before process exit; the engine itself never blocks a
    /// transition on it.
    pub async fn wait_for_persistence(&self) {
        let expected = self.inner.persist_expected.load(Ordering::SeqCst);
        let mut rx = self.inner.persist_seq.subscribe();
        let _ = rx.wait_for(|done| *done >= expected).await;
    }

    async fn stop_current(&self) {
        {
            let mut st = self.inner.state.lock().await;
            if st.phase.is_idle() {
                return;
            }
            let next_gen = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *st = WorkoutState::idle(next_gen);
            self.inner.publish(&st);
            self.inner.emit(WorkoutEvent::WorkoutStopped);
        }
        self.cancel_tasks().await;
        tracing::info!("Workout stopped");
    }

    async fn spawn_driver(&self, generation: u64) {
        let mut slot = self.inner.timer.lock().await;
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        let inner = self.inner.clone();
        *slot = Some(tokio::spawn(async move {
            drive(inner, generation).await;
        }));
    }

    async fn spawn_watchdog(&self, generation: u64) {
        let mut slot = self.inner.watchdog.lock().await;
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        let inner = self.inner.clone();
        *slot = Some(tokio::spawn(async move {
            watch_for_drift(inner, generation).await;
        }));
    }

    async fn cancel_tasks(&self) {
        if let Some(handle) = self.inner.timer.lock().await.take() {
            handle.abort();
        }
        if let Some(handle) = self.inner.watchdog.lock().await.take() {
            handle.abort();
        }
    }
}

impl EngineInner {
    fn publish(&self, state: &WorkoutState) {
        self.state_tx.send_replace(state.clone());
    }

    fn emit(&self, event: WorkoutEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.event_tx.send(event);
    }

    /// Emit the completed/started event pair and advance to the next
    /// segment. Returns true when the just-completed segment was the last.
    fn complete_current_segment(&self, st: &mut WorkoutState, now: Instant) -> bool {
        let Some(seg) = st.current_segment() else {
            return true;
        };
        self.emit(WorkoutEvent::SegmentCompleted {
            index: seg.position,
            activity: seg.activity,
        });
        if st.current_segment_index + 1 < st.segments.len() {
            st.advance_segment(now);
            st.sync_from_clock(now);
            self.publish(st);
            if let Some(next) = st.current_segment() {
                self.emit(WorkoutEvent::SegmentStarted {
                    index: next.position,
                    activity: next.activity,
                    duration_seconds: next.duration_seconds,
                });
            }
            false
        } else {
            true
        }
    }

    /// Record the completion (once), emit `WorkoutFinished`, reset to idle.
    ///
    /// The ledger write runs on the blocking pool and is never awaited here.
    fn finish_locked(&self, st: &mut WorkoutState) {
        if st.phase.is_idle() || st.completion_recorded {
            return;
        }
        st.completion_recorded = true;
        let (week, day, genuine) = (st.week, st.day, st.has_started_any_segment);

        self.persist_expected.fetch_add(1, Ordering::SeqCst);
        let path = self.ledger_path.clone();
        let seq = self.persist_seq.clone();
        tokio::task::spawn_blocking(move || {
            let ledger = ledger::record_completion(&path, week, day);
            tracing::info!(
                "Recorded completion of week {} day {} ({} workouts total)",
                week,
                day,
                ledger.completed_workouts.len()
            );
            seq.send_modify(|done| *done += 1);
        });

        self.emit(WorkoutEvent::WorkoutFinished { week, day, genuine });
        let next_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *st = WorkoutState::idle(next_gen);
        self.publish(st);
    }
}

/// Driver task: countdown first (when entering from `Preparing`), then the
/// segment tick loop. Exits as soon as its generation stamp goes stale.
async fn drive(inner: Arc<EngineInner>, generation: u64) {
    let countdown_from = {
        let st = inner.state.lock().await;
        if st.generation != generation {
            return;
        }
        st.phase.is_preparing().then_some(st.countdown_seconds_remaining)
    };

    if let Some(from) = countdown_from {
        if !run_countdown(&inner, generation, from).await {
            return;
        }
    }

    run_segments(&inner, generation).await;
}

/// One tick per wall-clock second, from `from` down to 1; reaching zero
/// transitions into the first segment. Returns false when superseded.
async fn run_countdown(inner: &Arc<EngineInner>, generation: u64, from: u32) -> bool {
    let mut deadline = Instant::now();
    let mut n = from;
    while n > 0 {
        {
            let mut st = inner.state.lock().await;
            if st.generation != generation || !st.phase.is_preparing() {
                return false;
            }
            st.countdown_seconds_remaining = n;
            inner.publish(&st);
            inner.emit(WorkoutEvent::CountdownTick {
                seconds_remaining: n,
            });
        }
        deadline += Duration::from_secs(1);
        time::sleep_until(deadline).await;
        n -= 1;
    }

    let mut st = inner.state.lock().await;
    if st.generation != generation || !st.phase.is_preparing() {
        return false;
    }
    inner.emit(WorkoutEvent::CountdownFinished);
    st.begin_first_segment(Instant::now());
    inner.publish(&st);
    if let Some(seg) = st.current_segment() {
        inner.emit(WorkoutEvent::SegmentStarted {
            index: seg.position,
            activity: seg.activity,
            duration_seconds: seg.duration_seconds,
        });
    }
    true
}

/// Sub-second display ticks; transitions are decided by wall-clock elapsed
/// time, never by counting ticks.
async fn run_segments(inner: &Arc<EngineInner>, generation: u64) {
    let mut interval = time::interval(inner.config.tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let finished = {
            let mut st = inner.state.lock().await;
            if st.generation != generation || !st.phase.is_running() {
                return;
            }
            let now = Instant::now();
            if st.segment_time_up(now) {
                if inner.complete_current_segment(&mut st, now) {
                    inner.finish_locked(&mut st);
                    true
                } else {
                    false
                }
            } else {
                st.sync_from_clock(now);
                inner.publish(&st);
                false
            }
        };
        if finished {
            // Natural completion ends this task; take the watchdog with it.
            if let Some(handle) = inner.watchdog.lock().await.take() {
                handle.abort();
            }
            return;
        }
    }
}

/// Watchdog task: independently re-validates tracked elapsed time against
/// the wall clock and forces a resync when the deviation exceeds tolerance.
async fn watch_for_drift(inner: Arc<EngineInner>, generation: u64) {
    let mut interval = time::interval(inner.config.watchdog_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await;
    loop {
        interval.tick().await;
        let mut st = inner.state.lock().await;
        if st.generation != generation {
            return;
        }
        if !st.phase.is_running() {
            continue;
        }
        if correct_drift(&mut st, Instant::now(), inner.config.drift_tolerance) {
            inner.publish(&st);
        }
    }
}

/// Compare tracked elapsed time with wall-clock truth; resync when the gap
/// exceeds `tolerance`. Returns true when a correction was applied.
fn correct_drift(st: &mut WorkoutState, now: Instant, tolerance: Duration) -> bool {
    let expected = st.workout_elapsed(now);
    let tracked = Duration::from_secs(st.elapsed_seconds_total);
    let drift = if expected > tracked {
        expected - tracked
    } else {
        tracked - expected
    };
    if drift <= tolerance {
        return false;
    }
    tracing::warn!(
        drift_ms = drift.as_millis() as u64,
        "Elapsed-time drift beyond tolerance; resyncing from wall clock"
    );
    st.sync_from_clock(now);
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityType, WorkoutPhase};

    fn single_week_program(durations: &[u32]) -> Arc<Program> {
        let json = format!(
            r#"{{"weeks":[{{"week":1,"days":[
                {{"segments":{:?}}},
                {{"segmentsReference":"day1"}},
                {{"segmentsReference":"day1"}}
            ]}}]}}"#,
            durations
        );
        Arc::new(Program::from_json(&json).unwrap())
    }

    fn engine_with(durations: &[u32]) -> (WorkoutEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let engine = WorkoutEngine::new(
            single_week_program(durations),
            dir.path().join("progress.json"),
            EngineConfig::default(),
        );
        (engine, dir)
    }

    fn drain(rx: &mut broadcast::Receiver<WorkoutEvent>) -> Vec<WorkoutEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    async fn sleep_ms(ms: u64) {
        time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_protocol_event_order() {
        let (engine, _dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(5_500).await;

        let events = drain(&mut rx);
        let expected: Vec<WorkoutEvent> = (1..=5)
            .rev()
            .map(|n| WorkoutEvent::CountdownTick {
                seconds_remaining: n,
            })
            .chain([
                WorkoutEvent::CountdownFinished,
                WorkoutEvent::SegmentStarted {
                    index: 0,
                    activity: ActivityType::WarmUp,
                    duration_seconds: 60,
                },
            ])
            .collect();
        assert_eq!(events, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_state_is_published() {
        let (engine, _dir) = engine_with(&[60, 90]);
        engine.start(1, 1).await.unwrap();

        sleep_ms(2_300).await;
        let st = engine.snapshot().await;
        assert_eq!(st.phase, WorkoutPhase::Preparing);
        assert_eq!(st.countdown_seconds_remaining, 3);
        assert!(!st.has_started_any_segment);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_countdown_prevents_transition() {
        let (engine, _dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(2_300).await;
        engine.stop().await;
        sleep_ms(10_000).await;

        let events = drain(&mut rx);
        assert!(events.contains(&WorkoutEvent::WorkoutStopped));
        assert!(!events.contains(&WorkoutEvent::CountdownFinished));
        assert!(!events
            .iter()
            .any(|e| matches!(e, WorkoutEvent::SegmentStarted { .. })));

        let st = engine.snapshot().await;
        assert_eq!(st.phase, WorkoutPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_fails_when_day_has_no_segments() {
        let dir = tempfile::tempdir().unwrap();
        // Day 2 carries neither segments nor a reference.
        let json = r#"{"weeks":[{"week":1,"days":[
            {"segments":[60,90,60]},
            {},
            {"segmentsReference":"day1"}
        ]}]}"#;
        let engine = WorkoutEngine::new(
            Arc::new(Program::from_json(json).unwrap()),
            dir.path().join("progress.json"),
            EngineConfig::default(),
        );
        let mut rx = engine.subscribe_events();

        let result = engine.start(1, 2).await;
        assert!(matches!(result, Err(Error::NoSegments { week: 1, day: 2 })));

        let st = engine.snapshot().await;
        assert_eq!(st.phase, WorkoutPhase::Idle);
        assert!(drain(&mut rx)
            .iter()
            .any(|e| matches!(e, WorkoutEvent::WorkoutError { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining_time_is_wall_clock_derived() {
        let (engine, _dir) = engine_with(&[60, 90]);
        engine.start(1, 1).await.unwrap();

        // 5 s countdown, then 10.55 s into the warm-up.
        sleep_ms(5_000 + 10_550).await;
        let st = engine.snapshot().await;
        assert_eq!(st.phase, WorkoutPhase::Running);
        assert_eq!(st.current_segment_index, 0);
        assert_eq!(st.remaining_seconds_in_segment, 50);
        assert_eq!(st.elapsed_seconds_total, 10);
        assert_eq!(st.total_seconds_planned, 150);
        assert!(st.has_started_any_segment);
    }

    #[tokio::test(start_paused = true)]
    async fn test_natural_segment_transition() {
        let (engine, _dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(5_000 + 60_250).await;

        let events = drain(&mut rx);
        assert!(events.contains(&WorkoutEvent::SegmentCompleted {
            index: 0,
            activity: ActivityType::WarmUp,
        }));
        assert!(events.contains(&WorkoutEvent::SegmentStarted {
            index: 1,
            activity: ActivityType::CoolDown,
            duration_seconds: 90,
        }));

        let st = engine.snapshot().await;
        assert_eq!(st.current_segment_index, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_resume_round_trip() {
        let (engine, _dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(5_000 + 10_550).await;

        engine.pause().await;
        let at_pause = engine.snapshot().await;
        assert_eq!(at_pause.phase, WorkoutPhase::Paused);
        assert_eq!(at_pause.remaining_seconds_in_segment, 50);
        assert_eq!(at_pause.elapsed_seconds_total, 10);

        // Time spent paused must not advance anything.
        sleep_ms(30_000).await;
        let still_paused = engine.snapshot().await;
        assert_eq!(still_paused.remaining_seconds_in_segment, 50);
        assert_eq!(still_paused.elapsed_seconds_total, 10);

        engine.resume().await;
        sleep_ms(20_500).await;
        let st = engine.snapshot().await;
        assert_eq!(st.phase, WorkoutPhase::Running);
        // 10.55 s + 20.5 s of actual segment time.
        assert_eq!(st.remaining_seconds_in_segment, 29);
        assert_eq!(st.elapsed_seconds_total, 31);

        let events = drain(&mut rx);
        assert!(events.contains(&WorkoutEvent::WorkoutPaused));
        assert!(events.contains(&WorkoutEvent::WorkoutResumed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_is_noop_unless_running() {
        let (engine, _dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        // Idle: nothing to pause.
        engine.pause().await;
        assert!(drain(&mut rx).is_empty());

        // Preparing: countdown cannot be paused.
        engine.start(1, 1).await.unwrap();
        sleep_ms(1_200).await;
        engine.pause().await;
        let st = engine.snapshot().await;
        assert_eq!(st.phase, WorkoutPhase::Preparing);
        assert!(!drain(&mut rx).contains(&WorkoutEvent::WorkoutPaused));

        // Resume while running is equally inert.
        sleep_ms(5_000).await;
        engine.resume().await;
        assert!(!drain(&mut rx).contains(&WorkoutEvent::WorkoutResumed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_behaves_like_natural_completion() {
        let (engine, dir) = engine_with(&[60, 90, 90, 60]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(5_500).await;
        drain(&mut rx);

        engine.skip().await;
        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                WorkoutEvent::SegmentCompleted {
                    index: 0,
                    activity: ActivityType::WarmUp,
                },
                WorkoutEvent::SegmentStarted {
                    index: 1,
                    activity: ActivityType::Run,
                    duration_seconds: 90,
                },
            ]
        );

        // Skipping through the remaining segments finishes the workout.
        engine.skip().await;
        engine.skip().await;
        engine.skip().await;
        let events = drain(&mut rx);
        assert!(events.contains(&WorkoutEvent::WorkoutFinished {
            week: 1,
            day: 1,
            genuine: true,
        }));

        engine.wait_for_persistence().await;
        let ledger = ledger::ProgressLedger::load(&dir.path().join("progress.json")).unwrap();
        assert!(ledger.is_completed(1, 1));

        let st = engine.snapshot().await;
        assert_eq!(st.phase, WorkoutPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_never_marks_completed() {
        let (engine, dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(5_000 + 10_000).await;
        engine.stop().await;
        engine.wait_for_persistence().await;

        let events = drain(&mut rx);
        assert!(events.contains(&WorkoutEvent::WorkoutStopped));
        assert!(!events
            .iter()
            .any(|e| matches!(e, WorkoutEvent::WorkoutFinished { .. })));

        let ledger = ledger::ProgressLedger::load(&dir.path().join("progress.json")).unwrap();
        assert!(!ledger.is_completed(1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_marks_completed_exactly_once() {
        let (engine, dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(5_000 + 5_000).await;
        engine.finish().await;
        // A second finish is a silent no-op.
        engine.finish().await;
        engine.wait_for_persistence().await;

        let events = drain(&mut rx);
        let finishes: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, WorkoutEvent::WorkoutFinished { .. }))
            .collect();
        assert_eq!(finishes.len(), 1);
        assert_eq!(
            finishes[0],
            &WorkoutEvent::WorkoutFinished {
                week: 1,
                day: 1,
                genuine: true,
            }
        );

        let ledger = ledger::ProgressLedger::load(&dir.path().join("progress.json")).unwrap();
        assert!(ledger.is_completed(1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_finish_during_countdown_is_not_genuine() {
        let (engine, dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(1_200).await;
        engine.finish().await;
        engine.wait_for_persistence().await;

        let events = drain(&mut rx);
        assert!(events.contains(&WorkoutEvent::WorkoutFinished {
            week: 1,
            day: 1,
            genuine: false,
        }));

        let ledger = ledger::ProgressLedger::load(&dir.path().join("progress.json")).unwrap();
        assert!(ledger.is_completed(1, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_starting_while_active_stops_previous_first() {
        let (engine, _dir) = engine_with(&[60, 90]);
        let mut rx = engine.subscribe_events();

        engine.start(1, 1).await.unwrap();
        sleep_ms(7_000).await;
        drain(&mut rx);

        engine.start(1, 2).await.unwrap();
        sleep_ms(100).await;

        let events = drain(&mut rx);
        assert_eq!(events.first(), Some(&WorkoutEvent::WorkoutStopped));
        assert!(events.contains(&WorkoutEvent::CountdownTick {
            seconds_remaining: 5,
        }));

        let st = engine.snapshot().await;
        assert_eq!((st.week, st.day), (1, 2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drift_correction_resyncs_from_wall_clock() {
        // Leave room below "now" for a 70 s old anchor.
        time::advance(Duration::from_secs(120)).await;
        let now = Instant::now();

        let segments: Arc<[Segment]> = compile_segments(&[300]).into();
        let mut st = WorkoutState::preparing(1, 1, segments, 5, 1);
        st.begin_first_segment(now - Duration::from_secs(70));
        // Stale bookkeeping, as if the timer task starved after 10 s.
        st.remaining_seconds_in_segment = 290;
        st.elapsed_seconds_total = 10;

        assert!(correct_drift(&mut st, now, Duration::from_secs(2)));
        assert_eq!(st.remaining_seconds_in_segment, 230);
        assert_eq!(st.elapsed_seconds_total, 70);

        // Once corrected, the same check leaves the state alone.
        assert!(!correct_drift(&mut st, now, Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drift_within_tolerance_is_left_alone() {
        time::advance(Duration::from_secs(120)).await;
        let now = Instant::now();

        let segments: Arc<[Segment]> = compile_segments(&[300]).into();
        let mut st = WorkoutState::preparing(1, 1, segments, 5, 1);
        st.begin_first_segment(now - Duration::from_secs(10));
        st.remaining_seconds_in_segment = 291;
        st.elapsed_seconds_total = 9;

        assert!(!correct_drift(&mut st, now, Duration::from_secs(2)));
        assert_eq!(st.remaining_seconds_in_segment, 291);
        assert_eq!(st.elapsed_seconds_total, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_stream_replays_on_subscribe() {
        let (engine, _dir) = engine_with(&[60, 90]);
        engine.start(1, 1).await.unwrap();
        sleep_ms(7_000).await;

        // A late subscriber immediately sees the current state.
        let rx = engine.subscribe_state();
        let st = rx.borrow().clone();
        assert_eq!(st.phase, WorkoutPhase::Running);
        assert_eq!((st.week, st.day), (1, 1));
    }
}
