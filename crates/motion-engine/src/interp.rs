use crate::{CancelToken, RunToken};
use scara_kinematics::JointConfig;
use std::time::Duration;
use tracing::debug;

/// Frames are never delivered closer together than this, however fast the
/// speed setting scales the duration down.
pub const MIN_FRAME_DELAY_MS: f64 = 5.0;

/// One momentary configuration mid-animation. Exists for the duration of a
/// single delivery; nothing stores frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationFrame {
    pub step: u32,
    pub config: JointConfig,
}

/// Where delivered frames go: a renderer, a log, a test recorder. The engine
/// pushes every frame of every run through the session's sink.
pub trait FrameSink {
    fn apply(&mut self, frame: &AnimationFrame);
}

/// A sink for surfaces that only want the motion's timing, not its frames.
pub struct NullSink;

impl FrameSink for NullSink {
    fn apply(&mut self, _frame: &AnimationFrame) {}
}

/// How one interpolation run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// A newer run invalidated this one; remaining frames were dropped.
    Superseded,
    Cancelled,
}

/// A linear joint-space blend from `start` to `target` over `steps`
/// intervals, timed so the whole motion nominally takes
/// `nominal_ms / factor` milliseconds.
///
/// The frame sequence is finite (`steps + 1` frames, the first being `start`
/// itself) and lazy; [`TrajectoryPlan::frames`] hands out a fresh iterator
/// each call, so replaying means asking again. The last frame is `target`
/// exactly, not the blend's floating-point approximation of it.
#[derive(Debug, Clone)]
pub struct TrajectoryPlan {
    start: JointConfig,
    target: JointConfig,
    steps: u32,
    frame_delay: Duration,
}

impl TrajectoryPlan {
    pub fn new(
        start: JointConfig,
        target: JointConfig,
        steps: u32,
        nominal_ms: f64,
        factor: f64,
    ) -> Self {
        let steps = steps.max(1);
        let duration_ms = nominal_ms / factor;
        let delay_ms = (duration_ms / f64::from(steps)).max(MIN_FRAME_DELAY_MS);
        Self {
            start,
            target,
            steps,
            frame_delay: Duration::from_secs_f64(delay_ms / 1000.0),
        }
    }

    pub fn steps(&self) -> u32 {
        self.steps
    }

    pub fn target(&self) -> JointConfig {
        self.target
    }

    /// Pause between consecutive frames.
    pub fn frame_delay(&self) -> Duration {
        self.frame_delay
    }

    pub fn frames(&self) -> Frames<'_> {
        Frames {
            plan: self,
            next: 0,
        }
    }

    fn frame_at(&self, step: u32) -> AnimationFrame {
        let config = if step >= self.steps {
            self.target
        } else {
            let alpha = f64::from(step) / f64::from(self.steps);
            JointConfig::new(
                blend(self.start.q1_deg, self.target.q1_deg, alpha),
                blend(self.start.q2_deg, self.target.q2_deg, alpha),
                blend(self.start.d3_mm, self.target.d3_mm, alpha),
            )
        };
        AnimationFrame { step, config }
    }
}

fn blend(start: f64, target: f64, alpha: f64) -> f64 {
    start + (target - start) * alpha
}

/// Lazy frame sequence over a plan.
pub struct Frames<'a> {
    plan: &'a TrajectoryPlan,
    next: u32,
}

impl Iterator for Frames<'_> {
    type Item = AnimationFrame;

    fn next(&mut self) -> Option<AnimationFrame> {
        if self.next > self.plan.steps {
            return None;
        }
        let frame = self.plan.frame_at(self.next);
        self.next += 1;
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.plan.steps + 1).saturating_sub(self.next) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Frames<'_> {}

/// Drive one plan to its end: apply each frame to the live configuration,
/// hand it to the sink, then suspend for the plan's delay before the next.
///
/// `current` is the session's live configuration, passed in by handle; it
/// tracks every applied frame, so a run that stops early leaves it exactly
/// where the arm display last was, and a completed run leaves it equal to
/// the plan's target. The token is compared before each frame: if a newer
/// run has started, this one stops without applying the frame. Cancellation
/// is honored at the same boundary.
pub async fn run_plan(
    plan: &TrajectoryPlan,
    current: &mut JointConfig,
    sink: &mut dyn FrameSink,
    token: &RunToken,
    cancel: &CancelToken,
) -> RunOutcome {
    for frame in plan.frames() {
        if !token.is_current() {
            debug!(step = frame.step, "run superseded; dropping remaining frames");
            return RunOutcome::Superseded;
        }
        if cancel.is_cancelled() {
            debug!(step = frame.step, "run cancelled");
            return RunOutcome::Cancelled;
        }
        *current = frame.config;
        sink.apply(&frame);
        if frame.step < plan.steps {
            tokio::time::sleep(plan.frame_delay).await;
        }
    }
    RunOutcome::Completed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RunGuard;
    use std::sync::{Arc, Mutex};

    struct Recorder(Arc<Mutex<Vec<AnimationFrame>>>);

    impl FrameSink for Recorder {
        fn apply(&mut self, frame: &AnimationFrame) {
            self.0.lock().unwrap().push(*frame);
        }
    }

    fn recorder() -> (Recorder, Arc<Mutex<Vec<AnimationFrame>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        (Recorder(frames.clone()), frames)
    }

    #[test]
    fn plan_emits_steps_plus_one_frames() {
        let plan = TrajectoryPlan::new(
            JointConfig::new(0.0, 0.0, 0.0),
            JointConfig::new(30.0, -30.0, 15.0),
            30,
            600.0,
            1.0,
        );
        assert_eq!(plan.frames().len(), 31);
        assert_eq!(plan.frames().count(), 31);
    }

    #[test]
    fn final_frame_is_target_exactly() {
        // 0.1 + 3 * (0.4 - 0.1) / 3 accumulates floating error if the blend
        // is naive; the last frame must compare bit-equal to the target.
        let target = JointConfig::new(0.4, 10.1, 33.3);
        let plan = TrajectoryPlan::new(JointConfig::new(0.1, -7.7, 1.1), target, 7, 600.0, 1.0);
        let last = plan.frames().last().unwrap();
        assert_eq!(last.config, target);
        assert_eq!(last.step, 7);
    }

    #[test]
    fn frames_progress_monotonically() {
        let plan = TrajectoryPlan::new(
            JointConfig::new(0.0, 20.0, 50.0),
            JointConfig::new(10.0, 0.0, 0.0),
            10,
            600.0,
            1.0,
        );
        let frames: Vec<_> = plan.frames().collect();
        for pair in frames.windows(2) {
            assert!(pair[1].config.q1_deg >= pair[0].config.q1_deg);
            assert!(pair[1].config.q2_deg <= pair[0].config.q2_deg);
            assert!(pair[1].config.d3_mm <= pair[0].config.d3_mm);
        }
    }

    #[test]
    fn delay_scales_with_factor_and_floors_at_5ms() {
        let start = JointConfig::default();
        let target = JointConfig::new(1.0, 1.0, 1.0);
        // 600 ms / 1.0 over 30 steps: 20 ms per frame.
        let plan = TrajectoryPlan::new(start, target, 30, 600.0, 1.0);
        assert_eq!(plan.frame_delay(), Duration::from_millis(20));
        // Twice the speed halves the delay.
        let plan = TrajectoryPlan::new(start, target, 30, 600.0, 2.0);
        assert_eq!(plan.frame_delay(), Duration::from_millis(10));
        // Absurd speed still respects the floor.
        let plan = TrajectoryPlan::new(start, target, 30, 600.0, 1.0e6);
        assert_eq!(plan.frame_delay(), Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn run_delivers_every_frame_and_updates_current() {
        let (mut sink, frames) = recorder();
        let guard = RunGuard::new();
        let token = guard.begin();
        let cancel = CancelToken::new();
        let target = JointConfig::new(12.0, -6.0, 24.0);
        let plan = TrajectoryPlan::new(JointConfig::default(), target, 4, 100.0, 1.0);
        let mut current = JointConfig::default();

        let began = tokio::time::Instant::now();
        let outcome = run_plan(&plan, &mut current, &mut sink, &token, &cancel).await;

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(current, target);
        assert_eq!(frames.lock().unwrap().len(), 5);
        // Four pauses of 25 ms each; no pause after the final frame.
        assert_eq!(began.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn superseding_run_stops_frame_delivery() {
        struct Usurper {
            guard: RunGuard,
            after: u32,
            seen: Arc<Mutex<Vec<AnimationFrame>>>,
        }
        impl FrameSink for Usurper {
            fn apply(&mut self, frame: &AnimationFrame) {
                self.seen.lock().unwrap().push(*frame);
                if frame.step == self.after {
                    // A newer run starts while this one is mid-flight.
                    let _ = self.guard.begin();
                }
            }
        }

        let guard = RunGuard::new();
        let token = guard.begin();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut sink = Usurper {
            guard: guard.clone(),
            after: 2,
            seen: seen.clone(),
        };
        let cancel = CancelToken::new();
        let target = JointConfig::new(10.0, 10.0, 10.0);
        let plan = TrajectoryPlan::new(JointConfig::default(), target, 10, 100.0, 1.0);
        let mut current = JointConfig::default();

        let outcome = run_plan(&plan, &mut current, &mut sink, &token, &cancel).await;

        assert_eq!(outcome, RunOutcome::Superseded);
        // Frames 0..=2 applied, then the stale token was noticed.
        assert_eq!(seen.lock().unwrap().len(), 3);
        assert_ne!(current, target);
        assert_eq!(current, seen.lock().unwrap()[2].config);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_honored_between_frames() {
        struct CancelAfter {
            token: CancelToken,
            after: u32,
        }
        impl FrameSink for CancelAfter {
            fn apply(&mut self, frame: &AnimationFrame) {
                if frame.step == self.after {
                    self.token.cancel();
                }
            }
        }

        let guard = RunGuard::new();
        let token = guard.begin();
        let cancel = CancelToken::new();
        let mut sink = CancelAfter {
            token: cancel.clone(),
            after: 1,
        };
        let plan = TrajectoryPlan::new(
            JointConfig::default(),
            JointConfig::new(8.0, 8.0, 8.0),
            8,
            80.0,
            1.0,
        );
        let mut current = JointConfig::default();

        let outcome = run_plan(&plan, &mut current, &mut sink, &token, &cancel).await;
        assert_eq!(outcome, RunOutcome::Cancelled);
        assert_eq!(current.q1_deg, 1.0);
    }
}
