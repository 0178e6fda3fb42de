use crate::{
    encode_command, run_plan, CancelToken, Direction, EngineError, FrameSink, Pose, Result,
    RoutineStore, RunGuard, RunOutcome, SpeedModel, TrafficLog, TrajectoryPlan,
};
use arm_link::LinkError;
use scara_kinematics::{
    normalize_solution, IkOutcome, JointConfig, JointSolution, LimitGate, LimitReport,
};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

/// Poses are never advanced through faster than this, whatever the speed
/// setting divides the base delay down to.
pub const MIN_STEP_DELAY_MS: f64 = 10.0;

/// Timing knobs for motion and telemetry, all overridable from config.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionTimings {
    /// Nominal duration of one interpolated move at 100% speed.
    #[serde(default = "default_animation_ms")]
    pub animation_ms: f64,
    /// Frames per interpolated move, excluding the start frame.
    #[serde(default = "default_animation_steps")]
    pub animation_steps: u32,
    /// Nominal dwell after each routine pose at 100% speed.
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: f64,
    /// Telemetry polling period.
    #[serde(default = "default_telemetry_ms")]
    pub telemetry_period_ms: u64,
}

fn default_animation_ms() -> f64 {
    600.0
}
fn default_animation_steps() -> u32 {
    30
}
fn default_step_delay_ms() -> f64 {
    1500.0
}
fn default_telemetry_ms() -> u64 {
    crate::DEFAULT_POLL_MS
}

impl Default for MotionTimings {
    fn default() -> Self {
        Self {
            animation_ms: default_animation_ms(),
            animation_steps: default_animation_steps(),
            step_delay_ms: default_step_delay_ms(),
            telemetry_period_ms: default_telemetry_ms(),
        }
    }
}

impl MotionTimings {
    pub fn telemetry_period(&self) -> Duration {
        Duration::from_millis(self.telemetry_period_ms)
    }
}

/// Simulate moves the display only; Execute additionally transmits each pose
/// to the actuator once its interpolation completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayMode {
    Simulate,
    Execute,
}

/// Whole plays every stored pose in order; Step plays exactly one
/// (0-based internally; surfaces display it 1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayScope {
    Whole,
    Step(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Running {
        mode: PlayMode,
        scope: PlayScope,
        cursor: usize,
    },
}

/// How a playback run ended. Rejected starts (`EmptyRoutine`,
/// `InvalidSelection`) never get this far; they are errors, not outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Completed,
    Cancelled,
    Superseded,
}

/// What one playback run did, for the operator's summary line.
#[derive(Debug, Clone)]
pub struct PlayReport {
    pub outcome: PlayOutcome,
    pub poses_done: usize,
    pub writes: usize,
    pub write_failures: usize,
    pub limit_warnings: usize,
}

/// The transport handle shared between the player (writes) and the telemetry
/// reader (reads). `None` is disconnected mode; critical sections are short
/// and never held across an await.
pub type SharedLink = Arc<Mutex<Option<Box<dyn arm_link::ArmLink>>>>;

/// Wrap a freshly opened (or absent) backend for sharing.
pub fn shared_link(link: Option<Box<dyn arm_link::ArmLink>>) -> SharedLink {
    Arc::new(Mutex::new(link))
}

fn write_link_line(link: &SharedLink, line: &str) -> Result<(), LinkError> {
    let mut guard = link.lock().unwrap_or_else(PoisonError::into_inner);
    match guard.as_mut() {
        Some(port) => port.write_line(line),
        None => Err(LinkError::Unavailable),
    }
}

/// Owns every piece of mutable engine state: the live configuration, the
/// gripper flag, the speed setting, the routine store, the limit gate, the
/// run guard, the shared transport, and the traffic log. Everything that
/// moves the arm or touches the wire goes through here.
pub struct Session {
    current: JointConfig,
    gripper_open: bool,
    speed: SpeedModel,
    store: RoutineStore,
    gate: LimitGate,
    guard: RunGuard,
    link: SharedLink,
    log: TrafficLog,
    timings: MotionTimings,
    state: PlayerState,
}

impl Session {
    pub fn new(gate: LimitGate, link: SharedLink, log: TrafficLog, timings: MotionTimings) -> Self {
        Self {
            current: JointConfig::default(),
            gripper_open: true,
            speed: SpeedModel::default(),
            store: RoutineStore::new(),
            gate,
            guard: RunGuard::new(),
            link,
            log,
            timings,
            state: PlayerState::Idle,
        }
    }

    pub fn current(&self) -> JointConfig {
        self.current
    }

    pub fn gripper_open(&self) -> bool {
        self.gripper_open
    }

    pub fn speed(&self) -> &SpeedModel {
        &self.speed
    }

    pub fn set_speed(&mut self, speed: SpeedModel) {
        self.speed = speed;
    }

    pub fn set_speed_percent(&mut self, percent: f64) {
        self.speed.set_percent(percent);
    }

    pub fn store(&self) -> &RoutineStore {
        &self.store
    }

    pub fn log(&self) -> &TrafficLog {
        &self.log
    }

    pub fn link(&self) -> SharedLink {
        Arc::clone(&self.link)
    }

    pub fn timings(&self) -> MotionTimings {
        self.timings
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    /// Gate-check and append one pose. Under the default warn-only policy an
    /// out-of-range pose is stored anyway with its report; under `Enforce`
    /// the append is refused.
    pub fn add_pose(&mut self, pose: Pose) -> Result<LimitReport> {
        let report = self.gate.check(&pose.config());
        if report.blocks() {
            return Err(EngineError::OutOfLimits(violation_summary(&report)));
        }
        self.store.push(pose);
        Ok(report)
    }

    pub fn clear_routine(&mut self) {
        self.store.clear();
    }

    pub fn load_routine(&mut self, poses: Vec<Pose>) {
        self.store = RoutineStore::from_poses(poses);
    }

    /// Animate from the live configuration to `target`.
    ///
    /// The gate runs first: a warning is returned alongside the outcome and
    /// the move still happens; a blocking verdict refuses the move. A fresh
    /// run token is taken, so any in-flight animation goes stale.
    pub async fn goto(
        &mut self,
        target: JointConfig,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
    ) -> Result<(RunOutcome, LimitReport)> {
        let report = self.gate.check(&target);
        if report.blocks() {
            return Err(EngineError::OutOfLimits(violation_summary(&report)));
        }
        let plan = TrajectoryPlan::new(
            self.current,
            target,
            self.timings.animation_steps,
            self.timings.animation_ms,
            self.speed.factor(),
        );
        let token = self.guard.begin();
        let outcome = run_plan(&plan, &mut self.current, sink, &token, cancel).await;
        Ok((outcome, report))
    }

    /// Normalize a solver verdict and animate to it. The raw `IkOutcome`
    /// stops here; callers only ever see the canonical solution.
    pub async fn apply_ik(
        &mut self,
        outcome: IkOutcome,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
    ) -> Result<(JointSolution, RunOutcome, LimitReport)> {
        let solution = normalize_solution(outcome)?;
        let (run, report) = self.goto(solution.config(), sink, cancel).await?;
        Ok((solution, run, report))
    }

    /// Encode and transmit the live configuration with the current gripper
    /// state. Returns the exact line that went out.
    pub fn send_current(&mut self) -> Result<String> {
        let report = self.gate.check(&self.current);
        if report.blocks() {
            return Err(EngineError::OutOfLimits(violation_summary(&report)));
        }
        let solution = JointSolution::from_config(&self.current);
        let line = encode_command(&solution, self.gripper_open, self.speed.factor());
        write_link_line(&self.link, &line)?;
        self.log.record(Direction::Tx, line.trim_end());
        Ok(line)
    }

    /// Set the gripper and transmit immediately.
    pub fn set_gripper(&mut self, open: bool) -> Result<String> {
        self.gripper_open = open;
        self.send_current()
    }

    /// Play the routine: the whole store or one selected pose, simulated or
    /// executed. Per pose: gate check, interpolate from the live
    /// configuration, apply the gripper, transmit on Execute (write failures
    /// are logged and counted, never fatal), then dwell
    /// `max(10 ms, step_delay / factor)`. Cancellation and supersession are
    /// honored at every frame and step boundary; either way the state
    /// returns to `Idle` and no further writes happen.
    pub async fn play(
        &mut self,
        mode: PlayMode,
        scope: PlayScope,
        sink: &mut dyn FrameSink,
        cancel: &CancelToken,
    ) -> Result<PlayReport> {
        let len = self.store.len();
        if len == 0 {
            return Err(EngineError::EmptyRoutine);
        }
        let range = match scope {
            PlayScope::Whole => 0..len,
            PlayScope::Step(index) => {
                if index >= len {
                    return Err(EngineError::InvalidSelection { index, len });
                }
                index..index + 1
            }
        };

        let token = self.guard.begin();
        let factor = self.speed.factor();
        let dwell = Duration::from_secs_f64(
            (self.timings.step_delay_ms / factor).max(MIN_STEP_DELAY_MS) / 1000.0,
        );
        let mut report = PlayReport {
            outcome: PlayOutcome::Completed,
            poses_done: 0,
            writes: 0,
            write_failures: 0,
            limit_warnings: 0,
        };

        for cursor in range {
            self.state = PlayerState::Running {
                mode,
                scope,
                cursor,
            };
            let Some(pose) = self.store.get(cursor).copied() else {
                break;
            };

            let gate = self.gate.check(&pose.config());
            if gate.blocks() {
                self.state = PlayerState::Idle;
                return Err(EngineError::OutOfLimits(violation_summary(&gate)));
            }
            report.limit_warnings += gate.violations.len();

            let plan = TrajectoryPlan::new(
                self.current,
                pose.config(),
                self.timings.animation_steps,
                self.timings.animation_ms,
                factor,
            );
            match run_plan(&plan, &mut self.current, sink, &token, cancel).await {
                RunOutcome::Completed => {}
                RunOutcome::Superseded => {
                    self.state = PlayerState::Idle;
                    report.outcome = PlayOutcome::Superseded;
                    return Ok(report);
                }
                RunOutcome::Cancelled => {
                    self.state = PlayerState::Idle;
                    report.outcome = PlayOutcome::Cancelled;
                    return Ok(report);
                }
            }
            self.gripper_open = pose.gripper_open;

            if mode == PlayMode::Execute {
                let line = encode_command(&pose.solution(), pose.gripper_open, factor);
                match write_link_line(&self.link, &line) {
                    Ok(()) => {
                        self.log.record(Direction::Tx, line.trim_end());
                        report.writes += 1;
                    }
                    Err(e) => {
                        warn!(pose = cursor + 1, error = %e, "pose transmit failed; run continues");
                        report.write_failures += 1;
                    }
                }
            }
            report.poses_done += 1;
            info!(pose = cursor + 1, of = len, mode = ?mode, "pose done");

            tokio::time::sleep(dwell).await;
            if cancel.is_cancelled() {
                self.state = PlayerState::Idle;
                report.outcome = PlayOutcome::Cancelled;
                return Ok(report);
            }
            if !token.is_current() {
                self.state = PlayerState::Idle;
                report.outcome = PlayOutcome::Superseded;
                return Ok(report);
            }
        }

        self.state = PlayerState::Idle;
        Ok(report)
    }
}

fn violation_summary(report: &LimitReport) -> String {
    report
        .violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullSink;
    use arm_link::{ArmLink, MockLink};
    use scara_kinematics::{GatePolicy, JointRanges};

    fn session_over_mock(policy: GatePolicy) -> (Session, MockLink) {
        let link = MockLink::open("mock0", 115_200).unwrap();
        let probe = link.clone();
        let session = Session::new(
            LimitGate::new(JointRanges::default(), policy),
            shared_link(Some(Box::new(link))),
            TrafficLog::default(),
            MotionTimings::default(),
        );
        (session, probe)
    }

    fn three_pose_session(policy: GatePolicy) -> (Session, MockLink) {
        let (mut session, probe) = session_over_mock(policy);
        session.load_routine(vec![
            Pose::new(10.0, 0.0, 0.0, true),
            Pose::new(20.0, -15.0, 30.0, false),
            Pose::new(0.0, 0.0, 0.0, true),
        ]);
        (session, probe)
    }

    #[tokio::test(start_paused = true)]
    async fn whole_execute_writes_every_pose_in_order() {
        let (mut session, probe) = three_pose_session(GatePolicy::WarnOnly);
        let cancel = CancelToken::new();
        let report = session
            .play(PlayMode::Execute, PlayScope::Whole, &mut NullSink, &cancel)
            .await
            .unwrap();

        assert_eq!(report.outcome, PlayOutcome::Completed);
        assert_eq!(report.poses_done, 3);
        assert_eq!(report.writes, 3);
        assert_eq!(report.write_failures, 0);
        assert_eq!(session.state(), PlayerState::Idle);

        let sent = probe.sent();
        assert_eq!(sent.len(), 3);
        // Each line is the pose reached by the preceding interpolation,
        // which is also where the live configuration ended up.
        assert_eq!(
            sent[1],
            encode_command(&Pose::new(20.0, -15.0, 30.0, false).solution(), false, 1.0)
        );
        assert_eq!(session.current(), JointConfig::new(0.0, 0.0, 0.0));
        assert!(session.gripper_open());
    }

    #[tokio::test(start_paused = true)]
    async fn simulate_never_touches_the_wire() {
        let (mut session, probe) = three_pose_session(GatePolicy::WarnOnly);
        let cancel = CancelToken::new();
        let report = session
            .play(PlayMode::Simulate, PlayScope::Whole, &mut NullSink, &cancel)
            .await
            .unwrap();
        assert_eq!(report.poses_done, 3);
        assert_eq!(report.writes, 0);
        assert!(probe.sent().is_empty());
        // Simulated runs still move the display state and the gripper.
        assert_eq!(session.current(), JointConfig::new(0.0, 0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn single_step_plays_exactly_one_pose() {
        let (mut session, probe) = three_pose_session(GatePolicy::WarnOnly);
        let cancel = CancelToken::new();
        let report = session
            .play(
                PlayMode::Execute,
                PlayScope::Step(1),
                &mut NullSink,
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(report.poses_done, 1);
        assert_eq!(probe.sent().len(), 1);
        assert_eq!(session.current(), JointConfig::new(20.0, -15.0, 30.0));
        assert!(!session.gripper_open());
        assert_eq!(session.state(), PlayerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_step_is_rejected_and_stays_idle() {
        let (mut session, probe) = three_pose_session(GatePolicy::WarnOnly);
        let cancel = CancelToken::new();
        let err = session
            .play(
                PlayMode::Execute,
                PlayScope::Step(3),
                &mut NullSink,
                &cancel,
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidSelection { index: 3, len: 3 }
        ));
        assert_eq!(session.state(), PlayerState::Idle);
        assert!(probe.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_store_is_rejected() {
        let (mut session, _probe) = session_over_mock(GatePolicy::WarnOnly);
        let cancel = CancelToken::new();
        let err = session
            .play(PlayMode::Execute, PlayScope::Whole, &mut NullSink, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::EmptyRoutine));
    }

    #[tokio::test(start_paused = true)]
    async fn write_failures_do_not_stop_the_run() {
        let (mut session, probe) = three_pose_session(GatePolicy::WarnOnly);
        probe.set_fail_writes(true);
        let cancel = CancelToken::new();
        let report = session
            .play(PlayMode::Execute, PlayScope::Whole, &mut NullSink, &cancel)
            .await
            .unwrap();
        assert_eq!(report.outcome, PlayOutcome::Completed);
        assert_eq!(report.poses_done, 3);
        assert_eq!(report.writes, 0);
        assert_eq!(report.write_failures, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnected_execute_degrades_per_pose() {
        let mut session = Session::new(
            LimitGate::new(JointRanges::default(), GatePolicy::WarnOnly),
            shared_link(None),
            TrafficLog::default(),
            MotionTimings::default(),
        );
        session.load_routine(vec![Pose::new(5.0, 5.0, 5.0, true)]);
        let cancel = CancelToken::new();
        let report = session
            .play(PlayMode::Execute, PlayScope::Whole, &mut NullSink, &cancel)
            .await
            .unwrap();
        assert_eq!(report.outcome, PlayOutcome::Completed);
        assert_eq!(report.write_failures, 1);
        assert_eq!(session.current(), JointConfig::new(5.0, 5.0, 5.0));
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_limits_pose_warns_and_still_transmits() {
        let (mut session, probe) = session_over_mock(GatePolicy::WarnOnly);
        session.load_routine(vec![Pose::new(120.0, 0.0, 30.0, true)]);
        let cancel = CancelToken::new();
        let report = session
            .play(PlayMode::Execute, PlayScope::Whole, &mut NullSink, &cancel)
            .await
            .unwrap();
        assert_eq!(report.limit_warnings, 1);
        assert_eq!(report.writes, 1);
        assert_eq!(probe.sent().len(), 1);
        assert_eq!(session.current().q1_deg, 120.0);
    }

    #[tokio::test(start_paused = true)]
    async fn enforce_policy_refuses_a_blocking_pose() {
        let (mut session, probe) = session_over_mock(GatePolicy::Enforce);
        session.load_routine(vec![Pose::new(120.0, 0.0, 30.0, true)]);
        let cancel = CancelToken::new();
        let err = session
            .play(PlayMode::Execute, PlayScope::Whole, &mut NullSink, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::OutOfLimits(_)));
        assert!(probe.sent().is_empty());
        assert_eq!(session.state(), PlayerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_between_steps_stops_further_writes() {
        let (mut session, probe) = three_pose_session(GatePolicy::WarnOnly);
        let cancel = CancelToken::new();
        struct CancelOnArrival {
            token: CancelToken,
            at: JointConfig,
        }
        impl FrameSink for CancelOnArrival {
            fn apply(&mut self, frame: &crate::AnimationFrame) {
                if frame.config == self.at {
                    self.token.cancel();
                }
            }
        }
        let mut sink = CancelOnArrival {
            token: cancel.clone(),
            at: JointConfig::new(10.0, 0.0, 0.0),
        };
        let report = session
            .play(PlayMode::Execute, PlayScope::Whole, &mut sink, &cancel)
            .await
            .unwrap();
        assert_eq!(report.outcome, PlayOutcome::Cancelled);
        // The first pose finished its interpolation and wrote; nothing after.
        assert_eq!(report.poses_done, 1);
        assert_eq!(probe.sent().len(), 1);
        assert_eq!(session.state(), PlayerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn goto_then_send_current_round_trip() {
        let (mut session, probe) = session_over_mock(GatePolicy::WarnOnly);
        let cancel = CancelToken::new();
        let (outcome, report) = session
            .goto(JointConfig::new(45.0, -45.0, 20.0), &mut NullSink, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome, RunOutcome::Completed);
        assert!(report.is_clear());
        let line = session.send_current().unwrap();
        assert_eq!(probe.sent(), vec![line.clone()]);
        assert!(line.ends_with(",1,1.00\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn gripper_change_sends_immediately() {
        let (mut session, probe) = session_over_mock(GatePolicy::WarnOnly);
        let line = session.set_gripper(false).unwrap();
        assert!(!session.gripper_open());
        assert!(line.ends_with(",0,1.00\n"));
        assert_eq!(probe.sent().len(), 1);
        assert_eq!(session.log().len(), 1);
    }

    #[test]
    fn add_pose_gate_checks_on_append() {
        let (mut session, _probe) = session_over_mock(GatePolicy::WarnOnly);
        let report = session.add_pose(Pose::new(120.0, 0.0, 0.0, true)).unwrap();
        assert!(!report.is_clear());
        assert_eq!(session.store().len(), 1);

        let (mut strict, _probe) = session_over_mock(GatePolicy::Enforce);
        assert!(strict.add_pose(Pose::new(120.0, 0.0, 0.0, true)).is_err());
        assert!(strict.store().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dwell_scales_with_speed_and_floors() {
        let (mut session, _probe) = session_over_mock(GatePolicy::WarnOnly);
        session.load_routine(vec![Pose::new(1.0, 0.0, 0.0, true)]);
        session.set_speed(SpeedModel::new(100.0, (0.0, 1.0e6)));
        session.set_speed_percent(1.0e6);
        let cancel = CancelToken::new();
        let began = tokio::time::Instant::now();
        session
            .play(PlayMode::Simulate, PlayScope::Whole, &mut NullSink, &cancel)
            .await
            .unwrap();
        // 30 frame gaps at the 5 ms floor plus the 10 ms dwell floor.
        assert_eq!(began.elapsed(), Duration::from_millis(160));
    }
}
