//! motion-engine: motion sequencing and actuation for the SCARA arm
//!
//! This crate is the control core of the workspace: the speed model that
//! scales all timing, the time-scaled trajectory interpolator, the routine
//! store and its playback state machine, the byte-exact actuator command
//! encoder, the non-blocking telemetry reader, and the session that owns
//! every piece of mutable state between them. Kinematics and the transport
//! are consumed through the `scara-kinematics` and `arm-link` ports.
//!
//! Scheduling is a single-threaded cooperative loop: every timed activity is
//! an awaited sleep on a current-thread tokio runtime. Overlapping motions
//! are resolved by generation tokens ([`RunGuard`]) and every run honors a
//! [`CancelToken`] at its frame and step boundaries.

mod error;
pub use error::{EngineError, Result};

mod speed;
pub use speed::{factor_for, SpeedModel, MIN_EFFECTIVE_PERCENT};

mod guard;
pub use guard::{CancelToken, RunGuard, RunToken};

mod interp;
pub use interp::{
    run_plan, AnimationFrame, FrameSink, Frames, NullSink, RunOutcome, TrajectoryPlan,
    MIN_FRAME_DELAY_MS,
};

mod routine;
pub use routine::{Pose, RoutineStore};

mod encoder;
pub use encoder::encode_command;

mod monitor;
pub use monitor::{
    Direction, TelemetryReader, TrafficEntry, TrafficLog, DEFAULT_LOG_CAPACITY, DEFAULT_POLL_MS,
    MAX_CARRY_BYTES,
};

mod session;
pub use session::{
    shared_link, MotionTimings, PlayMode, PlayOutcome, PlayReport, PlayScope, PlayerState,
    Session, SharedLink, MIN_STEP_DELAY_MS,
};
