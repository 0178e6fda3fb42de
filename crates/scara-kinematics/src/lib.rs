//! scara-kinematics: geometry and joint-space types for the SCARA RRP arm
//!
//! This crate owns everything the motion engine needs to know about the arm
//! itself: the link geometry and joint ranges, the canonical `JointSolution`
//! representation, the `Kinematics` port the engine consumes solvers through,
//! the normalizer that turns a solver's loosely shaped result into exactly one
//! canonical type, and the joint-limit gate with its warn-versus-block policy.
//! A reference planar solver ships here so the workspace is usable without an
//! external solver plugged in.

mod geometry;
pub use geometry::{JointRanges, ScaraGeometry};

mod types;
pub use types::{FkSolution, JointConfig, JointSolution, TaskPoint, Transform};

mod error;
pub use error::{KinematicsError, Result};

mod solver;
pub use solver::{IkFields, IkOutcome, IkPayload, Kinematics, PlanarScara};

mod normalize;
pub use normalize::normalize_solution;

mod limits;
pub use limits::{GatePolicy, LimitGate, LimitReport, LimitViolation, Verdict};
