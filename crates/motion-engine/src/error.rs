use arm_link::LinkError;
use scara_kinematics::KinematicsError;
use thiserror::Error;

pub type Result<T, E = EngineError> = core::result::Result<T, E>;

/// Everything here is recoverable: usage errors go back to the operator,
/// transport trouble degrades to logged messages, and nothing aborts the
/// process.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("routine is empty")]
    EmptyRoutine,
    #[error("no pose at index {index}: routine holds {len}")]
    InvalidSelection { index: usize, len: usize },
    #[error("configuration out of limits: {0}")]
    OutOfLimits(String),
    #[error("transport: {0}")]
    Transport(#[from] LinkError),
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
}
