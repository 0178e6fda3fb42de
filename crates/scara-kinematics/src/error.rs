use thiserror::Error;

pub type Result<T, E = KinematicsError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum KinematicsError {
    /// The solver reports the target as infeasible. Carries the solver's own
    /// message so the operator sees the reason it gave.
    #[error("no solution: {0}")]
    NoSolution(String),
    /// The solver said ok but its payload could not be completed into a
    /// canonical solution.
    #[error("incomplete solution: {0}")]
    IncompleteSolution(&'static str),
}
