//! Error type for experiment configuration and session administration.

use thiserror::Error;

/// Failures surfaced by the generator and the session store. `PoolTooSmall`
/// and `InvalidDesign` are configuration errors and abort session creation
/// outright; the rest are lookup failures from the HTTP/WS surface.
#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error(
        "{requested} rounds requested but only {available} informative choice sets exist; lower num_rounds to {available} or less, or enrich the design"
    )]
    PoolTooSmall { requested: usize, available: usize },
    #[error("invalid experiment design: {0}")]
    InvalidDesign(String),
    #[error("unknown session '{0}'")]
    UnknownSession(String),
    #[error("unknown participant '{0}'")]
    UnknownParticipant(String),
    #[error("round {round} is out of range: this session has {num_rounds} rounds")]
    RoundOutOfRange { round: usize, num_rounds: usize },
}
