use thiserror::Error;

/// Errors of the search and self-play engine.
///
/// None of these are transient: each one means a collaborator (evaluator, rules engine) or the caller broke its
/// contract, and the batch in progress must be aborted.
#[derive(Debug, Error)]
pub enum Error {
    #[error("evaluator returned {actual} results for a batch of {expected} positions")]
    EvaluatorBatchSize { expected: usize, actual: usize },

    #[error("malformed prior distribution: {0}")]
    MalformedPriors(String),

    #[error("evaluator value {0} is outside [-1, 1]")]
    ValueOutOfRange(f32),

    #[error("illegal move: {0}")]
    IllegalMove(String),

    #[error("non terminal position has no legal moves")]
    NoLegalMoves,

    #[error("exploration noise was already injected since the last move")]
    NoiseAlreadyInjected,

    #[error("game is already over")]
    GameOver,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
