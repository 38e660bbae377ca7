//! Error types for Strider range analysis

use thiserror::Error;

/// Main error type for Strider
///
/// Queries that merely have no answer return `Option::None`; an `Error` is
/// produced only by code-generation entry points, which have a precondition
/// (`can_generate_*`) and several distinct ways to miss it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The target value has no induction classification in its loop
    #[error("instruction is not classified by induction analysis")]
    Unclassified,

    /// The enclosing loop has no usable trip-count description
    #[error("no trip count is available for the enclosing loop")]
    MissingTripCount,

    /// The induction form has no code-generation strategy
    #[error("unsupported induction form for code generation")]
    Unsupported,

    /// Emission would require arithmetic that may wrap around
    #[error("cannot prove absence of arithmetic overflow in generated code")]
    PotentialOverflow,
}

/// Result type alias for Strider
pub type Result<T> = std::result::Result<T, Error>;
