//! Error taxonomy for the System Activity Correlator
//!
//! Every kind here is non-fatal to the correlator itself. Callers (the
//! recorder facade, the dispatcher) log and drop the offending event rather
//! than propagate a panic.

use thiserror::Error;

/// Errors surfaced by the correlator core (identifier model, span context,
/// actor maps, process activity context, process registry).
#[derive(Error, Debug)]
pub enum CorrelatorError {
    /// Null/empty required inputs, or an `Undefined` sentinel enum value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An actor's direction does not match the actor map it was submitted to.
    #[error("actor type does not belong to this map's direction: {0}")]
    InvalidActorDirection(String),

    /// Unknown event code or an actor direction with no dispatch target.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The tracing backend refused to create or otherwise manage a span.
    #[error("tracing backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Operation attempted on a span that is not in the required state.
    #[error("invalid span state: {0}")]
    InvalidState(String),

    /// Startup configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the correlator core.
pub type CorrelatorResult<T> = Result<T, CorrelatorError>;
