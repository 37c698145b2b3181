//! Error types for the dispenser engine.
//!
//! Every fallible operation on a dispenser funnels into the single [`Error`]
//! enum below. The wire layer renders these to protocol error strings; the
//! engine itself never panics on a bad request.

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for dispenser configuration, generation, and
/// persistence.
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A configuration field was missing, unknown, or out of range.
    #[error("invalid config: {reason}")]
    BadConfig { reason: String },

    /// An attempt to change a non-durability field on an existing dispenser.
    #[error("cannot change immutable fields: {}", fields.join(", "))]
    ConfigImmutable { fields: Vec<&'static str> },

    /// The named dispenser is not in the registry.
    #[error("dispenser not found")]
    UnknownDispenser,

    /// A numeric dispenser ran past its cap, its de-duplication threshold,
    /// or its retry budget.
    #[error("number range exhausted")]
    Exhausted,

    /// The persistence hook failed on a path that cannot proceed without it.
    #[error("persistence failed: {context}")]
    PersistenceFailed { context: String },

    /// A snowflake dispenser observed the wall clock moving backwards.
    #[error("clock moved backwards by {behind_ms}ms")]
    ClockRegression { behind_ms: u64 },

    /// The request arrived after graceful shutdown began.
    #[error("service is shutting down")]
    Shutdown,
}

impl Error {
    pub(crate) fn bad_config(reason: impl Into<String>) -> Self {
        Self::BadConfig {
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(err: impl core::fmt::Display) -> Self {
        Self::PersistenceFailed {
            context: err.to_string(),
        }
    }
}
