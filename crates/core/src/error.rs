use thiserror::Error;

use crate::types::ContactStatus;

pub type CrmResult<T> = Result<T, CrmError>;

#[derive(Error, Debug)]
pub enum CrmError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Rejected engagement configuration. Raised at construction, never mid-computation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("weight for '{interaction_type}' must be a finite non-negative number, got {value}")]
    InvalidWeight {
        interaction_type: String,
        value: f64,
    },

    #[error("half-life must be a positive finite number of days, got {0}")]
    InvalidHalfLife(f64),

    #[error("lookback window must be a positive number of days")]
    InvalidLookback,

    #[error("velocity window must be a positive number of days")]
    InvalidVelocityWindow,

    #[error("trend tolerance must be a finite non-negative number, got {0}")]
    InvalidTrendTolerance(f64),
}

/// Segment definition rejected before any query is issued.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("field '{0}' is not allowed in segment filters")]
    UnknownField(String),

    #[error("operator '{operator}' is not supported for field '{field}'")]
    UnsupportedOperator { field: String, operator: String },

    #[error("invalid value for '{field}': expected {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: String,
    },

    #[error("segment nesting exceeds the maximum depth of {max_depth}")]
    DepthExceeded { max_depth: usize },
}

/// Status change refused by the lifecycle state machine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("transition from {from} to {to} is forbidden: {reason}")]
    Forbidden {
        from: ContactStatus,
        to: ContactStatus,
        reason: String,
    },

    #[error("transition from {from} to {to} requires confirmation: {reason}")]
    ConfirmationRequired {
        from: ContactStatus,
        to: ContactStatus,
        reason: String,
    },

    #[error("contact was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { expected: u64, actual: u64 },
}

impl TransitionError {
    /// Whether the caller should re-read the contact and try again.
    pub fn is_conflict(&self) -> bool {
        matches!(self, TransitionError::Conflict { .. })
    }
}
