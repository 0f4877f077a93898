// Domain faults raised by the stage model and the lot write paths.
// These are caller or data bugs, never transient conditions, so nothing
// in the crate retries or swallows them.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LotError {
    /// A stage name outside the closed pipeline enumeration.
    #[error("Unknown stage '{0}'")]
    UnknownStage(String),

    /// Attempt to read or write a stage the lot has not reached yet.
    #[error("Stage {requested} has not been reached (lot is at {current})")]
    StageNotReached { requested: String, current: String },

    /// Stages only move forward.
    #[error("Cannot move lot from {current} to {target}: stages only move forward")]
    StageRegression { current: String, target: String },

    #[error("Lot is already at the final stage ({0})")]
    PipelineComplete(String),

    #[error("Field '{field}' does not apply to stage {stage}")]
    UnknownField { stage: String, field: String },

    #[error("Field '{0}' is maintained automatically and cannot be set")]
    ReadOnlyField(String),

    #[error("Invalid value '{value}' for field '{field}': expected {expected}")]
    InvalidFieldValue { field: String, value: String, expected: &'static str },
}

impl LotError {
    /// True for faults that mean stored data disagrees with the model,
    /// as opposed to bad user input.
    pub fn is_integrity_fault(&self) -> bool {
        matches!(self, LotError::UnknownStage(_))
    }
}
