//! Engine error types.

use thiserror::Error;

/// Fatal errors that abort a battle.
///
/// Robot misbehavior is never an `EngineError`: faults, violations and
/// skipped turns are contained per robot and show up in the results.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The battle configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A roster name has no robot implementation
    #[error("Unknown robot: {0}")]
    UnknownRobot(String),

    /// The engine broke one of its own invariants (a bug)
    #[error("Invariant violated in round {round}, turn {turn}: {detail}")]
    InvariantViolation {
        round: u32,
        turn: u64,
        detail: String,
    },

    /// The sandbox could not host a robot
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// Writing results or replays failed
    #[error("Export error: {0}")]
    Export(String),
}

impl EngineError {
    /// Creates a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns true for errors raised before any round ran.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig(_) | Self::UnknownRobot(_))
    }
}
