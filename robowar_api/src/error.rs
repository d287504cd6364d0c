//! Error types returned by robot programs.

use crate::types::Capability;
use thiserror::Error;

/// Why a robot program stopped before finishing its turn normally.
///
/// Every `RobotContext` call returns `Result<_, Halt>`, so robot code can
/// simply propagate with `?` and the sandbox sees the reason.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Halt {
    /// The per-turn compute budget ran out (cooperative suspend)
    #[error("compute budget exhausted")]
    BudgetExhausted,

    /// The robot asked for a capability the sandbox does not grant
    #[error("capability denied: {0}")]
    Denied(Capability),

    /// The robot failed on its own (bad argument, internal error)
    #[error("robot fault: {0}")]
    Fault(String),
}

impl Halt {
    /// Creates a fault.
    pub fn fault(msg: impl Into<String>) -> Self {
        Self::Fault(msg.into())
    }

    /// Creates a fault for a non-finite argument.
    pub fn non_finite(operation: &str) -> Self {
        Self::fault(format!("non-finite argument to {}", operation))
    }
}
