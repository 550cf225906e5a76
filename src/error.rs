use std::fmt;

use crate::monitor::Violation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    /// A requester waited longer than its cycle budget.
    Timeout { cycles: u64, waiting_for: String },
    /// Two responders on one bus decode the same word address.
    DecodeOverlap { first: usize, second: usize },
    /// A register block whose shape does not match what it claims to be.
    InvalidLayout(String),
    ContractViolation(Violation),
    ScenarioFailed { name: String, detail: String },
    SaveState(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Timeout { cycles, waiting_for } => {
                write!(f, "timed out after {} cycles waiting for {}", cycles, waiting_for)
            }
            SimError::DecodeOverlap { first, second } => write!(
                f,
                "responders {} and {} both decode the same address",
                first, second
            ),
            SimError::InvalidLayout(msg) => write!(f, "invalid register layout: {}", msg),
            SimError::ContractViolation(v) => write!(f, "bus contract violated: {}", v),
            SimError::ScenarioFailed { name, detail } => {
                write!(f, "scenario '{}' failed: {}", name, detail)
            }
            SimError::SaveState(msg) => write!(f, "save state: {}", msg),
        }
    }
}

impl std::error::Error for SimError {}

impl From<Violation> for SimError {
    fn from(v: Violation) -> Self {
        SimError::ContractViolation(v)
    }
}
