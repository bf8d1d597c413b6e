//! VM error types

use sim_core::{Address, Balance, CoreError};
use thiserror::Error;

/// Why a call failed
///
/// Everything except [`VmError::InvariantViolated`] is an ordinary,
/// expected failure of a single call. An invariant violation means the
/// contract's transition logic itself is broken.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Bad input shape
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Wrong sender or wrong time window
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Sender cannot cover the value sent
    #[error("Insufficient funds in {address}: required {required}, available {available}")]
    InsufficientFunds {
        address: Address,
        required: Balance,
        available: Balance,
    },

    /// Ledger transfer could not be resolved
    #[error("Transfer failed: {0}")]
    Transfer(CoreError),

    /// Contract state broke one of its invariants
    #[error("Invariant violated: {0}")]
    InvariantViolated(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl VmError {
    /// Whether the failure signals a defect rather than bad input
    pub fn is_fatal(&self) -> bool {
        matches!(self, VmError::InvariantViolated(_))
    }
}

impl From<CoreError> for VmError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InsufficientBalance {
                address,
                required,
                available,
            } => VmError::InsufficientFunds {
                address,
                required,
                available,
            },
            CoreError::InvalidAmount(msg) | CoreError::InvalidAddress(msg) => {
                VmError::Precondition(msg)
            }
            other => VmError::Transfer(other),
        }
    }
}

impl From<serde_json::Error> for VmError {
    fn from(err: serde_json::Error) -> Self {
        VmError::Serialization(err.to_string())
    }
}

/// Result type for VM operations
pub type VmResult<T> = Result<T, VmError>;
