//! Error types for the core crate

use crate::{Address, Balance};
use thiserror::Error;

/// Ledger and data-model errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Account not found: {0}")]
    UnknownAccount(Address),

    #[error("Insufficient balance in {address}: required {required}, available {available}")]
    InsufficientBalance {
        address: Address,
        required: Balance,
        available: Balance,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Duplicate account at genesis: {0}")]
    DuplicateAccount(Address),

    #[error("Ledger entry {key} stores account {stored}")]
    InconsistentEntry { key: Address, stored: Address },
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;
