//! Core data model for the contract execution simulator
//!
//! This crate provides the values every other crate builds on:
//! - Basic types (Address, Balance, Timestamp, StateRoot)
//! - Accounts and the immutable Ledger snapshot
//! - Messages and the call context passed into contract operations

pub mod account;
pub mod error;
pub mod ledger;
pub mod message;
pub mod types;

// Re-export commonly used types
pub use account::*;
pub use error::*;
pub use ledger::*;
pub use message::*;
pub use types::*;
