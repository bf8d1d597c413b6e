//! Stateful contracts built on the call protocol
//!
//! Every contract owns its storage behind a single per-instance mutex.
//! Mutating operations take the lock for their whole duration and end by
//! re-checking the contract's invariants; a broken invariant is reported
//! as [`VmError::InvariantViolated`](sim_vm::VmError::InvariantViolated).

pub mod auction;
pub mod ballot;
pub mod coin;
pub mod contract;

pub use auction::SimpleAuction;
pub use ballot::{Ballot, Proposal, Voter};
pub use coin::Coin;
pub use contract::Contract;
