//! Call protocol and script execution engine
//!
//! This crate provides the execution environment for contract calls:
//! value pre-transfer, transactional invocation, access-control guards,
//! and scripts that thread one ledger through a batch of calls.

pub mod config;
pub mod error;
pub mod executor;
pub mod guard;
pub mod script;

pub use config::{InvariantPolicy, ScriptConfig};
pub use error::{VmError, VmResult};
pub use executor::{invoke, invoke_transactional, FunctionCall, Operation, Transacted};
pub use guard::{after, before, not_after, not_before, only_sender, Guard, OnlySender, TimeGuard};
pub use script::{CallOutcome, CallStatus, Script, ScriptReport};
