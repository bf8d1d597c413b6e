//! Shared contract traits and helpers

use sim_core::{Address, Ledger};
use sim_vm::{VmError, VmResult};

/// Behaviour common to every contract instance
pub trait Contract: Send + Sync {
    /// Contract name for logs and reports
    fn name(&self) -> &'static str;

    /// Ledger account that receives value sent to the contract
    fn address(&self) -> Address;

    /// Check the contract's invariants against a ledger snapshot
    fn check_invariants(&self, ledger: &Ledger) -> VmResult<()>;
}

/// Fail with an invariant violation unless `condition` holds
pub(crate) fn ensure(condition: bool, describe: impl FnOnce() -> String) -> VmResult<()> {
    if condition {
        Ok(())
    } else {
        Err(VmError::InvariantViolated(describe()))
    }
}
