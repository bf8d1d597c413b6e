//! Script engine
//!
//! A [`Script`] owns the current ledger of a batch of calls. Calls run one
//! at a time under the script's lock, each on the ledger left by the
//! previous one, so concurrent submitters never interleave a call's
//! read/transfer/write sequence. A failing call is turned into a no-op on
//! the ledger and the batch continues, unless it broke a contract
//! invariant and the configured policy says to abort.

use crate::config::{InvariantPolicy, ScriptConfig};
use crate::executor::FunctionCall;
use crate::VmError;
use parking_lot::Mutex;
use sim_core::{Address, CallContext, Ledger, Timestamp};
use tracing::{debug, error, info, warn};

/// What happened to one call
#[derive(Debug, Clone, PartialEq)]
pub enum CallStatus {
    /// Call went through; operation result as JSON
    Completed(serde_json::Value),
    /// Call failed and its ledger effects were discarded
    Reverted(VmError),
    /// Call never ran because the script had aborted
    Skipped,
}

/// Per-call entry of a [`ScriptReport`]
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub label: String,
    pub sender: Address,
    pub recipient: Address,
    pub status: CallStatus,
}

impl CallOutcome {
    /// Whether the call went through
    pub fn is_completed(&self) -> bool {
        matches!(self.status, CallStatus::Completed(_))
    }

    /// Whether the call reported a broken contract invariant
    pub fn is_fatal(&self) -> bool {
        matches!(&self.status, CallStatus::Reverted(err) if err.is_fatal())
    }
}

/// Result of executing a batch of calls
#[derive(Debug, Clone)]
pub struct ScriptReport {
    /// Ledger after the last executed call
    pub ledger: Ledger,
    /// One entry per submitted call, in submission order
    pub outcomes: Vec<CallOutcome>,
    /// Whether an invariant violation stopped the script
    pub aborted: bool,
}

impl ScriptReport {
    /// Number of calls that went through
    pub fn completed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_completed()).count()
    }

    /// Number of calls that were reverted
    pub fn reverted(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, CallStatus::Reverted(_)))
            .count()
    }

    /// Calls that reported a broken invariant
    pub fn fatal(&self) -> impl Iterator<Item = &CallOutcome> {
        self.outcomes.iter().filter(|o| o.is_fatal())
    }
}

struct ScriptState {
    ledger: Ledger,
    halted: bool,
}

/// Sequential, serialized execution of function calls
pub struct Script {
    config: ScriptConfig,
    default_timestamp: Timestamp,
    state: Mutex<ScriptState>,
}

impl Script {
    /// Start a script from an initial context
    ///
    /// Calls without an explicit timestamp use the initial message's.
    pub fn new(initial: &CallContext, config: ScriptConfig) -> Self {
        Self {
            config,
            default_timestamp: initial.timestamp(),
            state: Mutex::new(ScriptState {
                ledger: initial.ledger.clone(),
                halted: false,
            }),
        }
    }

    /// Run `calls` in order and return the final ledger
    ///
    /// An empty batch returns the initial ledger.
    pub fn run(initial: &CallContext, calls: impl IntoIterator<Item = FunctionCall>) -> Ledger {
        Self::new(initial, ScriptConfig::default())
            .execute(calls)
            .ledger
    }

    /// Run `calls` in order and report on each
    pub fn execute(&self, calls: impl IntoIterator<Item = FunctionCall>) -> ScriptReport {
        let outcomes: Vec<CallOutcome> = calls.into_iter().map(|call| self.submit(call)).collect();

        let state = self.state.lock();
        let report = ScriptReport {
            ledger: state.ledger.clone(),
            outcomes,
            aborted: state.halted,
        };
        info!(
            "Script finished: {} completed, {} reverted, aborted: {}, state root {}",
            report.completed(),
            report.reverted(),
            report.aborted,
            report.ledger.state_root()
        );
        report
    }

    /// Execute a single call against the current ledger
    pub fn submit(&self, call: FunctionCall) -> CallOutcome {
        let label = call.label.clone();
        let sender = call.sender;
        let recipient = call.recipient;

        let mut state = self.state.lock();
        if state.halted {
            debug!("Skipping {}: script aborted", label);
            return CallOutcome {
                label,
                sender,
                recipient,
                status: CallStatus::Skipped,
            };
        }

        // a failed call hands back the pre-call ledger
        let transacted = call.invoke(&state.ledger, self.default_timestamp);
        state.ledger = transacted.ledger;

        let status = match transacted.result {
            Ok(data) => {
                debug!("{} completed: {}", label, data);
                CallStatus::Completed(data)
            }
            Err(err) if err.is_fatal() => {
                error!("{} broke a contract invariant: {}", label, err);
                if self.config.invariant_policy == InvariantPolicy::Abort {
                    state.halted = true;
                }
                CallStatus::Reverted(err)
            }
            Err(err) => {
                warn!("{} reverted: {}", label, err);
                CallStatus::Reverted(err)
            }
        };

        CallOutcome {
            label,
            sender,
            recipient,
            status,
        }
    }

    /// Snapshot of the current ledger
    pub fn ledger(&self) -> Ledger {
        self.state.lock().ledger.clone()
    }

    /// Whether an invariant violation has stopped the script
    pub fn is_halted(&self) -> bool {
        self.state.lock().halted
    }

    /// The script's configuration
    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }
}
