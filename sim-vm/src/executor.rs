//! Call execution protocol
//!
//! A call moves the message value from sender to recipient first, then
//! hands the operation a fresh context built on the updated ledger. The
//! transactional form guarantees that a failing call leaves the ledger
//! exactly as it was before the call.

use crate::{VmError, VmResult};
use serde::Serialize;
use sim_core::{Address, Balance, CallContext, Ledger, Message, Returned, Timestamp};
use tracing::debug;

/// Ledger outcome of a transactional invocation
#[derive(Debug, Clone)]
pub struct Transacted<T> {
    /// Ledger after the call; the pre-call ledger when the call failed
    pub ledger: Ledger,
    /// Operation result or the failure that reverted the call
    pub result: VmResult<T>,
}

impl<T> Transacted<T> {
    /// Whether the call went through
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Invoke `operation` on behalf of the context's message
///
/// 1. value may only be sent to another address
/// 2. the value is moved from sender to recipient before the operation runs
/// 3. the operation receives the original message on the updated ledger
pub fn invoke<T, F>(ctx: &CallContext, recipient: Address, operation: F) -> VmResult<Returned<T>>
where
    F: FnOnce(CallContext) -> VmResult<Returned<T>>,
{
    let message = &ctx.message;
    let ledger = if message.carries_value() {
        if message.sender == recipient {
            return Err(VmError::Precondition(format!(
                "{} cannot send value to itself",
                message.sender
            )));
        }

        let available = ctx
            .ledger
            .balance_of(&message.sender)
            .ok_or(VmError::Transfer(sim_core::CoreError::UnknownAccount(
                message.sender,
            )))?;
        if available < &message.value {
            return Err(VmError::InsufficientFunds {
                address: message.sender,
                required: message.value.clone(),
                available: available.clone(),
            });
        }

        ctx.ledger
            .transfer(&message.sender, &recipient, &message.value)?
    } else {
        ctx.ledger.clone()
    };

    operation(ctx.with_ledger(ledger))
}

/// Invoke `operation`, reverting the ledger if anything fails
pub fn invoke_transactional<T, F>(
    ctx: &CallContext,
    recipient: Address,
    operation: F,
) -> Transacted<T>
where
    F: FnOnce(CallContext) -> VmResult<Returned<T>>,
{
    match invoke(ctx, recipient, operation) {
        Ok(returned) => Transacted {
            ledger: returned.context.ledger,
            result: Ok(returned.value),
        },
        Err(err) => {
            debug!(
                "Call from {} to {} reverted: {}",
                ctx.sender(),
                recipient,
                err
            );
            Transacted {
                ledger: ctx.ledger.clone(),
                result: Err(err),
            }
        }
    }
}

/// Type-erased operation stored in a [`FunctionCall`]
pub type Operation =
    Box<dyn FnOnce(CallContext) -> VmResult<Returned<serde_json::Value>> + Send + 'static>;

/// A bound invocation: who calls what, with how much value
pub struct FunctionCall {
    /// Human-readable name for reports and logs
    pub label: String,
    /// Caller
    pub sender: Address,
    /// Value moved to the recipient before the operation runs
    pub value: Balance,
    /// Contract (or account) being called
    pub recipient: Address,
    /// Explicit logical time; the script's default when absent
    pub timestamp: Option<Timestamp>,
    operation: Operation,
}

impl FunctionCall {
    /// Bind an operation. Its result is kept as JSON return data.
    pub fn new<T, F>(
        label: impl Into<String>,
        sender: Address,
        recipient: Address,
        operation: F,
    ) -> Self
    where
        T: Serialize,
        F: FnOnce(CallContext) -> VmResult<Returned<T>> + Send + 'static,
    {
        Self {
            label: label.into(),
            sender,
            value: Balance::default(),
            recipient,
            timestamp: None,
            operation: Box::new(move |ctx| {
                let returned = operation(ctx)?;
                let data = serde_json::to_value(&returned.value)?;
                Ok(Returned::new(returned.context, data))
            }),
        }
    }

    /// Plain value transfer with no contract logic
    pub fn transfer(sender: Address, recipient: Address, value: impl Into<Balance>) -> Self {
        Self::new(
            format!("transfer {} -> {}", sender, recipient),
            sender,
            recipient,
            |ctx| Ok(Returned::new(ctx, ())),
        )
        .with_value(value)
    }

    /// Attach value to the call
    pub fn with_value(mut self, value: impl Into<Balance>) -> Self {
        self.value = value.into();
        self
    }

    /// Pin the call to a logical time
    pub fn at(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Message the call will carry
    pub fn message(&self, default_timestamp: Timestamp) -> Message {
        Message::new(
            self.sender,
            self.value.clone(),
            self.timestamp.unwrap_or(default_timestamp),
        )
    }

    /// Execute against a ledger, reverting on failure
    pub fn invoke(self, ledger: &Ledger, default_timestamp: Timestamp) -> Transacted<serde_json::Value> {
        let ctx = CallContext::new(self.message(default_timestamp), ledger.clone());
        debug!("Invoking {} from {} on {}", self.label, self.sender, self.recipient);
        invoke_transactional(&ctx, self.recipient, self.operation)
    }
}

impl std::fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCall")
            .field("label", &self.label)
            .field("sender", &self.sender)
            .field("value", &self.value)
            .field("recipient", &self.recipient)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}
