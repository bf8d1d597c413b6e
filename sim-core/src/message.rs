//! Messages and call contexts

use crate::{Address, Balance, Ledger, Timestamp};
use num::Zero;
use serde::{Deserialize, Serialize};

/// Envelope describing who triggered a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Caller address
    pub sender: Address,
    /// Value sent along with the call
    pub value: Balance,
    /// Logical time of the call
    pub timestamp: Timestamp,
}

impl Message {
    /// Create a message carrying value
    pub fn new(sender: Address, value: impl Into<Balance>, timestamp: Timestamp) -> Self {
        Self {
            sender,
            value: value.into(),
            timestamp,
        }
    }

    /// Create a message without value
    pub fn from_sender(sender: Address, timestamp: Timestamp) -> Self {
        Self {
            sender,
            value: Balance::zero(),
            timestamp,
        }
    }

    /// Whether the message moves value
    pub fn carries_value(&self) -> bool {
        !self.value.is_zero()
    }
}

/// What every contract operation receives and returns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// The triggering message
    pub message: Message,
    /// The ledger the call observes
    pub ledger: Ledger,
}

impl CallContext {
    /// Bundle a message with a ledger snapshot
    pub fn new(message: Message, ledger: Ledger) -> Self {
        Self { message, ledger }
    }

    /// Same ledger, different message
    pub fn with_message(&self, message: Message) -> Self {
        Self {
            message,
            ledger: self.ledger.clone(),
        }
    }

    /// Same message, different ledger
    pub fn with_ledger(&self, ledger: Ledger) -> Self {
        Self {
            message: self.message.clone(),
            ledger,
        }
    }

    /// Caller of the current message
    pub fn sender(&self) -> Address {
        self.message.sender
    }

    /// Logical time of the current message
    pub fn timestamp(&self) -> Timestamp {
        self.message.timestamp
    }
}

/// A call context paired with an operation's result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Returned<T> {
    /// Context after the operation, carrying the resulting ledger
    pub context: CallContext,
    /// Operation-specific result
    pub value: T,
}

impl<T> Returned<T> {
    /// Pair a context with a result
    pub fn new(context: CallContext, value: T) -> Self {
        Self { context, value }
    }

    /// Ledger produced by the operation
    pub fn ledger(&self) -> &Ledger {
        &self.context.ledger
    }

    /// Transform the result, keeping the context
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Returned<U> {
        Returned {
            context: self.context,
            value: f(self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Account;

    #[test]
    fn test_with_message_shares_ledger() {
        let ledger = Ledger::genesis(vec![Account::external(Address::new(1))]).unwrap();
        let ctx = CallContext::new(Message::from_sender(Address::new(1), 0), ledger);

        let next = ctx.with_message(Message::new(Address::new(2), 5u32, 3));
        assert_eq!(next.sender(), Address::new(2));
        assert_eq!(next.timestamp(), 3);
        assert!(next.message.carries_value());
        assert_eq!(next.ledger, ctx.ledger);
        assert!(!ctx.message.carries_value());
    }

    #[test]
    fn test_returned_map_keeps_context() {
        let ctx = CallContext::new(
            Message::from_sender(Address::new(1), 0),
            Ledger::default(),
        );
        let returned = Returned::new(ctx.clone(), 2usize).map(|n| n * 2);
        assert_eq!(returned.value, 4);
        assert_eq!(returned.context, ctx);
    }
}
