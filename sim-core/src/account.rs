//! Account model

use crate::{Address, Balance, CoreError, CoreResult};
use num::Zero;
use serde::{Deserialize, Serialize};

/// Which side of the system owns the account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountKind {
    /// Externally owned account, driven by callers
    External,
    /// Account holding a contract's escrowed value
    Contract,
}

/// Account information
///
/// Accounts are values: every balance change produces a new `Account`
/// instead of mutating the old one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account address
    pub address: Address,
    /// Account balance
    pub balance: Balance,
    /// Account kind
    pub kind: AccountKind,
}

impl Account {
    /// Create an external account with a zero balance
    pub fn external(address: Address) -> Self {
        Self {
            address,
            balance: Balance::zero(),
            kind: AccountKind::External,
        }
    }

    /// Create a contract account with a zero balance
    pub fn contract(address: Address) -> Self {
        Self {
            address,
            balance: Balance::zero(),
            kind: AccountKind::Contract,
        }
    }

    /// Same account, different starting balance
    pub fn with_balance(mut self, balance: impl Into<Balance>) -> Self {
        self.balance = balance.into();
        self
    }

    /// Check if account is a contract
    pub fn is_contract(&self) -> bool {
        self.kind == AccountKind::Contract
    }

    /// New account with `amount` added
    pub fn credit(&self, amount: &Balance) -> Self {
        Self {
            address: self.address,
            balance: &self.balance + amount,
            kind: self.kind,
        }
    }

    /// New account with `amount` removed
    pub fn debit(&self, amount: &Balance) -> CoreResult<Self> {
        if &self.balance < amount {
            return Err(CoreError::InsufficientBalance {
                address: self.address,
                required: amount.clone(),
                available: self.balance.clone(),
            });
        }
        Ok(Self {
            address: self.address,
            balance: &self.balance - amount,
            kind: self.kind,
        })
    }
}
