//! Immutable ledger snapshots
//!
//! A [`Ledger`] maps addresses to accounts. It is a value: cloning is
//! cheap (the map sits behind an `Arc`) and every mutation returns a new
//! ledger, leaving the original untouched. Transfers are all-or-nothing.

use crate::account::Account;
use crate::{Address, Balance, CoreError, CoreResult, StateRoot};
use num::Zero;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Snapshot of every account balance
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ledger {
    accounts: Arc<BTreeMap<Address, Account>>,
}

impl Ledger {
    /// Build the genesis ledger. Each address may appear once.
    pub fn genesis(accounts: impl IntoIterator<Item = Account>) -> CoreResult<Self> {
        let mut map = BTreeMap::new();
        for account in accounts {
            let address = account.address;
            if map.insert(address, account).is_some() {
                return Err(CoreError::DuplicateAccount(address));
            }
        }
        Ok(Self {
            accounts: Arc::new(map),
        })
    }

    /// Genesis ledger of external accounts sharing one starting balance
    pub fn with_external_accounts(
        addresses: impl IntoIterator<Item = Address>,
        balance: &Balance,
    ) -> CoreResult<Self> {
        Self::genesis(
            addresses
                .into_iter()
                .map(|address| Account::external(address).with_balance(balance.clone())),
        )
    }

    /// Get account by address
    pub fn get(&self, address: &Address) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Check whether an address is known
    pub fn contains(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    /// Balance of an account, if it exists
    pub fn balance_of(&self, address: &Address) -> Option<&Balance> {
        self.accounts.get(address).map(|account| &account.balance)
    }

    /// Number of accounts
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Check if the ledger holds no accounts
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Accounts in address order
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Sum of all balances
    pub fn total_supply(&self) -> Balance {
        self.accounts
            .values()
            .fold(Balance::zero(), |acc, account| acc + &account.balance)
    }

    /// Check that every entry is stored under its own address
    pub fn verify(&self) -> CoreResult<()> {
        for (key, account) in self.accounts.iter() {
            if *key != account.address {
                return Err(CoreError::InconsistentEntry {
                    key: *key,
                    stored: account.address,
                });
            }
        }
        Ok(())
    }

    /// Digest of the ledger contents
    pub fn state_root(&self) -> StateRoot {
        let mut hasher = blake3::Hasher::new();

        // BTreeMap iteration is already sorted, so the digest is deterministic
        for (address, account) in self.accounts.iter() {
            let balance = account.balance.to_bytes_be();
            hasher.update(&address.to_be_bytes());
            hasher.update(&[account.is_contract() as u8]);
            hasher.update(&(balance.len() as u64).to_be_bytes());
            hasher.update(&balance);
        }

        StateRoot::from(*hasher.finalize().as_bytes())
    }

    /// Apply a pure transform to one account
    ///
    /// Unknown addresses leave the ledger unchanged; this never creates
    /// accounts. The transform may not move the account to another address.
    pub fn update_account<F>(&self, address: &Address, transform: F) -> Self
    where
        F: FnOnce(&Account) -> Account,
    {
        let Some(current) = self.accounts.get(address) else {
            return self.clone();
        };
        let mut updated = transform(current);
        updated.address = *address;

        let mut next = self.clone();
        Arc::make_mut(&mut next.accounts).insert(*address, updated);
        next
    }

    /// Move `amount` from one account to another
    ///
    /// Fails without producing a ledger if either address is unknown or
    /// `from` cannot cover the amount. A transfer to self is a no-op once
    /// the balance check passes.
    pub fn transfer(&self, from: &Address, to: &Address, amount: &Balance) -> CoreResult<Self> {
        let sender = self
            .accounts
            .get(from)
            .ok_or(CoreError::UnknownAccount(*from))?;
        let recipient = self
            .accounts
            .get(to)
            .ok_or(CoreError::UnknownAccount(*to))?;

        let debited = sender.debit(amount)?;
        if from == to {
            return Ok(self.clone());
        }
        let credited = recipient.credit(amount);

        let mut next = self.clone();
        let accounts = Arc::make_mut(&mut next.accounts);
        accounts.insert(*from, debited);
        accounts.insert(*to, credited);
        Ok(next)
    }
}
