//! Minimal sub-currency
//!
//! Balances live only in the contract's storage; ledger value is never
//! moved by `mint` or `send`.

use crate::contract::{ensure, Contract};
use num::Zero;
use parking_lot::Mutex;
use sim_core::{Address, Balance, CallContext, Ledger, Returned};
use sim_vm::{only_sender, FunctionCall, Guard, VmError, VmResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct CoinStorage {
    balances: BTreeMap<Address, Balance>,
    total_minted: Balance,
}

impl CoinStorage {
    fn balance(&self, address: &Address) -> Balance {
        self.balances.get(address).cloned().unwrap_or_default()
    }

    fn check_invariants(&self) -> VmResult<()> {
        let sum = self
            .balances
            .values()
            .fold(Balance::zero(), |acc, amount| acc + amount);
        ensure(sum == self.total_minted, || {
            format!("balances sum to {} but {} were minted", sum, self.total_minted)
        })
    }
}

/// Coin contract instance
#[derive(Debug)]
pub struct Coin {
    address: Address,
    minter: Address,
    storage: Mutex<CoinStorage>,
}

impl Coin {
    /// The context's sender becomes the minter
    pub fn new(ctx: &CallContext, address: Address) -> Self {
        info!("Coin {} created, minter {}", address, ctx.sender());
        Self {
            address,
            minter: ctx.sender(),
            storage: Mutex::new(CoinStorage::default()),
        }
    }

    pub fn minter(&self) -> Address {
        self.minter
    }

    /// Create `amount` new coins for `receiver`. Minter only.
    pub fn mint(&self, ctx: CallContext, receiver: Address, amount: Balance) -> VmResult<Returned<()>> {
        only_sender(self.minter).guard(ctx, |ctx| {
            let mut storage = self.storage.lock();
            *storage.balances.entry(receiver).or_default() += &amount;
            storage.total_minted += &amount;
            storage.check_invariants()?;
            debug!("Minted {} for {}", amount, receiver);
            Ok(Returned::new(ctx, ()))
        })
    }

    /// Move `amount` of the sender's coins to `receiver`
    pub fn send(&self, ctx: CallContext, receiver: Address, amount: Balance) -> VmResult<Returned<()>> {
        let sender = ctx.sender();
        let mut storage = self.storage.lock();

        let available = storage.balance(&sender);
        if available < amount {
            return Err(VmError::InsufficientFunds {
                address: sender,
                required: amount,
                available,
            });
        }

        storage.balances.insert(sender, available - &amount);
        *storage.balances.entry(receiver).or_default() += &amount;
        storage.check_invariants()?;
        debug!("{} sent {} coins to {}", sender, amount, receiver);
        Ok(Returned::new(ctx, ()))
    }

    pub fn balance_of(&self, address: &Address) -> Balance {
        self.storage.lock().balance(address)
    }

    pub fn total_minted(&self) -> Balance {
        self.storage.lock().total_minted.clone()
    }

    /// Bound `mint` call
    pub fn mint_call(
        self: &Arc<Self>,
        sender: Address,
        receiver: Address,
        amount: impl Into<Balance>,
    ) -> FunctionCall {
        let coin = Arc::clone(self);
        let amount = amount.into();
        FunctionCall::new(
            format!("mint({}, {})", receiver, amount),
            sender,
            self.address,
            move |ctx| coin.mint(ctx, receiver, amount),
        )
    }

    /// Bound `send` call
    pub fn send_call(
        self: &Arc<Self>,
        sender: Address,
        receiver: Address,
        amount: impl Into<Balance>,
    ) -> FunctionCall {
        let coin = Arc::clone(self);
        let amount = amount.into();
        FunctionCall::new(
            format!("send({}, {})", receiver, amount),
            sender,
            self.address,
            move |ctx| coin.send(ctx, receiver, amount),
        )
    }
}

impl Contract for Coin {
    fn name(&self) -> &'static str {
        "coin"
    }

    fn address(&self) -> Address {
        self.address
    }

    fn check_invariants(&self, _ledger: &Ledger) -> VmResult<()> {
        self.storage.lock().check_invariants()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{Account, Message};
    use sim_vm::{CallStatus, Script, ScriptConfig};

    fn addr(id: u64) -> Address {
        Address::new(id)
    }

    fn setup() -> (CallContext, Arc<Coin>) {
        let ledger = Ledger::genesis(vec![
            Account::external(addr(1)),
            Account::external(addr(2)),
            Account::contract(addr(50)),
        ])
        .unwrap();
        let ctx = CallContext::new(Message::from_sender(addr(1), 0), ledger);
        let coin = Arc::new(Coin::new(&ctx, addr(50)));
        (ctx, coin)
    }

    #[test]
    fn test_mint_and_send() {
        let (ctx, coin) = setup();
        let report = Script::new(&ctx, ScriptConfig::default()).execute(vec![
            coin.mint_call(addr(1), addr(2), 10u32),
            coin.send_call(addr(2), addr(1), 4u32),
        ]);

        assert_eq!(report.completed(), 2);
        assert_eq!(coin.balance_of(&addr(1)), Balance::from(4u32));
        assert_eq!(coin.balance_of(&addr(2)), Balance::from(6u32));
        assert_eq!(coin.total_minted(), Balance::from(10u32));
        assert_eq!(report.ledger, ctx.ledger);
    }

    #[test]
    fn test_only_minter_mints() {
        let (ctx, coin) = setup();
        let result = coin.mint(
            ctx.with_message(Message::from_sender(addr(2), 0)),
            addr(2),
            Balance::from(5u32),
        );
        assert!(matches!(result, Err(VmError::AccessDenied(_))));
        assert!(coin.total_minted().is_zero());
    }

    #[test]
    fn test_send_more_than_held() {
        let (ctx, coin) = setup();
        let report = Script::new(&ctx, ScriptConfig::default()).execute(vec![
            coin.mint_call(addr(1), addr(2), 3u32),
            coin.send_call(addr(2), addr(1), 4u32),
        ]);

        assert!(matches!(
            report.outcomes[1].status,
            CallStatus::Reverted(VmError::InsufficientFunds { .. })
        ));
        assert_eq!(coin.balance_of(&addr(2)), Balance::from(3u32));
        assert!(coin.check_invariants(&report.ledger).is_ok());
    }
}
