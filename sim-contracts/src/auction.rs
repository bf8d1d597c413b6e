//! Open auction with pull-payment refunds
//!
//! Bids arrive as call value: the call protocol moves the bid into the
//! auction's account before [`SimpleAuction::bid`] runs, so a rejected bid
//! is undone by the transactional invocation. Outbid bidders are not paid
//! back synchronously. Their amount is credited to a pending-returns map
//! and they withdraw it themselves.

use crate::contract::{ensure, Contract};
use num::Zero;
use parking_lot::Mutex;
use sim_core::{Address, Balance, CallContext, Ledger, Returned, Timestamp};
use sim_vm::{before, not_before, FunctionCall, Guard, VmError, VmResult};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct AuctionStorage {
    highest_bidder: Option<Address>,
    highest_bid: Balance,
    pending_returns: BTreeMap<Address, Balance>,
    ended: bool,
}

impl AuctionStorage {
    fn pending(&self, address: &Address) -> Balance {
        self.pending_returns.get(address).cloned().unwrap_or_default()
    }

    /// Value the auction account must still hold
    fn owed(&self) -> Balance {
        let refunds = self
            .pending_returns
            .values()
            .fold(Balance::zero(), |acc, amount| acc + amount);
        if self.ended {
            refunds
        } else {
            refunds + &self.highest_bid
        }
    }
}

/// Auction contract instance
#[derive(Debug)]
pub struct SimpleAuction {
    address: Address,
    beneficiary: Address,
    bidding_end: Timestamp,
    storage: Mutex<AuctionStorage>,
}

impl SimpleAuction {
    /// Open an auction that accepts bids for `bidding_time` after the
    /// context's timestamp
    pub fn new(
        ctx: &CallContext,
        address: Address,
        beneficiary: Address,
        bidding_time: Timestamp,
    ) -> Self {
        let bidding_end = ctx.timestamp().saturating_add(bidding_time);
        info!(
            "Auction {} opened by {} for {}, bidding ends at {}",
            address,
            ctx.sender(),
            beneficiary,
            bidding_end
        );
        Self {
            address,
            beneficiary,
            bidding_end,
            storage: Mutex::new(AuctionStorage::default()),
        }
    }

    /// Account receiving the winning bid
    pub fn beneficiary(&self) -> Address {
        self.beneficiary
    }

    /// First timestamp at which bids are refused
    pub fn bidding_end(&self) -> Timestamp {
        self.bidding_end
    }

    /// Current highest bidder
    pub fn highest_bidder(&self) -> Option<Address> {
        self.storage.lock().highest_bidder
    }

    /// Current highest bid
    pub fn highest_bid(&self) -> Balance {
        self.storage.lock().highest_bid.clone()
    }

    /// Amount `address` can withdraw
    pub fn pending_return(&self, address: &Address) -> Balance {
        self.storage.lock().pending(address)
    }

    /// Whether the auction has been closed
    pub fn has_ended(&self) -> bool {
        self.storage.lock().ended
    }

    /// Bid the call value. Only before the bidding end.
    ///
    /// The bid must beat the current highest bid. The current highest
    /// bidder cannot bid again, and neither can anyone with an unclaimed
    /// refund.
    pub fn bid(&self, ctx: CallContext) -> VmResult<Returned<()>> {
        before(self.bidding_end).guard(ctx, |ctx| {
            let bidder = ctx.sender();
            let amount = ctx.message.value.clone();
            let mut storage = self.storage.lock();

            if amount <= storage.highest_bid {
                return Err(VmError::Precondition(format!(
                    "bid {} does not beat highest bid {}",
                    amount, storage.highest_bid
                )));
            }
            if storage.highest_bidder == Some(bidder) {
                return Err(VmError::Precondition(format!(
                    "{} is already the highest bidder",
                    bidder
                )));
            }
            if !storage.pending(&bidder).is_zero() {
                return Err(VmError::Precondition(format!(
                    "{} must withdraw its pending return first",
                    bidder
                )));
            }

            let outbid = std::mem::replace(&mut storage.highest_bid, amount);
            if let Some(previous) = storage.highest_bidder.replace(bidder) {
                let entry = storage.pending_returns.entry(previous).or_default();
                *entry += outbid;
            }

            self.check_storage(&storage, &ctx.ledger)?;
            debug!("{} leads auction {} with {}", bidder, self.address, storage.highest_bid);
            Ok(Returned::new(ctx, ()))
        })
    }

    /// Withdraw the sender's pending return
    ///
    /// The entry is cleared before the transfer and restored only if the
    /// transfer fails, so repeated calls can never pay out twice. Returns
    /// `false` when the transfer failed.
    pub fn withdraw(&self, ctx: CallContext) -> VmResult<Returned<bool>> {
        let sender = ctx.sender();
        let mut storage = self.storage.lock();

        let Some(amount) = storage.pending_returns.remove(&sender) else {
            return Ok(Returned::new(ctx, true));
        };
        if amount.is_zero() {
            return Ok(Returned::new(ctx, true));
        }

        match ctx.ledger.transfer(&self.address, &sender, &amount) {
            Ok(ledger) => {
                let ctx = ctx.with_ledger(ledger);
                self.check_storage(&storage, &ctx.ledger)?;
                debug!("{} withdrew {} from auction {}", sender, amount, self.address);
                Ok(Returned::new(ctx, true))
            }
            Err(err) => {
                warn!("Refund of {} to {} failed: {}", amount, sender, err);
                storage.pending_returns.insert(sender, amount);
                Ok(Returned::new(ctx, false))
            }
        }
    }

    /// Close the auction and pay the beneficiary. Only once, and not
    /// before the bidding end.
    pub fn auction_end(&self, ctx: CallContext) -> VmResult<Returned<()>> {
        not_before(self.bidding_end).guard(ctx, |ctx| {
            let mut storage = self.storage.lock();
            if storage.ended {
                return Err(VmError::Precondition(format!(
                    "auction {} has already ended",
                    self.address
                )));
            }

            let ledger = if storage.highest_bid.is_zero() {
                ctx.ledger.clone()
            } else {
                ctx.ledger
                    .transfer(&self.address, &self.beneficiary, &storage.highest_bid)?
            };
            storage.ended = true;

            let ctx = ctx.with_ledger(ledger);
            self.check_storage(&storage, &ctx.ledger)?;
            info!(
                "Auction {} ended: {:?} wins with {}",
                self.address, storage.highest_bidder, storage.highest_bid
            );
            Ok(Returned::new(ctx, ()))
        })
    }

    fn check_storage(&self, storage: &AuctionStorage, ledger: &Ledger) -> VmResult<()> {
        if let Some(leader) = storage.highest_bidder {
            ensure(storage.pending(&leader).is_zero(), || {
                format!("highest bidder {} also has a pending return", leader)
            })?;
        }
        ensure(
            storage.highest_bidder.is_some() || storage.highest_bid.is_zero(),
            || format!("highest bid {} without a bidder", storage.highest_bid),
        )?;

        let owed = storage.owed();
        let held = ledger
            .balance_of(&self.address)
            .cloned()
            .unwrap_or_default();
        ensure(held >= owed, || {
            format!(
                "auction {} holds {} but owes {}",
                self.address, held, owed
            )
        })
    }

    /// Bound `bid` call carrying `value`
    pub fn bid_call(self: &Arc<Self>, sender: Address, value: impl Into<Balance>) -> FunctionCall {
        let auction = Arc::clone(self);
        let value = value.into();
        FunctionCall::new(
            format!("bid({})", value),
            sender,
            self.address,
            move |ctx| auction.bid(ctx),
        )
        .with_value(value)
    }

    /// Bound `withdraw` call
    pub fn withdraw_call(self: &Arc<Self>, sender: Address) -> FunctionCall {
        let auction = Arc::clone(self);
        FunctionCall::new("withdraw", sender, self.address, move |ctx| {
            auction.withdraw(ctx)
        })
    }

    /// Bound `auction_end` call
    pub fn auction_end_call(self: &Arc<Self>, sender: Address) -> FunctionCall {
        let auction = Arc::clone(self);
        FunctionCall::new("auctionEnd", sender, self.address, move |ctx| {
            auction.auction_end(ctx)
        })
    }
}

impl Contract for SimpleAuction {
    fn name(&self) -> &'static str {
        "auction"
    }

    fn address(&self) -> Address {
        self.address
    }

    fn check_invariants(&self, ledger: &Ledger) -> VmResult<()> {
        let storage = self.storage.lock();
        self.check_storage(&storage, ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_core::{Account, Message};
    use sim_vm::{Script, ScriptConfig};

    const AUCTION: Address = Address::new(100);
    const BENEFICIARY: Address = Address::new(9);

    fn addr(id: u64) -> Address {
        Address::new(id)
    }

    fn ledger() -> Ledger {
        Ledger::genesis(vec![
            Account::external(addr(1)).with_balance(100u32),
            Account::external(addr(2)).with_balance(100u32),
            Account::external(addr(3)).with_balance(100u32),
            Account::external(BENEFICIARY),
            Account::contract(AUCTION),
        ])
        .unwrap()
    }

    fn setup() -> (CallContext, Arc<SimpleAuction>) {
        let initial = CallContext::new(Message::from_sender(BENEFICIARY, 0), ledger());
        let auction = Arc::new(SimpleAuction::new(&initial, AUCTION, BENEFICIARY, 10));
        (initial, auction)
    }

    fn balance(ledger: &Ledger, id: u64) -> Balance {
        ledger.balance_of(&addr(id)).cloned().unwrap()
    }

    #[test]
    fn test_three_increasing_bids() {
        let (initial, auction) = setup();
        let script = Script::new(&initial, ScriptConfig::default());

        let report = script.execute(vec![
            auction.bid_call(addr(1), 10u32).at(1),
            auction.bid_call(addr(2), 20u32).at(2),
            auction.bid_call(addr(3), 30u32).at(3),
        ]);
        assert_eq!(report.completed(), 3);
        assert_eq!(auction.highest_bidder(), Some(addr(3)));
        assert_eq!(auction.pending_return(&addr(1)), Balance::from(10u32));
        assert_eq!(auction.pending_return(&addr(2)), Balance::from(20u32));
        assert!(auction.pending_return(&addr(3)).is_zero());

        let report = script.execute(vec![
            auction.withdraw_call(addr(1)).at(4),
            auction.withdraw_call(addr(1)).at(5),
            auction.withdraw_call(addr(2)).at(6),
            auction.auction_end_call(addr(1)).at(10),
        ]);
        assert_eq!(report.completed(), 4);

        let ledger = script.ledger();
        assert_eq!(balance(&ledger, 1), Balance::from(100u32));
        assert_eq!(balance(&ledger, 2), Balance::from(100u32));
        assert_eq!(balance(&ledger, 3), Balance::from(70u32));
        assert_eq!(balance(&ledger, 9), Balance::from(30u32));
        assert!(balance(&ledger, 100).is_zero());
        assert_eq!(ledger.total_supply(), initial.ledger.total_supply());
        assert!(auction.check_invariants(&ledger).is_ok());
    }

    #[test]
    fn test_low_bid_is_rolled_back() {
        let (initial, auction) = setup();
        let script = Script::new(&initial, ScriptConfig::default());
        script.execute(vec![auction.bid_call(addr(1), 50u32).at(1)]);

        let report = script.execute(vec![auction.bid_call(addr(2), 50u32).at(2)]);
        assert!(matches!(
            report.outcomes[0].status,
            sim_vm::CallStatus::Reverted(VmError::Precondition(_))
        ));
        assert_eq!(balance(&report.ledger, 2), Balance::from(100u32));
        assert_eq!(balance(&report.ledger, 100), Balance::from(50u32));
    }

    #[test]
    fn test_bidding_closes_at_end() {
        let (initial, auction) = setup();
        let report = Script::new(&initial, ScriptConfig::default())
            .execute(vec![auction.bid_call(addr(1), 10u32).at(10)]);
        assert!(matches!(
            report.outcomes[0].status,
            sim_vm::CallStatus::Reverted(VmError::AccessDenied(_))
        ));
        assert_eq!(report.ledger, initial.ledger);
    }

    #[test]
    fn test_outbid_bidder_must_withdraw_before_rebidding() {
        let (initial, auction) = setup();
        let script = Script::new(&initial, ScriptConfig::default());
        let report = script.execute(vec![
            auction.bid_call(addr(1), 10u32).at(1),
            auction.bid_call(addr(2), 20u32).at(2),
            auction.bid_call(addr(1), 30u32).at(3),
            auction.bid_call(addr(2), 40u32).at(4),
            auction.withdraw_call(addr(1)).at(5),
            auction.bid_call(addr(1), 30u32).at(6),
        ]);

        let completed: Vec<bool> = report.outcomes.iter().map(|o| o.is_completed()).collect();
        assert_eq!(completed, vec![true, true, false, false, true, true]);
        assert_eq!(auction.highest_bidder(), Some(addr(1)));
        assert!(auction.check_invariants(&script.ledger()).is_ok());
    }

    #[test]
    fn test_end_only_once_and_not_early() {
        let (initial, auction) = setup();
        assert!(matches!(
            auction.auction_end(initial.with_message(Message::from_sender(addr(1), 9))),
            Err(VmError::AccessDenied(_))
        ));
        assert!(auction
            .auction_end(initial.with_message(Message::from_sender(addr(1), 10)))
            .is_ok());
        assert!(matches!(
            auction.auction_end(initial.with_message(Message::from_sender(addr(1), 11))),
            Err(VmError::Precondition(_))
        ));
    }

    #[test]
    fn test_failed_refund_is_restored() {
        let (initial, auction) = setup();
        let script = Script::new(&initial, ScriptConfig::default());
        script.execute(vec![
            auction.bid_call(addr(1), 10u32).at(1),
            auction.bid_call(addr(2), 20u32).at(2),
        ]);

        // a ledger where the auction account cannot cover the refund
        let drained = CallContext::new(Message::from_sender(addr(1), 3), ledger());
        let returned = auction.withdraw(drained).unwrap();
        assert!(!returned.value);
        assert_eq!(auction.pending_return(&addr(1)), Balance::from(10u32));
    }
}
