//! Access-control guards
//!
//! Guards are pure preconditions checked against the call context before
//! an operation body runs. They never mutate state and compose by
//! nesting: `a.guard(ctx, |ctx| b.guard(ctx, body))`, or as a pair `(a, b)`.

use crate::{VmError, VmResult};
use sim_core::{Address, CallContext, Timestamp};

/// Precondition on a call context
pub trait Guard {
    /// Pass or fail immediately
    fn check(&self, ctx: &CallContext) -> VmResult<()>;

    /// Run `body` only if the guard passes
    fn guard<T, F>(&self, ctx: CallContext, body: F) -> VmResult<T>
    where
        Self: Sized,
        F: FnOnce(CallContext) -> VmResult<T>,
    {
        self.check(&ctx)?;
        body(ctx)
    }
}

/// Only one sender may call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlySender(pub Address);

impl Guard for OnlySender {
    fn check(&self, ctx: &CallContext) -> VmResult<()> {
        if ctx.sender() != self.0 {
            return Err(VmError::AccessDenied(format!(
                "only {} may call, got {}",
                self.0,
                ctx.sender()
            )));
        }
        Ok(())
    }
}

/// Comparison of the call's logical time with a fixed threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeGuard {
    /// timestamp < threshold
    Before(Timestamp),
    /// timestamp >= threshold
    NotBefore(Timestamp),
    /// timestamp > threshold
    After(Timestamp),
    /// timestamp <= threshold
    NotAfter(Timestamp),
}

impl Guard for TimeGuard {
    fn check(&self, ctx: &CallContext) -> VmResult<()> {
        let now = ctx.timestamp();
        let (holds, relation, threshold) = match *self {
            TimeGuard::Before(t) => (now < t, "before", t),
            TimeGuard::NotBefore(t) => (now >= t, "not before", t),
            TimeGuard::After(t) => (now > t, "after", t),
            TimeGuard::NotAfter(t) => (now <= t, "not after", t),
        };
        if !holds {
            return Err(VmError::AccessDenied(format!(
                "call at time {} must be {} {}",
                now, relation, threshold
            )));
        }
        Ok(())
    }
}

impl<A: Guard, B: Guard> Guard for (A, B) {
    fn check(&self, ctx: &CallContext) -> VmResult<()> {
        self.0.check(ctx)?;
        self.1.check(ctx)
    }
}

/// Guard: sender must be `address`
pub fn only_sender(address: Address) -> OnlySender {
    OnlySender(address)
}

/// Guard: call strictly before `time`
pub fn before(time: Timestamp) -> TimeGuard {
    TimeGuard::Before(time)
}

/// Guard: call at or after `time`
pub fn not_before(time: Timestamp) -> TimeGuard {
    TimeGuard::NotBefore(time)
}

/// Guard: call strictly after `time`
pub fn after(time: Timestamp) -> TimeGuard {
    TimeGuard::After(time)
}

/// Guard: call at or before `time`
pub fn not_after(time: Timestamp) -> TimeGuard {
    TimeGuard::NotAfter(time)
}
