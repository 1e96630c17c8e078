// 7.3 engine/settlement.rs: swap settlement over the pool's lock/callback protocol.
//
// swap() records a pending settlement keyed by a fresh token and hands the pool an
// encoded envelope. the pool calls back into on_locked_callback, which consumes the
// pending record exactly once, swaps, then settles both legs against the ledger.
// a second or stray callback finds nothing to consume and fails.
//
// a guard attached to the pending record runs after the swap and before any leg
// moves tokens. a failing guard fails the callback, so the pool restores its
// reserves and nothing leaves custody.
//
// the engine trusts only what its own callback recorded. a pool that swallows a
// callback error, or hands back a receipt other than the one the callback wrote,
// fails the whole operation.

use serde::{Deserialize, Serialize};

use super::core::Engine;
use super::results::{EngineError, SwapOutcome};
use crate::events::{EventPayload, SwapSettledEvent};
use crate::ledger::LedgerError;
use crate::pool::{
    ExternalPool, InvocationId, LockCallback, LockedPool, PoolError, SwapDelta, SwapRequest,
};
use crate::position::Position;
use crate::token::TransferError;
use crate::types::{AccountId, Amount, AssetId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettlementError {
    #[error("No pending settlement matches this callback")]
    UnknownSettlement,

    #[error("Pool returned without invoking the settlement callback")]
    CallbackNotInvoked,

    #[error("Settlement payload codec error: {0}")]
    Codec(String),

    #[error("Swap returned {amount_out}, minimum was {min_amount_out}")]
    SlippageExceeded {
        amount_out: Amount,
        min_amount_out: Amount,
    },

    #[error("Pool returned an unexpected delta {delta:?}")]
    UnexpectedDelta { delta: SwapDelta },

    #[error("Pool completed the lock but the settlement callback failed")]
    CallbackFailed,

    #[error("Pool receipt {reported:?} does not match settled delta {settled:?}")]
    ReceiptMismatch {
        settled: SwapDelta,
        reported: SwapDelta,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Token transfer failed: {0}")]
    Transfer(#[from] TransferError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("{0}")]
    Rejected(Box<EngineError>),
}

impl From<serde_json::Error> for SettlementError {
    fn from(err: serde_json::Error) -> Self {
        SettlementError::Codec(err.to_string())
    }
}

/// Check run inside the locked window, once the swap output is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SettlementGuard {
    None,
    /// The position about to be opened, traded amount still unset.
    OpenHealth { position: Position },
    /// Balance plus proceeds must cover `debt`.
    Repay { asset: AssetId, debt: Amount },
}

/// Context of the one swap the engine is waiting on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct PendingSettlement {
    token: u64,
    request: SwapRequest,
    guard: SettlementGuard,
}

#[derive(Serialize, Deserialize)]
struct SettlementEnvelope {
    token: u64,
    request: SwapRequest,
}

#[derive(Serialize, Deserialize)]
struct SettlementReceipt {
    invocation: InvocationId,
    delta: SwapDelta,
}

/// Written by a callback only after both legs settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct SettledSwap {
    invocation: InvocationId,
    delta: SwapDelta,
}

impl Engine {
    /// Swap on behalf of `request.account`, settling both legs against its ledger
    /// balances.
    pub fn swap<P: ExternalPool>(
        &mut self,
        pool: &mut P,
        request: SwapRequest,
    ) -> Result<SwapOutcome, EngineError> {
        self.transact("swap", |engine| {
            let (asset_in, _) = request.params.assets(&request.key);
            engine.ensure_unlocked(request.account, asset_in, request.params.amount_in)?;
            engine.settle_swap(pool, request, SettlementGuard::None)
        })
    }

    pub(super) fn settle_swap<P: ExternalPool>(
        &mut self,
        pool: &mut P,
        request: SwapRequest,
        guard: SettlementGuard,
    ) -> Result<SwapOutcome, EngineError> {
        let token = self.next_settlement_token;
        self.next_settlement_token += 1;

        let payload = serde_json::to_vec(&SettlementEnvelope { token, request })
            .map_err(SettlementError::from)?;
        self.pending = Some(PendingSettlement {
            token,
            request,
            guard,
        });

        self.settled = None;

        let result = pool.begin_locked_operation(&payload, self);
        // the context never outlives the locked operation
        let unconsumed = self.pending.take();
        let settled = self.settled.take();
        let bytes = result?;
        if unconsumed.is_some() {
            return Err(SettlementError::CallbackNotInvoked.into());
        }
        let SettledSwap { invocation, delta } = settled.ok_or(SettlementError::CallbackFailed)?;

        let receipt: SettlementReceipt =
            serde_json::from_slice(&bytes).map_err(SettlementError::from)?;
        if receipt.invocation != invocation || receipt.delta != delta {
            return Err(SettlementError::ReceiptMismatch {
                settled: delta,
                reported: receipt.delta,
            }
            .into());
        }

        let (asset_in, asset_out) = request.params.assets(&request.key);
        let amount_in = delta
            .for_asset(&request.key, asset_in)
            .unwrap_or(0)
            .unsigned_abs();
        let amount_out = delta
            .for_asset(&request.key, asset_out)
            .unwrap_or(0)
            .unsigned_abs();

        tracing::info!(
            account = %request.account,
            %asset_in,
            %asset_out,
            amount_in,
            amount_out,
            invocation = invocation.0,
            "swap settled"
        );
        self.emit_event(EventPayload::SwapSettled(SwapSettledEvent {
            account: request.account,
            key: request.key,
            invocation,
            delta,
        }));

        Ok(SwapOutcome {
            invocation,
            delta,
            asset_in,
            asset_out,
            amount_in,
            amount_out,
        })
    }

    // one leg in, one leg out. the account pays at most amount_in
    fn settle_delta(
        &mut self,
        pool: &mut dyn LockedPool,
        request: &SwapRequest,
        guard: &SettlementGuard,
        delta: SwapDelta,
    ) -> Result<(), SettlementError> {
        let key = &request.key;
        let (asset_in, asset_out) = request.params.assets(key);
        let owed = delta.for_asset(key, asset_in).unwrap_or(0);
        let received = delta.for_asset(key, asset_out).unwrap_or(0);
        if owed <= 0 || received >= 0 || owed.unsigned_abs() > request.params.amount_in {
            return Err(SettlementError::UnexpectedDelta { delta });
        }

        let amount_out = received.unsigned_abs();
        if amount_out < request.min_amount_out {
            return Err(SettlementError::SlippageExceeded {
                amount_out,
                min_amount_out: request.min_amount_out,
            });
        }

        let account = request.account;
        let amount_in = owed.unsigned_abs();
        let available = self.ledger.balance_of(account, asset_in);
        if available < amount_in {
            return Err(LedgerError::InsufficientTreasury {
                account,
                asset: asset_in,
                available,
                requested: amount_in,
            }
            .into());
        }

        self.check_guard(guard, account, amount_out)?;

        // pool pays out before custody pays in
        let custody = self.config.engine.custody_account;
        self.ledger.credit(account, asset_out, amount_out)?;
        pool.take(asset_out, custody, amount_out)?;

        self.ledger.debit(account, asset_in, amount_in)?;
        self.bank.transfer(asset_in, custody, pool.address(), amount_in)?;
        pool.settle(asset_in, amount_in)?;
        Ok(())
    }

    fn check_guard(
        &self,
        guard: &SettlementGuard,
        account: AccountId,
        amount_out: Amount,
    ) -> Result<(), SettlementError> {
        match guard {
            SettlementGuard::None => Ok(()),
            SettlementGuard::OpenHealth { position } => {
                let mut position = position.clone();
                position.traded_amount = amount_out;
                self.ensure_open_health(&position)
                    .map(|_| ())
                    .map_err(|e| SettlementError::Rejected(Box::new(e)))
            }
            SettlementGuard::Repay { asset, debt } => {
                let available = self
                    .ledger
                    .balance_of(account, *asset)
                    .saturating_add(amount_out);
                if available < *debt {
                    return Err(LedgerError::InsufficientTreasury {
                        account,
                        asset: *asset,
                        available,
                        requested: *debt,
                    }
                    .into());
                }
                Ok(())
            }
        }
    }
}

impl LockCallback for Engine {
    type Error = SettlementError;

    fn on_locked_callback(
        &mut self,
        pool: &mut dyn LockedPool,
        invocation: InvocationId,
        payload: &[u8],
    ) -> Result<Vec<u8>, SettlementError> {
        // any callback that does not finish clears the record of an earlier one
        self.settled = None;
        let envelope: SettlementEnvelope = serde_json::from_slice(payload)?;
        let pending = self
            .pending
            .take()
            .ok_or(SettlementError::UnknownSettlement)?;
        if pending.token != envelope.token || pending.request != envelope.request {
            return Err(SettlementError::UnknownSettlement);
        }

        let request = pending.request;
        let delta = pool.swap(&request.key, &request.params)?;
        tracing::debug!(invocation = invocation.0, ?delta, "settling swap delta");
        self.settle_delta(pool, &request, &pending.guard, delta)?;

        let receipt = serde_json::to_vec(&SettlementReceipt { invocation, delta })?;
        self.settled = Some(SettledSwap { invocation, delta });
        Ok(receipt)
    }
}
