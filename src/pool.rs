// 5.0 pool.rs: boundary to the external AMM pool and its lock/callback protocol.
//
// the initiator calls begin_locked_operation with an opaque payload. before that
// call returns the pool calls the initiator's LockCallback with a handle to itself
// (LockedPool). inside the callback the initiator swaps, then settles every delta
// it owes and takes every delta owed to it. the pool refuses to unlock with an
// outstanding delta and rolls its own state back if the callback fails.
//
// 5.1 ConstantProductPool: reference x*y=k pool used by tests and the simulator.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::token::{AssetTransfer, MemoryBank, TransferError};
use crate::types::{AccountId, Amount, AssetId, Bps};

/// Identity of a pool: the ordered asset pair and its fee tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub asset0: AssetId,
    pub asset1: AssetId,
    pub fee: Bps,
}

impl PoolKey {
    /// Orders the pair so `asset0 < asset1`.
    pub fn new(a: AssetId, b: AssetId, fee: Bps) -> Self {
        let (asset0, asset1) = if a <= b { (a, b) } else { (b, a) };
        Self { asset0, asset1, fee }
    }

    pub fn contains(&self, asset: AssetId) -> bool {
        self.asset0 == asset || self.asset1 == asset
    }

    /// Swap direction for spending `asset_in`. None if the pool doesn't trade it.
    pub fn zero_for_one(&self, asset_in: AssetId) -> Option<bool> {
        if asset_in == self.asset0 {
            Some(true)
        } else if asset_in == self.asset1 {
            Some(false)
        } else {
            None
        }
    }
}

/// Exact-input swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    /// true spends asset0 for asset1.
    pub zero_for_one: bool,
    pub amount_in: Amount,
}

impl SwapParams {
    pub fn assets(&self, key: &PoolKey) -> (AssetId, AssetId) {
        if self.zero_for_one {
            (key.asset0, key.asset1)
        } else {
            (key.asset1, key.asset0)
        }
    }
}

/// What one settlement call asks the pool to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub key: PoolKey,
    pub params: SwapParams,
    pub account: AccountId,
    /// Minimum output, enforced before any leg is settled.
    pub min_amount_out: Amount,
}

/// Signed amount per pool asset. positive: the account owes the pool. negative:
/// the pool owes the account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapDelta {
    pub amount0: i128,
    pub amount1: i128,
}

impl SwapDelta {
    pub fn legs(&self, key: &PoolKey) -> [(AssetId, i128); 2] {
        [(key.asset0, self.amount0), (key.asset1, self.amount1)]
    }

    pub fn for_asset(&self, key: &PoolKey, asset: AssetId) -> Option<i128> {
        if asset == key.asset0 {
            Some(self.amount0)
        } else if asset == key.asset1 {
            Some(self.amount1)
        } else {
            None
        }
    }
}

/// Pool-assigned identifier of one locked operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvocationId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Pool is already locked")]
    AlreadyLocked,

    #[error("Pool is not locked")]
    NotLocked,

    #[error("Unknown pool {0:?}")]
    UnknownPool(PoolKey),

    #[error("Swap amount must be non-zero")]
    ZeroAmount,

    #[error("Swap of {amount_in} returns nothing")]
    InsufficientLiquidity { amount_in: Amount },

    #[error("Delta for {asset:?} left unsettled: {amount}")]
    UnsettledDelta { asset: AssetId, amount: i128 },

    #[error("Settle of {expected} {asset:?} found only {received} paid in")]
    PaymentMissing {
        asset: AssetId,
        expected: Amount,
        received: Amount,
    },

    #[error("Amount {0} does not fit a signed delta")]
    DeltaOverflow(Amount),

    #[error("Pool transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

/// Failure of a locked operation: either the callback or the pool itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError<E> {
    #[error("Lock callback failed: {0}")]
    Callback(E),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Operations available to the lock holder while the pool is locked.
pub trait LockedPool {
    /// Token account the pool holds its reserves in.
    fn address(&self) -> AccountId;

    fn swap(&mut self, key: &PoolKey, params: &SwapParams) -> Result<SwapDelta, PoolError>;

    /// Acknowledge `amount` of `asset` already transferred to the pool.
    fn settle(&mut self, asset: AssetId, amount: Amount) -> Result<(), PoolError>;

    /// Pay `amount` of `asset` owed by the pool out to `to`.
    fn take(&mut self, asset: AssetId, to: AccountId, amount: Amount) -> Result<(), PoolError>;
}

/// Entry point the pool calls back into while locked.
pub trait LockCallback {
    type Error;

    fn on_locked_callback(
        &mut self,
        pool: &mut dyn LockedPool,
        invocation: InvocationId,
        payload: &[u8],
    ) -> Result<Vec<u8>, Self::Error>;
}

pub trait ExternalPool {
    fn key(&self) -> PoolKey;

    /// Lock the pool, run `handler` once, and unlock. returns the callback's result.
    fn begin_locked_operation<C: LockCallback>(
        &mut self,
        payload: &[u8],
        handler: &mut C,
    ) -> Result<Vec<u8>, LockError<C::Error>>;
}

pub(crate) fn to_delta(amount: Amount) -> Result<i128, PoolError> {
    i128::try_from(amount).map_err(|_| PoolError::DeltaOverflow(amount))
}

#[derive(Debug, Clone, Default)]
struct PoolState {
    reserve0: Amount,
    reserve1: Amount,
    /// Token balance the pool has accounted for, per asset.
    synced: HashMap<AssetId, Amount>,
    /// Outstanding delta of the current lock holder, same sign as SwapDelta.
    deltas: HashMap<AssetId, i128>,
}

// 5.1: x*y=k pool with an input fee, holding real balances in a MemoryBank.
#[derive(Debug)]
pub struct ConstantProductPool {
    key: PoolKey,
    address: AccountId,
    bank: MemoryBank,
    state: PoolState,
    locked: bool,
    next_invocation: u64,
}

impl ConstantProductPool {
    pub fn new(key: PoolKey, address: AccountId, bank: MemoryBank) -> Self {
        Self {
            key,
            address,
            bank,
            state: PoolState::default(),
            locked: false,
            next_invocation: 0,
        }
    }

    pub fn reserves(&self) -> (Amount, Amount) {
        (self.state.reserve0, self.state.reserve1)
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Mint liquidity straight into the pool.
    pub fn seed(&mut self, amount0: Amount, amount1: Amount) {
        self.bank.mint(self.key.asset0, self.address, amount0);
        self.bank.mint(self.key.asset1, self.address, amount1);
        self.state.reserve0 += amount0;
        self.state.reserve1 += amount1;
        *self.state.synced.entry(self.key.asset0).or_insert(0) += amount0;
        *self.state.synced.entry(self.key.asset1).or_insert(0) += amount1;
    }

    /// Output for an exact-input swap at current reserves.
    pub fn quote(&self, params: &SwapParams) -> Amount {
        let (reserve_in, reserve_out) = if params.zero_for_one {
            (self.state.reserve0, self.state.reserve1)
        } else {
            (self.state.reserve1, self.state.reserve0)
        };
        let fee = self.key.fee.apply(params.amount_in).unwrap_or(params.amount_in);
        let in_after_fee = params.amount_in - fee;
        let denominator = reserve_in.saturating_add(in_after_fee);
        if denominator == 0 {
            return 0;
        }
        // widen to avoid overflowing the product
        let out = primitive_types::U256::from(reserve_out) * primitive_types::U256::from(in_after_fee)
            / primitive_types::U256::from(denominator);
        out.low_u128()
    }

    fn require_locked(&self) -> Result<(), PoolError> {
        if self.locked {
            Ok(())
        } else {
            Err(PoolError::NotLocked)
        }
    }

    fn add_delta(&mut self, asset: AssetId, amount: i128) {
        *self.state.deltas.entry(asset).or_insert(0) += amount;
    }

    fn outstanding_delta(&self) -> Option<(AssetId, i128)> {
        let mut outstanding: Vec<(AssetId, i128)> = self
            .state
            .deltas
            .iter()
            .filter(|(_, amount)| **amount != 0)
            .map(|(asset, amount)| (*asset, *amount))
            .collect();
        outstanding.sort();
        outstanding.into_iter().next()
    }
}

impl LockedPool for ConstantProductPool {
    fn address(&self) -> AccountId {
        self.address
    }

    fn swap(&mut self, key: &PoolKey, params: &SwapParams) -> Result<SwapDelta, PoolError> {
        self.require_locked()?;
        if *key != self.key {
            return Err(PoolError::UnknownPool(*key));
        }
        if params.amount_in == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let amount_out = self.quote(params);
        if amount_out == 0 {
            return Err(PoolError::InsufficientLiquidity {
                amount_in: params.amount_in,
            });
        }

        let signed_in = to_delta(params.amount_in)?;
        let signed_out = to_delta(amount_out)?;
        let delta = if params.zero_for_one {
            self.state.reserve0 += params.amount_in;
            self.state.reserve1 -= amount_out;
            SwapDelta {
                amount0: signed_in,
                amount1: -signed_out,
            }
        } else {
            self.state.reserve1 += params.amount_in;
            self.state.reserve0 -= amount_out;
            SwapDelta {
                amount0: -signed_out,
                amount1: signed_in,
            }
        };

        self.add_delta(self.key.asset0, delta.amount0);
        self.add_delta(self.key.asset1, delta.amount1);
        Ok(delta)
    }

    fn settle(&mut self, asset: AssetId, amount: Amount) -> Result<(), PoolError> {
        self.require_locked()?;
        let synced = self.state.synced.get(&asset).copied().unwrap_or(0);
        let received = self.bank.balance_of(asset, self.address).saturating_sub(synced);
        if received < amount {
            return Err(PoolError::PaymentMissing {
                asset,
                expected: amount,
                received,
            });
        }
        let signed = to_delta(amount)?;
        self.state.synced.insert(asset, synced + amount);
        self.add_delta(asset, -signed);
        Ok(())
    }

    fn take(&mut self, asset: AssetId, to: AccountId, amount: Amount) -> Result<(), PoolError> {
        self.require_locked()?;
        let signed = to_delta(amount)?;
        self.bank.transfer(asset, self.address, to, amount)?;
        let synced = self.state.synced.get(&asset).copied().unwrap_or(0);
        self.state.synced.insert(asset, synced.saturating_sub(amount));
        self.add_delta(asset, signed);
        Ok(())
    }
}

impl ExternalPool for ConstantProductPool {
    fn key(&self) -> PoolKey {
        self.key
    }

    fn begin_locked_operation<C: LockCallback>(
        &mut self,
        payload: &[u8],
        handler: &mut C,
    ) -> Result<Vec<u8>, LockError<C::Error>> {
        if self.locked {
            return Err(LockError::Pool(PoolError::AlreadyLocked));
        }

        let snapshot = self.state.clone();
        self.next_invocation += 1;
        let invocation = InvocationId(self.next_invocation);
        self.locked = true;

        let result = handler.on_locked_callback(self, invocation, payload);
        self.locked = false;

        match result {
            Err(e) => {
                self.state = snapshot;
                Err(LockError::Callback(e))
            }
            Ok(bytes) => {
                if let Some((asset, amount)) = self.outstanding_delta() {
                    self.state = snapshot;
                    return Err(LockError::Pool(PoolError::UnsettledDelta { asset, amount }));
                }
                self.state.deltas.clear();
                Ok(bytes)
            }
        }
    }
}
