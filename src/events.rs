// 9.0: every successful state change produces exactly one event. a failed
// operation leaves none behind: events are staged during a transaction and
// dropped if it rolls back.

use serde::{Deserialize, Serialize};

use crate::pool::{InvocationId, PoolKey, SwapDelta};
use crate::types::{AccountId, Amount, AssetId, Timestamp, Wad};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventId(pub u64);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub timestamp: Timestamp,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(id: EventId, timestamp: Timestamp, payload: EventPayload) -> Self {
        Self {
            id,
            timestamp,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPayload {
    // Ledger events
    Deposit(DepositEvent),
    Withdraw(WithdrawEvent),

    // Settlement events
    SwapSettled(SwapSettledEvent),

    // Position events
    PositionOpened(PositionOpenedEvent),
    PositionClosed(PositionClosedEvent),
    Liquidation(LiquidationEvent),

    // Governance events
    RiskFactorUpdated(RiskFactorUpdatedEvent),
    OwnershipTransferred(OwnershipTransferredEvent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    pub account: AccountId,
    pub asset: AssetId,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawEvent {
    pub account: AccountId,
    pub asset: AssetId,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapSettledEvent {
    pub account: AccountId,
    pub key: PoolKey,
    pub invocation: InvocationId,
    pub delta: SwapDelta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionOpenedEvent {
    pub account: AccountId,
    pub initial_asset: AssetId,
    pub debt_asset: AssetId,
    pub traded_amount: Amount,
    pub debt: Amount,
    pub collateral: Amount,
    pub health_factor: Wad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionClosedEvent {
    pub account: AccountId,
    pub proceeds: Amount,
    pub debt_repaid: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationEvent {
    pub account: AccountId,
    pub liquidator: AccountId,
    pub proceeds: Amount,
    pub debt_repaid: Amount,
    pub bad_debt: Amount,
    pub incentive: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactorUpdatedEvent {
    pub asset: AssetId,
    pub previous: Option<Wad>,
    pub factor: Wad,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTransferredEvent {
    pub previous_owner: AccountId,
    pub new_owner: AccountId,
}
