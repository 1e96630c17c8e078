// 4.0: leveraged position record. one per account.
// collateral + borrowed debt asset get swapped into the initial asset. the
// swapped amount is `traded_amount`, the borrowed amount is `debt`.
// 4.1 has the state machine helpers at the bottom.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{Amount, AssetId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Asset the account holds exposure in.
    pub initial_asset: AssetId,
    /// Asset the debt is denominated in.
    pub debt_asset: AssetId,
    pub traded_amount: Amount,
    pub debt: Amount,
    /// Own funds of the debt asset committed at open.
    pub collateral: Amount,
    pub opened_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Position {
    pub fn new(
        initial_asset: AssetId,
        debt_asset: AssetId,
        traded_amount: Amount,
        debt: Amount,
        collateral: Amount,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            initial_asset,
            debt_asset,
            traded_amount,
            debt,
            collateral,
            opened_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Both legs positive. anything else counts as no position.
    pub fn is_open(&self) -> bool {
        self.traded_amount > 0 && self.debt > 0
    }

    pub fn state(&self) -> PositionState {
        if self.is_open() {
            PositionState::Open
        } else {
            PositionState::NoPosition
        }
    }

    /// (collateral + debt) / collateral, None without collateral.
    pub fn leverage(&self) -> Option<Decimal> {
        if self.collateral == 0 {
            return None;
        }
        let notional = Decimal::from_u128(self.collateral.checked_add(self.debt)?)?;
        let collateral = Decimal::from_u128(self.collateral)?;
        notional.checked_div(collateral)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    NoPosition,
    Open,
}

/// What to open: spend `collateral + debt` of `debt_asset`, receive `initial_asset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPositionParams {
    pub initial_asset: AssetId,
    pub debt_asset: AssetId,
    pub collateral: Amount,
    pub debt: Amount,
}

/// Minimum output the swap leg must deliver, checked inside the locked window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlippageLimits {
    pub min_amount_out: Amount,
}

impl SlippageLimits {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at_least(min_amount_out: Amount) -> Self {
        Self { min_amount_out }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("Account already has an open position")]
    PositionAlreadyOpen,

    #[error("Account has no open position")]
    NoOpenPosition,

    #[error("Initial and debt asset must differ")]
    SameAsset,

    #[error("Collateral and debt must both be non-zero")]
    EmptyPosition,

    #[error("Pool does not trade {initial:?}/{debt:?}")]
    PoolMismatch { initial: AssetId, debt: AssetId },

    #[error("Lending reserve holds {available} of {asset:?}, cannot lend {requested}")]
    InsufficientLiquidity {
        asset: AssetId,
        available: Amount,
        requested: Amount,
    },

    #[error("Health factor {actual} below required {required}")]
    HealthTooLow { actual: Decimal, required: Decimal },

    #[error("Position is healthy: health factor {health} >= threshold {threshold}")]
    NotLiquidatable { health: Decimal, threshold: Decimal },

    #[error("{locked} of {asset:?} backs the open position, {available} free")]
    CollateralLocked {
        asset: AssetId,
        locked: Amount,
        available: Amount,
    },
}

// 4.1: transitions. NoPosition -> Open -> NoPosition
pub fn ensure_can_open(existing: Option<&Position>) -> Result<(), PositionError> {
    match existing {
        Some(position) if position.is_open() => Err(PositionError::PositionAlreadyOpen),
        _ => Ok(()),
    }
}

pub fn ensure_open(existing: Option<&Position>) -> Result<&Position, PositionError> {
    existing
        .filter(|position| position.is_open())
        .ok_or(PositionError::NoOpenPosition)
}
