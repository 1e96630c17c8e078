//! Health factor.
//!
//! ```text
//! ratio = (traded_amount * price(initial) * SCALE * risk_factor)
//!         / (debt * price(debt) * SCALE)
//! ```
//!
//! `SCALE` is on both sides and is applied, not cancelled. All products run in
//! 256-bit integers, so the overflow boundary and the truncation are fixed by this
//! exact multiplication order. Risk factors are WAD, which makes the ratio a WAD:
//! `>= 1e18` is solvent.

use primitive_types::U256;
use rust_decimal::Decimal;

use crate::position::Position;
use crate::types::{wad_to_decimal, Amount, Wad, WAD};

/// Fixed-point scale applied to numerator and denominator.
pub const SCALE: u128 = WAD;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HealthError {
    #[error("Position has zero traded amount")]
    ZeroTradedAmount,

    #[error("Position has zero debt")]
    ZeroDebt,

    #[error("Debt asset price is zero")]
    ZeroPrice,

    #[error("Health factor arithmetic overflowed 256 bits")]
    ArithmeticOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct HealthFactor(U256);

impl HealthFactor {
    pub fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    pub fn is_solvent(&self) -> bool {
        self.0 >= U256::from(WAD)
    }

    pub fn is_below(&self, threshold: Wad) -> bool {
        self.0 < U256::from(threshold.raw())
    }

    /// WAD view for events. saturates above u128.
    pub fn as_wad(&self) -> Wad {
        if self.0 > U256::from(u128::MAX) {
            return Wad(u128::MAX);
        }
        Wad(self.0.as_u128())
    }

    /// Decimal view for logs and errors. saturates above u128.
    pub fn to_decimal(&self) -> Decimal {
        if self.0 > U256::from(u128::MAX) {
            return Decimal::MAX;
        }
        wad_to_decimal(self.0.as_u128())
    }
}

/// The raw formula over plain integers.
pub fn health_factor_raw(
    traded_amount: Amount,
    initial_price: u128,
    risk_factor: u128,
    debt: Amount,
    debt_price: u128,
) -> Result<U256, HealthError> {
    if traded_amount == 0 {
        return Err(HealthError::ZeroTradedAmount);
    }
    if debt == 0 {
        return Err(HealthError::ZeroDebt);
    }
    if debt_price == 0 {
        return Err(HealthError::ZeroPrice);
    }

    let scale = U256::from(SCALE);
    let numerator = U256::from(traded_amount)
        .checked_mul(U256::from(initial_price))
        .and_then(|v| v.checked_mul(scale))
        .and_then(|v| v.checked_mul(U256::from(risk_factor)))
        .ok_or(HealthError::ArithmeticOverflow)?;
    let denominator = U256::from(debt)
        .checked_mul(U256::from(debt_price))
        .and_then(|v| v.checked_mul(scale))
        .ok_or(HealthError::ArithmeticOverflow)?;

    Ok(numerator / denominator)
}

/// Health factor of `position` at the given prices.
///
/// Prices come from two separate oracle reads made by the caller; both must be in
/// the same base.
pub fn health_factor(
    position: &Position,
    risk_factor: Wad,
    initial_price: u128,
    debt_price: u128,
) -> Result<HealthFactor, HealthError> {
    health_factor_raw(
        position.traded_amount,
        initial_price,
        risk_factor.raw(),
        position.debt,
        debt_price,
    )
    .map(HealthFactor)
}
