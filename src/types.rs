// 1.0: all the primitives live here. ids, amounts, fixed point, timestamps.
// each is a newtype so the compiler catches an asset id passed where an account id belongs.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Raw token amount in the asset's smallest unit.
pub type Amount = u128;

/// 10^18, the fixed-point base for risk factors, thresholds and health factors.
pub const WAD: u128 = 1_000_000_000_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(pub u32);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "account#{}", self.0)
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "asset#{}", self.0)
    }
}

// 1.1: WAD fixed point. 1e18 = 1.0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Wad(pub u128);

impl Wad {
    pub const ONE: Wad = Wad(WAD);
    pub const ZERO: Wad = Wad(0);

    /// Builds a WAD from a whole number and a number of hundredths, e.g. `from_parts(1, 25)` is 1.25.
    pub const fn from_parts(units: u128, hundredths: u128) -> Self {
        Self(units * WAD + hundredths * (WAD / 100))
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Human readable view. precision is capped by Decimal's 28 digits.
    pub fn to_decimal(&self) -> Decimal {
        wad_to_decimal(self.0)
    }
}

impl fmt::Display for Wad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

pub(crate) fn wad_to_decimal(raw: u128) -> Decimal {
    let units = raw / WAD;
    let frac = raw % WAD;
    // units beyond Decimal's range saturate
    let whole = Decimal::from_u128(units).unwrap_or(Decimal::MAX);
    let fraction = Decimal::from_i128_with_scale(frac as i128, 18);
    whole.checked_add(fraction).unwrap_or(Decimal::MAX)
}

// 1.2: basis points. 100 bps = 1%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bps(pub u32);

impl Bps {
    pub const MAX: u32 = 10_000;

    pub fn value(&self) -> u32 {
        self.0
    }

    /// `amount * bps / 10_000`, rounded down. None on overflow.
    pub fn apply(&self, amount: Amount) -> Option<Amount> {
        amount
            .checked_mul(self.0 as u128)
            .map(|v| v / Self::MAX as u128)
    }

    pub fn as_fraction(&self) -> Decimal {
        Decimal::new(self.0 as i64, 4)
    }
}

// 1.3: millisecond timestamp. the engine owns the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub fn as_millis(&self) -> i64 {
        self.0
    }

    /// Milliseconds from `earlier` to `self`, zero if `earlier` is in the future.
    pub fn millis_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0).max(0) as u64
    }
}
