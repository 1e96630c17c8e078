//! Price and health queries.

use super::core::Engine;
use super::results::EngineError;
use crate::health::{health_factor, HealthFactor};
use crate::oracle::{PairId, PriceProvider, PriceQuote};
use crate::position::{ensure_open, Position, PositionError};
use crate::types::{AccountId, AssetId};

impl Engine {
    fn price_provider(&self) -> PriceProvider<'_> {
        PriceProvider::new(
            self.oracle.as_ref(),
            self.metadata.as_ref(),
            &self.config.oracle,
            self.current_time,
        )
    }

    /// Spot price of `asset` against USD.
    pub fn get_price(&self, asset: AssetId) -> Result<PriceQuote, EngineError> {
        Ok(self.price_provider().get_price(asset)?)
    }

    pub fn pair_for(&self, asset: AssetId) -> Result<PairId, EngineError> {
        Ok(self.price_provider().pair_for(asset)?)
    }

    /// Health factor of the account's open position.
    pub fn position_health(&self, account: AccountId) -> Result<HealthFactor, EngineError> {
        let position = ensure_open(self.positions.get(&account))?;
        self.health_of(position)
    }

    /// Health of a position about to be opened, checked against the open threshold.
    pub(super) fn ensure_open_health(&self, position: &Position) -> Result<HealthFactor, EngineError> {
        let health_factor = self.health_of(position)?;
        let required = self.config.risk.min_open_health_factor;
        if health_factor.is_below(required) {
            return Err(PositionError::HealthTooLow {
                actual: health_factor.to_decimal(),
                required: required.to_decimal(),
            }
            .into());
        }
        Ok(health_factor)
    }

    // each price is read once
    pub(super) fn health_of(&self, position: &Position) -> Result<HealthFactor, EngineError> {
        let risk_factor = self.registry.risk_factor(position.initial_asset)?;
        let provider = self.price_provider();
        let initial_price = provider.get_price(position.initial_asset)?.price;
        let debt_price = provider.get_price(position.debt_asset)?.price;

        Ok(health_factor(position, risk_factor, initial_price, debt_price)?)
    }
}
