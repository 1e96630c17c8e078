// 3.0 oracle.rs: asset -> market pair -> spot price.
//
// the engine never aggregates prices. it asks the asset for its symbol, packs the
// symbol into the oracle's numeric pair identifier and queries a spot price.
// nothing is cached: two calls are two external queries.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::{AssetId, Timestamp};

/// Bits the packed symbol is shifted by to make room for the quote tag.
pub const PAIR_SHIFT: u32 = 8;

/// Quote currency tag for USD-denominated pairs.
pub const QUOTE_TAG_USD: u64 = 0x01;

/// Numeric pair identifier in the oracle's id space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PairId(pub u64);

/// Spot price returned by the oracle for one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub pair: PairId,
    /// Price in the oracle's fixed-point base. the same base must be used for every asset.
    pub price: u128,
    pub published_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleParams {
    /// Quotes older than this relative to the engine clock are rejected.
    pub max_price_age_ms: u64,
}

impl Default for OracleParams {
    fn default() -> Self {
        Self {
            max_price_age_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    #[error("No symbol for {0}")]
    UnknownAsset(AssetId),

    #[error("Symbol {symbol:?} is empty or not ascii")]
    InvalidSymbol { symbol: String },

    #[error("Pair identifier for {symbol:?} overflows the oracle id space")]
    PairIdentifierOverflow { symbol: String },

    #[error("No price for pair {0:?}")]
    NoPriceForPair(PairId),

    #[error("Oracle returned a zero price for pair {0:?}")]
    InvalidPrice(PairId),

    #[error("Price for pair {pair:?} is {age_ms}ms old, max {max_age_ms}ms")]
    StalePrice {
        pair: PairId,
        age_ms: u64,
        max_age_ms: u64,
    },
}

/// External spot-price lookup keyed by pair identifier.
pub trait PriceOracle {
    fn get_price(&self, pair: PairId) -> Option<PriceQuote>;
}

/// The asset's own metadata interface.
pub trait AssetMetadata {
    fn symbol(&self, asset: AssetId) -> Option<String>;
}

/// Packs an ascii symbol big-endian, shifts it by [`PAIR_SHIFT`] and tags it as a USD pair.
pub fn pair_id_for_symbol(symbol: &str) -> Result<PairId, OracleError> {
    if symbol.is_empty() || !symbol.is_ascii() {
        return Err(OracleError::InvalidSymbol {
            symbol: symbol.to_string(),
        });
    }

    let overflow = || OracleError::PairIdentifierOverflow {
        symbol: symbol.to_string(),
    };

    let mut packed: u64 = 0;
    for byte in symbol.bytes() {
        packed = packed
            .checked_mul(256)
            .ok_or_else(overflow)?
            | byte as u64;
    }

    if packed > (u64::MAX >> PAIR_SHIFT) {
        return Err(overflow());
    }

    Ok(PairId((packed << PAIR_SHIFT) | QUOTE_TAG_USD))
}

/// Resolves asset prices for one logical operation.
pub struct PriceProvider<'a> {
    oracle: &'a dyn PriceOracle,
    metadata: &'a dyn AssetMetadata,
    params: &'a OracleParams,
    now: Timestamp,
}

impl<'a> PriceProvider<'a> {
    pub fn new(
        oracle: &'a dyn PriceOracle,
        metadata: &'a dyn AssetMetadata,
        params: &'a OracleParams,
        now: Timestamp,
    ) -> Self {
        Self {
            oracle,
            metadata,
            params,
            now,
        }
    }

    pub fn pair_for(&self, asset: AssetId) -> Result<PairId, OracleError> {
        let symbol = self
            .metadata
            .symbol(asset)
            .ok_or(OracleError::UnknownAsset(asset))?;
        pair_id_for_symbol(&symbol)
    }

    pub fn get_price(&self, asset: AssetId) -> Result<PriceQuote, OracleError> {
        let pair = self.pair_for(asset)?;
        let quote = self
            .oracle
            .get_price(pair)
            .ok_or(OracleError::NoPriceForPair(pair))?;

        if quote.price == 0 {
            return Err(OracleError::InvalidPrice(pair));
        }

        let age_ms = self.now.millis_since(quote.published_at);
        if age_ms > self.params.max_price_age_ms {
            return Err(OracleError::StalePrice {
                pair,
                age_ms,
                max_age_ms: self.params.max_price_age_ms,
            });
        }

        Ok(quote)
    }
}

/// Mock oracle. clones share the same price table so tests can move prices
/// after handing the oracle to the engine.
#[derive(Debug, Clone, Default)]
pub struct MockOracle {
    prices: Rc<RefCell<HashMap<PairId, PriceQuote>>>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_price(&self, pair: PairId, price: u128, published_at: Timestamp) {
        self.prices.borrow_mut().insert(
            pair,
            PriceQuote {
                pair,
                price,
                published_at,
            },
        );
    }

    /// Sets the USD price for a symbol.
    pub fn set_symbol_price(
        &self,
        symbol: &str,
        price: u128,
        published_at: Timestamp,
    ) -> Result<PairId, OracleError> {
        let pair = pair_id_for_symbol(symbol)?;
        self.set_price(pair, price, published_at);
        Ok(pair)
    }

    pub fn clear(&self, pair: PairId) {
        self.prices.borrow_mut().remove(&pair);
    }
}

impl PriceOracle for MockOracle {
    fn get_price(&self, pair: PairId) -> Option<PriceQuote> {
        self.prices.borrow().get(&pair).copied()
    }
}

/// Mock asset metadata backed by a fixed symbol table.
#[derive(Debug, Clone, Default)]
pub struct MockMetadata {
    symbols: HashMap<AssetId, String>,
}

impl MockMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_symbol(mut self, asset: AssetId, symbol: &str) -> Self {
        self.symbols.insert(asset, symbol.to_string());
        self
    }
}

impl AssetMetadata for MockMetadata {
    fn symbol(&self, asset: AssetId) -> Option<String> {
        self.symbols.get(&asset).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ETH: AssetId = AssetId(1);

    #[test]
    fn pair_id_packing() {
        // "ETH" = 0x455448, shifted one byte and tagged
        assert_eq!(pair_id_for_symbol("ETH").unwrap(), PairId(0x4554_4801));
        assert_eq!(pair_id_for_symbol("A").unwrap(), PairId(0x4101));
    }

    #[test]
    fn seven_bytes_fit_eight_overflow() {
        assert!(pair_id_for_symbol("ABCDEFG").is_ok());
        assert!(matches!(
            pair_id_for_symbol("ABCDEFGH"),
            Err(OracleError::PairIdentifierOverflow { .. })
        ));
        assert!(matches!(
            pair_id_for_symbol("A_VERY_LONG_SYMBOL"),
            Err(OracleError::PairIdentifierOverflow { .. })
        ));
    }

    #[test]
    fn invalid_symbols() {
        assert!(matches!(pair_id_for_symbol(""), Err(OracleError::InvalidSymbol { .. })));
        assert!(matches!(pair_id_for_symbol("ÉTH"), Err(OracleError::InvalidSymbol { .. })));
    }

    #[test]
    fn provider_fetches_each_call() {
        let oracle = MockOracle::new();
        let metadata = MockMetadata::new().with_symbol(ETH, "ETH");
        let params = OracleParams::default();
        oracle.set_symbol_price("ETH", 2_000, Timestamp::from_millis(0)).unwrap();

        let provider = PriceProvider::new(&oracle, &metadata, &params, Timestamp::from_millis(10));
        assert_eq!(provider.get_price(ETH).unwrap().price, 2_000);

        // no cache, the next call sees the new price
        oracle.set_symbol_price("ETH", 2_100, Timestamp::from_millis(5)).unwrap();
        assert_eq!(provider.get_price(ETH).unwrap().price, 2_100);
    }

    #[test]
    fn provider_rejects_stale_zero_and_missing() {
        let oracle = MockOracle::new();
        let metadata = MockMetadata::new().with_symbol(ETH, "ETH");
        let params = OracleParams { max_price_age_ms: 1_000 };

        let provider = PriceProvider::new(&oracle, &metadata, &params, Timestamp::from_millis(5_000));
        assert!(matches!(provider.get_price(ETH), Err(OracleError::NoPriceForPair(_))));
        assert_eq!(
            provider.get_price(AssetId(42)),
            Err(OracleError::UnknownAsset(AssetId(42)))
        );

        oracle.set_symbol_price("ETH", 0, Timestamp::from_millis(5_000)).unwrap();
        assert!(matches!(provider.get_price(ETH), Err(OracleError::InvalidPrice(_))));

        oracle.set_symbol_price("ETH", 2_000, Timestamp::from_millis(3_000)).unwrap();
        assert!(matches!(
            provider.get_price(ETH),
            Err(OracleError::StalePrice { age_ms: 2_000, .. })
        ));
    }
}
