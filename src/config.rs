// 8.0 config.rs: all settings in one place. engine identities, oracle freshness,
// risk thresholds. every threshold is WAD, the bonus is bps.

use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;
use crate::oracle::OracleParams;
use crate::types::{Bps, Wad};

/** 8.1: thresholds the lifecycle checks against health factors */
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskParams {
    // Minimum health factor right after opening
    pub min_open_health_factor: Wad,
    // Below this a third party may liquidate
    pub liquidation_threshold: Wad,
    // Share of repaid debt paid to the liquidator
    pub liquidation_bonus: Bps,
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            min_open_health_factor: Wad::from_parts(1, 20), // 1.2
            liquidation_threshold: Wad::ONE,
            liquidation_bonus: Bps(500), // 5%
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    pub engine: EngineConfig,
    pub oracle: OracleParams,
    pub risk: RiskParams,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            oracle: OracleParams::default(),
            risk: RiskParams::default(),
        }
    }
}

impl ProtocolConfig {
    // Loose settings for local runs
    pub fn testnet() -> Self {
        let mut config = Self::default();
        config.oracle.max_price_age_ms = 10 * 60_000;
        config.risk.min_open_health_factor = Wad::from_parts(1, 5);
        config
    }

    // Conservative settings: fresher prices, wider buffer before liquidation
    pub fn mainnet_conservative() -> Self {
        let mut config = Self::default();
        config.oracle.max_price_age_ms = 15_000;
        config.risk.min_open_health_factor = Wad::from_parts(1, 50);
        config.risk.liquidation_threshold = Wad::from_parts(1, 5);
        config.risk.liquidation_bonus = Bps(250);
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.risk.liquidation_threshold.is_zero() {
            return Err(ConfigError::InvalidRisk {
                reason: "Liquidation threshold must be positive".to_string(),
            });
        }

        // opening right at the liquidation line would be liquidatable immediately
        if self.risk.min_open_health_factor <= self.risk.liquidation_threshold {
            return Err(ConfigError::InvalidRisk {
                reason: "Open threshold must exceed liquidation threshold".to_string(),
            });
        }

        if self.risk.liquidation_bonus.value() >= Bps::MAX {
            return Err(ConfigError::InvalidRisk {
                reason: "Liquidation bonus must be below 100%".to_string(),
            });
        }

        if self.oracle.max_price_age_ms == 0 {
            return Err(ConfigError::InvalidOracle {
                reason: "Max price age must be positive".to_string(),
            });
        }

        let accounts = [
            self.engine.custody_account,
            self.engine.lending_account,
        ];
        if accounts[0] == accounts[1] {
            return Err(ConfigError::InvalidEngine {
                reason: "Custody and lending accounts must differ".to_string(),
            });
        }

        if self.engine.max_events == 0 {
            return Err(ConfigError::InvalidEngine {
                reason: "Event log needs room for at least one event".to_string(),
            });
        }

        Ok(())
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid risk params: {reason}")]
    InvalidRisk { reason: String },

    #[error("Invalid oracle params: {reason}")]
    InvalidOracle { reason: String },

    #[error("Invalid engine config: {reason}")]
    InvalidEngine { reason: String },

    #[error("Config parse error: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ProtocolConfig {
        match self {
            Environment::Development => ProtocolConfig::default(),
            Environment::Testnet => ProtocolConfig::testnet(),
            Environment::Mainnet => ProtocolConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
    }

    #[test]
    fn test_open_threshold_must_exceed_liquidation() {
        let mut config = ProtocolConfig::default();
        config.risk.min_open_health_factor = Wad::ONE;

        let result = config.validate();
        assert!(matches!(result, Err(ConfigError::InvalidRisk { .. })));
    }

    #[test]
    fn test_bonus_bounded() {
        let mut config = ProtocolConfig::default();
        config.risk.liquidation_bonus = Bps(10_000);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRisk { .. })));
    }

    #[test]
    fn test_custody_and_lending_distinct() {
        let mut config = ProtocolConfig::default();
        config.engine.lending_account = config.engine.custody_account;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidEngine { .. })));

        config.engine.lending_account = AccountId(7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = ProtocolConfig::mainnet_conservative();
        let json = serde_json::to_string(&config).unwrap();
        let back = ProtocolConfig::from_json(&json).unwrap();
        assert_eq!(back.risk.liquidation_bonus, Bps(250));
        assert_eq!(back.oracle.max_price_age_ms, 15_000);
    }

    #[test]
    fn test_bad_json() {
        assert!(matches!(
            ProtocolConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
