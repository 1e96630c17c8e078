//! Engine configuration options.

use serde::{Deserialize, Serialize};

use crate::types::AccountId;

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Token account holding every deposited asset.
    pub custody_account: AccountId,
    /// Ledger account that lends the debt leg of new positions.
    pub lending_account: AccountId,
    /// Maximum number of events to retain in memory.
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            custody_account: AccountId(u64::MAX),
            lending_account: AccountId(u64::MAX - 1),
            max_events: 100_000,
        }
    }
}
