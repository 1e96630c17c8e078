// 7.0.2: result types and errors for engine operations.

use super::settlement::SettlementError;
use crate::config::ConfigError;
use crate::governance::GovernanceError;
use crate::health::{HealthError, HealthFactor};
use crate::ledger::LedgerError;
use crate::oracle::OracleError;
use crate::pool::{InvocationId, LockError, PoolError, SwapDelta};
use crate::position::{Position, PositionError};
use crate::types::{AccountId, Amount, AssetId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapOutcome {
    pub invocation: InvocationId,
    pub delta: SwapDelta,
    pub asset_in: AssetId,
    pub asset_out: AssetId,
    pub amount_in: Amount,
    pub amount_out: Amount,
}

#[derive(Debug, Clone)]
pub struct OpenResult {
    pub position: Position,
    pub health_factor: HealthFactor,
    pub swap: SwapOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseResult {
    /// Debt asset received for the traded amount.
    pub proceeds: Amount,
    pub debt_repaid: Amount,
    pub swap: SwapOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationResult {
    pub account: AccountId,
    pub liquidator: AccountId,
    pub proceeds: Amount,
    pub debt_repaid: Amount,
    pub bad_debt: Amount,
    pub incentive: Amount,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Health error: {0}")]
    Health(#[from] HealthError),

    #[error("Pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Settlement error: {0}")]
    Settlement(#[from] SettlementError),

    #[error("Position error: {0}")]
    Position(#[from] PositionError),

    #[error("Governance error: {0}")]
    Governance(#[from] GovernanceError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Amount overflow")]
    AmountOverflow,
}

impl From<LockError<SettlementError>> for EngineError {
    fn from(err: LockError<SettlementError>) -> Self {
        match err {
            LockError::Callback(SettlementError::Rejected(e)) => *e,
            LockError::Callback(e) => EngineError::Settlement(e),
            LockError::Pool(e) => EngineError::Pool(e),
        }
    }
}
