// 7.0: margin engine. owns the ledger, positions and risk registry, and drives
// external pools through the lock/callback protocol. every public mutation runs
// inside one host transaction that rolls back on error.

mod config;
mod core;
mod positions;
mod pricing;
mod results;
mod settlement;

pub use config::EngineConfig;
pub use core::Engine;
pub use results::{CloseResult, EngineError, LiquidationResult, OpenResult, SwapOutcome};
pub use settlement::SettlementError;
