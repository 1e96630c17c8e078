// margin-core: accounting and settlement core of a leveraged margin protocol.
// ledger-first architecture: every balance change goes through the ledger, which
// keeps account balances and pool totals in lock-step.
// all state changes are synchronous; external collaborators sit behind traits.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs: primitives: AccountId, AssetId, Wad, Bps, Timestamp
//   2.x  token.rs: asset transfer boundary + in-memory bank
//   3.x  oracle.rs: symbol -> pair id packing, price provider, mocks
//   4.x  position.rs: position record and lifecycle state machine
//        health.rs: scale-then-divide health factor in U256
//        ledger.rs: per-account balances and pool totals
//   5.x  pool.rs: lock/callback pool boundary, constant product pool
//        governance.rs: risk factors, two-step ownership
//   7.x  engine/: host transaction, deposits, settlement, lifecycle
//   8.x  config.rs: engine, oracle and risk params, env presets
//   9.x  events.rs: state transition events for audit

pub mod config;
pub mod engine;
pub mod events;
pub mod governance;
pub mod health;
pub mod ledger;
pub mod oracle;
pub mod pool;
pub mod position;
pub mod token;
pub mod types;

// re exports for convenience
pub use config::{ConfigError, Environment, ProtocolConfig, RiskParams};
pub use engine::*;
pub use events::*;
pub use governance::{GovernanceError, RiskRegistry};
pub use health::{health_factor, health_factor_raw, HealthError, HealthFactor, SCALE};
pub use ledger::{Ledger, LedgerError};
pub use oracle::*;
pub use pool::*;
pub use position::*;
pub use token::{AssetTransfer, MemoryBank, TransferError};
pub use types::*;
