// 7.0 engine/core.rs: main engine. holds the ledger, positions, risk registry and
// the external collaborators it talks to.

use std::collections::HashMap;
use std::fmt;

use super::results::EngineError;
use super::settlement::{PendingSettlement, SettledSwap};
use crate::config::ProtocolConfig;
use crate::events::{
    DepositEvent, Event, EventId, EventPayload, OwnershipTransferredEvent, RiskFactorUpdatedEvent,
    WithdrawEvent,
};
use crate::governance::RiskRegistry;
use crate::ledger::Ledger;
use crate::oracle::{AssetMetadata, PriceOracle};
use crate::position::{Position, PositionError};
use crate::token::AssetTransfer;
use crate::types::{AccountId, Amount, AssetId, Timestamp, Wad};

/** 7.1: main engine struct. all state lives here */
pub struct Engine {
    pub(super) config: ProtocolConfig,
    pub(super) ledger: Ledger,
    pub(super) positions: HashMap<AccountId, Position>,
    pub(super) registry: RiskRegistry,
    pub(super) bank: Box<dyn AssetTransfer>,
    pub(super) oracle: Box<dyn PriceOracle>,
    pub(super) metadata: Box<dyn AssetMetadata>,
    pub(super) events: Vec<Event>,
    // events of the open transaction, published on commit
    pub(super) staged_events: Vec<Event>,
    pub(super) next_event_id: u64,
    pub(super) pending: Option<PendingSettlement>,
    // what the last callback actually applied to the ledger
    pub(super) settled: Option<SettledSwap>,
    pub(super) next_settlement_token: u64,
    pub(super) in_transaction: bool,
    pub(super) current_time: Timestamp,
}

// 7.2: everything a failed transaction puts back
struct Snapshot {
    ledger: Ledger,
    positions: HashMap<AccountId, Position>,
    registry: RiskRegistry,
    next_event_id: u64,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("ledger", &self.ledger)
            .field("positions", &self.positions)
            .field("registry", &self.registry)
            .field("events", &self.events.len())
            .field("current_time", &self.current_time)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        config: ProtocolConfig,
        owner: AccountId,
        bank: impl AssetTransfer + 'static,
        oracle: impl PriceOracle + 'static,
        metadata: impl AssetMetadata + 'static,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            ledger: Ledger::new(),
            positions: HashMap::new(),
            registry: RiskRegistry::new(owner),
            bank: Box::new(bank),
            oracle: Box::new(oracle),
            metadata: Box::new(metadata),
            events: Vec::new(),
            staged_events: Vec::new(),
            next_event_id: 1,
            pending: None,
            settled: None,
            next_settlement_token: 1,
            in_transaction: false,
            current_time: Timestamp::from_millis(0),
        })
    }

    pub fn set_time(&mut self, timestamp: Timestamp) {
        self.current_time = timestamp;
    }

    pub fn time(&self) -> Timestamp {
        self.current_time
    }

    pub fn advance_time(&mut self, millis: i64) {
        self.current_time = Timestamp::from_millis(self.current_time.as_millis() + millis);
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn balance_of(&self, account: AccountId, asset: AssetId) -> Amount {
        self.ledger.balance_of(account, asset)
    }

    pub fn pool_total(&self, asset: AssetId) -> Amount {
        self.ledger.pool_total(asset)
    }

    pub fn position(&self, account: AccountId) -> Option<&Position> {
        self.positions.get(&account)
    }

    pub fn registry(&self) -> &RiskRegistry {
        &self.registry
    }

    pub fn custody_account(&self) -> AccountId {
        self.config.engine.custody_account
    }

    /// Runs `f` as one host transaction.
    ///
    /// On error the ledger, positions, registry, pending settlement and staged
    /// events are put back as they were. Calls made while a transaction is
    /// already open join it. Token balances held by the external bank are not
    /// covered.
    pub(super) fn transact<T>(
        &mut self,
        operation: &'static str,
        f: impl FnOnce(&mut Self) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if self.in_transaction {
            return f(self);
        }

        let snapshot = Snapshot {
            ledger: self.ledger.clone(),
            positions: self.positions.clone(),
            registry: self.registry.clone(),
            next_event_id: self.next_event_id,
        };
        self.in_transaction = true;
        let result = f(self);
        self.in_transaction = false;

        match result {
            Ok(value) => {
                self.commit_events();
                Ok(value)
            }
            Err(err) => {
                tracing::warn!(operation, error = %err, "transaction rolled back");
                self.ledger = snapshot.ledger;
                self.positions = snapshot.positions;
                self.registry = snapshot.registry;
                self.next_event_id = snapshot.next_event_id;
                self.pending = None;
                self.settled = None;
                self.staged_events.clear();
                Err(err)
            }
        }
    }

    /// Pull `amount` of `asset` from `account` into custody.
    pub fn deposit(
        &mut self,
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        self.transact("deposit", |engine| {
            let custody = engine.config.engine.custody_account;
            engine
                .ledger
                .deposit(engine.bank.as_mut(), custody, account, asset, amount)?;

            engine.emit_event(EventPayload::Deposit(DepositEvent {
                account,
                asset,
                amount,
            }));
            Ok(())
        })
    }

    // blocked below the traded amount while a position is open
    pub fn withdraw(
        &mut self,
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        self.transact("withdraw", |engine| {
            engine.ensure_unlocked(account, asset, amount)?;

            let custody = engine.config.engine.custody_account;
            engine
                .ledger
                .withdraw(engine.bank.as_mut(), custody, account, asset, amount)?;

            engine.emit_event(EventPayload::Withdraw(WithdrawEvent {
                account,
                asset,
                amount,
            }));
            Ok(())
        })
    }

    /// Fails if spending `amount` of `asset` would dip into the traded amount of
    /// the account's open position.
    pub(super) fn ensure_unlocked(
        &self,
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), EngineError> {
        let Some(position) = self.positions.get(&account) else {
            return Ok(());
        };
        if !position.is_open() || position.initial_asset != asset {
            return Ok(());
        }

        let balance = self.ledger.balance_of(account, asset);
        let free = balance.saturating_sub(position.traded_amount);
        if amount > free {
            return Err(PositionError::CollateralLocked {
                asset,
                locked: position.traded_amount,
                available: free,
            }
            .into());
        }
        Ok(())
    }

    pub fn set_risk_factor(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        factor: Wad,
    ) -> Result<(), EngineError> {
        self.transact("set_risk_factor", |engine| {
            let previous = engine.registry.set_risk_factor(caller, asset, factor)?;
            engine.emit_event(EventPayload::RiskFactorUpdated(RiskFactorUpdatedEvent {
                asset,
                previous,
                factor,
            }));
            Ok(())
        })
    }

    pub fn transfer_ownership(
        &mut self,
        caller: AccountId,
        new_owner: AccountId,
    ) -> Result<(), EngineError> {
        self.registry.transfer_ownership(caller, new_owner)?;
        Ok(())
    }

    pub fn accept_ownership(&mut self, caller: AccountId) -> Result<(), EngineError> {
        self.transact("accept_ownership", |engine| {
            let previous_owner = engine.registry.accept_ownership(caller)?;
            engine.emit_event(EventPayload::OwnershipTransferred(OwnershipTransferredEvent {
                previous_owner,
                new_owner: caller,
            }));
            Ok(())
        })
    }

    pub fn recent_events(&self, count: usize) -> &[Event] {
        let start = self.events.len().saturating_sub(count);
        &self.events[start..]
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub(super) fn emit_event(&mut self, payload: EventPayload) {
        let event = Event::new(EventId(self.next_event_id), self.current_time, payload);
        self.next_event_id += 1;

        if self.in_transaction {
            self.staged_events.push(event);
        } else {
            self.publish(event);
        }
    }

    fn commit_events(&mut self) {
        let staged = std::mem::take(&mut self.staged_events);
        for event in staged {
            self.publish(event);
        }
    }

    fn publish(&mut self, event: Event) {
        tracing::debug!(id = event.id.0, payload = ?event.payload, "event");
        self.events.push(event);

        if self.events.len() > self.config.engine.max_events {
            let drain_count = self.events.len() - self.config.engine.max_events;
            self.events.drain(0..drain_count);
        }
    }
}
