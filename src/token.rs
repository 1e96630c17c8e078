// 2.0 token.rs: boundary to the fungible assets the ledger custodies.
// the core never moves tokens itself, it asks an AssetTransfer implementation to.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::types::{AccountId, Amount, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransferError {
    #[error("{holder} holds {available} of {asset}, needs {requested}")]
    InsufficientFunds {
        asset: AssetId,
        holder: AccountId,
        available: Amount,
        requested: Amount,
    },

    #[error("{spender} may move {allowed} of {asset} for {owner}, needs {requested}")]
    AllowanceExceeded {
        asset: AssetId,
        owner: AccountId,
        spender: AccountId,
        allowed: Amount,
        requested: Amount,
    },
}

/// Standard fungible-asset operations, one ledger of balances per asset.
///
/// `caller` on the mutating calls is the identity executing the call. for
/// `transfer` it is the sender, for `transfer_from` it is the spender whose
/// allowance gets consumed.
pub trait AssetTransfer {
    fn allowance(&self, asset: AssetId, owner: AccountId, spender: AccountId) -> Amount;

    fn balance_of(&self, asset: AssetId, owner: AccountId) -> Amount;

    fn transfer(
        &mut self,
        asset: AssetId,
        caller: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError>;

    fn transfer_from(
        &mut self,
        asset: AssetId,
        caller: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError>;
}

#[derive(Debug, Clone, Default)]
struct BankState {
    balances: HashMap<(AssetId, AccountId), Amount>,
    allowances: HashMap<(AssetId, AccountId, AccountId), Amount>,
    transfer_count: u64,
}

/// In-memory token bank for tests and the simulator.
///
/// Cloning gives another handle to the same balances, so the engine and a pool
/// can both hold one.
#[derive(Debug, Clone, Default)]
pub struct MemoryBank {
    state: Rc<RefCell<BankState>>,
}

impl MemoryBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mint(&self, asset: AssetId, to: AccountId, amount: Amount) {
        let mut state = self.state.borrow_mut();
        *state.balances.entry((asset, to)).or_insert(0) += amount;
    }

    pub fn approve(&self, asset: AssetId, owner: AccountId, spender: AccountId, amount: Amount) {
        self.state
            .borrow_mut()
            .allowances
            .insert((asset, owner, spender), amount);
    }

    /// Number of successful transfers executed, for asserting that a call reached the token.
    pub fn transfer_count(&self) -> u64 {
        self.state.borrow().transfer_count
    }

    fn move_funds(
        state: &mut BankState,
        asset: AssetId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let available = state.balances.get(&(asset, from)).copied().unwrap_or(0);
        if available < amount {
            return Err(TransferError::InsufficientFunds {
                asset,
                holder: from,
                available,
                requested: amount,
            });
        }
        state.balances.insert((asset, from), available - amount);
        *state.balances.entry((asset, to)).or_insert(0) += amount;
        state.transfer_count += 1;
        Ok(())
    }
}

impl AssetTransfer for MemoryBank {
    fn allowance(&self, asset: AssetId, owner: AccountId, spender: AccountId) -> Amount {
        self.state
            .borrow()
            .allowances
            .get(&(asset, owner, spender))
            .copied()
            .unwrap_or(0)
    }

    fn balance_of(&self, asset: AssetId, owner: AccountId) -> Amount {
        self.state
            .borrow()
            .balances
            .get(&(asset, owner))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(
        &mut self,
        asset: AssetId,
        caller: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let mut state = self.state.borrow_mut();
        Self::move_funds(&mut state, asset, caller, to, amount)
    }

    fn transfer_from(
        &mut self,
        asset: AssetId,
        caller: AccountId,
        from: AccountId,
        to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        let mut state = self.state.borrow_mut();
        let key = (asset, from, caller);
        let allowed = state.allowances.get(&key).copied().unwrap_or(0);
        if allowed < amount {
            return Err(TransferError::AllowanceExceeded {
                asset,
                owner: from,
                spender: caller,
                allowed,
                requested: amount,
            });
        }
        Self::move_funds(&mut state, asset, from, to, amount)?;
        state.allowances.insert(key, allowed - amount);
        Ok(())
    }
}
