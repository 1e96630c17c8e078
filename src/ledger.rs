//! Collateral ledger.
//!
//! Per-account, per-asset balances plus an aggregate pool total per asset. The two
//! maps only ever move together: every credit or debit touches the account entry
//! and the pool total in the same call, so for every asset the account balances
//! sum to the pool total.
//!
//! `deposit` and `withdraw` talk to the external token. Both mutate the ledger
//! before calling out, and neither undoes its own mutation when the token call
//! fails: the enclosing engine transaction owns rollback.

use std::collections::HashMap;

use crate::token::{AssetTransfer, TransferError};
use crate::types::{AccountId, Amount, AssetId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("Amount must be non-zero")]
    ZeroAmount,

    #[error("Insufficient allowance: {account} approved {allowed} of {asset}, needs {requested}")]
    InsufficientAllowance {
        account: AccountId,
        asset: AssetId,
        allowed: Amount,
        requested: Amount,
    },

    #[error("Insufficient balance: {account} holds {available} of {asset}, needs {requested}")]
    InsufficientBalance {
        account: AccountId,
        asset: AssetId,
        available: Amount,
        requested: Amount,
    },

    #[error("Insufficient treasury: {account} has {available} of {asset} in the ledger, needs {requested}")]
    InsufficientTreasury {
        account: AccountId,
        asset: AssetId,
        available: Amount,
        requested: Amount,
    },

    #[error("Ledger overflow crediting {asset}")]
    Overflow { asset: AssetId },

    #[error("Token transfer failed: {0}")]
    Transfer(#[from] TransferError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    balances: HashMap<(AccountId, AssetId), Amount>,
    pool_totals: HashMap<AssetId, Amount>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, account: AccountId, asset: AssetId) -> Amount {
        self.balances.get(&(account, asset)).copied().unwrap_or(0)
    }

    pub fn pool_total(&self, asset: AssetId) -> Amount {
        self.pool_totals.get(&asset).copied().unwrap_or(0)
    }

    /// Pull `amount` of `asset` from `account` into custody.
    ///
    /// Checks the token's allowance and balance first, credits the ledger, then
    /// calls `transfer_from`.
    pub fn deposit(
        &mut self,
        token: &mut dyn AssetTransfer,
        custody: AccountId,
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        let allowed = token.allowance(asset, account, custody);
        if allowed < amount {
            return Err(LedgerError::InsufficientAllowance {
                account,
                asset,
                allowed,
                requested: amount,
            });
        }

        let available = token.balance_of(asset, account);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                account,
                asset,
                available,
                requested: amount,
            });
        }

        self.credit(account, asset, amount)?;
        token.transfer_from(asset, custody, account, custody, amount)?;
        Ok(())
    }

    /// Release `amount` of `asset` from custody back to `account`.
    ///
    /// Debits the ledger, then calls `transfer`.
    pub fn withdraw(
        &mut self,
        token: &mut dyn AssetTransfer,
        custody: AccountId,
        account: AccountId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if amount == 0 {
            return Err(LedgerError::ZeroAmount);
        }

        self.debit(account, asset, amount)?;
        token.transfer(asset, custody, account, amount)?;
        Ok(())
    }

    /// Add to an account and the pool total together.
    pub fn credit(&mut self, account: AccountId, asset: AssetId, amount: Amount) -> Result<(), LedgerError> {
        let balance = self.balance_of(account, asset);
        let total = self.pool_total(asset);
        let new_balance = balance.checked_add(amount).ok_or(LedgerError::Overflow { asset })?;
        let new_total = total.checked_add(amount).ok_or(LedgerError::Overflow { asset })?;

        self.balances.insert((account, asset), new_balance);
        self.pool_totals.insert(asset, new_total);
        tracing::debug!(%account, %asset, amount, new_balance, "ledger credit");
        Ok(())
    }

    /// Remove from an account and the pool total together.
    pub fn debit(&mut self, account: AccountId, asset: AssetId, amount: Amount) -> Result<(), LedgerError> {
        let balance = self.balance_of(account, asset);
        if amount > balance {
            return Err(LedgerError::InsufficientTreasury {
                account,
                asset,
                available: balance,
                requested: amount,
            });
        }

        // pool total >= any single balance while the sum invariant holds
        let total = self.pool_total(asset);
        self.balances.insert((account, asset), balance - amount);
        self.pool_totals.insert(asset, total - amount);
        tracing::debug!(%account, %asset, amount, new_balance = balance - amount, "ledger debit");
        Ok(())
    }

    /// Move a ledger balance between accounts. The pool total does not change.
    pub fn transfer(
        &mut self,
        from: AccountId,
        to: AccountId,
        asset: AssetId,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let from_balance = self.balance_of(from, asset);
        if amount > from_balance {
            return Err(LedgerError::InsufficientTreasury {
                account: from,
                asset,
                available: from_balance,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }

        let to_balance = self
            .balance_of(to, asset)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow { asset })?;
        self.balances.insert((from, asset), from_balance - amount);
        self.balances.insert((to, asset), to_balance);
        tracing::debug!(%from, %to, %asset, amount, "ledger transfer");
        Ok(())
    }

    /// Sum of account balances for `asset`, None if it overflows.
    pub fn sum_of_balances(&self, asset: AssetId) -> Option<Amount> {
        self.balances
            .iter()
            .filter(|((_, a), _)| *a == asset)
            .try_fold(0u128, |acc, (_, v)| acc.checked_add(*v))
    }

    /// True when every asset's balances sum exactly to its pool total.
    pub fn is_consistent(&self) -> bool {
        let mut assets: Vec<AssetId> = self.pool_totals.keys().copied().collect();
        assets.extend(self.balances.keys().map(|(_, asset)| *asset));
        assets.sort();
        assets.dedup();

        assets
            .into_iter()
            .all(|asset| self.sum_of_balances(asset) == Some(self.pool_total(asset)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::MemoryBank;

    const ETH: AssetId = AssetId(1);
    const USDC: AssetId = AssetId(2);
    const ALICE: AccountId = AccountId(1);
    const BOB: AccountId = AccountId(2);
    const CUSTODY: AccountId = AccountId(999);

    fn funded_bank(amount: Amount) -> MemoryBank {
        let bank = MemoryBank::new();
        bank.mint(ETH, ALICE, amount);
        bank.approve(ETH, ALICE, CUSTODY, amount);
        bank
    }

    #[test]
    fn deposit_then_withdraw_restores_state() {
        let mut bank = funded_bank(1_000);
        let mut ledger = Ledger::new();

        ledger.deposit(&mut bank, CUSTODY, ALICE, ETH, 1_000).unwrap();
        assert_eq!(ledger.balance_of(ALICE, ETH), 1_000);
        assert_eq!(ledger.pool_total(ETH), 1_000);
        assert_eq!(bank.balance_of(ETH, CUSTODY), 1_000);

        ledger.withdraw(&mut bank, CUSTODY, ALICE, ETH, 1_000).unwrap();
        assert_eq!(ledger.balance_of(ALICE, ETH), 0);
        assert_eq!(ledger.pool_total(ETH), 0);
        assert_eq!(bank.balance_of(ETH, ALICE), 1_000);
        assert!(ledger.is_consistent());
    }

    #[test]
    fn zero_amounts_rejected() {
        let mut bank = funded_bank(10);
        let mut ledger = Ledger::new();

        assert_eq!(
            ledger.deposit(&mut bank, CUSTODY, ALICE, ETH, 0),
            Err(LedgerError::ZeroAmount)
        );
        ledger.deposit(&mut bank, CUSTODY, ALICE, ETH, 10).unwrap();
        assert_eq!(
            ledger.withdraw(&mut bank, CUSTODY, ALICE, ETH, 0),
            Err(LedgerError::ZeroAmount)
        );
    }

    #[test]
    fn deposit_checks_allowance_before_balance() {
        let mut bank = MemoryBank::new();
        bank.mint(ETH, ALICE, 50);
        let mut ledger = Ledger::new();

        let err = ledger.deposit(&mut bank, CUSTODY, ALICE, ETH, 100).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAllowance { allowed: 0, .. }));

        bank.approve(ETH, ALICE, CUSTODY, 100);
        let err = ledger.deposit(&mut bank, CUSTODY, ALICE, ETH, 100).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { available: 50, .. }));

        // precondition failures never touch the ledger or the token
        assert_eq!(ledger.pool_total(ETH), 0);
        assert_eq!(bank.transfer_count(), 0);
    }

    #[test]
    fn withdraw_more_than_balance() {
        let mut bank = funded_bank(100);
        let mut ledger = Ledger::new();
        ledger.deposit(&mut bank, CUSTODY, ALICE, ETH, 100).unwrap();

        let err = ledger.withdraw(&mut bank, CUSTODY, ALICE, ETH, 101).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientTreasury { available: 100, requested: 101, .. }
        ));
        assert_eq!(ledger.balance_of(ALICE, ETH), 100);
    }

    #[test]
    fn internal_transfer_keeps_pool_total() {
        let mut ledger = Ledger::new();
        ledger.credit(ALICE, USDC, 500).unwrap();

        ledger.transfer(ALICE, BOB, USDC, 200).unwrap();
        assert_eq!(ledger.balance_of(ALICE, USDC), 300);
        assert_eq!(ledger.balance_of(BOB, USDC), 200);
        assert_eq!(ledger.pool_total(USDC), 500);
        assert!(ledger.is_consistent());

        let err = ledger.transfer(BOB, ALICE, USDC, 201).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientTreasury { .. }));
    }

    #[test]
    fn credit_overflow_is_an_error() {
        let mut ledger = Ledger::new();
        ledger.credit(ALICE, USDC, u128::MAX).unwrap();
        assert_eq!(
            ledger.credit(BOB, USDC, 1),
            Err(LedgerError::Overflow { asset: USDC })
        );
        assert_eq!(ledger.balance_of(BOB, USDC), 0);
    }
}
