//! Ledger solvency invariant tests.
//!
//! These tests verify that account balances always sum to the pool total and
//! that custody's real token holdings track the ledger.

mod common;

use common::*;
use margin_core::*;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Deposit { account: usize, asset: usize, amount: Amount },
    Withdraw { account: usize, asset: usize, amount: Amount },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..4usize, 0..2usize, 0..5_000u128)
            .prop_map(|(account, asset, amount)| Op::Deposit { account, asset, amount }),
        (0..4usize, 0..2usize, 0..5_000u128)
            .prop_map(|(account, asset, amount)| Op::Withdraw { account, asset, amount }),
    ]
}

const ACCOUNTS: [AccountId; 4] = [AccountId(10), AccountId(11), AccountId(12), AccountId(13)];
const ASSETS: [AssetId; 2] = [ETH, USDC];

proptest! {
    /// Balances sum to the pool total between every pair of operations.
    #[test]
    fn balances_sum_to_pool_total(ops in proptest::collection::vec(op_strategy(), 1..60)) {
        let mut h = harness();
        for account in ACCOUNTS {
            for asset in ASSETS {
                h.fund(account, asset, 1_000_000);
            }
        }

        for op in ops {
            let _ = match op {
                Op::Deposit { account, asset, amount } => {
                    h.engine.deposit(ACCOUNTS[account], ASSETS[asset], amount)
                }
                Op::Withdraw { account, asset, amount } => {
                    h.engine.withdraw(ACCOUNTS[account], ASSETS[asset], amount)
                }
            };

            prop_assert!(h.engine.ledger().is_consistent());
            for asset in ASSETS {
                prop_assert_eq!(
                    h.engine.ledger().sum_of_balances(asset),
                    Some(h.engine.pool_total(asset))
                );
                prop_assert!(h.custody_matches_ledger(asset));
            }
        }
    }

    /// Zero amounts fail regardless of prior state.
    #[test]
    fn zero_amounts_always_rejected(prior in 0..10_000u128) {
        let mut h = harness();
        h.fund(ALICE, ETH, 10_000);
        if prior > 0 {
            h.engine.deposit(ALICE, ETH, prior).unwrap();
        }

        prop_assert_eq!(
            h.engine.deposit(ALICE, ETH, 0),
            Err(EngineError::Ledger(LedgerError::ZeroAmount))
        );
        prop_assert_eq!(
            h.engine.withdraw(ALICE, ETH, 0),
            Err(EngineError::Ledger(LedgerError::ZeroAmount))
        );
    }

    /// Withdraw fails above the balance and debits exactly otherwise.
    #[test]
    fn withdraw_respects_balance(balance in 1..10_000u128, request in 1..20_000u128) {
        let mut h = harness();
        h.deposit(ALICE, ETH, balance);
        let transfers_before = h.bank.transfer_count();

        let result = h.engine.withdraw(ALICE, ETH, request);
        if request > balance {
            let is_treasury_error = matches!(
                result,
                Err(EngineError::Ledger(LedgerError::InsufficientTreasury { .. }))
            );
            prop_assert!(is_treasury_error);
            prop_assert_eq!(h.engine.balance_of(ALICE, ETH), balance);
            prop_assert_eq!(h.bank.transfer_count(), transfers_before);
        } else {
            prop_assert!(result.is_ok());
            prop_assert_eq!(h.engine.balance_of(ALICE, ETH), balance - request);
            prop_assert_eq!(h.bank.balance_of(ETH, ALICE), request);
            prop_assert_eq!(h.bank.transfer_count(), transfers_before + 1);
        }
    }
}

#[test]
fn deposit_then_withdraw_restores_initial_state() {
    let mut h = harness();
    let before = h.engine.ledger().clone();
    h.fund(ALICE, ETH, 1_000);

    h.engine.deposit(ALICE, ETH, 1_000).unwrap();
    assert_eq!(h.engine.balance_of(ALICE, ETH), 1_000);
    assert_eq!(h.engine.pool_total(ETH), 1_000);

    h.engine.withdraw(ALICE, ETH, 1_000).unwrap();
    assert_eq!(h.engine.balance_of(ALICE, ETH), 0);
    assert_eq!(h.engine.pool_total(ETH), 0);
    assert_eq!(h.bank.balance_of(ETH, ALICE), 1_000);

    // zero entries remain in the maps, the observable balances match
    for account in [ALICE, h.lender] {
        for asset in [ETH, USDC] {
            assert_eq!(
                h.engine.balance_of(account, asset),
                before.balance_of(account, asset)
            );
        }
    }
}

#[test]
fn deposit_and_withdraw_emit_events() {
    let mut h = harness();
    let before = h.engine.events().len();
    h.deposit(ALICE, USDC, 700);
    h.engine.withdraw(ALICE, USDC, 300).unwrap();

    let events = h.engine.recent_events(2);
    assert_eq!(h.engine.events().len(), before + 2);
    assert_eq!(
        events[0].payload,
        EventPayload::Deposit(DepositEvent {
            account: ALICE,
            asset: USDC,
            amount: 700
        })
    );
    assert_eq!(
        events[1].payload,
        EventPayload::Withdraw(WithdrawEvent {
            account: ALICE,
            asset: USDC,
            amount: 300
        })
    );
}

#[test]
fn failed_deposit_leaves_no_trace() {
    let mut h = harness();
    h.bank.mint(ETH, ALICE, 500);
    let events_before = h.engine.events().len();

    // no allowance yet
    let err = h.engine.deposit(ALICE, ETH, 500).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Ledger(LedgerError::InsufficientAllowance { allowed: 0, .. })
    ));

    h.bank.approve(ETH, ALICE, h.custody, 1_000);
    let err = h.engine.deposit(ALICE, ETH, 1_000).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Ledger(LedgerError::InsufficientBalance { available: 500, .. })
    ));

    assert_eq!(h.engine.pool_total(ETH), 0);
    assert_eq!(h.engine.events().len(), events_before);
}

/// Token that accepts the call but always refuses to move funds.
struct FrozenToken;

impl AssetTransfer for FrozenToken {
    fn allowance(&self, _asset: AssetId, _owner: AccountId, _spender: AccountId) -> Amount {
        Amount::MAX
    }

    fn balance_of(&self, _asset: AssetId, _owner: AccountId) -> Amount {
        Amount::MAX
    }

    fn transfer(
        &mut self,
        asset: AssetId,
        caller: AccountId,
        _to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        Err(TransferError::InsufficientFunds {
            asset,
            holder: caller,
            available: 0,
            requested: amount,
        })
    }

    fn transfer_from(
        &mut self,
        asset: AssetId,
        _caller: AccountId,
        from: AccountId,
        _to: AccountId,
        amount: Amount,
    ) -> Result<(), TransferError> {
        Err(TransferError::InsufficientFunds {
            asset,
            holder: from,
            available: 0,
            requested: amount,
        })
    }
}

#[test]
fn token_failure_rolls_back_ledger_credit() {
    let mut engine = Engine::new(
        ProtocolConfig::default(),
        ADMIN,
        FrozenToken,
        MockOracle::new(),
        MockMetadata::new(),
    )
    .unwrap();

    // checks pass, the credit lands, then transfer_from fails
    let err = engine.deposit(ALICE, ETH, 100).unwrap_err();
    assert!(matches!(err, EngineError::Ledger(LedgerError::Transfer(_))));
    assert_eq!(engine.balance_of(ALICE, ETH), 0);
    assert_eq!(engine.pool_total(ETH), 0);
    assert!(engine.events().is_empty());
}
