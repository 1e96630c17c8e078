//! Stress tests
//!
//! These tests run many accounts and repeated lifecycles through one engine to
//! verify the ledger stays consistent with custody under load.

mod common;

use common::*;
use margin_core::*;

/// Tests an oracle crash with a book of positions at different leverage.
mod cascade_tests {
    use super::*;

    #[test]
    fn oracle_crash_liquidates_the_weak_and_closes_the_rest() {
        let mut h = harness();
        let debt = 2_000_000;

        let mut traders = Vec::new();
        for i in 1..=10u64 {
            let trader = AccountId(100 + i);
            let collateral = 400_000 + i as u128 * 100_000;
            h.deposit(trader, USDC, collateral);
            h.open(trader, collateral, debt).unwrap();
            traders.push(trader);
        }
        assert_eq!(
            h.engine.balance_of(h.lender, USDC),
            LENDING_RESERVE - 10 * debt
        );

        h.engine.advance_time(1_000);
        h.set_prices(1_300, 1);

        let mut liquidated = 0;
        let mut total_bad_debt = 0;
        for &trader in &traders {
            let health = h.engine.position_health(trader).unwrap();
            if health.is_below(h.engine.config().risk.liquidation_threshold) {
                let result = h
                    .engine
                    .liquidate(KEEPER, trader, &mut h.pool, SlippageLimits::none())
                    .unwrap();
                total_bad_debt += result.bad_debt;
                liquidated += 1;
            } else {
                h.engine
                    .close_position(trader, &mut h.pool, SlippageLimits::none())
                    .unwrap();
            }

            assert!(h.engine.ledger().is_consistent());
            assert!(h.custody_matches_ledger(ETH));
            assert!(h.custody_matches_ledger(USDC));
        }

        // the pool still trades at $2,000, so unwinds cover every debt
        assert!(liquidated > 0 && liquidated < traders.len());
        assert_eq!(total_bad_debt, 0);
        assert_eq!(h.engine.balance_of(h.lender, USDC), LENDING_RESERVE);
        assert!(h.engine.balance_of(KEEPER, USDC) > 0);
        for &trader in &traders {
            assert_eq!(h.engine.position(trader), None);
            assert_eq!(h.engine.balance_of(trader, ETH), 0);
        }
    }
}

/// Tests repeated lifecycles on one account.
mod churn_tests {
    use super::*;

    #[test]
    fn repeated_open_close_returns_every_loan() {
        let mut h = harness();
        h.deposit(ALICE, USDC, 5_000_000);

        for _ in 0..20 {
            h.open(ALICE, 1_000_000, 2_000_000).unwrap();
            h.engine
                .close_position(ALICE, &mut h.pool, SlippageLimits::none())
                .unwrap();

            assert_eq!(h.engine.balance_of(h.lender, USDC), LENDING_RESERVE);
            assert_eq!(h.engine.position(ALICE), None);
            assert!(h.engine.ledger().is_consistent());
            assert!(h.custody_matches_ledger(USDC));
        }

        // round trips through a fee-free pool only lose rounding, at most one ETH unit each
        let left = h.engine.balance_of(ALICE, USDC);
        assert!(left <= 5_000_000);
        assert!(left > 5_000_000 - 20 * 2_100);
        h.engine.withdraw(ALICE, USDC, left).unwrap();
    }

    #[test]
    fn event_log_is_capped() {
        let mut config = ProtocolConfig::default();
        config.engine.max_events = 50;
        let mut h = harness_with(config);

        h.fund(ALICE, ETH, 1_000);
        for _ in 0..200 {
            h.engine.deposit(ALICE, ETH, 5).unwrap();
        }

        let events = h.engine.events();
        assert_eq!(events.len(), 50);
        // three setup events come first
        assert_eq!(events.last().map(|e| e.id), Some(EventId(203)));
        assert!(events.windows(2).all(|pair| pair[0].id < pair[1].id));
    }

    #[test]
    fn rejected_operations_do_not_consume_event_ids() {
        let mut h = harness();
        h.deposit(ALICE, ETH, 10);
        let last_id = h.engine.events().last().map(|e| e.id);

        for _ in 0..10 {
            assert!(h.engine.withdraw(ALICE, ETH, 11).is_err());
        }
        h.engine.withdraw(ALICE, ETH, 10).unwrap();

        let next = h.engine.events().last().map(|e| e.id.0);
        assert_eq!(next, last_id.map(|id| id.0 + 1));
    }
}
