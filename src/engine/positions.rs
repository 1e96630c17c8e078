//! Position lifecycle: open, close, liquidate.
//!
//! Opening borrows the debt leg from the lending account, swaps collateral plus
//! debt into the initial asset and checks the resulting health factor. Closing
//! and liquidation swap the traded amount back and repay the lending account.

use super::core::Engine;
use super::results::{CloseResult, EngineError, LiquidationResult, OpenResult, SwapOutcome};
use super::settlement::SettlementGuard;
use crate::events::{EventPayload, LiquidationEvent, PositionClosedEvent, PositionOpenedEvent};
use crate::pool::{ExternalPool, SwapParams, SwapRequest};
use crate::position::{
    ensure_can_open, ensure_open, OpenPositionParams, Position, PositionError, SlippageLimits,
};
use crate::types::AccountId;

impl Engine {
    pub fn open_margin_position<P: ExternalPool>(
        &mut self,
        account: AccountId,
        params: OpenPositionParams,
        pool: &mut P,
        slippage: SlippageLimits,
    ) -> Result<OpenResult, EngineError> {
        self.transact("open_margin_position", |engine| {
            ensure_can_open(engine.positions.get(&account))?;
            if params.initial_asset == params.debt_asset {
                return Err(PositionError::SameAsset.into());
            }
            if params.collateral == 0 || params.debt == 0 {
                return Err(PositionError::EmptyPosition.into());
            }

            let key = pool.key();
            let zero_for_one = key
                .zero_for_one(params.debt_asset)
                .filter(|_| key.contains(params.initial_asset))
                .ok_or(PositionError::PoolMismatch {
                    initial: params.initial_asset,
                    debt: params.debt_asset,
                })?;

            // borrow the debt leg
            let lender = engine.config.engine.lending_account;
            let available = engine.ledger.balance_of(lender, params.debt_asset);
            if available < params.debt {
                return Err(PositionError::InsufficientLiquidity {
                    asset: params.debt_asset,
                    available,
                    requested: params.debt,
                }
                .into());
            }
            engine
                .ledger
                .transfer(lender, account, params.debt_asset, params.debt)?;

            let amount_in = params
                .collateral
                .checked_add(params.debt)
                .ok_or(EngineError::AmountOverflow)?;
            let mut position = Position::new(
                params.initial_asset,
                params.debt_asset,
                0,
                params.debt,
                params.collateral,
                engine.current_time,
            );
            let swap = engine.settle_swap(
                pool,
                SwapRequest {
                    key,
                    params: SwapParams {
                        zero_for_one,
                        amount_in,
                    },
                    account,
                    min_amount_out: slippage.min_amount_out,
                },
                SettlementGuard::OpenHealth {
                    position: position.clone(),
                },
            )?;
            position.traded_amount = swap.amount_out;

            let health_factor = engine.ensure_open_health(&position)?;

            engine.positions.insert(account, position.clone());
            tracing::info!(
                %account,
                traded_amount = position.traded_amount,
                debt = position.debt,
                health = %health_factor.to_decimal(),
                "position opened"
            );
            engine.emit_event(EventPayload::PositionOpened(PositionOpenedEvent {
                account,
                initial_asset: position.initial_asset,
                debt_asset: position.debt_asset,
                traded_amount: position.traded_amount,
                debt: position.debt,
                collateral: position.collateral,
                health_factor: health_factor.as_wad(),
            }));

            Ok(OpenResult {
                position,
                health_factor,
                swap,
            })
        })
    }

    // surplus over the debt stays with the account
    pub fn close_position<P: ExternalPool>(
        &mut self,
        account: AccountId,
        pool: &mut P,
        slippage: SlippageLimits,
    ) -> Result<CloseResult, EngineError> {
        self.transact("close_position", |engine| {
            let position = ensure_open(engine.positions.get(&account))?.clone();
            let guard = SettlementGuard::Repay {
                asset: position.debt_asset,
                debt: position.debt,
            };
            let swap = engine.unwind(account, &position, pool, slippage, guard)?;

            let lender = engine.config.engine.lending_account;
            engine
                .ledger
                .transfer(account, lender, position.debt_asset, position.debt)?;
            engine.positions.remove(&account);

            tracing::info!(%account, proceeds = swap.amount_out, debt = position.debt, "position closed");
            engine.emit_event(EventPayload::PositionClosed(PositionClosedEvent {
                account,
                proceeds: swap.amount_out,
                debt_repaid: position.debt,
            }));

            Ok(CloseResult {
                proceeds: swap.amount_out,
                debt_repaid: position.debt,
                swap,
            })
        })
    }

    /// Unwind an unhealthy position on behalf of `liquidator`.
    ///
    /// Repays as much debt as the account's debt-asset balance covers and books
    /// the rest as bad debt. The liquidator earns the configured bonus on the
    /// repaid amount, capped at what is left after repayment.
    pub fn liquidate<P: ExternalPool>(
        &mut self,
        liquidator: AccountId,
        account: AccountId,
        pool: &mut P,
        slippage: SlippageLimits,
    ) -> Result<LiquidationResult, EngineError> {
        self.transact("liquidate", |engine| {
            let position = ensure_open(engine.positions.get(&account))?.clone();

            let health = engine.health_of(&position)?;
            let threshold = engine.config.risk.liquidation_threshold;
            if !health.is_below(threshold) {
                return Err(PositionError::NotLiquidatable {
                    health: health.to_decimal(),
                    threshold: threshold.to_decimal(),
                }
                .into());
            }

            let swap = engine.unwind(account, &position, pool, slippage, SettlementGuard::None)?;

            let debt_asset = position.debt_asset;
            let lender = engine.config.engine.lending_account;
            let available = engine.ledger.balance_of(account, debt_asset);
            let debt_repaid = position.debt.min(available);
            let bad_debt = position.debt - debt_repaid;
            if debt_repaid > 0 {
                engine.ledger.transfer(account, lender, debt_asset, debt_repaid)?;
            }

            let surplus = available - debt_repaid;
            let incentive = engine
                .config
                .risk
                .liquidation_bonus
                .apply(debt_repaid)
                .ok_or(EngineError::AmountOverflow)?
                .min(surplus);
            if incentive > 0 {
                engine.ledger.transfer(account, liquidator, debt_asset, incentive)?;
            }

            engine.positions.remove(&account);

            if bad_debt > 0 {
                tracing::warn!(%account, bad_debt, "liquidation left bad debt");
            }
            tracing::info!(
                %account,
                %liquidator,
                health = %health.to_decimal(),
                debt_repaid,
                incentive,
                "position liquidated"
            );
            engine.emit_event(EventPayload::Liquidation(LiquidationEvent {
                account,
                liquidator,
                proceeds: swap.amount_out,
                debt_repaid,
                bad_debt,
                incentive,
            }));

            Ok(LiquidationResult {
                account,
                liquidator,
                proceeds: swap.amount_out,
                debt_repaid,
                bad_debt,
                incentive,
            })
        })
    }

    // traded amount back into the debt asset
    fn unwind<P: ExternalPool>(
        &mut self,
        account: AccountId,
        position: &Position,
        pool: &mut P,
        slippage: SlippageLimits,
        guard: SettlementGuard,
    ) -> Result<SwapOutcome, EngineError> {
        let key = pool.key();
        let zero_for_one = key
            .zero_for_one(position.initial_asset)
            .filter(|_| key.contains(position.debt_asset))
            .ok_or(PositionError::PoolMismatch {
                initial: position.initial_asset,
                debt: position.debt_asset,
            })?;

        self.settle_swap(
            pool,
            SwapRequest {
                key,
                params: SwapParams {
                    zero_for_one,
                    amount_in: position.traded_amount,
                },
                account,
                min_amount_out: slippage.min_amount_out,
            },
            guard,
        )
    }
}
