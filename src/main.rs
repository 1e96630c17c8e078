//! Margin protocol core simulation.
//!
//! Runs scripted scenarios against the in-memory bank, mock oracle and the
//! constant product pool: collateral round trip, direct swap settlement, a
//! leveraged position opened and closed, and a liquidation after a price drop.

use std::error::Error;

use margin_core::*;
use tracing_subscriber::EnvFilter;

const ETH: AssetId = AssetId(1);
const USDC: AssetId = AssetId(2);
const ADMIN: AccountId = AccountId(1);
const ALICE: AccountId = AccountId(10);
const BOB: AccountId = AccountId(11);
const KEEPER: AccountId = AccountId(20);
const POOL_ADDRESS: AccountId = AccountId(500);

// oracle prices carry 8 decimals
const PRICE_UNIT: u128 = 100_000_000;
const START: i64 = 1_700_000_000_000;

struct Sim {
    engine: Engine,
    pool: ConstantProductPool,
    bank: MemoryBank,
    oracle: MockOracle,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("margin_core=info")),
        )
        .init();

    println!("Margin Protocol Core Simulation\n");

    scenario_1_collateral_round_trip()?;
    scenario_2_swap_settlement()?;
    scenario_3_position_lifecycle()?;
    scenario_4_liquidation()?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

fn setup() -> Result<Sim, Box<dyn Error>> {
    let bank = MemoryBank::new();
    let oracle = MockOracle::new();
    let metadata = MockMetadata::new()
        .with_symbol(ETH, "ETH")
        .with_symbol(USDC, "USDC");

    let config = Environment::Development.config();
    let custody = config.engine.custody_account;
    let lender = config.engine.lending_account;

    let mut engine = Engine::new(config, ADMIN, bank.clone(), oracle.clone(), metadata)?;
    engine.set_time(Timestamp::from_millis(START));
    engine.set_risk_factor(ADMIN, ETH, Wad::ONE)?;
    engine.set_risk_factor(ADMIN, USDC, Wad::ONE)?;

    oracle.set_symbol_price("ETH", 2_000 * PRICE_UNIT, Timestamp::from_millis(START))?;
    oracle.set_symbol_price("USDC", PRICE_UNIT, Timestamp::from_millis(START))?;

    let mut pool = ConstantProductPool::new(PoolKey::new(ETH, USDC, Bps(0)), POOL_ADDRESS, bank.clone());
    pool.seed(1_000_000_000, 2_000_000_000_000);

    // lending reserve
    bank.mint(USDC, lender, 50_000_000);
    bank.approve(USDC, lender, custody, 50_000_000);
    engine.deposit(lender, USDC, 50_000_000)?;

    for account in [ALICE, BOB] {
        bank.mint(USDC, account, 10_000_000);
        bank.approve(USDC, account, custody, 10_000_000);
    }

    Ok(Sim {
        engine,
        pool,
        bank,
        oracle,
    })
}

fn scenario_1_collateral_round_trip() -> Result<(), Box<dyn Error>> {
    println!("Scenario 1: Collateral Round Trip\n");
    let Sim { mut engine, bank, .. } = setup()?;

    engine.deposit(ALICE, USDC, 1_000)?;
    println!("  Alice deposits 1,000 USDC, ledger balance {}", engine.balance_of(ALICE, USDC));

    engine.withdraw(ALICE, USDC, 1_000)?;
    println!(
        "  Alice withdraws 1,000 USDC, ledger balance {}, wallet {}",
        engine.balance_of(ALICE, USDC),
        bank.balance_of(USDC, ALICE)
    );

    match engine.withdraw(ALICE, USDC, 1) {
        Err(e) => println!("  Over-withdraw rejected: {e}"),
        Ok(()) => println!("  Over-withdraw unexpectedly accepted"),
    }
    println!("  Ledger consistent: {}\n", engine.ledger().is_consistent());
    Ok(())
}

fn scenario_2_swap_settlement() -> Result<(), Box<dyn Error>> {
    println!("Scenario 2: Swap Settlement\n");
    let Sim {
        mut engine,
        mut pool,
        ..
    } = setup()?;

    engine.deposit(BOB, USDC, 2_000_000)?;
    let key = pool.key();
    let params = SwapParams {
        zero_for_one: false,
        amount_in: 2_000_000,
    };
    let quoted = pool.quote(&params);

    let outcome = engine.swap(
        &mut pool,
        SwapRequest {
            key,
            params,
            account: BOB,
            min_amount_out: quoted,
        },
    )?;
    println!(
        "  Bob swaps {} USDC for {} ETH (quoted {})",
        outcome.amount_in, outcome.amount_out, quoted
    );
    println!(
        "  Bob ledger: {} USDC, {} ETH",
        engine.balance_of(BOB, USDC),
        engine.balance_of(BOB, ETH)
    );

    let strict = SwapRequest {
        key,
        params,
        account: BOB,
        min_amount_out: u128::MAX,
    };
    match engine.swap(&mut pool, strict) {
        Err(e) => println!("  Strict slippage limit rejected: {e}"),
        Ok(_) => println!("  Strict slippage limit unexpectedly passed"),
    }
    println!("  Pool reserves after: {:?}\n", pool.reserves());
    Ok(())
}

fn scenario_3_position_lifecycle() -> Result<(), Box<dyn Error>> {
    println!("Scenario 3: Position Lifecycle\n");
    let Sim {
        mut engine,
        mut pool,
        ..
    } = setup()?;

    engine.deposit(ALICE, USDC, 1_000_000)?;
    let opened = engine.open_margin_position(
        ALICE,
        OpenPositionParams {
            initial_asset: ETH,
            debt_asset: USDC,
            collateral: 1_000_000,
            debt: 4_000_000,
        },
        &mut pool,
        SlippageLimits::none(),
    )?;
    println!(
        "  Alice opens {}x: {} ETH against {} USDC debt, health {}",
        opened.position.leverage().unwrap_or_default(),
        opened.position.traded_amount,
        opened.position.debt,
        opened.health_factor.to_decimal()
    );

    match engine.withdraw(ALICE, ETH, 1) {
        Err(e) => println!("  Withdrawing traded ETH rejected: {e}"),
        Ok(()) => println!("  Withdrawing traded ETH unexpectedly accepted"),
    }

    let closed = engine.close_position(ALICE, &mut pool, SlippageLimits::none())?;
    println!(
        "  Alice closes: proceeds {} USDC, repaid {}, left with {} USDC\n",
        closed.proceeds,
        closed.debt_repaid,
        engine.balance_of(ALICE, USDC)
    );
    Ok(())
}

fn scenario_4_liquidation() -> Result<(), Box<dyn Error>> {
    println!("Scenario 4: Liquidation\n");
    let Sim {
        mut engine,
        mut pool,
        oracle,
        bank,
    } = setup()?;

    engine.deposit(ALICE, USDC, 1_000_000)?;
    engine.open_margin_position(
        ALICE,
        OpenPositionParams {
            initial_asset: ETH,
            debt_asset: USDC,
            collateral: 1_000_000,
            debt: 4_000_000,
        },
        &mut pool,
        SlippageLimits::none(),
    )?;

    engine.advance_time(1_000);
    oracle.set_symbol_price("ETH", 1_500 * PRICE_UNIT, engine.time())?;
    oracle.set_symbol_price("USDC", PRICE_UNIT, engine.time())?;
    let health = engine.position_health(ALICE)?;
    println!("  ETH drops to $1,500, Alice health {}", health.to_decimal());

    let result = engine.liquidate(KEEPER, ALICE, &mut pool, SlippageLimits::none())?;
    println!(
        "  Keeper liquidates: repaid {}, bad debt {}, incentive {}",
        result.debt_repaid, result.bad_debt, result.incentive
    );
    println!(
        "  Keeper ledger {} USDC, custody holds {} USDC, ledger consistent: {}",
        engine.balance_of(KEEPER, USDC),
        bank.balance_of(USDC, engine.custody_account()),
        engine.ledger().is_consistent()
    );
    println!("  Events recorded: {}", engine.events().len());
    Ok(())
}
