//! Shared fixture: an engine wired to an in-memory bank, a mock oracle and a
//! constant product ETH/USDC pool.

#![allow(dead_code)]

use margin_core::*;

pub const ETH: AssetId = AssetId(1);
pub const USDC: AssetId = AssetId(2);
pub const ADMIN: AccountId = AccountId(1);
pub const ALICE: AccountId = AccountId(10);
pub const BOB: AccountId = AccountId(11);
pub const KEEPER: AccountId = AccountId(20);
pub const POOL_ADDRESS: AccountId = AccountId(500);

pub const PRICE_UNIT: u128 = 100_000_000;
pub const START: i64 = 1_700_000_000_000;
pub const LENDING_RESERVE: Amount = 50_000_000;
pub const POOL_ETH: Amount = 1_000_000_000;
pub const POOL_USDC: Amount = 2_000_000_000_000;

pub struct Harness {
    pub engine: Engine,
    pub pool: ConstantProductPool,
    pub bank: MemoryBank,
    pub oracle: MockOracle,
    pub custody: AccountId,
    pub lender: AccountId,
}

pub fn harness() -> Harness {
    harness_with(ProtocolConfig::default())
}

pub fn harness_with(config: ProtocolConfig) -> Harness {
    let bank = MemoryBank::new();
    let oracle = MockOracle::new();
    let metadata = MockMetadata::new()
        .with_symbol(ETH, "ETH")
        .with_symbol(USDC, "USDC");
    let custody = config.engine.custody_account;
    let lender = config.engine.lending_account;

    let mut engine = Engine::new(config, ADMIN, bank.clone(), oracle.clone(), metadata).unwrap();
    engine.set_time(Timestamp::from_millis(START));
    engine.set_risk_factor(ADMIN, ETH, Wad::ONE).unwrap();
    engine.set_risk_factor(ADMIN, USDC, Wad::ONE).unwrap();

    let mut pool = ConstantProductPool::new(PoolKey::new(ETH, USDC, Bps(0)), POOL_ADDRESS, bank.clone());
    pool.seed(POOL_ETH, POOL_USDC);

    let mut h = Harness {
        engine,
        pool,
        bank,
        oracle,
        custody,
        lender,
    };
    h.set_prices(2_000, 1);
    h.fund(lender, USDC, LENDING_RESERVE);
    h.engine.deposit(lender, USDC, LENDING_RESERVE).unwrap();
    h
}

impl Harness {
    /// Whole-dollar prices at the engine's current time.
    pub fn set_prices(&self, eth: u128, usdc: u128) {
        let now = self.engine.time();
        self.oracle.set_symbol_price("ETH", eth * PRICE_UNIT, now).unwrap();
        self.oracle.set_symbol_price("USDC", usdc * PRICE_UNIT, now).unwrap();
    }

    /// Mint into the wallet and approve custody for the same amount.
    pub fn fund(&self, account: AccountId, asset: AssetId, amount: Amount) {
        self.bank.mint(asset, account, amount);
        self.bank.approve(asset, account, self.custody, amount);
    }

    pub fn deposit(&mut self, account: AccountId, asset: AssetId, amount: Amount) {
        self.fund(account, asset, amount);
        self.engine.deposit(account, asset, amount).unwrap();
    }

    pub fn open(
        &mut self,
        account: AccountId,
        collateral: Amount,
        debt: Amount,
    ) -> Result<OpenResult, EngineError> {
        self.engine.open_margin_position(
            account,
            OpenPositionParams {
                initial_asset: ETH,
                debt_asset: USDC,
                collateral,
                debt,
            },
            &mut self.pool,
            SlippageLimits::none(),
        )
    }

    /// Custody's real token balance equals the ledger's pool total.
    pub fn custody_matches_ledger(&self, asset: AssetId) -> bool {
        self.bank.balance_of(asset, self.custody) == self.engine.pool_total(asset)
    }
}
