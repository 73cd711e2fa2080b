extern crate alloc;

use crate as pallet_lending_migrator;
use crate::{
  Amount, AtomicityMode, DestinationProtocol, MigrationOp, MigrationOpOf, OutcomeOf, Session,
  SourceProtocol,
};
use alloc::vec::Vec;
use polkadot_sdk::frame_support::traits::fungibles::{Inspect, Mutate};
use polkadot_sdk::frame_support::traits::tokens::{Fortitude, Precision, Preservation};
use polkadot_sdk::frame_support::{
  BoundedVec, PalletId, construct_runtime, derive_impl,
  traits::{ConstU32, ConstU128, Get},
};
use polkadot_sdk::frame_system;
use polkadot_sdk::sp_runtime::{
  BuildStorage, DispatchError,
  testing::H256,
  traits::{BlakeTwo256, IdentityLookup},
};
use primitives::ecosystem::params::{DEFAULT_PROTOCOL_MODE, MAX_MIGRATION_OPERATIONS};
use std::cell::RefCell;

pub const ALICE: u64 = 1;
pub const BOB: u64 = 2;
pub const SOURCE_RESERVE: u64 = 100;
pub const DESTINATION_POOL: u64 = 200;

/// Source protocol receipt token, redeemable for `UNDERLYING`
pub const RECEIPT: u32 = 10;
pub const UNDERLYING: u32 = 20;
/// Destination protocol receipt token
pub const DEST_RECEIPT: u32 = 30;
/// Registered asset neither protocol lists
pub const UNKNOWN: u32 = 40;

pub const INITIAL_RECEIPT: u128 = 1_000;
pub const RESERVE_UNDERLYING: u128 = 10_000_000;

thread_local! {
    /// Underlying paid per receipt token, as (numerator, denominator)
    pub static SOURCE_RATE: RefCell<(u128, u128)> = const { RefCell::new((1, 1)) };
    pub static SOURCE_PAUSED: RefCell<bool> = const { RefCell::new(false) };
    /// Underlying the source keeps back while still reporting the full amount
    pub static SOURCE_SKIM: RefCell<u128> = const { RefCell::new(0) };
    /// Receipts the source leaves unburned on each redemption
    pub static SOURCE_BURN_SHORT: RefCell<u128> = const { RefCell::new(0) };
    pub static DESTINATION_PAUSED: RefCell<bool> = const { RefCell::new(false) };
    /// Underlying the destination leaves undrawn on each deposit
    pub static DESTINATION_SHORTFALL: RefCell<u128> = const { RefCell::new(0) };
    /// Caller the destination re-enters the executor as during its next deposit
    pub static REENTER_AS: RefCell<Option<u64>> = const { RefCell::new(None) };
    pub static NESTED_OUTCOME: RefCell<Option<OutcomeOf<Test>>> = const { RefCell::new(None) };
    pub static LAST_MODE: RefCell<Option<u16>> = const { RefCell::new(None) };
    pub static PROTOCOL_MODE: RefCell<u16> = const { RefCell::new(DEFAULT_PROTOCOL_MODE) };
}

pub fn set_source_rate(numerator: u128, denominator: u128) {
  SOURCE_RATE.with(|r| *r.borrow_mut() = (numerator, denominator));
}

pub fn pause_source(paused: bool) {
  SOURCE_PAUSED.with(|p| *p.borrow_mut() = paused);
}

pub fn set_source_skim(amount: u128) {
  SOURCE_SKIM.with(|s| *s.borrow_mut() = amount);
}

pub fn set_source_burn_short(amount: u128) {
  SOURCE_BURN_SHORT.with(|s| *s.borrow_mut() = amount);
}

pub fn set_destination_shortfall(amount: u128) {
  DESTINATION_SHORTFALL.with(|s| *s.borrow_mut() = amount);
}

pub fn pause_destination(paused: bool) {
  DESTINATION_PAUSED.with(|p| *p.borrow_mut() = paused);
}

pub fn reenter_as(who: u64) {
  REENTER_AS.with(|r| *r.borrow_mut() = Some(who));
}

pub fn nested_outcome() -> Option<OutcomeOf<Test>> {
  NESTED_OUTCOME.with(|o| o.borrow().clone())
}

pub fn last_mode() -> Option<u16> {
  LAST_MODE.with(|m| *m.borrow())
}

pub fn set_protocol_mode(mode: u16) {
  PROTOCOL_MODE.with(|m| *m.borrow_mut() = mode);
}

type Block = frame_system::mocking::MockBlock<Test>;

construct_runtime!(
  pub struct Test {
    System: frame_system,
    Balances: polkadot_sdk::pallet_balances,
    Assets: polkadot_sdk::pallet_assets,
    LendingMigrator: pallet_lending_migrator,
  }
);

#[derive_impl(frame_system::config_preludes::TestDefaultConfig)]
impl frame_system::Config for Test {
  type Block = Block;
  type AccountId = u64;
  type Lookup = IdentityLookup<Self::AccountId>;
  type Hash = H256;
  type Hashing = BlakeTwo256;
  type AccountData = polkadot_sdk::pallet_balances::AccountData<u128>;
}

impl polkadot_sdk::pallet_balances::Config for Test {
  type MaxLocks = ();
  type MaxReserves = ();
  type ReserveIdentifier = [u8; 8];
  type Balance = u128;
  type DustRemoval = ();
  type RuntimeEvent = RuntimeEvent;
  type ExistentialDeposit = ConstU128<1>;
  type AccountStore = System;
  type WeightInfo = ();
  type FreezeIdentifier = ();
  type MaxFreezes = ();
  type RuntimeHoldReason = ();
  type RuntimeFreezeReason = ();
  type DoneSlashHandler = ();
}

impl polkadot_sdk::pallet_assets::Config for Test {
  type RuntimeEvent = RuntimeEvent;
  type Balance = u128;
  type AssetId = u32;
  type AssetIdParameter = u32;
  type Currency = Balances;
  type CreateOrigin = polkadot_sdk::frame_support::traits::AsEnsureOriginWithArg<
    frame_system::EnsureSigned<Self::AccountId>,
  >;
  type ForceOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type AssetDeposit = ConstU128<1>;
  type AssetAccountDeposit = ConstU128<1>;
  type MetadataDepositBase = ConstU128<1>;
  type MetadataDepositPerByte = ConstU128<1>;
  type ApprovalDeposit = ConstU128<1>;
  type StringLimit = ConstU32<50>;
  type Freezer = ();
  type Extra = ();
  type CallbackHandle = ();
  type WeightInfo = ();
  type RemoveItemsLimit = ConstU32<5>;
  type Holder = ();
  type ReserveData = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = ();
}

/// Source protocol that burns receipts and pays out of `SOURCE_RESERVE`
pub struct MockSource;
impl SourceProtocol<u64, u32, u128> for MockSource {
  fn underlying_of(receipt_asset: u32) -> Option<u32> {
    (receipt_asset == RECEIPT).then_some(UNDERLYING)
  }

  fn withdraw(
    holder: &u64,
    receipt_asset: u32,
    amount: u128,
    recipient: &u64,
  ) -> Result<u128, DispatchError> {
    if SOURCE_PAUSED.with(|p| *p.borrow()) {
      return Err(DispatchError::Other("source paused"));
    }
    let underlying_asset =
      Self::underlying_of(receipt_asset).ok_or(DispatchError::Other("unknown receipt"))?;
    let (numerator, denominator) = SOURCE_RATE.with(|r| *r.borrow());
    let underlying = amount * numerator / denominator;
    let skim = SOURCE_SKIM.with(|s| *s.borrow());
    let burn_short = SOURCE_BURN_SHORT.with(|s| *s.borrow());

    <Assets as Mutate<u64>>::burn_from(
      receipt_asset,
      holder,
      amount.saturating_sub(burn_short),
      Preservation::Expendable,
      Precision::Exact,
      Fortitude::Polite,
    )?;
    <Assets as Mutate<u64>>::transfer(
      underlying_asset,
      &SOURCE_RESERVE,
      recipient,
      underlying.saturating_sub(skim),
      Preservation::Expendable,
    )?;

    Ok(underlying)
  }
}

/// Destination protocol that draws deposits into `DESTINATION_POOL` and mints
/// `DEST_RECEIPT` one to one
pub struct MockDestination;
impl DestinationProtocol<u64, u32, u128> for MockDestination {
  fn supports(underlying_asset: u32) -> bool {
    underlying_asset == UNDERLYING
  }

  fn spender() -> u64 {
    DESTINATION_POOL
  }

  fn deposit(
    funder: &u64,
    underlying_asset: u32,
    amount: u128,
    beneficiary: &u64,
    mode: u16,
  ) -> Result<u128, DispatchError> {
    LAST_MODE.with(|m| *m.borrow_mut() = Some(mode));

    if let Some(who) = REENTER_AS.with(|r| r.borrow_mut().take()) {
      let mut nested = Session::new(
        who,
        alloc::vec![pull(RECEIPT, Amount::All)],
        AtomicityMode::AllOrNothing,
      );
      let outcome = LendingMigrator::execute(&mut nested);
      NESTED_OUTCOME.with(|o| *o.borrow_mut() = Some(outcome));
    }

    if DESTINATION_PAUSED.with(|p| *p.borrow()) {
      return Err(DispatchError::Other("destination paused"));
    }

    let drawn = amount.saturating_sub(DESTINATION_SHORTFALL.with(|s| *s.borrow()));
    <Assets as polkadot_sdk::frame_support::traits::fungibles::approvals::Mutate<u64>>::transfer_from(
      underlying_asset,
      funder,
      &DESTINATION_POOL,
      &DESTINATION_POOL,
      drawn,
    )?;
    <Assets as Mutate<u64>>::mint_into(DEST_RECEIPT, beneficiary, drawn)?;

    Ok(drawn)
  }
}

pub struct PalletIdStub;
impl Get<PalletId> for PalletIdStub {
  fn get() -> PalletId {
    PalletId(*primitives::ecosystem::pallet_ids::LENDING_MIGRATOR_PALLET_ID)
  }
}

pub struct ProtocolModeStub;
impl Get<u16> for ProtocolModeStub {
  fn get() -> u16 {
    PROTOCOL_MODE.with(|m| *m.borrow())
  }
}

#[cfg(feature = "runtime-benchmarks")]
pub struct MockBenchmarkHelper;

#[cfg(feature = "runtime-benchmarks")]
impl crate::BenchmarkHelper<u64, u32, u128> for MockBenchmarkHelper {
  fn setup_position(owner: &u64, amount: u128) -> Result<(u32, u32), DispatchError> {
    use polkadot_sdk::frame_support::traits::fungible::Mutate as NativeMutate;
    use polkadot_sdk::frame_support::traits::fungibles::approvals::Mutate as ApprovalsMutate;

    <Balances as NativeMutate<u64>>::mint_into(owner, 1_000)?;
    <Assets as Mutate<u64>>::mint_into(RECEIPT, owner, amount)?;
    <Assets as ApprovalsMutate<u64>>::approve(RECEIPT, owner, &LendingMigrator::account_id(), amount)?;
    Ok((RECEIPT, UNDERLYING))
  }
}

impl pallet_lending_migrator::Config for Test {
  type AssetId = u32;
  type Balance = u128;
  type Assets = Assets;
  type Source = MockSource;
  type Destination = MockDestination;
  type PalletId = PalletIdStub;
  type MaxOperations = ConstU32<MAX_MIGRATION_OPERATIONS>;
  type ProtocolMode = ProtocolModeStub;
  type AdminOrigin = frame_system::EnsureRoot<Self::AccountId>;
  type WeightInfo = ();
  #[cfg(feature = "runtime-benchmarks")]
  type BenchmarkHelper = MockBenchmarkHelper;
}

pub fn pull(asset: u32, amount: Amount<u128>) -> MigrationOpOf<Test> {
  MigrationOp::PullToken { asset, amount }
}

pub fn withdraw(receipt_asset: u32, amount: Amount<u128>) -> MigrationOpOf<Test> {
  MigrationOp::WithdrawSource {
    receipt_asset,
    amount,
    recipient: None,
  }
}

pub fn deposit(underlying_asset: u32, beneficiary: u64) -> MigrationOpOf<Test> {
  MigrationOp::DepositDestination {
    underlying_asset,
    beneficiary,
  }
}

/// Pull everything, redeem everything, deposit everything for `who`
pub fn full_migration(who: u64) -> Vec<MigrationOpOf<Test>> {
  alloc::vec![
    pull(RECEIPT, Amount::All),
    withdraw(RECEIPT, Amount::All),
    deposit(UNDERLYING, who),
  ]
}

pub fn bounded(
  operations: Vec<MigrationOpOf<Test>>,
) -> BoundedVec<MigrationOpOf<Test>, ConstU32<MAX_MIGRATION_OPERATIONS>> {
  operations.try_into().expect("batch within MaxOperations")
}

pub fn balance(asset: u32, who: u64) -> u128 {
  <Assets as Inspect<u64>>::balance(asset, &who)
}

/// Approve the executor to pull `amount` of `asset` from `who`
pub fn approve(who: u64, asset: u32, amount: u128) {
  Assets::approve_transfer(
    RuntimeOrigin::signed(who),
    asset,
    LendingMigrator::account_id(),
    amount,
  )
  .expect("approval succeeds");
}

pub fn new_test_ext() -> polkadot_sdk::sp_io::TestExternalities {
  let mut t = frame_system::GenesisConfig::<Test>::default()
    .build_storage()
    .unwrap();

  let executor = LendingMigrator::account_id();

  polkadot_sdk::pallet_balances::GenesisConfig::<Test> {
    balances: alloc::vec![
      (ALICE, 1_000),
      (BOB, 1_000),
      (SOURCE_RESERVE, 1_000),
      (DESTINATION_POOL, 1_000),
      // Covers the native deposit pallet-assets reserves for each approval
      (executor, 1_000),
    ],
    dev_accounts: None,
  }
  .assimilate_storage(&mut t)
  .unwrap();

  polkadot_sdk::pallet_assets::GenesisConfig::<Test> {
    assets: alloc::vec![
      (RECEIPT, SOURCE_RESERVE, true, 1),
      (UNDERLYING, SOURCE_RESERVE, true, 1),
      (DEST_RECEIPT, DESTINATION_POOL, true, 1),
      (UNKNOWN, SOURCE_RESERVE, true, 1),
    ],
    metadata: alloc::vec![],
    accounts: alloc::vec![
      (RECEIPT, ALICE, INITIAL_RECEIPT),
      (RECEIPT, BOB, INITIAL_RECEIPT),
      (UNDERLYING, SOURCE_RESERVE, RESERVE_UNDERLYING),
      (UNKNOWN, ALICE, INITIAL_RECEIPT),
    ],
    reserves: alloc::vec![],
    next_asset_id: None,
  }
  .assimilate_storage(&mut t)
  .unwrap();

  pallet_lending_migrator::GenesisConfig::<Test>::default()
    .assimilate_storage(&mut t)
    .unwrap();

  SOURCE_RATE.with(|r| *r.borrow_mut() = (1, 1));
  SOURCE_PAUSED.with(|p| *p.borrow_mut() = false);
  SOURCE_SKIM.with(|s| *s.borrow_mut() = 0);
  SOURCE_BURN_SHORT.with(|s| *s.borrow_mut() = 0);
  DESTINATION_PAUSED.with(|p| *p.borrow_mut() = false);
  DESTINATION_SHORTFALL.with(|s| *s.borrow_mut() = 0);
  REENTER_AS.with(|r| *r.borrow_mut() = None);
  NESTED_OUTCOME.with(|o| *o.borrow_mut() = None);
  LAST_MODE.with(|m| *m.borrow_mut() = None);
  PROTOCOL_MODE.with(|m| *m.borrow_mut() = DEFAULT_PROTOCOL_MODE);

  let mut ext: polkadot_sdk::sp_io::TestExternalities = t.into();
  ext.execute_with(|| System::set_block_number(1));
  ext
}
