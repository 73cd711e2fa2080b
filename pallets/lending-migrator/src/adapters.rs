//! Adapter traits for the lending migrator
//!
//! The two lending protocols are opaque to the pallet. A runtime wires each one in by
//! implementing the narrow capability the executor needs from it.

use frame::prelude::*;

/// Source lending protocol: redeems receipt tokens for the underlying asset.
pub trait SourceProtocol<AccountId, AssetId, Balance> {
  /// Underlying asset redeemed by `receipt_asset`, or `None` when the source protocol
  /// does not list it.
  fn underlying_of(receipt_asset: AssetId) -> Option<AssetId>;

  /// Redeem `amount` receipt tokens held by `holder`, paying the underlying to
  /// `recipient`. Returns the underlying amount paid out.
  ///
  /// The receipt-to-underlying rate is the protocol's business; callers must not
  /// assume it is fixed.
  fn withdraw(
    holder: &AccountId,
    receipt_asset: AssetId,
    amount: Balance,
    recipient: &AccountId,
  ) -> Result<Balance, DispatchError>;
}

/// Destination lending protocol: takes the underlying asset and credits a position.
pub trait DestinationProtocol<AccountId, AssetId, Balance> {
  /// Whether the destination protocol accepts deposits of `underlying_asset`
  fn supports(underlying_asset: AssetId) -> bool;

  /// Account that draws the deposit from the funder. The executor approves it for the
  /// deposit amount before calling `deposit`.
  fn spender() -> AccountId;

  /// Deposit `amount` of `underlying_asset` taken from `funder`, crediting
  /// `beneficiary`. `mode` is passed through from runtime configuration untouched.
  /// Returns the receipt amount credited.
  fn deposit(
    funder: &AccountId,
    underlying_asset: AssetId,
    amount: Balance,
    beneficiary: &AccountId,
    mode: u16,
  ) -> Result<Balance, DispatchError>;
}

/// No-op `SourceProtocol`: lists no assets.
impl<AccountId, AssetId, Balance> SourceProtocol<AccountId, AssetId, Balance> for () {
  fn underlying_of(_: AssetId) -> Option<AssetId> {
    None
  }

  fn withdraw(_: &AccountId, _: AssetId, _: Balance, _: &AccountId) -> Result<Balance, DispatchError> {
    Err(DispatchError::Other("SourceProtocol not configured"))
  }
}

/// No-op `DestinationProtocol`: supports no assets.
impl<AccountId: Default, AssetId, Balance> DestinationProtocol<AccountId, AssetId, Balance> for () {
  fn supports(_: AssetId) -> bool {
    false
  }

  fn spender() -> AccountId {
    AccountId::default()
  }

  fn deposit(
    _: &AccountId,
    _: AssetId,
    _: Balance,
    _: &AccountId,
    _: u16,
  ) -> Result<Balance, DispatchError> {
    Err(DispatchError::Other("DestinationProtocol not configured"))
  }
}
