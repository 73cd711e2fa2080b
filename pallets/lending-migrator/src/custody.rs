//! Asset custody adapter
//!
//! All token movements of the executor go through here. Custody means a balance on the
//! pallet-derived executor account; the session ledger says which part of that balance
//! belongs to the running session.

use core::marker::PhantomData;
use polkadot_sdk::{
  frame_support::traits::{
    fungibles::{Inspect, Mutate, approvals},
    tokens::Preservation,
  },
  sp_runtime::traits::{Saturating, Zero},
};

use crate::{Config, MigrationError, Pallet};

pub struct AssetCustody<T>(PhantomData<T>);

impl<T: Config> AssetCustody<T> {
  /// Pure balance read, used to resolve `Amount::All`
  pub fn balance_of(asset: T::AssetId, holder: &T::AccountId) -> T::Balance {
    <T::Assets as Inspect<T::AccountId>>::balance(asset, holder)
  }

  /// Remaining approval `owner` has granted the executor on `asset`
  pub fn allowance(asset: T::AssetId, owner: &T::AccountId) -> T::Balance {
    <T::Assets as approvals::Inspect<T::AccountId>>::allowance(
      asset,
      owner,
      &Pallet::<T>::account_id(),
    )
  }

  /// Remaining approval the executor has granted `spender` on `asset`
  pub fn approved(asset: T::AssetId, spender: &T::AccountId) -> T::Balance {
    <T::Assets as approvals::Inspect<T::AccountId>>::allowance(
      asset,
      &Pallet::<T>::account_id(),
      spender,
    )
  }

  /// Move `amount` from `owner` into custody against the owner's approval.
  ///
  /// Either the full amount moves or nothing does. Returns the amount that actually
  /// arrived on the executor account.
  pub fn pull(
    asset: T::AssetId,
    owner: &T::AccountId,
    amount: T::Balance,
  ) -> Result<T::Balance, MigrationError> {
    if Self::allowance(asset, owner) < amount {
      return Err(MigrationError::InsufficientAllowance);
    }
    if Self::balance_of(asset, owner) < amount {
      return Err(MigrationError::InsufficientBalance);
    }

    let executor = Pallet::<T>::account_id();
    let before = Self::balance_of(asset, &executor);
    <T::Assets as approvals::Mutate<T::AccountId>>::transfer_from(
      asset, owner, &executor, &executor, amount,
    )?;

    Ok(Self::balance_of(asset, &executor).saturating_sub(before))
  }

  /// Move `amount` out of custody to `recipient`
  pub fn push(
    asset: T::AssetId,
    recipient: &T::AccountId,
    amount: T::Balance,
  ) -> Result<(), MigrationError> {
    if amount.is_zero() {
      return Ok(());
    }
    <T::Assets as Mutate<T::AccountId>>::transfer(
      asset,
      &Pallet::<T>::account_id(),
      recipient,
      amount,
      Preservation::Expendable,
    )?;
    Ok(())
  }

  /// Grant `spender` the right to draw `amount` from custody
  pub fn approve(
    asset: T::AssetId,
    spender: &T::AccountId,
    amount: T::Balance,
  ) -> Result<(), MigrationError> {
    <T::Assets as approvals::Mutate<T::AccountId>>::approve(
      asset,
      &Pallet::<T>::account_id(),
      spender,
      amount,
    )?;
    Ok(())
  }
}
