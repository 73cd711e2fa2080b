//! Authorization gate
//!
//! Every step passes through [`AuthorizationGate::authorize`] before an adapter is
//! touched. The gate also resolves `Amount::All` against live state, so the amount it
//! returns is the one the step moves.
//!
//! - `PullToken` acts on the session caller's own funds and is bounded by their approval.
//! - `WithdrawSource` and `DepositDestination` only act on funds an earlier step of the
//!   same session moved into custody.

use core::marker::PhantomData;
use polkadot_sdk::sp_runtime::traits::Zero;

use crate::{
  Amount, Config, LedgerOf, MigrationError, MigrationOp, MigrationOpOf, custody::AssetCustody,
};

pub struct AuthorizationGate<T>(PhantomData<T>);

impl<T: Config> AuthorizationGate<T> {
  /// Check `invoker` may run `op` inside the session started by `session_caller`.
  ///
  /// Returns the resolved amount the step is cleared to move.
  pub fn authorize(
    session_caller: &T::AccountId,
    invoker: &T::AccountId,
    op: &MigrationOpOf<T>,
    ledger: &LedgerOf<T>,
  ) -> Result<T::Balance, MigrationError> {
    match op {
      MigrationOp::PullToken { asset, amount } => {
        if invoker != session_caller {
          return Err(MigrationError::Unauthorized);
        }
        let caller = session_caller;
        let live = AssetCustody::<T>::balance_of(*asset, caller);
        let resolved = amount.resolve(live);
        if resolved.is_zero() {
          return Err(if amount.is_all() {
            MigrationError::InsufficientBalance
          } else {
            MigrationError::ZeroAmount
          });
        }
        if AssetCustody::<T>::allowance(*asset, caller) < resolved {
          return Err(MigrationError::InsufficientAllowance);
        }
        if live < resolved {
          return Err(MigrationError::InsufficientBalance);
        }
        Ok(resolved)
      }
      MigrationOp::WithdrawSource {
        receipt_asset,
        amount,
        ..
      } => Self::custodied(ledger, receipt_asset, amount),
      MigrationOp::DepositDestination {
        underlying_asset, ..
      } => Self::custodied(ledger, underlying_asset, &Amount::All),
    }
  }

  fn custodied(
    ledger: &LedgerOf<T>,
    asset: &T::AssetId,
    amount: &Amount<T::Balance>,
  ) -> Result<T::Balance, MigrationError> {
    if !ledger.contains(asset) {
      return Err(MigrationError::Unauthorized);
    }
    let held = ledger.held(asset);
    let resolved = amount.resolve(held);
    if resolved.is_zero() {
      return Err(MigrationError::ZeroAmount);
    }
    if resolved > held {
      return Err(MigrationError::InsufficientCustody);
    }
    Ok(resolved)
  }
}
