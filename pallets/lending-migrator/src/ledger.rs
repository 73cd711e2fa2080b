//! Custody ledger
//!
//! Records which assets the executor holds on behalf of the session currently running.
//! The ledger lives on the stack of a single execution; it is never persisted and no
//! other session can observe it.

use alloc::{collections::BTreeMap, vec::Vec};
use polkadot_sdk::sp_runtime::traits::{CheckedAdd, Zero};

use crate::types::MigrationError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CustodyLedger<AssetId: Ord, Balance> {
  holdings: BTreeMap<AssetId, Balance>,
}

impl<AssetId: Ord, Balance> Default for CustodyLedger<AssetId, Balance> {
  fn default() -> Self {
    Self {
      holdings: BTreeMap::new(),
    }
  }
}

impl<AssetId, Balance> CustodyLedger<AssetId, Balance>
where
  AssetId: Ord + Copy,
  Balance: Copy + Zero + CheckedAdd + PartialOrd + core::ops::Sub<Output = Balance>,
{
  pub fn held(&self, asset: &AssetId) -> Balance {
    self.holdings.get(asset).copied().unwrap_or_else(Zero::zero)
  }

  pub fn contains(&self, asset: &AssetId) -> bool {
    self.holdings.contains_key(asset)
  }

  pub fn is_empty(&self) -> bool {
    self.holdings.is_empty()
  }

  /// Record funds that entered custody
  pub fn credit(&mut self, asset: AssetId, amount: Balance) -> Result<(), MigrationError> {
    if amount.is_zero() {
      return Ok(());
    }
    let updated = self
      .held(&asset)
      .checked_add(&amount)
      .ok_or(MigrationError::Overflow)?;
    self.holdings.insert(asset, updated);
    Ok(())
  }

  /// Record funds that left custody. Entries that reach zero are dropped.
  pub fn debit(&mut self, asset: AssetId, amount: Balance) -> Result<(), MigrationError> {
    let held = self.held(&asset);
    if amount > held {
      return Err(MigrationError::InsufficientCustody);
    }
    let remaining = held - amount;
    if remaining.is_zero() {
      self.holdings.remove(&asset);
    } else {
      self.holdings.insert(asset, remaining);
    }
    Ok(())
  }

  /// Empty the ledger, returning what it held
  pub fn drain(&mut self) -> Vec<(AssetId, Balance)> {
    core::mem::take(&mut self.holdings).into_iter().collect()
  }
}
