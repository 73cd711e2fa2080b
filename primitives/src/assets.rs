use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use serde::{Deserialize, Serialize};

/// Amount requested by a migration step.
///
/// - `Exact`: a fixed amount in the asset's base units.
/// - `All`: the full live balance at the moment the owning step executes.
///
/// `All` is never resolved ahead of time: an earlier step in the same batch may have
/// changed the balance it refers to.
#[derive(
  Clone,
  Copy,
  Debug,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  MaxEncodedLen,
  PartialEq,
  TypeInfo,
  Serialize,
  Deserialize,
)]
pub enum Amount<Balance> {
  /// Fixed amount
  Exact(Balance),
  /// Entire live balance
  All,
}

impl<Balance: Copy> Amount<Balance> {
  /// Resolve against the balance observed right now.
  pub fn resolve(&self, live: Balance) -> Balance {
    match self {
      Amount::Exact(amount) => *amount,
      Amount::All => live,
    }
  }

  pub fn is_all(&self) -> bool {
    matches!(self, Amount::All)
  }
}

impl<Balance> From<Balance> for Amount<Balance> {
  fn from(amount: Balance) -> Self {
    Amount::Exact(amount)
  }
}
