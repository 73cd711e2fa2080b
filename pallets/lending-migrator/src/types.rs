use alloc::vec::Vec;
use codec::{Decode, DecodeWithMemTracking, Encode, MaxEncodedLen};
use polkadot_sdk::sp_runtime::DispatchError;
use scale_info::TypeInfo;

pub use primitives::Amount;

/// Sequential identifier of an executed migration session
pub type SessionId = u64;

/// One step of a migration batch.
///
/// The set is closed: a batch can only pull from its caller, withdraw from the source
/// protocol, or deposit into the destination protocol.
#[derive(
  Clone, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo, MaxEncodedLen,
)]
pub enum MigrationOp<AccountId, AssetId, Balance> {
  /// Move `amount` of `asset` from the caller into executor custody, consuming the
  /// caller's approval.
  PullToken {
    asset: AssetId,
    amount: Amount<Balance>,
  },
  /// Redeem custodied receipt tokens at the source protocol. The underlying goes to
  /// `recipient`, or into executor custody when `None`.
  WithdrawSource {
    receipt_asset: AssetId,
    amount: Amount<Balance>,
    recipient: Option<AccountId>,
  },
  /// Deposit the whole custodied balance of `underlying_asset` into the destination
  /// protocol, credited to `beneficiary`.
  DepositDestination {
    underlying_asset: AssetId,
    beneficiary: AccountId,
  },
}

#[derive(
  Clone,
  Copy,
  Debug,
  Default,
  Decode,
  DecodeWithMemTracking,
  Encode,
  Eq,
  PartialEq,
  TypeInfo,
  MaxEncodedLen,
)]
pub enum AtomicityMode {
  /// Any failing step reverts the whole session
  #[default]
  AllOrNothing,
  /// A failing step halts the session; earlier steps stay applied
  BestEffort,
}

#[derive(Clone, Copy, Debug, Default, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub enum SessionStatus {
  #[default]
  Pending,
  Committed,
  PartiallyCommitted,
  Reverted,
}

/// A migration attempt: who submitted it, what it does, and how far it got.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Session<AccountId, AssetId, Balance> {
  pub caller: AccountId,
  pub operations: Vec<MigrationOp<AccountId, AssetId, Balance>>,
  pub mode: AtomicityMode,
  pub status: SessionStatus,
}

impl<AccountId, AssetId, Balance> Session<AccountId, AssetId, Balance> {
  pub fn new(
    caller: AccountId,
    operations: Vec<MigrationOp<AccountId, AssetId, Balance>>,
    mode: AtomicityMode,
  ) -> Self {
    Self {
      caller,
      operations,
      mode,
      status: SessionStatus::Pending,
    }
  }

  pub fn is_terminated(&self) -> bool {
    self.status != SessionStatus::Pending
  }
}

/// Failure kinds a migration step can report.
#[derive(Clone, Copy, Debug, Decode, DecodeWithMemTracking, Encode, Eq, PartialEq, TypeInfo)]
pub enum MigrationError {
  /// Session carries no operations
  EmptySession,
  /// Asset is unknown to both protocol adapters
  UnsupportedAsset,
  /// Caller's approval does not cover the pull
  InsufficientAllowance,
  /// Caller's balance does not cover the pull
  InsufficientBalance,
  /// Step asks for more than the executor holds for this session
  InsufficientCustody,
  /// Step targets funds the session does not control
  Unauthorized,
  /// Step resolved to a zero amount
  ZeroAmount,
  /// Caller already has a session executing
  ReentrantSession,
  /// Session already ran to completion
  SessionFinalized,
  /// Custody accounting overflowed
  Overflow,
  /// Destination protocol left part of the approved deposit undrawn
  IncompleteDeposit,
  /// Asset layer or lending protocol rejected the call
  AdapterFailure(DispatchError),
}

impl From<DispatchError> for MigrationError {
  fn from(error: DispatchError) -> Self {
    MigrationError::AdapterFailure(error)
  }
}

/// First failure of a session and where it happened.
#[derive(Clone, Copy, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub struct StepFailure {
  /// Index into the session's operations. Equals the operation count when settlement
  /// of residual custody failed.
  pub index: u32,
  pub error: MigrationError,
}

impl StepFailure {
  pub fn at(index: usize, error: MigrationError) -> Self {
    Self {
      index: index.try_into().unwrap_or(u32::MAX),
      error,
    }
  }
}

/// Effect of one applied step.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub enum StepResult<AccountId, AssetId, Balance> {
  Pulled {
    asset: AssetId,
    amount: Balance,
  },
  Withdrawn {
    receipt_asset: AssetId,
    receipt_amount: Balance,
    underlying_asset: AssetId,
    underlying_amount: Balance,
    recipient: AccountId,
  },
  Deposited {
    asset: AssetId,
    amount: Balance,
    credited: Balance,
    beneficiary: AccountId,
  },
}

/// Terminal result of executing a session.
#[derive(Clone, Debug, Decode, Encode, Eq, PartialEq, TypeInfo)]
pub enum Outcome<AccountId, AssetId, Balance> {
  Committed(Vec<StepResult<AccountId, AssetId, Balance>>),
  Reverted(StepFailure),
  PartiallyCommitted {
    committed: Vec<StepResult<AccountId, AssetId, Balance>>,
    failure: StepFailure,
  },
}

impl<AccountId, AssetId, Balance> Outcome<AccountId, AssetId, Balance> {
  pub fn status(&self) -> SessionStatus {
    match self {
      Outcome::Committed(_) => SessionStatus::Committed,
      Outcome::Reverted(_) => SessionStatus::Reverted,
      Outcome::PartiallyCommitted { .. } => SessionStatus::PartiallyCommitted,
    }
  }

  pub fn is_reverted(&self) -> bool {
    matches!(self, Outcome::Reverted(_))
  }

  /// First failure, if any
  pub fn failure(&self) -> Option<&StepFailure> {
    match self {
      Outcome::Committed(_) => None,
      Outcome::Reverted(failure) | Outcome::PartiallyCommitted { failure, .. } => Some(failure),
    }
  }
}
