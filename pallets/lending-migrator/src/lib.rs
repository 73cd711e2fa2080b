//! Lending Migrator Pallet
//!
//! Moves a lending position from a source protocol to a destination protocol in one
//! batch, without the owner ever holding the underlying asset in between.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub use pallet::*;

pub mod adapters;
pub use adapters::{DestinationProtocol, SourceProtocol};

pub mod authorization;
pub mod custody;

pub mod ledger;
pub use ledger::CustodyLedger;

pub mod types;
pub use types::*;

pub mod weights;
pub use weights::WeightInfo;

#[cfg(test)]
mod mock;

#[cfg(feature = "runtime-benchmarks")]
mod benchmarking;

#[cfg(feature = "runtime-benchmarks")]
pub trait BenchmarkHelper<AccountId, AssetId, Balance> {
  /// Give `owner` a source position of `amount` receipt tokens, approved to the executor.
  /// Returns `(receipt_asset, underlying_asset)`.
  fn setup_position(
    owner: &AccountId,
    amount: Balance,
  ) -> Result<(AssetId, AssetId), polkadot_sdk::sp_runtime::DispatchError>;
}

const LOG_TARGET: &str = "runtime::lending-migrator";

#[frame::pallet]
pub mod pallet {
  use super::{
    AtomicityMode, CustodyLedger, DestinationProtocol, LOG_TARGET, MigrationError, MigrationOp,
    Outcome, Session, SessionId, SourceProtocol, StepFailure, StepResult, WeightInfo,
    authorization::AuthorizationGate, custody::AssetCustody,
  };
  use alloc::vec::Vec;
  use frame::prelude::*;
  use polkadot_sdk::{
    frame_support::{
      PalletId,
      storage::{with_storage_layer, with_transaction},
      traits::{
        EnsureOrigin,
        fungibles::{Mutate as FungiblesMutate, approvals::Mutate as ApprovalsMutate},
      },
    },
    sp_runtime::{
      TransactionOutcome,
      traits::{AccountIdConversion, Saturating, Zero},
    },
  };

  #[pallet::config]
  pub trait Config: frame_system::Config {
    type AssetId: Parameter + Member + Copy + Ord + MaxEncodedLen;

    type Balance: Parameter
      + Member
      + AtLeast32BitUnsigned
      + Default
      + Copy
      + MaybeSerializeDeserialize
      + MaxEncodedLen;

    /// Fungible assets with owner-to-spender approvals.
    ///
    /// Every deposit approves the destination spender from the executor account. Where the
    /// asset layer charges a native deposit for approvals (pallet-assets `ApprovalDeposit`),
    /// the executor account must hold enough free native balance to cover one approval;
    /// without it every `DepositDestination` step fails as an adapter failure.
    type Assets: FungiblesMutate<Self::AccountId, AssetId = Self::AssetId, Balance = Self::Balance>
      + ApprovalsMutate<Self::AccountId>;

    /// Protocol positions are migrated out of
    type Source: SourceProtocol<Self::AccountId, Self::AssetId, Self::Balance>;

    /// Protocol positions are migrated into
    type Destination: DestinationProtocol<Self::AccountId, Self::AssetId, Self::Balance>;

    /// Pallet ID for deriving the executor custody account
    #[pallet::constant]
    type PalletId: Get<PalletId>;

    /// Maximum operations in one batch
    #[pallet::constant]
    type MaxOperations: Get<u32>;

    /// Opaque mode value forwarded to every destination deposit
    #[pallet::constant]
    type ProtocolMode: Get<u16>;

    /// Origin allowed to trip the circuit breaker and rescue stray funds
    type AdminOrigin: EnsureOrigin<Self::RuntimeOrigin>;

    type WeightInfo: WeightInfo;

    #[cfg(feature = "runtime-benchmarks")]
    type BenchmarkHelper: crate::BenchmarkHelper<Self::AccountId, Self::AssetId, Self::Balance>;
  }

  pub type MigrationOpOf<T> = MigrationOp<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
  >;

  pub type SessionOf<T> = Session<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
  >;

  pub type StepResultOf<T> = StepResult<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
  >;

  pub type OutcomeOf<T> = Outcome<
    <T as frame_system::Config>::AccountId,
    <T as Config>::AssetId,
    <T as Config>::Balance,
  >;

  pub type LedgerOf<T> = CustodyLedger<<T as Config>::AssetId, <T as Config>::Balance>;

  /// The pallet module, the place to define dispatchable calls, storage items, events, errors, etc.
  ///
  /// ## Migration Sessions
  /// A caller approves the executor account on their receipt asset and submits a batch:
  ///
  /// 1. **PullToken**: receipt tokens move from the caller into executor custody.
  /// 2. **WithdrawSource**: the source protocol redeems them for the underlying asset.
  /// 3. **DepositDestination**: the underlying is deposited into the destination protocol,
  ///    credited to the caller.
  ///
  /// ## Atomicity
  /// Every session runs inside a storage transaction. `AllOrNothing` rolls the whole
  /// transaction back on the first failing step. `BestEffort` rolls back only the failing
  /// step and keeps what came before it.
  ///
  /// ## Custody
  /// Funds only rest on the executor account while a session runs. Whatever a session
  /// still holds after its last step goes back to the caller.
  #[pallet::pallet]
  pub struct Pallet<T>(_);

  /// Callers with a session currently executing
  #[pallet::storage]
  pub type ActiveSessions<T: Config> =
    StorageMap<_, Blake2_128Concat, T::AccountId, SessionId, OptionQuery>;

  /// Identifier handed to the next session that starts executing
  #[pallet::storage]
  pub type NextSessionId<T: Config> = StorageValue<_, SessionId, ValueQuery>;

  /// When set, new batches are refused
  #[pallet::storage]
  #[pallet::getter(fn circuit_breaker)]
  pub type CircuitBreaker<T: Config> = StorageValue<_, bool, ValueQuery>;

  #[pallet::event]
  #[pallet::generate_deposit(pub(super) fn deposit_event)]
  pub enum Event<T: Config> {
    /// Tokens moved from the caller into executor custody
    TokenPulled {
      session: SessionId,
      who: T::AccountId,
      asset: T::AssetId,
      amount: T::Balance,
    },
    /// Receipt tokens redeemed at the source protocol
    SourceWithdrawn {
      session: SessionId,
      receipt_asset: T::AssetId,
      receipt_amount: T::Balance,
      underlying_asset: T::AssetId,
      underlying_amount: T::Balance,
      recipient: T::AccountId,
    },
    /// Underlying deposited into the destination protocol
    DestinationDeposited {
      session: SessionId,
      asset: T::AssetId,
      amount: T::Balance,
      credited: T::Balance,
      beneficiary: T::AccountId,
    },
    /// Residual custody handed back to the caller at session end
    CustodyReturned {
      session: SessionId,
      who: T::AccountId,
      asset: T::AssetId,
      amount: T::Balance,
    },
    /// Every step of the session applied
    SessionCommitted {
      session: SessionId,
      caller: T::AccountId,
      steps: u32,
    },
    /// Session halted at `failed_step`; earlier steps stay applied
    SessionPartiallyCommitted {
      session: SessionId,
      caller: T::AccountId,
      committed: u32,
      failed_step: u32,
      error: MigrationError,
    },
    CircuitBreakerSet {
      paused: bool,
    },
    /// Funds found on the executor account outside any session were moved out
    FundsRescued {
      asset: T::AssetId,
      amount: T::Balance,
      dest: T::AccountId,
    },
  }

  #[pallet::error]
  pub enum Error<T> {
    /// Batch carries no operations
    EmptySession,
    /// Asset not known to the source or destination protocol
    UnsupportedAsset,
    /// Approval to the executor does not cover the pull
    InsufficientAllowance,
    /// Owner balance does not cover the pull
    InsufficientBalance,
    /// Step asks for more than the session holds in custody
    InsufficientCustody,
    /// Step targets funds outside the session's custody
    Unauthorized,
    /// Step resolved to a zero amount
    ZeroAmount,
    /// Caller already has a session executing
    ReentrantSession,
    /// Session already executed
    SessionFinalized,
    /// Custody accounting overflow
    Overflow,
    /// Destination drew less than the approved deposit
    IncompleteDeposit,
    /// Migrations are paused
    CircuitBreakerActive,
    /// Executor account holds nothing of this asset
    NothingToRescue,
  }

  #[pallet::call]
  impl<T: Config> Pallet<T> {
    /// Execute a migration batch on behalf of the signed caller.
    ///
    /// Operations run strictly in order. A reverted session returns the failing step's
    /// error and leaves no trace; committed and partially committed sessions report
    /// through events.
    #[pallet::call_index(0)]
    #[pallet::weight(T::WeightInfo::batch(operations.len() as u32))]
    pub fn batch(
      origin: OriginFor<T>,
      operations: BoundedVec<MigrationOpOf<T>, T::MaxOperations>,
      mode: AtomicityMode,
    ) -> DispatchResult {
      let who = ensure_signed(origin)?;

      ensure!(
        !CircuitBreaker::<T>::get(),
        Error::<T>::CircuitBreakerActive
      );

      let mut session = Session::new(who, operations.into_inner(), mode);
      match Self::execute(&mut session) {
        Outcome::Reverted(failure) => {
          log::debug!(
            target: LOG_TARGET,
            "batch reverted at step {}: {:?}",
            failure.index,
            failure.error,
          );
          Err(Self::dispatch_error(failure.error))
        }
        Outcome::Committed(_) | Outcome::PartiallyCommitted { .. } => Ok(()),
      }
    }

    /// Pause or resume migrations
    #[pallet::call_index(1)]
    #[pallet::weight(T::WeightInfo::set_circuit_breaker())]
    pub fn set_circuit_breaker(origin: OriginFor<T>, paused: bool) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;

      CircuitBreaker::<T>::put(paused);

      Self::deposit_event(Event::CircuitBreakerSet { paused });

      Ok(())
    }

    /// Move funds that reached the executor account outside a session to `dest`
    ///
    /// Sessions never leave funds behind, so anything found here was sent directly.
    #[pallet::call_index(2)]
    #[pallet::weight(T::WeightInfo::rescue_funds())]
    pub fn rescue_funds(
      origin: OriginFor<T>,
      asset: T::AssetId,
      dest: T::AccountId,
    ) -> DispatchResult {
      T::AdminOrigin::ensure_origin(origin)?;

      let amount = AssetCustody::<T>::balance_of(asset, &Self::account_id());
      ensure!(!amount.is_zero(), Error::<T>::NothingToRescue);

      AssetCustody::<T>::push(asset, &dest, amount).map_err(Self::dispatch_error)?;

      Self::deposit_event(Event::FundsRescued {
        asset,
        amount,
        dest,
      });

      Ok(())
    }
  }

  impl<T: Config> Pallet<T> {
    /// Get the executor custody account (derived from PalletId)
    pub fn account_id() -> T::AccountId {
      T::PalletId::get().into_account_truncating()
    }

    /// Execute `session` on behalf of its own caller and record its terminal status on it.
    ///
    /// A session that already ran is refused and left untouched.
    pub fn execute(session: &mut SessionOf<T>) -> OutcomeOf<T> {
      let invoker = session.caller.clone();
      Self::execute_as(&invoker, session)
    }

    /// Execute `session` with `invoker` driving it.
    ///
    /// Only the session's caller may pull funds into custody; a pull driven by anyone
    /// else fails with `Unauthorized`.
    pub fn execute_as(invoker: &T::AccountId, session: &mut SessionOf<T>) -> OutcomeOf<T> {
      if session.is_terminated() {
        return Outcome::Reverted(StepFailure::at(0, MigrationError::SessionFinalized));
      }

      let outcome = match Self::accept(session) {
        Ok(()) => Self::run(invoker, session),
        Err(failure) => Outcome::Reverted(failure),
      };

      session.status = outcome.status();
      outcome
    }

    /// Whether every asset `op` names is known to the configured protocols
    pub fn is_supported(op: &MigrationOpOf<T>) -> bool {
      match op {
        MigrationOp::PullToken { asset, .. } => {
          T::Source::underlying_of(*asset).is_some() || T::Destination::supports(*asset)
        }
        MigrationOp::WithdrawSource { receipt_asset, .. } => {
          T::Source::underlying_of(*receipt_asset).is_some()
        }
        MigrationOp::DepositDestination {
          underlying_asset, ..
        } => T::Destination::supports(*underlying_asset),
      }
    }

    /// Map a step failure onto the dispatch error reported to the submitter
    pub fn dispatch_error(error: MigrationError) -> DispatchError {
      match error {
        MigrationError::EmptySession => Error::<T>::EmptySession.into(),
        MigrationError::UnsupportedAsset => Error::<T>::UnsupportedAsset.into(),
        MigrationError::InsufficientAllowance => Error::<T>::InsufficientAllowance.into(),
        MigrationError::InsufficientBalance => Error::<T>::InsufficientBalance.into(),
        MigrationError::InsufficientCustody => Error::<T>::InsufficientCustody.into(),
        MigrationError::Unauthorized => Error::<T>::Unauthorized.into(),
        MigrationError::ZeroAmount => Error::<T>::ZeroAmount.into(),
        MigrationError::ReentrantSession => Error::<T>::ReentrantSession.into(),
        MigrationError::SessionFinalized => Error::<T>::SessionFinalized.into(),
        MigrationError::Overflow => Error::<T>::Overflow.into(),
        MigrationError::IncompleteDeposit => Error::<T>::IncompleteDeposit.into(),
        MigrationError::AdapterFailure(reason) => reason,
      }
    }

    /// Structural checks done before anything executes
    fn accept(session: &SessionOf<T>) -> Result<(), StepFailure> {
      if session.operations.is_empty() {
        return Err(StepFailure::at(0, MigrationError::EmptySession));
      }
      for (index, op) in session.operations.iter().enumerate() {
        if !Self::is_supported(op) {
          return Err(StepFailure::at(index, MigrationError::UnsupportedAsset));
        }
      }
      Ok(())
    }

    /// Run the session inside one storage transaction, committed unless reverted
    fn run(invoker: &T::AccountId, session: &SessionOf<T>) -> OutcomeOf<T> {
      let result = with_transaction(|| {
        let outcome = Self::run_guarded(invoker, session);
        if outcome.is_reverted() {
          TransactionOutcome::Rollback(Ok::<_, MigrationError>(outcome))
        } else {
          TransactionOutcome::Commit(Ok(outcome))
        }
      });

      result.unwrap_or_else(|error| Outcome::Reverted(StepFailure::at(0, error)))
    }

    fn run_guarded(invoker: &T::AccountId, session: &SessionOf<T>) -> OutcomeOf<T> {
      let caller = &session.caller;
      if ActiveSessions::<T>::contains_key(caller) {
        return Outcome::Reverted(StepFailure::at(0, MigrationError::ReentrantSession));
      }

      let id = NextSessionId::<T>::mutate(|next| {
        let id = *next;
        *next = next.saturating_add(1);
        id
      });
      ActiveSessions::<T>::insert(caller, id);

      let outcome = Self::run_steps(id, invoker, session);

      ActiveSessions::<T>::remove(caller);
      outcome
    }

    fn run_steps(id: SessionId, invoker: &T::AccountId, session: &SessionOf<T>) -> OutcomeOf<T> {
      let caller = &session.caller;
      let mut ledger = LedgerOf::<T>::default();
      let mut committed: Vec<StepResultOf<T>> = Vec::with_capacity(session.operations.len());
      let mut failure = None;

      for (index, op) in session.operations.iter().enumerate() {
        // Ledger changes are staged and only adopted together with the step's storage
        let mut staged = ledger.clone();
        match with_storage_layer(|| Self::apply_step(id, caller, invoker, op, &mut staged)) {
          Ok(result) => {
            log::debug!(target: LOG_TARGET, "session {} step {} applied: {:?}", id, index, result);
            ledger = staged;
            committed.push(result);
          }
          Err(error) => {
            log::debug!(
              target: LOG_TARGET,
              "session {} step {} failed: {:?}",
              id,
              index,
              error,
            );
            failure = Some(StepFailure::at(index, error));
            break;
          }
        }
      }

      if let Some(failure) = failure {
        if session.mode == AtomicityMode::AllOrNothing || committed.is_empty() {
          return Outcome::Reverted(failure);
        }
      }

      if let Err(error) = Self::settle(id, caller, &mut ledger) {
        log::warn!(
          target: LOG_TARGET,
          "session {} could not return custody: {:?}",
          id,
          error,
        );
        return Outcome::Reverted(StepFailure::at(session.operations.len(), error));
      }

      let steps = committed.len() as u32;
      match failure {
        None => {
          Self::deposit_event(Event::SessionCommitted {
            session: id,
            caller: caller.clone(),
            steps,
          });
          Outcome::Committed(committed)
        }
        Some(failure) => {
          Self::deposit_event(Event::SessionPartiallyCommitted {
            session: id,
            caller: caller.clone(),
            committed: steps,
            failed_step: failure.index,
            error: failure.error,
          });
          Outcome::PartiallyCommitted { committed, failure }
        }
      }
    }

    fn apply_step(
      id: SessionId,
      caller: &T::AccountId,
      invoker: &T::AccountId,
      op: &MigrationOpOf<T>,
      ledger: &mut LedgerOf<T>,
    ) -> Result<StepResultOf<T>, MigrationError> {
      let amount = AuthorizationGate::<T>::authorize(caller, invoker, op, ledger)?;
      let executor = Self::account_id();

      match op {
        MigrationOp::PullToken { asset, .. } => {
          let moved = AssetCustody::<T>::pull(*asset, caller, amount)?;
          ledger.credit(*asset, moved)?;

          Self::deposit_event(Event::TokenPulled {
            session: id,
            who: caller.clone(),
            asset: *asset,
            amount: moved,
          });

          Ok(StepResult::Pulled {
            asset: *asset,
            amount: moved,
          })
        }
        MigrationOp::WithdrawSource {
          receipt_asset,
          recipient,
          ..
        } => {
          let underlying_asset =
            T::Source::underlying_of(*receipt_asset).ok_or(MigrationError::UnsupportedAsset)?;
          let recipient = recipient.clone().unwrap_or_else(|| executor.clone());

          let receipts_before = AssetCustody::<T>::balance_of(*receipt_asset, &executor);
          let before = AssetCustody::<T>::balance_of(underlying_asset, &executor);
          let reported = T::Source::withdraw(&executor, *receipt_asset, amount, &recipient)?;

          // Receipts the source left in place stay in custody and reach settlement
          let burned = receipts_before
            .saturating_sub(AssetCustody::<T>::balance_of(*receipt_asset, &executor));
          if burned != amount {
            log::warn!(
              target: LOG_TARGET,
              "source asked to redeem {:?} receipts, took {:?}",
              amount,
              burned,
            );
          }
          ledger.debit(*receipt_asset, burned)?;

          // Custody is credited with what arrived, not with what the protocol claims
          let underlying_amount = if recipient == executor {
            let received =
              AssetCustody::<T>::balance_of(underlying_asset, &executor).saturating_sub(before);
            if received != reported {
              log::warn!(
                target: LOG_TARGET,
                "source reported {:?} underlying, custody received {:?}",
                reported,
                received,
              );
            }
            ledger.credit(underlying_asset, received)?;
            received
          } else {
            reported
          };

          Self::deposit_event(Event::SourceWithdrawn {
            session: id,
            receipt_asset: *receipt_asset,
            receipt_amount: burned,
            underlying_asset,
            underlying_amount,
            recipient: recipient.clone(),
          });

          Ok(StepResult::Withdrawn {
            receipt_asset: *receipt_asset,
            receipt_amount: burned,
            underlying_asset,
            underlying_amount,
            recipient,
          })
        }
        MigrationOp::DepositDestination {
          underlying_asset,
          beneficiary,
        } => {
          let spender = T::Destination::spender();
          AssetCustody::<T>::approve(*underlying_asset, &spender, amount)?;

          let before = AssetCustody::<T>::balance_of(*underlying_asset, &executor);
          let credited = T::Destination::deposit(
            &executor,
            *underlying_asset,
            amount,
            beneficiary,
            T::ProtocolMode::get(),
          )?;
          // No approval on custody may outlive the step
          if !AssetCustody::<T>::approved(*underlying_asset, &spender).is_zero() {
            return Err(MigrationError::IncompleteDeposit);
          }
          let spent =
            before.saturating_sub(AssetCustody::<T>::balance_of(*underlying_asset, &executor));
          ledger.debit(*underlying_asset, spent)?;

          Self::deposit_event(Event::DestinationDeposited {
            session: id,
            asset: *underlying_asset,
            amount: spent,
            credited,
            beneficiary: beneficiary.clone(),
          });

          Ok(StepResult::Deposited {
            asset: *underlying_asset,
            amount: spent,
            credited,
            beneficiary: beneficiary.clone(),
          })
        }
      }
    }

    /// Hand whatever the session still holds back to its caller
    fn settle(
      id: SessionId,
      caller: &T::AccountId,
      ledger: &mut LedgerOf<T>,
    ) -> Result<(), MigrationError> {
      for (asset, amount) in ledger.drain() {
        AssetCustody::<T>::push(asset, caller, amount)?;
        Self::deposit_event(Event::CustodyReturned {
          session: id,
          who: caller.clone(),
          asset,
          amount,
        });
      }
      Ok(())
    }
  }

  /// Genesis configuration: gives the executor account a provider reference.
  ///
  /// The provider keeps the account alive without a native balance. It does not pay
  /// approval deposits; the runtime endows the executor account for those.
  #[pallet::genesis_config]
  #[derive(frame::prelude::DefaultNoBound)]
  pub struct GenesisConfig<T: Config> {
    /// Start with the circuit breaker tripped
    pub paused: bool,
    #[serde(skip)]
    pub _marker: core::marker::PhantomData<T>,
  }

  #[pallet::genesis_build]
  impl<T: Config> BuildGenesisConfig for GenesisConfig<T> {
    fn build(&self) {
      // Keeps the executor account alive while it holds no native balance
      frame_system::Pallet::<T>::inc_providers(&Pallet::<T>::account_id());
      CircuitBreaker::<T>::put(self.paused);
    }
  }
}
