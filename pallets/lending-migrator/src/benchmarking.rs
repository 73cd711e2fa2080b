extern crate alloc;

use crate::*;
use alloc::vec::Vec;
use frame::deps::frame_benchmarking::{account, v2::*};
use frame::deps::frame_support::{
  BoundedVec,
  traits::{
    EnsureOrigin, Get,
    fungibles::{Inspect as FungiblesInspect, Mutate as FungiblesMutate},
    tokens::Preservation,
  },
};
use frame::deps::frame_system::RawOrigin;
use frame::deps::sp_runtime::traits::Zero;

#[benchmarks]
mod benches {
  use super::*;

  #[benchmark]
  fn batch(n: Linear<1, { T::MaxOperations::get() }>) {
    let caller: T::AccountId = whitelisted_caller();
    let amount: T::Balance = 1_000_000u32.into();
    let (receipt_asset, underlying_asset) = T::BenchmarkHelper::setup_position(&caller, amount)
      .expect("BenchmarkHelper must set up a source position");

    // Pulls in equal chunks, then one withdraw and one deposit once `n` leaves room
    let pulls = n.saturating_sub(2).max(1);
    let chunk = amount / T::Balance::from(T::MaxOperations::get());
    let mut operations = Vec::with_capacity(n as usize);
    for _ in 0..pulls {
      operations.push(MigrationOp::PullToken {
        asset: receipt_asset,
        amount: Amount::Exact(chunk),
      });
    }
    if n >= 2 {
      operations.push(MigrationOp::WithdrawSource {
        receipt_asset,
        amount: Amount::All,
        recipient: None,
      });
    }
    if n >= 3 {
      operations.push(MigrationOp::DepositDestination {
        underlying_asset,
        beneficiary: caller.clone(),
      });
    }
    let operations: BoundedVec<_, T::MaxOperations> = operations
      .try_into()
      .expect("batch sized within MaxOperations");

    #[extrinsic_call]
    batch(
      RawOrigin::Signed(caller.clone()),
      operations,
      AtomicityMode::AllOrNothing,
    );

    assert!(ActiveSessions::<T>::get(&caller).is_none());
  }

  #[benchmark]
  fn set_circuit_breaker() {
    let origin =
      T::AdminOrigin::try_successful_origin().expect("AdminOrigin must have a successful origin");

    #[extrinsic_call]
    set_circuit_breaker(origin, true);

    assert!(CircuitBreaker::<T>::get());
  }

  #[benchmark]
  fn rescue_funds() {
    let donor: T::AccountId = account("donor", 0, 0);
    let dest: T::AccountId = account("dest", 0, 0);
    let amount: T::Balance = 10_000u32.into();
    let (receipt_asset, _) = T::BenchmarkHelper::setup_position(&donor, amount)
      .expect("BenchmarkHelper must set up a source position");

    let executor = Pallet::<T>::account_id();
    T::Assets::transfer(
      receipt_asset,
      &donor,
      &executor,
      amount,
      Preservation::Expendable,
    )
    .expect("donor holds the position");

    let origin =
      T::AdminOrigin::try_successful_origin().expect("AdminOrigin must have a successful origin");

    #[extrinsic_call]
    rescue_funds(origin, receipt_asset, dest.clone());

    assert!(T::Assets::balance(receipt_asset, &executor).is_zero());
    assert_eq!(T::Assets::balance(receipt_asset, &dest), amount);
  }

  #[cfg(test)]
  use crate::mock::{Test, new_test_ext};
  #[cfg(test)]
  impl_benchmark_test_suite!(Pallet, new_test_ext(), Test);
}
