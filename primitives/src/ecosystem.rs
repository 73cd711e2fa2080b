//! Ecosystem Constants for the Lending Migrator
//!
//! Centralizes pallet identifiers and the default parameters used when wiring the
//! migrator into a runtime. Runtime configurations and test mocks read these instead of
//! repeating literals.

/// Balance type alias for consistency across ecosystem
pub type Balance = u128;

/// Asset identifier type used by pallet-assets in the reference configuration
pub type AssetId = u32;

/// Pallet identifiers for deriving pallet-owned accounts.
///
/// Used with `PalletId::into_account_truncating()` to derive the executor's custody
/// account. Funds only sit on that account while a migration session is executing.
pub mod pallet_ids {
  /// Lending Migrator pallet ID (migration batch executor custody account)
  pub const LENDING_MIGRATOR_PALLET_ID: &[u8; 8] = b"py/lndmg";
}

/// Migration parameters.
pub mod params {
  /// Maximum operations accepted in a single migration batch.
  ///
  /// A complete migration needs three (pull, withdraw, deposit); the headroom allows
  /// migrating several receipt assets in one session.
  pub const MAX_MIGRATION_OPERATIONS: u32 = 16;

  /// Opaque mode value handed to the destination protocol on every deposit.
  ///
  /// Zero selects the protocol's default behaviour.
  pub const DEFAULT_PROTOCOL_MODE: u16 = 0;
}
