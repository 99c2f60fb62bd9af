//! Shared primitive types used across the forecaster.

/// Opaque member key, as it appears in the claims extract.
pub type MemberId = String;

/// Whole calendar days.
pub type Days = i64;

/// Identifier for one batch run in the ledger.
pub type RunId = String;
