//! # payhold-core — Foundational Types for Payhold
//!
//! This crate is the bedrock of the Payhold workspace. It defines the
//! data model and type-system primitives that the ledger, escrow engine,
//! and scheduler crates build on. Every other crate in the workspace
//! depends on `payhold-core`; it depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain identifiers.** `UserId`, `WalletId`,
//!    `EscrowId`, `TransactionId`, `Reference` — no bare strings or bare
//!    UUIDs cross a component boundary.
//!
//! 2. **Closed `Currency` enum.** One definition, exhaustive `match`
//!    everywhere. An invalid currency string cannot exist past the parse
//!    boundary.
//!
//! 3. **Minor-unit integer money.** All amounts are `i64` smallest
//!    currency units (kobo, cents). Arithmetic is checked; overflow is a
//!    typed error, never a wrap.
//!
//! 4. **UTC-only timestamps.** `Timestamp` enforces UTC at seconds
//!    precision so persisted deadlines compare deterministically.
//!
//! 5. **One error taxonomy.** `EngineError` distinguishes business
//!    rejections (validation, state conflicts, actor mismatches,
//!    insufficient funds) from fatal storage faults, so the API layer
//!    above this workspace can map 400-class vs 500-class mechanically.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `payhold-*` crates (leaf of the DAG).
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.
//! - All public types derive `Debug`, `Clone`, `Serialize`/`Deserialize`.

pub mod error;
pub mod escrow;
pub mod identity;
pub mod money;
pub mod temporal;
pub mod transaction;
pub mod wallet;

// Re-export primary types for ergonomic imports.
pub use error::EngineError;
pub use escrow::{Escrow, EscrowStatus, Pagination, PartyRole};
pub use identity::{EscrowId, Reference, TransactionId, UserId, WalletId};
pub use money::Currency;
pub use temporal::Timestamp;
pub use transaction::{Transaction, TransactionKind, TransactionStatus};
pub use wallet::Wallet;
