//! # payhold-store — Transactional Store
//!
//! The single seam between the domain crates and persistence. All
//! state the engine or ledger touches lives behind [`MemoryStore`] and
//! is reached only through [`MemoryStore::transact`]: an explicit unit
//! of work that executes a closure against a [`UnitOfWork`] handle and
//! commits or rolls back atomically. Partial application is never
//! observable.
//!
//! ## Concurrency Contract
//!
//! - A global mutex serializes units of work. This subsumes both
//!   guarantees the domain layer relies on: per-wallet serialization
//!   (no interleaved read-modify-write of a balance) and escrow
//!   compare-and-swap (a transition re-reads the persisted status inside
//!   its own unit of work and the read cannot go stale before commit).
//! - The closure mutates a working copy; the committed state is replaced
//!   only when the closure returns `Ok`. An `Err` of any kind discards
//!   the working copy wholesale — rollback is structural, not manual.
//!
//! A SQL deployment maps `transact` onto one SERIALIZABLE transaction
//! (or `SELECT … FOR UPDATE` row locks) with the same observable
//! contract; the in-memory backend is the reference implementation and
//! the test substrate.

pub mod memory;

pub use memory::{MemoryStore, UnitOfWork};
