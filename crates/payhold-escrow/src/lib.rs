//! # payhold-escrow — Escrow Engine
//!
//! The state machine over [`payhold_core::Escrow`]. Every lifecycle
//! change goes through [`EscrowEngine`]: one unit of work per
//! transition, an actor check before any mutation, and a
//! compare-and-swap claim against the persisted status so a lost race
//! surfaces as `StateConflict` with zero side effects.
//!
//! ## Security Invariant
//!
//! - Fund movement and status change commit in the same unit of work.
//!   There is no path that moves money without flipping the status, and
//!   none that flips the status without moving the money it implies.
//! - [`DisputeResolver`] routes through the engine's own release and
//!   refund internals. No second money-moving codepath exists.
//! - Notifications fire only after the unit of work commits; a slow or
//!   failing sink can never hold a claim open or roll one back.

pub mod config;
pub mod dispute;
pub mod engine;
pub mod notify;

pub use config::EscrowConfig;
pub use dispute::{DisputeResolver, ResolutionOutcome};
pub use engine::{CreateEscrow, EscrowEngine};
pub use notify::{EscrowEvent, NotificationSink, TracingSink};
