//! Admin dispute resolution.
//!
//! Thin facade over the engine's resolution internal. The resolver
//! carries no money-moving logic of its own: both outcomes route
//! through the exact release/refund paths the party-driven transitions
//! use, with the same claim guard and the same ledger references.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use payhold_core::{EngineError, Escrow, EscrowId, UserId};

use crate::engine::EscrowEngine;

/// The adjudicated outcome of a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolutionOutcome {
    /// Seller wins: custody releases `amount − fee` to the seller.
    Release,
    /// Buyer wins: the full `amount + fee` hold returns to the buyer.
    Refund,
}

/// Resolves disputed escrows on behalf of platform admins.
pub struct DisputeResolver {
    engine: Arc<EscrowEngine>,
}

impl DisputeResolver {
    /// Build a resolver over the shared engine.
    pub fn new(engine: Arc<EscrowEngine>) -> Self {
        Self { engine }
    }

    /// Resolve a `DISPUTED` escrow.
    ///
    /// The admin must not be a party to the escrow. `notes` are
    /// recorded on the escrow with the admin's identity; a second
    /// resolve of the same escrow is a `StateConflict`.
    pub fn resolve(
        &self,
        escrow_id: EscrowId,
        admin_id: UserId,
        outcome: ResolutionOutcome,
        notes: String,
    ) -> Result<Escrow, EngineError> {
        self.engine.resolve_dispute(escrow_id, admin_id, outcome, notes)
    }
}
