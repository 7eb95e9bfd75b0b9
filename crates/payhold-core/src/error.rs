//! # Error Taxonomy
//!
//! One `EngineError` enum for the whole workspace, derived with
//! `thiserror`. Expected business failures (wrong state, wrong actor,
//! insufficient funds, malformed input) are ordinary `Err` values that
//! carry a machine-readable code; only `FatalStorage` represents a
//! system fault whose unit of work aborted with zero partial effect.
//!
//! The API layer above this workspace maps `is_business()` errors to
//! 400-class responses and `FatalStorage` to an opaque 500.

use thiserror::Error;

/// Errors produced by the ledger, escrow engine, and scheduler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Malformed input — caller's fault, recoverable by resubmission.
    #[error("validation error: {0}")]
    Validation(String),

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record ("escrow", "transaction", …).
        entity: &'static str,
        /// The identifier that failed to resolve.
        id: String,
    },

    /// A transition was attempted from a state that no longer matches,
    /// including lost races against a concurrent transition.
    #[error("state conflict on {escrow}: expected {expected}, found {actual}")]
    StateConflict {
        /// The escrow whose persisted status diverged.
        escrow: String,
        /// The status (or status set) the transition required.
        expected: String,
        /// The status actually persisted.
        actual: String,
    },

    /// The wrong party attempted the requested action.
    #[error("user {user} is not authorized to {action}")]
    UnauthorizedActor {
        /// The action that was attempted.
        action: &'static str,
        /// The offending user.
        user: String,
    },

    /// A debit would have driven the wallet balance below zero.
    #[error("insufficient funds in {wallet}: requested {requested}, available {available}")]
    InsufficientFunds {
        /// The wallet that was short.
        wallet: String,
        /// Minor units requested.
        requested: i64,
        /// Minor units available.
        available: i64,
    },

    /// A debit was attempted against a wallet that does not exist.
    /// Credits create the wallet lazily; debits never do.
    #[error("no {currency} wallet exists for {user}")]
    WalletNotFound {
        /// The wallet owner.
        user: String,
        /// The currency of the missing wallet.
        currency: String,
    },

    /// The underlying unit of work failed. Never retried at this layer;
    /// surfaced verbatim with guaranteed zero partial state change.
    #[error("storage failure: {0}")]
    FatalStorage(String),
}

impl EngineError {
    /// Machine-readable code for transport-layer mapping.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::StateConflict { .. } => "STATE_CONFLICT",
            Self::UnauthorizedActor { .. } => "UNAUTHORIZED_ACTOR",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::WalletNotFound { .. } => "WALLET_NOT_FOUND",
            Self::FatalStorage(_) => "STORAGE_ERROR",
        }
    }

    /// Whether this is an expected business rejection (400-class) as
    /// opposed to a system fault (500-class).
    pub fn is_business(&self) -> bool {
        !matches!(self, Self::FatalStorage(_))
    }
}
