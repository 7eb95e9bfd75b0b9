//! # Domain Identity Newtypes
//!
//! Newtype wrappers for all domain identifiers. These prevent
//! accidental identifier confusion — you cannot pass a `UserId` where an
//! `EscrowId` is expected, and a raw string can never stand in for a
//! ledger idempotency reference.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;

/// Unique identifier for a platform user (buyer, seller, or admin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

/// Unique identifier for a wallet (one per user per currency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletId(pub Uuid);

/// Unique identifier for an escrow agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EscrowId(pub Uuid);

/// Unique identifier for a ledger transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub Uuid);

macro_rules! impl_uuid_id {
    ($name:ident, $prefix:literal) => {
        impl $name {
            /// Generate a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Access the inner UUID.
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

impl_uuid_id!(UserId, "user");
impl_uuid_id!(WalletId, "wallet");
impl_uuid_id!(EscrowId, "escrow");
impl_uuid_id!(TransactionId, "txn");

/// A globally unique ledger idempotency reference.
///
/// The ledger refuses to apply a second transaction carrying a reference
/// it has already completed, which is what makes retried gateway
/// callbacks and double-submitted transitions safe. References are
/// validated at construction: non-empty, at most 128 bytes, no interior
/// whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference(String);

impl Reference {
    /// Maximum accepted reference length in bytes.
    pub const MAX_LEN: usize = 128;

    /// Validate and wrap a reference string.
    pub fn new(reference: impl Into<String>) -> Result<Self, EngineError> {
        let reference = reference.into();
        if reference.is_empty() {
            return Err(EngineError::Validation(
                "reference must not be empty".to_string(),
            ));
        }
        if reference.len() > Self::MAX_LEN {
            return Err(EngineError::Validation(format!(
                "reference exceeds {} bytes: {} bytes",
                Self::MAX_LEN,
                reference.len()
            )));
        }
        if reference.chars().any(char::is_whitespace) {
            return Err(EngineError::Validation(format!(
                "reference must not contain whitespace: {reference:?}"
            )));
        }
        Ok(Self(reference))
    }

    /// Access the reference string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(UserId::new(), UserId::new());
        assert_ne!(EscrowId::new(), EscrowId::new());
    }

    #[test]
    fn display_uses_namespace_prefix() {
        assert!(UserId::new().to_string().starts_with("user:"));
        assert!(WalletId::new().to_string().starts_with("wallet:"));
        assert!(EscrowId::new().to_string().starts_with("escrow:"));
        assert!(TransactionId::new().to_string().starts_with("txn:"));
    }

    #[test]
    fn id_serde_roundtrip() {
        let id = EscrowId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: EscrowId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn reference_accepts_plain_keys() {
        let r = Reference::new("escrow:abc:hold").unwrap();
        assert_eq!(r.as_str(), "escrow:abc:hold");
        assert_eq!(r.to_string(), "escrow:abc:hold");
    }

    #[test]
    fn reference_rejects_empty() {
        assert!(Reference::new("").is_err());
    }

    #[test]
    fn reference_rejects_whitespace() {
        assert!(Reference::new("has space").is_err());
        assert!(Reference::new("has\ttab").is_err());
    }

    #[test]
    fn reference_rejects_oversized() {
        let long = "x".repeat(Reference::MAX_LEN + 1);
        assert!(Reference::new(long).is_err());
        let max = "x".repeat(Reference::MAX_LEN);
        assert!(Reference::new(max).is_ok());
    }
}
