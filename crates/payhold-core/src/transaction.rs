//! # Transaction Record
//!
//! The immutable, append-only audit record behind every balance change.
//! A wallet balance is never mutated without a matching `Transaction`
//! written in the same unit of work, and the globally unique reference
//! on each record is the ledger's idempotency key.

use serde::{Deserialize, Serialize};

use crate::identity::{Reference, TransactionId, UserId, WalletId};
use crate::money::Currency;
use crate::temporal::Timestamp;

/// The kind of balance movement a transaction records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Gateway-confirmed credit into a wallet.
    Deposit,
    /// Gateway-bound debit out of a wallet.
    Withdrawal,
    /// Buyer funds moved into escrow custody (amount + fee).
    EscrowHold,
    /// Held funds credited to the seller (amount − fee).
    EscrowRelease,
    /// Held funds credited back to the buyer (amount + fee).
    EscrowRefund,
    /// Incoming side of a wallet-to-wallet transfer.
    TransferIn,
    /// Outgoing side of a wallet-to-wallet transfer.
    TransferOut,
}

impl TransactionKind {
    /// Canonical SCREAMING_SNAKE name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "DEPOSIT",
            Self::Withdrawal => "WITHDRAWAL",
            Self::EscrowHold => "ESCROW_HOLD",
            Self::EscrowRelease => "ESCROW_RELEASE",
            Self::EscrowRefund => "ESCROW_REFUND",
            Self::TransferIn => "TRANSFER_IN",
            Self::TransferOut => "TRANSFER_OUT",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settlement status of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    /// Accepted but not yet settled.
    Pending,
    /// Settled; the balance mutation is committed. Only completed
    /// references block idempotent replay.
    Completed,
    /// Rejected; no balance effect.
    Failed,
}

impl TransactionStatus {
    /// Canonical SCREAMING_SNAKE name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable ledger audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction identifier.
    pub id: TransactionId,
    /// The user whose wallet moved.
    pub user_id: UserId,
    /// The wallet that moved.
    pub wallet_id: WalletId,
    /// What kind of movement this was.
    pub kind: TransactionKind,
    /// Absolute amount moved, in minor units.
    pub amount: i64,
    /// Fee component of the movement, in minor units.
    pub fee: i64,
    /// `amount − fee`, in minor units.
    pub net_amount: i64,
    /// Currency of the movement.
    pub currency: Currency,
    /// Settlement status.
    pub status: TransactionStatus,
    /// Globally unique idempotency reference.
    pub reference: Reference,
    /// Free-form context (escrow id, gateway payload, admin notes).
    pub metadata: serde_json::Value,
    /// When the record was written.
    pub created_at: Timestamp,
}

impl Transaction {
    /// Build a completed transaction record.
    #[allow(clippy::too_many_arguments)]
    pub fn completed(
        user_id: UserId,
        wallet_id: WalletId,
        kind: TransactionKind,
        amount: i64,
        fee: i64,
        currency: Currency,
        reference: Reference,
        metadata: serde_json::Value,
        now: Timestamp,
    ) -> Self {
        Self {
            id: TransactionId::new(),
            user_id,
            wallet_id,
            kind,
            amount,
            fee,
            net_amount: amount - fee,
            currency,
            status: TransactionStatus::Completed,
            reference,
            metadata,
            created_at: now,
        }
    }
}
