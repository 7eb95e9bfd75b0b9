//! # Escrow Record and Status Machine
//!
//! The persisted escrow agreement and its closed status enumeration.
//!
//! ## States
//!
//! ```text
//! PENDING ──accept──▶ ACCEPTED ──fund──▶ FUNDED ──deliver──▶ DELIVERED
//!    │ │ │               │ │                │ │ │                │ │
//!    │ │ reject          │ cancel   dispute─┘ │ └─cancel  confirm┘ └─dispute
//!    │ cancel            │ expire             │ (refund)             │
//!    │ expire            ▼                    ▼          ▼           ▼
//!    ▼               CANCELLED             DISPUTED   RELEASED   DISPUTED
//! EXPIRED / REJECTED / CANCELLED              │
//!                                   resolve───┴───▶ RELEASED | REFUNDED
//! ```
//!
//! Terminal states: `REJECTED, RELEASED, CANCELLED, REFUNDED, EXPIRED`.
//!
//! ## Security Invariant
//!
//! Status names are a closed enum, not strings — an invalid status
//! cannot exist in the system. The validity table in
//! [`EscrowStatus::can_transition_to`] is the single source of truth;
//! every engine transition re-checks it against the *persisted* status
//! inside the unit of work (the compare-and-swap claim guard).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::{EscrowId, UserId};
use crate::money::Currency;
use crate::temporal::Timestamp;

/// Lifecycle status of an escrow agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    /// Created by the buyer, awaiting the seller's answer.
    Pending,
    /// Seller accepted, awaiting the buyer's funds.
    Accepted,
    /// Seller rejected the agreement (terminal).
    Rejected,
    /// Buyer's funds are held in custody.
    Funded,
    /// Seller marked the goods/service delivered.
    Delivered,
    /// Held funds credited to the seller (terminal).
    Released,
    /// A party contested the escrow; manual resolution required.
    Disputed,
    /// Cancelled before funding (terminal).
    Cancelled,
    /// Held funds credited back to the buyer (terminal).
    Refunded,
    /// Lapsed before funding; deadline passed (terminal).
    Expired,
}

impl EscrowStatus {
    /// Whether this status is terminal (no further transitions).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Released | Self::Cancelled | Self::Refunded | Self::Expired
        )
    }

    /// Whether buyer funds are currently held under this status.
    pub fn holds_funds(&self) -> bool {
        matches!(self, Self::Funded | Self::Delivered | Self::Disputed)
    }

    /// The transition validity table.
    ///
    /// `Funded → Released` covers the scheduler's deadline auto-release;
    /// `Disputed → Released | Refunded` covers admin resolution.
    pub fn can_transition_to(&self, to: EscrowStatus) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Accepted)
                | (Self::Pending, Self::Rejected)
                | (Self::Pending, Self::Cancelled)
                | (Self::Pending, Self::Expired)
                | (Self::Accepted, Self::Funded)
                | (Self::Accepted, Self::Cancelled)
                | (Self::Accepted, Self::Expired)
                | (Self::Funded, Self::Delivered)
                | (Self::Funded, Self::Disputed)
                | (Self::Funded, Self::Refunded)
                | (Self::Funded, Self::Released)
                | (Self::Delivered, Self::Released)
                | (Self::Delivered, Self::Disputed)
                | (Self::Disputed, Self::Released)
                | (Self::Disputed, Self::Refunded)
        )
    }

    /// Canonical SCREAMING_SNAKE name, as persisted.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::Funded => "FUNDED",
            Self::Delivered => "DELIVERED",
            Self::Released => "RELEASED",
            Self::Disputed => "DISPUTED",
            Self::Cancelled => "CANCELLED",
            Self::Refunded => "REFUNDED",
            Self::Expired => "EXPIRED",
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of the agreement a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartyRole {
    /// The paying party.
    Buyer,
    /// The delivering party.
    Seller,
}

impl PartyRole {
    /// Lowercase role name, as recorded in audit fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buyer => "buyer",
            Self::Seller => "seller",
        }
    }
}

impl std::fmt::Display for PartyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conditional fund-custody agreement between a buyer and a seller.
///
/// Mutated only through the escrow engine's guarded transitions; never
/// deleted — terminal statuses are permanent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escrow {
    /// Unique escrow identifier.
    pub id: EscrowId,
    /// The paying party.
    pub buyer_id: UserId,
    /// The delivering party.
    pub seller_id: UserId,
    /// Optional marketplace post this escrow was opened from.
    pub post_id: Option<Uuid>,
    /// Principal amount in minor units.
    pub amount: i64,
    /// Platform fee in minor units, fixed at creation.
    pub fee: i64,
    /// Currency of the agreement.
    pub currency: Currency,
    /// Current lifecycle status.
    pub status: EscrowStatus,
    /// Short human-readable title.
    pub title: String,
    /// Longer description of the goods/service.
    pub description: String,
    /// Optional free-form terms agreed by the parties.
    pub terms: Option<String>,
    /// Deadline driving the auto-release sweep.
    pub auto_release_at: Timestamp,
    /// Who cancelled and why, when cancelled.
    pub cancel_reason: Option<String>,
    /// The contesting party's stated reason, when disputed.
    pub dispute_reason: Option<String>,
    /// Seller's delivery notes, when delivered.
    pub delivery_notes: Option<String>,
    /// Admin notes recorded at dispute resolution.
    pub resolution_notes: Option<String>,
    /// Set once when a stale dispute is escalated to the manual queue.
    pub escalated: bool,
    /// When the escrow was created.
    pub created_at: Timestamp,
    /// When the seller accepted.
    pub accepted_at: Option<Timestamp>,
    /// When the buyer's funds were taken into custody.
    pub funded_at: Option<Timestamp>,
    /// When the seller marked delivery.
    pub delivered_at: Option<Timestamp>,
    /// When the escrow reached a fund-terminal outcome.
    pub resolved_at: Option<Timestamp>,
    /// When the escrow was last mutated.
    pub updated_at: Timestamp,
}

impl Escrow {
    /// The role `user` plays in this escrow, if any.
    pub fn role_of(&self, user: &UserId) -> Option<PartyRole> {
        if *user == self.buyer_id {
            Some(PartyRole::Buyer)
        } else if *user == self.seller_id {
            Some(PartyRole::Seller)
        } else {
            None
        }
    }

    /// Whether `user` is the buyer or the seller.
    pub fn is_party(&self, user: &UserId) -> bool {
        self.role_of(user).is_some()
    }

    /// The amount debited from the buyer at funding time.
    ///
    /// The engine validates at creation that `amount + fee` is
    /// representable, so this sum cannot overflow.
    pub fn buyer_hold(&self) -> i64 {
        self.amount + self.fee
    }

    /// The amount credited to the seller on release.
    pub fn seller_payout(&self) -> i64 {
        self.amount - self.fee
    }
}

/// Pagination envelope for list reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Total matching records.
    pub total: u64,
    /// Total pages at this limit.
    pub total_pages: u32,
}

impl Pagination {
    /// Build a pagination envelope from a total count.
    ///
    /// A zero `limit` is treated as 1 so the envelope is always
    /// constructible.
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let limit = limit.max(1);
        let total_pages = if total == 0 {
            0
        } else {
            ((total + u64::from(limit) - 1) / u64::from(limit)) as u32
        };
        Self { page, limit, total, total_pages }
    }
}
