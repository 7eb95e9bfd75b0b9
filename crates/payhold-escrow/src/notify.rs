//! Best-effort notification seam.
//!
//! The engine announces committed transitions through a
//! [`NotificationSink`]; delivery transports (push, email, in-app) plug
//! in behind the trait. The engine calls the sink only after its unit
//! of work commits, and ignores whatever the sink does with the event.

use tracing::info;

use payhold_core::{Escrow, UserId};

/// A committed escrow lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscrowEvent {
    Created,
    Accepted,
    Rejected,
    Funded,
    Delivered,
    Released,
    Disputed,
    Cancelled,
    Refunded,
    Expired,
    Escalated,
    DeadlineExtended,
}

impl EscrowEvent {
    /// Stable event name for logs and downstream payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "escrow_created",
            Self::Accepted => "escrow_accepted",
            Self::Rejected => "escrow_rejected",
            Self::Funded => "escrow_funded",
            Self::Delivered => "escrow_delivered",
            Self::Released => "escrow_released",
            Self::Disputed => "escrow_disputed",
            Self::Cancelled => "escrow_cancelled",
            Self::Refunded => "escrow_refunded",
            Self::Expired => "escrow_expired",
            Self::Escalated => "escrow_escalated",
            Self::DeadlineExtended => "escrow_deadline_extended",
        }
    }
}

impl std::fmt::Display for EscrowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fire-and-forget delivery of a committed event to one party.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, user: UserId, event: EscrowEvent, escrow: &Escrow);
}

/// Default sink: structured log lines, nothing else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, user: UserId, event: EscrowEvent, escrow: &Escrow) {
        info!(
            user = %user,
            event = %event,
            escrow = %escrow.id,
            status = %escrow.status,
            "escrow notification"
        );
    }
}
