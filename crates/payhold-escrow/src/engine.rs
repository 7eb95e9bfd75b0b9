//! The escrow engine: every lifecycle transition, guarded.
//!
//! Each operation runs as one unit of work. Inside it the engine
//! re-reads the persisted escrow, checks the actor, and claims the
//! transition against the validity table before touching anything. A
//! concurrent transition that got there first turns the claim into
//! `StateConflict` and the unit of work commits nothing.
//!
//! Fund-moving transitions call [`WalletLedger::apply_in`] in the same
//! unit of work with a deterministic reference derived from the escrow
//! id (`escrow:{uuid}:hold|release|refund`), so even a hypothetical
//! double claim would be stopped a second time by ledger idempotency.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use payhold_core::{
    money, Currency, EngineError, Escrow, EscrowId, EscrowStatus, Pagination, PartyRole,
    Reference, Timestamp, TransactionKind, UserId,
};
use payhold_ledger::{LedgerApply, WalletLedger};
use payhold_store::{MemoryStore, UnitOfWork};

use crate::config::EscrowConfig;
use crate::dispute::ResolutionOutcome;
use crate::notify::{EscrowEvent, NotificationSink};

/// Request to open a new escrow agreement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateEscrow {
    /// The paying party (also the creator).
    pub buyer_id: UserId,
    /// The delivering party.
    pub seller_id: UserId,
    /// Optional marketplace post this escrow was opened from.
    pub post_id: Option<Uuid>,
    /// Principal in minor units.
    pub amount: i64,
    /// Agreement currency.
    pub currency: Currency,
    /// Short title.
    pub title: String,
    /// Description of the goods/service.
    pub description: String,
    /// Optional free-form terms.
    pub terms: Option<String>,
    /// Deadline in hours from creation; engine default when `None`.
    pub auto_release_hours: Option<i64>,
}

/// The escrow state machine over a transactional store.
pub struct EscrowEngine {
    store: Arc<MemoryStore>,
    config: EscrowConfig,
    sink: Arc<dyn NotificationSink>,
}

impl EscrowEngine {
    /// Build an engine over the given store, policy, and sink.
    pub fn new(
        store: Arc<MemoryStore>,
        config: EscrowConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { store, config, sink }
    }

    /// The active policy.
    pub fn config(&self) -> &EscrowConfig {
        &self.config
    }

    // ── Lifecycle operations ────────────────────────────────────────

    /// Open a new agreement in `PENDING` with the fee fixed from the
    /// configured basis points.
    pub fn create_escrow(&self, req: CreateEscrow) -> Result<Escrow, EngineError> {
        if req.buyer_id == req.seller_id {
            return Err(EngineError::Validation(
                "buyer and seller must be distinct users".to_string(),
            ));
        }
        money::require_positive(req.amount, "escrow amount")?;
        if req.title.trim().is_empty() {
            return Err(EngineError::Validation("title must not be empty".to_string()));
        }
        let hours = req
            .auto_release_hours
            .unwrap_or(self.config.default_auto_release_hours);
        if hours < 1 || hours > self.config.max_deadline_hours {
            return Err(EngineError::Validation(format!(
                "auto_release_hours must be in [1, {}], got {hours}",
                self.config.max_deadline_hours
            )));
        }
        let fee = money::basis_points(req.amount, self.config.fee_bps)?;
        if fee >= req.amount {
            return Err(EngineError::Validation(format!(
                "fee {fee} must be below amount {}",
                req.amount
            )));
        }
        // The buyer hold (amount + fee) must be representable; later
        // fund/refund legs rely on this.
        money::checked_add(req.amount, fee)?;

        let now = Timestamp::now();
        let escrow = Escrow {
            id: EscrowId::new(),
            buyer_id: req.buyer_id,
            seller_id: req.seller_id,
            post_id: req.post_id,
            amount: req.amount,
            fee,
            currency: req.currency,
            status: EscrowStatus::Pending,
            title: req.title,
            description: req.description,
            terms: req.terms,
            auto_release_at: now.plus_hours(hours),
            cancel_reason: None,
            dispute_reason: None,
            delivery_notes: None,
            resolution_notes: None,
            escalated: false,
            created_at: now,
            accepted_at: None,
            funded_at: None,
            delivered_at: None,
            resolved_at: None,
            updated_at: now,
        };

        let escrow = self.store.transact(|uow| {
            uow.insert_escrow(escrow.clone())?;
            Ok(escrow.clone())
        })?;

        info!(escrow = %escrow.id, amount = escrow.amount, fee = escrow.fee, "escrow created");
        self.notify_parties(EscrowEvent::Created, &escrow);
        Ok(escrow)
    }

    /// Seller accepts a pending agreement.
    pub fn accept_escrow(&self, id: EscrowId, actor: UserId) -> Result<Escrow, EngineError> {
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            require_role(&escrow, &actor, PartyRole::Seller, "accept escrow")?;
            claim(&escrow, &[EscrowStatus::Pending], EscrowStatus::Accepted)?;
            let now = Timestamp::now();
            escrow.status = EscrowStatus::Accepted;
            escrow.accepted_at = Some(now);
            escrow.updated_at = now;
            uow.put_escrow(escrow.clone())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, "escrow accepted");
        self.notify_parties(EscrowEvent::Accepted, &escrow);
        Ok(escrow)
    }

    /// Seller declines a pending agreement. Terminal; no funds were
    /// ever held.
    pub fn reject_escrow(
        &self,
        id: EscrowId,
        actor: UserId,
        reason: Option<String>,
    ) -> Result<Escrow, EngineError> {
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            require_role(&escrow, &actor, PartyRole::Seller, "reject escrow")?;
            claim(&escrow, &[EscrowStatus::Pending], EscrowStatus::Rejected)?;
            let now = Timestamp::now();
            escrow.status = EscrowStatus::Rejected;
            escrow.cancel_reason = Some(match reason {
                Some(r) => format!("seller: {r}"),
                None => "seller: rejected".to_string(),
            });
            escrow.updated_at = now;
            uow.put_escrow(escrow.clone())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, "escrow rejected");
        self.notify_parties(EscrowEvent::Rejected, &escrow);
        Ok(escrow)
    }

    /// Buyer funds an accepted agreement: `amount + fee` leaves the
    /// buyer's wallet and enters custody, atomically with the status
    /// flip.
    pub fn fund_escrow(&self, id: EscrowId, actor: UserId) -> Result<Escrow, EngineError> {
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            require_role(&escrow, &actor, PartyRole::Buyer, "fund escrow")?;
            claim(&escrow, &[EscrowStatus::Accepted], EscrowStatus::Funded)?;
            let now = Timestamp::now();
            WalletLedger::apply_in(
                uow,
                LedgerApply {
                    user_id: escrow.buyer_id,
                    currency: escrow.currency,
                    delta: -escrow.buyer_hold(),
                    kind: TransactionKind::EscrowHold,
                    fee: escrow.fee,
                    reference: leg_reference(&escrow.id, "hold")?,
                    metadata: json!({ "escrow_id": escrow.id.to_string() }),
                },
            )?;
            escrow.status = EscrowStatus::Funded;
            escrow.funded_at = Some(now);
            escrow.updated_at = now;
            uow.put_escrow(escrow.clone())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, hold = escrow.buyer_hold(), "escrow funded");
        self.notify_parties(EscrowEvent::Funded, &escrow);
        Ok(escrow)
    }

    /// Seller marks the goods/service delivered.
    pub fn mark_delivered(
        &self,
        id: EscrowId,
        actor: UserId,
        notes: Option<String>,
    ) -> Result<Escrow, EngineError> {
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            require_role(&escrow, &actor, PartyRole::Seller, "mark delivered")?;
            claim(&escrow, &[EscrowStatus::Funded], EscrowStatus::Delivered)?;
            let now = Timestamp::now();
            escrow.status = EscrowStatus::Delivered;
            escrow.delivery_notes = notes;
            escrow.delivered_at = Some(now);
            escrow.updated_at = now;
            uow.put_escrow(escrow.clone())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, "escrow delivered");
        self.notify_parties(EscrowEvent::Delivered, &escrow);
        Ok(escrow)
    }

    /// Buyer confirms delivery: custody releases to the seller.
    pub fn confirm_delivery(&self, id: EscrowId, actor: UserId) -> Result<Escrow, EngineError> {
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            require_role(&escrow, &actor, PartyRole::Buyer, "confirm delivery")?;
            claim(&escrow, &[EscrowStatus::Delivered], EscrowStatus::Released)?;
            release_in(uow, &mut escrow, Timestamp::now())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, payout = escrow.seller_payout(), "escrow released");
        self.notify_parties(EscrowEvent::Released, &escrow);
        Ok(escrow)
    }

    /// Either party contests a funded or delivered escrow. Funds stay
    /// in custody until resolution.
    pub fn create_dispute(
        &self,
        id: EscrowId,
        actor: UserId,
        reason: String,
    ) -> Result<Escrow, EngineError> {
        if reason.trim().is_empty() {
            return Err(EngineError::Validation(
                "dispute reason must not be empty".to_string(),
            ));
        }
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            let role = require_party(&escrow, &actor, "dispute escrow")?;
            claim(
                &escrow,
                &[EscrowStatus::Funded, EscrowStatus::Delivered],
                EscrowStatus::Disputed,
            )?;
            let now = Timestamp::now();
            escrow.status = EscrowStatus::Disputed;
            escrow.dispute_reason = Some(format!("{role}: {reason}"));
            escrow.updated_at = now;
            uow.put_escrow(escrow.clone())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, "escrow disputed");
        self.notify_parties(EscrowEvent::Disputed, &escrow);
        Ok(escrow)
    }

    /// Either party cancels. Before funding this is a plain terminal
    /// transition; on a funded escrow it refunds the full hold to the
    /// buyer.
    pub fn cancel_escrow(
        &self,
        id: EscrowId,
        actor: UserId,
        reason: Option<String>,
    ) -> Result<Escrow, EngineError> {
        let (escrow, refunded) = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            let role = require_party(&escrow, &actor, "cancel escrow")?;
            let now = Timestamp::now();
            let noted = match &reason {
                Some(r) => format!("{role}: {r}"),
                None => format!("{role}: cancelled"),
            };
            match escrow.status {
                EscrowStatus::Pending | EscrowStatus::Accepted => {
                    claim(&escrow, &[escrow.status], EscrowStatus::Cancelled)?;
                    escrow.status = EscrowStatus::Cancelled;
                    escrow.cancel_reason = Some(noted);
                    escrow.updated_at = now;
                    uow.put_escrow(escrow.clone())?;
                    Ok((escrow, false))
                }
                EscrowStatus::Funded => {
                    claim(&escrow, &[EscrowStatus::Funded], EscrowStatus::Refunded)?;
                    escrow.cancel_reason = Some(noted);
                    refund_in(uow, &mut escrow, now)?;
                    Ok((escrow, true))
                }
                other => Err(EngineError::StateConflict {
                    escrow: escrow.id.to_string(),
                    expected: "PENDING | ACCEPTED | FUNDED".to_string(),
                    actual: other.to_string(),
                }),
            }
        })?;
        info!(escrow = %escrow.id, refunded, "escrow cancelled");
        let event = if refunded { EscrowEvent::Refunded } else { EscrowEvent::Cancelled };
        self.notify_parties(event, &escrow);
        Ok(escrow)
    }

    /// Push the auto-release deadline back by `additional_hours`.
    /// Allowed to either party while funds are held and delivery is
    /// unconfirmed; capped at the configured window from the funding
    /// time.
    pub fn extend_deadline(
        &self,
        id: EscrowId,
        actor: UserId,
        additional_hours: i64,
    ) -> Result<Escrow, EngineError> {
        if additional_hours < 1 {
            return Err(EngineError::Validation(format!(
                "additional_hours must be positive, got {additional_hours}"
            )));
        }
        let max_hours = self.config.max_deadline_hours;
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            require_party(&escrow, &actor, "extend deadline")?;
            if !matches!(escrow.status, EscrowStatus::Funded | EscrowStatus::Delivered) {
                return Err(EngineError::StateConflict {
                    escrow: escrow.id.to_string(),
                    expected: "FUNDED | DELIVERED".to_string(),
                    actual: escrow.status.to_string(),
                });
            }
            let new_deadline = escrow.auto_release_at.plus_hours(additional_hours);
            let anchor = escrow.funded_at.unwrap_or(escrow.created_at);
            let cap = anchor.plus_hours(max_hours);
            if new_deadline > cap {
                return Err(EngineError::Validation(format!(
                    "new deadline {new_deadline} exceeds the maximum {cap}"
                )));
            }
            escrow.auto_release_at = new_deadline;
            escrow.updated_at = Timestamp::now();
            uow.put_escrow(escrow.clone())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, deadline = %escrow.auto_release_at, "deadline extended");
        self.notify_parties(EscrowEvent::DeadlineExtended, &escrow);
        Ok(escrow)
    }

    // ── Reads ───────────────────────────────────────────────────────

    /// Fetch one escrow, visible to its parties only.
    pub fn escrow_by_id(&self, id: EscrowId, actor: UserId) -> Result<Escrow, EngineError> {
        self.store.transact(|uow| {
            let escrow = load(uow, &id)?;
            require_party(&escrow, &actor, "view escrow")?;
            Ok(escrow)
        })
    }

    /// A page of the user's escrows, newest first. `limit` is clamped
    /// to 100 and `page` is 1-based.
    pub fn escrows_for_user(
        &self,
        user: UserId,
        page: u32,
        limit: u32,
    ) -> Result<(Vec<Escrow>, Pagination), EngineError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page as usize - 1) * limit as usize;
        let (items, total) = self
            .store
            .transact(|uow| Ok(uow.escrows_for_user(&user, offset, limit as usize)))?;
        Ok((items, Pagination::new(page, limit, total)))
    }

    // ── Scheduler support ───────────────────────────────────────────

    /// Non-terminal escrows whose deadline has passed as of `now`.
    pub fn due_candidates(&self, now: Timestamp) -> Result<Vec<Escrow>, EngineError> {
        self.store.transact(|uow| Ok(uow.escrows_due(now)))
    }

    /// Claim and release a funded escrow whose deadline has passed.
    /// A concurrent claimer that won first surfaces as `StateConflict`.
    pub fn auto_release_due(&self, id: EscrowId, now: Timestamp) -> Result<Escrow, EngineError> {
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            claim(&escrow, &[EscrowStatus::Funded], EscrowStatus::Released)?;
            if escrow.auto_release_at > now {
                return Err(EngineError::Validation(format!(
                    "escrow {} deadline {} has not passed",
                    escrow.id, escrow.auto_release_at
                )));
            }
            release_in(uow, &mut escrow, now)?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, "deadline auto-release");
        self.notify_parties(EscrowEvent::Released, &escrow);
        Ok(escrow)
    }

    /// Expire a never-funded escrow whose deadline has passed. No
    /// ledger effect; nothing was ever held.
    pub fn expire_stale(&self, id: EscrowId, now: Timestamp) -> Result<Escrow, EngineError> {
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            claim(
                &escrow,
                &[EscrowStatus::Pending, EscrowStatus::Accepted],
                EscrowStatus::Expired,
            )?;
            if escrow.auto_release_at > now {
                return Err(EngineError::Validation(format!(
                    "escrow {} deadline {} has not passed",
                    escrow.id, escrow.auto_release_at
                )));
            }
            escrow.status = EscrowStatus::Expired;
            escrow.updated_at = now;
            uow.put_escrow(escrow.clone())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, "escrow expired");
        self.notify_parties(EscrowEvent::Expired, &escrow);
        Ok(escrow)
    }

    /// Flag a stale dispute for the manual admin queue, once. The
    /// escrow stays `DISPUTED` and resolvable; only the flag and the
    /// notification change.
    pub fn escalate_dispute(&self, id: EscrowId, now: Timestamp) -> Result<Escrow, EngineError> {
        let window = self.config.dispute_window_hours;
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            if escrow.status != EscrowStatus::Disputed || escrow.escalated {
                return Err(EngineError::StateConflict {
                    escrow: escrow.id.to_string(),
                    expected: "DISPUTED".to_string(),
                    actual: if escrow.escalated {
                        "ESCALATED".to_string()
                    } else {
                        escrow.status.to_string()
                    },
                });
            }
            if escrow.auto_release_at.plus_hours(window) > now {
                return Err(EngineError::Validation(format!(
                    "escrow {} is still inside the dispute window",
                    escrow.id
                )));
            }
            escrow.escalated = true;
            escrow.updated_at = now;
            uow.put_escrow(escrow.clone())?;
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, "dispute escalated");
        self.notify_parties(EscrowEvent::Escalated, &escrow);
        Ok(escrow)
    }

    // ── Dispute resolution internal ─────────────────────────────────

    /// Admin resolution of a disputed escrow. Reached only through
    /// [`crate::DisputeResolver`]; uses the same release/refund
    /// internals as the party-driven paths.
    pub(crate) fn resolve_dispute(
        &self,
        id: EscrowId,
        admin_id: UserId,
        outcome: ResolutionOutcome,
        notes: String,
    ) -> Result<Escrow, EngineError> {
        if notes.trim().is_empty() {
            return Err(EngineError::Validation(
                "resolution notes must not be empty".to_string(),
            ));
        }
        let target = match outcome {
            ResolutionOutcome::Release => EscrowStatus::Released,
            ResolutionOutcome::Refund => EscrowStatus::Refunded,
        };
        let escrow = self.store.transact(|uow| {
            let mut escrow = load(uow, &id)?;
            if escrow.is_party(&admin_id) {
                return Err(EngineError::UnauthorizedActor {
                    action: "resolve dispute",
                    user: admin_id.to_string(),
                });
            }
            claim(&escrow, &[EscrowStatus::Disputed], target)?;
            let now = Timestamp::now();
            escrow.resolution_notes = Some(format!("{admin_id}: {notes}"));
            match outcome {
                ResolutionOutcome::Release => release_in(uow, &mut escrow, now)?,
                ResolutionOutcome::Refund => refund_in(uow, &mut escrow, now)?,
            }
            Ok(escrow)
        })?;
        info!(escrow = %escrow.id, outcome = %escrow.status, "dispute resolved");
        let event = match outcome {
            ResolutionOutcome::Release => EscrowEvent::Released,
            ResolutionOutcome::Refund => EscrowEvent::Refunded,
        };
        self.notify_parties(event, &escrow);
        Ok(escrow)
    }

    fn notify_parties(&self, event: EscrowEvent, escrow: &Escrow) {
        self.sink.notify(escrow.buyer_id, event, escrow);
        self.sink.notify(escrow.seller_id, event, escrow);
    }
}

// ── Shared transition internals ─────────────────────────────────────

fn load(uow: &UnitOfWork<'_>, id: &EscrowId) -> Result<Escrow, EngineError> {
    uow.escrow(id).ok_or_else(|| EngineError::NotFound {
        entity: "escrow",
        id: id.to_string(),
    })
}

/// The compare-and-swap claim: the persisted status must be in the
/// allowed set and the validity table must admit the target.
fn claim(escrow: &Escrow, allowed: &[EscrowStatus], to: EscrowStatus) -> Result<(), EngineError> {
    if !allowed.contains(&escrow.status) || !escrow.status.can_transition_to(to) {
        return Err(EngineError::StateConflict {
            escrow: escrow.id.to_string(),
            expected: allowed
                .iter()
                .map(EscrowStatus::as_str)
                .collect::<Vec<_>>()
                .join(" | "),
            actual: escrow.status.to_string(),
        });
    }
    Ok(())
}

fn require_party(
    escrow: &Escrow,
    user: &UserId,
    action: &'static str,
) -> Result<PartyRole, EngineError> {
    escrow.role_of(user).ok_or_else(|| EngineError::UnauthorizedActor {
        action,
        user: user.to_string(),
    })
}

fn require_role(
    escrow: &Escrow,
    user: &UserId,
    role: PartyRole,
    action: &'static str,
) -> Result<(), EngineError> {
    if require_party(escrow, user, action)? != role {
        return Err(EngineError::UnauthorizedActor {
            action,
            user: user.to_string(),
        });
    }
    Ok(())
}

/// Deterministic per-leg idempotency reference: `escrow:{uuid}:{leg}`.
fn leg_reference(id: &EscrowId, leg: &str) -> Result<Reference, EngineError> {
    Reference::new(format!("{id}:{leg}"))
}

/// Credit the seller `amount − fee` and finish in `RELEASED`.
fn release_in(
    uow: &mut UnitOfWork<'_>,
    escrow: &mut Escrow,
    now: Timestamp,
) -> Result<(), EngineError> {
    WalletLedger::apply_in(
        uow,
        LedgerApply {
            user_id: escrow.seller_id,
            currency: escrow.currency,
            delta: escrow.seller_payout(),
            kind: TransactionKind::EscrowRelease,
            fee: 0,
            reference: leg_reference(&escrow.id, "release")?,
            metadata: json!({ "escrow_id": escrow.id.to_string() }),
        },
    )?;
    escrow.status = EscrowStatus::Released;
    escrow.resolved_at = Some(now);
    escrow.updated_at = now;
    uow.put_escrow(escrow.clone())
}

/// Credit the buyer the full `amount + fee` hold back and finish in
/// `REFUNDED`.
fn refund_in(
    uow: &mut UnitOfWork<'_>,
    escrow: &mut Escrow,
    now: Timestamp,
) -> Result<(), EngineError> {
    WalletLedger::apply_in(
        uow,
        LedgerApply {
            user_id: escrow.buyer_id,
            currency: escrow.currency,
            delta: escrow.buyer_hold(),
            kind: TransactionKind::EscrowRefund,
            fee: 0,
            reference: leg_reference(&escrow.id, "refund")?,
            metadata: json!({ "escrow_id": escrow.id.to_string() }),
        },
    )?;
    escrow.status = EscrowStatus::Refunded;
    escrow.resolved_at = Some(now);
    escrow.updated_at = now;
    uow.put_escrow(escrow.clone())
}
