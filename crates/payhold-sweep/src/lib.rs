//! # payhold-sweep — Deadline Scheduler
//!
//! Periodic sweep over escrows whose `auto_release_at` has passed:
//!
//! - `FUNDED` past deadline: auto-release to the seller.
//! - `PENDING`/`ACCEPTED` past deadline: expire (nothing was held).
//! - `DISPUTED` past deadline plus the dispute window: escalate once
//!   to the manual queue. Disputes are never auto-resolved.
//!
//! Every per-escrow action is an engine transition with its own claim,
//! so any number of scheduler instances can run against the same store:
//! at most one wins each claim and the losers count a conflict and move
//! on. A sweep failure on one escrow never stops the rest of the pass.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use payhold_core::{EngineError, Escrow, EscrowStatus, Timestamp};
use payhold_escrow::EscrowEngine;

/// Scheduler tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Seconds between sweep passes.
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self { interval_secs: 60 }
    }
}

/// Counters from one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Funded escrows auto-released to their sellers.
    pub released: u32,
    /// Stale disputes flagged for the manual queue.
    pub escalated: u32,
    /// Never-funded escrows moved to `EXPIRED`.
    pub expired: u32,
    /// Claims lost to a concurrent transition.
    pub conflicts: u32,
}

impl SweepReport {
    /// True when the pass did nothing at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The deadline-driven background worker.
pub struct DeadlineScheduler {
    engine: Arc<EscrowEngine>,
    config: SweepConfig,
}

impl DeadlineScheduler {
    /// Build a scheduler over the shared engine.
    pub fn new(engine: Arc<EscrowEngine>, config: SweepConfig) -> Self {
        Self { engine, config }
    }

    /// One full sweep pass at the given clock reading.
    ///
    /// `now` is a parameter so tests can drive the clock; `run` passes
    /// the wall clock.
    pub fn sweep_once(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport::default();
        let candidates = match self.engine.due_candidates(now) {
            Ok(candidates) => candidates,
            Err(err) => {
                error!(error = %err, "sweep candidate query failed");
                return report;
            }
        };

        for escrow in candidates {
            let attempt = match escrow.status {
                EscrowStatus::Funded => {
                    self.attempt(&escrow, || self.engine.auto_release_due(escrow.id, now))
                }
                EscrowStatus::Pending | EscrowStatus::Accepted => {
                    self.attempt(&escrow, || self.engine.expire_stale(escrow.id, now))
                }
                EscrowStatus::Disputed if !escrow.escalated => {
                    let window = self.engine.config().dispute_window_hours;
                    if escrow.auto_release_at.plus_hours(window) > now {
                        continue;
                    }
                    self.attempt(&escrow, || self.engine.escalate_dispute(escrow.id, now))
                }
                // Delivered escrows wait for the buyer; escalated
                // disputes wait for an admin.
                _ => continue,
            };
            match attempt {
                Attempt::Done => match escrow.status {
                    EscrowStatus::Funded => report.released += 1,
                    EscrowStatus::Disputed => report.escalated += 1,
                    _ => report.expired += 1,
                },
                Attempt::Conflict => report.conflicts += 1,
                Attempt::Failed => {}
            }
        }
        report
    }

    /// The scheduler loop. Runs until the task is dropped.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let report = self.sweep_once(Timestamp::now());
            if !report.is_empty() {
                info!(
                    released = report.released,
                    escalated = report.escalated,
                    expired = report.expired,
                    conflicts = report.conflicts,
                    "sweep pass complete"
                );
            }
        }
    }

    fn attempt(
        &self,
        escrow: &Escrow,
        action: impl FnOnce() -> Result<Escrow, EngineError>,
    ) -> Attempt {
        match action() {
            Ok(_) => Attempt::Done,
            Err(EngineError::StateConflict { .. }) => {
                debug!(escrow = %escrow.id, "sweep claim lost to a concurrent transition");
                Attempt::Conflict
            }
            Err(err) => {
                error!(escrow = %escrow.id, error = %err, "sweep action failed");
                Attempt::Failed
            }
        }
    }
}

enum Attempt {
    Done,
    Conflict,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use payhold_core::{Currency, Reference, UserId};
    use payhold_escrow::{CreateEscrow, EscrowConfig, TracingSink};
    use payhold_ledger::WalletLedger;
    use payhold_store::MemoryStore;
    use serde_json::json;

    struct Fixture {
        scheduler: DeadlineScheduler,
        engine: Arc<EscrowEngine>,
        ledger: WalletLedger,
        buyer: UserId,
        seller: UserId,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let engine = Arc::new(EscrowEngine::new(
            Arc::clone(&store),
            EscrowConfig::default(),
            Arc::new(TracingSink),
        ));
        Fixture {
            scheduler: DeadlineScheduler::new(Arc::clone(&engine), SweepConfig::default()),
            engine,
            ledger: WalletLedger::new(store),
            buyer: UserId::new(),
            seller: UserId::new(),
        }
    }

    fn escrow_of(fx: &Fixture, amount: i64, hours: i64) -> Escrow {
        fx.engine
            .create_escrow(CreateEscrow {
                buyer_id: fx.buyer,
                seller_id: fx.seller,
                post_id: None,
                amount,
                currency: Currency::Ngn,
                title: "laptop".into(),
                description: "used thinkpad".into(),
                terms: None,
                auto_release_hours: Some(hours),
            })
            .unwrap()
    }

    fn fund(fx: &Fixture, escrow: &Escrow) {
        fx.ledger
            .deposit(
                fx.buyer,
                Currency::Ngn,
                escrow.buyer_hold(),
                Reference::new(format!("seed:{}", escrow.id)).unwrap(),
                json!({}),
            )
            .unwrap();
        fx.engine.accept_escrow(escrow.id, fx.seller).unwrap();
        fx.engine.fund_escrow(escrow.id, fx.buyer).unwrap();
    }

    #[test]
    fn due_funded_escrow_is_released() {
        let fx = fixture();
        let escrow = escrow_of(&fx, 1000, 1);
        fund(&fx, &escrow);

        let report = fx.scheduler.sweep_once(escrow.auto_release_at.plus_hours(1));
        assert_eq!(report.released, 1);
        assert_eq!(report.conflicts, 0);

        let released = fx.engine.escrow_by_id(escrow.id, fx.seller).unwrap();
        assert_eq!(released.status, EscrowStatus::Released);
    }

    #[test]
    fn undue_escrows_are_untouched() {
        let fx = fixture();
        let escrow = escrow_of(&fx, 1000, 48);
        fund(&fx, &escrow);

        let report = fx.scheduler.sweep_once(Timestamp::now());
        assert!(report.is_empty());
        let read = fx.engine.escrow_by_id(escrow.id, fx.buyer).unwrap();
        assert_eq!(read.status, EscrowStatus::Funded);
    }

    #[test]
    fn stale_pending_and_accepted_expire() {
        let fx = fixture();
        let pending = escrow_of(&fx, 1000, 1);
        let accepted = escrow_of(&fx, 500, 1);
        fx.engine.accept_escrow(accepted.id, fx.seller).unwrap();

        let later = pending.auto_release_at.plus_hours(2);
        let report = fx.scheduler.sweep_once(later);
        assert_eq!(report.expired, 2);
        assert_eq!(report.released, 0);

        for id in [pending.id, accepted.id] {
            let read = fx.engine.escrow_by_id(id, fx.buyer).unwrap();
            assert_eq!(read.status, EscrowStatus::Expired);
        }
    }

    #[test]
    fn stale_dispute_escalates_exactly_once() {
        let fx = fixture();
        let escrow = escrow_of(&fx, 1000, 1);
        fund(&fx, &escrow);
        fx.engine
            .create_dispute(escrow.id, fx.buyer, "not as described".into())
            .unwrap();

        // Past the deadline but inside the 72h window: untouched.
        let inside = escrow.auto_release_at.plus_hours(1);
        assert!(fx.scheduler.sweep_once(inside).is_empty());

        let past = escrow.auto_release_at.plus_hours(100);
        let report = fx.scheduler.sweep_once(past);
        assert_eq!(report.escalated, 1);

        // Escalated disputes are skipped on the next pass.
        let again = fx.scheduler.sweep_once(past);
        assert!(again.is_empty());

        let read = fx.engine.escrow_by_id(escrow.id, fx.buyer).unwrap();
        assert_eq!(read.status, EscrowStatus::Disputed);
        assert!(read.escalated);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_sweeps_on_each_tick() {
        let fx = fixture();
        let escrow = escrow_of(&fx, 1000, 1);
        fund(&fx, &escrow);

        let scheduler = Arc::new(DeadlineScheduler::new(
            Arc::clone(&fx.engine),
            SweepConfig { interval_secs: 1 },
        ));
        let handle = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };
        // A few paused-clock ticks; the escrow's wall-clock deadline is
        // an hour out, so the loop just idles without panicking.
        tokio::time::sleep(Duration::from_secs(3)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());

        let read = fx.engine.escrow_by_id(escrow.id, fx.buyer).unwrap();
        assert_eq!(read.status, EscrowStatus::Funded);
    }

    #[test]
    fn delivered_escrows_wait_for_the_buyer() {
        let fx = fixture();
        let escrow = escrow_of(&fx, 1000, 1);
        fund(&fx, &escrow);
        fx.engine.mark_delivered(escrow.id, fx.seller, None).unwrap();

        let report = fx.scheduler.sweep_once(escrow.auto_release_at.plus_hours(100));
        assert!(report.is_empty());
        let read = fx.engine.escrow_by_id(escrow.id, fx.buyer).unwrap();
        assert_eq!(read.status, EscrowStatus::Delivered);
    }
}
