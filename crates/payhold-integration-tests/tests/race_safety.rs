//! Concurrency tests with real threads against one shared store.
//!
//! Every race here has the same shape: several threads attempt the
//! same claim, exactly one wins, and wallet balances afterwards show
//! exactly one application.

use std::sync::Arc;
use std::thread;

use serde_json::json;

use payhold_core::{Currency, EngineError, Escrow, EscrowStatus, Reference, UserId};
use payhold_escrow::{CreateEscrow, EscrowConfig, EscrowEngine, TracingSink};
use payhold_ledger::WalletLedger;
use payhold_store::MemoryStore;
use payhold_sweep::{DeadlineScheduler, SweepConfig};

struct Harness {
    store: Arc<MemoryStore>,
    engine: Arc<EscrowEngine>,
    ledger: WalletLedger,
    buyer: UserId,
    seller: UserId,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    Harness {
        engine: Arc::new(EscrowEngine::new(
            Arc::clone(&store),
            EscrowConfig::default(),
            Arc::new(TracingSink),
        )),
        ledger: WalletLedger::new(Arc::clone(&store)),
        store,
        buyer: UserId::new(),
        seller: UserId::new(),
    }
}

fn balance(h: &Harness, user: UserId) -> i64 {
    h.store
        .transact(|uow| Ok(uow.wallet(&user, Currency::Ngn).map_or(0, |w| w.balance)))
        .unwrap()
}

fn accepted_escrow(h: &Harness, amount: i64) -> Escrow {
    let escrow = h
        .engine
        .create_escrow(CreateEscrow {
            buyer_id: h.buyer,
            seller_id: h.seller,
            post_id: None,
            amount,
            currency: Currency::Ngn,
            title: "race target".into(),
            description: "shared escrow".into(),
            terms: None,
            auto_release_hours: Some(72),
        })
        .unwrap();
    h.engine.accept_escrow(escrow.id, h.seller).unwrap()
}

#[test]
fn concurrent_funding_debits_exactly_once() {
    let h = harness();
    h.ledger
        .deposit(h.buyer, Currency::Ngn, 10_000, Reference::new("seed").unwrap(), json!({}))
        .unwrap();
    let escrow = accepted_escrow(&h, 1000);

    let outcomes: Vec<Result<Escrow, EngineError>> = thread::scope(|s| {
        (0..4)
            .map(|_| {
                let engine = Arc::clone(&h.engine);
                let buyer = h.buyer;
                s.spawn(move || engine.fund_escrow(escrow.id, buyer))
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1);
    for loss in outcomes.iter().filter(|r| r.is_err()) {
        assert!(matches!(loss, Err(EngineError::StateConflict { .. })));
    }
    // One hold of 1050, not four.
    assert_eq!(balance(&h, h.buyer), 8950);
}

#[test]
fn concurrent_sweeps_release_exactly_once() {
    let h = harness();
    h.ledger
        .deposit(h.buyer, Currency::Ngn, 2000, Reference::new("seed").unwrap(), json!({}))
        .unwrap();
    let escrow = accepted_escrow(&h, 1000);
    h.engine.fund_escrow(escrow.id, h.buyer).unwrap();
    let later = escrow.auto_release_at.plus_hours(1);

    let reports: Vec<_> = thread::scope(|s| {
        (0..3)
            .map(|_| {
                let engine = Arc::clone(&h.engine);
                s.spawn(move || {
                    DeadlineScheduler::new(engine, SweepConfig::default()).sweep_once(later)
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let released: u32 = reports.iter().map(|r| r.released).sum();
    assert_eq!(released, 1);
    assert_eq!(balance(&h, h.seller), 950);
    let read = h.engine.escrow_by_id(escrow.id, h.seller).unwrap();
    assert_eq!(read.status, EscrowStatus::Released);
}

#[test]
fn concurrent_withdrawals_never_overdraw() {
    let h = harness();
    let user = UserId::new();
    let ledger = &h.ledger;
    ledger
        .deposit(user, Currency::Ngn, 1000, Reference::new("seed").unwrap(), json!({}))
        .unwrap();

    // Ten threads each try to withdraw 300 from a 1000 balance; at
    // most three can succeed.
    let outcomes: Vec<_> = thread::scope(|s| {
        (0..10)
            .map(|i| {
                s.spawn(move || {
                    ledger.withdraw(
                        user,
                        Currency::Ngn,
                        300,
                        0,
                        Reference::new(format!("wd-{i}")).unwrap(),
                        json!({}),
                    )
                })
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 3);
    assert_eq!(balance(&h, user), 100);
    for loss in outcomes.iter().filter(|r| r.is_err()) {
        assert!(matches!(loss, Err(EngineError::InsufficientFunds { .. })));
    }
}

#[test]
fn concurrent_dispute_and_delivery_claims_are_ordered() {
    let h = harness();
    h.ledger
        .deposit(h.buyer, Currency::Ngn, 2000, Reference::new("seed").unwrap(), json!({}))
        .unwrap();
    let escrow = accepted_escrow(&h, 1000);
    h.engine.fund_escrow(escrow.id, h.buyer).unwrap();

    // Buyer disputes while the seller marks delivery. Both are valid
    // from FUNDED, so exactly one claim wins.
    let (dispute, deliver) = thread::scope(|s| {
        let dispute = {
            let engine = Arc::clone(&h.engine);
            let buyer = h.buyer;
            s.spawn(move || engine.create_dispute(escrow.id, buyer, "cold feet".into()))
        };
        let deliver = {
            let engine = Arc::clone(&h.engine);
            let seller = h.seller;
            s.spawn(move || engine.mark_delivered(escrow.id, seller, None))
        };
        (dispute.join().unwrap(), deliver.join().unwrap())
    });

    let read = h.engine.escrow_by_id(escrow.id, h.buyer).unwrap();
    match (dispute.is_ok(), deliver.is_ok()) {
        (true, false) => assert_eq!(read.status, EscrowStatus::Disputed),
        (false, true) => assert_eq!(read.status, EscrowStatus::Delivered),
        // DELIVERED still admits a dispute, so both may succeed when
        // delivery lands first.
        (true, true) => assert_eq!(read.status, EscrowStatus::Disputed),
        (false, false) => panic!("both claims failed"),
    }
    // Custody is untouched either way.
    assert_eq!(balance(&h, h.buyer), 950);
    assert_eq!(balance(&h, h.seller), 0);
}
