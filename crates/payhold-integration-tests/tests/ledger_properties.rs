//! Property tests for fund conservation and reference idempotency.

use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;

use payhold_core::{Currency, EscrowStatus, Reference, TransactionKind, UserId};
use payhold_escrow::{
    CreateEscrow, DisputeResolver, EscrowConfig, EscrowEngine, ResolutionOutcome, TracingSink,
};
use payhold_ledger::{LedgerApply, WalletLedger};
use payhold_store::MemoryStore;

/// How a generated escrow reaches a terminal state.
#[derive(Debug, Clone, Copy)]
enum Outcome {
    Confirmed,
    Cancelled,
    AdminRefund,
    AdminRelease,
}

fn outcome_strategy() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        Just(Outcome::Confirmed),
        Just(Outcome::Cancelled),
        Just(Outcome::AdminRefund),
        Just(Outcome::AdminRelease),
    ]
}

fn fee_of(amount: i64) -> i64 {
    amount * 500 / 10_000
}

proptest! {
    /// Run a batch of escrows with mixed terminal outcomes and check
    /// the conservation equation: money only leaves the two parties'
    /// wallets as the platform's fee margin on released escrows
    /// (`2 × fee`: the buyer paid `amount + fee`, the seller received
    /// `amount − fee`). Refunded escrows are a wash.
    #[test]
    fn conservation_over_mixed_outcomes(
        escrows in proptest::collection::vec((100i64..10_000, outcome_strategy()), 1..10)
    ) {
        let store = Arc::new(MemoryStore::new());
        let engine = EscrowEngine::new(
            Arc::clone(&store),
            EscrowConfig::default(),
            Arc::new(TracingSink),
        );
        let engine = Arc::new(engine);
        let resolver = DisputeResolver::new(Arc::clone(&engine));
        let ledger = WalletLedger::new(Arc::clone(&store));
        let buyer = UserId::new();
        let seller = UserId::new();
        let admin = UserId::new();

        let seeded: i64 = escrows.iter().map(|(amount, _)| amount + fee_of(*amount)).sum();
        ledger
            .deposit(buyer, Currency::Ngn, seeded, Reference::new("seed").unwrap(), json!({}))
            .unwrap();

        let mut fee_margin = 0i64;
        for (amount, outcome) in &escrows {
            let escrow = engine
                .create_escrow(CreateEscrow {
                    buyer_id: buyer,
                    seller_id: seller,
                    post_id: None,
                    amount: *amount,
                    currency: Currency::Ngn,
                    title: "prop".into(),
                    description: "generated".into(),
                    terms: None,
                    auto_release_hours: Some(72),
                })
                .unwrap();
            engine.accept_escrow(escrow.id, seller).unwrap();
            engine.fund_escrow(escrow.id, buyer).unwrap();

            let terminal = match outcome {
                Outcome::Confirmed => {
                    engine.mark_delivered(escrow.id, seller, None).unwrap();
                    engine.confirm_delivery(escrow.id, buyer).unwrap()
                }
                Outcome::Cancelled => {
                    engine.cancel_escrow(escrow.id, buyer, None).unwrap()
                }
                Outcome::AdminRefund => {
                    engine.create_dispute(escrow.id, buyer, "contested".into()).unwrap();
                    resolver
                        .resolve(escrow.id, admin, ResolutionOutcome::Refund, "buyer wins".into())
                        .unwrap()
                }
                Outcome::AdminRelease => {
                    engine.create_dispute(escrow.id, seller, "contested".into()).unwrap();
                    resolver
                        .resolve(escrow.id, admin, ResolutionOutcome::Release, "seller wins".into())
                        .unwrap()
                }
            };
            prop_assert!(terminal.status.is_terminal());
            if terminal.status == EscrowStatus::Released {
                fee_margin += 2 * terminal.fee;
            }

            // Exactly one resolution leg per escrow.
            store
                .transact(|uow| {
                    let release = uow.transaction_by_reference(
                        &Reference::new(format!("{}:release", terminal.id)).unwrap(),
                    );
                    let refund = uow.transaction_by_reference(
                        &Reference::new(format!("{}:refund", terminal.id)).unwrap(),
                    );
                    assert!(release.is_some() != refund.is_some());
                    Ok(())
                })
                .unwrap();
        }

        let (buyer_balance, seller_balance) = store
            .transact(|uow| {
                Ok((
                    uow.wallet(&buyer, Currency::Ngn).map_or(0, |w| w.balance),
                    uow.wallet(&seller, Currency::Ngn).map_or(0, |w| w.balance),
                ))
            })
            .unwrap();
        prop_assert_eq!(buyer_balance + seller_balance, seeded - fee_margin);
        prop_assert!(buyer_balance >= 0 && seller_balance >= 0);
    }

    /// Replaying a deposit reference any number of times credits once.
    #[test]
    fn deposit_replay_credits_once(
        amount in 1i64..1_000_000,
        replays in 1usize..5,
    ) {
        let store = Arc::new(MemoryStore::new());
        let ledger = WalletLedger::new(Arc::clone(&store));
        let user = UserId::new();
        let reference = Reference::new("gw-evt-42").unwrap();

        let first = ledger
            .deposit(user, Currency::Usd, amount, reference.clone(), json!({}))
            .unwrap();
        prop_assert!(!first.replayed);

        for _ in 0..replays {
            let receipt = ledger
                .deposit(user, Currency::Usd, amount, reference.clone(), json!({}))
                .unwrap();
            prop_assert!(receipt.replayed);
            prop_assert_eq!(receipt.wallet.balance, amount);
            prop_assert_eq!(receipt.transaction.id, first.transaction.id);
        }
    }
}

/// The deterministic hold reference is a second line of defense: even
/// if a funding claim somehow re-ran, the ledger would replay instead
/// of double-debiting.
#[test]
fn hold_reference_replay_is_inert() {
    let store = Arc::new(MemoryStore::new());
    let engine = EscrowEngine::new(
        Arc::clone(&store),
        EscrowConfig::default(),
        Arc::new(TracingSink),
    );
    let ledger = WalletLedger::new(Arc::clone(&store));
    let buyer = UserId::new();
    let seller = UserId::new();
    ledger
        .deposit(buyer, Currency::Ngn, 2000, Reference::new("seed").unwrap(), json!({}))
        .unwrap();
    let escrow = engine
        .create_escrow(CreateEscrow {
            buyer_id: buyer,
            seller_id: seller,
            post_id: None,
            amount: 1000,
            currency: Currency::Ngn,
            title: "laptop".into(),
            description: "x230".into(),
            terms: None,
            auto_release_hours: Some(72),
        })
        .unwrap();
    engine.accept_escrow(escrow.id, seller).unwrap();
    let funded = engine.fund_escrow(escrow.id, buyer).unwrap();

    let receipt = store
        .transact(|uow| {
            WalletLedger::apply_in(
                uow,
                LedgerApply {
                    user_id: buyer,
                    currency: Currency::Ngn,
                    delta: -funded.buyer_hold(),
                    kind: TransactionKind::EscrowHold,
                    fee: funded.fee,
                    reference: Reference::new(format!("{}:hold", funded.id)).unwrap(),
                    metadata: json!({}),
                },
            )
        })
        .unwrap();
    assert!(receipt.replayed);
    assert_eq!(receipt.wallet.balance, 950);
}
