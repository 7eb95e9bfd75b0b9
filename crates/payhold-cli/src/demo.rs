//! Demo handlers: each seeds a fresh in-memory deployment and drives
//! the engine through a real lifecycle, printing balances as it goes.

use std::sync::Arc;

use clap::Args;
use serde_json::json;

use payhold_core::{Currency, Escrow, Reference, Timestamp, UserId};
use payhold_escrow::{
    CreateEscrow, DisputeResolver, EscrowConfig, EscrowEngine, ResolutionOutcome, TracingSink,
};
use payhold_ledger::WalletLedger;
use payhold_store::MemoryStore;
use payhold_sweep::{DeadlineScheduler, SweepConfig};

#[derive(Args, Debug)]
pub struct LifecycleArgs {
    /// Principal in minor units.
    #[arg(long, default_value_t = 100_000)]
    amount: i64,
    /// Agreement currency.
    #[arg(long, default_value = "NGN")]
    currency: Currency,
}

#[derive(Args, Debug)]
pub struct DisputeArgs {
    /// Principal in minor units.
    #[arg(long, default_value_t = 100_000)]
    amount: i64,
    /// Resolve in the seller's favor instead of refunding the buyer.
    #[arg(long)]
    release: bool,
}

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Hours past the deadline to simulate.
    #[arg(long, default_value_t = 100)]
    hours_late: i64,
}

struct Deployment {
    engine: Arc<EscrowEngine>,
    ledger: WalletLedger,
    store: Arc<MemoryStore>,
    buyer: UserId,
    seller: UserId,
}

fn deploy() -> Deployment {
    let store = Arc::new(MemoryStore::new());
    Deployment {
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

impl Deployment {
    fn seed_buyer(&self, currency: Currency, amount: i64) -> anyhow::Result<()> {
        self.ledger.deposit(
            self.buyer,
            currency,
            amount,
            Reference::new(format!("seed:{}", self.buyer))?,
            json!({ "source": "demo seed" }),
        )?;
        Ok(())
    }

    fn funded_escrow(&self, amount: i64, currency: Currency) -> anyhow::Result<Escrow> {
        let escrow = self.engine.create_escrow(CreateEscrow {
            buyer_id: self.buyer,
            seller_id: self.seller,
            post_id: None,
            amount,
            currency,
            title: "demo escrow".into(),
            description: "demonstration agreement".into(),
            terms: None,
            auto_release_hours: Some(72),
        })?;
        println!("created  {} (fee {} {})", escrow.id, escrow.fee, escrow.currency);
        self.engine.accept_escrow(escrow.id, self.seller)?;
        println!("accepted by seller {}", self.seller);
        let escrow = self.engine.fund_escrow(escrow.id, self.buyer)?;
        println!("funded   hold of {} {} taken into custody", escrow.buyer_hold(), escrow.currency);
        Ok(escrow)
    }

    fn print_balances(&self, currency: Currency) -> anyhow::Result<()> {
        let (buyer, seller) = self.store.transact(|uow| {
            Ok((
                uow.wallet(&self.buyer, currency).map_or(0, |w| w.balance),
                uow.wallet(&self.seller, currency).map_or(0, |w| w.balance),
            ))
        })?;
        println!("balances buyer={buyer} seller={seller}");
        Ok(())
    }
}

pub fn lifecycle(args: LifecycleArgs) -> anyhow::Result<()> {
    let deployment = deploy();
    deployment.seed_buyer(args.currency, args.amount * 2)?;
    let escrow = deployment.funded_escrow(args.amount, args.currency)?;

    deployment
        .engine
        .mark_delivered(escrow.id, deployment.seller, Some("shipped".into()))?;
    println!("delivered by seller");
    let escrow = deployment.engine.confirm_delivery(escrow.id, deployment.buyer)?;
    println!("released {} {} to seller", escrow.seller_payout(), escrow.currency);
    deployment.print_balances(args.currency)
}

pub fn dispute(args: DisputeArgs) -> anyhow::Result<()> {
    let deployment = deploy();
    deployment.seed_buyer(Currency::Ngn, args.amount * 2)?;
    let escrow = deployment.funded_escrow(args.amount, Currency::Ngn)?;

    deployment
        .engine
        .create_dispute(escrow.id, deployment.buyer, "item not as described".into())?;
    println!("disputed by buyer");

    let admin = UserId::new();
    let resolver = DisputeResolver::new(Arc::clone(&deployment.engine));
    let outcome = if args.release {
        ResolutionOutcome::Release
    } else {
        ResolutionOutcome::Refund
    };
    let resolved = resolver.resolve(escrow.id, admin, outcome, "demo adjudication".into())?;
    println!("resolved {} -> {}", resolved.id, resolved.status);
    deployment.print_balances(Currency::Ngn)
}

pub fn sweep(args: SweepArgs) -> anyhow::Result<()> {
    let deployment = deploy();
    deployment.seed_buyer(Currency::Ngn, 500_000)?;

    // A funded escrow due for auto-release and a pending one due to
    // expire.
    let funded = deployment.funded_escrow(100_000, Currency::Ngn)?;
    let pending = deployment.engine.create_escrow(CreateEscrow {
        buyer_id: deployment.buyer,
        seller_id: deployment.seller,
        post_id: None,
        amount: 50_000,
        currency: Currency::Ngn,
        title: "stale offer".into(),
        description: "never accepted".into(),
        terms: None,
        auto_release_hours: Some(24),
    })?;

    let scheduler = DeadlineScheduler::new(Arc::clone(&deployment.engine), SweepConfig::default());
    let later = Timestamp::now().plus_hours(72 + args.hours_late);
    let report = scheduler.sweep_once(later);
    println!(
        "sweep at {later}: released={} expired={} escalated={} conflicts={}",
        report.released, report.expired, report.escalated, report.conflicts
    );

    for id in [funded.id, pending.id] {
        let escrow = deployment.engine.escrow_by_id(id, deployment.buyer)?;
        println!("escrow   {} -> {}", escrow.id, escrow.status);
    }
    deployment.print_balances(Currency::Ngn)
}
