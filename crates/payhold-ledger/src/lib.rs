//! # payhold-ledger — Wallet Ledger
//!
//! Owns every balance mutation on the platform. The single primitive is
//! [`WalletLedger::apply_in`]: a signed-delta application that writes
//! the balance change and the immutable [`Transaction`] record in the
//! caller's unit of work — both or neither.
//!
//! ## Security Invariant
//!
//! - The transaction `reference` is the idempotency key: a reference
//!   that already completed makes `apply_in` a no-op returning the
//!   original record, so retried gateway callbacks and double-submitted
//!   transitions cannot re-move money.
//! - A debit never drives a balance negative and never creates a
//!   wallet; a credit creates the wallet lazily at zero.
//!
//! The escrow engine calls `apply_in` inside its own transition unit of
//! work; the [`WalletLedger::deposit`] / [`WalletLedger::withdraw`]
//! entry points open a unit of work themselves and exist for the
//! excluded payment-gateway adapters.

use std::sync::Arc;

use tracing::info;

use payhold_core::{
    money, Currency, EngineError, Reference, Timestamp, Transaction, TransactionKind,
    TransactionStatus, UserId, Wallet,
};
use payhold_store::{MemoryStore, UnitOfWork};

/// A signed-delta ledger application request.
#[derive(Debug, Clone)]
pub struct LedgerApply {
    /// Whose wallet moves.
    pub user_id: UserId,
    /// Which currency wallet moves.
    pub currency: Currency,
    /// Signed minor-unit delta: positive credits, negative debits.
    pub delta: i64,
    /// The kind recorded on the audit transaction.
    pub kind: TransactionKind,
    /// Fee component recorded on the audit transaction.
    pub fee: i64,
    /// Globally unique idempotency reference.
    pub reference: Reference,
    /// Free-form context persisted with the record.
    pub metadata: serde_json::Value,
}

/// The result of a ledger application.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    /// The wallet after application.
    pub wallet: Wallet,
    /// The audit record (the pre-existing one on replay).
    pub transaction: Transaction,
    /// True when the reference had already completed and no delta was
    /// applied.
    pub replayed: bool,
}

/// The wallet ledger component.
///
/// Holds the store for the gateway-facing entry points; the escrow
/// engine uses the associated [`WalletLedger::apply_in`] directly so
/// fund movements share the transition's unit of work.
#[derive(Debug, Clone)]
pub struct WalletLedger {
    store: Arc<MemoryStore>,
}

impl WalletLedger {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// Apply a signed delta inside an existing unit of work.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Validation`] on a zero delta or arithmetic
    ///   overflow.
    /// - [`EngineError::WalletNotFound`] on a debit against a missing
    ///   wallet.
    /// - [`EngineError::InsufficientFunds`] when the debit exceeds the
    ///   balance.
    pub fn apply_in(
        uow: &mut UnitOfWork<'_>,
        req: LedgerApply,
    ) -> Result<LedgerReceipt, EngineError> {
        if req.delta == 0 {
            return Err(EngineError::Validation(
                "ledger delta must be non-zero".to_string(),
            ));
        }

        // Idempotent replay: a completed reference returns the original
        // record untouched.
        if let Some(existing) = uow.transaction_by_reference(&req.reference) {
            if existing.status != TransactionStatus::Completed {
                return Err(EngineError::Validation(format!(
                    "reference {} already in use with status {}",
                    req.reference, existing.status
                )));
            }
            let wallet = uow.wallet(&req.user_id, req.currency).ok_or_else(|| {
                EngineError::FatalStorage(format!(
                    "completed transaction {} references a missing wallet",
                    existing.id
                ))
            })?;
            info!(
                reference = %req.reference,
                transaction = %existing.id,
                "ledger reference replayed, no delta applied"
            );
            return Ok(LedgerReceipt { wallet, transaction: existing, replayed: true });
        }

        let now = Timestamp::now();
        let mut wallet = match uow.wallet(&req.user_id, req.currency) {
            Some(wallet) => wallet,
            None if req.delta > 0 => Wallet::open(req.user_id, req.currency, now),
            None => {
                return Err(EngineError::WalletNotFound {
                    user: req.user_id.to_string(),
                    currency: req.currency.to_string(),
                })
            }
        };

        let new_balance = money::checked_add(wallet.balance, req.delta)?;
        if new_balance < 0 {
            return Err(EngineError::InsufficientFunds {
                wallet: wallet.id.to_string(),
                requested: -req.delta,
                available: wallet.balance,
            });
        }

        wallet.balance = new_balance;
        if req.delta > 0 {
            wallet.total_deposits = money::checked_add(wallet.total_deposits, req.delta)?;
        } else {
            wallet.total_withdrawals = money::checked_add(wallet.total_withdrawals, -req.delta)?;
        }
        wallet.updated_at = now;

        let transaction = Transaction::completed(
            req.user_id,
            wallet.id,
            req.kind,
            req.delta.abs(),
            req.fee,
            req.currency,
            req.reference,
            req.metadata,
            now,
        );

        uow.insert_transaction(transaction.clone())?;
        uow.put_wallet(wallet.clone());

        info!(
            user = %req.user_id,
            wallet = %wallet.id,
            kind = %transaction.kind,
            delta = req.delta,
            balance = wallet.balance,
            reference = %transaction.reference,
            "ledger delta applied"
        );

        Ok(LedgerReceipt { wallet, transaction, replayed: false })
    }

    /// Gateway entry point: credit a validated deposit.
    ///
    /// The reference is supplied by the caller (gateway event id) so a
    /// retried webhook replays instead of double-crediting.
    pub fn deposit(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: i64,
        reference: Reference,
        metadata: serde_json::Value,
    ) -> Result<LedgerReceipt, EngineError> {
        money::require_positive(amount, "deposit amount")?;
        self.store.transact(|uow| {
            Self::apply_in(
                uow,
                LedgerApply {
                    user_id,
                    currency,
                    delta: amount,
                    kind: TransactionKind::Deposit,
                    fee: 0,
                    reference,
                    metadata,
                },
            )
        })
    }

    /// Gateway entry point: debit a validated withdrawal.
    ///
    /// `fee` is the gateway/platform charge; `net_amount = amount − fee`
    /// is what leaves the platform toward the user.
    pub fn withdraw(
        &self,
        user_id: UserId,
        currency: Currency,
        amount: i64,
        fee: i64,
        reference: Reference,
        metadata: serde_json::Value,
    ) -> Result<LedgerReceipt, EngineError> {
        money::require_positive(amount, "withdrawal amount")?;
        if fee < 0 || fee >= amount {
            return Err(EngineError::Validation(format!(
                "withdrawal fee {fee} must be in [0, amount)"
            )));
        }
        self.store.transact(|uow| {
            Self::apply_in(
                uow,
                LedgerApply {
                    user_id,
                    currency,
                    delta: -amount,
                    kind: TransactionKind::Withdrawal,
                    fee,
                    reference,
                    metadata,
                },
            )
        })
    }
}
