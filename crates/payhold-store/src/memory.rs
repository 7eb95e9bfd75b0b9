//! In-memory reference backend with snapshot rollback.
//!
//! Tables are plain hash maps keyed by the domain identifiers, plus a
//! reference index for ledger idempotency lookups. List reads return
//! clones in deterministic order (newest first, identifier as the
//! tie-break) so pagination is stable across calls.

use std::collections::HashMap;

use parking_lot::Mutex;

use payhold_core::{
    Currency, EngineError, Escrow, EscrowId, Reference, Timestamp, Transaction, TransactionId,
    UserId, Wallet,
};

/// Committed state: every table the workspace persists.
#[derive(Debug, Clone, Default)]
struct State {
    wallets: HashMap<(UserId, Currency), Wallet>,
    transactions: HashMap<TransactionId, Transaction>,
    by_reference: HashMap<String, TransactionId>,
    escrows: HashMap<EscrowId, Escrow>,
}

/// The transactional handle passed to a [`MemoryStore::transact`]
/// closure. All mutations made through it take effect only if the
/// closure returns `Ok`.
#[derive(Debug)]
pub struct UnitOfWork<'a> {
    state: &'a mut State,
}

impl UnitOfWork<'_> {
    /// Read a wallet by its (user, currency) key.
    pub fn wallet(&self, user: &UserId, currency: Currency) -> Option<Wallet> {
        self.state.wallets.get(&(*user, currency)).cloned()
    }

    /// Insert or update a wallet.
    pub fn put_wallet(&mut self, wallet: Wallet) {
        self.state
            .wallets
            .insert((wallet.user_id, wallet.currency), wallet);
    }

    /// Look up a transaction by its idempotency reference.
    pub fn transaction_by_reference(&self, reference: &Reference) -> Option<Transaction> {
        self.state
            .by_reference
            .get(reference.as_str())
            .and_then(|id| self.state.transactions.get(id))
            .cloned()
    }

    /// Append an immutable transaction record.
    ///
    /// A duplicate id or reference here means the ledger's idempotency
    /// check was bypassed — that is a storage-integrity fault, not a
    /// business rejection.
    pub fn insert_transaction(&mut self, transaction: Transaction) -> Result<(), EngineError> {
        if self.state.transactions.contains_key(&transaction.id) {
            return Err(EngineError::FatalStorage(format!(
                "duplicate transaction id: {}",
                transaction.id
            )));
        }
        if self
            .state
            .by_reference
            .contains_key(transaction.reference.as_str())
        {
            return Err(EngineError::FatalStorage(format!(
                "duplicate transaction reference: {}",
                transaction.reference
            )));
        }
        self.state
            .by_reference
            .insert(transaction.reference.as_str().to_string(), transaction.id);
        self.state.transactions.insert(transaction.id, transaction);
        Ok(())
    }

    /// All transactions for a user, newest first.
    pub fn transactions_for_user(&self, user: &UserId) -> Vec<Transaction> {
        let mut out: Vec<Transaction> = self
            .state
            .transactions
            .values()
            .filter(|t| t.user_id == *user)
            .cloned()
            .collect();
        out.sort_by(|a, b| (b.created_at, b.id.0).cmp(&(a.created_at, a.id.0)));
        out
    }

    /// Read an escrow by id.
    pub fn escrow(&self, id: &EscrowId) -> Option<Escrow> {
        self.state.escrows.get(id).cloned()
    }

    /// Insert a new escrow.
    pub fn insert_escrow(&mut self, escrow: Escrow) -> Result<(), EngineError> {
        if self.state.escrows.contains_key(&escrow.id) {
            return Err(EngineError::FatalStorage(format!(
                "duplicate escrow id: {}",
                escrow.id
            )));
        }
        self.state.escrows.insert(escrow.id, escrow);
        Ok(())
    }

    /// Update an existing escrow.
    pub fn put_escrow(&mut self, escrow: Escrow) -> Result<(), EngineError> {
        if !self.state.escrows.contains_key(&escrow.id) {
            return Err(EngineError::FatalStorage(format!(
                "update of missing escrow: {}",
                escrow.id
            )));
        }
        self.state.escrows.insert(escrow.id, escrow);
        Ok(())
    }

    /// A page of the user's escrows (buyer or seller side), newest
    /// first, plus the total match count.
    pub fn escrows_for_user(
        &self,
        user: &UserId,
        offset: usize,
        limit: usize,
    ) -> (Vec<Escrow>, u64) {
        let mut matches: Vec<Escrow> = self
            .state
            .escrows
            .values()
            .filter(|e| e.is_party(user))
            .cloned()
            .collect();
        matches.sort_by(|a, b| (b.created_at, b.id.0).cmp(&(a.created_at, a.id.0)));
        let total = matches.len() as u64;
        let page = matches.into_iter().skip(offset).take(limit).collect();
        (page, total)
    }

    /// Non-terminal escrows whose deadline has passed, oldest deadline
    /// first. The sweep applies per-status policy on top of this.
    pub fn escrows_due(&self, now: Timestamp) -> Vec<Escrow> {
        let mut due: Vec<Escrow> = self
            .state
            .escrows
            .values()
            .filter(|e| !e.status.is_terminal() && e.auto_release_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| (a.auto_release_at, a.id.0).cmp(&(b.auto_release_at, b.id.0)));
        due
    }
}

/// The in-memory transactional store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<State>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// The closure receives a handle over a working copy of the
    /// committed state. On `Ok` the working copy becomes the committed
    /// state; on `Err` it is discarded and the error is returned with
    /// zero partial effect. Units of work are fully serialized: the
    /// commit point of one is the read point of the next.
    pub fn transact<T>(
        &self,
        f: impl FnOnce(&mut UnitOfWork<'_>) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let mut committed = self.inner.lock();
        let mut working = committed.clone();
        let mut uow = UnitOfWork { state: &mut working };
        match f(&mut uow) {
            Ok(value) => {
                *committed = working;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }
}
