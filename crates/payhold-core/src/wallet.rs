//! # Wallet Record
//!
//! One wallet per (user, currency) pair, holding the custodied balance
//! in minor units plus lifetime deposit/withdrawal totals.
//!
//! ## Security Invariant
//!
//! Wallet fields are mutated only inside `WalletLedger::apply_in`, in
//! the same unit of work that writes the matching transaction record.
//! No other code assigns to `balance`.

use serde::{Deserialize, Serialize};

use crate::identity::{UserId, WalletId};
use crate::money::Currency;
use crate::temporal::Timestamp;

/// A per-user, per-currency custodial wallet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    /// Unique wallet identifier.
    pub id: WalletId,
    /// The owning user.
    pub user_id: UserId,
    /// The wallet currency.
    pub currency: Currency,
    /// Current balance in minor units. Never negative.
    pub balance: i64,
    /// Lifetime sum of credits applied, in minor units.
    pub total_deposits: i64,
    /// Lifetime sum of debits applied, in minor units.
    pub total_withdrawals: i64,
    /// When the wallet was created.
    pub created_at: Timestamp,
    /// When the wallet was last mutated.
    pub updated_at: Timestamp,
}

impl Wallet {
    /// Open a fresh wallet at zero balance.
    ///
    /// Wallets are created lazily by the ledger on a first credit;
    /// debit-type operations require the wallet to pre-exist.
    pub fn open(user_id: UserId, currency: Currency, now: Timestamp) -> Self {
        Self {
            id: WalletId::new(),
            user_id,
            currency,
            balance: 0,
            total_deposits: 0,
            total_withdrawals: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
