//! Engine configuration.

use serde::{Deserialize, Serialize};

/// Tunable escrow policy. Components receive this explicitly at
/// construction; there are no ambient globals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Platform fee in basis points of the principal (500 = 5%).
    pub fee_bps: u32,
    /// Deadline applied when the creator does not pick one.
    pub default_auto_release_hours: i64,
    /// Hard cap on any deadline, measured from the funding time (or
    /// creation time while unfunded).
    pub max_deadline_hours: i64,
    /// Grace window after the deadline before a stale dispute is
    /// escalated to the manual queue.
    pub dispute_window_hours: i64,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            fee_bps: 500,
            default_auto_release_hours: 72,
            max_deadline_hours: 30 * 24,
            dispute_window_hours: 72,
        }
    }
}
