//! Semester Fee Policy
//!
//! The fee rule is deliberately a single pluggable policy rather than
//! branching scattered through handlers: a flat per-head price, bounded
//! party size, and a set of fee-waived semesters with one of two waiver
//! modes:
//!
//! - `RefundLater`: waived semesters pay up front and are refunded by an
//!   admin after the event (the default).
//! - `Free`: waived semesters skip the gateway entirely and are registered
//!   immediately with nothing due.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

/// Highest semester accepted at registration (and reported on dashboards).
pub const MAX_SEMESTER: u8 = 6;

/// How a fee-waived semester is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaiverMode {
    /// Charge at registration, refund through the admin surface later.
    RefundLater,
    /// No charge; the registrant is persisted without a gateway order.
    Free,
}

impl FromStr for WaiverMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refund_later" => Ok(Self::RefundLater),
            "free" => Ok(Self::Free),
            other => bail!("unknown waiver mode: {other} (expected refund_later or free)"),
        }
    }
}

/// The semester fee rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeePolicy {
    /// Price per head in whole rupees
    pub unit_price: u64,
    /// Upper bound on dependents accompanying one registrant
    pub max_party_size: u8,
    /// Semesters covered by the fee waiver
    pub waived_semesters: HashSet<u8>,
    pub waiver_mode: WaiverMode,
}

impl Default for FeePolicy {
    fn default() -> Self {
        let mut waived_semesters = HashSet::new();
        waived_semesters.insert(1);
        Self {
            unit_price: 100,
            max_party_size: 5,
            waived_semesters,
            waiver_mode: WaiverMode::RefundLater,
        }
    }
}

/// A computed fee for one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    /// Registrant plus dependents
    pub heads: u32,
    /// Total fee in whole rupees
    pub total: u64,
    /// Total fee in minor units (paise), the unit the gateway bills in
    pub total_minor: u64,
    /// What must be collected before the registrant is persisted
    pub due_now_minor: u64,
}

impl FeePolicy {
    pub fn party_size_ok(&self, party_size: u8) -> bool {
        party_size <= self.max_party_size
    }

    /// Deterministic fee for a semester and party size.
    pub fn quote(&self, semester: u8, party_size: u8) -> FeeQuote {
        let heads = 1 + u32::from(party_size);
        let total = u64::from(heads) * self.unit_price;
        let total_minor = total * 100;
        let due_now_minor = if self.waived_semesters.contains(&semester)
            && self.waiver_mode == WaiverMode::Free
        {
            0
        } else {
            total_minor
        };
        FeeQuote {
            heads,
            total,
            total_minor,
            due_now_minor,
        }
    }

    /// Whether a paid registrant in this semester qualifies for the
    /// post-event admin refund.
    pub fn refund_eligible(&self, semester: u8) -> bool {
        self.waiver_mode == WaiverMode::RefundLater && self.waived_semesters.contains(&semester)
    }

    /// Whether this semester is fee-waived at all (either mode).
    pub fn waived(&self, semester: u8) -> bool {
        self.waived_semesters.contains(&semester)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_fee() {
        let policy = FeePolicy::default();

        // One registrant, two dependents: 3 heads at 100 rupees
        let quote = policy.quote(3, 2);
        assert_eq!(quote.heads, 3);
        assert_eq!(quote.total, 300);
        assert_eq!(quote.total_minor, 30_000);
        assert_eq!(quote.due_now_minor, 30_000);
    }

    #[test]
    fn test_party_size_bounds() {
        let policy = FeePolicy::default();
        assert!(policy.party_size_ok(0));
        assert!(policy.party_size_ok(5));
        assert!(!policy.party_size_ok(6));
    }

    #[test]
    fn test_refund_later_charges_up_front() {
        let policy = FeePolicy::default();
        let quote = policy.quote(1, 0);
        assert_eq!(quote.due_now_minor, 10_000);
        assert!(policy.refund_eligible(1));
        assert!(!policy.refund_eligible(2));
    }

    #[test]
    fn test_free_mode_waives_charge() {
        let policy = FeePolicy {
            waiver_mode: WaiverMode::Free,
            ..FeePolicy::default()
        };
        let quote = policy.quote(1, 2);
        assert_eq!(quote.total, 300);
        assert_eq!(quote.due_now_minor, 0);
        // Free-mode waivers have nothing to refund later
        assert!(!policy.refund_eligible(1));
    }

    #[test]
    fn test_waiver_mode_parse() {
        assert_eq!(
            "refund_later".parse::<WaiverMode>().unwrap(),
            WaiverMode::RefundLater
        );
        assert_eq!("free".parse::<WaiverMode>().unwrap(), WaiverMode::Free);
        assert!("gratis".parse::<WaiverMode>().is_err());
    }
}
