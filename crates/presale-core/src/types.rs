use crate::event::PresaleEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// USD amount in 6-decimal fixed point (micro-USD).
pub type UsdAmount = u64;

/// Token amount in 18-decimal fixed point (base units).
pub type TokenAmount = u128;

/// Basis points; 10000 = 100%.
pub type BasisPoints = u16;

/// One-based stage identifier.
pub type StageId = u32;

/// Micro-USD units per dollar.
pub const USD_UNIT: u64 = 1_000_000;

/// Token base units per whole token.
pub const TOKEN_UNIT: u128 = 1_000_000_000_000_000_000;

/// Basis-points denominator.
pub const BPS_DENOMINATOR: u128 = 10_000;

/// Opaque account identity. The engine assumes no identity scheme; an
/// empty or all-whitespace id is the null address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_null(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Immutable purchase record appended to one beneficiary's history.
/// Bonus receipts carry zero USD; the index in the history is the append
/// sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub usd: UsdAmount,
    pub tokens: TokenAmount,
    pub timestamp: DateTime<Utc>,
    pub stage_id: StageId,
    pub is_bonus: bool,
}

/// Per-account running totals, maintained alongside the receipt history
/// for O(1) reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAggregate {
    pub usd_spent: UsdAmount,
    pub tokens_allocated: TokenAmount,
}

/// Referral standing of one account. The referrer binding is write-once;
/// `referral_count` counts distinct referees bound to this account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralInfo {
    pub referrer: Option<AccountId>,
    pub referral_count: u64,
    pub bonus_earned_as_referrer: TokenAmount,
    pub bonus_earned_as_referee: TokenAmount,
}

/// Point-in-time stage snapshot returned by read queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    pub stage_id: StageId,
    pub price_per_token: UsdAmount,
    pub tokens_allocated: TokenAmount,
    pub tokens_sold: TokenAmount,
    pub usd_target: UsdAmount,
    pub usd_raised: UsdAmount,
    pub is_active: bool,
    pub completed: bool,
}

/// Read model for one account: aggregates plus receipt and promo counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub account: AccountId,
    pub usd_spent: UsdAmount,
    pub tokens_allocated: TokenAmount,
    pub receipt_count: usize,
    pub promo_tokens: TokenAmount,
}

/// Presale-wide counters and lifecycle flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresaleStats {
    pub total_usd: UsdAmount,
    pub total_tokens: TokenAmount,
    pub unique_buyer_count: u64,
    pub current_stage: Option<StageId>,
    pub finalized: bool,
    pub paused: bool,
    pub max_promo_bps: BasisPoints,
}

/// Arguments of one purchase-recording call; the referral and promo
/// parts are optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    pub buyer: AccountId,
    pub usd: UsdAmount,
    pub tokens: TokenAmount,
    pub referrer: Option<AccountId>,
    pub promo_bps: Option<BasisPoints>,
}

/// Result of one committed purchase: every receipt created for every
/// beneficiary, and the domain events in causal order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    pub buyer: AccountId,
    pub stage_id: StageId,
    pub new_buyer: bool,
    pub receipts: Vec<Receipt>,
    pub events: Vec<PresaleEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_address_detection_covers_whitespace() {
        assert!(AccountId::new("").is_null());
        assert!(AccountId::new("   ").is_null());
        assert!(!AccountId::new("buyer-1").is_null());
    }

    #[test]
    fn account_id_displays_raw_value() {
        assert_eq!(AccountId::new("0xabc").to_string(), "0xabc");
    }
}
